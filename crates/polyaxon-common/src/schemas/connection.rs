//! Connections — named references to external stores
//!
//! A connection canonicalises one external store (object storage bucket,
//! volume claim, host path, git repository, image registry) plus the
//! secret/config-map credentials needed to reach it. The kind-specific
//! schema is dispatched on `kind` during deserialization; exactly one
//! shape is populated per connection.

use schemars::JsonSchema;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use super::resource::ConnectionResource;

/// Kind discriminator for a connection
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// AWS S3 (or compatible) bucket
    S3,
    /// Google Cloud Storage bucket
    Gcs,
    /// Azure blob storage bucket
    Wasb,
    /// Kubernetes persistent volume claim
    VolumeClaim,
    /// Node host path
    HostPath,
    /// Git repository
    Git,
    /// Container image registry
    Registry,
    /// Any other custom kind the platform knows about
    #[serde(untagged)]
    Custom(String),
}

impl ConnectionKind {
    /// True for object-storage kinds (S3, GCS, WASB)
    pub fn is_bucket(&self) -> bool {
        matches!(self, Self::S3 | Self::Gcs | Self::Wasb)
    }
}

impl std::fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::S3 => write!(f, "s3"),
            Self::Gcs => write!(f, "gcs"),
            Self::Wasb => write!(f, "wasb"),
            Self::VolumeClaim => write!(f, "volume_claim"),
            Self::HostPath => write!(f, "host_path"),
            Self::Git => write!(f, "git"),
            Self::Registry => write!(f, "registry"),
            Self::Custom(k) => write!(f, "{}", k),
        }
    }
}

/// Kind-specific schema of a connection
#[derive(Clone, Debug, Serialize, JsonSchema, PartialEq)]
#[serde(untagged)]
pub enum ConnectionSchema {
    /// Object-storage bucket
    Bucket(BucketSchema),
    /// Persistent volume claim mount
    VolumeClaim(VolumeClaimSchema),
    /// Host path mount
    HostPath(HostPathSchema),
    /// Git repository
    Git(GitSchema),
    /// Image registry
    Registry(RegistrySchema),
    /// Opaque schema of a custom kind, kept verbatim for the catalog env var
    Custom(serde_json::Value),
}

/// Bucket schema for S3/GCS/WASB connections
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BucketSchema {
    /// Bucket URL, e.g. `s3://my-bucket`
    pub bucket: String,
}

/// Volume-claim schema
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeClaimSchema {
    /// Claim name
    pub volume_claim: String,
    /// Mount path inside the container
    pub mount_path: String,
    /// Mount read-only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

/// Host-path schema
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HostPathSchema {
    /// Path on the node
    pub host_path: String,
    /// Mount path inside the container
    pub mount_path: String,
    /// Mount read-only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

/// Git schema
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitSchema {
    /// Repository URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Revision (branch, tag, or commit) to check out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Extra flags passed to the clone invocation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
}

/// Registry schema
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySchema {
    /// Registry URL
    pub url: String,
    /// Allow plain HTTP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
}

/// Named reference to an external store.
#[derive(Clone, Debug, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Unique connection name within the agent catalog
    pub name: String,

    /// Kind discriminator
    pub kind: ConnectionKind,

    /// Kind-specific schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<ConnectionSchema>,

    /// Credentials secret attached to the connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<ConnectionResource>,

    /// Config-map attached to the connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ConnectionResource>,
}

// The schema shape is decided by `kind`, so untagged deserialization would be
// ambiguous (a git schema with only a url also parses as a registry schema).
// Deserialize into a raw shape first and dispatch on the kind.
impl<'de> Deserialize<'de> for Connection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RawConnection {
            name: String,
            kind: ConnectionKind,
            #[serde(default)]
            schema: Option<serde_json::Value>,
            #[serde(default)]
            secret: Option<ConnectionResource>,
            #[serde(default)]
            config_map: Option<ConnectionResource>,
        }

        let raw = RawConnection::deserialize(deserializer)?;
        let schema = match raw.schema {
            None => None,
            Some(value) => Some(parse_schema(&raw.kind, value).map_err(D::Error::custom)?),
        };

        Ok(Connection {
            name: raw.name,
            kind: raw.kind,
            schema,
            secret: raw.secret,
            config_map: raw.config_map,
        })
    }
}

fn parse_schema(
    kind: &ConnectionKind,
    value: serde_json::Value,
) -> Result<ConnectionSchema, serde_json::Error> {
    let schema = match kind {
        ConnectionKind::S3 | ConnectionKind::Gcs | ConnectionKind::Wasb => {
            ConnectionSchema::Bucket(serde_json::from_value(value)?)
        }
        ConnectionKind::VolumeClaim => {
            ConnectionSchema::VolumeClaim(serde_json::from_value(value)?)
        }
        ConnectionKind::HostPath => ConnectionSchema::HostPath(serde_json::from_value(value)?),
        ConnectionKind::Git => ConnectionSchema::Git(serde_json::from_value(value)?),
        ConnectionKind::Registry => ConnectionSchema::Registry(serde_json::from_value(value)?),
        ConnectionKind::Custom(_) => ConnectionSchema::Custom(value),
    };
    Ok(schema)
}

impl Connection {
    /// True for object-storage connections
    pub fn is_bucket(&self) -> bool {
        self.kind.is_bucket()
    }

    /// True for volume-claim connections
    pub fn is_volume_claim(&self) -> bool {
        self.kind == ConnectionKind::VolumeClaim
    }

    /// True for host-path connections
    pub fn is_host_path(&self) -> bool {
        self.kind == ConnectionKind::HostPath
    }

    /// True when the connection contributes a pod volume
    pub fn is_mount(&self) -> bool {
        self.is_volume_claim() || self.is_host_path()
    }

    /// Store path of the connection: bucket URL for buckets, mount path for
    /// mounts, repository/registry URL otherwise.
    pub fn store_path(&self) -> Option<&str> {
        match self.schema.as_ref()? {
            ConnectionSchema::Bucket(b) => Some(&b.bucket),
            ConnectionSchema::VolumeClaim(c) => Some(&c.mount_path),
            ConnectionSchema::HostPath(h) => Some(&h.mount_path),
            ConnectionSchema::Git(g) => g.url.as_deref(),
            ConnectionSchema::Registry(r) => Some(&r.url),
            ConnectionSchema::Custom(_) => None,
        }
    }

    /// Mount path for mount-kind connections
    pub fn mount_path(&self) -> Option<&str> {
        match self.schema.as_ref()? {
            ConnectionSchema::VolumeClaim(c) => Some(&c.mount_path),
            ConnectionSchema::HostPath(h) => Some(&h.mount_path),
            _ => None,
        }
    }

    /// Whether mount-kind connections are mounted read-only
    pub fn read_only(&self) -> bool {
        match self.schema.as_ref() {
            Some(ConnectionSchema::VolumeClaim(c)) => c.read_only.unwrap_or(false),
            Some(ConnectionSchema::HostPath(h)) => h.read_only.unwrap_or(false),
            _ => false,
        }
    }

    /// Git schema accessor for git-kind connections
    pub fn git(&self) -> Option<&GitSchema> {
        match self.schema.as_ref()? {
            ConnectionSchema::Git(g) => Some(g),
            _ => None,
        }
    }

    /// Schema as a JSON value, for the `POLYAXON_CONNECTION_<NAME>` env var
    pub fn schema_json(&self) -> serde_json::Value {
        self.schema
            .as_ref()
            .and_then(|s| serde_json::to_value(s).ok())
            .unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(name: &str, url: &str) -> Connection {
        Connection {
            name: name.to_string(),
            kind: ConnectionKind::S3,
            schema: Some(ConnectionSchema::Bucket(BucketSchema {
                bucket: url.to_string(),
            })),
            secret: None,
            config_map: None,
        }
    }

    #[test]
    fn kind_predicates() {
        assert!(ConnectionKind::S3.is_bucket());
        assert!(ConnectionKind::Gcs.is_bucket());
        assert!(ConnectionKind::Wasb.is_bucket());
        assert!(!ConnectionKind::VolumeClaim.is_bucket());
        assert!(!ConnectionKind::Custom("snowflake".to_string()).is_bucket());
    }

    #[test]
    fn bucket_connection_has_no_mount() {
        let conn = bucket("store", "s3://bucket");
        assert!(conn.is_bucket());
        assert!(!conn.is_mount());
        assert_eq!(conn.store_path(), Some("s3://bucket"));
        assert_eq!(conn.mount_path(), None);
    }

    #[test]
    fn claim_connection_is_mount() {
        let conn = Connection {
            name: "data".to_string(),
            kind: ConnectionKind::VolumeClaim,
            schema: Some(ConnectionSchema::VolumeClaim(VolumeClaimSchema {
                volume_claim: "pvc-data".to_string(),
                mount_path: "/data".to_string(),
                read_only: Some(true),
            })),
            secret: None,
            config_map: None,
        };
        assert!(conn.is_mount());
        assert!(conn.is_volume_claim());
        assert!(conn.read_only());
        assert_eq!(conn.store_path(), Some("/data"));
    }

    #[test]
    fn custom_kind_round_trips() {
        let kind: ConnectionKind = serde_json::from_str("\"snowflake\"").unwrap();
        assert_eq!(kind, ConnectionKind::Custom("snowflake".to_string()));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"snowflake\"");

        let kind: ConnectionKind = serde_json::from_str("\"volume_claim\"").unwrap();
        assert_eq!(kind, ConnectionKind::VolumeClaim);
    }

    #[test]
    fn schema_dispatches_on_kind() {
        let conn: Connection = serde_json::from_value(serde_json::json!({
            "name": "repo",
            "kind": "git",
            "schema": {"url": "https://github.com/org/repo", "revision": "main"}
        }))
        .unwrap();
        assert_eq!(conn.git().unwrap().revision.as_deref(), Some("main"));

        // A registry schema with only a url must not be mistaken for git.
        let conn: Connection = serde_json::from_value(serde_json::json!({
            "name": "images",
            "kind": "registry",
            "schema": {"url": "registry.example.com"}
        }))
        .unwrap();
        assert!(matches!(
            conn.schema,
            Some(ConnectionSchema::Registry(_))
        ));
    }

    #[test]
    fn custom_schema_kept_verbatim() {
        let conn: Connection = serde_json::from_value(serde_json::json!({
            "name": "warehouse",
            "kind": "snowflake",
            "schema": {"account": "xy12345", "warehouse": "compute_wh"}
        }))
        .unwrap();
        assert_eq!(conn.schema_json()["account"], "xy12345");
    }
}
