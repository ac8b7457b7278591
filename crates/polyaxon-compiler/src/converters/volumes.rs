//! Volume and mount synthesis
//!
//! Connections contribute volumes only when they are claim or host-path
//! mounts; buckets never do. Plugin contexts (artifacts, auth, docker, shm)
//! have fixed volume names so duplicates collapse naturally.

use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, EmptyDirVolumeSource, HostPathVolumeSource,
    PersistentVolumeClaimVolumeSource, SecretVolumeSource, Volume, VolumeMount,
};

use polyaxon_common::constants;
use polyaxon_common::schemas::connection::ConnectionSchema;
use polyaxon_common::schemas::{Connection, ConnectionResource};

/// Volume backing a claim or host-path connection; buckets contribute none
pub fn connection_volume(connection: &Connection) -> Option<Volume> {
    match connection.schema.as_ref()? {
        ConnectionSchema::VolumeClaim(claim) => Some(Volume {
            name: connection.name.clone(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim.volume_claim.clone(),
                read_only: claim.read_only,
            }),
            ..Default::default()
        }),
        ConnectionSchema::HostPath(host_path) => Some(Volume {
            name: connection.name.clone(),
            host_path: Some(HostPathVolumeSource {
                path: host_path.host_path.clone(),
                type_: None,
            }),
            ..Default::default()
        }),
        _ => None,
    }
}

/// Mount matching `connection_volume`, at the connection's mount path
pub fn connection_mount(connection: &Connection) -> Option<VolumeMount> {
    let mount_path = connection.mount_path()?;
    Some(VolumeMount {
        name: connection.name.clone(),
        mount_path: mount_path.to_string(),
        read_only: Some(connection.read_only()).filter(|ro| *ro),
        ..Default::default()
    })
}

/// Secret or config-map volume for a resource with a mount path
pub fn resource_volume(resource: &ConnectionResource, is_secret: bool) -> Option<Volume> {
    resource.mount_path.as_ref()?;
    let volume = if is_secret {
        Volume {
            name: resource.name.clone(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(resource.name.clone()),
                ..Default::default()
            }),
            ..Default::default()
        }
    } else {
        Volume {
            name: resource.name.clone(),
            config_map: Some(ConfigMapVolumeSource {
                name: resource.name.clone(),
                ..Default::default()
            }),
            ..Default::default()
        }
    };
    Some(volume)
}

/// Mount matching `resource_volume`
pub fn resource_mount(resource: &ConnectionResource) -> Option<VolumeMount> {
    let mount_path = resource.mount_path.as_ref()?;
    Some(VolumeMount {
        name: resource.name.clone(),
        mount_path: mount_path.clone(),
        read_only: Some(true),
        ..Default::default()
    })
}

/// Shared artifacts context `emptyDir`
pub fn artifacts_context_volume() -> Volume {
    Volume {
        name: constants::VOLUME_ARTIFACTS_CONTEXT.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

/// Mount of the artifacts context at its well-known path
pub fn artifacts_context_mount() -> VolumeMount {
    VolumeMount {
        name: constants::VOLUME_ARTIFACTS_CONTEXT.to_string(),
        mount_path: constants::CONTEXT_ARTIFACTS_ROOT.to_string(),
        ..Default::default()
    }
}

/// Auth context `emptyDir` populated by the auth init
pub fn auth_context_volume() -> Volume {
    Volume {
        name: constants::VOLUME_AUTH_CONTEXT.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

/// Auth context mount; read-only everywhere except the populating init
pub fn auth_context_mount(read_only: bool) -> VolumeMount {
    VolumeMount {
        name: constants::VOLUME_AUTH_CONTEXT.to_string(),
        mount_path: constants::CONTEXT_AUTH_ROOT.to_string(),
        read_only: Some(read_only).filter(|ro| *ro),
        ..Default::default()
    }
}

/// Docker socket host-path volume
pub fn docker_volume() -> Volume {
    Volume {
        name: constants::VOLUME_DOCKER.to_string(),
        host_path: Some(HostPathVolumeSource {
            path: constants::DOCKER_SOCKET_PATH.to_string(),
            type_: None,
        }),
        ..Default::default()
    }
}

/// Docker socket mount
pub fn docker_mount() -> VolumeMount {
    VolumeMount {
        name: constants::VOLUME_DOCKER.to_string(),
        mount_path: constants::DOCKER_SOCKET_PATH.to_string(),
        ..Default::default()
    }
}

/// Shared-memory tmpfs volume
pub fn shm_volume() -> Volume {
    Volume {
        name: constants::VOLUME_SHM.to_string(),
        empty_dir: Some(EmptyDirVolumeSource {
            medium: Some("Memory".to_string()),
            size_limit: None,
        }),
        ..Default::default()
    }
}

/// Shared-memory mount
pub fn shm_mount() -> VolumeMount {
    VolumeMount {
        name: constants::VOLUME_SHM.to_string(),
        mount_path: constants::SHM_MOUNT_PATH.to_string(),
        ..Default::default()
    }
}

/// Deduplicate volumes by name; first occurrence wins
pub fn dedup_volumes(volumes: Vec<Volume>) -> Vec<Volume> {
    let mut seen = std::collections::BTreeSet::new();
    volumes
        .into_iter()
        .filter(|v| seen.insert(v.name.clone()))
        .collect()
}

/// Deduplicate mounts by name; first occurrence wins
pub fn dedup_mounts(mounts: Vec<VolumeMount>) -> Vec<VolumeMount> {
    let mut seen = std::collections::BTreeSet::new();
    mounts
        .into_iter()
        .filter(|m| seen.insert(m.name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyaxon_common::schemas::connection::{
        BucketSchema, ConnectionKind, HostPathSchema, VolumeClaimSchema,
    };

    #[test]
    fn buckets_contribute_no_volume() {
        let conn = Connection {
            name: "store".to_string(),
            kind: ConnectionKind::S3,
            schema: Some(ConnectionSchema::Bucket(BucketSchema {
                bucket: "s3://b".to_string(),
            })),
            secret: None,
            config_map: None,
        };
        assert!(connection_volume(&conn).is_none());
        assert!(connection_mount(&conn).is_none());
    }

    #[test]
    fn claim_connections_mount_at_their_path() {
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
        let volume = connection_volume(&conn).unwrap();
        assert_eq!(
            volume.persistent_volume_claim.unwrap().claim_name,
            "pvc-data"
        );
        let mount = connection_mount(&conn).unwrap();
        assert_eq!(mount.mount_path, "/data");
        assert_eq!(mount.read_only, Some(true));
    }

    #[test]
    fn host_path_connections_use_the_node_path() {
        let conn = Connection {
            name: "local".to_string(),
            kind: ConnectionKind::HostPath,
            schema: Some(ConnectionSchema::HostPath(HostPathSchema {
                host_path: "/tmp/store".to_string(),
                mount_path: "/plx".to_string(),
                read_only: None,
            })),
            secret: None,
            config_map: None,
        };
        let volume = connection_volume(&conn).unwrap();
        assert_eq!(volume.host_path.unwrap().path, "/tmp/store");
        assert_eq!(connection_mount(&conn).unwrap().mount_path, "/plx");
    }

    #[test]
    fn dedup_keeps_the_first_volume() {
        let volumes = dedup_volumes(vec![
            artifacts_context_volume(),
            shm_volume(),
            artifacts_context_volume(),
        ]);
        assert_eq!(volumes.len(), 2);
    }
}
