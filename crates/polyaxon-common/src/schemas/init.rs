//! Init entries resolved into init containers
//!
//! Each entry is one of: a connection reference with an optional artifacts
//! selection, a git override, a dockerfile generator, a tensorboard
//! pre-download, or a raw container. An inline `container` overrides
//! image/command/args/env/resources on the auto-generated init.

use k8s_openapi::api::core::v1::Container;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::connection::GitSchema;

/// One file or directory to initialize, optionally renamed on copy
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(untagged)]
pub enum ArtifactsSelector {
    /// Copy the path as-is
    Path(String),
    /// Copy `[from, to]`
    FromTo([String; 2]),
}

impl ArtifactsSelector {
    /// Source path of the selection
    pub fn from_path(&self) -> &str {
        match self {
            Self::Path(p) => p,
            Self::FromTo([from, _]) => from,
        }
    }

    /// Destination subpath of the selection
    pub fn to_path(&self) -> &str {
        match self {
            Self::Path(p) => p,
            Self::FromTo([_, to]) => to,
        }
    }
}

/// Files and directories an init entry pulls from a connection
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactsRefs {
    /// Individual files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<ArtifactsSelector>,

    /// Directories; empty means the entire store
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dirs: Vec<ArtifactsSelector>,
}

impl ArtifactsRefs {
    /// True when neither files nor dirs are selected
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }
}

/// Dockerfile generator init spec.
///
/// The generated init container writes a Dockerfile into `workdir`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerfileSpec {
    /// Base image of the generated Dockerfile
    pub image: String,

    /// ENV directives
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Paths appended to PATH
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,

    /// COPY pairs applied before RUN
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub copy: Vec<ArtifactsSelector>,

    /// RUN directives
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub run: Vec<String>,

    /// COPY pairs applied after all RUN directives
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_run_copy: Vec<ArtifactsSelector>,

    /// Locale applied to LANG/LC_ALL/LANGUAGE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang_env: Option<String>,

    /// UID of the user created inside the image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,

    /// GID of the user created inside the image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<i64>,

    /// Username of the user created inside the image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Output filename (defaults to `Dockerfile`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Directory the Dockerfile is written into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,

    /// Final SHELL directive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
}

/// Tensorboard pre-download init spec
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TensorboardSpec {
    /// Port tensorboard will serve on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,

    /// Run UUIDs (or names when `use_names`) whose event files to download
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uuids: Vec<String>,

    /// Treat `uuids` as run names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_names: Option<bool>,

    /// Path prefix for the event files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,

    /// Tensorboard plugins to enable
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<String>,
}

/// One init entry of a replica
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitSpec {
    /// Connection the init pulls from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,

    /// Git override; may also be used standalone with a full url
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSchema>,

    /// Artifacts selection pulled from the connection or the artifacts store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactsRefs>,

    /// Dockerfile generator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<DockerfileSpec>,

    /// Tensorboard pre-download
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tensorboard: Option<TensorboardSpec>,

    /// Raw container, or overrides applied to the generated init
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::replica::container_opt"
    )]
    pub container: Option<Container>,

    /// Context path the init populates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl InitSpec {
    /// True when the entry only carries a raw container
    pub fn is_custom(&self) -> bool {
        self.container.is_some()
            && self.connection.is_none()
            && self.git.is_none()
            && self.artifacts.is_none()
            && self.dockerfile.is_none()
            && self.tensorboard.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_paths() {
        let s = ArtifactsSelector::Path("data/train.csv".to_string());
        assert_eq!(s.from_path(), "data/train.csv");
        assert_eq!(s.to_path(), "data/train.csv");

        let s = ArtifactsSelector::FromTo(["raw/x.csv".to_string(), "x.csv".to_string()]);
        assert_eq!(s.from_path(), "raw/x.csv");
        assert_eq!(s.to_path(), "x.csv");
    }

    #[test]
    fn selector_deserializes_both_shapes() {
        let refs: ArtifactsRefs = serde_json::from_value(serde_json::json!({
            "files": ["a.txt", ["b.txt", "renamed.txt"]],
            "dirs": ["models"]
        }))
        .unwrap();
        assert_eq!(refs.files.len(), 2);
        assert_eq!(refs.files[1].to_path(), "renamed.txt");
        assert!(!refs.is_empty());
    }

    #[test]
    fn custom_init_detection() {
        let init = InitSpec {
            container: Some(Default::default()),
            ..Default::default()
        };
        assert!(init.is_custom());

        let init = InitSpec {
            connection: Some("store".to_string()),
            container: Some(Default::default()),
            ..Default::default()
        };
        assert!(!init.is_custom());
    }
}
