//! Connection and resource selection over the agent catalog
//!
//! Pure selection primitives: which secrets/config-maps a set of connections
//! pulls in, and which connections an operation actually references.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use polyaxon_common::schemas::{Connection, ConnectionResource, InitSpec};
use polyaxon_common::{Error, Result};

/// Deduplicated union of explicitly requested resources and every
/// secret/config-map attached to the given connections.
///
/// Requested resources come first, in input order; connection-attached
/// resources follow. On a name collision the requested resource wins.
pub fn resolve_requested_resources(
    connections: &[&Connection],
    resources: &[ConnectionResource],
) -> Vec<ConnectionResource> {
    let mut seen = BTreeSet::new();
    let mut resolved = Vec::new();

    for resource in resources.iter().filter(|r| r.is_requested) {
        if seen.insert(resource.name.clone()) {
            resolved.push(resource.clone());
        }
    }

    for connection in connections {
        for attached in [&connection.secret, &connection.config_map]
            .into_iter()
            .flatten()
        {
            if seen.insert(attached.name.clone()) {
                resolved.push(attached.clone());
            }
        }
    }

    resolved
}

/// Connections an operation references, in first-seen order.
///
/// The union of explicit `connections` names, `init[*].connection`
/// references, and the artifacts store. Every name must resolve against
/// `by_name`; unresolved names are collected and reported together.
pub fn resolve_requested_connections(
    connection_names: &[String],
    init: &[InitSpec],
    artifacts_store: Option<&Connection>,
    by_name: &BTreeMap<String, Connection>,
) -> Result<Vec<Connection>> {
    let mut seen = BTreeSet::new();
    let mut ordered_names = Vec::new();

    for name in connection_names {
        if seen.insert(name.clone()) {
            ordered_names.push(name.clone());
        }
    }
    for entry in init {
        if let Some(name) = &entry.connection {
            if seen.insert(name.clone()) {
                ordered_names.push(name.clone());
            }
        }
    }
    if let Some(store) = artifacts_store {
        if seen.insert(store.name.clone()) {
            ordered_names.push(store.name.clone());
        }
    }

    let missing: Vec<String> = ordered_names
        .iter()
        .filter(|name| !by_name.contains_key(*name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(Error::missing_connections(missing));
    }

    Ok(ordered_names
        .into_iter()
        .filter_map(|name| by_name.get(&name).cloned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyaxon_common::schemas::connection::{BucketSchema, ConnectionKind, ConnectionSchema};

    fn resource(name: &str, requested: bool) -> ConnectionResource {
        ConnectionResource {
            name: name.to_string(),
            items: vec![],
            mount_path: None,
            host_path: None,
            is_requested: requested,
        }
    }

    fn connection_with_secret(name: &str, secret: &str) -> Connection {
        Connection {
            name: name.to_string(),
            kind: ConnectionKind::S3,
            schema: Some(ConnectionSchema::Bucket(BucketSchema {
                bucket: format!("s3://{name}"),
            })),
            secret: Some(resource(secret, false)),
            config_map: None,
        }
    }

    #[test]
    fn requested_resources_come_first_and_win() {
        let conn = connection_with_secret("store", "creds");
        let requested = vec![resource("creds", true), resource("extra", true)];

        let resolved = resolve_requested_resources(&[&conn], &requested);
        let names: Vec<_> = resolved.iter().map(|r| r.name.as_str()).collect();

        assert_eq!(names, ["creds", "extra"]);
        assert!(resolved[0].is_requested);
    }

    #[test]
    fn attached_resources_follow_requested_ones() {
        let a = connection_with_secret("a", "a-creds");
        let b = connection_with_secret("b", "b-creds");
        let requested = vec![resource("x", true), resource("skipped", false)];

        let resolved = resolve_requested_resources(&[&a, &b], &requested);
        let names: Vec<_> = resolved.iter().map(|r| r.name.as_str()).collect();

        assert_eq!(names, ["x", "a-creds", "b-creds"]);
    }

    #[test]
    fn connections_resolve_in_first_seen_order() {
        let store = connection_with_secret("store", "store-creds");
        let data = connection_with_secret("data", "data-creds");
        let by_name: BTreeMap<_, _> = [
            ("store".to_string(), store.clone()),
            ("data".to_string(), data),
        ]
        .into();

        let init = vec![InitSpec {
            connection: Some("data".to_string()),
            ..Default::default()
        }];
        let resolved = resolve_requested_connections(
            &["data".to_string()],
            &init,
            Some(&store),
            &by_name,
        )
        .unwrap();
        let names: Vec<_> = resolved.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(names, ["data", "store"]);
    }

    #[test]
    fn missing_connections_are_reported_together() {
        let by_name = BTreeMap::new();
        let err = resolve_requested_connections(
            &["gcs-store".to_string(), "repo-creds".to_string()],
            &[],
            None,
            &by_name,
        )
        .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("gcs-store"));
        assert!(msg.contains("repo-creds"));
    }
}
