//! Job (and auxiliary) conversion: a single pod template under the
//! `default` role of `jobSpec`.

use std::collections::BTreeMap;

use polyaxon_common::schemas::JobRun;
use polyaxon_common::Result;

use super::{compile_replica, ConvertedOperation, ConverterContext};

pub fn convert(ctx: &ConverterContext<'_>, run: &JobRun) -> Result<ConvertedOperation> {
    let replica = compile_replica(ctx, &run.replica, &[], &BTreeMap::new())?;
    Ok(ConvertedOperation {
        spec_key: "jobSpec",
        spec: serde_json::json!({
            "replicaSpec": {
                "default": replica,
            }
        }),
        services: vec![],
    })
}
