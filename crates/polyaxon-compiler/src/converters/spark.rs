//! SparkApplication conversion: driver and executor replicas plus the
//! application-level knobs passed through verbatim.

use std::collections::BTreeMap;

use polyaxon_common::schemas::SparkJobRun;
use polyaxon_common::Result;

use super::{compile_replica, ConvertedOperation, ConverterContext};

pub fn convert(ctx: &ConverterContext<'_>, run: &SparkJobRun) -> Result<ConvertedOperation> {
    let mut spec = serde_json::Map::new();

    if let Some(spark_type) = &run.spark_type {
        spec.insert("type".to_string(), serde_json::json!(spark_type));
    }
    if let Some(version) = &run.spark_version {
        spec.insert("sparkVersion".to_string(), serde_json::json!(version));
    }
    if let Some(version) = &run.python_version {
        spec.insert("pythonVersion".to_string(), serde_json::json!(version));
    }
    if let Some(mode) = &run.deploy_mode {
        spec.insert("deployMode".to_string(), serde_json::json!(mode));
    }
    if let Some(class) = &run.main_class {
        spec.insert("mainClass".to_string(), serde_json::json!(class));
    }
    if let Some(file) = &run.main_application_file {
        spec.insert("mainApplicationFile".to_string(), serde_json::json!(file));
    }
    if !run.arguments.is_empty() {
        spec.insert("arguments".to_string(), serde_json::json!(run.arguments));
    }
    if !run.hadoop_conf.is_empty() {
        spec.insert("hadoopConf".to_string(), serde_json::json!(run.hadoop_conf));
    }
    if !run.spark_conf.is_empty() {
        spec.insert("sparkConf".to_string(), serde_json::json!(run.spark_conf));
    }
    if let Some(config_map) = &run.hadoop_config_map {
        spec.insert("hadoopConfigMap".to_string(), serde_json::json!(config_map));
    }
    if let Some(config_map) = &run.spark_config_map {
        spec.insert("sparkConfigMap".to_string(), serde_json::json!(config_map));
    }

    if let Some(driver) = &run.driver {
        spec.insert(
            "driver".to_string(),
            compile_replica(ctx, driver, &[], &BTreeMap::new())?,
        );
    }
    if let Some(executor) = &run.executor {
        spec.insert(
            "executor".to_string(),
            compile_replica(ctx, executor, &[], &BTreeMap::new())?,
        );
    }

    Ok(ConvertedOperation {
        spec_key: "sparkJobSpec",
        spec: serde_json::Value::Object(spec),
        services: vec![],
    })
}
