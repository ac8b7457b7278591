//! Kubernetes executor for compiled operations
//!
//! Drives `core.polyaxon.com/v1 Operation` objects (and their companion
//! Services) against the cluster. Create falls back to patch on conflict,
//! and deleting an already-vanished workload counts as success.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::{Api, DeleteParams, ListParams, LogParams, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use tracing::{debug, warn};

use polyaxon_common::{constants, Error, Result};
use polyaxon_compiler::CompiledResource;

/// Cluster-side operations the agent tick depends on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkloadExecutor: Send + Sync {
    /// Submit a compiled operation; conflicts turn into patches
    async fn apply(&self, compiled: &CompiledResource) -> Result<()>;

    /// Patch an existing operation with a recomputed spec
    async fn patch(&self, name: &str, compiled: &CompiledResource) -> Result<()>;

    /// Whether the operation object still exists
    async fn exists(&self, name: &str, namespace: &str) -> Result<bool>;

    /// Delete the operation object; a missing object is a success
    async fn delete(&self, name: &str, namespace: &str) -> Result<()>;

    /// Collect the main container logs of a run's pod
    async fn logs(&self, run_uuid: &str, namespace: &str) -> Result<String>;
}

/// [`WorkloadExecutor`] backed by a kube client
pub struct KubeExecutor {
    client: Client,
    resource: ApiResource,
}

impl KubeExecutor {
    pub fn new(client: Client) -> Self {
        let gvk = GroupVersionKind::gvk(
            constants::OPERATION_GROUP,
            constants::OPERATION_VERSION,
            constants::OPERATION_KIND,
        );
        Self {
            client,
            resource: ApiResource::from_gvk(&gvk),
        }
    }

    fn operations(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &self.resource)
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Submit one companion Service, falling back to patch on conflict
    async fn apply_service(&self, namespace: &str, service: &serde_json::Value) -> Result<()> {
        let name = name_of(service)?;
        let parsed: Service = serde_json::from_value(service.clone())
            .map_err(|e| Error::serialization_for_kind("Service", e.to_string()))?;
        let api = self.services(namespace);
        match api.create(&PostParams::default(), &parsed).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let err: Error = e.into();
                if err.is_conflict() {
                    api.patch(&name, &PatchParams::default(), &Patch::Merge(service))
                        .await?;
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }
}

#[async_trait]
impl WorkloadExecutor for KubeExecutor {
    async fn apply(&self, compiled: &CompiledResource) -> Result<()> {
        let name = name_of(&compiled.resource)?;
        let object = to_dynamic(&compiled.resource)?;
        let api = self.operations(&compiled.namespace);
        match api.create(&PostParams::default(), &object).await {
            Ok(_) => debug!(name = %name, namespace = %compiled.namespace, "operation created"),
            Err(e) => {
                let err: Error = e.into();
                if err.is_conflict() {
                    debug!(name = %name, "operation exists, patching instead");
                    api.patch(
                        &name,
                        &PatchParams::default(),
                        &Patch::Merge(&compiled.resource),
                    )
                    .await?;
                } else {
                    return Err(err);
                }
            }
        }
        for service in &compiled.services {
            self.apply_service(&compiled.namespace, service).await?;
        }
        Ok(())
    }

    async fn patch(&self, name: &str, compiled: &CompiledResource) -> Result<()> {
        self.operations(&compiled.namespace)
            .patch(
                name,
                &PatchParams::default(),
                &Patch::Merge(&compiled.resource),
            )
            .await?;
        for service in &compiled.services {
            self.apply_service(&compiled.namespace, service).await?;
        }
        Ok(())
    }

    async fn exists(&self, name: &str, namespace: &str) -> Result<bool> {
        match self.operations(namespace).get(name).await {
            Ok(_) => Ok(true),
            Err(e) => {
                let err: Error = e.into();
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn delete(&self, name: &str, namespace: &str) -> Result<()> {
        match self
            .operations(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                let err: Error = e.into();
                if err.is_not_found() {
                    warn!(name = %name, namespace = %namespace, "operation already gone");
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn logs(&self, run_uuid: &str, namespace: &str) -> Result<String> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let selector = format!("app.kubernetes.io/instance={run_uuid}");
        let pods = api
            .list(&ListParams::default().labels(&selector))
            .await?;
        let Some(pod) = pods.items.first().and_then(|p| p.metadata.name.clone()) else {
            debug!(run = %run_uuid, namespace = %namespace, "no pods left to read logs from");
            return Ok(String::new());
        };
        let params = LogParams {
            container: Some(constants::MAIN_CONTAINER.to_string()),
            timestamps: true,
            ..Default::default()
        };
        Ok(api.logs(&pod, &params).await?)
    }
}

/// Parse a compiled resource into a typed dynamic object
fn to_dynamic(resource: &serde_json::Value) -> Result<DynamicObject> {
    serde_json::from_value(resource.clone())
        .map_err(|e| Error::serialization_for_kind(constants::OPERATION_KIND, e.to_string()))
}

/// Read `metadata.name` off an object about to be submitted
fn name_of(resource: &serde_json::Value) -> Result<String> {
    resource
        .pointer("/metadata/name")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::internal("executor", "submitted object has no metadata.name"))
}
