//! Per-deployment context shared by the pipeline stages.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::app::{AppRegionalResources, Application, Environment, WorkloadRecord};
use crate::error::{DeployError, DeployResult};
use crate::ports::AppResourcesGetter;

/// Application, environment and workload a deployment targets.
///
/// Built once after the manifest loads and never mutated afterwards.
pub struct DeployContext {
    pub app: Application,
    pub env: Environment,
    pub workload: WorkloadRecord,
    pub resources: RegionalResources,
}

impl DeployContext {
    pub fn new(
        app: Application,
        env: Environment,
        workload: WorkloadRecord,
        getter: Arc<dyn AppResourcesGetter>,
    ) -> Self {
        let resources = RegionalResources::new(getter, app.clone(), env.region.clone());
        Self {
            app,
            env,
            workload,
            resources,
        }
    }
}

/// Application resources in the environment's region, fetched at most once.
pub struct RegionalResources {
    getter: Arc<dyn AppResourcesGetter>,
    app: Application,
    region: String,
    cell: OnceCell<AppRegionalResources>,
}

impl RegionalResources {
    pub fn new(getter: Arc<dyn AppResourcesGetter>, app: Application, region: String) -> Self {
        Self {
            getter,
            app,
            region,
            cell: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> DeployResult<&AppRegionalResources> {
        self.cell
            .get_or_try_init(|| async {
                tracing::debug!(app = %self.app.name, region = %self.region, "fetching application regional resources");
                self.getter
                    .get_app_resources_by_region(&self.app, &self.region)
                    .await
                    .map_err(|source| DeployError::AppResources {
                        app: self.app.name.clone(),
                        region: self.region.clone(),
                        source,
                    })
            })
            .await
    }

    /// Repository URL for `workload` in this region.
    pub async fn repository_url(&self, workload: &str) -> DeployResult<&str> {
        let resources = self.get().await?;
        resources
            .repository_urls
            .get(workload)
            .map(String::as_str)
            .ok_or_else(|| DeployError::RepositoryNotFound {
                workload: workload.to_string(),
                region: self.region.clone(),
                account_id: self.app.account_id.clone(),
            })
    }
}
