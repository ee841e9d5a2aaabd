//! Maps an effective manifest onto the stack configuration for its workload type.

use std::collections::BTreeMap;
use std::sync::Arc;

use wharf_manifest::{RequestDrivenWebService, WorkerService, WorkloadManifest};

use crate::alias::{check_app_version, AliasError, HostedZones};
use crate::app::{topic_arn, Application, Environment};
use crate::context::DeployContext;
use crate::custom_resources;
use crate::error::{DeployError, DeployResult};
use crate::ports::{ArtifactUploader, IdentityService, TopicLister, VersionGetter};
use crate::stack::{AppInformation, ResolvedSubscription, RuntimeConfig, StackConfiguration, StackKind};

/// Resolves stack configurations, running the per-type checks and side effects.
pub struct Resolver {
    versions: Arc<dyn VersionGetter>,
    identity: Arc<dyn IdentityService>,
    topics: Arc<dyn TopicLister>,
    uploader: Arc<dyn ArtifactUploader>,
}

impl Resolver {
    pub fn new(
        versions: Arc<dyn VersionGetter>,
        identity: Arc<dyn IdentityService>,
        topics: Arc<dyn TopicLister>,
        uploader: Arc<dyn ArtifactUploader>,
    ) -> Self {
        Self {
            versions,
            identity,
            topics,
            uploader,
        }
    }

    pub async fn resolve(
        &self,
        manifest: &WorkloadManifest,
        ctx: &DeployContext,
        runtime: RuntimeConfig,
    ) -> DeployResult<StackConfiguration> {
        let kind = match manifest {
            WorkloadManifest::LoadBalancedWebService(_) => self.load_balanced(manifest, ctx).await?,
            WorkloadManifest::BackendService(_) => StackKind::BackendService,
            WorkloadManifest::RequestDrivenWebService(svc) => self.request_driven(svc, ctx).await?,
            WorkloadManifest::WorkerService(svc) => self.worker(svc, &ctx.app, &ctx.env).await?,
            WorkloadManifest::ScheduledJob(job) => StackKind::ScheduledJob {
                schedule: job.on.schedule.clone(),
            },
        };

        let stack = StackConfiguration::new(&ctx.env.app, &ctx.env.name, manifest.clone(), kind, runtime);
        tracing::debug!(stack = %stack.stack_name, kind = %manifest.kind(), "resolved stack configuration");
        Ok(stack)
    }

    async fn load_balanced(&self, manifest: &WorkloadManifest, ctx: &DeployContext) -> DeployResult<StackKind> {
        let aliases = manifest.aliases();
        let Some(domain) = ctx.app.domain.as_deref().filter(|_| ctx.app.requires_dns_delegation()) else {
            return Ok(StackKind::LoadBalancedWebService { https: false, aliases });
        };

        if !aliases.is_empty() {
            self.check_alias_version(&ctx.app, &ctx.workload.name).await?;
            HostedZones::new(&ctx.env.name, &ctx.app.name, domain)?.check_load_balanced(&aliases)?;
        }
        Ok(StackKind::LoadBalancedWebService { https: true, aliases })
    }

    async fn request_driven(&self, svc: &RequestDrivenWebService, ctx: &DeployContext) -> DeployResult<StackKind> {
        let caller = self
            .identity
            .get()
            .await
            .map_err(|source| DeployError::Identity { source })?;
        let app_info = AppInformation {
            name: ctx.env.app.clone(),
            dns_name: ctx.app.domain.clone(),
            account_principal_arn: caller.root_user_arn,
        };

        let Some(alias) = svc.http.alias.as_deref().filter(|a| !a.is_empty()) else {
            return Ok(StackKind::RequestDrivenWebService {
                app_info,
                alias: None,
                custom_resource_urls: BTreeMap::new(),
            });
        };

        self.check_alias_version(&ctx.app, &ctx.workload.name).await?;
        let domain = ctx
            .app
            .domain
            .as_deref()
            .ok_or_else(|| AliasError::OutsideRootZone(alias.to_string()))?;
        HostedZones::new(&ctx.env.name, &ctx.app.name, domain)?.check_request_driven(alias)?;

        let bucket = &ctx.resources.get().await?.s3_bucket;
        let urls = custom_resources::upload_request_driven(self.uploader.as_ref(), bucket)
            .await
            .map_err(|source| DeployError::CustomResources {
                bucket: bucket.clone(),
                source,
            })?;

        Ok(StackKind::RequestDrivenWebService {
            app_info,
            alias: Some(alias.to_string()),
            custom_resource_urls: urls,
        })
    }

    async fn worker(&self, svc: &WorkerService, app: &Application, env: &Environment) -> DeployResult<StackKind> {
        let topics = self
            .topics
            .list_topics(&app.name, &env.name)
            .await
            .map_err(|source| DeployError::ListTopics {
                app: app.name.clone(),
                env: env.name.clone(),
                source,
            })?;
        let deployed: Vec<String> = topics.iter().map(|t| t.arn()).collect();

        let subscriptions = svc
            .subscribe
            .topics
            .iter()
            .map(|sub| {
                let service = sub.service.clone().unwrap_or_default();
                let topic = sub.name.clone().unwrap_or_default();
                let arn = topic_arn(&env.region, &app.account_id, &app.name, &env.name, &service, &topic);
                if !deployed.contains(&arn) {
                    return Err(DeployError::TopicNotFound {
                        arn,
                        env: env.name.clone(),
                    });
                }
                Ok(ResolvedSubscription {
                    dedicated_queue: sub.has_dedicated_queue(),
                    service,
                    topic,
                    topic_arn: arn,
                })
            })
            .collect::<DeployResult<Vec<_>>>()?;

        Ok(StackKind::WorkerService { subscriptions })
    }

    async fn check_alias_version(&self, app: &Application, workload: &str) -> DeployResult<()> {
        let version = self
            .versions
            .version(&app.name)
            .await
            .map_err(|source| DeployError::AppVersion {
                app: app.name.clone(),
                source,
            })?;

        if let Err(err) = check_app_version(&version) {
            tracing::error!(
                app = %app.name,
                workload,
                version = %version,
                "cannot deploy service {workload} because the application version is incompatible; run `wharf app upgrade` first"
            );
            return Err(err.into());
        }
        Ok(())
    }
}
