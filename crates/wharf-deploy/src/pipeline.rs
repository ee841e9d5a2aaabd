//! The deployment pipeline.
//!
//! Stages run in a fixed order and each one is awaited before the next:
//!
//! 1. Load the manifest, apply the environment override and validate it
//! 2. Resolve the application, environment and workload records
//! 3. Upgrade the environment
//! 4. Build and push the image, for locally built workloads
//! 5. Upload the addons template, when the workload has addons
//! 6. Resolve the stack configuration
//! 7. Apply it, falling back to a forced update on an empty change set

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use wharf_manifest::{Validate, WorkloadManifest};

use crate::app::{merge_tags, Tags};
use crate::context::DeployContext;
use crate::error::{DeployError, DeployResult};
use crate::ports::{
    AddonsTemplater, AppResourcesGetter, ArtifactUploader, BuildArguments, ConfigStore, EndpointGetter,
    EnvironmentUpgrader, IdentityService, ImageBuilderPusher, ManifestReader, ServiceUpdater, StackDeployError,
    StackDeployer, TopicLister, VersionGetter,
};
use crate::recommend::recommended_actions;
use crate::resolver::Resolver;
use crate::stack::{RepositoryImage, RuntimeConfig, StackConfiguration};

/// Object key of a workload's addons template.
pub fn addons_template_key(workload: &str) -> String {
    format!("manual/addons/{workload}.yml")
}

/// Everything the pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ConfigStore>,
    pub manifests: Arc<dyn ManifestReader>,
    pub images: Arc<dyn ImageBuilderPusher>,
    pub uploader: Arc<dyn ArtifactUploader>,
    pub addons: Arc<dyn AddonsTemplater>,
    pub app_resources: Arc<dyn AppResourcesGetter>,
    pub endpoints: Arc<dyn EndpointGetter>,
    pub env_upgrader: Arc<dyn EnvironmentUpgrader>,
    pub stacks: Arc<dyn StackDeployer>,
    pub service_updater: Arc<dyn ServiceUpdater>,
    pub topics: Arc<dyn TopicLister>,
    pub versions: Arc<dyn VersionGetter>,
    pub identity: Arc<dyn IdentityService>,
}

/// What to deploy and where.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    pub app: String,
    pub env: String,
    pub name: String,
    pub image_tag: Option<String>,
    pub resource_tags: Tags,
    /// Restart the workload even when its stack has no changes.
    pub force: bool,
}

/// Pipeline stage, used to label log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStage {
    LoadManifest,
    ResolveContext,
    UpgradeEnvironment,
    BuildAndPush,
    UploadAddons,
    ResolveStack,
    Apply,
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoadManifest => "load_manifest",
            Self::ResolveContext => "resolve_context",
            Self::UpgradeEnvironment => "upgrade_environment",
            Self::BuildAndPush => "build_and_push",
            Self::UploadAddons => "upload_addons",
            Self::ResolveStack => "resolve_stack",
            Self::Apply => "apply",
        };
        f.write_str(name)
    }
}

/// How the stack ended up after a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployOutcome {
    /// The change set was applied.
    Deployed,
    /// Nothing changed, and the workload was restarted on request.
    ForceUpdated,
    /// Nothing changed and no update was forced.
    NoChanges,
}

/// Result of a successful deployment.
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub outcome: DeployOutcome,
    pub app: String,
    pub env: String,
    pub workload: String,
    pub stack_name: String,
    pub image: Option<RepositoryImage>,
    pub addons_template_url: Option<String>,
    pub recommendations: Vec<String>,
    pub finished_at: DateTime<Utc>,
}

/// Read, override and validate the manifest of `workload` for `env`.
pub async fn load_manifest(reader: &dyn ManifestReader, workload: &str, env: &str) -> DeployResult<WorkloadManifest> {
    let raw = reader
        .read_manifest(workload)
        .await
        .map_err(|source| DeployError::ReadManifest {
            workload: workload.to_string(),
            source,
        })?;
    let manifest = WorkloadManifest::from_yaml(&raw).map_err(|source| DeployError::Unmarshal {
        workload: workload.to_string(),
        source,
    })?;
    let effective = manifest
        .apply_env(env)
        .map_err(|source| DeployError::ApplyOverride {
            env: env.to_string(),
            source,
        })?;
    effective.validate().map_err(|source| DeployError::Validation {
        env: env.to_string(),
        source,
    })?;
    Ok(effective)
}

/// Deploys one workload to one environment.
pub struct DeployPipeline {
    collaborators: Collaborators,
    resolver: Resolver,
}

impl DeployPipeline {
    pub fn new(collaborators: Collaborators) -> Self {
        let resolver = Resolver::new(
            collaborators.versions.clone(),
            collaborators.identity.clone(),
            collaborators.topics.clone(),
            collaborators.uploader.clone(),
        );
        Self {
            collaborators,
            resolver,
        }
    }

    pub async fn deploy(&self, opts: &DeployOptions) -> DeployResult<DeployReport> {
        let c = &self.collaborators;

        stage(DeployStage::LoadManifest, opts);
        let manifest = load_manifest(c.manifests.as_ref(), &opts.name, &opts.env).await?;

        stage(DeployStage::ResolveContext, opts);
        let ctx = self.resolve_context(opts).await?;
        if ctx.workload.kind != manifest.kind() {
            return Err(DeployError::KindMismatch {
                workload: opts.name.clone(),
                declared: manifest.kind().to_string(),
                registered: ctx.workload.kind.to_string(),
            });
        }

        stage(DeployStage::UpgradeEnvironment, opts);
        c.env_upgrader
            .upgrade(&opts.app, &ctx.env.name)
            .await
            .map_err(|source| DeployError::EnvironmentUpgrade {
                app: opts.app.clone(),
                env: ctx.env.name.clone(),
                source,
            })?;

        let image = if manifest.requires_build() {
            stage(DeployStage::BuildAndPush, opts);
            Some(self.build_and_push(&manifest, &ctx, opts).await?)
        } else {
            None
        };

        stage(DeployStage::UploadAddons, opts);
        let addons_template_url = self.upload_addons(&ctx, &opts.name).await?;

        stage(DeployStage::ResolveStack, opts);
        let runtime = self
            .runtime_config(&ctx, opts, addons_template_url.clone(), image.clone())
            .await?;
        let stack = self.resolver.resolve(&manifest, &ctx, runtime).await?;

        stage(DeployStage::Apply, opts);
        let outcome = self.apply(&stack, &ctx, opts).await?;

        let report = DeployReport {
            outcome,
            app: opts.app.clone(),
            env: opts.env.clone(),
            workload: opts.name.clone(),
            stack_name: stack.stack_name.clone(),
            image,
            addons_template_url,
            recommendations: recommended_actions(&stack),
            finished_at: Utc::now(),
        };
        tracing::info!(
            app = %report.app,
            env = %report.env,
            workload = %report.workload,
            stack = %report.stack_name,
            outcome = ?report.outcome,
            "deployment finished"
        );
        Ok(report)
    }

    async fn resolve_context(&self, opts: &DeployOptions) -> DeployResult<DeployContext> {
        let store = &self.collaborators.store;
        let env = store
            .get_environment(&opts.app, &opts.env)
            .await
            .map_err(|source| DeployError::Environment {
                app: opts.app.clone(),
                env: opts.env.clone(),
                source,
            })?;
        let app = store
            .get_application(&opts.app)
            .await
            .map_err(|source| DeployError::Application {
                app: opts.app.clone(),
                source,
            })?;
        let workload = store
            .get_service(&opts.app, &opts.name)
            .await
            .map_err(|source| DeployError::Service { source })?;

        Ok(DeployContext::new(
            app,
            env,
            workload,
            self.collaborators.app_resources.clone(),
        ))
    }

    async fn build_and_push(
        &self,
        manifest: &WorkloadManifest,
        ctx: &DeployContext,
        opts: &DeployOptions,
    ) -> DeployResult<RepositoryImage> {
        let repo_url = ctx.resources.repository_url(&opts.name).await?.to_string();
        let root = self.collaborators.manifests.workspace_root();
        let Some(build) = manifest.build_args(&root) else {
            return Err(DeployError::Build {
                source: anyhow::anyhow!("{} has no build configuration", opts.name),
            });
        };

        let args = BuildArguments {
            uri: repo_url.clone(),
            dockerfile: build.dockerfile,
            context: build.context,
            args: build.args,
            target: build.target,
            cache_from: build.cache_from,
            platform: manifest.task_platform(),
            tags: opts.image_tag.iter().cloned().collect(),
        };
        let digest = self
            .collaborators
            .images
            .build_and_push(&args)
            .await
            .map_err(|source| DeployError::Build { source })?;

        tracing::info!(workload = %opts.name, digest = %digest, "pushed image");
        Ok(RepositoryImage {
            repo_url,
            image_tag: opts.image_tag.clone(),
            digest,
        })
    }

    async fn upload_addons(&self, ctx: &DeployContext, workload: &str) -> DeployResult<Option<String>> {
        let template = self
            .collaborators
            .addons
            .template(workload)
            .await
            .map_err(|source| DeployError::AddonsTemplate { source })?;
        let Some(template) = template else {
            tracing::debug!(workload, "no addons to upload");
            return Ok(None);
        };

        let bucket = &ctx.resources.get().await?.s3_bucket;
        let url = self
            .collaborators
            .uploader
            .put_artifact(bucket, &addons_template_key(workload), template)
            .await
            .map_err(|source| DeployError::Upload {
                bucket: bucket.clone(),
                source,
            })?;
        Ok(Some(url))
    }

    async fn runtime_config(
        &self,
        ctx: &DeployContext,
        opts: &DeployOptions,
        addons_template_url: Option<String>,
        image: Option<RepositoryImage>,
    ) -> DeployResult<RuntimeConfig> {
        let endpoint = self
            .collaborators
            .endpoints
            .service_discovery_endpoint(&ctx.env.app, &ctx.env.name)
            .await
            .map_err(|source| DeployError::Endpoint {
                env: ctx.env.name.clone(),
                source,
            })?;

        Ok(RuntimeConfig {
            addons_template_url,
            additional_tags: merge_tags(&ctx.app.tags, &opts.resource_tags),
            service_discovery_endpoint: endpoint,
            account_id: ctx.app.account_id.clone(),
            region: ctx.env.region.clone(),
            image,
        })
    }

    async fn apply(
        &self,
        stack: &StackConfiguration,
        ctx: &DeployContext,
        opts: &DeployOptions,
    ) -> DeployResult<DeployOutcome> {
        let role_arn = ctx.env.execution_role_arn.as_deref();
        match self.collaborators.stacks.deploy_stack(stack, role_arn).await {
            Ok(()) => Ok(DeployOutcome::Deployed),
            Err(StackDeployError::EmptyChangeSet { .. }) if opts.force => self.force_update(opts).await,
            Err(StackDeployError::EmptyChangeSet { stack }) => {
                tracing::warn!(stack = %stack, workload = %opts.name, "no changes to deploy; set --force to force an update for the service");
                Ok(DeployOutcome::NoChanges)
            }
            Err(StackDeployError::Failed(source)) => Err(DeployError::StackDeployment {
                workload: opts.name.clone(),
                source,
            }),
        }
    }

    async fn force_update(&self, opts: &DeployOptions) -> DeployResult<DeployOutcome> {
        tracing::info!(workload = %opts.name, env = %opts.env, "forcing an update for the service");
        self.collaborators
            .service_updater
            .force_update_service(&opts.app, &opts.env, &opts.name)
            .await
            .map_err(|source| DeployError::ForceUpdate {
                workload: opts.name.clone(),
                env: opts.env.clone(),
                source,
            })?;
        Ok(DeployOutcome::ForceUpdated)
    }
}

fn stage(stage: DeployStage, opts: &DeployOptions) {
    tracing::debug!(stage = %stage, app = %opts.app, env = %opts.env, workload = %opts.name, "starting stage");
}
