//! Collaborators backed by the local workspace.
//!
//! Records come from `wharf.toml`, manifests and addons from the workspace
//! tree, and artifacts and applied stacks are written under `.wharf/`.
//! Images are built and pushed with the `docker` CLI.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context as _, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use wharf_deploy::ports::{
    AddonsTemplater, AppResourcesGetter, ArtifactUploader, BuildArguments, ConfigStore, EndpointGetter,
    EnvironmentUpgrader, IdentityService, ImageBuilderPusher, ManifestReader, NamedBinary, ServiceUpdater,
    StackDeployError, StackDeployer, TopicLister, VersionGetter,
};
use wharf_deploy::{
    AppRegionalResources, Application, Caller, DeployedTopic, Environment, StackConfiguration, WorkloadRecord,
};
use wharf_manifest::WorkloadKind;

use crate::config::{WharfConfig, DEFAULT_APP_VERSION};

/// Directory holding artifacts and applied stacks.
pub const STATE_DIR: &str = ".wharf";

pub struct LocalBackend {
    root: PathBuf,
    config: WharfConfig,
}

impl LocalBackend {
    pub fn new(root: PathBuf, config: WharfConfig) -> Self {
        Self { root, config }
    }

    fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    fn stack_path(&self, stack_name: &str) -> PathBuf {
        self.state_dir().join("stacks").join(format!("{stack_name}.json"))
    }

    fn artifact_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.state_dir().join("artifacts").join(bucket).join(key)
    }

    fn manifest_path(&self, workload: &str) -> PathBuf {
        match self.config.services.get(workload).and_then(|s| s.manifest.as_deref()) {
            Some(path) => self.root.join(path),
            None => self.root.join(workload).join("manifest.yml"),
        }
    }

    fn check_app(&self, app: &str) -> Result<()> {
        if app != self.config.application.name {
            bail!("couldn't find application {app}");
        }
        Ok(())
    }
}

async fn write_file(path: &Path, content: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("write {}", path.display()))
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

#[async_trait]
impl ConfigStore for LocalBackend {
    async fn get_application(&self, app: &str) -> Result<Application> {
        self.check_app(app)?;
        Ok(self.config.app())
    }

    async fn get_environment(&self, app: &str, env: &str) -> Result<Environment> {
        self.check_app(app)?;
        let cfg = self
            .config
            .environments
            .get(env)
            .ok_or_else(|| anyhow!("couldn't find environment {env} in application {app}"))?;
        Ok(Environment {
            app: app.to_string(),
            name: env.to_string(),
            region: cfg.region.clone(),
            execution_role_arn: cfg.execution_role_arn.clone(),
            manager_role_arn: cfg.manager_role_arn.clone(),
        })
    }

    async fn get_service(&self, app: &str, name: &str) -> Result<WorkloadRecord> {
        self.check_app(app)?;
        let cfg = self
            .config
            .services
            .get(name)
            .ok_or_else(|| anyhow!("couldn't find service {name} in application {app}"))?;
        let kind = WorkloadKind::parse(&cfg.kind)
            .ok_or_else(|| anyhow!("service {name} has unknown type {:?}", cfg.kind))?;
        Ok(WorkloadRecord {
            app: app.to_string(),
            name: name.to_string(),
            kind,
        })
    }
}

#[async_trait]
impl ManifestReader for LocalBackend {
    async fn read_manifest(&self, workload: &str) -> Result<String> {
        let path = self.manifest_path(workload);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("read {}", path.display()))
    }

    fn workspace_root(&self) -> PathBuf {
        self.root.clone()
    }
}

#[async_trait]
impl ImageBuilderPusher for LocalBackend {
    async fn build_and_push(&self, args: &BuildArguments) -> Result<String> {
        let tags: Vec<String> = if args.tags.is_empty() {
            vec![format!("{}:latest", args.uri)]
        } else {
            args.tags.iter().map(|t| format!("{}:{}", args.uri, t)).collect()
        };

        let mut build = Command::new("docker");
        build.arg("build").arg("-f").arg(&args.dockerfile);
        for tag in &tags {
            build.arg("-t").arg(tag);
        }
        if let Some(platform) = &args.platform {
            build.arg("--platform").arg(platform);
        }
        if let Some(target) = &args.target {
            build.arg("--target").arg(target);
        }
        for image in &args.cache_from {
            build.arg("--cache-from").arg(image);
        }
        for (key, value) in &args.args {
            build.arg("--build-arg").arg(format!("{key}={value}"));
        }
        build.arg(&args.context);
        run_docker(build, "docker build").await?;

        for tag in &tags {
            let mut push = Command::new("docker");
            push.arg("push").arg(tag);
            run_docker(push, "docker push").await?;
        }

        let mut inspect = Command::new("docker");
        inspect
            .args(["inspect", "--format", "{{index .RepoDigests 0}}"])
            .arg(&tags[0]);
        let out = run_docker(inspect, "docker inspect").await?;
        parse_digest(&out).ok_or_else(|| anyhow!("no digest found for {}", tags[0]))
    }
}

async fn run_docker(mut cmd: Command, what: &str) -> Result<String> {
    tracing::debug!(command = ?cmd.as_std(), "running");
    let output = cmd
        .output()
        .await
        .with_context(|| format!("{what}: docker CLI not found"))?;
    if !output.status.success() {
        bail!("{what} failed: {}", String::from_utf8_lossy(&output.stderr).trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Digest from a `repo@sha256:...` reference.
fn parse_digest(repo_digest: &str) -> Option<String> {
    let (_, digest) = repo_digest.trim().rsplit_once('@')?;
    digest.starts_with("sha256:").then(|| digest.to_string())
}

#[async_trait]
impl ArtifactUploader for LocalBackend {
    async fn put_artifact(&self, bucket: &str, key: &str, body: String) -> Result<String> {
        let path = self.artifact_path(bucket, key);
        write_file(&path, body).await?;
        Ok(file_url(&path))
    }

    /// Files are stored unpacked in a directory named after the key.
    async fn zip_and_upload(&self, bucket: &str, key: &str, files: &[NamedBinary]) -> Result<String> {
        let dir = self.artifact_path(bucket, key);
        for file in files {
            write_file(&dir.join(&file.name), &file.content).await?;
        }
        Ok(file_url(&dir))
    }
}

#[async_trait]
impl AddonsTemplater for LocalBackend {
    async fn template(&self, workload: &str) -> Result<Option<String>> {
        let path = self.root.join(workload).join("addons").join("template.yml");
        match tokio::fs::read_to_string(&path).await {
            Ok(template) => Ok(Some(template)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("read {}", path.display())),
        }
    }
}

#[async_trait]
impl AppResourcesGetter for LocalBackend {
    async fn get_app_resources_by_region(&self, app: &Application, region: &str) -> Result<AppRegionalResources> {
        self.check_app(&app.name)?;
        let cfg = self
            .config
            .resources
            .get(region)
            .ok_or_else(|| anyhow!("no [resources.{region}] section in wharf.toml"))?;
        Ok(AppRegionalResources {
            region: region.to_string(),
            s3_bucket: cfg.s3_bucket.clone(),
            repository_urls: cfg.repository_urls.clone(),
        })
    }
}

#[async_trait]
impl EndpointGetter for LocalBackend {
    async fn service_discovery_endpoint(&self, app: &str, env: &str) -> Result<String> {
        Ok(format!("{env}.{app}.local"))
    }
}

#[async_trait]
impl EnvironmentUpgrader for LocalBackend {
    async fn upgrade(&self, app: &str, env: &str) -> Result<()> {
        self.check_app(app)?;
        if !self.config.environments.contains_key(env) {
            bail!("couldn't find environment {env}");
        }
        tracing::debug!(app, env, "environment is up to date");
        Ok(())
    }
}

#[async_trait]
impl StackDeployer for LocalBackend {
    async fn deploy_stack(&self, stack: &StackConfiguration, _role_arn: Option<&str>) -> Result<(), StackDeployError> {
        let rendered = stack.render().context("render stack")?;
        let path = self.stack_path(&stack.stack_name);

        if let Ok(previous) = tokio::fs::read_to_string(&path).await {
            if previous == rendered {
                return Err(StackDeployError::EmptyChangeSet {
                    stack: stack.stack_name.clone(),
                });
            }
        }
        write_file(&path, rendered).await?;
        tracing::debug!(stack = %stack.stack_name, path = %path.display(), "applied stack");
        Ok(())
    }
}

#[async_trait]
impl ServiceUpdater for LocalBackend {
    async fn force_update_service(&self, app: &str, env: &str, workload: &str) -> Result<()> {
        let stack_name = wharf_deploy::stack_name(app, env, workload);
        let path = self.state_dir().join("stacks").join(format!("{stack_name}.restarted"));
        write_file(&path, Utc::now().to_rfc3339()).await
    }
}

#[async_trait]
impl TopicLister for LocalBackend {
    async fn list_topics(&self, app: &str, env: &str) -> Result<Vec<DeployedTopic>> {
        self.check_app(app)?;
        let region = self
            .config
            .environments
            .get(env)
            .map(|e| e.region.clone())
            .ok_or_else(|| anyhow!("couldn't find environment {env}"))?;
        Ok(self
            .config
            .topics
            .iter()
            .filter(|t| t.env == env)
            .map(|t| DeployedTopic {
                app: app.to_string(),
                env: env.to_string(),
                workload: t.workload.clone(),
                name: t.name.clone(),
                region: region.clone(),
                account_id: self.config.application.account_id.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl VersionGetter for LocalBackend {
    async fn version(&self, app: &str) -> Result<String> {
        self.check_app(app)?;
        Ok(self
            .config
            .application
            .version
            .clone()
            .unwrap_or_else(|| DEFAULT_APP_VERSION.to_string()))
    }
}

#[async_trait]
impl IdentityService for LocalBackend {
    async fn get(&self) -> Result<Caller> {
        let account = self.config.application.account_id.clone();
        let root_user_arn = self
            .config
            .identity
            .root_user_arn
            .clone()
            .unwrap_or_else(|| format!("arn:aws:iam::{account}:root"));
        Ok(Caller { account, root_user_arn })
    }
}
