//! Pipeline tests against in-memory collaborators.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use wharf_deploy::ports::*;
use wharf_deploy::*;
use wharf_manifest::WorkloadKind;

const LB_MANIFEST: &str = r#"
name: api
type: Load Balanced Web Service
image:
  build: api/Dockerfile
  port: 8080
http:
  path: /
cpu: 256
memory: 512
count: 1
environments:
  test:
    http:
      alias: v1.test.shop.example.com
"#;

const BACKEND_MANIFEST: &str = r#"
name: api
type: Backend Service
image:
  location: nginx:latest
  port: 80
"#;

const RD_MANIFEST: &str = r#"
name: api
type: Request-Driven Web Service
image:
  location: example/web:latest
  port: 8080
http:
  alias: web.example.com
"#;

const WORKER_MANIFEST: &str = r#"
name: api
type: Worker Service
image:
  location: example/worker:latest
subscribe:
  topics:
    - name: created
      service: orders
      queue: true
    - name: deleted
      service: users
"#;

const JOB_MANIFEST: &str = r#"
name: api
type: Scheduled Job
image:
  location: example/report:latest
on:
  schedule: "@daily"
"#;

#[derive(Debug, Clone, Copy, PartialEq)]
enum ApplyBehavior {
    Succeed,
    EmptyChangeSet,
    Fail,
}

struct FakeCloud {
    manifest: String,
    kind: WorkloadKind,
    app: Application,
    env: Environment,
    resources: AppRegionalResources,
    addons: Option<String>,
    topics: Vec<DeployedTopic>,
    version: String,
    apply: ApplyBehavior,
    force_fails: bool,
    calls: Mutex<Vec<String>>,
    resource_fetches: AtomicUsize,
    stacks: Mutex<Vec<StackConfiguration>>,
    builds: Mutex<Vec<BuildArguments>>,
    uploads: Mutex<Vec<String>>,
}

impl FakeCloud {
    fn new(kind: WorkloadKind, manifest: &str) -> Self {
        let app = Application {
            name: "shop".into(),
            account_id: "123456789012".into(),
            domain: Some("example.com".into()),
            tags: [("team".to_string(), "web".to_string())].into_iter().collect(),
        };
        let env = Environment {
            app: "shop".into(),
            name: "test".into(),
            region: "us-west-2".into(),
            execution_role_arn: Some("arn:aws:iam::123456789012:role/shop-test-CFNExecutionRole".into()),
            manager_role_arn: None,
        };
        let resources = AppRegionalResources {
            region: "us-west-2".into(),
            s3_bucket: "shop-artifacts".into(),
            repository_urls: [(
                "api".to_string(),
                "123456789012.dkr.ecr.us-west-2.amazonaws.com/shop/api".to_string(),
            )]
            .into_iter()
            .collect(),
        };
        Self {
            manifest: manifest.to_string(),
            kind,
            app,
            env,
            resources,
            addons: None,
            topics: Vec::new(),
            version: "v1.2.0".into(),
            apply: ApplyBehavior::Succeed,
            force_fails: false,
            calls: Mutex::new(Vec::new()),
            resource_fetches: AtomicUsize::new(0),
            stacks: Mutex::new(Vec::new()),
            builds: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn last_stack(&self) -> StackConfiguration {
        self.stacks.lock().unwrap().last().cloned().expect("no stack deployed")
    }

    fn topic(&self, workload: &str, name: &str) -> DeployedTopic {
        DeployedTopic {
            app: self.app.name.clone(),
            env: self.env.name.clone(),
            workload: workload.into(),
            name: name.into(),
            region: self.env.region.clone(),
            account_id: self.app.account_id.clone(),
        }
    }
}

#[async_trait]
impl ConfigStore for FakeCloud {
    async fn get_application(&self, app: &str) -> anyhow::Result<Application> {
        self.record("get_application");
        anyhow::ensure!(app == self.app.name, "couldn't find application {app}");
        Ok(self.app.clone())
    }

    async fn get_environment(&self, _app: &str, env: &str) -> anyhow::Result<Environment> {
        self.record("get_environment");
        anyhow::ensure!(env == self.env.name, "couldn't find environment {env}");
        Ok(self.env.clone())
    }

    async fn get_service(&self, app: &str, name: &str) -> anyhow::Result<WorkloadRecord> {
        self.record("get_service");
        Ok(WorkloadRecord {
            app: app.into(),
            name: name.into(),
            kind: self.kind,
        })
    }
}

#[async_trait]
impl ManifestReader for FakeCloud {
    async fn read_manifest(&self, workload: &str) -> anyhow::Result<String> {
        anyhow::ensure!(workload == "api", "manifest for {workload} not found");
        Ok(self.manifest.clone())
    }

    fn workspace_root(&self) -> PathBuf {
        PathBuf::from("/workspace")
    }
}

#[async_trait]
impl ImageBuilderPusher for FakeCloud {
    async fn build_and_push(&self, args: &BuildArguments) -> anyhow::Result<String> {
        self.record("build_and_push");
        self.builds.lock().unwrap().push(args.clone());
        Ok("sha256:741d3e95eefa2c3b594f970a938ed6e497b50b3541a5fdc28af3ad8959e76b49".into())
    }
}

#[async_trait]
impl ArtifactUploader for FakeCloud {
    async fn put_artifact(&self, bucket: &str, key: &str, _body: String) -> anyhow::Result<String> {
        self.record("put_artifact");
        self.uploads.lock().unwrap().push(key.to_string());
        Ok(format!("https://{bucket}.s3.us-west-2.amazonaws.com/{key}"))
    }

    async fn zip_and_upload(&self, bucket: &str, key: &str, files: &[NamedBinary]) -> anyhow::Result<String> {
        self.record("zip_and_upload");
        anyhow::ensure!(!files.is_empty(), "nothing to zip");
        self.uploads.lock().unwrap().push(key.to_string());
        Ok(format!("https://{bucket}.s3.us-west-2.amazonaws.com/{key}"))
    }
}

#[async_trait]
impl AddonsTemplater for FakeCloud {
    async fn template(&self, _workload: &str) -> anyhow::Result<Option<String>> {
        Ok(self.addons.clone())
    }
}

#[async_trait]
impl AppResourcesGetter for FakeCloud {
    async fn get_app_resources_by_region(
        &self,
        _app: &Application,
        _region: &str,
    ) -> anyhow::Result<AppRegionalResources> {
        self.resource_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.resources.clone())
    }
}

#[async_trait]
impl EndpointGetter for FakeCloud {
    async fn service_discovery_endpoint(&self, app: &str, env: &str) -> anyhow::Result<String> {
        Ok(format!("{env}.{app}.local"))
    }
}

#[async_trait]
impl EnvironmentUpgrader for FakeCloud {
    async fn upgrade(&self, _app: &str, _env: &str) -> anyhow::Result<()> {
        self.record("upgrade_environment");
        Ok(())
    }
}

#[async_trait]
impl StackDeployer for FakeCloud {
    async fn deploy_stack(
        &self,
        stack: &StackConfiguration,
        role_arn: Option<&str>,
    ) -> Result<(), StackDeployError> {
        self.record("deploy_stack");
        assert_eq!(role_arn, self.env.execution_role_arn.as_deref());
        self.stacks.lock().unwrap().push(stack.clone());
        match self.apply {
            ApplyBehavior::Succeed => Ok(()),
            ApplyBehavior::EmptyChangeSet => Err(StackDeployError::EmptyChangeSet {
                stack: stack.stack_name.clone(),
            }),
            ApplyBehavior::Fail => Err(anyhow::anyhow!("stack {} is in UPDATE_IN_PROGRESS", stack.stack_name).into()),
        }
    }
}

#[async_trait]
impl ServiceUpdater for FakeCloud {
    async fn force_update_service(&self, _app: &str, _env: &str, _workload: &str) -> anyhow::Result<()> {
        self.record("force_update");
        anyhow::ensure!(!self.force_fails, "wait for service to stabilize: timed out");
        Ok(())
    }
}

#[async_trait]
impl TopicLister for FakeCloud {
    async fn list_topics(&self, _app: &str, _env: &str) -> anyhow::Result<Vec<DeployedTopic>> {
        Ok(self.topics.clone())
    }
}

#[async_trait]
impl VersionGetter for FakeCloud {
    async fn version(&self, _app: &str) -> anyhow::Result<String> {
        self.record("app_version");
        Ok(self.version.clone())
    }
}

#[async_trait]
impl IdentityService for FakeCloud {
    async fn get(&self) -> anyhow::Result<Caller> {
        Ok(Caller {
            account: "123456789012".into(),
            root_user_arn: "arn:aws:iam::123456789012:root".into(),
        })
    }
}

fn pipeline(cloud: &Arc<FakeCloud>) -> DeployPipeline {
    DeployPipeline::new(Collaborators {
        store: cloud.clone(),
        manifests: cloud.clone(),
        images: cloud.clone(),
        uploader: cloud.clone(),
        addons: cloud.clone(),
        app_resources: cloud.clone(),
        endpoints: cloud.clone(),
        env_upgrader: cloud.clone(),
        stacks: cloud.clone(),
        service_updater: cloud.clone(),
        topics: cloud.clone(),
        versions: cloud.clone(),
        identity: cloud.clone(),
    })
}

fn options() -> DeployOptions {
    DeployOptions {
        app: "shop".into(),
        env: "test".into(),
        name: "api".into(),
        image_tag: Some("abc1234".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_load_balanced_build_and_deploy() {
    let cloud = Arc::new(FakeCloud::new(WorkloadKind::LoadBalancedWebService, LB_MANIFEST));
    let mut opts = options();
    opts.resource_tags = [("team".to_string(), "checkout".to_string())].into_iter().collect();

    let report = pipeline(&cloud).deploy(&opts).await.unwrap();

    assert_eq!(report.outcome, DeployOutcome::Deployed);
    assert_eq!(report.stack_name, "shop-test-api");
    assert_eq!(
        cloud.calls(),
        vec![
            "get_environment",
            "get_application",
            "get_service",
            "upgrade_environment",
            "build_and_push",
            "app_version",
            "deploy_stack",
        ]
    );

    let builds = cloud.builds.lock().unwrap().clone();
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].dockerfile, PathBuf::from("/workspace/api/Dockerfile"));
    assert_eq!(builds[0].context, PathBuf::from("/workspace/api"));
    assert_eq!(builds[0].tags, vec!["abc1234"]);
    assert_eq!(builds[0].uri, "123456789012.dkr.ecr.us-west-2.amazonaws.com/shop/api");

    let stack = cloud.last_stack();
    assert_eq!(
        stack.kind,
        StackKind::LoadBalancedWebService {
            https: true,
            aliases: vec!["v1.test.shop.example.com".into()],
        }
    );
    assert_eq!(stack.runtime.additional_tags["team"], "checkout");
    assert_eq!(stack.runtime.service_discovery_endpoint, "test.shop.local");
    let image = stack.runtime.image.expect("built image");
    assert_eq!(image.image_tag.as_deref(), Some("abc1234"));
    assert!(image.digest.starts_with("sha256:"));
    assert!(report.recommendations.is_empty());
}

#[tokio::test]
async fn test_invalid_manifest_stops_before_any_collaborator() {
    let raw = "name: api\ntype: Backend Service\nimage:\n  build: Dockerfile\n  location: nginx\n";
    let cloud = Arc::new(FakeCloud::new(WorkloadKind::BackendService, raw));

    let err = pipeline(&cloud).deploy(&options()).await.unwrap_err();

    assert!(cloud.calls().is_empty());
    assert_eq!(err.to_string(), "validate manifest against environment test");
    let validation = err.validation().expect("validation error");
    assert_eq!(
        validation.to_string(),
        "validate \"image\": must specify one of \"build\" and \"location\""
    );
}

#[tokio::test]
async fn test_prebuilt_image_skips_build() {
    let cloud = Arc::new(FakeCloud::new(WorkloadKind::BackendService, BACKEND_MANIFEST));

    let report = pipeline(&cloud).deploy(&options()).await.unwrap();

    assert!(!cloud.calls().contains(&"build_and_push".to_string()));
    assert!(report.image.is_none());
    assert_eq!(cloud.last_stack().kind, StackKind::BackendService);
    assert_eq!(cloud.resource_fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_addons_uploaded_and_resources_fetched_once() {
    let mut cloud = FakeCloud::new(WorkloadKind::LoadBalancedWebService, LB_MANIFEST);
    cloud.addons = Some("Resources: {}\n".into());
    let cloud = Arc::new(cloud);

    let report = pipeline(&cloud).deploy(&options()).await.unwrap();

    assert_eq!(cloud.uploads.lock().unwrap().clone(), vec!["manual/addons/api.yml"]);
    assert_eq!(
        report.addons_template_url.as_deref(),
        Some("https://shop-artifacts.s3.us-west-2.amazonaws.com/manual/addons/api.yml")
    );
    assert_eq!(cloud.last_stack().runtime.addons_template_url, report.addons_template_url);
    assert_eq!(cloud.resource_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_repository() {
    let mut cloud = FakeCloud::new(WorkloadKind::LoadBalancedWebService, LB_MANIFEST);
    cloud.resources.repository_urls.clear();
    let cloud = Arc::new(cloud);

    let err = pipeline(&cloud).deploy(&options()).await.unwrap_err();

    assert!(matches!(
        err,
        DeployError::RepositoryNotFound { ref workload, ref region, ref account_id }
            if workload == "api" && region == "us-west-2" && account_id == "123456789012"
    ));
    assert!(!cloud.calls().contains(&"deploy_stack".to_string()));
}

#[tokio::test]
async fn test_empty_change_set_without_force_warns() {
    let mut cloud = FakeCloud::new(WorkloadKind::BackendService, BACKEND_MANIFEST);
    cloud.apply = ApplyBehavior::EmptyChangeSet;
    let cloud = Arc::new(cloud);

    let report = pipeline(&cloud).deploy(&options()).await.unwrap();

    assert_eq!(report.outcome, DeployOutcome::NoChanges);
    assert!(!cloud.calls().contains(&"force_update".to_string()));
}

#[tokio::test]
async fn test_empty_change_set_with_force_updates() {
    let mut cloud = FakeCloud::new(WorkloadKind::BackendService, BACKEND_MANIFEST);
    cloud.apply = ApplyBehavior::EmptyChangeSet;
    let cloud = Arc::new(cloud);
    let mut opts = options();
    opts.force = true;

    let report = pipeline(&cloud).deploy(&opts).await.unwrap();

    assert_eq!(report.outcome, DeployOutcome::ForceUpdated);
    assert_eq!(cloud.calls().last().map(String::as_str), Some("force_update"));
}

#[tokio::test]
async fn test_force_update_failure_carries_hint() {
    let mut cloud = FakeCloud::new(WorkloadKind::BackendService, BACKEND_MANIFEST);
    cloud.apply = ApplyBehavior::EmptyChangeSet;
    cloud.force_fails = true;
    let cloud = Arc::new(cloud);
    let mut opts = options();
    opts.force = true;

    let err = pipeline(&cloud).deploy(&opts).await.unwrap_err();

    assert_eq!(err.to_string(), "force an update for service api");
    assert_eq!(
        err.hint().as_deref(),
        Some("Run `wharf svc status --name api --env test` to check for the fail reason.")
    );
}

#[tokio::test]
async fn test_force_ignored_when_stack_changes() {
    let cloud = Arc::new(FakeCloud::new(WorkloadKind::BackendService, BACKEND_MANIFEST));
    let mut opts = options();
    opts.force = true;

    let report = pipeline(&cloud).deploy(&opts).await.unwrap();

    assert_eq!(report.outcome, DeployOutcome::Deployed);
    assert!(!cloud.calls().contains(&"force_update".to_string()));
}

#[tokio::test]
async fn test_stack_failure() {
    let mut cloud = FakeCloud::new(WorkloadKind::BackendService, BACKEND_MANIFEST);
    cloud.apply = ApplyBehavior::Fail;
    let cloud = Arc::new(cloud);

    let err = pipeline(&cloud).deploy(&options()).await.unwrap_err();

    assert!(matches!(err, DeployError::StackDeployment { .. }));
    assert_eq!(
        format!("{:#}", anyhow::Error::new(err)),
        "deploy service api: stack shop-test-api is in UPDATE_IN_PROGRESS"
    );
}

#[tokio::test]
async fn test_alias_rejected_on_outdated_app() {
    let mut cloud = FakeCloud::new(WorkloadKind::LoadBalancedWebService, LB_MANIFEST);
    cloud.version = "v0.5.0".into();
    let cloud = Arc::new(cloud);

    let err = pipeline(&cloud).deploy(&options()).await.unwrap_err();

    assert!(matches!(err, DeployError::Alias(AliasError::IncompatibleVersion { .. })));
    assert_eq!(err.to_string(), "alias is not compatible with application versions below v1.0.0");
    assert!(cloud.stacks.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_load_balanced_without_domain_is_plain() {
    let mut cloud = FakeCloud::new(WorkloadKind::LoadBalancedWebService, LB_MANIFEST);
    cloud.app.domain = None;
    let cloud = Arc::new(cloud);

    pipeline(&cloud).deploy(&options()).await.unwrap();

    assert!(matches!(
        cloud.last_stack().kind,
        StackKind::LoadBalancedWebService { https: false, .. }
    ));
    assert!(!cloud.calls().contains(&"app_version".to_string()));
}

#[tokio::test]
async fn test_load_balanced_foreign_alias() {
    let raw = LB_MANIFEST.replace("v1.test.shop.example.com", "api.other.org");
    let cloud = Arc::new(FakeCloud::new(WorkloadKind::LoadBalancedWebService, &raw));

    let err = pipeline(&cloud).deploy(&options()).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "alias \"api.other.org\" is not supported in hosted zones managed by wharf"
    );
}

#[tokio::test]
async fn test_request_driven_alias_uploads_custom_resources() {
    let cloud = Arc::new(FakeCloud::new(WorkloadKind::RequestDrivenWebService, RD_MANIFEST));

    let report = pipeline(&cloud).deploy(&options()).await.unwrap();

    match cloud.last_stack().kind {
        StackKind::RequestDrivenWebService {
            app_info,
            alias,
            custom_resource_urls,
        } => {
            assert_eq!(app_info.account_principal_arn, "arn:aws:iam::123456789012:root");
            assert_eq!(app_info.dns_name.as_deref(), Some("example.com"));
            assert_eq!(alias.as_deref(), Some("web.example.com"));
            assert_eq!(
                custom_resource_urls.keys().collect::<Vec<_>>(),
                vec!["CustomDomainFunction", "DNSDelegationFunction"]
            );
        }
        other => panic!("unexpected stack kind {:?}", other),
    }
    assert_eq!(cloud.resource_fetches.load(Ordering::SeqCst), 1);
    assert_eq!(report.recommendations.len(), 1);
}

#[tokio::test]
async fn test_request_driven_environment_alias_rejected() {
    let raw = RD_MANIFEST.replace("web.example.com", "foo.test.shop.example.com");
    let cloud = Arc::new(FakeCloud::new(WorkloadKind::RequestDrivenWebService, &raw));

    let err = pipeline(&cloud).deploy(&options()).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "foo.test.shop.example.com is an environment-level alias, which is not supported yet"
    );
    assert!(cloud.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_request_driven_without_alias() {
    let raw = RD_MANIFEST.replace("http:\n  alias: web.example.com\n", "");
    let cloud = Arc::new(FakeCloud::new(WorkloadKind::RequestDrivenWebService, &raw));

    pipeline(&cloud).deploy(&options()).await.unwrap();

    match cloud.last_stack().kind {
        StackKind::RequestDrivenWebService {
            alias,
            custom_resource_urls,
            ..
        } => {
            assert!(alias.is_none());
            assert!(custom_resource_urls.is_empty());
        }
        other => panic!("unexpected stack kind {:?}", other),
    }
    assert!(!cloud.calls().contains(&"app_version".to_string()));
}

#[tokio::test]
async fn test_worker_resolves_topics() {
    let mut cloud = FakeCloud::new(WorkloadKind::WorkerService, WORKER_MANIFEST);
    cloud.topics = vec![cloud.topic("orders", "created"), cloud.topic("users", "deleted")];
    let cloud = Arc::new(cloud);

    let report = pipeline(&cloud).deploy(&options()).await.unwrap();

    let StackKind::WorkerService { subscriptions } = cloud.last_stack().kind else {
        panic!("expected a worker stack");
    };
    assert_eq!(subscriptions.len(), 2);
    assert_eq!(
        subscriptions[0].topic_arn,
        "arn:aws:sns:us-west-2:123456789012:shop-test-orders-created"
    );
    assert!(subscriptions[0].dedicated_queue);
    assert!(!subscriptions[1].dedicated_queue);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("ordersCreatedEventsQueue")));
}

#[tokio::test]
async fn test_worker_unknown_topic() {
    let mut cloud = FakeCloud::new(WorkloadKind::WorkerService, WORKER_MANIFEST);
    cloud.topics = vec![cloud.topic("orders", "created")];
    let cloud = Arc::new(cloud);

    let err = pipeline(&cloud).deploy(&options()).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "SNS topic arn:aws:sns:us-west-2:123456789012:shop-test-users-deleted does not exist in environment test"
    );
}

#[tokio::test]
async fn test_scheduled_job_carries_schedule() {
    let cloud = Arc::new(FakeCloud::new(WorkloadKind::ScheduledJob, JOB_MANIFEST));

    pipeline(&cloud).deploy(&options()).await.unwrap();

    assert_eq!(
        cloud.last_stack().kind,
        StackKind::ScheduledJob {
            schedule: Some("@daily".into())
        }
    );
}

#[tokio::test]
async fn test_registered_kind_must_match_manifest() {
    let cloud = Arc::new(FakeCloud::new(WorkloadKind::WorkerService, BACKEND_MANIFEST));

    let err = pipeline(&cloud).deploy(&options()).await.unwrap_err();

    assert!(matches!(err, DeployError::KindMismatch { .. }));
    assert!(!cloud.calls().contains(&"upgrade_environment".to_string()));
}

#[tokio::test]
async fn test_unknown_environment() {
    let cloud = Arc::new(FakeCloud::new(WorkloadKind::BackendService, BACKEND_MANIFEST));
    let mut opts = options();
    opts.env = "prod".into();

    let err = pipeline(&cloud).deploy(&opts).await.unwrap_err();

    assert_eq!(
        format!("{:#}", anyhow::Error::new(err)),
        "get environment prod in application shop: couldn't find environment prod"
    );
}

/// Two deployments of the same workload are not serialized against each
/// other; both apply their change sets.
#[tokio::test]
#[ignore = "concurrent deployments of one workload are not locked"]
async fn test_concurrent_deploys_are_serialized() {
    let cloud = Arc::new(FakeCloud::new(WorkloadKind::BackendService, BACKEND_MANIFEST));
    let first = pipeline(&cloud);
    let second = pipeline(&cloud);
    let opts = options();

    let (a, b) = tokio::join!(first.deploy(&opts), second.deploy(&opts));

    assert!(a.is_ok() != b.is_ok(), "exactly one deployment should win the lock");
}

