//! Manifest validation.
//!
//! Every manifest part implements [`Validate`]. Parts whose rules depend on
//! the owning workload (task sizing, autoscaling) expose `validate_for`
//! instead. Failures are wrapped with the field that contained them, so the
//! outermost error reads as a path from the manifest root.

mod count;
mod deps;
mod error;
mod storage;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::image::{
    BuildArgsOrString, ContainerStatus, DependsOn, Image, MountPointOpts, SidecarConfig,
    SidecarMountPoint,
};
use crate::network::{IpNet, NetworkConfig, Placement, RoutingRule, VpcConfig};
use crate::taskdef::{OverrideRule, BLOCKED_OVERRIDE_PATHS};
use crate::topic::{PublishConfig, SubscribeConfig, Topic, TopicSubscription};
use crate::workload::{
    BackendService, JobTriggerConfig, LoadBalancedWebService, RequestDrivenWebService,
    ScheduledJob, WorkerService, WorkloadKind, WorkloadManifest,
};

pub use deps::ContainerGraph;
pub use error::*;

pub(crate) use error::FieldContext;

static PATH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9\-._/]+$").expect("invalid path pattern"));

static TOPIC_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("invalid topic name pattern"));

static SERVICE_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z](?:[a-z0-9]|-[a-z0-9])*$").expect("invalid service name pattern")
});

static BLOCKED_OVERRIDES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    BLOCKED_OVERRIDE_PATHS
        .iter()
        .map(|p| (*p, Regex::new(&format!("^{}$", p)).expect("invalid override pattern")))
        .collect()
});

/// Validation of a manifest or manifest part.
pub trait Validate {
    fn validate(&self) -> ValidationResult;
}

impl Validate for WorkloadManifest {
    fn validate(&self) -> ValidationResult {
        let result = match self {
            Self::LoadBalancedWebService(w) => w.validate(),
            Self::BackendService(w) => w.validate(),
            Self::RequestDrivenWebService(w) => w.validate(),
            Self::WorkerService(w) => w.validate(),
            Self::ScheduledJob(w) => w.validate(),
        };
        if let Err(err) = &result {
            tracing::debug!(
                kind = %self.kind(),
                workload = self.name().unwrap_or_default(),
                error = %err,
                "manifest failed validation"
            );
        }
        result
    }
}

impl Validate for LoadBalancedWebService {
    fn validate(&self) -> ValidationResult {
        validate_image_with_port(&self.image).field("image")?;
        self.http.validate().field("http")?;
        self.task.validate_for(WorkloadKind::LoadBalancedWebService)?;
        self.publish.validate().field("publish")?;
        validate_sidecars(&self.sidecars)?;
        self.network.validate().field("network")?;
        validate_overrides(&self.taskdef_overrides)?;
        let name = required_name(self.name.as_deref())?;
        ContainerGraph::new(name, &self.image, &self.sidecars).validate()
    }
}

impl Validate for BackendService {
    fn validate(&self) -> ValidationResult {
        self.image.validate().field("image")?;
        self.task.validate_for(WorkloadKind::BackendService)?;
        self.publish.validate().field("publish")?;
        validate_sidecars(&self.sidecars)?;
        self.network.validate().field("network")?;
        validate_overrides(&self.taskdef_overrides)?;
        let name = required_name(self.name.as_deref())?;
        ContainerGraph::new(name, &self.image, &self.sidecars).validate()
    }
}

impl Validate for RequestDrivenWebService {
    fn validate(&self) -> ValidationResult {
        validate_image_with_port(&self.image).field("image")?;
        required_name(self.name.as_deref())?;
        Ok(())
    }
}

impl Validate for WorkerService {
    fn validate(&self) -> ValidationResult {
        self.image.validate().field("image")?;
        self.task.validate_for(WorkloadKind::WorkerService)?;
        self.publish.validate().field("publish")?;
        self.subscribe.validate().field("subscribe")?;
        validate_sidecars(&self.sidecars)?;
        self.network.validate().field("network")?;
        validate_overrides(&self.taskdef_overrides)?;
        let name = required_name(self.name.as_deref())?;
        ContainerGraph::new(name, &self.image, &self.sidecars).validate()
    }
}

impl Validate for ScheduledJob {
    fn validate(&self) -> ValidationResult {
        self.image.validate().field("image")?;
        self.on.validate().field("on")?;
        self.task.validate_for(WorkloadKind::ScheduledJob)?;
        self.publish.validate().field("publish")?;
        validate_sidecars(&self.sidecars)?;
        self.network.validate().field("network")?;
        validate_overrides(&self.taskdef_overrides)?;
        let name = required_name(self.name.as_deref())?;
        ContainerGraph::new(name, &self.image, &self.sidecars).validate()
    }
}

fn required_name(name: Option<&str>) -> Result<&str, ValidationError> {
    name.filter(|n| !n.is_empty())
        .ok_or(ValidationError::MissingField("name"))
}

fn validate_sidecars(sidecars: &BTreeMap<String, SidecarConfig>) -> ValidationResult {
    for (name, sidecar) in sidecars {
        sidecar.validate().field(format!("sidecars[{}]", name))?;
    }
    Ok(())
}

fn validate_overrides(rules: &[OverrideRule]) -> ValidationResult {
    for (i, rule) in rules.iter().enumerate() {
        rule.validate().field(format!("taskdef_overrides[{}]", i))?;
    }
    Ok(())
}

/// Image validation for workloads that must expose a port.
fn validate_image_with_port(image: &Image) -> ValidationResult {
    image.validate()?;
    if image.port.is_none() {
        return Err(ValidationError::MissingField("port"));
    }
    Ok(())
}

fn build_is_empty(build: Option<&BuildArgsOrString>) -> bool {
    match build {
        None => true,
        Some(BuildArgsOrString::Path(p)) => p.is_empty(),
        Some(BuildArgsOrString::Args(a)) => {
            a.context.is_none()
                && a.dockerfile.is_none()
                && a.args.is_empty()
                && a.target.is_none()
                && a.cache_from.is_empty()
        }
    }
}

impl Validate for Image {
    fn validate(&self) -> ValidationResult {
        if build_is_empty(self.build.as_ref()) == self.location.is_none() {
            return Err(ValidationError::ImageSource);
        }
        self.depends_on.validate().field("depends_on")
    }
}

impl Validate for DependsOn {
    fn validate(&self) -> ValidationResult {
        for (_, status) in self.iter() {
            if status.parse::<ContainerStatus>().is_err() {
                return Err(ValidationError::DependencyStatus);
            }
        }
        Ok(())
    }
}

impl Validate for SidecarConfig {
    fn validate(&self) -> ValidationResult {
        for (i, mount) in self.mount_points.iter().enumerate() {
            mount.validate().field(format!("mount_points[{}]", i))?;
        }
        self.depends_on.validate().field("depends_on")
    }
}

impl Validate for SidecarMountPoint {
    fn validate(&self) -> ValidationResult {
        if self.source_volume.as_deref().map_or(true, str::is_empty) {
            return Err(ValidationError::MissingField("source_volume"));
        }
        self.mount.validate()
    }
}

impl Validate for MountPointOpts {
    fn validate(&self) -> ValidationResult {
        let path = match self.container_path.as_deref() {
            Some(p) if !p.is_empty() => p,
            _ => return Err(ValidationError::MissingField("path")),
        };
        validate_path(path).field("path")
    }
}

/// Filesystem paths are restricted to a conservative character set.
pub(crate) fn validate_path(path: &str) -> ValidationResult {
    if PATH_PATTERN.is_match(path) {
        Ok(())
    } else {
        Err(ValidationError::PathCharacters)
    }
}

impl Validate for RoutingRule {
    fn validate(&self) -> ValidationResult {
        if self.target_container.is_some() && self.target_container_camel_case.is_some() {
            return Err(ValidationError::MutuallyExclusive(
                "target_container",
                "targetContainer".to_string(),
            ));
        }
        for (i, ip) in self.allowed_source_ips.iter().enumerate() {
            ip.validate().field(format!("allowed_source_ips[{}]", i))?;
        }
        Ok(())
    }
}

impl Validate for IpNet {
    fn validate(&self) -> ValidationResult {
        self.parse().map(|_| ()).map_err(ValidationError::Cidr)
    }
}

impl Validate for NetworkConfig {
    fn validate(&self) -> ValidationResult {
        match &self.vpc {
            Some(vpc) if !vpc.is_empty() => vpc.validate().field("vpc"),
            _ => Ok(()),
        }
    }
}

impl Validate for VpcConfig {
    fn validate(&self) -> ValidationResult {
        let placement = match self.placement.as_deref() {
            None | Some("") => Err(ValidationError::EmptyPlacement),
            Some(p) if Placement::parse(p).is_none() => {
                let valid: Vec<&str> = Placement::ALL.iter().map(Placement::as_str).collect();
                Err(ValidationError::Placement(p.to_string(), valid.join(", ")))
            }
            Some(_) => Ok(()),
        };
        placement.field("placement")
    }
}

impl Validate for PublishConfig {
    fn validate(&self) -> ValidationResult {
        for (i, topic) in self.topics.iter().enumerate() {
            topic.validate().field(format!("topics[{}]", i))?;
        }
        Ok(())
    }
}

impl Validate for Topic {
    fn validate(&self) -> ValidationResult {
        validate_topic_name(self.name.as_deref())
    }
}

fn validate_topic_name(name: Option<&str>) -> ValidationResult {
    match name {
        None | Some("") => Err(ValidationError::MissingField("name")),
        Some(n) if !TOPIC_NAME_PATTERN.is_match(n) => Err(ValidationError::TopicName),
        Some(_) => Ok(()),
    }
}

impl Validate for SubscribeConfig {
    fn validate(&self) -> ValidationResult {
        for (i, topic) in self.topics.iter().enumerate() {
            topic.validate().field(format!("topics[{}]", i))?;
        }
        Ok(())
    }
}

impl Validate for TopicSubscription {
    fn validate(&self) -> ValidationResult {
        validate_topic_name(self.name.as_deref())?;
        match self.service.as_deref() {
            None | Some("") => Err(ValidationError::MissingField("service")),
            Some(s) if !SERVICE_NAME_PATTERN.is_match(s) => Err(ValidationError::ServiceName),
            Some(_) => Ok(()),
        }
    }
}

impl Validate for JobTriggerConfig {
    fn validate(&self) -> ValidationResult {
        match self.schedule.as_deref() {
            None | Some("") => Err(ValidationError::MissingField("schedule")),
            Some(_) => Ok(()),
        }
    }
}

impl Validate for OverrideRule {
    fn validate(&self) -> ValidationResult {
        for (pattern, re) in BLOCKED_OVERRIDES.iter() {
            if re.is_match(&self.path) {
                return Err(ValidationError::BlockedOverride(pattern));
            }
        }
        Ok(())
    }
}
