//! Application, environment and workload records read from the config store.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use wharf_manifest::WorkloadKind;

/// Resource tags keyed by tag name.
pub type Tags = BTreeMap<String, String>;

/// An application grouping environments and workloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub account_id: String,

    /// Hosted zone delegated to the application, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

impl Application {
    /// Applications with a domain get their DNS delegated to the environments.
    pub fn requires_dns_delegation(&self) -> bool {
        self.domain.as_deref().is_some_and(|d| !d.is_empty())
    }
}

/// A deployment environment of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub app: String,
    pub name: String,
    pub region: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_role_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_role_arn: Option<String>,
}

/// A workload registered with an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadRecord {
    pub app: String,
    pub name: String,
    pub kind: WorkloadKind,
}

/// Per-region resources shared by every environment of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRegionalResources {
    pub region: String,
    pub s3_bucket: String,

    /// Image repository URL keyed by workload name.
    #[serde(default)]
    pub repository_urls: BTreeMap<String, String>,
}

/// The identity deploying the workload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub account: String,
    pub root_user_arn: String,
}

/// A topic deployed by a publishing workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedTopic {
    pub app: String,
    pub env: String,
    pub workload: String,
    pub name: String,
    pub region: String,
    pub account_id: String,
}

impl DeployedTopic {
    pub fn arn(&self) -> String {
        topic_arn(
            &self.region,
            &self.account_id,
            &self.app,
            &self.env,
            &self.workload,
            &self.name,
        )
    }
}

impl fmt::Display for DeployedTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.arn())
    }
}

/// ARN of the topic `topic` published by `workload` in `app`/`env`.
pub fn topic_arn(region: &str, account_id: &str, app: &str, env: &str, workload: &str, topic: &str) -> String {
    format!("arn:aws:sns:{region}:{account_id}:{app}-{env}-{workload}-{topic}")
}

/// Merge resource tags over application tags; resource tags win.
pub fn merge_tags(app_tags: &Tags, resource_tags: &Tags) -> Tags {
    let mut merged = app_tags.clone();
    merged.extend(resource_tags.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
