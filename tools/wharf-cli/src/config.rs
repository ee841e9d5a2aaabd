//! Workspace configuration (`wharf.toml`).

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use wharf_deploy::{Application, Tags};
use wharf_manifest::WorkloadKind;

/// File names searched for when no `--config` is given.
pub const CONFIG_FILE_NAMES: [&str; 3] = ["wharf.toml", ".wharf.toml", "wharf.json"];

/// Application template version assumed when none is configured.
pub const DEFAULT_APP_VERSION: &str = "v1.0.0";

/// Workspace configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WharfConfig {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,

    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,

    /// Topics already deployed by publishing services.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<TopicConfig>,

    #[serde(default)]
    pub identity: IdentityConfig,

    /// Application resources keyed by region.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourcesConfig>,
}

impl WharfConfig {
    /// Load config from a file; `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
        }
    }

    pub fn app(&self) -> Application {
        Application {
            name: self.application.name.clone(),
            account_id: self.application.account_id.clone(),
            domain: self.application.domain.clone(),
            tags: self.application.tags.clone(),
        }
    }

    /// Problems that make the config unusable, and ones worth a warning.
    pub fn check(&self) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.application.name.is_empty() {
            errors.push("application.name is required".to_string());
        }
        if self.application.account_id.is_empty() {
            warnings.push("application.account_id is empty".to_string());
        }
        if let Some(version) = &self.application.version {
            if !version.trim_start_matches('v').contains('.') {
                warnings.push(format!("application.version '{}' should follow semver (e.g., v1.0.0)", version));
            }
        }

        for (name, env) in &self.environments {
            if env.region.is_empty() {
                errors.push(format!("environments.{}.region is required", name));
            } else if !self.resources.contains_key(&env.region) {
                warnings.push(format!(
                    "environments.{} uses region '{}' which has no [resources.{}] section",
                    name, env.region, env.region
                ));
            }
        }

        for (name, svc) in &self.services {
            if WorkloadKind::parse(&svc.kind).is_none() {
                errors.push(format!("services.{}.type '{}' is not a workload type", name, svc.kind));
            }
        }

        for (i, topic) in self.topics.iter().enumerate() {
            if !self.environments.contains_key(&topic.env) {
                errors.push(format!("topics[{}].env '{}' is not a configured environment", i, topic.env));
            }
        }

        (errors, warnings)
    }
}

/// Application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub name: String,

    #[serde(default)]
    pub account_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Application template version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

/// Deployment environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub region: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_role_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_role_arn: Option<String>,
}

/// Registered workload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Workload type as written in manifests.
    #[serde(rename = "type")]
    pub kind: String,

    /// Manifest path relative to the workspace root (default: `<name>/manifest.yml`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
}

/// A deployed topic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicConfig {
    pub env: String,
    /// Publishing workload.
    pub workload: String,
    pub name: String,
}

/// Caller identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_user_arn: Option<String>,
}

/// Application resources in one region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcesConfig {
    pub s3_bucket: String,

    /// Image repository URL keyed by workload name.
    #[serde(default)]
    pub repository_urls: BTreeMap<String, String>,
}

/// Generate a starter wharf.toml.
pub fn generate_default_config(app: &str) -> String {
    format!(
        r#"# wharf workspace configuration

[application]
name = "{app}"
account_id = "123456789012"
# domain = "example.com"
version = "v1.0.0"

[application.tags]
owner = "{app}-team"

[environments.test]
region = "us-west-2"
# execution_role_arn = "arn:aws:iam::123456789012:role/{app}-test-CFNExecutionRole"

[services.api]
type = "Load Balanced Web Service"
# manifest = "api/manifest.yml"

# [[topics]]
# env = "test"
# workload = "orders"
# name = "created"

[resources.us-west-2]
s3_bucket = "{app}-us-west-2-artifacts"

[resources.us-west-2.repository_urls]
api = "123456789012.dkr.ecr.us-west-2.amazonaws.com/{app}/api"
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses_cleanly() {
        let config: WharfConfig = toml::from_str(&generate_default_config("shop")).unwrap();
        assert_eq!(config.application.name, "shop");
        assert_eq!(config.environments["test"].region, "us-west-2");
        assert_eq!(config.services["api"].kind, "Load Balanced Web Service");
        assert_eq!(
            config.resources["us-west-2"].repository_urls["api"],
            "123456789012.dkr.ecr.us-west-2.amazonaws.com/shop/api"
        );

        let (errors, warnings) = config.check();
        assert!(errors.is_empty(), "{:?}", errors);
        assert!(warnings.is_empty(), "{:?}", warnings);
    }

    #[test]
    fn test_check_reports_problems() {
        let raw = r#"
[application]
name = ""

[environments.prod]
region = "eu-west-1"

[services.api]
type = "Lambda"

[[topics]]
env = "staging"
workload = "orders"
name = "created"
"#;
        let config: WharfConfig = toml::from_str(raw).unwrap();
        let (errors, warnings) = config.check();
        assert_eq!(errors.len(), 3, "{:?}", errors);
        assert!(errors[0].contains("application.name"));
        assert!(errors[1].contains("services.api.type 'Lambda'"));
        assert!(errors[2].contains("topics[0].env 'staging'"));
        assert!(warnings.iter().any(|w| w.contains("[resources.eu-west-1]")));
    }

    #[test]
    fn test_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wharf.json");
        std::fs::write(&path, r#"{"application": {"name": "shop", "account_id": "1"}}"#).unwrap();

        let config = WharfConfig::load(&path).unwrap();
        assert_eq!(config.app().name, "shop");
        assert!(config.environments.is_empty());
    }
}
