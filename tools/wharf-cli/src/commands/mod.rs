//! CLI command implementations.

pub mod config;
pub mod deploy;
pub mod validate;

use clap::{Args, Subcommand};
use wharf_deploy::Tags;

/// Arguments for the deploy command.
#[derive(Args)]
pub struct DeployArgs {
    /// Workload name.
    #[arg(short, long)]
    pub name: String,

    /// Environment to deploy to.
    #[arg(short, long)]
    pub env: String,

    /// Image tag (default: short commit hash of the workspace).
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Extra resource tags, as `key=value,key2=value2`.
    #[arg(long, value_parser = parse_resource_tags)]
    pub resource_tags: Option<Tags>,

    /// Force a new deployment when the stack has no changes.
    #[arg(long)]
    pub force: bool,

    /// Skip confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Workload name.
    #[arg(short, long)]
    pub name: String,

    /// Environment to validate against (default: every configured environment).
    #[arg(short, long)]
    pub env: Option<String>,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Application name.
        #[arg(short, long)]
        app: Option<String>,

        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}

/// Parse `key=value` pairs separated by commas.
pub fn parse_resource_tags(raw: &str) -> Result<Tags, String> {
    let mut tags = Tags::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("tag '{}' must be in key=value form", pair))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("tag '{}' has an empty key", pair));
        }
        tags.insert(key.to_string(), value.trim().to_string());
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resource_tags() {
        let tags = parse_resource_tags("owner=payments, cost-center=42,").unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["owner"], "payments");
        assert_eq!(tags["cost-center"], "42");

        assert!(parse_resource_tags("owner").unwrap_err().contains("key=value"));
        assert!(parse_resource_tags("=x").unwrap_err().contains("empty key"));
    }
}
