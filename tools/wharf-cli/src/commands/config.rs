//! Configuration management commands.

use std::fs;

use anyhow::{bail, Result};

use super::{ConfigArgs, ConfigCommand};
use crate::config::generate_default_config;
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init { app, force } => init_config(app, force, ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    if let Some(path) = &ctx.config_path {
        ctx.output.kv("file", &path.display().to_string());
    }

    let app = &ctx.config.application;
    ctx.output.info("");
    ctx.output.info("[application]");
    ctx.output.kv("name", &app.name);
    ctx.output.kv("account_id", &app.account_id);
    if let Some(domain) = &app.domain {
        ctx.output.kv("domain", domain);
    }
    if let Some(version) = &app.version {
        ctx.output.kv("version", version);
    }
    for (key, value) in &app.tags {
        ctx.output.kv(&format!("tags.{}", key), value);
    }

    if !ctx.config.environments.is_empty() {
        ctx.output.info("");
        ctx.output.info("Environments:");
        for (name, env) in &ctx.config.environments {
            ctx.output.list_item(&format!("{} ({})", name, env.region));
        }
    }

    if !ctx.config.services.is_empty() {
        ctx.output.info("");
        ctx.output.info("Services:");
        for (name, svc) in &ctx.config.services {
            ctx.output.list_item(&format!("{} ({})", name, svc.kind));
        }
    }

    if !ctx.config.topics.is_empty() {
        ctx.output.info("");
        ctx.output.info("Topics:");
        for topic in &ctx.config.topics {
            ctx.output
                .list_item(&format!("{}/{} in {}", topic.workload, topic.name, topic.env));
        }
    }

    Ok(())
}

async fn init_config(app: Option<String>, force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join("wharf.toml");

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    // Default the application name to the directory name
    let name = app.unwrap_or_else(|| {
        ctx.cwd
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("my-app")
            .to_string()
    });

    fs::write(&config_path, generate_default_config(&name))?;
    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

async fn validate_config(ctx: &Context) -> Result<()> {
    let path = ctx.require_config()?;
    ctx.output.header("Validating configuration");
    ctx.output.debug(&format!("Config file: {}", path.display()));

    let (errors, warnings) = ctx.config.check();
    ctx.output.config_findings(&errors, &warnings);

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }
    Ok(())
}
