//! Deploy a workload to an environment.

use std::path::Path;
use std::process::Command;

use anyhow::{Context as _, Result};
use chrono::Utc;
use dialoguer::Confirm;
use wharf_deploy::{DeployOptions, DeployPipeline};

use super::DeployArgs;
use crate::context::Context;
use crate::output::outcome_name;

/// Run the deploy command.
pub async fn run(args: DeployArgs, ctx: &Context) -> Result<()> {
    ctx.require_config()?;

    let opts = DeployOptions {
        app: ctx.config.application.name.clone(),
        env: args.env,
        name: args.name,
        image_tag: args.tag.or_else(|| git_short_commit(&ctx.root)),
        resource_tags: args.resource_tags.unwrap_or_default(),
        force: args.force,
    };
    ctx.output.deploy_plan(&opts);

    if !args.yes && !ctx.output.is_json() {
        let confirmed = Confirm::new()
            .with_prompt("Proceed with deployment?")
            .default(true)
            .interact()
            .context("Failed to read confirmation")?;

        if !confirmed {
            ctx.output.warn("Deployment cancelled");
            return Ok(());
        }
    }

    let pipeline = DeployPipeline::new(ctx.collaborators());
    let spinner = ctx.output.spinner(&format!("Deploying service {}...", opts.name));
    let started = Utc::now();
    let result = pipeline.deploy(&opts).await;
    spinner.finish_and_clear();

    let report = result?;
    let elapsed = report.finished_at - started;
    tracing::info!(
        stack = %report.stack_name,
        outcome = outcome_name(report.outcome),
        elapsed_ms = elapsed.num_milliseconds(),
        "deployment finished"
    );

    ctx.output.deploy_report(&report);
    Ok(())
}

/// Short commit hash of the workspace, used as the default image tag.
fn git_short_commit(root: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .current_dir(root)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!hash.is_empty()).then_some(hash)
}
