//! Validate a workload manifest against one or every environment.

use anyhow::{bail, Result};
use wharf_deploy::load_manifest;

use super::ValidateArgs;
use crate::context::Context;
use crate::output::EnvValidation;

/// Run the validate command.
pub async fn run(args: ValidateArgs, ctx: &Context) -> Result<()> {
    let envs: Vec<String> = match args.env {
        Some(env) => vec![env],
        None => ctx.config.environments.keys().cloned().collect(),
    };
    if envs.is_empty() {
        bail!("No environments configured. Pass --env or add an [environments.<name>] section.");
    }

    ctx.output.header(&format!("Validating {}", args.name));

    let backend = ctx.backend();
    let mut results = Vec::with_capacity(envs.len());
    for env in &envs {
        let result = match load_manifest(backend.as_ref(), &args.name, env).await {
            Ok(manifest) => {
                tracing::debug!(workload = %args.name, env = %env, kind = %manifest.kind(), "manifest is valid");
                EnvValidation::valid(env, manifest.kind())
            }
            Err(err) => EnvValidation::invalid(env, &err),
        };
        ctx.output.env_validation(&result);
        results.push(result);
    }
    ctx.output.validation_summary(&args.name, &results);

    let failures = results.iter().filter(|r| !r.is_valid()).count();
    if failures > 0 {
        bail!("Manifest for {} is invalid in {} of {} environment(s)", args.name, failures, envs.len());
    }
    Ok(())
}
