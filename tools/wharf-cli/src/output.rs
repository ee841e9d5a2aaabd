//! Operator-facing rendering of deploy plans, reports, validation runs and failures.
//!
//! Every renderer has a styled terminal form and a JSON form selected by `--json`.
//! Styled text goes to stdout, diagnostics to stderr.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::json;
use wharf_deploy::{DeployError, DeployOptions, DeployOutcome, DeployReport};
use wharf_manifest::WorkloadKind;

/// Result of validating one workload against one environment.
#[derive(Debug, Clone, Serialize)]
pub struct EnvValidation {
    pub env: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EnvValidation {
    pub fn valid(env: &str, kind: WorkloadKind) -> Self {
        Self {
            env: env.to_string(),
            kind: Some(kind.as_str()),
            error: None,
        }
    }

    /// A failed run; the error chain is kept whole.
    pub fn invalid(env: &str, err: &DeployError) -> Self {
        Self {
            env: env.to_string(),
            kind: None,
            error: Some(format!("{:#}", err)),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Clone)]
pub struct Output {
    verbose: bool,
    json: bool,
}

impl Output {
    pub fn new(verbose: bool, json: bool) -> Self {
        Self { verbose, json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn info(&self, msg: &str) {
        if !self.json {
            println!("{} {}", style("ℹ").blue(), msg);
        }
    }

    pub fn success(&self, msg: &str) {
        if !self.json {
            println!("{} {}", style("✓").green(), msg);
        }
    }

    pub fn warn(&self, msg: &str) {
        if !self.json {
            eprintln!("{} {}", style("⚠").yellow(), msg);
        }
    }

    /// Only shown with `--verbose`.
    pub fn debug(&self, msg: &str) {
        if self.verbose && !self.json {
            eprintln!("{} {}", style("→").dim(), style(msg).dim());
        }
    }

    pub fn header(&self, msg: &str) {
        if !self.json {
            println!("\n{}", style(msg).bold().underlined());
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        if !self.json {
            println!("  {}: {}", style(key).dim(), value);
        }
    }

    pub fn list_item(&self, item: &str) {
        if !self.json {
            println!("  {} {}", style("•").dim(), item);
        }
    }

    pub fn json<T: Serialize>(&self, value: &T) {
        if let Ok(json) = serde_json::to_string_pretty(value) {
            println!("{}", json);
        }
    }

    /// Spinner shown while a deployment runs; hidden in JSON mode.
    pub fn spinner(&self, msg: &str) -> ProgressBar {
        if self.json {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    /// What is about to be deployed, before confirmation.
    pub fn deploy_plan(&self, opts: &DeployOptions) {
        self.header(&format!("Deploying {} to {}", opts.name, opts.env));
        self.kv("Application", &opts.app);
        self.kv("Environment", &opts.env);
        match &opts.image_tag {
            Some(tag) => self.kv("Tag", tag),
            None => self.debug("No --tag given and the workspace is not a git repository"),
        }
        for (key, value) in &opts.resource_tags {
            self.kv(&format!("Tag {}", key), value);
        }
        if opts.force {
            self.kv("Force", "yes");
        }
    }

    pub fn deploy_report(&self, report: &DeployReport) {
        if self.json {
            self.json(&report_json(report));
            return;
        }

        println!();
        self.success(&format!(
            "Service {} in environment {}: {}",
            report.workload,
            report.env,
            outcome_badge(report.outcome)
        ));
        self.kv("Stack", &report.stack_name);
        if let Some(image) = &report.image {
            self.kv("Image", &image.reference());
        }
        if let Some(url) = &report.addons_template_url {
            self.kv("Addons", url);
        }

        if !report.recommendations.is_empty() {
            println!();
            self.info("Recommended follow-up actions:");
            for action in &report.recommendations {
                self.list_item(action);
            }
        }
    }

    /// One environment's validation line, printed as results arrive.
    pub fn env_validation(&self, result: &EnvValidation) {
        match (&result.kind, &result.error) {
            (_, Some(error)) => self.error(&format!("{}: {}", result.env, error)),
            (Some(kind), None) => self.success(&format!("{} ({})", result.env, kind)),
            (None, None) => self.success(&result.env),
        }
    }

    /// JSON summary of a whole validation run; the styled form is printed per environment.
    pub fn validation_summary(&self, workload: &str, results: &[EnvValidation]) {
        if self.json {
            self.json(&json!({
                "workload": workload,
                "valid": results.iter().all(EnvValidation::is_valid),
                "results": results,
            }));
        }
    }

    /// Problems found in `wharf.toml`.
    pub fn config_findings(&self, errors: &[String], warnings: &[String]) {
        if self.json {
            self.json(&json!({
                "valid": errors.is_empty(),
                "errors": errors,
                "warnings": warnings,
            }));
            return;
        }
        for error in errors {
            self.error(&format!("Error: {}", error));
        }
        for warning in warnings {
            self.warn(&format!("Warning: {}", warning));
        }
        match (errors.is_empty(), warnings.is_empty()) {
            (true, true) => self.success("Configuration is valid"),
            (true, false) => self.success("Configuration is valid (with warnings)"),
            _ => {}
        }
    }

    /// A command failure: the full error chain, then the operator hint when the
    /// failure came out of the deployment pipeline.
    pub fn failure(&self, err: &anyhow::Error) {
        let hint = err.downcast_ref::<DeployError>().and_then(DeployError::hint);
        if self.json {
            eprintln!("{}", json!({ "error": format!("{:#}", err), "hint": hint }));
            return;
        }
        self.error(&format!("{:#}", err));
        if let Some(hint) = hint {
            eprintln!("{} {}", style("ℹ").blue(), hint);
        }
    }

    fn error(&self, msg: &str) {
        if !self.json {
            eprintln!("{} {}", style("✗").red(), style(msg).red());
        }
    }
}

/// Colored label for a deployment outcome.
pub fn outcome_badge(outcome: DeployOutcome) -> String {
    match outcome {
        DeployOutcome::Deployed => style("deployed").green().to_string(),
        DeployOutcome::ForceUpdated => style("force-updated").green().to_string(),
        DeployOutcome::NoChanges => style("no changes").yellow().to_string(),
    }
}

pub fn outcome_name(outcome: DeployOutcome) -> &'static str {
    match outcome {
        DeployOutcome::Deployed => "deployed",
        DeployOutcome::ForceUpdated => "force_updated",
        DeployOutcome::NoChanges => "no_changes",
    }
}

fn report_json(report: &DeployReport) -> serde_json::Value {
    json!({
        "outcome": outcome_name(report.outcome),
        "app": report.app,
        "env": report.env,
        "workload": report.workload,
        "stack_name": report.stack_name,
        "image": report.image.as_ref().map(|i| i.reference()),
        "addons_template_url": report.addons_template_url,
        "recommendations": report.recommendations,
        "finished_at": report.finished_at.to_rfc3339(),
    })
}
