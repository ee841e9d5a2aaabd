//! DNS alias checks against the hosted zones wharf manages.
//!
//! An application with a domain owns three zones: the root domain,
//! `<app>.<domain>` and one `<env>.<app>.<domain>` per environment.
//! Load balanced services may alias into any of them. Request-driven
//! services may only use a subdomain of the root domain that is neither
//! the application nor the environment zone.

use regex::Regex;
use semver::Version;
use thiserror::Error;

/// Least application template version that supports aliases.
pub const ALIAS_LEAST_APP_TEMPLATE_VERSION: &str = "v1.0.0";

/// Alias validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AliasError {
    #[error("alias is not compatible with application versions below {least}")]
    IncompatibleVersion { least: &'static str },

    #[error("alias {0:?} is not supported in hosted zones managed by wharf")]
    UnmanagedZone(String),

    #[error("{0} is an environment-level alias, which is not supported yet")]
    EnvironmentLevel(String),

    #[error("{0} is an application-level alias, which is not supported yet")]
    ApplicationLevel(String),

    #[error("{0} is a root domain alias, which is not supported yet")]
    RootDomain(String),

    #[error("alias is not supported in hosted zones that are not managed by wharf")]
    OutsideRootZone(String),

    #[error("compile hosted zone pattern: {0}")]
    Pattern(String),
}

/// Hosted zone matchers for one environment of an application.
#[derive(Debug, Clone)]
pub struct HostedZones {
    env: String,
    app: String,
    domain: String,
    env_zone: Regex,
    app_zone: Regex,
    root_zone: Regex,
    root_subdomain: Regex,
}

impl HostedZones {
    pub fn new(env: &str, app: &str, domain: &str) -> Result<Self, AliasError> {
        let (env_q, app_q, domain_q) = (regex::escape(env), regex::escape(app), regex::escape(domain));
        let compile = |pattern: String| Regex::new(&pattern).map_err(|e| AliasError::Pattern(e.to_string()));

        Ok(Self {
            env: env.to_string(),
            app: app.to_string(),
            domain: domain.to_string(),
            env_zone: compile(format!(r"^([^.]+\.)?{env_q}\.{app_q}\.{domain_q}$"))?,
            app_zone: compile(format!(r"^([^.]+\.)?{app_q}\.{domain_q}$"))?,
            root_zone: compile(format!(r"^([^.]+\.)?{domain_q}$"))?,
            root_subdomain: compile(format!(r"^[^.]+\.{domain_q}$"))?,
        })
    }

    /// Whether `alias` lives in one of the zones wharf manages.
    pub fn is_managed(&self, alias: &str) -> bool {
        [&self.env_zone, &self.app_zone, &self.root_zone]
            .into_iter()
            .any(|zone| zone.is_match(alias))
    }

    /// Check the aliases of a load balanced service.
    pub fn check_load_balanced(&self, aliases: &[String]) -> Result<(), AliasError> {
        for alias in aliases {
            if self.is_managed(alias) {
                continue;
            }
            tracing::error!(alias = %alias, "http.alias must match one of:\n{}", self.load_balanced_patterns());
            return Err(AliasError::UnmanagedZone(alias.clone()));
        }
        Ok(())
    }

    /// Check the alias of a request-driven service.
    pub fn check_request_driven(&self, alias: &str) -> Result<(), AliasError> {
        let result = if self.env_zone.is_match(alias) {
            Err(AliasError::EnvironmentLevel(alias.to_string()))
        } else if self.app_zone.is_match(alias) {
            Err(AliasError::ApplicationLevel(alias.to_string()))
        } else if alias == self.domain {
            Err(AliasError::RootDomain(alias.to_string()))
        } else if self.root_subdomain.is_match(alias) {
            Ok(())
        } else {
            Err(AliasError::OutsideRootZone(alias.to_string()))
        };

        if result.is_err() {
            tracing::error!(
                alias,
                "http.alias should match the pattern <subdomain>.{} where <subdomain> cannot be the application name",
                self.domain
            );
        }
        result
    }

    fn load_balanced_patterns(&self) -> String {
        let (env, app, domain) = (&self.env, &self.app, &self.domain);
        [
            format!("{env}.{app}.{domain}"),
            format!("<name>.{env}.{app}.{domain}"),
            format!("{app}.{domain}"),
            format!("<name>.{app}.{domain}"),
            domain.to_string(),
            format!("<name>.{domain}"),
        ]
        .iter()
        .map(|p| format!("- {p}"))
        .collect::<Vec<_>>()
        .join("\n")
    }
}

/// Reject application template versions that predate alias support.
///
/// Versions that do not parse are treated as older than every release.
pub fn check_app_version(version: &str) -> Result<(), AliasError> {
    let least = parse_version(ALIAS_LEAST_APP_TEMPLATE_VERSION);
    match (parse_version(version), least) {
        (Some(current), Some(least)) if current >= least => Ok(()),
        _ => Err(AliasError::IncompatibleVersion {
            least: ALIAS_LEAST_APP_TEMPLATE_VERSION,
        }),
    }
}

fn parse_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    Version::parse(trimmed.strip_prefix('v').unwrap_or(trimmed)).ok()
}
