//! Deploy resolution and orchestration for wharf workloads.
//!
//! This crate provides:
//! - `ports` - Collaborator traits the pipeline drives
//! - `Resolver` - Maps an effective manifest to a `StackConfiguration`
//! - `HostedZones` - DNS alias checks against the managed hosted zones
//! - `DeployPipeline` - Build, upload, resolve and apply, with the empty change set fallback
//!
//! # Example
//!
//! ```ignore
//! use wharf_deploy::{DeployOptions, DeployPipeline};
//!
//! let pipeline = DeployPipeline::new(collaborators);
//! let report = pipeline
//!     .deploy(&DeployOptions {
//!         app: "shop".into(),
//!         env: "test".into(),
//!         name: "api".into(),
//!         ..Default::default()
//!     })
//!     .await?;
//! ```

pub mod alias;
pub mod app;
pub mod context;
pub mod custom_resources;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod recommend;
pub mod resolver;
pub mod stack;

pub use alias::{check_app_version, AliasError, HostedZones, ALIAS_LEAST_APP_TEMPLATE_VERSION};
pub use app::*;
pub use context::{DeployContext, RegionalResources};
pub use error::{DeployError, DeployResult};
pub use pipeline::{
    addons_template_key, load_manifest, Collaborators, DeployOptions, DeployOutcome, DeployPipeline,
    DeployReport, DeployStage,
};
pub use recommend::recommended_actions;
pub use resolver::Resolver;
pub use stack::*;
