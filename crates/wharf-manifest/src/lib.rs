//! Workload manifests for the wharf deployment tool.
//!
//! This crate provides:
//! - `WorkloadManifest` - Closed set of deployable workload shapes
//! - `Image`, `SidecarConfig`, `TaskConfig`, `Storage` - Shared building blocks
//! - `WorkloadManifest::apply_env` - Environment override merging
//! - `Validate` - Path-scoped validation, including the container dependency graph
//!
//! # Example
//!
//! ```ignore
//! use wharf_manifest::{Validate, WorkloadManifest};
//!
//! let manifest = WorkloadManifest::from_yaml(&raw)?;
//! let effective = manifest.apply_env("test")?;
//! effective.validate()?;
//! ```

mod duration;
mod env;
mod error;
mod image;
mod network;
mod storage;
mod task;
mod taskdef;
mod topic;
mod validate;
mod workload;

pub use duration::*;
pub use error::*;
pub use image::*;
pub use network::*;
pub use storage::*;
pub use task::*;
pub use taskdef::*;
pub use topic::*;
pub use validate::*;
pub use workload::*;
