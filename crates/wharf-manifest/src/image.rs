//! Container images, sidecars and container dependencies.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Main container image: either built locally or pulled from a location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    /// Local build instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildArgsOrString>,

    /// Pre-built image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Port the main container listens on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Startup dependencies on other containers in the task.
    #[serde(default, skip_serializing_if = "DependsOn::is_empty")]
    pub depends_on: DependsOn,
}

impl Image {
    /// Create an image built from a Dockerfile path.
    pub fn build(dockerfile: impl Into<String>) -> Self {
        Self {
            build: Some(BuildArgsOrString::Path(dockerfile.into())),
            ..Default::default()
        }
    }

    /// Create an image pulled from an existing location.
    pub fn location(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            ..Default::default()
        }
    }

    /// Set the container port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Add a container dependency.
    pub fn with_dependency(mut self, container: impl Into<String>, status: impl Into<String>) -> Self {
        self.depends_on.insert(container, status);
        self
    }

    /// Whether the image must be built from a local Dockerfile.
    pub fn requires_build(&self) -> bool {
        self.build.is_some() && self.location.is_none()
    }

    /// Resolve docker build arguments relative to the workspace root.
    ///
    /// Returns `None` for images pulled from a location.
    pub fn build_config(&self, root: &Path) -> Option<DockerBuildArgs> {
        let build = self.build.as_ref()?;
        let dockerfile = build.dockerfile();
        let context = build.context();

        let (dockerfile, context) = match (dockerfile, context) {
            (Some(df), None) => {
                let parent = Path::new(df).parent().unwrap_or_else(|| Path::new(""));
                (root.join(df), root.join(parent))
            }
            (None, Some(ctx)) => (root.join(ctx).join(DEFAULT_DOCKERFILE), root.join(ctx)),
            (Some(df), Some(ctx)) => (root.join(df), root.join(ctx)),
            (None, None) => (root.join(DEFAULT_DOCKERFILE), root.to_path_buf()),
        };

        let (args, target, cache_from) = match build {
            BuildArgsOrString::Path(_) => (BTreeMap::new(), None, Vec::new()),
            BuildArgsOrString::Args(a) => (a.args.clone(), a.target.clone(), a.cache_from.clone()),
        };

        Some(DockerBuildArgs {
            dockerfile,
            context,
            args,
            target,
            cache_from,
        })
    }
}

/// Build instructions written either as a Dockerfile path or a full mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildArgsOrString {
    /// Path to a Dockerfile; its directory is the build context.
    Path(String),
    /// Explicit build arguments.
    Args(BuildArgs),
}

impl BuildArgsOrString {
    fn dockerfile(&self) -> Option<&str> {
        match self {
            Self::Path(p) => Some(p.as_str()),
            Self::Args(a) => a.dockerfile.as_deref(),
        }
    }

    fn context(&self) -> Option<&str> {
        match self {
            Self::Path(_) => None,
            Self::Args(a) => a.context.as_deref(),
        }
    }
}

/// Docker build arguments as written in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cache_from: Vec<String>,
}

/// Docker build arguments resolved against the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerBuildArgs {
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    pub args: BTreeMap<String, String>,
    pub target: Option<String>,
    pub cache_from: Vec<String>,
}

/// Container startup condition a dependency waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContainerStatus {
    Start,
    Complete,
    Success,
    Healthy,
}

impl ContainerStatus {
    /// Statuses that may be used against an essential container.
    pub const ESSENTIAL: [ContainerStatus; 2] = [Self::Start, Self::Healthy];

    /// Whether this status may target an essential container.
    pub fn allowed_for_essential(self) -> bool {
        Self::ESSENTIAL.contains(&self)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "START"),
            Self::Complete => write!(f, "COMPLETE"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Healthy => write!(f, "HEALTHY"),
        }
    }
}

impl FromStr for ContainerStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "START" => Ok(Self::Start),
            "COMPLETE" => Ok(Self::Complete),
            "SUCCESS" => Ok(Self::Success),
            "HEALTHY" => Ok(Self::Healthy),
            _ => Err(()),
        }
    }
}

/// Container name to the status it must reach before this container starts.
///
/// Statuses are kept as written so that validation can report bad values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependsOn(pub BTreeMap<String, String>);

impl DependsOn {
    /// Create an empty dependency map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency.
    pub fn insert(&mut self, container: impl Into<String>, status: impl Into<String>) {
        self.0.insert(container.into(), status.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, container: impl Into<String>, status: impl Into<String>) -> Self {
        self.insert(container, status);
        self
    }

    /// Whether there are no dependencies.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate dependencies in container-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Auxiliary container running next to the main container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidecarConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    /// Whether task failure follows this container's failure. Defaults to true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essential: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_parameter: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mount_points: Vec<SidecarMountPoint>,

    #[serde(default, skip_serializing_if = "DependsOn::is_empty")]
    pub depends_on: DependsOn,
}

impl SidecarConfig {
    /// Create a sidecar from an image reference.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            ..Default::default()
        }
    }

    /// Mark the sidecar essential or not.
    pub fn with_essential(mut self, essential: bool) -> Self {
        self.essential = Some(essential);
        self
    }

    /// Add a container dependency.
    pub fn with_dependency(mut self, container: impl Into<String>, status: impl Into<String>) -> Self {
        self.depends_on.insert(container, status);
        self
    }

    /// Sidecars are essential unless explicitly marked otherwise.
    pub fn is_essential(&self) -> bool {
        self.essential.unwrap_or(true)
    }
}

/// Volume mounted into a sidecar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidecarMountPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_volume: Option<String>,

    #[serde(flatten)]
    pub mount: MountPointOpts,
}

/// Where and how a volume is mounted inside a container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MountPointOpts {
    #[serde(default, rename = "path", skip_serializing_if = "Option::is_none")]
    pub container_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

impl MountPointOpts {
    /// Mount at the given container path.
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            container_path: Some(path.into()),
            read_only: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!("healthy".parse::<ContainerStatus>(), Ok(ContainerStatus::Healthy));
        assert_eq!("START".parse::<ContainerStatus>(), Ok(ContainerStatus::Start));
        assert!("bar".parse::<ContainerStatus>().is_err());
    }

    #[test]
    fn test_build_config_from_dockerfile_path() {
        let image = Image::build("frontend/Dockerfile");
        let args = image.build_config(Path::new("/ws")).unwrap();
        assert_eq!(args.dockerfile, PathBuf::from("/ws/frontend/Dockerfile"));
        assert_eq!(args.context, PathBuf::from("/ws/frontend"));
    }

    #[test]
    fn test_build_config_from_context_only() {
        let image = Image {
            build: Some(BuildArgsOrString::Args(BuildArgs {
                context: Some("api".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        };
        let args = image.build_config(Path::new("/ws")).unwrap();
        assert_eq!(args.dockerfile, PathBuf::from("/ws/api/Dockerfile"));
        assert_eq!(args.context, PathBuf::from("/ws/api"));
    }

    #[test]
    fn test_location_needs_no_build() {
        let image = Image::location("nginx:latest");
        assert!(!image.requires_build());
        assert!(image.build_config(Path::new("/ws")).is_none());
    }

    #[test]
    fn test_sidecar_essential_default() {
        assert!(SidecarConfig::new("envoy").is_essential());
        assert!(!SidecarConfig::new("envoy").with_essential(false).is_essential());
    }
}
