//! CLI execution context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use wharf_deploy::Collaborators;

use crate::config::{WharfConfig, CONFIG_FILE_NAMES};
use crate::local::LocalBackend;
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    pub config: WharfConfig,
    /// Config file in use, if one was found.
    pub config_path: Option<PathBuf>,
    /// Workspace root: the directory holding the config file, else the working directory.
    pub root: PathBuf,
    pub cwd: PathBuf,
    pub output: Output,
}

impl Context {
    /// Load context from an explicit config file or the nearest one above the working directory.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let found = match config_path {
            Some(path) => {
                let path = resolve(&cwd, path);
                Some((WharfConfig::load(&path)?, path))
            }
            None => Self::find_config(&cwd),
        };

        let (config, config_path) = match found {
            Some((config, path)) => (config, Some(path)),
            None => (WharfConfig::default(), None),
        };
        let root = config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.clone());

        Ok(Self {
            config,
            config_path,
            root,
            cwd,
            output,
        })
    }

    /// Find config file in directory tree.
    fn find_config(start: &Path) -> Option<(WharfConfig, PathBuf)> {
        let mut current = start.to_path_buf();
        loop {
            for name in CONFIG_FILE_NAMES {
                let path = current.join(name);
                if path.exists() {
                    if let Ok(config) = WharfConfig::load(&path) {
                        return Some((config, path));
                    }
                }
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Fail unless a config file was found.
    pub fn require_config(&self) -> Result<&Path> {
        match self.config_path.as_deref() {
            Some(path) => Ok(path),
            None => bail!("No wharf.toml found. Run `wharf config init` to create one."),
        }
    }

    /// Collaborators backed by the local workspace.
    pub fn backend(&self) -> Arc<LocalBackend> {
        Arc::new(LocalBackend::new(self.root.clone(), self.config.clone()))
    }

    /// Collaborators for the deployment pipeline.
    pub fn collaborators(&self) -> Collaborators {
        let backend = self.backend();
        Collaborators {
            store: backend.clone(),
            manifests: backend.clone(),
            images: backend.clone(),
            uploader: backend.clone(),
            addons: backend.clone(),
            app_resources: backend.clone(),
            endpoints: backend.clone(),
            env_upgrader: backend.clone(),
            stacks: backend.clone(),
            service_updater: backend.clone(),
            topics: backend.clone(),
            versions: backend.clone(),
            identity: backend,
        }
    }
}

fn resolve(cwd: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}
