//! Ephemeral storage and EFS volumes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::image::MountPointOpts;

/// Task storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    /// Ephemeral storage size in GiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral: Option<i64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, Volume>,
}

impl Storage {
    /// Names of volumes backed by a managed file system.
    pub fn managed_volumes(&self) -> Vec<&str> {
        self.volumes
            .iter()
            .filter(|(_, v)| v.efs.as_ref().is_some_and(EfsConfigOrBool::uses_managed_fs))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// A named volume and its mount point in the main container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efs: Option<EfsConfigOrBool>,

    #[serde(flatten)]
    pub mount: MountPointOpts,
}

/// EFS written as `true`/`false` or an explicit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EfsConfigOrBool {
    Enabled(bool),
    Advanced(EfsVolumeConfiguration),
}

impl EfsConfigOrBool {
    /// Whether the volume asks for a file system created and owned by the deployment.
    pub fn uses_managed_fs(&self) -> bool {
        match self {
            Self::Enabled(enabled) => *enabled,
            Self::Advanced(cfg) => cfg.file_system_id.is_none() && !cfg.is_empty(),
        }
    }
}

/// Detailed EFS configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EfsVolumeConfiguration {
    #[serde(default, rename = "id", skip_serializing_if = "Option::is_none")]
    pub file_system_id: Option<String>,

    #[serde(default, rename = "root_dir", skip_serializing_if = "Option::is_none")]
    pub root_directory: Option<String>,

    #[serde(default, rename = "auth", skip_serializing_if = "Option::is_none")]
    pub auth_config: Option<AuthorizationConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
}

impl EfsVolumeConfiguration {
    pub fn is_empty(&self) -> bool {
        !self.has_existing_fs_fields() && !self.has_uid_gid()
    }

    /// Whether POSIX ownership for a managed file system is configured.
    pub fn has_uid_gid(&self) -> bool {
        self.uid.is_some() || self.gid.is_some()
    }

    /// Whether any of `id`, `root_dir` or `auth` is set.
    pub fn has_existing_fs_fields(&self) -> bool {
        let auth_set = self.auth_config.as_ref().is_some_and(|a| !a.is_empty());
        self.file_system_id.is_some() || self.root_directory.is_some() || auth_set
    }
}

/// IAM and access point settings for an existing file system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_point_id: Option<String>,
}

impl AuthorizationConfig {
    pub fn is_empty(&self) -> bool {
        self.iam.is_none() && self.access_point_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn efs_volume(efs: EfsConfigOrBool) -> Volume {
        Volume {
            efs: Some(efs),
            mount: MountPointOpts::at("/data"),
        }
    }

    #[test]
    fn test_managed_volumes() {
        let mut storage = Storage::default();
        storage
            .volumes
            .insert("managed".into(), efs_volume(EfsConfigOrBool::Enabled(true)));
        storage
            .volumes
            .insert("off".into(), efs_volume(EfsConfigOrBool::Enabled(false)));
        storage.volumes.insert(
            "existing".into(),
            efs_volume(EfsConfigOrBool::Advanced(EfsVolumeConfiguration {
                file_system_id: Some("fs-1234567".into()),
                ..Default::default()
            })),
        );
        storage.volumes.insert(
            "owned".into(),
            efs_volume(EfsConfigOrBool::Advanced(EfsVolumeConfiguration {
                uid: Some(1000),
                gid: Some(1000),
                ..Default::default()
            })),
        );

        assert_eq!(storage.managed_volumes(), vec!["managed", "owned"]);
    }
}
