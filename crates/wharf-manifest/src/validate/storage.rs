//! Storage and EFS volume rules.

use crate::storage::{EfsConfigOrBool, EfsVolumeConfiguration, Storage, Volume};

use super::{validate_path, FieldContext, Validate, ValidationError, ValidationResult};

const MIN_EPHEMERAL_GIB: i64 = 20;
const MAX_EPHEMERAL_GIB: i64 = 200;

impl Validate for Storage {
    fn validate(&self) -> ValidationResult {
        if let Some(size) = self.ephemeral {
            if !(MIN_EPHEMERAL_GIB..=MAX_EPHEMERAL_GIB).contains(&size) {
                return Err(ValidationError::EphemeralSize.under("ephemeral"));
            }
        }
        for (name, volume) in &self.volumes {
            volume.validate().field(format!("volumes[{}]", name))?;
        }
        if self.managed_volumes().len() > 1 {
            return Err(ValidationError::MultipleManagedVolumes);
        }
        Ok(())
    }
}

impl Validate for Volume {
    fn validate(&self) -> ValidationResult {
        if let Some(efs) = &self.efs {
            efs.validate().field("efs")?;
        }
        self.mount.validate()
    }
}

impl Validate for EfsConfigOrBool {
    fn validate(&self) -> ValidationResult {
        match self {
            Self::Enabled(_) => Ok(()),
            Self::Advanced(cfg) => cfg.validate(),
        }
    }
}

impl Validate for EfsVolumeConfiguration {
    fn validate(&self) -> ValidationResult {
        if self.is_empty() {
            return Ok(());
        }
        if self.has_uid_gid() && self.has_existing_fs_fields() {
            return Err(ValidationError::MutuallyExclusive(
                "uid/gid",
                "id/root_dir/auth".to_string(),
            ));
        }
        match (self.uid, self.gid) {
            (Some(_), None) => {
                return Err(ValidationError::RequiredWith {
                    required: "gid",
                    given: "uid",
                })
            }
            (None, Some(_)) => {
                return Err(ValidationError::RequiredWith {
                    required: "uid",
                    given: "gid",
                })
            }
            (Some(0), Some(_)) => return Err(ValidationError::RootUid),
            _ => {}
        }

        let uses_access_point = self
            .auth_config
            .as_ref()
            .is_some_and(|auth| auth.access_point_id.is_some());
        if uses_access_point {
            let root_ok = matches!(self.root_directory.as_deref(), None | Some("") | Some("/"));
            let iam_ok = self
                .auth_config
                .as_ref()
                .and_then(|auth| auth.iam)
                .unwrap_or(false);
            if !root_ok || !iam_ok {
                return Err(ValidationError::AccessPoint);
            }
        }

        if let Some(root) = self.root_directory.as_deref().filter(|r| !r.is_empty()) {
            validate_path(root).field("root_dir")?;
        }
        Ok(())
    }
}
