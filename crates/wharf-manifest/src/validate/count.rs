//! Task sizing, platform and autoscaling rules.

use crate::task::{
    valid_platforms, AdvancedCount, Count, IntRangeBand, Percentage, PlatformArgs,
    PlatformArgsOrString, QueueScaling, Range, RangeConfig, ScalingTrigger, TaskConfig,
    VALID_ARCHITECTURES, VALID_OS_FAMILIES,
};
use crate::workload::WorkloadKind;

use super::{FieldContext, Validate, ValidationError, ValidationResult};

impl TaskConfig {
    /// Validate platform, count and storage for a workload of `kind`.
    pub fn validate_for(&self, kind: WorkloadKind) -> ValidationResult {
        if let Some(platform) = &self.platform {
            platform.validate().field("platform")?;
        }
        if let Some(count) = &self.count {
            count.validate_for(kind).field("count")?;
        }
        if let Some(storage) = &self.storage {
            storage.validate().field("storage")?;
        }
        Ok(())
    }
}

impl Count {
    pub fn validate_for(&self, kind: WorkloadKind) -> ValidationResult {
        match self {
            Self::Value(_) => Ok(()),
            Self::Advanced(advanced) => advanced.validate_for(kind),
        }
    }
}

/// Autoscaling triggers a workload kind may use.
pub fn permitted_triggers(kind: WorkloadKind) -> &'static [ScalingTrigger] {
    use ScalingTrigger::*;
    match kind {
        WorkloadKind::LoadBalancedWebService => &[Cpu, Memory, Requests, ResponseTime],
        WorkloadKind::BackendService => &[Cpu, Memory],
        WorkloadKind::WorkerService => &[Cpu, Memory, QueueDelay],
        WorkloadKind::RequestDrivenWebService | WorkloadKind::ScheduledJob => &[],
    }
}

/// `"a", "b" or "c"`
fn quoted_list(fields: &[&str]) -> String {
    let quoted: Vec<String> = fields.iter().map(|f| format!("\"{}\"", f)).collect();
    join_or(&quoted)
}

fn join_or<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [init @ .., last] => {
            let init: Vec<&str> = init.iter().map(|s| s.as_ref()).collect();
            format!("{} or {}", init.join(", "), last.as_ref())
        }
    }
}

impl AdvancedCount {
    /// Validate autoscaling settings for a workload of `kind`.
    pub fn validate_for(&self, kind: WorkloadKind) -> ValidationResult {
        if self.is_empty() {
            return Ok(());
        }
        if kind.is_job() {
            return Err(ValidationError::AutoscalingNotSupported(kind));
        }

        let permitted = permitted_triggers(kind);
        let triggers = self.triggers();
        if let Some(unsupported) = triggers.iter().find(|t| !permitted.contains(*t)) {
            return Err(ValidationError::TriggerNotSupported {
                field: unsupported.field(),
                kind,
            });
        }

        let fields: Vec<&str> = permitted.iter().map(ScalingTrigger::field).collect();
        if self.spot.is_some() && (self.range.is_some() || !triggers.is_empty()) {
            let mut autoscaling = vec!["range"];
            autoscaling.extend(&fields);
            return Err(ValidationError::MutuallyExclusive("spot", autoscaling.join("/")));
        }

        if let Some(range) = &self.range {
            range.validate().field("range")?;
        }
        match (self.range.is_some(), triggers.is_empty()) {
            (true, true) => {
                return Err(ValidationError::RangeWithoutTrigger {
                    triggers: quoted_list(&fields),
                })
            }
            (false, false) => {
                return Err(ValidationError::TriggerWithoutRange {
                    triggers: join_or(&fields),
                })
            }
            _ => {}
        }

        if let Some(cpu) = &self.cpu {
            cpu.validate().field("cpu_percentage")?;
        }
        if let Some(memory) = &self.memory {
            memory.validate().field("memory_percentage")?;
        }
        if let Some(queue) = &self.queue_scaling {
            queue.validate().field("queue_delay")?;
        }
        Ok(())
    }
}

impl Validate for Percentage {
    fn validate(&self) -> ValidationResult {
        if (0..=100).contains(&self.0) {
            Ok(())
        } else {
            Err(ValidationError::Percentage(self.0))
        }
    }
}

impl Validate for QueueScaling {
    fn validate(&self) -> ValidationResult {
        if self.is_empty() {
            return Ok(());
        }
        let (latency, processing) = match (self.acceptable_latency, self.avg_processing_time) {
            (None, _) => {
                return Err(ValidationError::RequiredWith {
                    required: "acceptable_latency",
                    given: "msg_processing_time",
                })
            }
            (_, None) => {
                return Err(ValidationError::RequiredWith {
                    required: "msg_processing_time",
                    given: "acceptable_latency",
                })
            }
            (Some(latency), Some(processing)) => (latency, processing),
        };
        if processing.is_zero() {
            return Err(ValidationError::ZeroProcessingTime);
        }
        if processing > latency {
            return Err(ValidationError::ProcessingTimeExceedsLatency);
        }
        Ok(())
    }
}

impl Validate for Range {
    fn validate(&self) -> ValidationResult {
        match self {
            Self::Band(band) => band.validate(),
            Self::Config(config) => config.validate(),
        }
    }
}

impl Validate for IntRangeBand {
    fn validate(&self) -> ValidationResult {
        let (min, max) = self.parse().map_err(ValidationError::RangeFormat)?;
        if min > max {
            return Err(ValidationError::RangeOrder { min, max });
        }
        Ok(())
    }
}

impl Validate for RangeConfig {
    fn validate(&self) -> ValidationResult {
        let (Some(min), Some(max)) = (self.min, self.max) else {
            return Err(ValidationError::RangeBounds);
        };
        if min > max {
            return Err(ValidationError::RangeOrder { min, max });
        }
        Ok(())
    }
}

impl Validate for PlatformArgsOrString {
    fn validate(&self) -> ValidationResult {
        match self {
            Self::String(platform) => {
                let valid = valid_platforms();
                if valid.iter().any(|p| p == platform) {
                    Ok(())
                } else {
                    Err(ValidationError::Platform {
                        platform: platform.clone(),
                        valid: valid.join(", "),
                    })
                }
            }
            Self::Args(args) => args.validate(),
        }
    }
}

impl Validate for PlatformArgs {
    fn validate(&self) -> ValidationResult {
        let (os, arch) = match (&self.os_family, &self.arch) {
            (None, None) => return Ok(()),
            (Some(os), Some(arch)) => (os, arch),
            _ => return Err(ValidationError::PartialPlatform),
        };
        if !VALID_OS_FAMILIES.contains(&os.as_str()) {
            return Err(ValidationError::OsFamily {
                os: os.clone(),
                valid: VALID_OS_FAMILIES.join(", "),
            });
        }
        if !VALID_ARCHITECTURES.contains(&arch.as_str()) {
            return Err(ValidationError::Architecture {
                arch: arch.clone(),
                valid: VALID_ARCHITECTURES.join(", "),
            });
        }
        Ok(())
    }
}
