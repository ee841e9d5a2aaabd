//! Task sizing: cpu, memory, platform, count and autoscaling.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::duration::ManifestDuration;
use crate::storage::Storage;

/// Task-level settings shared by container-based workloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformArgsOrString>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<Count>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<bool>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<Storage>,
}

impl TaskConfig {
    /// Desired task count when a fixed count or autoscaling minimum is known.
    pub fn desired_count(&self) -> Option<i64> {
        match self.count.as_ref()? {
            Count::Value(n) => Some(*n),
            Count::Advanced(a) => a.spot.or_else(|| a.range.as_ref().and_then(Range::min)),
        }
    }
}

/// Number of tasks: a plain integer or an autoscaling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Count {
    Value(i64),
    Advanced(AdvancedCount),
}

/// Autoscaling configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvancedCount {
    /// Fixed number of Fargate Spot tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,

    #[serde(default, rename = "cpu_percentage", skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Percentage>,

    #[serde(default, rename = "memory_percentage", skip_serializing_if = "Option::is_none")]
    pub memory: Option<Percentage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<ManifestDuration>,

    #[serde(default, rename = "queue_delay", skip_serializing_if = "Option::is_none")]
    pub queue_scaling: Option<QueueScaling>,
}

impl AdvancedCount {
    /// Autoscaling triggers that are set, in declaration order.
    pub fn triggers(&self) -> Vec<ScalingTrigger> {
        let mut set = Vec::new();
        if self.cpu.is_some() {
            set.push(ScalingTrigger::Cpu);
        }
        if self.memory.is_some() {
            set.push(ScalingTrigger::Memory);
        }
        if self.requests.is_some() {
            set.push(ScalingTrigger::Requests);
        }
        if self.response_time.is_some() {
            set.push(ScalingTrigger::ResponseTime);
        }
        if self.queue_scaling.as_ref().is_some_and(|q| !q.is_empty()) {
            set.push(ScalingTrigger::QueueDelay);
        }
        set
    }

    /// Whether neither spot nor any autoscaling field is set.
    pub fn is_empty(&self) -> bool {
        self.spot.is_none() && self.range.is_none() && self.triggers().is_empty()
    }
}

/// A metric that can drive autoscaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScalingTrigger {
    Cpu,
    Memory,
    Requests,
    ResponseTime,
    QueueDelay,
}

impl ScalingTrigger {
    /// Manifest field name for this trigger.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu_percentage",
            Self::Memory => "memory_percentage",
            Self::Requests => "requests",
            Self::ResponseTime => "response_time",
            Self::QueueDelay => "queue_delay",
        }
    }
}

impl fmt::Display for ScalingTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// Integer percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(pub i64);

/// Autoscaling bounds, as `"min-max"` or an explicit mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Range {
    Band(IntRangeBand),
    Config(RangeConfig),
}

impl Range {
    /// Lower bound when it can be determined.
    pub fn min(&self) -> Option<i64> {
        match self {
            Self::Band(b) => b.parse().ok().map(|(min, _)| min),
            Self::Config(c) => c.min,
        }
    }
}

/// Range written as `"min-max"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntRangeBand(pub String);

impl IntRangeBand {
    /// Parse into `(min, max)` without checking their order.
    pub fn parse(&self) -> Result<(i64, i64), String> {
        let invalid = || {
            format!(
                "invalid range value {}. Should be in format of ${{min}}-${{max}}",
                self.0
            )
        };
        let (min, max) = self.0.split_once('-').ok_or_else(invalid)?;
        let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        if !digits(min) || !digits(max) {
            return Err(invalid());
        }
        let min = min.parse().map_err(|_| invalid())?;
        let max = max.parse().map_err(|_| invalid())?;
        Ok((min, max))
    }
}

impl From<&str> for IntRangeBand {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Range written as a mapping, optionally splitting spot capacity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    /// Task count above which new tasks are placed on spot capacity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot_from: Option<i64>,
}

/// Queue backlog based scaling for worker services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueScaling {
    #[serde(default, rename = "acceptable_latency", skip_serializing_if = "Option::is_none")]
    pub acceptable_latency: Option<ManifestDuration>,

    #[serde(default, rename = "msg_processing_time", skip_serializing_if = "Option::is_none")]
    pub avg_processing_time: Option<ManifestDuration>,
}

impl QueueScaling {
    pub fn is_empty(&self) -> bool {
        self.acceptable_latency.is_none() && self.avg_processing_time.is_none()
    }
}

/// Operating system families tasks may run on.
pub const VALID_OS_FAMILIES: &[&str] = &["linux"];

/// CPU architectures tasks may run on.
pub const VALID_ARCHITECTURES: &[&str] = &["amd64"];

/// Task platform, as `"os/arch"` or an explicit mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlatformArgsOrString {
    String(String),
    Args(PlatformArgs),
}

impl PlatformArgsOrString {
    /// Platform in `os/arch` form, if both parts are known.
    pub fn as_platform_string(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Args(PlatformArgs {
                os_family: Some(os),
                arch: Some(arch),
            }) => Some(format!("{}/{}", os, arch)),
            Self::Args(_) => None,
        }
    }
}

/// Platform written as separate OS family and architecture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformArgs {
    #[serde(default, rename = "osfamily", skip_serializing_if = "Option::is_none")]
    pub os_family: Option<String>,
    #[serde(default, rename = "architecture", skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// Every valid `os/arch` combination.
pub fn valid_platforms() -> Vec<String> {
    VALID_OS_FAMILIES
        .iter()
        .flat_map(|os| VALID_ARCHITECTURES.iter().map(move |arch| format!("{}/{}", os, arch)))
        .collect()
}
