//! Validation failures, located by the path of fields that led to them.

use crate::workload::WorkloadKind;

/// Result of validating a manifest or one of its parts.
pub type ValidationResult = Result<(), ValidationError>;

/// A manifest validation failure.
///
/// Nested failures are wrapped in [`ValidationError::Field`] so the rendered
/// message reads `validate "http": validate "allowed_source_ips[1]": ...`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("validate \"{field}\": {source}")]
    Field {
        field: String,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("validate container dependencies: {0}")]
    Dependencies(#[source] DependencyError),

    #[error("\"{0}\" must be specified")]
    MissingField(&'static str),

    #[error("\"{required}\" must be specified if \"{given}\" is specified")]
    RequiredWith {
        required: &'static str,
        given: &'static str,
    },

    #[error("must specify one, not both, of \"{0}\" and \"{1}\"")]
    MutuallyExclusive(&'static str, String),

    #[error("must specify one of \"build\" and \"location\"")]
    ImageSource,

    #[error("container dependency status must be one of START, COMPLETE, SUCCESS or HEALTHY")]
    DependencyStatus,

    #[error("{0}")]
    Cidr(String),

    #[error("cannot have autoscaling options for workloads of type '{0}'")]
    AutoscalingNotSupported(WorkloadKind),

    #[error("\"{field}\" is not supported for workloads of type '{kind}'")]
    TriggerNotSupported {
        field: &'static str,
        kind: WorkloadKind,
    },

    #[error("must specify at least one of {triggers} if \"range\" is specified")]
    RangeWithoutTrigger { triggers: String },

    #[error("\"range\" must be specified if \"{triggers}\" are specified")]
    TriggerWithoutRange { triggers: String },

    #[error("percentage value {0} must be an integer from 0 to 100")]
    Percentage(i64),

    #[error("\"msg_processing_time\" cannot be 0")]
    ZeroProcessingTime,

    #[error("\"msg_processing_time\" cannot be longer than \"acceptable_latency\"")]
    ProcessingTimeExceedsLatency,

    #[error("{0}")]
    RangeFormat(String),

    #[error("\"min/max\" must be specified")]
    RangeBounds,

    #[error("min value {min} cannot be greater than max value {max}")]
    RangeOrder { min: i64, max: i64 },

    #[error("ephemeral storage must be between 20 GiB and 200 GiB")]
    EphemeralSize,

    #[error("cannot specify more than one managed volume per service")]
    MultipleManagedVolumes,

    #[error("\"uid\" must not be 0")]
    RootUid,

    #[error("\"root_dir\" must be either empty or \"/\" and \"auth.iam\" must be true when \"access_point_id\" is used")]
    AccessPoint,

    #[error("path can only contain the characters a-zA-Z0-9.-_/")]
    PathCharacters,

    #[error("\"placement\" cannot be empty")]
    EmptyPlacement,

    #[error("\"placement\" {0} must be one of {1}")]
    Placement(String, String),

    #[error("platform {platform} is invalid; the valid platform is: {valid}")]
    Platform { platform: String, valid: String },

    #[error("fields \"osfamily\" and \"architecture\" must either both be specified or both be empty")]
    PartialPlatform,

    #[error("OS {os} is invalid; the valid operating system is: {valid}")]
    OsFamily { os: String, valid: String },

    #[error("architecture {arch} is invalid; the valid architecture is: {valid}")]
    Architecture { arch: String, valid: String },

    #[error("\"name\" can only contain letters, numbers, underscores, and hyphens")]
    TopicName,

    #[error("service name must start with a letter, contain only lower-case letters, numbers, and hyphens, and have no consecutive or trailing hyphen")]
    ServiceName,

    #[error("\"{0}\" cannot be overridden with a custom value")]
    BlockedOverride(&'static str),
}

impl ValidationError {
    /// Wrap this error under `field`.
    pub fn under(self, field: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all field wrappers removed.
    pub fn root_cause(&self) -> &ValidationError {
        match self {
            Self::Field { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Field path leading to the innermost error, outermost first.
    pub fn path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut current = self;
        while let Self::Field { field, source } = current {
            path.push(field.as_str());
            current = source;
        }
        path
    }
}

/// Container dependency graph failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyError {
    #[error("validate {container} container dependencies status: essential container {target} can only have status START or HEALTHY")]
    EssentialStatus { container: String, target: String },

    #[error("container {0} cannot depend on itself")]
    SelfDependency(String),

    #[error("container {0} does not exist")]
    UnknownContainer(String),

    #[error("circular container dependency chain includes the following containers: [{}]", .0.join(" "))]
    Circular(Vec<String>),
}

/// Attach a field name to a failed validation.
pub(crate) trait FieldContext {
    fn field(self, name: impl Into<String>) -> Self;
}

impl FieldContext for ValidationResult {
    fn field(self, name: impl Into<String>) -> Self {
        self.map_err(|e| e.under(name))
    }
}
