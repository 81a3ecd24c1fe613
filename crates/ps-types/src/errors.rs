use thiserror::Error;

/// Main error type for the sensitivity engine
#[derive(Error, Debug)]
pub enum PsError {
    #[error("Sensitivity error: {0}")]
    Sensitivity(#[from] SensitivityError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl PsError {
    /// The underlying sensitivity error, if this is one.
    pub fn as_sensitivity(&self) -> Option<&SensitivityError> {
        match self {
            Self::Sensitivity(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors raised while expanding, preparing, or applying parameter changes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensitivityError {
    #[error("Unknown parameter: {label} is not in the variation parameter set")]
    UnknownParameter { label: String },

    #[error("Model has no coefficient named {name}")]
    MissingCoefficient { name: String },

    #[error("Malformed descriptor at record {record}: {message}")]
    MalformedDescriptor { record: usize, message: String },

    #[error("Coefficient {name} is not mutable")]
    ImmutableCoefficient { name: String },

    #[error("Coefficient {coefficient} has no entry at index {index}")]
    UnknownIndex { coefficient: String, index: String },

    #[error("Parameter {label} requires metadata field {field}")]
    MissingMetadata { label: String, field: String },

    #[error("Invalid value {value} for parameter {label}")]
    InvalidValue { label: String, value: f64 },
}

/// Result type alias for sensitivity-engine operations
pub type PsResult<T> = Result<T, PsError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::PsError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::PsError::Config(format!($($arg)*))
    };
}
