use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("No target identifier provided (expected context key `tenantId`)")]
    MissingTargetError,

    #[error("Config file for target `{target}` not found at {}", path.display())]
    ConfigNotFoundError { target: String, path: PathBuf },

    #[error("Failed to parse config file {}: {message}", path.display())]
    ConfigParseError { path: PathBuf, message: String },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value `{value}` for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Logical id `{logical_id}` is declared twice in stack {stack}")]
    DuplicateLogicalId { stack: String, logical_id: String },

    #[error("Export `{name}` is published twice in stack {stack}")]
    DuplicateExport { stack: String, name: String },

    #[error("Lookup of `{name}` failed: {message}")]
    LookupError { name: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Invocation,
    Configuration,
    Construction,
    Lookup,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl StackError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StackError::MissingTargetError => ErrorCategory::Invocation,
            StackError::ConfigNotFoundError { .. }
            | StackError::ConfigParseError { .. }
            | StackError::MissingConfigError { .. }
            | StackError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            StackError::DuplicateLogicalId { .. } | StackError::DuplicateExport { .. } => {
                ErrorCategory::Construction
            }
            StackError::LookupError { .. } => ErrorCategory::Lookup,
            StackError::IoError(_) | StackError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Invocation | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Lookup => ErrorSeverity::Medium,
            ErrorCategory::Construction | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// Process exit status for this error. Every error is fatal, so this is never 0.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low | ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            StackError::MissingTargetError => {
                "No target cluster id provided. Use -c tenantId=<id> to target a specific stack."
                    .to_string()
            }
            StackError::ConfigNotFoundError { target, path } => format!(
                "Config file for tenant {} not found at {}",
                target,
                path.display()
            ),
            StackError::ConfigParseError { path, message } => {
                format!("Could not parse {}: {}", path.display(), message)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            StackError::MissingTargetError => "Pass -c tenantId=<id>, e.g. -c tenantId=cust-001",
            StackError::ConfigNotFoundError { .. } => {
                "Create config/<lowercased-id>.yaml or check the --config-dir path"
            }
            StackError::ConfigParseError { .. } => {
                "Fix the syntax error; the top level of every config document must be a mapping"
            }
            StackError::MissingConfigError { .. } => {
                "Add the field to the tenant file; nested keys are not inherited from common config"
            }
            StackError::InvalidConfigValueError { .. } => "Correct the value and re-run",
            StackError::DuplicateLogicalId { .. } | StackError::DuplicateExport { .. } => {
                "Two declarations share a name; rename one of them"
            }
            StackError::LookupError { .. } => {
                "Set network.s3PrefixListId in the config or build with --features aws and valid credentials"
            }
            StackError::IoError(_) => "Check that the output directory is writable",
            StackError::SerializationError(_) => "This is a bug in template construction",
        }
    }
}

pub type Result<T> = std::result::Result<T, StackError>;
