//! Shared error type across perfmeter crates.

use serde_json::json;
use thiserror::Error;

/// Boxed error raised by caller-supplied code (hooks, watched work).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable error codes (reported in the `Last exception` custom data entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Method name could not be matched to the component's method set.
    Resolution,
    /// Committing a call into the registry failed.
    Record,
    /// A post-completion hook failed.
    Hook,
    /// Caller work executed through the session failed.
    Work,
    /// Invalid configuration.
    BadConfig,
    /// Unsupported configuration version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Resolution => "RESOLUTION",
            ErrorCode::Record => "RECORD",
            ErrorCode::Hook => "HOOK_EXECUTION",
            ErrorCode::Work => "WORK",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, PerfMeterError>;

/// Unified error type used by core and engine.
#[derive(Debug, Error)]
pub enum PerfMeterError {
    #[error("cannot resolve method `{method}` on component `{component}`")]
    Resolution { component: String, method: String },
    #[error("record failed: {0}")]
    Record(String),
    #[error("hook #{index} failed: {source}")]
    Hook {
        index: usize,
        #[source]
        source: BoxError,
    },
    #[error("work failed: {0}")]
    Work(#[source] BoxError),
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl PerfMeterError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            PerfMeterError::Resolution { .. } => ErrorCode::Resolution,
            PerfMeterError::Record(_) => ErrorCode::Record,
            PerfMeterError::Hook { .. } => ErrorCode::Hook,
            PerfMeterError::Work(_) => ErrorCode::Work,
            PerfMeterError::BadConfig(_) => ErrorCode::BadConfig,
            PerfMeterError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            PerfMeterError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// JSON form stored by the default exception handler.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "code": self.code().as_str(),
            "message": self.to_string(),
        })
    }
}
