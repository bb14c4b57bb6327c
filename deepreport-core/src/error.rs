//! Unified error handling system
//!
//! Provides structured error types with context, recovery suggestions, and proper error chaining.
//! Variants map onto the failure taxonomy of a report run: some are absorbed locally
//! (search faults), some abort a single section branch (grading), and some abort the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub type ReportResult<T> = Result<T, ReportError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the DeepReport system
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Plan validation error: {message}")]
    PlanValidation {
        message: String,
        context: ErrorContext,
    },

    #[error("Search provider error ({provider}): {message}")]
    SearchProvider {
        message: String,
        provider: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Grade format error for section '{section}': {message}")]
    GradeFormat {
        message: String,
        section: String,
        context: ErrorContext,
    },

    #[error("Duplicate section claimed: {section}")]
    DuplicateSection {
        section: String,
        context: ErrorContext,
    },

    #[error("Incomplete report, missing sections: {}", missing.join(", "))]
    IncompleteReport {
        missing: Vec<String>,
        context: ErrorContext,
    },

    #[error("LLM error: {message}")]
    Llm {
        message: String,
        provider: Option<String>,
        model: Option<String>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Operation timeout: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },

    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after_ms: Option<u64>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl ReportError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            ReportError::PlanValidation { context, .. } => Some(context),
            ReportError::SearchProvider { context, .. } => Some(context),
            ReportError::GradeFormat { context, .. } => Some(context),
            ReportError::DuplicateSection { context, .. } => Some(context),
            ReportError::IncompleteReport { context, .. } => Some(context),
            ReportError::Llm { context, .. } => Some(context),
            ReportError::Config { context, .. } => Some(context),
            ReportError::Network { context, .. } => Some(context),
            ReportError::Timeout { context, .. } => Some(context),
            ReportError::RateLimit { context, .. } => Some(context),
            ReportError::Internal { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Check if error is recoverable by retrying the same call
    pub fn is_recoverable(&self) -> bool {
        match self {
            ReportError::Network { .. } => true,
            ReportError::Timeout { .. } => true,
            ReportError::RateLimit { .. } => true,
            ReportError::Config { .. } => false,
            ReportError::PlanValidation { .. } => false,
            ReportError::GradeFormat { .. } => false,
            _ => false,
        }
    }

    /// Whether this error must abort the whole run rather than a single section branch
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            ReportError::PlanValidation { .. }
                | ReportError::DuplicateSection { .. }
                | ReportError::IncompleteReport { .. }
                | ReportError::Config { .. }
        )
    }

    /// Get retry delay in milliseconds for recoverable errors
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            ReportError::Network { .. } => Some(1000),
            ReportError::Timeout { .. } => Some(2000),
            ReportError::RateLimit { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }

    /// Create an LLM error for the given component
    pub fn llm<S: Into<String>>(message: S, component: &str) -> Self {
        ReportError::Llm {
            message: message.into(),
            provider: None,
            model: None,
            context: ErrorContext::new(component),
        }
    }

    /// Create an internal error for the given component
    pub fn internal<S: Into<String>>(message: S, component: &str) -> Self {
        ReportError::Internal {
            message: message.into(),
            source: None,
            context: ErrorContext::new(component),
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            ReportError::Internal { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Internal error occurred"
                );
            }
            ReportError::PlanValidation { .. }
            | ReportError::DuplicateSection { .. }
            | ReportError::IncompleteReport { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Run aborted"
                );
            }
            ReportError::SearchProvider { .. }
            | ReportError::Network { .. }
            | ReportError::Timeout { .. }
            | ReportError::RateLimit { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Provider error (may be recoverable)"
                );
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::ReportError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'deepreport config --init' to create default config"),
        }
    };
}

#[macro_export]
macro_rules! plan_validation_error {
    ($msg:expr, $component:expr) => {
        $crate::ReportError::PlanValidation {
            message: $msg.to_string(),
            context: $crate::ErrorContext::new($component)
                .with_operation("validate_plan")
                .with_suggestion("Provide plan feedback to regenerate the plan"),
        }
    };
}

#[macro_export]
macro_rules! search_provider_error {
    ($msg:expr, $provider:expr, $component:expr) => {
        $crate::ReportError::SearchProvider {
            message: $msg.to_string(),
            provider: $provider.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
}
