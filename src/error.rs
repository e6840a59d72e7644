//! Error types for the smart-home voice service
//!
//! This module provides structured error handling with machine-readable error
//! codes, severities and production-safe messages. Recoverable tool failures
//! (unknown device, unsupported operation, unknown tool) are *not* errors here:
//! they travel as [`crate::tools::ToolResult`] values.

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, HomeError>;

/// Error types for registry, assistant and transport operations
#[derive(Error, Debug)]
pub enum HomeError {
    /// Configuration errors (missing API key, bad port, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request validation errors, keyed by field
    #[error("Validation failed: {}", format_field_errors(.0))]
    Validation(HashMap<String, Vec<String>>),

    /// Not found errors (devices, areas, locations, webhook tokens)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Permission denied errors
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Missing or malformed caller identity
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Upstream AI API returned a non-success response
    #[error("Upstream transport failure: {0}")]
    UpstreamTransport(String),

    /// Audio transcription failed
    #[error("Transcription failed: {0}")]
    Transcription(String),

    /// Speech synthesis failed (always recovered by the assistant)
    #[error("Speech synthesis failed: {0}")]
    SpeechSynthesis(String),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

fn format_field_errors(errors: &HashMap<String, Vec<String>>) -> String {
    let mut fields: Vec<_> = errors.keys().map(String::as_str).collect();
    fields.sort_unstable();
    fields.join(", ")
}

/// Structured error code for machine-readable error handling
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Authentication errors (1100-1199)
    Unauthenticated,
    PermissionDenied,

    // Configuration errors (1200-1299)
    ConfigurationMissing,
    ConfigurationInvalid,

    // Device errors (1300-1399)
    DeviceNotFound,

    // Data errors (1400-1499)
    ParsingFailed,
    InvalidInput,
    ValidationFailed,

    // Service errors (1600-1699)
    ExternalServiceError,
    TranscriptionFailed,
    SpeechSynthesisFailed,

    // Internal errors (1900-1999)
    InternalError,
}

impl ErrorCode {
    /// Get numeric error code
    pub fn as_number(&self) -> u32 {
        match self {
            ErrorCode::Unauthenticated => 1101,
            ErrorCode::PermissionDenied => 1103,

            ErrorCode::ConfigurationMissing => 1201,
            ErrorCode::ConfigurationInvalid => 1202,

            ErrorCode::DeviceNotFound => 1301,

            ErrorCode::ParsingFailed => 1401,
            ErrorCode::InvalidInput => 1402,
            ErrorCode::ValidationFailed => 1403,

            ErrorCode::ExternalServiceError => 1603,
            ErrorCode::TranscriptionFailed => 1605,
            ErrorCode::SpeechSynthesisFailed => 1606,

            ErrorCode::InternalError => 1901,
        }
    }

    /// Get error category
    pub fn category(&self) -> &'static str {
        match self.as_number() {
            1100..=1199 => "authentication",
            1200..=1299 => "configuration",
            1300..=1399 => "device",
            1400..=1499 => "data",
            1600..=1699 => "service",
            1900..=1999 => "internal",
            _ => "unknown",
        }
    }
}

/// Error severity levels for alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Caller mistake or recoverable condition
    Warning,
    /// Failed operation
    Error,
    /// The service cannot work as configured
    Critical,
}

/// Where an error surfaced
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub code: ErrorCode,
    /// Module that reported the error (`http_transport`, `assistant`, ...)
    pub component: String,
    pub operation: String,
    /// Captured backtrace, debug builds only
    #[cfg(debug_assertions)]
    pub stack_trace: Option<String>,
}

impl ErrorContext {
    pub fn new(code: ErrorCode, component: &str, operation: &str) -> Self {
        Self {
            code,
            component: component.to_string(),
            operation: operation.to_string(),
            #[cfg(debug_assertions)]
            stack_trace: None,
        }
    }

    #[cfg(debug_assertions)]
    pub fn with_stack_trace(mut self) -> Self {
        self.stack_trace = Some(format!("{:?}", backtrace::Backtrace::new()));
        self
    }
}

/// Flattened error record written to the logs
#[derive(Debug, Clone)]
pub struct StructuredError {
    pub code: ErrorCode,
    pub code_number: u32,
    pub category: &'static str,
    /// Production-safe error message
    pub message: String,
    pub is_retryable: bool,
    pub component: String,
    pub operation: String,
    pub severity: ErrorSeverity,
}

impl HomeError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied<S: Into<String>>(msg: S) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Create an unauthenticated error
    pub fn unauthenticated<S: Into<String>>(msg: S) -> Self {
        Self::Unauthenticated(msg.into())
    }

    /// Create an upstream transport error
    pub fn upstream<S: Into<String>>(msg: S) -> Self {
        Self::UpstreamTransport(msg.into())
    }

    /// Create a transcription error
    pub fn transcription<S: Into<String>>(msg: S) -> Self {
        Self::Transcription(msg.into())
    }

    /// Create a speech synthesis error
    pub fn speech<S: Into<String>>(msg: S) -> Self {
        Self::SpeechSynthesis(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a single-field validation error
    pub fn validation<F: Into<String>, S: Into<String>>(field: F, msg: S) -> Self {
        Self::Validation(HashMap::from([(field.into(), vec![msg.into()])]))
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Generic(anyhow::anyhow!(msg.into()))
    }

    /// Map HomeError to structured error code
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            HomeError::Config(_) => ErrorCode::ConfigurationInvalid,
            HomeError::Http(_) => ErrorCode::ExternalServiceError,
            HomeError::Json(_) => ErrorCode::ParsingFailed,
            HomeError::Validation(_) => ErrorCode::ValidationFailed,
            HomeError::NotFound(_) => ErrorCode::DeviceNotFound,
            HomeError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            HomeError::Unauthenticated(_) => ErrorCode::Unauthenticated,
            HomeError::UpstreamTransport(_) => ErrorCode::ExternalServiceError,
            HomeError::Transcription(_) => ErrorCode::TranscriptionFailed,
            HomeError::SpeechSynthesis(_) => ErrorCode::SpeechSynthesisFailed,
            HomeError::InvalidInput(_) => ErrorCode::InvalidInput,
            HomeError::Io(_) | HomeError::Generic(_) => ErrorCode::InternalError,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            HomeError::Config(_) => ErrorSeverity::Critical,
            HomeError::UpstreamTransport(_) | HomeError::Http(_) | HomeError::Transcription(_) => {
                ErrorSeverity::Error
            }
            HomeError::Validation(_)
            | HomeError::InvalidInput(_)
            | HomeError::NotFound(_)
            | HomeError::PermissionDenied(_)
            | HomeError::Unauthenticated(_)
            | HomeError::SpeechSynthesis(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Check if error is retryable
    ///
    /// Nothing in the service retries on its own; this is reported to callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HomeError::Http(_) | HomeError::UpstreamTransport(_))
    }

    /// Get a production-safe error message that doesn't expose upstream internals
    pub fn sanitized_message(&self) -> String {
        #[cfg(debug_assertions)]
        {
            self.to_string()
        }
        #[cfg(not(debug_assertions))]
        {
            match self {
                HomeError::Config(_) => "Configuration error".to_string(),
                HomeError::Http(_) => "HTTP request failed".to_string(),
                HomeError::Json(_) => "Data parsing error".to_string(),
                HomeError::Validation(_) => self.to_string(),
                HomeError::NotFound(_) => "Requested resource not found".to_string(),
                HomeError::PermissionDenied(_) => "Access denied".to_string(),
                HomeError::Unauthenticated(_) => "Authentication required".to_string(),
                HomeError::UpstreamTransport(_) => "External service error".to_string(),
                HomeError::Transcription(_) => "Transcription failed".to_string(),
                HomeError::SpeechSynthesis(_) => "Speech synthesis failed".to_string(),
                HomeError::InvalidInput(_) => "Invalid input provided".to_string(),
                HomeError::Io(_) => "I/O operation failed".to_string(),
                HomeError::Generic(_) => "Internal error occurred".to_string(),
            }
        }
    }

    /// Flatten this error with the place it surfaced
    pub fn to_structured_error(&self, context: Option<ErrorContext>) -> StructuredError {
        let code = self.to_error_code();
        let (component, operation) = context
            .map(|c| (c.component, c.operation))
            .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));

        StructuredError {
            code_number: code.as_number(),
            category: code.category(),
            code,
            message: self.sanitized_message(),
            is_retryable: self.is_retryable(),
            component,
            operation,
            severity: self.severity(),
        }
    }
}

/// Error logging through `tracing`
pub struct ErrorReporter;

impl ErrorReporter {
    /// Log an error at the level its severity calls for
    pub fn log_error(error: &HomeError, context: Option<ErrorContext>) {
        #[cfg(debug_assertions)]
        if let Some(trace) = context.as_ref().and_then(|c| c.stack_trace.as_deref()) {
            tracing::trace!(stack_trace = trace, "Error backtrace");
        }

        let structured = error.to_structured_error(context);
        match structured.severity {
            ErrorSeverity::Critical | ErrorSeverity::Error => {
                tracing::error!(
                    error_code = structured.code_number,
                    category = structured.category,
                    component = structured.component,
                    operation = structured.operation,
                    retryable = structured.is_retryable,
                    "Error occurred: {}",
                    structured.message
                );
            }
            ErrorSeverity::Warning => {
                tracing::warn!(
                    error_code = structured.code_number,
                    category = structured.category,
                    component = structured.component,
                    operation = structured.operation,
                    "Warning: {}",
                    structured.message
                );
            }
        }
    }

    /// Context for an error, with a backtrace in debug builds
    pub fn create_context(code: ErrorCode, component: &str, operation: &str) -> ErrorContext {
        let context = ErrorContext::new(code, component, operation);
        #[cfg(debug_assertions)]
        let context = context.with_stack_trace();
        context
    }
}

/// Log a `HomeError` with the component and operation it surfaced in
#[macro_export]
macro_rules! log_structured_error {
    ($error:expr, $component:expr, $operation:expr) => {
        $crate::error::ErrorReporter::log_error(
            &$error,
            Some($crate::error::ErrorReporter::create_context(
                $error.to_error_code(),
                $component,
                $operation,
            )),
        )
    };
}
