//! Error handling for the timeline inspector
//!
//! This module defines custom error types and a Result alias for use
//! throughout the crate. Query paths (aggregation, search) never fail;
//! only I/O, parsing and configuration go through these types.

use thiserror::Error;

/// Main error type for timeline inspector operations
#[derive(Error, Debug)]
pub enum TimelineError {
    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Trace file contents that cannot be turned into a model
    #[error("Trace format error: {0}")]
    TraceFormat(String),

    /// A user supplied filter pattern that does not compile
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Another load or save is already running
    #[error("Operation already in progress: {0}")]
    OperationInProgress(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<TimelineError>,
    },
}

impl TimelineError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        TimelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a pattern error from a regex compilation failure
    pub fn from_regex_error(pattern: &str, err: regex::Error) -> Self {
        TimelineError::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for timeline inspector operations
pub type Result<T> = std::result::Result<T, TimelineError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| TimelineError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| TimelineError::Io(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TimelineError::TraceFormat("missing traceEvents".to_string());
        assert_eq!(err.to_string(), "Trace format error: missing traceEvents");
    }

    #[test]
    fn test_error_with_context() {
        let err = TimelineError::Config("bad value".to_string());
        let with_ctx = err.with_context("Failed to load config");
        assert!(with_ctx.to_string().contains("Failed to load config"));
        assert!(with_ctx.to_string().contains("bad value"));
    }

    #[test]
    fn test_invalid_pattern_error() {
        let regex_err = regex::Regex::new("(unclosed").unwrap_err();
        let err = TimelineError::from_regex_error("(unclosed", regex_err);
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn test_io_result_context() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        let err = result.context("Failed to open trace").unwrap_err();
        assert!(err.to_string().starts_with("Failed to open trace"));
    }
}
