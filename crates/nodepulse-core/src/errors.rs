//! Fetch errors and their user-facing formatting
//!
//! Every failure of a snapshot source is reported as a [`FetchError`]. The
//! refresh coordinator treats all variants the same way; the helpers here
//! only decide how the error is presented.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single snapshot fetch
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("fetch timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("API error {code}: {message}")]
    Api { code: u16, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Invalid refresh configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} interval must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("retry interval ({retry}s) must not exceed poll interval ({poll}s)")]
    RetryExceedsPoll { retry: u64, poll: u64 },
}

/// Format a FetchError into a user-friendly message
///
/// # Examples
///
/// ```
/// use nodepulse_core::errors::{format_fetch_error, FetchError};
///
/// let error = FetchError::Transport("connection refused".to_string());
/// assert!(format_fetch_error(&error).contains("refused"));
/// ```
pub fn format_fetch_error(error: &FetchError) -> String {
    match error {
        FetchError::Timeout(after) => format_timeout_error(after.as_secs()),
        FetchError::Transport(msg) => format_transport_error(msg),
        FetchError::Api { code, message } => format_api_error(*code, message),
        FetchError::Config(msg) => format!("Invalid config: {}", msg),
    }
}

fn format_transport_error(msg: &str) -> String {
    let lower = msg.to_lowercase();
    if lower.contains("certificate") || lower.contains("tls") || lower.contains("ssl") {
        "TLS/certificate error - check kubeconfig credentials".to_string()
    } else if lower.contains("refused") {
        "Connection refused - is the API server reachable?".to_string()
    } else if lower.contains("timeout") || lower.contains("timed out") {
        "Connection timed out - API server may be slow or unreachable".to_string()
    } else if lower.contains("dns") || lower.contains("resolve") {
        "DNS resolution failed - check the cluster server address".to_string()
    } else if lower.contains("reset") {
        "Connection reset by peer".to_string()
    } else {
        format!("Connection failed: {}", msg)
    }
}

fn format_api_error(code: u16, message: &str) -> String {
    match code {
        401 => "Authentication failed - check kubeconfig".to_string(),
        403 => "Permission denied - check RBAC for listing nodes and pods".to_string(),
        404 => "Resource not found".to_string(),
        429 => "API server is throttling requests".to_string(),
        500..=599 => format!("API server error ({}): {}", code, message),
        _ => format!("API error ({}): {}", code, message),
    }
}

/// Format a timeout message
pub fn format_timeout_error(timeout_secs: u64) -> String {
    format!("Request timed out after {}s", timeout_secs)
}

/// Categorize an error for display purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network/connection issues
    Network,
    /// Authentication/authorization issues
    Auth,
    /// Configuration issues
    Config,
    /// Timeout issues
    Timeout,
    /// Resource not found
    NotFound,
    /// Other/unknown issues
    Other,
}

impl ErrorCategory {
    /// Get a short label for the category
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Network",
            ErrorCategory::Auth => "Auth",
            ErrorCategory::Config => "Config",
            ErrorCategory::Timeout => "Timeout",
            ErrorCategory::NotFound => "Not Found",
            ErrorCategory::Other => "Error",
        }
    }
}

/// Categorize a FetchError
pub fn categorize_error(error: &FetchError) -> ErrorCategory {
    match error {
        FetchError::Timeout(_) => ErrorCategory::Timeout,
        FetchError::Transport(msg) => {
            let lower = msg.to_lowercase();
            if lower.contains("timeout") || lower.contains("timed out") {
                ErrorCategory::Timeout
            } else if lower.contains("certificate") || lower.contains("tls") {
                ErrorCategory::Auth
            } else {
                ErrorCategory::Network
            }
        }
        FetchError::Api { code, .. } => match code {
            401 | 403 => ErrorCategory::Auth,
            404 => ErrorCategory::NotFound,
            408 | 504 => ErrorCategory::Timeout,
            _ => ErrorCategory::Other,
        },
        FetchError::Config(_) => ErrorCategory::Config,
    }
}

/// A fetch error as shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub message: String,
    pub category: ErrorCategory,
}

impl From<&FetchError> for FetchFailure {
    fn from(error: &FetchError) -> Self {
        Self {
            message: format_fetch_error(error),
            category: categorize_error(error),
        }
    }
}
