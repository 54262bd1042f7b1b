//! Error handling for soldeploy
//!
//! This module provides the error taxonomy used by the template graph and the
//! deployment engine, plus user-friendly error reporting for the CLI. The error
//! system follows two principles:
//! 1. **Strongly-typed errors** so orchestrators can tell input, structural,
//!    per-token, and internal failures apart
//! 2. **User-friendly messages** with actionable suggestions at the binary boundary
//!
//! # Error Categories
//!
//! - **Input**: [`SolutionError::EmptyRootIds`], [`SolutionError::ResourceNotFound`],
//!   [`SolutionError::ResourceInaccessible`] are reported before any work starts
//! - **Structural**: [`SolutionError::CircularDependency`] aborts before deployment or deletion
//! - **Per-token external**: [`SolutionError::HandlerFailed`] is recorded per token and the run continues
//! - **Unresolved tokens**: [`SolutionError::UnresolvedToken`] is a reportable condition in
//!   preview tooling and becomes [`SolutionError::InvariantViolation`] inside a deployment
//! - **Unimplemented types**: [`SolutionError::UnimplementedType`] is skipped with a warning
//!
//! Use [`user_friendly_error`] to convert any error into an [`ErrorContext`] with
//! contextual suggestions.
//!
//! # Examples
//!
//! ```rust,no_run
//! use soldeploy_cli::core::{SolutionError, ErrorContext};
//!
//! let context = ErrorContext::new(SolutionError::EmptyRootIds)
//!     .with_suggestion("Pass at least one item id to package");
//!
//! context.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for soldeploy operations.
///
/// Each variant names one failure mode from the error taxonomy. Variants carry
/// the token or id they concern so records and summaries can point at the
/// offending template.
#[derive(Error, Debug, Clone)]
pub enum SolutionError {
    /// No root id was supplied to the graph builder.
    #[error("No root item ids were provided")]
    EmptyRootIds,

    /// A resource id does not exist on the source platform.
    #[error("Resource '{id}' not found")]
    ResourceNotFound {
        /// The id that could not be found
        id: String,
    },

    /// A resource exists but the acting identity cannot read it.
    #[error("Resource '{id}' is not accessible: {reason}")]
    ResourceInaccessible {
        /// The id that could not be read
        id: String,
        /// Why the platform refused access
        reason: String,
    },

    /// The template graph contains a dependency cycle.
    ///
    /// `token` is one participant; `cycle` is the path that closes the loop.
    #[error("Template graph is not acyclic: {cycle}")]
    CircularDependency {
        /// A token that participates in the cycle
        token: String,
        /// The cycle rendered as `a → b → a`
        cycle: String,
    },

    /// A per-type handler call failed for external reasons.
    #[error("Failed to {operation} '{token}': {reason}")]
    HandlerFailed {
        /// Template token the call was made for
        token: String,
        /// The operation that failed (e.g., "create", "delete", "share")
        operation: String,
        /// Error detail reported by the handler
        reason: String,
    },

    /// A placeholder has no entry in the dictionary or run-wide context.
    #[error("Unresolved token '{{{{{placeholder}}}}}'")]
    UnresolvedToken {
        /// The placeholder path (without braces)
        placeholder: String,
    },

    /// An internal ordering invariant was violated.
    #[error("Internal invariant violated: {message}")]
    InvariantViolation {
        /// What went wrong
        message: String,
    },

    /// No handler is registered for a resource type.
    #[error("Resource type '{resource_type}' is not implemented")]
    UnimplementedType {
        /// The resource type without a handler
        resource_type: String,
    },

    /// An archive payload could not be read or written.
    #[error("Archive error: {reason}")]
    ArchiveError {
        /// Description of the archive failure
        reason: String,
    },

    /// A solution bundle could not be parsed.
    #[error("Invalid solution bundle {file}: {reason}")]
    BundleParseError {
        /// Path or label of the bundle
        file: String,
        /// Parse failure detail
        reason: String,
    },

    /// The bundle was written with an incompatible schema.
    #[error("Bundle schema {found} is not compatible with {supported}")]
    IncompatibleSchema {
        /// Schema version found in the bundle
        found: String,
        /// Schema version this build understands
        supported: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// I/O failure, kept as a message so the enum stays `Clone`.
    #[error("IO error: {0}")]
    Io(String),

    /// JSON failure, kept as a message so the enum stays `Clone`.
    #[error("JSON error: {0}")]
    Json(String),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl From<std::io::Error> for SolutionError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for SolutionError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<zip::result::ZipError> for SolutionError {
    fn from(error: zip::result::ZipError) -> Self {
        Self::ArchiveError {
            reason: error.to_string(),
        }
    }
}

impl SolutionError {
    /// Whether this error belongs to the input category of the taxonomy.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyRootIds | Self::ResourceNotFound { .. } | Self::ResourceInaccessible { .. }
        )
    }
}

/// Result alias for library operations.
pub type Result<T, E = SolutionError> = std::result::Result<T, E>;

/// Error wrapper with user-facing suggestion and detail text.
///
/// The CLI converts failures into this type before printing so every error
/// shows what happened, why, and what to try next.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: SolutionError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: SolutionError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors.
    ///
    /// - Error message: red and bold
    /// - Details: yellow
    /// - Suggestion: green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions.
///
/// Recognizes [`SolutionError`] anywhere in the error chain and [`std::io::Error`];
/// everything else is wrapped with its full context chain as the message.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(solution_error) = error.chain().find_map(|e| e.downcast_ref::<SolutionError>()) {
        let mut context = create_error_context(solution_error.clone());
        let outer = error.to_string();
        if context.details.is_none() && outer != solution_error.to_string() {
            context.details = Some(outer);
        }
        return context;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        return match io_error.kind() {
            std::io::ErrorKind::NotFound => ErrorContext::new(SolutionError::Io(format!("{error:#}")))
                .with_suggestion("Check that the file or directory exists and the path is correct"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorContext::new(SolutionError::Io(format!("{error:#}")))
                    .with_suggestion("Check file ownership and permissions")
            }
            _ => ErrorContext::new(SolutionError::Io(format!("{error:#}"))),
        };
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {cause}", i + 1));
        }
    }

    ErrorContext::new(SolutionError::Other { message })
}

fn create_error_context(error: SolutionError) -> ErrorContext {
    match &error {
        SolutionError::EmptyRootIds => ErrorContext::new(error)
            .with_suggestion("Pass one or more item ids, e.g. 'soldeploy package --portal ./src <id>'"),
        SolutionError::ResourceNotFound { .. } | SolutionError::ResourceInaccessible { .. } => {
            ErrorContext::new(error).with_suggestion(
                "Check the item id and sharing, or set 'skip_inaccessible = true' to leave unreachable dependencies external",
            )
        }
        SolutionError::CircularDependency { .. } => ErrorContext::new(error)
            .with_suggestion("Break the cycle by removing one of the references from the bundle")
            .with_details("Templates must form a directed acyclic graph so a build order exists"),
        SolutionError::IncompatibleSchema { .. } => ErrorContext::new(error)
            .with_suggestion("Re-package the solution with this version of soldeploy"),
        SolutionError::ConfigError { .. } => ErrorContext::new(error)
            .with_suggestion("Check the syntax of ~/.soldeploy/config.toml or the file passed with --config"),
        SolutionError::BundleParseError { .. } => ErrorContext::new(error)
            .with_suggestion("Make sure the file was produced by 'soldeploy package'"),
        _ => ErrorContext::new(error),
    }
}
