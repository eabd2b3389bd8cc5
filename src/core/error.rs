//! Error handling for promptweave
//!
//! This module provides the error taxonomy of the resolution engine and the
//! user-friendly reporting used by the `pweave` CLI. The error system follows
//! two principles:
//! 1. **Strongly-typed errors** so API handlers and admin tooling can map each
//!    failure kind to a message or status code
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Resolution and validation** (fatal to the current call):
//!   [`PromptError::NotFound`], [`PromptError::CircularReference`],
//!   [`PromptError::MaxDepthExceeded`], [`PromptError::InvalidComponent`]
//! - **Lookup by key**: [`PromptError::SlugNotFound`]
//! - **Environment**: [`PromptError::Storage`], [`PromptError::Library`],
//!   [`PromptError::Config`], [`PromptError::Other`]
//!
//! Single resolution and graph validation propagate these straight up the call
//! stack. Bulk resolution is the one place errors are contained per id.
//!
//! # Examples
//!
//! ```rust,no_run
//! use promptweave::core::{ErrorContext, PromptError, user_friendly_error};
//!
//! let error = PromptError::MaxDepthExceeded { ceiling: 5, depth: 6 };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display(); // Shows colored error with a suggestion
//! ```

use colored::Colorize;
use std::fmt;
use strsim::levenshtein;
use thiserror::Error;

use super::prompt::PromptId;
use crate::constants::PROMPT_NOT_FOUND;

/// Maximum Levenshtein distance, as a percentage of the target length, for slug suggestions.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// The error type for every engine operation.
///
/// All variants own plain data so the type is `Clone + Send` and can be handed
/// back per id from a concurrent bulk batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    /// A referenced prompt id does not resolve to any stored prompt.
    ///
    /// Always fatal to the current resolution or validation call; never retried.
    #[error("{}: {id}", PROMPT_NOT_FOUND)]
    NotFound {
        /// The id that resolved to nothing
        id: PromptId,
    },

    /// No prompt carries the given slug.
    #[error("No prompt with slug '{slug}'")]
    SlugNotFound {
        /// The slug that was looked up
        slug: String,
    },

    /// The reference graph contains a cycle.
    ///
    /// `path` lists the ids from the walk's root to the repeated id, with the
    /// repeated id appearing at both ends of the cycle.
    #[error("Circular reference detected: {}", format_path(.path))]
    CircularReference {
        /// Offending path, ending with the id that closes the cycle
        path: Vec<PromptId>,
    },

    /// Nesting would exceed the fixed ceiling.
    #[error("Maximum nesting depth of {ceiling} exceeded (reached depth {depth})")]
    MaxDepthExceeded {
        /// The configured ceiling
        ceiling: usize,
        /// Depth that was reached, or would have been reached
        depth: usize,
    },

    /// Structural violation of the component list contract.
    #[error("Invalid component: {reason}")]
    InvalidComponent {
        /// What was wrong with the component list
        reason: String,
    },

    /// The backing store failed.
    #[error("Storage error during {operation}: {reason}")]
    Storage {
        /// The store operation that failed
        operation: String,
        /// Underlying error message
        reason: String,
    },

    /// A library file could not be parsed, rendered, or imported.
    #[error("Library error: {reason}")]
    Library {
        /// Why the library was rejected
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl PromptError {
    /// Build an [`PromptError::InvalidComponent`] from any displayable reason.
    pub fn invalid_component(reason: impl Into<String>) -> Self {
        Self::InvalidComponent {
            reason: reason.into(),
        }
    }

    /// Build a [`PromptError::Storage`] error for `operation`.
    pub fn storage(operation: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Storage {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a [`PromptError::Library`] error.
    pub fn library(reason: impl Into<String>) -> Self {
        Self::Library {
            reason: reason.into(),
        }
    }
}

fn format_path(path: &[PromptId]) -> String {
    path.iter().map(ToString::to_string).collect::<Vec<_>>().join(" → ")
}

/// Error context wrapper that provides user-friendly error information
///
/// `ErrorContext` wraps a [`PromptError`] and adds optional details and a
/// suggestion for resolving it. This is how `pweave` presents errors.
///
/// # Display Format
///
/// 1. **Error**: The main error message in red
/// 2. **Details**: Additional context about the error in yellow (optional)
/// 3. **Suggestion**: Actionable steps to resolve the issue in green (optional)
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: PromptError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: PromptError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
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

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`PromptError`] (also when already wrapped in an [`ErrorContext`]),
/// [`std::io::Error`], and TOML parse errors. Anything else is reported with
/// its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let error = match error.downcast::<ErrorContext>() {
        Ok(ctx) => return ctx,
        Err(error) => error,
    };

    if let Some(prompt_error) = error.downcast_ref::<PromptError>() {
        return create_error_context(prompt_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(PromptError::Other {
                    message: format!("Permission denied: {io_error}"),
                })
                .with_suggestion("Check ownership and permissions of the database and library files");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(PromptError::Other {
                    message: format!("File not found: {io_error}"),
                })
                .with_suggestion("Check that the file exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(PromptError::Library {
            reason: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of the file. Verify quotes, brackets, and [[prompts]] tables");
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(PromptError::Other {
        message,
    })
}

/// Map each [`PromptError`] variant to a context with tailored suggestions.
fn create_error_context(error: PromptError) -> ErrorContext {
    let (suggestion, details): (Option<String>, Option<String>) = match &error {
        PromptError::NotFound { .. } => (
            Some("Check the id with 'pweave export' or re-import the library that defines it".into()),
            Some("A component references a prompt that no longer exists in the store".into()),
        ),
        PromptError::SlugNotFound { .. } => {
            (Some("Use 'pweave export' to list the slugs available in the store".into()), None)
        }
        PromptError::CircularReference { path } => (
            Some("Remove one of the components along the chain so the references form a tree".into()),
            Some(format!(
                "Reference chain: {}. A compound prompt cannot include itself directly or indirectly",
                format_path(path)
            )),
        ),
        PromptError::MaxDepthExceeded { ceiling, .. } => (
            Some(format!(
                "Flatten the composition so no prompt nests more than {ceiling} compound levels deep"
            )),
            Some("Nesting is bounded to guarantee that resolution terminates".into()),
        ),
        PromptError::InvalidComponent { .. } => (
            Some(
                "Each component needs a prompt reference or text, and positions must run 0, 1, 2, ... without gaps"
                    .into(),
            ),
            None,
        ),
        PromptError::Storage { .. } => (
            Some("Check that the database path is writable and not locked by another process".into()),
            None,
        ),
        PromptError::Library { .. } => {
            (Some("Fix the library file and run the import again; nothing was written".into()), None)
        }
        PromptError::Config { .. } => {
            (Some("Check ~/.promptweave/config.toml or the file given with --config".into()), None)
        }
        PromptError::Other { .. } => (None, None),
    };

    ErrorContext {
        error,
        suggestion,
        details,
    }
}

/// Find up to three candidates close to `target` by Levenshtein distance.
#[must_use]
pub fn similar_names(target: &str, candidates: &[String]) -> Vec<String> {
    let mut scored: Vec<(String, usize)> =
        candidates.iter().map(|name| (name.clone(), levenshtein(target, name))).collect();

    scored.sort_by_key(|(_, distance)| *distance);

    scored
        .into_iter()
        .filter(|(_, distance)| *distance <= target.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
        .take(3)
        .map(|(name, _)| name)
        .collect()
}
