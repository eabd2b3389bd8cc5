//! Core types and error handling for promptweave
//!
//! This module holds the records the engine reads and the error taxonomy it
//! reports. Every other module builds on these.
//!
//! # Modules
//!
//! ## `prompt` - Records
//!
//! - [`Prompt`] and [`Component`] mirror the two stored tables
//! - [`PromptRecord`] is one prompt plus one level of components, the unit a
//!   fetch capability returns
//! - [`ResolutionResult`] is the derived output of resolution
//!
//! ## `error` - Error Handling
//!
//! - [`PromptError`] - Enumerated failure kinds
//! - [`ErrorContext`] - User-friendly wrapper with suggestions and details
//! - [`user_friendly_error`] - Convert any error to the user-friendly format

pub mod error;
pub mod prompt;

pub use error::{ErrorContext, PromptError, similar_names, user_friendly_error};
pub use prompt::{Component, ComponentRecord, Prompt, PromptId, PromptRecord, ResolutionResult};

/// Result alias used by every engine operation.
pub type Result<T, E = PromptError> = std::result::Result<T, E>;
