//! promptweave: compound prompt resolution
//!
//! A prompt is either literal text or a *compound* prompt assembled from an
//! ordered list of components. Each component may reference another prompt and
//! wrap its resolved text with literal `text_before` and `text_after`. Compound
//! prompts nest, so resolving one means walking a reference graph.
//!
//! # Architecture
//!
//! - [`core`] - Prompt, component and result types, plus [`core::PromptError`]
//! - [`source`] - The fetch capabilities the algorithms are written against
//! - [`graph`] - Cycle detection, nesting depth, component list validation
//! - [`resolver`] - Single, preview and bulk resolution
//! - [`store`] - SQLite storage with write-time validation
//! - [`library`] - Two-pass TOML/JSON import and export by slug
//! - [`config`] - Global configuration (`~/.promptweave/config.toml`)
//! - [`cli`] - The `pweave` command-line interface
//!
//! # Example
//!
//! ```rust,no_run
//! use promptweave::core::{Component, Prompt, PromptRecord};
//! use promptweave::resolver::PromptResolver;
//! use promptweave::source::PromptMap;
//!
//! let mut map = PromptMap::new();
//! map.insert(PromptRecord::bare(Prompt::simple(1, "name", "Ada")));
//! map.insert(PromptRecord {
//!     prompt: Prompt::compound(2, "greeting"),
//!     components: vec![Component::reference(0, 1).with_before("Hello,").into()],
//! });
//!
//! let resolver = PromptResolver::new(&map, 10);
//! assert_eq!(resolver.resolve_text(2.into()).unwrap(), "Hello,\n\nAda");
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod graph;
pub mod library;
pub mod resolver;
pub mod source;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
