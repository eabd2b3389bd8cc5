//! Reference graph checks.
//!
//! - [`validator`] walks the graph lazily through a [`PromptSource`](crate::source::PromptSource)
//!   and gates every write that adds a reference
//! - [`reference_graph`] materializes a whole library's references for
//!   import ordering and store-wide checks

pub mod reference_graph;
pub mod validator;

pub use reference_graph::{Cycle, ReferenceGraph};
pub use validator::{GraphValidator, validate_component_list, validate_prompt_components};
