//! Prompt, component, and resolution result types.
//!
//! These are the records the engine reads. They mirror two relational tables
//! (`prompts` and `prompt_components`), so references between prompts are ids,
//! never pointers. The engine never mutates them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Opaque identifier of a stored prompt.
///
/// Backed by the SQLite rowid of the `prompts` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptId(pub i64);

impl PromptId {
    /// Raw integer value of this id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<i64> for PromptId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for PromptId {
    type Err = std::num::ParseIntError;

    /// Accepts both `42` and `#42`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse::<i64>().map(Self)
    }
}

/// A named unit of text.
///
/// When `is_compound` is set, `text` is ignored during resolution and the
/// prompt's component list drives it instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// Unique identifier.
    pub id: PromptId,
    /// Unique human-readable key, used by import/export and the CLI.
    pub slug: String,
    /// Optional display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Literal content of a non-compound prompt. Absent resolves to `""`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Whether the prompt is assembled from components.
    pub is_compound: bool,
    /// Cached deepest nesting level reachable from this prompt (compound only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
}

impl Prompt {
    /// Create a non-compound prompt with literal text.
    pub fn simple(id: impl Into<PromptId>, slug: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            title: None,
            text: Some(text.into()),
            is_compound: false,
            max_depth: None,
        }
    }

    /// Create a compound prompt. Its components live alongside it in a [`PromptRecord`].
    pub fn compound(id: impl Into<PromptId>, slug: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            title: None,
            text: None,
            is_compound: true,
            max_depth: None,
        }
    }

    /// Literal text of a non-compound prompt, empty when absent.
    #[must_use]
    pub fn literal_text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// One ordered slot inside a compound prompt.
///
/// At least one of `component_prompt_id`, `text_before`, and `text_after`
/// must be set; see [`crate::graph::validate_component_list`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Zero-based position within the owning prompt.
    pub position: u32,
    /// Referenced prompt supplying the slot content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_prompt_id: Option<PromptId>,
    /// Literal text inserted before the slot content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_before: Option<String>,
    /// Literal text inserted after the slot content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_after: Option<String>,
}

impl Component {
    /// A component referencing another prompt with no surrounding text.
    pub fn reference(position: u32, prompt_id: impl Into<PromptId>) -> Self {
        Self {
            position,
            component_prompt_id: Some(prompt_id.into()),
            ..Self::default()
        }
    }

    /// A literal-text-only component.
    pub fn text(position: u32, text: impl Into<String>) -> Self {
        Self {
            position,
            text_before: Some(text.into()),
            ..Self::default()
        }
    }

    /// Set the text placed before the slot content.
    #[must_use]
    pub fn with_before(mut self, text: impl Into<String>) -> Self {
        self.text_before = Some(text.into());
        self
    }

    /// Set the text placed after the slot content.
    #[must_use]
    pub fn with_after(mut self, text: impl Into<String>) -> Self {
        self.text_after = Some(text.into());
        self
    }

    /// True when the component carries neither a reference nor any text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.component_prompt_id.is_none() && self.text_before.is_none() && self.text_after.is_none()
    }
}

/// A component joined with its referenced prompt's core fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// The stored component row.
    #[serde(flatten)]
    pub component: Component,
    /// Core fields of the referenced prompt, when the component has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced: Option<Prompt>,
}

impl From<Component> for ComponentRecord {
    fn from(component: Component) -> Self {
        Self {
            component,
            referenced: None,
        }
    }
}

/// A prompt together with one level of its components.
///
/// This is the unit every fetch capability returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRecord {
    /// The prompt row.
    pub prompt: Prompt,
    /// Components of a compound prompt; empty for non-compound prompts.
    #[serde(default)]
    pub components: Vec<ComponentRecord>,
}

impl PromptRecord {
    /// A record without components (non-compound prompts and referenced stubs).
    #[must_use]
    pub fn bare(prompt: Prompt) -> Self {
        Self {
            prompt,
            components: Vec::new(),
        }
    }

    /// Id of the wrapped prompt.
    #[must_use]
    pub fn id(&self) -> PromptId {
        self.prompt.id
    }

    /// Components in ascending position order, regardless of stored order.
    #[must_use]
    pub fn sorted_components(&self) -> Vec<&Component> {
        let mut components: Vec<&Component> = self.components.iter().map(|c| &c.component).collect();
        components.sort_by_key(|c| c.position);
        components
    }

    /// Ids referenced by this record's components, in position order.
    pub fn referenced_ids(&self) -> impl Iterator<Item = PromptId> + '_ {
        self.sorted_components().into_iter().filter_map(|c| c.component_prompt_id)
    }
}

/// Outcome of resolving one prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Final assembled text.
    pub resolved_text: String,
    /// Maximum recursion depth encountered while producing the text.
    pub depth_reached: usize,
    /// Every prompt id visited, root included, deduplicated.
    pub used_prompt_ids: BTreeSet<PromptId>,
}
