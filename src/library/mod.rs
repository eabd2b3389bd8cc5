//! Prompt libraries: import and export of whole prompt sets.
//!
//! A library file lists prompts by slug. Compound prompts name their
//! components' prompts by slug too, so a library is portable between stores
//! whose ids differ.
//!
//! ```toml
//! [[prompts]]
//! slug = "persona"
//! text = "You are a careful reviewer."
//!
//! [[prompts]]
//! slug = "review"
//! title = "Code review"
//!
//! [[prompts.components]]
//! prompt = "persona"
//!
//! [[prompts.components]]
//! before = "Review the following change:"
//! ```
//!
//! # Import
//!
//! Components reference prompts by id, and ids exist only once rows exist, so
//! [`import_library`] runs in two passes inside one transaction: pass 1 creates
//! every prompt row and learns each slug's id, pass 2 creates the components.
//! Cached `max_depth` values are then backfilled in dependencies-first order.
//!
//! Everything that can fail is checked before the first write: duplicate or
//! already-stored slugs, unknown references, malformed component lists, cycles
//! (reported with slugs), and nesting beyond the ceiling. A rejected library
//! writes nothing.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::core::{Component, Prompt, PromptError, PromptId, PromptRecord, Result, similar_names};
use crate::graph::{GraphValidator, ReferenceGraph, validate_component_list};
use crate::source::{PromptMap, PromptSource};
use crate::store::{NewPrompt, SqliteStore, insert_component, insert_prompt};

/// Serialization format of a library file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LibraryFormat {
    /// TOML with `[[prompts]]` tables.
    #[default]
    Toml,
    /// JSON with a top-level `prompts` array.
    Json,
}

impl LibraryFormat {
    /// Guess the format from a file extension; anything but `.json` is TOML.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// One component of a library prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryComponent {
    /// Slug of the referenced prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Text placed before the referenced content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    /// Text placed after the referenced content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

/// One prompt of a library.
///
/// A prompt with a `components` list is compound, even when the list is empty
/// (which import rejects).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryPrompt {
    /// Unique key.
    pub slug: String,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Literal text of a non-compound prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Ordered components of a compound prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<LibraryComponent>>,
}

impl LibraryPrompt {
    /// Whether this entry describes a compound prompt.
    #[must_use]
    pub fn is_compound(&self) -> bool {
        self.components.is_some()
    }
}

/// A whole library file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryFile {
    /// Prompts in file order.
    #[serde(default)]
    pub prompts: Vec<LibraryPrompt>,
}

impl LibraryFile {
    /// Parse library content.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Library`] with the parser's message.
    pub fn parse(content: &str, format: LibraryFormat) -> Result<Self> {
        match format {
            LibraryFormat::Toml => toml::from_str(content).map_err(|e| PromptError::library(e.to_string())),
            LibraryFormat::Json => serde_json::from_str(content).map_err(|e| PromptError::library(e.to_string())),
        }
    }

    /// Render the library.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Library`] if serialization fails.
    pub fn render(&self, format: LibraryFormat) -> Result<String> {
        match format {
            LibraryFormat::Toml => toml::to_string_pretty(self).map_err(|e| PromptError::library(e.to_string())),
            LibraryFormat::Json => serde_json::to_string_pretty(self).map_err(|e| PromptError::library(e.to_string())),
        }
    }

    /// Read and parse a library file; the format defaults to the file extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path, format: Option<LibraryFormat>) -> anyhow::Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read library from {}", path.display()))?;
        let format = format.unwrap_or_else(|| LibraryFormat::from_path(path));
        Ok(Self::parse(&content, format)?)
    }

    /// Render and write the library, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    pub async fn save(&self, path: &Path, format: LibraryFormat) -> anyhow::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = self.render(format)?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write library to {}", path.display()))
    }
}

/// An unsaved component list, as read by `pweave preview`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentList {
    /// Components in order.
    #[serde(default)]
    pub components: Vec<LibraryComponent>,
}

impl ComponentList {
    /// Parse a component list.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Library`] with the parser's message.
    pub fn parse(content: &str, format: LibraryFormat) -> Result<Self> {
        match format {
            LibraryFormat::Toml => toml::from_str(content).map_err(|e| PromptError::library(e.to_string())),
            LibraryFormat::Json => serde_json::from_str(content).map_err(|e| PromptError::library(e.to_string())),
        }
    }
}

/// What [`import_library`] created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Prompts created.
    pub prompts: usize,
    /// Of which compound.
    pub compound: usize,
    /// Components created.
    pub components: usize,
    /// Id assigned to each slug.
    pub ids: BTreeMap<String, PromptId>,
}

/// Turn library components into positioned components, looking slugs up in the store.
///
/// # Errors
///
/// Returns [`PromptError::SlugNotFound`] for an unknown slug.
pub fn components_from_slugs(store: &SqliteStore, components: &[LibraryComponent]) -> Result<Vec<Component>> {
    components
        .iter()
        .zip(0u32..)
        .map(|(component, position)| -> Result<Component> {
            let component_prompt_id = match &component.prompt {
                Some(slug) => Some(
                    store
                        .find_by_slug(slug)?
                        .ok_or_else(|| PromptError::SlugNotFound {
                            slug: slug.clone(),
                        })?
                        .id,
                ),
                None => None,
            };
            Ok(Component {
                position,
                component_prompt_id,
                text_before: component.before.clone(),
                text_after: component.after.clone(),
            })
        })
        .collect()
}

/// Checked library, ready to be written.
struct ImportPlan {
    /// Library prompts keyed by provisional (negative) id, with provisional references.
    staged: PromptMap,
    /// Slug of each library entry, indexed by position in the file.
    slugs: Vec<String>,
    /// Library entry indices with their dependencies first.
    order: Vec<usize>,
}

/// Provisional id of the `index`-th library entry. Never collides with rowids.
fn provisional_id(index: usize) -> PromptId {
    PromptId(-(index as i64) - 1)
}

fn provisional_index(id: PromptId) -> Option<usize> {
    (id.get() < 0).then(|| (-id.get() - 1) as usize)
}

impl ImportPlan {
    fn build(store: &SqliteStore, library: &LibraryFile, ceiling: usize) -> Result<Self> {
        let mut index_of: HashMap<&str, usize> = HashMap::new();
        for (index, entry) in library.prompts.iter().enumerate() {
            let slug = entry.slug.trim();
            if slug.is_empty() {
                return Err(PromptError::library(format!("prompt #{} has an empty slug", index + 1)));
            }
            if index_of.insert(slug, index).is_some() {
                return Err(PromptError::library(format!("duplicate slug '{slug}'")));
            }
            if store.find_by_slug(slug)?.is_some() {
                return Err(PromptError::library(format!("slug '{slug}' already exists in the store")));
            }
            if entry.is_compound() && entry.text.is_some() {
                return Err(PromptError::library(format!("'{slug}' has both text and components")));
            }
        }

        let known: Vec<String> = index_of.keys().map(|s| (*s).to_string()).collect();
        let mut staged = PromptMap::new();
        let mut graph: ReferenceGraph<String> = ReferenceGraph::new();

        for (index, entry) in library.prompts.iter().enumerate() {
            let slug = entry.slug.trim();
            graph.add_prompt(slug.to_string());

            let Some(components) = &entry.components else {
                let mut prompt = Prompt::simple(provisional_id(index), slug, "");
                prompt.text = entry.text.clone();
                staged.insert(PromptRecord::bare(prompt));
                continue;
            };

            let mut record = PromptRecord::bare(Prompt::compound(provisional_id(index), slug));
            for (component, position) in components.iter().zip(0u32..) {
                let component_prompt_id = match &component.prompt {
                    None => None,
                    Some(target) => {
                        let target = target.trim();
                        if let Some(&target_index) = index_of.get(target) {
                            graph.add_reference(slug.to_string(), target.to_string());
                            Some(provisional_id(target_index))
                        } else if let Some(stored) = store.find_by_slug(target)? {
                            Some(stored.id)
                        } else {
                            let mut message = format!("'{slug}' references unknown prompt '{target}'");
                            let similar = similar_names(target, &known);
                            if !similar.is_empty() {
                                message.push_str(&format!(" (did you mean '{}'?)", similar.join("', '")));
                            }
                            return Err(PromptError::library(message));
                        }
                    }
                };
                record.components.push(
                    Component {
                        position,
                        component_prompt_id,
                        text_before: component.before.clone(),
                        text_after: component.after.clone(),
                    }
                    .into(),
                );
            }

            let list: Vec<Component> = record.components.iter().map(|c| c.component.clone()).collect();
            validate_component_list(&list).map_err(|e| PromptError::library(format!("'{slug}': {e}")))?;
            staged.insert(record);
        }

        let order = graph
            .topological_order()
            .map_err(|cycle| PromptError::library(format!("circular reference: {cycle}")))?
            .iter()
            .filter_map(|slug| index_of.get(slug.as_str()).copied())
            .collect();

        // Library prompts answer from the staged map, references into the store from the store.
        let layered = |id: PromptId| -> Result<Option<PromptRecord>> {
            if provisional_index(id).is_some() {
                staged.fetch(id)
            } else {
                store.fetch(id)
            }
        };
        let validator = GraphValidator::new(&layered, ceiling);
        let mut memo = HashMap::new();
        for index in 0..library.prompts.len() {
            validator.compute_depth(provisional_id(index), &mut memo)?;
        }

        Ok(Self {
            staged,
            slugs: library.prompts.iter().map(|p| p.slug.trim().to_string()).collect(),
            order,
        })
    }
}

/// Import a library into the store.
///
/// # Errors
///
/// - [`PromptError::Library`] for malformed libraries, unknown references and cycles
/// - [`PromptError::MaxDepthExceeded`] when a prompt would nest past `ceiling`
/// - [`PromptError::Storage`] on database failure
///
/// Nothing is written unless every check passes.
pub fn import_library(store: &SqliteStore, library: &LibraryFile, ceiling: usize) -> Result<ImportReport> {
    let plan = ImportPlan::build(store, library, ceiling)?;

    let (report, real_ids) = store.transaction("import library", |tx| {
        let mut report = ImportReport::default();
        let mut real_ids = Vec::with_capacity(plan.slugs.len());

        // Pass 1: every row, so each slug has an id.
        for (slug, entry) in plan.slugs.iter().zip(&library.prompts) {
            let id = insert_prompt(
                tx,
                &NewPrompt {
                    slug: slug.clone(),
                    title: entry.title.clone(),
                    text: entry.text.clone(),
                    is_compound: entry.is_compound(),
                },
            )?;
            real_ids.push(id);
            report.ids.insert(slug.clone(), id);
            report.prompts += 1;
        }

        // Pass 2: components, with provisional references swapped for real ids.
        for (index, real_id) in real_ids.iter().enumerate() {
            let Some(record) = plan.staged.get(provisional_id(index)) else {
                continue;
            };
            if !record.prompt.is_compound {
                continue;
            }
            report.compound += 1;
            for component in &record.components {
                let mut component = component.component.clone();
                component.component_prompt_id = component
                    .component_prompt_id
                    .map(|id| provisional_index(id).map_or(id, |target| real_ids[target]));
                insert_component(tx, *real_id, &component)?;
                report.components += 1;
            }
        }

        Ok((report, real_ids))
    })?;

    let validator = GraphValidator::new(store, ceiling);
    let mut memo = HashMap::new();
    for &index in &plan.order {
        let is_compound = plan.staged.get(provisional_id(index)).is_some_and(|r| r.prompt.is_compound);
        if is_compound {
            let depth = validator.compute_depth(real_ids[index], &mut memo)?;
            store.set_max_depth(real_ids[index], Some(u32::try_from(depth).unwrap_or(u32::MAX)))?;
        }
    }

    tracing::info!(
        "Imported {} prompts ({} compound, {} components)",
        report.prompts,
        report.compound,
        report.components
    );
    Ok(report)
}

/// Export every stored prompt, naming component references by slug.
///
/// # Errors
///
/// - [`PromptError::NotFound`] when a component references a missing prompt
/// - [`PromptError::Storage`] on database failure
pub fn export_library(store: &SqliteStore) -> Result<LibraryFile> {
    let mut library = LibraryFile::default();

    for prompt in store.list_prompts()? {
        let components = if prompt.is_compound {
            let record = store.fetch(prompt.id)?.ok_or(PromptError::NotFound {
                id: prompt.id,
            })?;
            let mut components = Vec::with_capacity(record.components.len());
            let mut ordered: Vec<_> = record.components.iter().collect();
            ordered.sort_by_key(|c| c.component.position);
            for component in ordered {
                let prompt_slug = match (component.component.component_prompt_id, &component.referenced) {
                    (Some(_), Some(referenced)) => Some(referenced.slug.clone()),
                    (Some(id), None) => {
                        return Err(PromptError::NotFound {
                            id,
                        });
                    }
                    (None, _) => None,
                };
                components.push(LibraryComponent {
                    prompt: prompt_slug,
                    before: component.component.text_before.clone(),
                    after: component.component.text_after.clone(),
                });
            }
            Some(components)
        } else {
            None
        };

        library.prompts.push(LibraryPrompt {
            slug: prompt.slug,
            title: prompt.title,
            text: if prompt.is_compound {
                None
            } else {
                prompt.text
            },
            components,
        });
    }

    tracing::debug!("Exported {} prompts", library.prompts.len());
    Ok(library)
}
