//! Common utilities for CLI commands

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use super::CliConfig;
use crate::config::{EngineConfig, GlobalConfig};
use crate::core::{ErrorContext, Prompt, PromptError, PromptId, similar_names};
use crate::store::SqliteStore;

/// Common context for CLI commands: the open store and the engine limits.
pub struct CommandContext {
    /// The prompt database.
    pub store: Arc<SqliteStore>,
    /// Limits from the global configuration.
    pub engine: EngineConfig,
    /// Where the database lives.
    pub database_path: PathBuf,
}

impl CommandContext {
    /// Load the global configuration and open the database it names.
    ///
    /// `--db` wins over the config file's `database` key.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unreadable or invalid, or the
    /// database cannot be opened.
    pub async fn open(config: &CliConfig) -> Result<Self> {
        let global = GlobalConfig::load_with_optional(config.config_path.clone()).await?;
        let engine = global.engine_config()?;

        let database_path = match &config.database {
            Some(path) => path.clone(),
            None => global.database_path()?,
        };

        let store = SqliteStore::open(&database_path)
            .with_context(|| format!("Failed to open prompt database {}", database_path.display()))?;

        tracing::debug!(
            "Using database {} (max_depth {}, max_parallel {})",
            database_path.display(),
            engine.max_depth,
            engine.max_parallel
        );

        Ok(Self {
            store: Arc::new(store),
            engine,
            database_path,
        })
    }

    /// Look up a prompt given as a slug, `42` or `#42`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::NotFound`] for an unknown id, or an
    /// [`ErrorContext`] around [`PromptError::SlugNotFound`] suggesting close slugs.
    pub fn find_prompt(&self, key: &str) -> Result<Prompt> {
        find_prompt(&self.store, key)
    }
}

/// Look up a prompt by slug or id.
///
/// A key that parses as an id is tried as an id first, then as a slug.
///
/// # Errors
///
/// See [`CommandContext::find_prompt`].
pub fn find_prompt(store: &SqliteStore, key: &str) -> Result<Prompt> {
    if let Ok(id) = key.parse::<PromptId>() {
        if let Some(prompt) = store.get_prompt(id)? {
            return Ok(prompt);
        }
        if let Some(prompt) = store.find_by_slug(key)? {
            return Ok(prompt);
        }
        return Err(PromptError::NotFound {
            id,
        }
        .into());
    }

    if let Some(prompt) = store.find_by_slug(key)? {
        return Ok(prompt);
    }

    let slugs: Vec<String> = store.list_prompts()?.into_iter().map(|p| p.slug).collect();
    let similar = similar_names(key, &slugs);
    let mut context = ErrorContext::new(PromptError::SlugNotFound {
        slug: key.to_string(),
    });
    context = if similar.is_empty() {
        context.with_suggestion("Use 'pweave export' to list the slugs available in the store")
    } else {
        context.with_suggestion(format!("Did you mean: {}?", similar.join(", ")))
    };
    Err(context.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewPrompt;

    #[test]
    fn test_find_prompt_by_id_and_slug() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.create_prompt(&NewPrompt::simple("greeting", "hi")).unwrap();

        assert_eq!(find_prompt(&store, "greeting").unwrap().id, id);
        assert_eq!(find_prompt(&store, &id.to_string()).unwrap().slug, "greeting");
        assert_eq!(find_prompt(&store, &id.get().to_string()).unwrap().slug, "greeting");
    }

    #[test]
    fn test_numeric_slug_falls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_prompt(&NewPrompt::simple("2024", "year")).unwrap();

        assert_eq!(find_prompt(&store, "2024").unwrap().slug, "2024");
        let err = find_prompt(&store, "77").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PromptError>(),
            Some(PromptError::NotFound { .. })
        ));
    }

    #[test]
    fn test_unknown_slug_suggests_close_matches() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_prompt(&NewPrompt::simple("greeting", "hi")).unwrap();

        let err = find_prompt(&store, "greting").unwrap_err();
        let ctx = err.downcast::<ErrorContext>().unwrap();
        assert!(matches!(ctx.error, PromptError::SlugNotFound { .. }));
        assert_eq!(ctx.suggestion.as_deref(), Some("Did you mean: greeting?"));
    }
}
