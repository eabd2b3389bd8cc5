//! SQLite-backed prompt storage.
//!
//! Two tables hold the reference graph:
//!
//! ```sql
//! prompts(id, slug UNIQUE, title, text, is_compound, max_depth)
//! prompt_components(id, compound_prompt_id, component_prompt_id, position,
//!                   text_before, text_after, UNIQUE(compound_prompt_id, position))
//! ```
//!
//! [`SqliteStore`] is the live implementation of both fetch capabilities:
//! [`PromptSource::fetch`] reads one prompt and its components, and
//! [`BatchSource::fetch_batch`] reads many prompts in a single pass with
//! `WHERE id IN (...)`. Each component row is joined with the referenced
//! prompt's own columns, which is what lets bulk fetching see whether a
//! referenced prompt is compound without another query.
//!
//! Connections come from an r2d2 pool. Every method takes a connection for
//! the duration of one statement or transaction and returns it before
//! calling back into the engine, so a pool of one connection (in-memory
//! databases) never deadlocks.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use std::collections::HashMap;
use std::path::Path;

use crate::core::{Component, ComponentRecord, Prompt, PromptError, PromptId, PromptRecord, Result};
use crate::graph::GraphValidator;
use crate::source::{BatchSource, PromptSource};

/// Ids per `IN (...)` statement, well under SQLite's bound-parameter limit.
const BATCH_CHUNK_SIZE: usize = 500;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS prompts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    title TEXT,
    text TEXT,
    is_compound INTEGER NOT NULL DEFAULT 0,
    max_depth INTEGER
);
CREATE TABLE IF NOT EXISTS prompt_components (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    compound_prompt_id INTEGER NOT NULL REFERENCES prompts(id) ON DELETE CASCADE,
    component_prompt_id INTEGER REFERENCES prompts(id),
    position INTEGER NOT NULL,
    text_before TEXT,
    text_after TEXT,
    UNIQUE(compound_prompt_id, position)
);
CREATE INDEX IF NOT EXISTS idx_prompt_components_component
    ON prompt_components(component_prompt_id);
";

const PROMPT_COLUMNS: &str = "id, slug, title, text, is_compound, max_depth";

const COMPONENT_QUERY: &str = "
SELECT c.compound_prompt_id, c.position, c.component_prompt_id, c.text_before, c.text_after,
       p.id, p.slug, p.title, p.text, p.is_compound, p.max_depth
FROM prompt_components c
LEFT JOIN prompts p ON p.id = c.component_prompt_id";

/// Fields of a prompt about to be created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPrompt {
    /// Unique key.
    pub slug: String,
    /// Optional display title.
    pub title: Option<String>,
    /// Literal text; ignored for compound prompts.
    pub text: Option<String>,
    /// Whether the prompt is assembled from components.
    pub is_compound: bool,
}

impl NewPrompt {
    /// A non-compound prompt with literal text.
    pub fn simple(slug: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// A compound prompt with no components yet.
    pub fn compound(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            is_compound: true,
            ..Self::default()
        }
    }

    /// Set the display title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A component about to be appended to a compound prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewComponent {
    /// Referenced prompt.
    pub prompt: Option<PromptId>,
    /// Text placed before the referenced content.
    pub text_before: Option<String>,
    /// Text placed after the referenced content.
    pub text_after: Option<String>,
}

impl NewComponent {
    fn at(self, position: u32) -> Component {
        Component {
            position,
            component_prompt_id: self.prompt,
            text_before: self.text_before,
            text_after: self.text_after,
        }
    }
}

fn db_error(operation: &'static str) -> impl Fn(rusqlite::Error) -> PromptError {
    move |e| PromptError::storage(operation, e)
}

fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn prompt_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Prompt> {
    Ok(Prompt {
        id: PromptId(row.get(offset)?),
        slug: row.get(offset + 1)?,
        title: row.get(offset + 2)?,
        text: row.get(offset + 3)?,
        is_compound: row.get(offset + 4)?,
        max_depth: row.get(offset + 5)?,
    })
}

/// Maps a `COMPONENT_QUERY` row to its owner id and component record.
fn component_from_row(row: &Row<'_>) -> rusqlite::Result<(PromptId, ComponentRecord)> {
    let owner = PromptId(row.get(0)?);
    let component = Component {
        position: row.get(1)?,
        component_prompt_id: row.get::<_, Option<i64>>(2)?.map(PromptId),
        text_before: row.get(3)?,
        text_after: row.get(4)?,
    };
    let referenced = match row.get::<_, Option<i64>>(5)? {
        Some(_) => Some(prompt_from_row(row, 5)?),
        None => None,
    };
    Ok((
        owner,
        ComponentRecord {
            component,
            referenced,
        },
    ))
}

/// Insert one prompt row.
pub(crate) fn insert_prompt(conn: &Connection, prompt: &NewPrompt) -> Result<PromptId> {
    let slug = prompt.slug.trim();
    if slug.is_empty() {
        return Err(PromptError::Other {
            message: "Prompt slug must not be empty".to_string(),
        });
    }
    let text = if prompt.is_compound {
        None
    } else {
        prompt.text.as_deref()
    };

    conn.execute(
        "INSERT INTO prompts (slug, title, text, is_compound) VALUES (?1, ?2, ?3, ?4)",
        params![slug, prompt.title, text, prompt.is_compound],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            PromptError::storage("create prompt", format!("slug '{slug}' already exists"))
        } else {
            PromptError::storage("create prompt", e)
        }
    })?;

    Ok(PromptId(conn.last_insert_rowid()))
}

/// Insert one component row at its recorded position.
pub(crate) fn insert_component(conn: &Connection, compound_id: PromptId, component: &Component) -> Result<()> {
    conn.execute(
        "INSERT INTO prompt_components
         (compound_prompt_id, component_prompt_id, position, text_before, text_after)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            compound_id.get(),
            component.component_prompt_id.map(PromptId::get),
            component.position,
            component.text_before,
            component.text_after,
        ],
    )
    .map_err(db_error("insert component"))?;
    Ok(())
}

/// A prompt table in SQLite.
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Open (creating if needed) the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Storage`] if the file cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| PromptError::storage("open database", e))?;
        }

        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().build(manager).map_err(|e| PromptError::storage("open database", e))?;

        tracing::debug!("Opened prompt database at {}", path.display());
        Self::with_pool(pool)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Storage`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        // Every in-memory connection is its own database, so keep exactly one.
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| PromptError::storage("open database", e))?;
        Self::with_pool(pool)
    }

    fn with_pool(pool: Pool<SqliteConnectionManager>) -> Result<Self> {
        let store = Self {
            pool,
        };
        store.conn()?.execute_batch(SCHEMA).map_err(db_error("create schema"))?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| PromptError::storage("get connection", e))
    }

    /// Run `f` inside one transaction, committing when it succeeds.
    pub(crate) fn transaction<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_error(operation))?;
        let value = f(&tx)?;
        tx.commit().map_err(db_error(operation))?;
        Ok(value)
    }

    /// Create a prompt and return its id.
    ///
    /// # Errors
    ///
    /// Fails when the slug is empty or already taken.
    pub fn create_prompt(&self, prompt: &NewPrompt) -> Result<PromptId> {
        let id = insert_prompt(&*self.conn()?, prompt)?;
        tracing::debug!("Created prompt '{}' as {}", prompt.slug, id);
        Ok(id)
    }

    /// Core fields of the prompt with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Storage`] on database failure.
    pub fn get_prompt(&self, id: PromptId) -> Result<Option<Prompt>> {
        self.conn()?
            .query_row(
                &format!("SELECT {PROMPT_COLUMNS} FROM prompts WHERE id = ?1"),
                params![id.get()],
                |row| prompt_from_row(row, 0),
            )
            .optional()
            .map_err(db_error("get prompt"))
    }

    /// The prompt carrying `slug`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Storage`] on database failure.
    pub fn find_by_slug(&self, slug: &str) -> Result<Option<Prompt>> {
        self.conn()?
            .query_row(
                &format!("SELECT {PROMPT_COLUMNS} FROM prompts WHERE slug = ?1"),
                params![slug],
                |row| prompt_from_row(row, 0),
            )
            .optional()
            .map_err(db_error("find prompt by slug"))
    }

    /// Every stored prompt, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Storage`] on database failure.
    pub fn list_prompts(&self) -> Result<Vec<Prompt>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {PROMPT_COLUMNS} FROM prompts ORDER BY id"))
            .map_err(db_error("list prompts"))?;
        stmt.query_map([], |row| prompt_from_row(row, 0))
            .map_err(db_error("list prompts"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error("list prompts"))
    }

    /// Every `(compound, referenced)` pair in the component table.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Storage`] on database failure.
    pub fn all_references(&self) -> Result<Vec<(PromptId, PromptId)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT compound_prompt_id, component_prompt_id FROM prompt_components
                 WHERE component_prompt_id IS NOT NULL ORDER BY compound_prompt_id, position",
            )
            .map_err(db_error("list references"))?;
        stmt.query_map([], |row| Ok((PromptId(row.get(0)?), PromptId(row.get(1)?))))
            .map_err(db_error("list references"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error("list references"))
    }

    /// Store the cached nesting depth of a prompt.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::NotFound`] for an unknown id.
    pub fn set_max_depth(&self, id: PromptId, max_depth: Option<u32>) -> Result<()> {
        let updated = self
            .conn()?
            .execute("UPDATE prompts SET max_depth = ?1 WHERE id = ?2", params![max_depth, id.get()])
            .map_err(db_error("set max depth"))?;
        if updated == 0 {
            return Err(PromptError::NotFound {
                id,
            });
        }
        Ok(())
    }

    /// Append a component to a compound prompt.
    ///
    /// This is the write gate of the reference graph. A referenced prompt must
    /// pass [`GraphValidator::validate_new_component`] before the row is
    /// written. Afterwards the compound's cached `max_depth` is recomputed.
    ///
    /// # Errors
    ///
    /// - [`PromptError::NotFound`] for an unknown compound or referenced prompt
    /// - [`PromptError::InvalidComponent`] when the target is not compound or
    ///   the component carries nothing
    /// - [`PromptError::CircularReference`] or [`PromptError::MaxDepthExceeded`]
    ///   when the reference is rejected
    pub fn attach_component(&self, compound_id: PromptId, component: NewComponent, ceiling: usize) -> Result<Component> {
        let compound = self.get_prompt(compound_id)?.ok_or(PromptError::NotFound {
            id: compound_id,
        })?;
        if !compound.is_compound {
            return Err(PromptError::invalid_component(format!(
                "prompt '{}' is not compound and cannot have components",
                compound.slug
            )));
        }

        let validator = GraphValidator::new(self, ceiling);
        if let Some(candidate) = component.prompt {
            validator.validate_new_component(compound_id, candidate)?;
        }

        let component = self.transaction("attach component", |tx| {
            let position: u32 = tx
                .query_row(
                    "SELECT COALESCE(MAX(position) + 1, 0) FROM prompt_components WHERE compound_prompt_id = ?1",
                    params![compound_id.get()],
                    |row| row.get(0),
                )
                .map_err(db_error("attach component"))?;
            let component = component.at(position);
            if component.is_empty() {
                return Err(PromptError::invalid_component(
                    "a component needs a prompt reference or some text",
                ));
            }
            insert_component(tx, compound_id, &component)?;
            Ok(component)
        })?;

        let depth = validator.depth_of(compound_id)?;
        self.set_max_depth(compound_id, Some(depth_to_u32(depth)))?;

        tracing::info!(
            "Attached component at position {} to '{}' (depth {})",
            component.position,
            compound.slug,
            depth
        );
        Ok(component)
    }

    /// Prompts with a component referencing `id`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Storage`] on database failure.
    pub fn dependents(&self, id: PromptId) -> Result<Vec<Prompt>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PROMPT_COLUMNS} FROM prompts WHERE id IN
                 (SELECT compound_prompt_id FROM prompt_components WHERE component_prompt_id = ?1)
                 ORDER BY id"
            ))
            .map_err(db_error("find dependents"))?;
        stmt.query_map(params![id.get()], |row| prompt_from_row(row, 0))
            .map_err(db_error("find dependents"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error("find dependents"))
    }

    /// Delete a prompt and its own components.
    ///
    /// # Errors
    ///
    /// - [`PromptError::NotFound`] for an unknown id
    /// - [`PromptError::InvalidComponent`] while another prompt still references it
    pub fn delete_prompt(&self, id: PromptId) -> Result<()> {
        let prompt = self.get_prompt(id)?.ok_or(PromptError::NotFound {
            id,
        })?;

        let dependents = self.dependents(id)?;
        if !dependents.is_empty() {
            let slugs: Vec<&str> = dependents.iter().map(|p| p.slug.as_str()).collect();
            return Err(PromptError::invalid_component(format!(
                "prompt '{}' is still referenced by {}",
                prompt.slug,
                slugs.join(", ")
            )));
        }

        self.transaction("delete prompt", |tx| {
            tx.execute("DELETE FROM prompt_components WHERE compound_prompt_id = ?1", params![id.get()])
                .map_err(db_error("delete prompt"))?;
            tx.execute("DELETE FROM prompts WHERE id = ?1", params![id.get()])
                .map_err(db_error("delete prompt"))?;
            Ok(())
        })?;

        tracing::info!("Deleted prompt '{}'", prompt.slug);
        Ok(())
    }

    fn fetch_chunk(conn: &Connection, ids: &[PromptId]) -> Result<Vec<PromptRecord>> {
        let placeholders = vec!["?"; ids.len()].join(", ");
        let raw_ids = || ids.iter().map(|id| id.get());

        let mut stmt = conn
            .prepare(&format!("SELECT {PROMPT_COLUMNS} FROM prompts WHERE id IN ({placeholders})"))
            .map_err(db_error("fetch prompts"))?;
        let prompts = stmt
            .query_map(params_from_iter(raw_ids()), |row| prompt_from_row(row, 0))
            .map_err(db_error("fetch prompts"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error("fetch prompts"))?;

        let mut stmt = conn
            .prepare(&format!(
                "{COMPONENT_QUERY} WHERE c.compound_prompt_id IN ({placeholders}) ORDER BY c.compound_prompt_id, c.position"
            ))
            .map_err(db_error("fetch components"))?;
        let mut components: HashMap<PromptId, Vec<ComponentRecord>> = HashMap::new();
        let rows = stmt.query_map(params_from_iter(raw_ids()), component_from_row).map_err(db_error("fetch components"))?;
        for row in rows {
            let (owner, component) = row.map_err(db_error("fetch components"))?;
            components.entry(owner).or_default().push(component);
        }

        Ok(prompts
            .into_iter()
            .map(|prompt| {
                let components = components.remove(&prompt.id).unwrap_or_default();
                PromptRecord {
                    prompt,
                    components,
                }
            })
            .collect())
    }
}

/// Depths are bounded by the ceiling, so the conversion saturates only on absurd ceilings.
fn depth_to_u32(depth: usize) -> u32 {
    u32::try_from(depth).unwrap_or(u32::MAX)
}

impl PromptSource for SqliteStore {
    fn fetch(&self, id: PromptId) -> Result<Option<PromptRecord>> {
        let conn = self.conn()?;
        Ok(Self::fetch_chunk(&conn, &[id])?.into_iter().next())
    }
}

impl BatchSource for SqliteStore {
    fn fetch_batch(&self, ids: &[PromptId]) -> Result<Vec<PromptRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let mut records = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(BATCH_CHUNK_SIZE) {
            records.extend(Self::fetch_chunk(&conn, chunk)?);
        }
        Ok(records)
    }
}
