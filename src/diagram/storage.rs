/// SQLite persistence layer for diagram storage
///
/// Diagrams are stored as their full editor JSON in a `definition` column, with the
/// fields used for listing (title, author, visibility, timestamps) kept alongside.

use crate::diagram::types::Diagram;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::{collections::HashMap, path::Path};

/// SQLite-based diagram storage manager
#[derive(Debug, Clone)]
pub struct DiagramStorage {
    pool: SqlitePool,
}

/// Diagram metadata returned by listing operations
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramMetadata {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiagramStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database file at `path` and initialize the schema
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("🗄️ Opening diagram database: {}", path.display());
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let storage = Self::new(SqlitePool::connect_with(options).await?);
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Private in-memory database, used by tests and throwaway servers
    pub async fn in_memory() -> Result<Self> {
        // A second connection to `sqlite::memory:` would see a different database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create the diagrams table and its indexes. Safe to call repeatedly.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS diagrams (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                author TEXT,
                public INTEGER NOT NULL DEFAULT 0,
                definition JSON NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_diagrams_author ON diagrams(author)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert or update a diagram
    ///
    /// The original creation time survives updates; `updated_at` is always refreshed.
    pub async fn save_diagram(&self, diagram: &Diagram) -> Result<()> {
        let now = Utc::now();
        let created_at = diagram.created_at.unwrap_or(now);

        let mut stored = diagram.clone();
        stored.created_at = None;
        stored.updated_at = None;
        let definition_json = serde_json::to_string(&stored)?;

        sqlx::query(
            r#"
            INSERT INTO diagrams (id, title, author, public, definition, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                author = excluded.author,
                public = excluded.public,
                definition = excluded.definition,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&diagram.id)
        .bind(&diagram.title)
        .bind(&diagram.author)
        .bind(diagram.public)
        .bind(&definition_json)
        .bind(created_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::debug!("💾 Saved diagram '{}' ({})", diagram.id, diagram.title);
        Ok(())
    }

    pub async fn get_diagram(&self, id: &str) -> Result<Option<Diagram>> {
        let row = sqlx::query(
            "SELECT definition, created_at, updated_at FROM diagrams WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| diagram_from_row(&row)).transpose()
    }

    /// List diagram metadata, most recently updated first
    pub async fn list_diagrams(&self) -> Result<Vec<DiagramMetadata>> {
        let rows = sqlx::query(
            "SELECT id, title, author, public, created_at, updated_at FROM diagrams ORDER BY updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(DiagramMetadata {
                    id: row.get("id"),
                    title: row.get("title"),
                    author: row.get("author"),
                    public: row.get("public"),
                    created_at: parse_timestamp(row.get("created_at"))?,
                    updated_at: parse_timestamp(row.get("updated_at"))?,
                })
            })
            .collect()
    }

    /// Load every stored diagram, keyed by id, for registry initialization
    pub async fn load_all_diagrams(&self) -> Result<HashMap<String, Diagram>> {
        let rows = sqlx::query("SELECT id, definition, created_at, updated_at FROM diagrams")
            .fetch_all(&self.pool)
            .await?;

        let mut diagrams = HashMap::new();
        for row in rows {
            let id: String = row.get("id");
            match diagram_from_row(&row) {
                Ok(diagram) => {
                    diagrams.insert(id, diagram);
                }
                Err(e) => tracing::error!("❌ Skipping unreadable diagram '{}': {}", id, e),
            }
        }
        Ok(diagrams)
    }

    /// Delete a diagram, returning whether it existed
    pub async fn delete_diagram(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM diagrams WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn diagram_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Diagram> {
    let definition_json: String = row.get("definition");
    let mut diagram: Diagram = serde_json::from_str(&definition_json)?;
    diagram.created_at = Some(parse_timestamp(row.get("created_at"))?);
    diagram.updated_at = Some(parse_timestamp(row.get("updated_at"))?);
    Ok(diagram)
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(&raw)
        .map_err(|e| anyhow::anyhow!("Invalid timestamp '{}': {}", raw, e))?
        .with_timezone(&Utc))
}
