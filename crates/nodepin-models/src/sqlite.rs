use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::types::{IndexedModel, LocationRow, ModelRecord};
use crate::{IndexError, ModelIndex};

const SELECT_LOCATIONS: &str = r#"
    SELECT m.hash, m.file_size, l.relative_path, l.filename, l.mtime
    FROM model_locations l
    JOIN models m ON m.hash = l.hash
"#;

/// SQLite-based model index.
pub struct SqliteModelIndex {
  pool: SqlitePool,
}

impl SqliteModelIndex {
  /// Create a new index over the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if needed) the index database at `path` and migrate it.
  ///
  /// The pool holds a single connection so all writes are serialized.
  pub async fn open(path: &Path) -> Result<Self, IndexError> {
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }

    let options = SqliteConnectOptions::new()
      .filename(path)
      .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect_with(options)
      .await?;

    let index = Self::new(pool);
    index.migrate().await?;
    Ok(index)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(&self.pool).await
  }

  async fn sources(&self, hash: &str) -> Result<Vec<String>, IndexError> {
    let sources: Vec<String> = sqlx::query_scalar(
      r#"
            SELECT url FROM model_sources
            WHERE hash = ?
            ORDER BY added_at ASC, url ASC
            "#,
    )
    .bind(hash)
    .fetch_all(&self.pool)
    .await?;

    Ok(sources)
  }

  async fn with_sources(&self, row: LocationRow) -> Result<IndexedModel, IndexError> {
    let sources = self.sources(&row.hash).await?;
    Ok(row.into_model(sources))
  }
}

#[async_trait]
impl ModelIndex for SqliteModelIndex {
  async fn upsert(&self, record: &ModelRecord) -> Result<(), IndexError> {
    let file_size = i64::try_from(record.file_size).unwrap_or(i64::MAX);
    let mut tx = self.pool.begin().await?;

    sqlx::query(
      r#"
            INSERT INTO models (hash, file_size, indexed_at)
            VALUES (?, ?, ?)
            ON CONFLICT(hash) DO NOTHING
            "#,
    )
    .bind(&record.hash)
    .bind(file_size)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    sqlx::query(
      r#"
            INSERT INTO model_locations (relative_path, hash, filename, mtime)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(relative_path) DO UPDATE
            SET hash = excluded.hash, filename = excluded.filename, mtime = excluded.mtime
            "#,
    )
    .bind(&record.relative_path)
    .bind(&record.hash)
    .bind(&record.filename)
    .bind(record.mtime)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
  }

  async fn find_by_hash(&self, hash: &str) -> Result<Option<IndexedModel>, IndexError> {
    let row: Option<LocationRow> = sqlx::query_as(&format!(
      "{} WHERE m.hash = ? ORDER BY l.relative_path ASC LIMIT 1",
      SELECT_LOCATIONS
    ))
    .bind(hash)
    .fetch_optional(&self.pool)
    .await?;

    match row {
      Some(row) => Ok(Some(self.with_sources(row).await?)),
      None => Ok(None),
    }
  }

  async fn find_by_filename(&self, filename: &str) -> Result<Vec<IndexedModel>, IndexError> {
    let rows: Vec<LocationRow> = sqlx::query_as(&format!(
      "{} WHERE l.filename = ? ORDER BY l.relative_path ASC",
      SELECT_LOCATIONS
    ))
    .bind(filename)
    .fetch_all(&self.pool)
    .await?;

    let mut models: Vec<IndexedModel> = Vec::new();
    for row in rows {
      if models.iter().any(|m| m.hash == row.hash) {
        continue;
      }
      models.push(self.with_sources(row).await?);
    }
    Ok(models)
  }

  async fn find_by_path(&self, relative_path: &str) -> Result<Option<IndexedModel>, IndexError> {
    let row: Option<LocationRow> = sqlx::query_as(&format!(
      "{} WHERE l.relative_path = ?",
      SELECT_LOCATIONS
    ))
    .bind(relative_path)
    .fetch_optional(&self.pool)
    .await?;

    match row {
      Some(row) => Ok(Some(self.with_sources(row).await?)),
      None => Ok(None),
    }
  }

  async fn add_source(&self, hash: &str, url: &str) -> Result<(), IndexError> {
    sqlx::query(
      r#"
            INSERT INTO model_sources (hash, url, added_at)
            VALUES (?, ?, ?)
            ON CONFLICT(hash, url) DO NOTHING
            "#,
    )
    .bind(hash)
    .bind(url)
    .bind(Utc::now())
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn remove_path(&self, relative_path: &str) -> Result<(), IndexError> {
    sqlx::query("DELETE FROM model_locations WHERE relative_path = ?")
      .bind(relative_path)
      .execute(&self.pool)
      .await?;

    Ok(())
  }

  async fn list(&self) -> Result<Vec<IndexedModel>, IndexError> {
    let rows: Vec<LocationRow> = sqlx::query_as(&format!(
      "{} ORDER BY l.relative_path ASC",
      SELECT_LOCATIONS
    ))
    .fetch_all(&self.pool)
    .await?;

    let mut models = Vec::with_capacity(rows.len());
    for row in rows {
      models.push(self.with_sources(row).await?);
    }
    Ok(models)
  }
}
