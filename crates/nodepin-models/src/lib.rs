//! nodepin Models
//!
//! This crate provides the content-addressable index of model files present
//! in an environment. Models are keyed by the SHA-256 of their bytes; each
//! hash can be stored at several paths and carry download sources.
//!
//! The [`ModelIndex`] trait defines operations for:
//! - Recording a model file at a path
//! - Looking models up by hash, file name or path
//! - Appending download sources
//!
//! [`ModelScanner`] fingerprints a models directory in parallel and feeds
//! the results to an index from a single writer.

mod hash;
mod scanner;
mod sqlite;
mod types;

pub use hash::{fingerprint_file, fingerprint_file_blocking};
pub use scanner::{ModelScanner, ScanReport};
pub use sqlite::SqliteModelIndex;
pub use types::{IndexedModel, ModelRecord};

use async_trait::async_trait;

/// Error type for index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Schema migration failed.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),

  /// Reading model files failed.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Storage trait for the model index.
#[async_trait]
pub trait ModelIndex: Send + Sync {
  /// Record a model file. The hash row is created once and never rewritten;
  /// the location row is replaced if the path was indexed before.
  async fn upsert(&self, record: &ModelRecord) -> Result<(), IndexError>;

  /// Get a locally present model by content hash.
  async fn find_by_hash(&self, hash: &str) -> Result<Option<IndexedModel>, IndexError>;

  /// Locally present models with this file name, one entry per distinct hash.
  async fn find_by_filename(&self, filename: &str) -> Result<Vec<IndexedModel>, IndexError>;

  /// Get the model indexed at a path relative to the models directory.
  async fn find_by_path(&self, relative_path: &str) -> Result<Option<IndexedModel>, IndexError>;

  /// Append a download source to a hash. Adding a known source is a no-op.
  async fn add_source(&self, hash: &str, url: &str) -> Result<(), IndexError>;

  /// Drop a path that no longer exists. The hash row and its sources stay.
  async fn remove_path(&self, relative_path: &str) -> Result<(), IndexError>;

  /// All indexed locations, ordered by path.
  async fn list(&self) -> Result<Vec<IndexedModel>, IndexError>;
}
