use sqlx::FromRow;

/// A model file as observed on disk, ready to be indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRecord {
  pub hash: String,
  pub file_size: u64,
  /// Path relative to the models directory, `/`-separated.
  pub relative_path: String,
  pub filename: String,
  /// Modification time in seconds since the epoch.
  pub mtime: i64,
}

/// A model present in the index at one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedModel {
  pub hash: String,
  pub file_size: u64,
  pub relative_path: String,
  pub filename: String,
  pub mtime: i64,
  pub sources: Vec<String>,
}

/// Joined row of `models` and `model_locations`.
#[derive(Debug, FromRow)]
pub(crate) struct LocationRow {
  pub hash: String,
  pub file_size: i64,
  pub relative_path: String,
  pub filename: String,
  pub mtime: i64,
}

impl LocationRow {
  pub(crate) fn into_model(self, sources: Vec<String>) -> IndexedModel {
    IndexedModel {
      hash: self.hash,
      file_size: u64::try_from(self.file_size).unwrap_or_default(),
      relative_path: self.relative_path,
      filename: self.filename,
      mtime: self.mtime,
      sources,
    }
  }
}
