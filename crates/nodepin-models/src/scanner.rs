use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::hash::fingerprint_file_blocking;
use crate::types::ModelRecord;
use crate::{IndexError, ModelIndex};

/// Outcome of one directory scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
  /// Model files found on disk.
  pub files: usize,
  /// Files that were fingerprinted and written to the index.
  pub indexed: usize,
  /// Files whose size and mtime matched the index, so were not re-hashed.
  pub unchanged: usize,
  /// Indexed paths that no longer exist on disk.
  pub removed: usize,
  /// Files that could not be read, with the error message.
  pub failed: Vec<(String, String)>,
}

/// Fingerprints every model file under a directory.
///
/// Hashing runs on the rayon pool; the index is written afterwards from the
/// calling task only.
pub struct ModelScanner {
  root: PathBuf,
  extensions: Vec<String>,
}

struct FileStat {
  absolute: PathBuf,
  relative_path: String,
  filename: String,
  size: u64,
  mtime: i64,
}

impl ModelScanner {
  pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
    Self {
      root: root.into(),
      extensions,
    }
  }

  pub async fn scan<I: ModelIndex + ?Sized>(&self, index: &I) -> Result<ScanReport, IndexError> {
    let known: HashMap<String, (u64, i64)> = index
      .list()
      .await?
      .into_iter()
      .map(|m| (m.relative_path, (m.file_size, m.mtime)))
      .collect();

    let root = self.root.clone();
    let extensions = self.extensions.clone();
    let stats = tokio::task::spawn_blocking(move || discover(&root, &extensions))
      .await
      .map_err(std::io::Error::other)?;

    let mut report = ScanReport {
      files: stats.len(),
      ..ScanReport::default()
    };

    let on_disk: HashSet<String> = stats.iter().map(|s| s.relative_path.clone()).collect();
    let changed: Vec<FileStat> = stats
      .into_iter()
      .filter(|stat| known.get(&stat.relative_path) != Some(&(stat.size, stat.mtime)))
      .collect();
    report.unchanged = report.files - changed.len();

    let hashed = tokio::task::spawn_blocking(move || {
      changed
        .into_par_iter()
        .map(|stat| {
          let hash = fingerprint_file_blocking(&stat.absolute);
          (stat, hash)
        })
        .collect::<Vec<_>>()
    })
    .await
    .map_err(std::io::Error::other)?;

    for (stat, hash) in hashed {
      match hash {
        Ok(hash) => {
          debug!(path = %stat.relative_path, hash = %hash, "indexing model");
          index
            .upsert(&ModelRecord {
              hash,
              file_size: stat.size,
              relative_path: stat.relative_path,
              filename: stat.filename,
              mtime: stat.mtime,
            })
            .await?;
          report.indexed += 1;
        }
        Err(e) => {
          warn!(path = %stat.relative_path, error = %e, "failed to fingerprint model");
          report.failed.push((stat.relative_path, e.to_string()));
        }
      }
    }

    for path in known.keys().filter(|p| !on_disk.contains(*p)) {
      index.remove_path(path).await?;
      report.removed += 1;
    }

    info!(
      files = report.files,
      indexed = report.indexed,
      unchanged = report.unchanged,
      removed = report.removed,
      "model scan complete"
    );
    Ok(report)
  }
}

/// Walk `root` and stat every file with a model extension.
fn discover(root: &Path, extensions: &[String]) -> Vec<FileStat> {
  let mut stats: Vec<FileStat> = WalkDir::new(root)
    .follow_links(true)
    .into_iter()
    .filter_map(|entry| entry.ok())
    .filter(|entry| entry.file_type().is_file())
    .filter(|entry| {
      entry
        .path()
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|known| known.eq_ignore_ascii_case(e)))
    })
    .filter_map(|entry| {
      let metadata = entry.metadata().ok()?;
      let relative = entry.path().strip_prefix(root).ok()?;
      let relative_path = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
      let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();

      Some(FileStat {
        absolute: entry.path().to_path_buf(),
        filename: entry.file_name().to_string_lossy().into_owned(),
        relative_path,
        size: metadata.len(),
        mtime,
      })
    })
    .collect();

  stats.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
  stats
}
