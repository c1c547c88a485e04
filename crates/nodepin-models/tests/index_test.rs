//! Integration tests for the SQLite model index and the directory scanner.

use std::path::Path;

use nodepin_models::{ModelIndex, ModelRecord, ModelScanner, SqliteModelIndex, fingerprint_file_blocking};

async fn open_index(dir: &Path) -> SqliteModelIndex {
  SqliteModelIndex::open(&dir.join(".nodepin/models.db"))
    .await
    .expect("failed to open index")
}

fn record(hash: &str, relative_path: &str) -> ModelRecord {
  ModelRecord {
    hash: hash.to_string(),
    file_size: 1024,
    relative_path: relative_path.to_string(),
    filename: relative_path.rsplit('/').next().unwrap().to_string(),
    mtime: 1_700_000_000,
  }
}

fn extensions() -> Vec<String> {
  vec!["safetensors".to_string(), "pt".to_string()]
}

#[tokio::test]
async fn test_upsert_and_find() {
  let dir = tempfile::tempdir().unwrap();
  let index = open_index(dir.path()).await;

  index.upsert(&record("h1", "checkpoints/x.safetensors")).await.unwrap();

  let by_hash = index.find_by_hash("h1").await.unwrap().unwrap();
  assert_eq!(by_hash.relative_path, "checkpoints/x.safetensors");
  assert_eq!(by_hash.filename, "x.safetensors");
  assert_eq!(by_hash.file_size, 1024);

  let by_path = index.find_by_path("checkpoints/x.safetensors").await.unwrap();
  assert_eq!(by_path.map(|m| m.hash), Some("h1".to_string()));

  assert!(index.find_by_hash("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_find_by_filename_groups_by_hash() {
  let dir = tempfile::tempdir().unwrap();
  let index = open_index(dir.path()).await;

  index.upsert(&record("h1", "checkpoints/a/x.safetensors")).await.unwrap();
  index.upsert(&record("h1", "checkpoints/b/x.safetensors")).await.unwrap();
  index.upsert(&record("h2", "checkpoints/c/x.safetensors")).await.unwrap();

  let found = index.find_by_filename("x.safetensors").await.unwrap();
  let hashes: Vec<&str> = found.iter().map(|m| m.hash.as_str()).collect();
  assert_eq!(hashes, vec!["h1", "h2"]);
  assert_eq!(found[0].relative_path, "checkpoints/a/x.safetensors");
}

#[tokio::test]
async fn test_sources_are_append_only() {
  let dir = tempfile::tempdir().unwrap();
  let index = open_index(dir.path()).await;

  index.upsert(&record("h1", "loras/detail.safetensors")).await.unwrap();
  index.add_source("h1", "https://example.com/detail.safetensors").await.unwrap();
  index.add_source("h1", "https://example.com/detail.safetensors").await.unwrap();

  let model = index.find_by_hash("h1").await.unwrap().unwrap();
  assert_eq!(model.sources, vec!["https://example.com/detail.safetensors".to_string()]);
}

#[tokio::test]
async fn test_remove_path_keeps_hash_row() {
  let dir = tempfile::tempdir().unwrap();
  let index = open_index(dir.path()).await;

  index.upsert(&record("h1", "vae/a.safetensors")).await.unwrap();
  index.add_source("h1", "https://example.com/a").await.unwrap();
  index.remove_path("vae/a.safetensors").await.unwrap();
  assert!(index.find_by_hash("h1").await.unwrap().is_none());

  // the same content reappearing elsewhere keeps its sources
  index.upsert(&record("h1", "vae/renamed.safetensors")).await.unwrap();
  let model = index.find_by_hash("h1").await.unwrap().unwrap();
  assert_eq!(model.sources, vec!["https://example.com/a".to_string()]);
}

#[tokio::test]
async fn test_scanner_indexes_and_skips_unchanged() {
  let dir = tempfile::tempdir().unwrap();
  let models = dir.path().join("models");
  std::fs::create_dir_all(models.join("checkpoints")).unwrap();
  std::fs::create_dir_all(models.join("loras")).unwrap();
  std::fs::write(models.join("checkpoints/x.safetensors"), b"checkpoint bytes").unwrap();
  std::fs::write(models.join("loras/y.safetensors"), b"lora bytes").unwrap();
  std::fs::write(models.join("loras/readme.txt"), b"not a model").unwrap();

  let index = open_index(dir.path()).await;
  let scanner = ModelScanner::new(&models, extensions());

  let first = scanner.scan(&index).await.unwrap();
  assert_eq!(first.files, 2);
  assert_eq!(first.indexed, 2);
  assert!(first.failed.is_empty());

  let expected = fingerprint_file_blocking(&models.join("checkpoints/x.safetensors")).unwrap();
  let found = index.find_by_path("checkpoints/x.safetensors").await.unwrap().unwrap();
  assert_eq!(found.hash, expected);

  let second = scanner.scan(&index).await.unwrap();
  assert_eq!(second.indexed, 0);
  assert_eq!(second.unchanged, 2);
}

#[tokio::test]
async fn test_scanner_prunes_deleted_files() {
  let dir = tempfile::tempdir().unwrap();
  let models = dir.path().join("models");
  std::fs::create_dir_all(&models).unwrap();
  std::fs::write(models.join("a.pt"), b"a").unwrap();

  let index = open_index(dir.path()).await;
  let scanner = ModelScanner::new(&models, extensions());
  scanner.scan(&index).await.unwrap();

  std::fs::remove_file(models.join("a.pt")).unwrap();
  let report = scanner.scan(&index).await.unwrap();
  assert_eq!(report.removed, 1);
  assert!(index.list().await.unwrap().is_empty());
}
