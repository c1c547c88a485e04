//! Content fingerprints for model files.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

const CHUNK_SIZE: usize = 1024 * 1024;

/// Hex SHA-256 of a file's bytes, read in 1 MiB chunks.
pub fn fingerprint_file_blocking(path: &Path) -> io::Result<String> {
  let mut file = File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buffer = vec![0u8; CHUNK_SIZE];

  loop {
    let read = file.read(&mut buffer)?;
    if read == 0 {
      break;
    }
    hasher.update(&buffer[..read]);
  }

  Ok(format!("{:x}", hasher.finalize()))
}

/// Fingerprint a file on the blocking thread pool.
pub async fn fingerprint_file(path: PathBuf) -> io::Result<String> {
  tokio::task::spawn_blocking(move || fingerprint_file_blocking(&path))
    .await
    .map_err(io::Error::other)?
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fingerprint_known_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.safetensors");
    std::fs::write(&path, b"abc").unwrap();

    assert_eq!(
      fingerprint_file_blocking(&path).unwrap(),
      "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
  }

  #[tokio::test]
  async fn test_fingerprint_spans_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.bin");
    let b = dir.path().join("b.bin");
    let mut data = vec![7u8; CHUNK_SIZE + 10];
    std::fs::write(&a, &data).unwrap();
    data[CHUNK_SIZE + 5] = 8;
    std::fs::write(&b, &data).unwrap();

    let hash_a = fingerprint_file(a).await.unwrap();
    let hash_b = fingerprint_file(b).await.unwrap();
    assert_ne!(hash_a, hash_b);
  }

  #[tokio::test]
  async fn test_fingerprint_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(fingerprint_file(dir.path().join("missing")).await.is_err());
  }
}
