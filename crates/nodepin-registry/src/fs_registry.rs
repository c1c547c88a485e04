use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::error::RegistryError;
use crate::registry::{InstalledPackage, PackageRegistry};

/// Filesystem-based registry of installed node packages.
///
/// Packages are directories under the custom nodes root:
/// ```text
/// {root}/
/// ├── ComfyUI-Impact-Pack/
/// │   └── pyproject.toml (optional)
/// ├── rgthree-comfy/
/// └── ComfyUI-Manager.disabled/   (ignored)
/// ```
pub struct FsPackageRegistry {
  root: PathBuf,
}

impl FsPackageRegistry {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Derive a package id from a directory name.
  ///
  /// Hidden, cache and disabled directories are not packages.
  /// Example: "ComfyUI-Impact-Pack" -> "comfyui-impact-pack"
  fn package_id_from_dir(dir_name: &str) -> Option<String> {
    if dir_name.starts_with('.') || dir_name.starts_with("__") || dir_name.ends_with(".disabled") {
      return None;
    }
    Some(dir_name.to_lowercase())
  }

  /// Read `[project] name` and `version` from the package's pyproject.toml.
  async fn read_project(&self, package_dir: &Path) -> (Option<String>, Option<String>) {
    let path = package_dir.join("pyproject.toml");
    let Ok(content) = fs::read_to_string(&path).await else {
      return (None, None);
    };

    match content.parse::<toml::Table>() {
      Ok(table) => {
        let project = table.get("project").and_then(|p| p.as_table());
        let field = |key: &str| {
          project
            .and_then(|p| p.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
        };
        (field("name"), field("version"))
      }
      Err(e) => {
        debug!(path = %path.display(), error = %e, "ignoring unparseable pyproject.toml");
        (None, None)
      }
    }
  }
}

#[async_trait]
impl PackageRegistry for FsPackageRegistry {
  async fn list(&self) -> Result<Vec<InstalledPackage>, RegistryError> {
    let mut packages = Vec::new();

    if !self.root.exists() {
      return Ok(packages);
    }

    let mut entries = fs::read_dir(&self.root).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if !path.is_dir() {
        continue;
      }

      let Some(dir_id) = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(Self::package_id_from_dir)
      else {
        continue;
      };

      let (name, version) = self.read_project(&path).await;
      packages.push(InstalledPackage {
        id: name.map(|n| n.to_lowercase()).unwrap_or(dir_id),
        version,
        path,
      });
    }

    packages.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(packages)
  }
}
