//! nodepin Registry
//!
//! Two views of node packages:
//! - [`Catalog`]: a static snapshot of every known package and which node
//!   types it exports, loaded through a [`CatalogSource`]
//! - [`PackageRegistry`]: the packages actually installed in an environment

mod catalog;
mod error;
mod fs_registry;
mod registry;
mod source;

pub use catalog::{Catalog, CatalogDocument, PackageInfo};
pub use error::RegistryError;
pub use fs_registry::FsPackageRegistry;
pub use registry::{InstalledPackage, PackageRegistry};
pub use source::{CatalogSource, FsCatalogSource};
