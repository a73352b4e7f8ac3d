//! Package repositories
//!
//! The resolver and cleaner only see repositories through [`PackageRepository`].
//! Removing versions and persisting anchors is an optional capability exposed
//! through [`PackageRepository::cleaning`]; a repository that returns `None`
//! there is read-only as far as this crate is concerned.

pub mod folder;
pub mod memory;

pub use folder::FolderRepository;
pub use memory::InMemoryRepository;

use crate::anchors::AnchorError;
use crate::archive::ArchiveError;
use crate::descriptor::{fold_name, WrapDescriptor};
use crate::resolver::ResolutionResult;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by repository backends
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// IO error (file operations)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Repository directory does not exist
    #[error("Repository directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// Package is not known to the repository
    #[error("Package not found in repository '{repository}': {package}")]
    PackageNotFound { repository: String, package: String },

    /// Package archive could not be read or is malformed
    #[error("Invalid package archive {package}: {source}")]
    Archive {
        package: String,
        #[source]
        source: ArchiveError,
    },

    /// Anchor file could not be read or written
    #[error("Anchor error in repository '{repository}': {source}")]
    Anchors {
        repository: String,
        #[source]
        source: AnchorError,
    },
}

/// A package version as enumerated by a repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package name
    pub name: String,

    /// Package version
    pub version: Version,

    /// Name of the repository this package was enumerated from
    pub repository: String,
}

impl PackageInfo {
    pub fn new(name: impl Into<String>, version: Version, repository: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version,
            repository: repository.into(),
        }
    }

    /// Display identity, `<name>-<version>`
    pub fn full_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// Repository-independent identity used for keep sets
    pub fn key(&self) -> PackageKey {
        PackageKey::new(&self.name, &self.version)
    }
}

impl fmt::Display for PackageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Case-insensitive `(name, version)` identity of a package
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageKey {
    name: String,
    version: Version,
}

impl PackageKey {
    pub fn new(name: &str, version: &Version) -> Self {
        Self {
            name: fold_name(name),
            version: version.clone(),
        }
    }
}

/// Build a keep set from a list of packages
pub fn keep_set<'a>(packages: impl IntoIterator<Item = &'a PackageInfo>) -> HashSet<PackageKey> {
    packages.into_iter().map(PackageInfo::key).collect()
}

/// Read access to a package repository
///
/// Lookups by name are case-insensitive. Implementations must present a
/// consistent view for the duration of a resolve or clean call.
pub trait PackageRepository {
    /// Repository name, used in reports and as the source of resolved packages
    fn name(&self) -> &str;

    /// Names of all packages with at least one version
    fn package_names(&self) -> Vec<String>;

    /// All known versions of `name` (empty if none)
    fn packages_by_name(&self, name: &str) -> Vec<PackageInfo>;

    /// Every package version in the repository
    fn packages(&self) -> Vec<PackageInfo> {
        self.package_names()
            .iter()
            .flat_map(|name| self.packages_by_name(name))
            .collect()
    }

    /// Latest version of every package
    fn latest_packages(&self) -> Vec<PackageInfo> {
        self.package_names()
            .iter()
            .filter_map(|name| {
                self.packages_by_name(name)
                    .into_iter()
                    .max_by(|a, b| a.version.cmp(&b.version))
            })
            .collect()
    }

    /// Descriptor shipped with a package, if the backend can provide one
    fn descriptor(&self, _package: &PackageInfo) -> Result<Option<WrapDescriptor>, RepositoryError> {
        Ok(None)
    }

    /// Cleaning capability, `None` for read-only repositories
    fn cleaning(&mut self) -> Option<&mut dyn SupportsCleaning> {
        None
    }
}

/// Outcome of [`SupportsCleaning::clean`]
///
/// `removed` lists every version actually deleted, even when `error` reports
/// a failure that stopped the clean partway through.
#[derive(Debug, Default)]
pub struct Removal {
    pub removed: Vec<PackageInfo>,
    pub error: Option<RepositoryError>,
}

impl Removal {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Optional capability of repositories that own their storage
pub trait SupportsCleaning {
    /// Remove every package version not present in `keep`
    fn clean(&mut self, keep: &[PackageInfo]) -> Removal;

    /// Persist anchors for the packages this repository supplied in `resolution`
    fn refresh_anchors(&mut self, resolution: &ResolutionResult) -> Result<(), RepositoryError>;
}
