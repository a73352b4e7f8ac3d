//! Wrap Package Manager Library
//!
//! This crate provides the core of the wrap package manager, including:
//! - Version parsing and constraint vertices
//! - Descriptor parsing (`*.wrapdesc`) and the dependency line grammar
//! - Repository abstraction with folder and in-memory backends
//! - Dependency resolution across prioritized repositories
//! - Cleanup of unneeded package versions and anchor persistence
//! - Package archive building and reading

pub mod anchors;
pub mod archive;
pub mod cleaner;
pub mod config;
pub mod descriptor;
pub mod environment;
pub mod repository;
pub mod resolver;
pub mod version;

pub use anchors::{Anchor, AnchorError, AnchorFile};
pub use archive::{
    build_archive, build_package, content_from_directory, ArchiveError, PackageArchive,
    PackageContent,
};
pub use cleaner::{clean_repository, CleanError, CleanReport, PackageCleaner};
pub use config::{Config, ConfigError};
pub use descriptor::{DescriptorError, PackageDependency, WrapDescriptor};
pub use environment::{find_descriptor, Environment, EnvironmentError, RepositoryScope};
pub use repository::{
    FolderRepository, InMemoryRepository, PackageInfo, PackageRepository, Removal, RepositoryError,
    SupportsCleaning,
};
pub use resolver::{DependencyResolver, ResolutionResult, ResolveError, ResolvedDependency};
pub use version::{Version, VersionError, VersionVertex};
