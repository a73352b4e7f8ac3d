//! Package cleanup
//!
//! Removes package versions a repository no longer needs. What is kept
//! depends on the scope: the project repository keeps what the descriptor
//! currently resolves to, the system repository keeps the latest version of
//! every package. After a repository is cleaned its anchors are refreshed
//! from a new resolution, so they never point at a deleted version.
//!
//! Failures are collected per scope in a [`CleanReport`]; one failing
//! repository does not stop the others.

use crate::descriptor::{same_name, WrapDescriptor};
use crate::environment::{Environment, RepositoryScope};
use crate::repository::{PackageInfo, PackageRepository, RepositoryError};
use crate::resolver::DependencyResolver;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors reported while cleaning
#[derive(Debug, Error)]
pub enum CleanError {
    /// The environment has no repository for the requested scope
    #[error("Repository '{repository}' not found.")]
    RepositoryNotFound { repository: String },

    /// The repository cannot remove packages
    #[error("Repository '{repository}' does not support cleaning.")]
    UnsupportedCapability { repository: String },

    /// A name filter matched nothing in any requested scope
    #[error("Could not find a package called '{name}'.")]
    PackageNotFound { name: String },

    /// The backend failed while removing packages or writing anchors
    #[error("Failed to clean repository '{repository}': {source}")]
    Repository {
        repository: String,
        #[source]
        source: RepositoryError,
    },
}

/// Outcome of a cleanup
#[derive(Debug, Default)]
pub struct CleanReport {
    /// Removed package versions, one per deletion
    pub removed: Vec<PackageInfo>,

    /// Per-scope failures
    pub errors: Vec<CleanError>,
}

impl CleanReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Human-readable removal notifications, one per removed version
    pub fn notifications(&self) -> Vec<String> {
        self.removed
            .iter()
            .map(|p| format!("Removed package '{}'.", p.full_name()))
            .collect()
    }

    /// Append another report
    pub fn merge(&mut self, other: CleanReport) {
        self.removed.extend(other.removed);
        self.errors.extend(other.errors);
    }
}

/// Clean one repository against a keep list
///
/// Without `name_filter`, every version not in `keep_packages` is removed.
/// With a filter, packages of other names are left alone and only the
/// filtered name is reduced to the versions listed in `keep_packages`.
/// Anchors are then refreshed from a resolution of `descriptor` against the
/// reduced repository.
pub fn clean_repository(
    repository: &mut dyn PackageRepository,
    name_filter: Option<&str>,
    keep_packages: &[PackageInfo],
    descriptor: &WrapDescriptor,
    resolver: &DependencyResolver,
) -> CleanReport {
    let mut report = CleanReport::default();
    let repository_name = repository.name().to_string();

    let keep: Vec<PackageInfo> = match name_filter {
        Some(name) => repository
            .packages()
            .into_iter()
            .filter(|p| !same_name(&p.name, name))
            .chain(
                keep_packages
                    .iter()
                    .filter(|p| same_name(&p.name, name))
                    .cloned(),
            )
            .collect(),
        None => keep_packages.to_vec(),
    };
    debug!("Keeping {} packages in {}", keep.len(), repository_name);

    let Some(cleaning) = repository.cleaning() else {
        warn!("{} does not support cleaning", repository_name);
        report.errors.push(CleanError::UnsupportedCapability {
            repository: repository_name,
        });
        return report;
    };

    let removal = cleaning.clean(&keep);
    for package in &removal.removed {
        info!("Removed package {}", package.full_name());
    }
    report.removed = removal.removed;

    if let Some(source) = removal.error {
        warn!("Cleaning {} stopped: {}", repository_name, source);
        report.errors.push(CleanError::Repository {
            repository: repository_name.clone(),
            source,
        });
        if report.removed.is_empty() {
            return report;
        }
    }

    let resolution = resolver.resolve(descriptor, &[&*repository]);
    if let Some(cleaning) = repository.cleaning() {
        if let Err(source) = cleaning.refresh_anchors(&resolution) {
            warn!("Could not refresh anchors of {}: {}", repository_name, source);
            report.errors.push(CleanError::Repository {
                repository: repository_name,
                source,
            });
        }
    }

    report
}

/// Cleans the repositories of an [`Environment`]
pub struct PackageCleaner<'a> {
    environment: &'a mut Environment,
    resolver: DependencyResolver,
}

impl<'a> PackageCleaner<'a> {
    pub fn new(environment: &'a mut Environment, resolver: DependencyResolver) -> Self {
        Self {
            environment,
            resolver,
        }
    }

    /// Clean the given scopes, optionally restricted to one package name
    ///
    /// Keep sets are computed for every scope before anything is deleted.
    /// When `name` matches no package in any of the scopes, a
    /// [`CleanError::PackageNotFound`] is reported and nothing is removed.
    pub fn clean(&mut self, name: Option<&str>, scopes: &[RepositoryScope]) -> CleanReport {
        let mut report = CleanReport::default();
        let mut scopes = scopes.to_vec();
        scopes.sort();
        scopes.dedup();

        let mut planned = Vec::new();
        let mut matches = 0;

        for scope in scopes {
            let Some(repository) = self.environment.repository(scope) else {
                report.errors.push(CleanError::RepositoryNotFound {
                    repository: scope.label().to_string(),
                });
                continue;
            };

            if let Some(name) = name {
                matches += repository.packages_by_name(name).len();
            }

            let keep: Vec<PackageInfo> = match scope {
                RepositoryScope::Project => self
                    .resolver
                    .resolve(&self.environment.descriptor, &[repository])
                    .packages()
                    .cloned()
                    .collect(),
                RepositoryScope::System => repository.latest_packages(),
            };
            planned.push((scope, keep));
        }

        if let Some(name) = name {
            if matches == 0 {
                report.errors.push(CleanError::PackageNotFound {
                    name: name.to_string(),
                });
                return report;
            }
        }

        for (scope, keep) in planned {
            let (descriptor, repository) = self.environment.repository_mut(scope);
            let Some(repository) = repository else {
                continue;
            };
            debug!("Cleaning {}", repository.name());
            report.merge(clean_repository(
                repository,
                name,
                &keep,
                descriptor,
                &self.resolver,
            ));
        }

        report
    }
}
