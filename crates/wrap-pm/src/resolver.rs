//! Dependency resolution
//!
//! Matches each dependency of a descriptor against an ordered list of
//! repositories. The first repository holding any satisfying version wins and
//! the newest satisfying version from that repository is selected; lower
//! priority repositories are never consulted for that dependency.

use crate::descriptor::{fold_name, PackageDependency, WrapDescriptor};
use crate::repository::{PackageInfo, PackageRepository};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use thiserror::Error;
use tracing::{debug, warn};

/// Per-dependency resolution failures
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
pub enum ResolveError {
    /// No repository has a version satisfying the constraints
    #[error("Could not find a version of '{name}' matching {constraint}")]
    DependencyUnresolved { name: String, constraint: String },

    /// A resolved package's descriptor could not be read (transitive resolution)
    #[error("Could not read the descriptor of '{package}': {reason}")]
    DescriptorUnavailable { package: String, reason: String },
}

/// Outcome for one requested dependency
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDependency {
    /// The dependency as declared
    pub requested: PackageDependency,

    /// Selected package, `None` if unresolved
    pub package: Option<PackageInfo>,

    /// Name of the repository the package was selected from
    pub source: Option<String>,
}

impl ResolvedDependency {
    pub fn is_resolved(&self) -> bool {
        self.package.is_some()
    }
}

/// Result of one resolver invocation
///
/// `dependencies` preserves the order of the descriptor. `errors` holds one
/// entry per dependency that failed to resolve and, for transitive
/// resolution, one per resolved package whose descriptor could not be read.
/// Errors can therefore be present while [`Self::all_resolved`] holds; the
/// resolved entries remain usable either way.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionResult {
    pub dependencies: Vec<ResolvedDependency>,
    pub errors: Vec<ResolveError>,
}

impl ResolutionResult {
    /// True when no error of any kind was recorded
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// True when every dependency selected a package
    pub fn all_resolved(&self) -> bool {
        self.dependencies.iter().all(ResolvedDependency::is_resolved)
    }

    /// Every selected package, in dependency order
    pub fn packages(&self) -> impl Iterator<Item = &PackageInfo> {
        self.dependencies.iter().filter_map(|d| d.package.as_ref())
    }

    /// Selected packages that came from the named repository
    pub fn packages_from<'a>(&'a self, repository: &'a str) -> impl Iterator<Item = &'a PackageInfo> {
        self.dependencies
            .iter()
            .filter(move |d| d.source.as_deref() == Some(repository))
            .filter_map(|d| d.package.as_ref())
    }

    /// Outcome for a dependency name
    pub fn get(&self, name: &str) -> Option<&ResolvedDependency> {
        self.dependencies.iter().find(|d| d.requested.is_named(name))
    }
}

/// Dependency resolver
///
/// Stateless; repositories are passed per call in priority order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyResolver;

impl DependencyResolver {
    /// Create a new resolver
    pub fn new() -> Self {
        Self
    }

    /// Resolve the direct dependencies of `descriptor`
    ///
    /// Never aborts on a miss: every dependency gets an entry, failures are
    /// also recorded in [`ResolutionResult::errors`].
    pub fn resolve(
        &self,
        descriptor: &WrapDescriptor,
        repositories: &[&dyn PackageRepository],
    ) -> ResolutionResult {
        let mut result = ResolutionResult::default();
        for dependency in &descriptor.dependencies {
            let (resolved, _) = self.resolve_dependency(dependency, repositories, &mut result.errors);
            result.dependencies.push(resolved);
        }
        result
    }

    /// Resolve dependencies and, recursively, the dependencies of every
    /// resolved package's descriptor
    ///
    /// Names are visited once (case-insensitive), so the first requirement
    /// seen for a name wins and cycles terminate.
    pub fn resolve_transitive(
        &self,
        descriptor: &WrapDescriptor,
        repositories: &[&dyn PackageRepository],
    ) -> ResolutionResult {
        let mut result = ResolutionResult::default();
        let mut visited = HashSet::new();
        let mut pending: VecDeque<PackageDependency> =
            descriptor.dependencies.iter().cloned().collect();

        while let Some(dependency) = pending.pop_front() {
            if !visited.insert(fold_name(&dependency.name)) {
                debug!("Skipping already visited dependency {}", dependency.name);
                continue;
            }

            let (resolved, source_index) =
                self.resolve_dependency(&dependency, repositories, &mut result.errors);

            if let (Some(package), Some(index)) = (&resolved.package, source_index) {
                match repositories[index].descriptor(package) {
                    Ok(Some(child)) => {
                        debug!(
                            "{} declares {} dependencies",
                            package.full_name(),
                            child.dependencies.len()
                        );
                        pending.extend(child.dependencies);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Could not read descriptor of {}: {}", package.full_name(), e);
                        result.errors.push(ResolveError::DescriptorUnavailable {
                            package: package.full_name(),
                            reason: e.to_string(),
                        });
                    }
                }
            }

            result.dependencies.push(resolved);
        }

        result
    }

    /// Highest version in `repository` satisfying every vertex of `dependency`
    pub fn best_match(
        &self,
        dependency: &PackageDependency,
        repository: &dyn PackageRepository,
    ) -> Option<PackageInfo> {
        repository
            .packages_by_name(&dependency.name)
            .into_iter()
            .filter(|p| dependency.is_satisfied_by(&p.version))
            .max_by(|a, b| a.version.cmp(&b.version))
    }

    fn resolve_dependency(
        &self,
        dependency: &PackageDependency,
        repositories: &[&dyn PackageRepository],
        errors: &mut Vec<ResolveError>,
    ) -> (ResolvedDependency, Option<usize>) {
        for (index, repository) in repositories.iter().enumerate() {
            if let Some(package) = self.best_match(dependency, *repository) {
                debug!(
                    "Resolved {} ({}) to {} from {}",
                    dependency.name,
                    dependency.constraint(),
                    package.version,
                    repository.name()
                );
                let resolved = ResolvedDependency {
                    requested: dependency.clone(),
                    package: Some(package),
                    source: Some(repository.name().to_string()),
                };
                return (resolved, Some(index));
            }
        }

        warn!(
            "No version of {} matches {}",
            dependency.name,
            dependency.constraint()
        );
        errors.push(ResolveError::DependencyUnresolved {
            name: dependency.name.clone(),
            constraint: dependency.constraint(),
        });

        let unresolved = ResolvedDependency {
            requested: dependency.clone(),
            package: None,
            source: None,
        };
        (unresolved, None)
    }
}
