//! Project environment
//!
//! Bundles the descriptor being worked on with the repositories it resolves
//! against. Everything the resolver and cleaner need is passed in through an
//! `Environment`; nothing is looked up from process-wide state.

use crate::config::{Config, ConfigError};
use crate::descriptor::{DescriptorError, WrapDescriptor, DESCRIPTOR_EXTENSION};
use crate::repository::{FolderRepository, PackageRepository, RepositoryError};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name given to the project repository
pub const PROJECT_REPOSITORY: &str = "Project repository";

/// Name given to the system repository
pub const SYSTEM_REPOSITORY: &str = "System repository";

/// Errors that can occur while building an environment
#[derive(Debug, Error)]
pub enum EnvironmentError {
    /// No descriptor in the start directory or any ancestor
    #[error("No .{} descriptor found in {0} or its parents", DESCRIPTOR_EXTENSION)]
    NoDescriptor(PathBuf),

    /// Descriptor could not be loaded
    #[error("Descriptor error: {0}")]
    DescriptorError(#[from] DescriptorError),

    /// Repository could not be opened
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Which of the environment's repositories an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RepositoryScope {
    Project,
    System,
}

impl RepositoryScope {
    /// Display name of the repository in this scope
    pub fn label(&self) -> &'static str {
        match self {
            RepositoryScope::Project => PROJECT_REPOSITORY,
            RepositoryScope::System => SYSTEM_REPOSITORY,
        }
    }
}

impl fmt::Display for RepositoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Descriptor plus the repositories it is resolved against
pub struct Environment {
    /// Descriptor of the current project
    pub descriptor: WrapDescriptor,

    /// Where the descriptor was loaded from
    pub descriptor_path: Option<PathBuf>,

    /// Project repository (highest priority)
    pub project_repository: Option<Box<dyn PackageRepository>>,

    /// System repository
    pub system_repository: Option<Box<dyn PackageRepository>>,
}

impl Environment {
    /// Environment with a descriptor and no repositories
    pub fn new(descriptor: WrapDescriptor) -> Self {
        Self {
            descriptor,
            descriptor_path: None,
            project_repository: None,
            system_repository: None,
        }
    }

    pub fn with_project_repository(mut self, repository: impl PackageRepository + 'static) -> Self {
        self.project_repository = Some(Box::new(repository));
        self
    }

    pub fn with_system_repository(mut self, repository: impl PackageRepository + 'static) -> Self {
        self.system_repository = Some(Box::new(repository));
        self
    }

    /// Build the environment for the project containing `start_dir`
    ///
    /// The project repository is `<descriptor dir>/<config.project_repository>`
    /// and is only opened if it exists. The system repository directory is
    /// created if missing. Only the project repository writes anchors, and
    /// only when `config.anchoring` is set.
    pub fn discover(start_dir: &Path, config: &Config) -> Result<Self, EnvironmentError> {
        let descriptor_path = find_descriptor(start_dir)?
            .ok_or_else(|| EnvironmentError::NoDescriptor(start_dir.to_path_buf()))?;
        debug!("Using descriptor {}", descriptor_path.display());

        let descriptor = WrapDescriptor::from_file(&descriptor_path)?;
        let mut environment = Self::new(descriptor);

        let project_dir = descriptor_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join(&config.project_repository);
        if project_dir.is_dir() {
            let repository = FolderRepository::open(PROJECT_REPOSITORY, &project_dir)?
                .with_anchoring(config.anchoring);
            environment.project_repository = Some(Box::new(repository));
        } else {
            debug!("No project repository at {}", project_dir.display());
        }

        let system_dir = config.system_repository_path()?;
        let repository =
            FolderRepository::create(SYSTEM_REPOSITORY, system_dir)?.with_anchoring(false);
        environment.system_repository = Some(Box::new(repository));

        environment.descriptor_path = Some(descriptor_path);
        Ok(environment)
    }

    /// Repositories in resolution priority order: project, then system
    pub fn repositories(&self) -> Vec<&dyn PackageRepository> {
        [&self.project_repository, &self.system_repository]
            .into_iter()
            .filter_map(|r| r.as_deref())
            .collect()
    }

    /// Repository for a scope
    pub fn repository(&self, scope: RepositoryScope) -> Option<&dyn PackageRepository> {
        match scope {
            RepositoryScope::Project => self.project_repository.as_deref(),
            RepositoryScope::System => self.system_repository.as_deref(),
        }
    }

    /// Mutable repository for a scope, alongside the descriptor
    pub fn repository_mut(
        &mut self,
        scope: RepositoryScope,
    ) -> (&WrapDescriptor, Option<&mut (dyn PackageRepository + 'static)>) {
        let repository = match scope {
            RepositoryScope::Project => self.project_repository.as_deref_mut(),
            RepositoryScope::System => self.system_repository.as_deref_mut(),
        };
        (&self.descriptor, repository)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("descriptor", &self.descriptor)
            .field("descriptor_path", &self.descriptor_path)
            .field(
                "project_repository",
                &self.project_repository.as_ref().map(|r| r.name().to_string()),
            )
            .field(
                "system_repository",
                &self.system_repository.as_ref().map(|r| r.name().to_string()),
            )
            .finish()
    }
}

/// Find the first descriptor in `start_dir` or its ancestors
///
/// Within one directory, descriptors are considered in file name order.
pub fn find_descriptor(start_dir: &Path) -> Result<Option<PathBuf>, std::io::Error> {
    let mut current = start_dir;

    loop {
        if current.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(current)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| {
                    path.is_file()
                        && path.extension().and_then(|e| e.to_str()) == Some(DESCRIPTOR_EXTENSION)
                })
                .collect();
            found.sort();
            if let Some(path) = found.into_iter().next() {
                return Ok(Some(path));
            }
        }

        current = match current.parent() {
            Some(parent) => parent,
            None => return Ok(None),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use crate::resolver::ResolutionResult;

    #[test]
    fn test_find_descriptor_in_ancestor() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().to_path_buf();
        fs::write(root.join("app.wrapdesc"), "depends: nunit\n").unwrap();

        let nested = root.join("src").join("app");
        fs::create_dir_all(&nested).unwrap();

        let found = find_descriptor(&nested).unwrap().unwrap();
        assert_eq!(found, root.join("app.wrapdesc"));
    }

    #[test]
    fn test_repositories_priority_order() {
        let environment = Environment::new(WrapDescriptor::new())
            .with_system_repository(InMemoryRepository::new("system"))
            .with_project_repository(InMemoryRepository::new("project"));

        let names: Vec<&str> = environment.repositories().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["project", "system"]);
    }

    #[test]
    fn test_repositories_skip_missing() {
        let environment = Environment::new(WrapDescriptor::new())
            .with_system_repository(InMemoryRepository::new("system"));

        assert_eq!(environment.repositories().len(), 1);
        assert!(environment.repository(RepositoryScope::Project).is_none());
    }

    #[test]
    fn test_discover() {
        let temp = tempfile::tempdir().unwrap();
        let project = temp.path().join("project");
        fs::create_dir_all(project.join("wraps")).unwrap();
        fs::write(project.join("app.wrapdesc"), "depends: nunit\n").unwrap();

        let config = Config {
            system_repository: Some(temp.path().join("system")),
            ..Config::default()
        };

        let environment = Environment::discover(&project, &config).unwrap();
        assert_eq!(environment.descriptor.name.as_deref(), Some("app"));
        assert_eq!(environment.descriptor.dependencies.len(), 1);
        assert_eq!(environment.repositories().len(), 2);
        assert!(temp.path().join("system").is_dir());
    }

    #[test]
    fn test_discover_anchors_project_only() {
        let temp = tempfile::tempdir().unwrap();
        let project = temp.path().join("project");
        let system = temp.path().join("system");
        fs::create_dir_all(project.join("wraps")).unwrap();
        fs::write(project.join("app.wrapdesc"), "depends: nunit\n").unwrap();

        let config = Config {
            system_repository: Some(system.clone()),
            ..Config::default()
        };
        let mut environment = Environment::discover(&project, &config).unwrap();
        let resolution = ResolutionResult::default();

        for scope in [RepositoryScope::Project, RepositoryScope::System] {
            let (_, repository) = environment.repository_mut(scope);
            repository
                .unwrap()
                .cleaning()
                .unwrap()
                .refresh_anchors(&resolution)
                .unwrap();
        }

        assert!(project.join("wraps").join("anchors.toml").exists());
        assert!(!system.join("anchors.toml").exists());
    }
}
