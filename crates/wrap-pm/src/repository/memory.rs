//! In-memory repository

use super::{
    keep_set, PackageInfo, PackageKey, PackageRepository, Removal, RepositoryError, SupportsCleaning,
};
use crate::anchors::AnchorFile;
use crate::descriptor::{fold_name, WrapDescriptor};
use crate::resolver::ResolutionResult;
use crate::version::Version;
use std::collections::{BTreeMap, HashMap};

/// Map-backed repository
///
/// Useful as a fixture and as a staging area for packages that have no
/// on-disk representation. Cleaning can be disabled to model read-only
/// backends such as remote indexes.
#[derive(Debug, Clone)]
pub struct InMemoryRepository {
    name: String,
    /// Lowercased name -> versions
    packages: BTreeMap<String, Vec<PackageInfo>>,
    descriptors: HashMap<PackageKey, WrapDescriptor>,
    anchors: Option<AnchorFile>,
    cleanable: bool,
}

impl InMemoryRepository {
    /// Create an empty repository that supports cleaning
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: BTreeMap::new(),
            descriptors: HashMap::new(),
            anchors: None,
            cleanable: true,
        }
    }

    /// Create an empty repository without the cleaning capability
    pub fn read_only(name: impl Into<String>) -> Self {
        Self {
            cleanable: false,
            ..Self::new(name)
        }
    }

    /// Add a package version
    pub fn add_package(&mut self, name: &str, version: Version) -> PackageInfo {
        let info = PackageInfo::new(name, version, self.name.clone());
        let versions = self.packages.entry(fold_name(name)).or_default();
        versions.retain(|p| p.version != info.version);
        versions.push(info.clone());
        info
    }

    /// Add a package version (builder style)
    pub fn with_package(mut self, name: &str, version: &str) -> Self {
        if let Ok(version) = Version::parse(version) {
            self.add_package(name, version);
        }
        self
    }

    /// Add a package version carrying a descriptor (builder style)
    pub fn with_descriptor(mut self, name: &str, version: &str, descriptor: WrapDescriptor) -> Self {
        if let Ok(version) = Version::parse(version) {
            let info = self.add_package(name, version);
            self.descriptors.insert(info.key(), descriptor);
        }
        self
    }

    /// Anchors recorded by the last [`SupportsCleaning::refresh_anchors`] call
    pub fn anchors(&self) -> Option<&AnchorFile> {
        self.anchors.as_ref()
    }
}

impl PackageRepository for InMemoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn package_names(&self) -> Vec<String> {
        self.packages
            .values()
            .filter_map(|versions| versions.first().map(|p| p.name.clone()))
            .collect()
    }

    fn packages_by_name(&self, name: &str) -> Vec<PackageInfo> {
        self.packages
            .get(&fold_name(name))
            .cloned()
            .unwrap_or_default()
    }

    fn descriptor(&self, package: &PackageInfo) -> Result<Option<WrapDescriptor>, RepositoryError> {
        Ok(self.descriptors.get(&package.key()).cloned())
    }

    fn cleaning(&mut self) -> Option<&mut dyn SupportsCleaning> {
        if self.cleanable {
            Some(self)
        } else {
            None
        }
    }
}

impl SupportsCleaning for InMemoryRepository {
    fn clean(&mut self, keep: &[PackageInfo]) -> Removal {
        let keep = keep_set(keep);
        let mut removed = Vec::new();

        for versions in self.packages.values_mut() {
            versions.retain(|p| {
                let kept = keep.contains(&p.key());
                if !kept {
                    removed.push(p.clone());
                }
                kept
            });
        }
        self.packages.retain(|_, versions| !versions.is_empty());
        for package in &removed {
            self.descriptors.remove(&package.key());
        }

        Removal {
            removed,
            error: None,
        }
    }

    fn refresh_anchors(&mut self, resolution: &ResolutionResult) -> Result<(), RepositoryError> {
        self.anchors = Some(AnchorFile::from_resolution(resolution, &self.name));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let repo = InMemoryRepository::new("project").with_package("MyLib", "1.0");
        assert_eq!(repo.packages_by_name("mylib").len(), 1);
        assert_eq!(repo.packages_by_name("MYLIB")[0].name, "MyLib");
        assert_eq!(repo.package_names(), vec!["MyLib"]);
    }

    #[test]
    fn test_duplicate_version_replaced() {
        let repo = InMemoryRepository::new("project")
            .with_package("mylib", "1.0")
            .with_package("mylib", "1.0.0");
        assert_eq!(repo.packages_by_name("mylib").len(), 1);
    }

    #[test]
    fn test_read_only_has_no_cleaning() {
        let mut repo = InMemoryRepository::read_only("remote");
        assert!(repo.cleaning().is_none());

        let mut repo = InMemoryRepository::new("project");
        assert!(repo.cleaning().is_some());
    }

    #[test]
    fn test_clean_removes_unkept() {
        let mut repo = InMemoryRepository::new("project")
            .with_package("mylib", "1.0")
            .with_package("mylib", "1.1")
            .with_package("other", "3.0");
        let keep = vec![PackageInfo::new("mylib", Version::new([1, 1]), "project")];

        let removal = repo.clean(&keep);
        assert!(removal.is_complete());
        let mut names: Vec<String> = removal.removed.iter().map(|p| p.full_name()).collect();
        names.sort();

        assert_eq!(names, vec!["mylib-1.0", "other-3.0"]);
        assert_eq!(repo.packages().len(), 1);
        assert!(repo.packages_by_name("other").is_empty());
    }

    #[test]
    fn test_latest_packages() {
        let repo = InMemoryRepository::new("system")
            .with_package("mylib", "1.0")
            .with_package("mylib", "1.10")
            .with_package("mylib", "1.9");
        let latest = repo.latest_packages();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].version, Version::new([1, 10]));
    }
}
