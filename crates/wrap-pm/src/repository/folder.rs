//! Folder repository
//!
//! A directory of package archives named `<name>-<version>.wrap`, plus an
//! `anchors.toml` recording the versions chosen by the last resolution.
//!
//! Directory structure:
//! ```text
//! wraps/
//! ├── openrasta-2.0.wrap
//! ├── openrasta-2.1.wrap
//! ├── nunit-2.5.wrap
//! └── anchors.toml
//! ```

use super::{
    keep_set, PackageInfo, PackageRepository, Removal, RepositoryError, SupportsCleaning,
};
use crate::anchors::{AnchorFile, ANCHORS_FILE};
use crate::archive::{package_file_name, PackageArchive, PACKAGE_EXTENSION};
use crate::descriptor::{fold_name, WrapDescriptor};
use crate::resolver::ResolutionResult;
use crate::version::Version;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct FolderEntry {
    info: PackageInfo,
    path: PathBuf,
}

/// Repository backed by a local directory of package archives
#[derive(Debug, Clone)]
pub struct FolderRepository {
    name: String,
    root: PathBuf,
    anchoring: bool,
    /// Lowercased name -> entries sorted by version
    entries: BTreeMap<String, Vec<FolderEntry>>,
}

impl FolderRepository {
    /// Open an existing repository directory and index its archives
    pub fn open(name: impl Into<String>, root: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(RepositoryError::DirectoryNotFound(root));
        }

        let mut repository = Self {
            name: name.into(),
            root,
            anchoring: true,
            entries: BTreeMap::new(),
        };
        repository.refresh()?;
        Ok(repository)
    }

    /// Open a repository directory, creating it if needed
    pub fn create(name: impl Into<String>, root: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Self::open(name, root)
    }

    /// Enable or disable writing `anchors.toml`
    pub fn with_anchoring(mut self, enabled: bool) -> Self {
        self.anchoring = enabled;
        self
    }

    /// Repository directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the anchor file
    pub fn anchors_path(&self) -> PathBuf {
        self.root.join(ANCHORS_FILE)
    }

    /// Rescan the directory
    ///
    /// Files are indexed in name order. When two files carry equal versions
    /// of one package (`mylib-1.0.wrap` and `mylib-1.0.0.wrap`), the first is
    /// indexed and the other ignored with a warning.
    pub fn refresh(&mut self) -> Result<(), RepositoryError> {
        self.entries.clear();

        let mut paths = fs::read_dir(&self.root)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        paths.sort();

        for path in paths {
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !file_name.ends_with(&format!(".{}", PACKAGE_EXTENSION)) {
                continue;
            }

            match parse_package_file_name(file_name) {
                Some((name, version)) => self.insert(name, version, path),
                None => warn!("Ignoring {}: not a <name>-<version> package file", path.display()),
            }
        }

        for versions in self.entries.values_mut() {
            versions.sort_by(|a, b| a.info.version.cmp(&b.info.version));
        }

        debug!(
            "Indexed {} packages in {}",
            self.entries.values().map(Vec::len).sum::<usize>(),
            self.root.display()
        );
        Ok(())
    }

    fn insert(&mut self, name: String, version: Version, path: PathBuf) {
        let versions = self.entries.entry(fold_name(&name)).or_default();
        if let Some(existing) = versions.iter().find(|e| e.info.version == version) {
            warn!(
                "Ignoring {}: same version as {}",
                path.display(),
                existing.path.display()
            );
            return;
        }
        let info = PackageInfo::new(name, version, self.name.clone());
        versions.push(FolderEntry { info, path });
    }

    fn entry(&self, package: &PackageInfo) -> Option<&FolderEntry> {
        self.entries
            .get(&fold_name(&package.name))?
            .iter()
            .find(|e| e.info.version == package.version)
    }

    /// Archive file backing `package`
    pub fn package_path(&self, package: &PackageInfo) -> Option<&Path> {
        self.entry(package).map(|e| e.path.as_path())
    }

    /// Copy a built package archive into the repository
    ///
    /// The archive's file name must follow `<name>-<version>.wrap`. An
    /// existing archive for the same version is replaced.
    pub fn add_package(&mut self, archive: &Path) -> Result<PackageInfo, RepositoryError> {
        let (name, version) = archive
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_package_file_name)
            .ok_or_else(|| RepositoryError::PackageNotFound {
                repository: self.name.clone(),
                package: archive.display().to_string(),
            })?;

        let target = self
            .root
            .join(package_file_name(&name, &version.to_string()));
        if archive != target.as_path() {
            fs::copy(archive, &target)?;
        }

        self.refresh()?;
        info!("Added {}-{} to {}", name, version, self.name);
        Ok(PackageInfo::new(name, version, self.name.clone()))
    }

    /// Anchors written by the last refresh, if any
    pub fn anchors(&self) -> Result<Option<AnchorFile>, RepositoryError> {
        let path = self.anchors_path();
        if !path.exists() {
            return Ok(None);
        }
        AnchorFile::from_file(&path)
            .map(Some)
            .map_err(|source| RepositoryError::Anchors {
                repository: self.name.clone(),
                source,
            })
    }
}

impl PackageRepository for FolderRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn package_names(&self) -> Vec<String> {
        self.entries
            .values()
            .filter_map(|versions| versions.first().map(|e| e.info.name.clone()))
            .collect()
    }

    fn packages_by_name(&self, name: &str) -> Vec<PackageInfo> {
        self.entries
            .get(&fold_name(name))
            .map(|versions| versions.iter().map(|e| e.info.clone()).collect())
            .unwrap_or_default()
    }

    fn descriptor(&self, package: &PackageInfo) -> Result<Option<WrapDescriptor>, RepositoryError> {
        let Some(entry) = self.entry(package) else {
            return Ok(None);
        };

        let mut archive = PackageArchive::open(&entry.path).map_err(|source| RepositoryError::Archive {
            package: package.full_name(),
            source,
        })?;
        archive
            .descriptor(&entry.info.name)
            .map_err(|source| RepositoryError::Archive {
                package: package.full_name(),
                source,
            })
    }

    fn cleaning(&mut self) -> Option<&mut dyn SupportsCleaning> {
        Some(self)
    }
}

impl SupportsCleaning for FolderRepository {
    fn clean(&mut self, keep: &[PackageInfo]) -> Removal {
        let keep = keep_set(keep);
        let mut removed = Vec::new();
        let mut failure = None;

        for versions in self.entries.values_mut() {
            versions.retain(|entry| {
                if failure.is_some() || keep.contains(&entry.info.key()) {
                    return true;
                }
                match fs::remove_file(&entry.path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        debug!("{} already gone", entry.path.display());
                    }
                    Err(e) => {
                        warn!("Failed to remove {}: {}", entry.path.display(), e);
                        failure = Some(e);
                        return true;
                    }
                }
                info!("Removed {} from {}", entry.info.full_name(), entry.info.repository);
                removed.push(entry.info.clone());
                false
            });
        }
        self.entries.retain(|_, versions| !versions.is_empty());

        Removal {
            removed,
            error: failure.map(RepositoryError::from),
        }
    }

    fn refresh_anchors(&mut self, resolution: &ResolutionResult) -> Result<(), RepositoryError> {
        if !self.anchoring {
            debug!("Anchoring disabled for {}", self.name);
            return Ok(());
        }

        let mut anchors = AnchorFile::from_resolution(resolution, &self.name);
        for anchor in &mut anchors.anchors {
            let Ok(version) = Version::parse(&anchor.version) else {
                continue;
            };
            let package = PackageInfo::new(anchor.name.clone(), version, self.name.clone());
            if let Some(path) = self.package_path(&package) {
                anchor.checksum = Some(file_checksum(path)?);
            }
        }

        anchors
            .to_file(&self.anchors_path())
            .map_err(|source| RepositoryError::Anchors {
                repository: self.name.clone(),
                source,
            })?;
        debug!("Wrote {} anchors for {}", anchors.anchors.len(), self.name);
        Ok(())
    }
}

/// Split `<name>-<version>.wrap` into its name and version
///
/// The version is the text after the last `-`, so names may contain dashes.
pub fn parse_package_file_name(file_name: &str) -> Option<(String, Version)> {
    let stem = file_name.strip_suffix(&format!(".{}", PACKAGE_EXTENSION))?;
    let (name, version) = stem.rsplit_once('-')?;
    if name.is_empty() {
        return None;
    }
    let version = Version::parse(version).ok()?;
    Some((name.to_string(), version))
}

/// SHA-256 of a file, hex-encoded
pub fn file_checksum(path: &Path) -> Result<String, RepositoryError> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_package_file_name() {
        let (name, version) = parse_package_file_name("openrasta-2.1.0.wrap").unwrap();
        assert_eq!(name, "openrasta");
        assert_eq!(version, Version::new([2, 1, 0]));
    }

    #[test]
    fn test_parse_dashed_name() {
        let (name, version) = parse_package_file_name("castle-core-1.2.wrap").unwrap();
        assert_eq!(name, "castle-core");
        assert_eq!(version, Version::new([1, 2]));
    }

    #[test]
    fn test_parse_rejects_invalid_names() {
        assert!(parse_package_file_name("openrasta.wrap").is_none());
        assert!(parse_package_file_name("openrasta-beta.wrap").is_none());
        assert!(parse_package_file_name("-1.0.wrap").is_none());
        assert!(parse_package_file_name("openrasta-1.0.zip").is_none());
    }

    #[test]
    fn test_open_missing_directory() {
        let temp = tempfile::tempdir().unwrap();
        let result = FolderRepository::open("project", temp.path().join("missing"));
        assert!(matches!(result, Err(RepositoryError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_index_ignores_foreign_files() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("mylib-1.0.wrap"), b"").unwrap();
        fs::write(temp.path().join("notes.txt"), b"").unwrap();
        fs::write(temp.path().join("broken.wrap"), b"").unwrap();

        let repo = FolderRepository::open("project", temp.path()).unwrap();
        assert_eq!(repo.package_names(), vec!["mylib"]);
        assert_eq!(repo.packages().len(), 1);
    }

    #[test]
    fn test_checksum_is_hex_sha256() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("data");
        fs::write(&path, b"abc").unwrap();

        let checksum = file_checksum(&path).unwrap();
        assert_eq!(
            checksum,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
