//! Anchor files (anchors.toml)
//!
//! An anchor records, per dependency name, the version chosen by the last
//! successful resolution against a repository. Anchors are rewritten after
//! every clean so they never point at a deleted version.

use crate::descriptor::{fold_name, same_name};
use crate::resolver::ResolutionResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during anchor file operations
#[derive(Debug, Error)]
pub enum AnchorError {
    /// Failed to read anchor file
    #[error("Failed to read anchor file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse anchor file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize anchor file
    #[error("Failed to serialize anchor file: {0}")]
    SerializeError(String),

    /// Validation error
    #[error("Invalid anchor file: {0}")]
    ValidationError(String),
}

/// Anchor file format version
pub const ANCHORS_VERSION: u32 = 1;

/// Default anchor file name inside a repository
pub const ANCHORS_FILE: &str = "anchors.toml";

/// Anchor file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnchorFile {
    /// Anchor file format version
    pub version: u32,

    /// Anchored packages
    #[serde(default)]
    pub anchors: Vec<Anchor>,
}

/// A single anchored package version
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Anchor {
    /// Package name
    pub name: String,

    /// Resolved version
    pub version: String,

    /// SHA-256 checksum of the package archive (hex-encoded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl AnchorFile {
    /// Create a new empty anchor file
    pub fn new() -> Self {
        Self {
            version: ANCHORS_VERSION,
            anchors: Vec::new(),
        }
    }

    /// Anchors for every dependency `resolution` resolved from `repository`
    pub fn from_resolution(resolution: &ResolutionResult, repository: &str) -> Self {
        let mut file = Self::new();
        for package in resolution.packages_from(repository) {
            file.set_anchor(Anchor::new(&package.name, package.version.to_string()));
        }
        file.sort_anchors();
        file
    }

    /// Parse an anchor file from disk
    pub fn from_file(path: &Path) -> Result<Self, AnchorError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse an anchor file from a string
    pub fn from_str(content: &str) -> Result<Self, AnchorError> {
        let file: AnchorFile = toml::from_str(content)?;
        file.validate()?;
        Ok(file)
    }

    /// Validate the anchor file
    pub fn validate(&self) -> Result<(), AnchorError> {
        if self.version != ANCHORS_VERSION {
            return Err(AnchorError::ValidationError(format!(
                "Unsupported anchor file version: {} (expected {})",
                self.version, ANCHORS_VERSION
            )));
        }

        for anchor in &self.anchors {
            if anchor.name.is_empty() {
                return Err(AnchorError::ValidationError(
                    "Anchor name cannot be empty".to_string(),
                ));
            }

            if anchor.version.is_empty() {
                return Err(AnchorError::ValidationError(format!(
                    "Anchor '{}' has empty version",
                    anchor.name
                )));
            }

            if let Some(ref checksum) = anchor.checksum {
                if checksum.len() != 64 || !checksum.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(AnchorError::ValidationError(format!(
                        "Anchor '{}' has invalid checksum (must be 64 hex characters)",
                        anchor.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Write the anchor file to disk
    pub fn to_file(&self, path: &Path) -> Result<(), AnchorError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AnchorError::SerializeError(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Add or replace the anchor for a package
    pub fn set_anchor(&mut self, anchor: Anchor) {
        self.anchors.retain(|a| !same_name(&a.name, &anchor.name));
        self.anchors.push(anchor);
    }

    /// Get the anchor for a package name
    pub fn get_anchor(&self, name: &str) -> Option<&Anchor> {
        self.anchors.iter().find(|a| same_name(&a.name, name))
    }

    /// Sort anchors by name (for deterministic output)
    pub fn sort_anchors(&mut self) {
        self.anchors.sort_by_cached_key(|a| fold_name(&a.name));
    }
}

impl Default for AnchorFile {
    fn default() -> Self {
        Self::new()
    }
}

impl Anchor {
    pub fn new(name: &str, version: String) -> Self {
        Self {
            name: name.to_string(),
            version,
            checksum: None,
        }
    }
}
