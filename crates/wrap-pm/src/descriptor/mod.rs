//! Wrap descriptors (`<name>.wrapdesc`)
//!
//! A descriptor is line oriented. Each instruction is `keyword: content`; the
//! `depends` and `description` keywords are understood here and every other
//! line is carried through untouched so that writing a descriptor back does
//! not lose sections owned by other tools.

pub mod depends;

use crate::version::{Version, VersionVertex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// File extension of descriptor files
pub const DESCRIPTOR_EXTENSION: &str = "wrapdesc";

/// Case-folded form of a package name, used for every name comparison
pub fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

/// Whether two package names identify the same package
pub fn same_name(a: &str, b: &str) -> bool {
    a == b || fold_name(a) == fold_name(b)
}

/// Errors that can occur while loading or saving a descriptor
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// Failed to read or write the descriptor file
    #[error("Failed to access descriptor file: {0}")]
    IoError(#[from] std::io::Error),

    /// The file name does not carry a package name
    #[error("Invalid descriptor file name: {0}")]
    InvalidFileName(String),
}

/// A dependency on a named package under version constraints
///
/// The vertices are conjunctive: a version satisfies the dependency only if it
/// matches every one of them. The list is never empty; an unconstrained
/// dependency holds a single [`VersionVertex::Any`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDependency {
    /// Package name (compared case-insensitively)
    pub name: String,

    /// Version constraints, all of which must match
    pub version_vertices: Vec<VersionVertex>,

    /// Free-form labels following the constraints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl PackageDependency {
    /// Unconstrained dependency on `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_vertices: vec![VersionVertex::Any],
            tags: Vec::new(),
        }
    }

    /// Dependency on `name` with explicit vertices
    ///
    /// An empty vertex list is normalized to `[Any]`.
    pub fn with_vertices(name: impl Into<String>, vertices: Vec<VersionVertex>) -> Self {
        let mut dependency = Self::new(name);
        if !vertices.is_empty() {
            dependency.version_vertices = vertices;
        }
        dependency
    }

    /// Whether `name` identifies this dependency's package
    pub fn is_named(&self, name: &str) -> bool {
        same_name(&self.name, name)
    }

    /// Check if a version satisfies every vertex
    pub fn is_satisfied_by(&self, version: &Version) -> bool {
        self.version_vertices.iter().all(|v| v.matches(version))
    }

    /// Human-readable constraint, e.g. `>= 1.0 and < 2.0`
    pub fn constraint(&self) -> String {
        self.version_vertices
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" and ")
    }
}

impl fmt::Display for PackageDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&depends::write_dependency(self))
    }
}

/// Wrap descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WrapDescriptor {
    /// Package name, taken from the descriptor file name when loaded from disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Declared dependencies, in file order
    #[serde(default)]
    pub dependencies: Vec<PackageDependency>,

    /// Lines not claimed by any known instruction
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_lines: Vec<String>,
}

impl WrapDescriptor {
    /// Create an empty descriptor
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a descriptor from a file
    ///
    /// The package name is the file stem (`mylib.wrapdesc` -> `mylib`).
    pub fn from_file(path: &Path) -> Result<Self, DescriptorError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DescriptorError::InvalidFileName(path.display().to_string()))?;

        let content = std::fs::read_to_string(path)?;
        let mut descriptor = Self::from_str(&content);
        descriptor.name = Some(name.to_string());
        Ok(descriptor)
    }

    /// Parse a descriptor from its text
    ///
    /// Parsing never fails: unknown lines are preserved and malformed
    /// constraints are demoted to tags.
    pub fn from_str(content: &str) -> Self {
        let mut descriptor = Self::new();
        for line in content.lines() {
            descriptor.parse_line(line);
        }
        descriptor
    }

    /// Parse a single `depends: ...` instruction into a fresh descriptor
    pub fn parse_depends_instruction(line: &str) -> Self {
        let mut descriptor = Self::new();
        descriptor.parse_line(line);
        descriptor
    }

    /// Apply one descriptor line
    pub fn parse_line(&mut self, line: &str) {
        if let Some((keyword, content)) = line.split_once(':') {
            let keyword = keyword.trim();
            if keyword.eq_ignore_ascii_case(depends::KEYWORD) {
                if let Some(dependency) = depends::parse_dependency(content) {
                    self.dependencies.push(dependency);
                }
                return;
            }
            if keyword.eq_ignore_ascii_case("description") {
                self.description = Some(content.trim().to_string());
                return;
            }
        }
        self.other_lines.push(line.to_string());
    }

    /// Serialize to descriptor lines
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(ref description) = self.description {
            lines.push(format!("description: {}", description));
        }
        for dependency in &self.dependencies {
            lines.push(format!("{}: {}", depends::KEYWORD, dependency));
        }
        lines.extend(self.other_lines.iter().cloned());
        lines
    }

    /// Write the descriptor to a file
    pub fn to_file(&self, path: &Path) -> Result<(), DescriptorError> {
        let mut content = self.to_lines().join("\n");
        content.push('\n');
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Descriptor file name for this package, if it has a name
    pub fn file_name(&self) -> Option<String> {
        self.name
            .as_ref()
            .map(|name| format!("{}.{}", name, DESCRIPTOR_EXTENSION))
    }

    /// Find a dependency by name
    pub fn dependency(&self, name: &str) -> Option<&PackageDependency> {
        self.dependencies.iter().find(|d| d.is_named(name))
    }
}
