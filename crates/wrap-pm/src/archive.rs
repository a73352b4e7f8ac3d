//! Package archives (`<name>-<version>.wrap`)
//!
//! A package is a zip container holding `<name>.wrapdesc`, a `version` entry
//! and any number of content files. Content streams are opened one at a time,
//! right before they are copied, and dropped before the next entry starts.
//!
//! Archives are assembled in a temporary file next to the destination and only
//! moved into place once the central directory has been written, so a failed
//! build never leaves a truncated package behind.

use crate::descriptor::{WrapDescriptor, DESCRIPTOR_EXTENSION};
use crate::version::Version;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// File extension of package archives
pub const PACKAGE_EXTENSION: &str = "wrap";

/// Name of the entry holding the raw version string
pub const VERSION_ENTRY: &str = "version";

/// Relative path marking an entry that lives at the archive root
pub const ROOT_PATH: &str = ".";

/// Errors that can occur while building or reading archives
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// IO error outside of any entry
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// Zip container error
    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    /// Opening or copying an entry's stream failed
    #[error("Failed to write entry '{entry}': {source}")]
    EntryFailed {
        entry: String,
        #[source]
        source: io::Error,
    },

    /// The finished archive could not be moved onto its destination
    #[error("Failed to persist archive to {path}: {source}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An entry exists but its content is not valid
    #[error("Invalid entry '{entry}': {reason}")]
    InvalidEntry { entry: String, reason: String },
}

/// Lazily invoked supplier of an entry's bytes
pub type StreamSupplier = Box<dyn FnOnce() -> io::Result<Box<dyn Read>>>;

/// One file to place in a package archive
pub struct PackageContent {
    /// Directory inside the archive, or [`ROOT_PATH`]
    pub relative_path: String,

    /// File name of the entry
    pub file_name: String,

    /// Opens the entry's content; called once, when the entry is written
    pub stream: StreamSupplier,
}

impl PackageContent {
    pub fn new(
        relative_path: impl Into<String>,
        file_name: impl Into<String>,
        stream: impl FnOnce() -> io::Result<Box<dyn Read>> + 'static,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            file_name: file_name.into(),
            stream: Box::new(stream),
        }
    }

    /// Entry backed by an in-memory buffer
    pub fn from_bytes(
        relative_path: impl Into<String>,
        file_name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        let bytes = bytes.into();
        Self::new(relative_path, file_name, move || {
            Ok(Box::new(Cursor::new(bytes)) as Box<dyn Read>)
        })
    }

    /// Entry backed by UTF-8 text
    pub fn from_text(
        relative_path: impl Into<String>,
        file_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::from_bytes(relative_path, file_name, text.into().into_bytes())
    }

    /// Entry backed by a file on disk, opened only when the entry is written
    pub fn from_file(
        relative_path: impl Into<String>,
        file_name: impl Into<String>,
        path: PathBuf,
    ) -> Self {
        Self::new(relative_path, file_name, move || {
            Ok(Box::new(File::open(path)?) as Box<dyn Read>)
        })
    }

    /// Name of the entry inside the archive
    ///
    /// Root entries use the bare file name; others are `relative_path/file_name`.
    pub fn entry_name(&self) -> String {
        if self.relative_path == ROOT_PATH {
            return Path::new(&self.file_name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.file_name.clone());
        }

        let mut target = self.relative_path.clone();
        if !target.ends_with('/') {
            target.push('/');
        }
        target.push_str(&self.file_name);
        target
    }
}

impl fmt::Debug for PackageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageContent")
            .field("relative_path", &self.relative_path)
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}

/// File name of a package archive, `<name>-<version>.wrap`
pub fn package_file_name(name: &str, version: &str) -> String {
    format!("{}-{}.{}", name, version, PACKAGE_EXTENSION)
}

/// Write `content` as a zip container into `writer`
///
/// On error the writer holds an unusable partial container and must be
/// discarded; [`build_archive`] takes care of that for files.
pub fn write_archive<W: Write + Seek>(
    writer: W,
    content: impl IntoIterator<Item = PackageContent>,
) -> Result<W, ArchiveError> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in content {
        let name = entry.entry_name();
        zip.start_file(name.as_str(), options)?;

        let mut stream = (entry.stream)().map_err(|source| ArchiveError::EntryFailed {
            entry: name.clone(),
            source,
        })?;
        let written = io::copy(&mut stream, &mut zip).map_err(|source| ArchiveError::EntryFailed {
            entry: name.clone(),
            source,
        })?;
        debug!("Wrote entry {} ({} bytes)", name, written);
    }

    Ok(zip.finish()?)
}

/// Build an archive at `destination` from `content`
///
/// The destination is only created or replaced when every entry was written
/// and the container finalized.
pub fn build_archive(
    destination: &Path,
    content: impl IntoIterator<Item = PackageContent>,
) -> Result<(), ArchiveError> {
    let dir = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::Builder::new()
        .prefix(".wrap-")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    write_archive(tmp.as_file_mut(), content)?;
    tmp.as_file().sync_all()?;

    tmp.persist(destination)
        .map_err(|e| ArchiveError::PersistFailed {
            path: destination.to_path_buf(),
            source: e.error,
        })?;

    debug!("Built archive {}", destination.display());
    Ok(())
}

/// Build a package archive
///
/// Prepends `<name>.wrapdesc` (the descriptor lines, or a single blank line
/// when there are none) and `version` (the raw version string) to
/// `extra_content`.
pub fn build_package(
    destination: &Path,
    name: &str,
    version: &str,
    extra_content: impl IntoIterator<Item = PackageContent>,
    descriptor_lines: &[String],
) -> Result<(), ArchiveError> {
    let descriptor = if descriptor_lines.is_empty() {
        "\n".to_string()
    } else {
        descriptor_lines.join("\n")
    };

    let metadata = vec![
        PackageContent::from_text(
            ROOT_PATH,
            format!("{}.{}", name, DESCRIPTOR_EXTENSION),
            descriptor,
        ),
        PackageContent::from_text(ROOT_PATH, VERSION_ENTRY, version),
    ];

    build_archive(destination, metadata.into_iter().chain(extra_content))
}

/// Collect every file under `dir` as package content
///
/// Files directly in `dir` go to the archive root; nested files keep their
/// relative directory. Streams are opened lazily.
pub fn content_from_directory(dir: &Path) -> io::Result<Vec<PackageContent>> {
    let mut content = Vec::new();
    collect_directory(dir, dir, &mut content)?;
    Ok(content)
}

fn collect_directory(base: &Path, dir: &Path, content: &mut Vec<PackageContent>) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            collect_directory(base, &path, content)?;
            continue;
        }

        let relative = dir
            .strip_prefix(base)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        let relative = if relative.is_empty() {
            ROOT_PATH.to_string()
        } else {
            relative
        };
        let file_name = entry.file_name().to_string_lossy().into_owned();
        content.push(PackageContent::from_file(relative, file_name, path));
    }

    Ok(())
}

/// Read access to a built package archive
pub struct PackageArchive {
    path: PathBuf,
    archive: ZipArchive<File>,
}

impl PackageArchive {
    /// Open an archive file
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file)?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry names in archive order
    pub fn entry_names(&mut self) -> Result<Vec<String>, ArchiveError> {
        let mut names = Vec::with_capacity(self.archive.len());
        for i in 0..self.archive.len() {
            names.push(self.archive.by_index(i)?.name().to_string());
        }
        Ok(names)
    }

    /// Read an entry as UTF-8 text, `None` if the entry does not exist
    pub fn read_to_string(&mut self, name: &str) -> Result<Option<String>, ArchiveError> {
        let mut entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        Ok(Some(content))
    }

    /// Version recorded in the `version` entry
    pub fn version(&mut self) -> Result<Option<Version>, ArchiveError> {
        match self.read_to_string(VERSION_ENTRY)? {
            Some(text) => Version::parse(&text)
                .map(Some)
                .map_err(|e| ArchiveError::InvalidEntry {
                    entry: VERSION_ENTRY.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Descriptor of package `name`, read from `<name>.wrapdesc`
    pub fn descriptor(&mut self, name: &str) -> Result<Option<WrapDescriptor>, ArchiveError> {
        let entry = format!("{}.{}", name, DESCRIPTOR_EXTENSION);
        Ok(self.read_to_string(&entry)?.map(|text| {
            let mut descriptor = WrapDescriptor::from_str(&text);
            descriptor.name = Some(name.to_string());
            descriptor
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_name_root() {
        let entry = PackageContent::from_text(ROOT_PATH, "readme.txt", "hi");
        assert_eq!(entry.entry_name(), "readme.txt");
    }

    #[test]
    fn test_entry_name_root_strips_directories() {
        let entry = PackageContent::from_text(ROOT_PATH, "docs/readme.txt", "hi");
        assert_eq!(entry.entry_name(), "readme.txt");
    }

    #[test]
    fn test_entry_name_adds_separator() {
        let entry = PackageContent::from_text("bin/net35", "lib.dll", "");
        assert_eq!(entry.entry_name(), "bin/net35/lib.dll");

        let entry = PackageContent::from_text("bin/", "lib.dll", "");
        assert_eq!(entry.entry_name(), "bin/lib.dll");
    }

    #[test]
    fn test_stream_opened_lazily() {
        use std::cell::Cell;
        use std::rc::Rc;

        let opened = Rc::new(Cell::new(false));
        let flag = opened.clone();
        let entry = PackageContent::new(ROOT_PATH, "lazy.txt", move || {
            flag.set(true);
            Ok(Box::new(Cursor::new(b"lazy".to_vec())) as Box<dyn Read>)
        });
        assert!(!opened.get());

        let buffer = write_archive(Cursor::new(Vec::new()), vec![entry]).unwrap();
        assert!(opened.get());
        assert!(!buffer.into_inner().is_empty());
    }

    #[test]
    fn test_package_file_name() {
        assert_eq!(package_file_name("mylib", "1.2"), "mylib-1.2.wrap");
    }
}
