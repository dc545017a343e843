//! Data models shared by the scanner and its collaborators.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
    time::SystemTime,
};

use serde::{Deserialize, Serialize};

/// A regular file discovered by, or handed to, a scan.
///
/// Equality and hashing consider only the path; the size is filled in once
/// the entry has been accepted as unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Absolute or caller-relative path of the file.
    path: PathBuf,
    /// Size in bytes, known after the entry is accepted.
    size: Option<u64>,
}

impl FileEntry {
    /// Creates an entry for `path` with an unknown size.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size: None,
        }
    }

    /// Path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes, if it has been recorded.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Final path component, lossily converted.
    #[must_use]
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub(crate) fn set_size(&mut self, size: u64) {
        self.size = Some(size);
    }
}

impl PartialEq for FileEntry {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for FileEntry {}

impl Hash for FileEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

/// Something yielded by recursive enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A regular file.
    File(FileEntry),
    /// A directory below the enumeration root.
    Directory(PathBuf),
}

/// File metadata as reported by a [`MetadataAccessor`](crate::importer::MetadataAccessor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadata {
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, when the platform reports one.
    pub modified: Option<SystemTime>,
}

/// Classification of a file relative to known content.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    /// Not known anywhere; a candidate for import.
    Original,
    /// Same content already exists at the import destination.
    ContentDuplicate,
    /// Same content as another file earlier in the same scan.
    ScanDuplicate,
}

impl Disposition {
    /// Whether this disposition routes the entry to the duplicate list.
    #[must_use]
    pub fn is_duplicate(self) -> bool {
        !matches!(self, Self::Original)
    }
}

impl Display for Disposition {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Original => "ORIGINAL",
            Self::ContentDuplicate => "CONTENT_DUPLICATE",
            Self::ScanDuplicate => "SCAN_DUPLICATE",
        };
        f.write_str(label)
    }
}

/// Import target that disposition checks compare against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    root: PathBuf,
}

impl Destination {
    /// A destination backed by a local directory.
    pub fn directory(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the destination.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Display for Destination {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::to_string;

    use crate::importer::models::{Disposition, FileEntry};

    #[test]
    fn test_file_entry_identity_ignores_size() {
        let mut sized = FileEntry::new("/card/DCIM/IMG_0001.JPG");
        sized.set_size(4096);
        let bare = FileEntry::new("/card/DCIM/IMG_0001.JPG");

        assert_eq!(sized, bare);
        let set: HashSet<FileEntry> = [sized, bare].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_file_entry_name() {
        assert_eq!(FileEntry::new("/card/DCIM/clip.mp4").name(), "clip.mp4");
        assert_eq!(FileEntry::new("/").name(), "");
    }

    #[test]
    fn test_disposition_labels() {
        assert!(!Disposition::Original.is_duplicate());
        assert!(Disposition::ScanDuplicate.is_duplicate());
        assert_eq!(Disposition::ContentDuplicate.to_string(), "CONTENT_DUPLICATE");
        assert_eq!(
            to_string(&Disposition::ScanDuplicate).unwrap(),
            "\"SCAN_DUPLICATE\""
        );
    }
}
