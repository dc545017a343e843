//! Filesystem-backed enumeration and metadata.

use std::path::{Path, PathBuf};

use {
    async_trait::async_trait,
    tokio::fs::{metadata, read_dir, symlink_metadata},
    tracing::debug,
};

use crate::{
    error::domain::ScanError,
    importer::{
        models::{Entry, FileEntry, FileMetadata},
        providers::{EntryEnumerator, MetadataAccessor},
    },
};

/// Walks a directory tree with `tokio::fs`.
///
/// Children of each directory are visited in path order and subdirectories
/// are descended depth-first, so the visit order is stable for a given tree.
/// Symbolic links are reported by their own type and never followed.
#[derive(Debug, Clone, Default)]
pub struct FsEnumerator {
    include_hidden: bool,
}

impl FsEnumerator {
    /// Creates an enumerator.
    ///
    /// # Arguments
    ///
    /// * `include_hidden` - Whether dot-files and dot-directories are visited.
    #[must_use]
    pub fn new(include_hidden: bool) -> Self {
        Self { include_hidden }
    }

    fn is_hidden(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.'))
    }

    async fn list_children(directory: &Path) -> Result<Vec<PathBuf>, ScanError> {
        let mut reader = read_dir(directory)
            .await
            .map_err(|e| ScanError::io(directory, e))?;

        let mut children = Vec::new();
        while let Some(child) = reader
            .next_entry()
            .await
            .map_err(|e| ScanError::io(directory, e))?
        {
            children.push(child.path());
        }
        children.sort();
        Ok(children)
    }
}

#[async_trait]
impl EntryEnumerator for FsEnumerator {
    async fn find_entries_recursively(
        &self,
        root: &Path,
        visit: &mut (dyn FnMut(Entry) + Send),
    ) -> Result<(), ScanError> {
        let mut pending = vec![root.to_path_buf()];

        while let Some(directory) = pending.pop() {
            let mut subdirectories = Vec::new();

            for path in Self::list_children(&directory).await? {
                if !self.include_hidden && Self::is_hidden(&path) {
                    debug!("Skipping hidden entry {:?}", path);
                    continue;
                }

                let file_type = symlink_metadata(&path)
                    .await
                    .map_err(|e| ScanError::io(&path, e))?
                    .file_type();

                if file_type.is_dir() {
                    visit(Entry::Directory(path.clone()));
                    subdirectories.push(path);
                } else if file_type.is_file() {
                    visit(Entry::File(FileEntry::new(path)));
                }
            }

            // Reversed so the stack pops them in path order.
            pending.extend(subdirectories.into_iter().rev());
        }

        Ok(())
    }
}

/// Reads metadata with `tokio::fs::metadata`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMetadataAccessor;

#[async_trait]
impl MetadataAccessor for FsMetadataAccessor {
    async fn get_metadata(&self, entry: &FileEntry) -> Result<FileMetadata, ScanError> {
        let info = metadata(entry.path())
            .await
            .map_err(|e| ScanError::io(entry.path(), e))?;

        if !info.is_file() {
            return Err(ScanError::Metadata {
                path: entry.path().to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }

        Ok(FileMetadata {
            size: info.len(),
            modified: info.modified().ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs::{create_dir_all, write};

    use tempfile::TempDir;

    use crate::importer::{
        models::{Entry, FileEntry},
        providers::{EntryEnumerator, FsEnumerator, FsMetadataAccessor, MetadataAccessor},
    };

    fn build_tree(root: &std::path::Path) {
        create_dir_all(root.join("DCIM/100CANON")).unwrap();
        create_dir_all(root.join(".thumbnails")).unwrap();
        write(root.join("DCIM/100CANON/IMG_0002.JPG"), b"two").unwrap();
        write(root.join("DCIM/100CANON/IMG_0001.JPG"), b"one").unwrap();
        write(root.join("DCIM/notes.txt"), b"notes").unwrap();
        write(root.join(".thumbnails/t.jpg"), b"thumb").unwrap();
    }

    async fn collect(enumerator: &FsEnumerator, root: &std::path::Path) -> Vec<Entry> {
        let mut seen = Vec::new();
        enumerator
            .find_entries_recursively(root, &mut |entry: Entry| seen.push(entry))
            .await
            .unwrap();
        seen
    }

    #[tokio::test]
    async fn test_enumeration_order_and_hidden_skipping() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        build_tree(root);

        let seen = collect(&FsEnumerator::new(false), root).await;
        assert_eq!(
            seen,
            vec![
                Entry::Directory(root.join("DCIM")),
                Entry::Directory(root.join("DCIM/100CANON")),
                Entry::File(FileEntry::new(root.join("DCIM/notes.txt"))),
                Entry::File(FileEntry::new(root.join("DCIM/100CANON/IMG_0001.JPG"))),
                Entry::File(FileEntry::new(root.join("DCIM/100CANON/IMG_0002.JPG"))),
            ]
        );
    }

    #[tokio::test]
    async fn test_enumeration_includes_hidden_when_asked() {
        let temp_dir = TempDir::new().unwrap();
        build_tree(temp_dir.path());

        let seen = collect(&FsEnumerator::new(true), temp_dir.path()).await;
        assert!(seen.contains(&Entry::File(FileEntry::new(
            temp_dir.path().join(".thumbnails/t.jpg")
        ))));
    }

    #[tokio::test]
    async fn test_enumeration_of_missing_root_fails() {
        let temp_dir = TempDir::new().unwrap();
        let mut visit = |_entry: Entry| {};
        let result = FsEnumerator::default()
            .find_entries_recursively(&temp_dir.path().join("missing"), &mut visit)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_metadata_size() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clip.mp4");
        write(&path, vec![0u8; 1234]).unwrap();

        let metadata = FsMetadataAccessor
            .get_metadata(&FileEntry::new(&path))
            .await
            .unwrap();
        assert_eq!(metadata.size, 1234);
        assert!(metadata.modified.is_some());

        let directory = FsMetadataAccessor
            .get_metadata(&FileEntry::new(temp_dir.path()))
            .await;
        assert!(directory.is_err());
    }
}
