//! Directory change event definitions and filtering.

use std::path::{Path, PathBuf};

use notify::{
    Event,
    event::{EventKind, MetadataKind, ModifyKind},
};

/// A change observed below a watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryChange {
    /// Path that changed: a child of a watched directory or the directory itself.
    pub path: PathBuf,
}

impl DirectoryChange {
    /// Creates a change for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Whether this change concerns `directory` or one of its direct children.
    #[must_use]
    pub fn affects(&self, directory: &Path) -> bool {
        self.path == directory || self.path.parent() == Some(directory)
    }
}

/// Converts a raw `notify` event into directory changes.
///
/// Reads and access-time updates are dropped: hashing a file must not
/// invalidate the scan that is hashing it.
pub(crate) fn changes_from_event(event: &Event) -> Vec<DirectoryChange> {
    match event.kind {
        EventKind::Access(_) | EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => {
            Vec::new()
        }
        _ => event.paths.iter().map(DirectoryChange::new).collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use notify::{
        Event,
        event::{AccessKind, CreateKind, EventKind, MetadataKind, ModifyKind, RemoveKind},
    };

    use crate::importer::watcher::events::{DirectoryChange, changes_from_event};

    #[test]
    fn test_change_affects_parent_and_self() {
        let change = DirectoryChange::new("/card/DCIM/IMG_1.JPG");
        assert!(change.affects(Path::new("/card/DCIM")));
        assert!(!change.affects(Path::new("/card")));

        let removal = DirectoryChange::new("/card/DCIM");
        assert!(removal.affects(Path::new("/card/DCIM")));
        assert!(removal.affects(Path::new("/card")));
    }

    #[test]
    fn test_event_filtering() {
        let path = PathBuf::from("/card/DCIM/IMG_1.JPG");
        let test_cases = vec![
            (EventKind::Create(CreateKind::File), 1),
            (EventKind::Remove(RemoveKind::File), 1),
            (EventKind::Modify(ModifyKind::Any), 1),
            (EventKind::Access(AccessKind::Any), 0),
            (
                EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)),
                0,
            ),
        ];

        for (kind, expected) in test_cases {
            let event = Event::new(kind).add_path(path.clone());
            assert_eq!(
                changes_from_event(&event).len(),
                expected,
                "Failed for kind: {:?}",
                kind
            );
        }
    }
}
