//! Eligibility rules for importable media files.

use std::{collections::HashSet, path::Path};

/// Still-image extensions eligible for import.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "heic"];

/// Camera raw extensions eligible for import.
pub const RAW_EXTENSIONS: &[&str] = &["arw", "cr2", "dng", "nef", "nrw", "orf", "raf", "rw2"];

/// Video extensions eligible for import.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "3gp", "avi", "m4v", "mkv", "mov", "mp4", "mpeg", "mpg", "webm",
];

/// Broad media category of an eligible file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Compressed still image.
    Image,
    /// Camera raw image.
    RawImage,
    /// Video clip.
    Video,
}

/// Classifies `path` by its extension using the built-in tables.
#[must_use]
pub fn media_kind(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_str()?;
    let matches = |table: &[&str]| table.iter().any(|&known| known.eq_ignore_ascii_case(ext));

    if matches(IMAGE_EXTENSIONS) {
        Some(MediaKind::Image)
    } else if matches(RAW_EXTENSIONS) {
        Some(MediaKind::RawImage)
    } else if matches(VIDEO_EXTENSIONS) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Extension filter deciding which files a scan keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTypeFilter {
    /// Lowercased extensions without the leading dot.
    extensions: HashSet<String>,
}

impl MediaTypeFilter {
    /// Builds a filter from user-supplied extensions.
    ///
    /// Leading dots and case are ignored, so `".JPG"` and `"jpg"` are the same.
    pub fn from_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { extensions }
    }

    /// Checks if a path corresponds to an eligible media file.
    #[must_use]
    pub fn is_eligible(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_ascii_lowercase()))
    }

    /// Number of accepted extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Whether the filter rejects everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl Default for MediaTypeFilter {
    fn default() -> Self {
        Self::from_extensions(
            IMAGE_EXTENSIONS
                .iter()
                .chain(RAW_EXTENSIONS)
                .chain(VIDEO_EXTENSIONS),
        )
    }
}

/// Every built-in extension, in table order.
#[must_use]
pub fn default_extensions() -> Vec<String> {
    IMAGE_EXTENSIONS
        .iter()
        .chain(RAW_EXTENSIONS)
        .chain(VIDEO_EXTENSIONS)
        .map(|ext| (*ext).to_string())
        .collect()
}
