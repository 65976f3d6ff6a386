// Local file discovery for the upload modes.

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Files to upload together with the directory their remote layout is
/// computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSet {
    pub root: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Which files under a source are picked up.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Accepted extensions without the dot, matched case-sensitively.
    /// Empty accepts everything.
    pub extensions: Vec<String>,
}

impl Selection {
    pub fn top_level(ext: &str) -> Self {
        Self {
            recursive: false,
            extensions: vec![ext.to_string()],
        }
    }

    pub fn recursive(ext: &str) -> Self {
        Self {
            recursive: true,
            extensions: vec![ext.to_string()],
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|want| want == e))
            .unwrap_or(false)
    }
}

/// Collects the files under `source` matching `selection`, sorted.
///
/// A plain file is returned on its own, rooted at its parent directory.
pub fn collect(source: &Path, selection: &Selection) -> io::Result<LocalSet> {
    let meta = std::fs::metadata(source)?;
    if meta.is_file() {
        let root = source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        return Ok(LocalSet {
            root,
            files: vec![source.to_path_buf()],
        });
    }

    let mut walker = WalkDir::new(source).min_depth(1).follow_links(true);
    if !selection.recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && selection.accepts(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    tracing::debug!(source = %source.display(), count = files.len(), "collected local files");

    Ok(LocalSet {
        root: source.to_path_buf(),
        files,
    })
}
