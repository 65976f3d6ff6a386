// Maps local files onto the remote namespace. Pure string work: nothing in
// here touches the network or the file system.

use std::path::{Component, Path};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("{file} is not inside {root}")]
    OutsideRoot { file: String, root: String },

    #[error("path {0} is not valid UTF-8")]
    NonUtf8(String),
}

/// Where a local file lands remotely.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteTarget {
    /// Containing directory. Nested directories end with `/`; a file that
    /// sits directly at the local root maps to the base path itself.
    pub dir: String,
    pub leaf: String,
}

impl RemoteTarget {
    /// Full remote path of the file.
    pub fn path(&self) -> String {
        join_remote(&self.dir, &self.leaf)
    }
}

/// Mirrors `file`'s position under `root` below `base`.
///
/// `root/a/b/c.png` with base `/raw` gives dir `/raw/a/b/` and leaf
/// `c.png`; `root/c.png` gives dir `/raw`.
pub fn map_path(root: &Path, base: &str, file: &Path) -> Result<RemoteTarget, PathError> {
    let relative = file
        .strip_prefix(root)
        .map_err(|_| PathError::OutsideRoot {
            file: file.display().to_string(),
            root: root.display().to_string(),
        })?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| PathError::NonUtf8(file.display().to_string()))?;
                segments.push(part.to_string());
            }
            Component::CurDir => {}
            _ => {
                return Err(PathError::OutsideRoot {
                    file: file.display().to_string(),
                    root: root.display().to_string(),
                })
            }
        }
    }

    let leaf = segments.pop().ok_or_else(|| PathError::OutsideRoot {
        file: file.display().to_string(),
        root: root.display().to_string(),
    })?;

    let base = base_dir(base);
    let dir = if segments.is_empty() {
        base
    } else {
        let prefix = if base == "/" { "" } else { base.as_str() };
        format!("{}/{}/", prefix, segments.join("/"))
    };

    Ok(RemoteTarget { dir, leaf })
}

/// Joins a remote directory and a name with exactly one separator.
pub fn join_remote(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Canonical form of a remote base directory: `"/zip/"` -> `"/zip"`,
/// `"raw"` -> `"/raw"`, `""` -> `"/"`.
pub fn base_dir(base: &str) -> String {
    let trimmed = base.replace('\\', "/");
    let trimmed = trimmed.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}
