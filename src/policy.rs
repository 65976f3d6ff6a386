// Per-file transfer decision and content-type selection.

use std::path::Path;

use crate::error::ApiError;
use crate::remote::{Lookup, Remote};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// What to do with one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Send the file. `replace` is set when the caller asked to overwrite
    /// or when a remote file with a different size is already there.
    Upload { replace: bool },
    /// A remote file with the same byte size exists.
    SkipIdentical { size: u64 },
}

/// Decides whether `local` needs to be sent to `remote_path`.
///
/// Equality is by byte size only. With `overwrite` unset, a remote file of
/// a different size is still replaced.
pub fn should_upload<R: Remote + ?Sized>(
    remote: &R,
    local: &Path,
    remote_path: &str,
    overwrite: bool,
) -> Result<Decision, ApiError> {
    if overwrite {
        return Ok(Decision::Upload { replace: true });
    }

    let existing = match remote.stat(remote_path, None)? {
        Lookup::NotFound => return Ok(Decision::Upload { replace: false }),
        Lookup::Found(entry) => entry,
    };

    let local_size = std::fs::metadata(local)
        .map_err(|e| ApiError::io(local, e))?
        .len();

    if !existing.is_dir && existing.size == local_size {
        tracing::debug!(path = remote_path, size = local_size, "remote copy has same size");
        Ok(Decision::SkipIdentical { size: local_size })
    } else {
        tracing::debug!(
            path = remote_path,
            local = local_size,
            remote = existing.size,
            "remote copy differs, replacing"
        );
        Ok(Decision::Upload { replace: true })
    }
}

/// MIME type by file extension. Matching is case-sensitive.
pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("zip") => "application/zip",
        Some("json") => "application/json",
        _ => DEFAULT_CONTENT_TYPE,
    }
}
