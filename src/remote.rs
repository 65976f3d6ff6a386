// The remote session contract. `api::AlistClient` is the network-backed
// implementation; the policy, reconciler and scheduler only ever see this
// trait, which keeps them testable against an in-memory namespace.

use crate::error::ApiError;

/// Outcome of a lookup that may legitimately find nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }
}

/// A file or directory as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
}

/// Primitive operations against the remote namespace.
///
/// Implementations are shared by every upload worker, so they must be safe
/// to call concurrently. Each call is one blocking request/response pair.
pub trait Remote: Send + Sync {
    /// Metadata for a single path.
    fn stat(&self, path: &str, password: Option<&str>) -> Result<Lookup<RemoteEntry>, ApiError>;

    /// Subdirectories of `path`, in the order the service returns them.
    fn list_dir(
        &self,
        path: &str,
        password: Option<&str>,
    ) -> Result<Lookup<Vec<RemoteEntry>>, ApiError>;

    /// Creates `path`. Creating a directory that already exists succeeds.
    fn create_dir(&self, path: &str) -> Result<(), ApiError>;

    /// Removes the named entries from `dir`.
    fn remove(&self, names: &[String], dir: &str) -> Result<(), ApiError>;

    /// Stores `bytes` at `path`. With `overwrite` unset the service may
    /// refuse to replace an existing file.
    fn upload_bytes(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        overwrite: bool,
    ) -> Result<(), ApiError>;
}

/// Strips trailing separators so `/raw/sub/` and `/raw/sub` compare equal.
/// The root stays `/`.
pub fn normalize_dir(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_dir_strips_trailing_slashes() {
        assert_eq!(normalize_dir("/raw/sub/"), "/raw/sub");
        assert_eq!(normalize_dir("/raw"), "/raw");
        assert_eq!(normalize_dir("/"), "/");
        assert_eq!(normalize_dir(""), "/");
    }

    #[test]
    fn fake_lists_children_and_removes_files() {
        let remote = testing::FakeRemote::new();
        remote.add_dir("/raw");
        remote.add_dir("/raw/b");
        remote.add_dir("/raw/a/");
        remote.add_file("/raw/x.png", 3);

        let listed = remote.list_dir("/raw/", None).unwrap().found().unwrap();
        let paths: Vec<_> = listed.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/raw/a", "/raw/b"]);
        assert_eq!(remote.list_dir("/nope", None).unwrap(), Lookup::NotFound);

        remote.remove(&["x.png".to_string()], "/raw").unwrap();
        assert_eq!(remote.stat("/raw/x.png", None).unwrap(), Lookup::NotFound);
    }

    #[test]
    fn lookup_found_unwraps() {
        assert_eq!(Lookup::Found(3).found(), Some(3));
        assert_eq!(Lookup::<u8>::NotFound.found(), None);
    }
}
