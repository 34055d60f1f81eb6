//! Destination files on local disk.
//!
//! Objects land at their own name relative to a download root; subdirectory
//! components in the name are created on demand. Files are created (or
//! truncated) and written sequentially; nothing is preallocated since the
//! declared length is only a display hint.

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use crate::error::DownloadError;

/// Resolve the destination for object `name` under `root`.
///
/// Rejects names that would land outside `root`: absolute paths, `..`
/// components, or names with no file component at all.
pub fn destination_path(root: &Path, name: &str) -> Result<PathBuf, DownloadError> {
    let unsafe_name = |reason| DownloadError::UnsafeName {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() || name.ends_with('/') {
        return Err(unsafe_name("name has no file component"));
    }
    let mut rel = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => rel.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(unsafe_name("name contains '..'")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_name("name is an absolute path"))
            }
        }
    }
    if rel.as_os_str().is_empty() {
        return Err(unsafe_name("name has no file component"));
    }
    Ok(root.join(rel))
}

/// Create every missing parent directory of `path`. Existing directories are
/// not an error.
pub fn ensure_parent_dirs(path: &Path) -> Result<(), DownloadError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|source| DownloadError::DirectoryCreationFailed {
        path: parent.to_path_buf(),
        source,
    })
}

/// Create `path` for writing, truncating an existing file.
pub fn create_destination(path: &Path) -> Result<File, DownloadError> {
    File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|source| DownloadError::FileCreationFailed {
            path: path.to_path_buf(),
            source,
        })
}
