//! Host filesystem helpers shared by the path-backed backends.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::debug;
use url::Url;

use unifs_common::{Error, Result};

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Interpret a provider path: a plain absolute path or a `file://` URI.
///
/// # Errors
/// - `InvalidInput` for relative paths, empty input, or URIs that do not
///   name a local file
pub(crate) fn absolute_path(full_path: &str) -> Result<PathBuf> {
    if full_path.trim().is_empty() {
        return Err(Error::InvalidInput("Path must not be empty".to_string()));
    }

    let path = if full_path.starts_with("file:") {
        let url = Url::parse(full_path)
            .map_err(|e| Error::InvalidInput(format!("Invalid URI {}: {}", full_path, e)))?;
        url.to_file_path()
            .map_err(|_| Error::InvalidInput(format!("Not a local file URI: {}", full_path)))?
    } else {
        PathBuf::from(full_path)
    };

    if !path.is_absolute() {
        return Err(Error::InvalidInput(format!(
            "Path must be absolute: {}",
            full_path
        )));
    }
    Ok(path)
}

/// Whether anything, including a dangling symlink, sits at `path`.
pub(crate) async fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok()
}

#[cfg(unix)]
async fn same_inode(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::metadata(a).await, fs::metadata(b).await) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
async fn same_inode(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Whether two paths name the same existing file, including through
/// symlinks, aliases and hard links.
pub(crate) async fn same_entry(a: &Path, b: &Path) -> bool {
    a == b || same_inode(a, b).await
}

fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let n = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
    target.with_file_name(format!(".{}.{}-{}.partial", name, std::process::id(), n))
}

/// Copy `source` to `target` through a staging file beside the target.
///
/// The target appears, or is replaced, only once every byte is written. A
/// failed copy leaves the target as it was and removes the staging file.
///
/// # Errors
/// - `NotFound` if the source or the target's folder is missing
/// - `AlreadyExists` if the target exists and `can_replace` is false
pub(crate) async fn copy_file(source: &Path, target: &Path, can_replace: bool) -> Result<()> {
    let mut reader = fs::File::open(source)
        .await
        .map_err(|e| Error::from_io(e, source.display()))?;
    if !can_replace && occupied(target).await {
        return Err(Error::AlreadyExists(target.display().to_string()));
    }

    let staging = staging_path(target);
    let result = stage_and_place(&mut reader, &staging, target, can_replace).await;
    if result.is_err() && occupied(&staging).await {
        if let Err(e) = fs::remove_file(&staging).await {
            debug!(path = %staging.display(), error = %e, "Staging file left behind");
        }
    }
    result
}

async fn stage_and_place(
    reader: &mut fs::File,
    staging: &Path,
    target: &Path,
    can_replace: bool,
) -> Result<()> {
    let mut sink = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(staging)
        .await
        .map_err(|e| Error::from_io(e, target.display()))?;
    tokio::io::copy(reader, &mut sink).await?;
    sink.sync_all().await?;
    drop(sink);

    if can_replace {
        return fs::rename(staging, target)
            .await
            .map_err(|e| Error::from_io(e, target.display()));
    }

    match fs::hard_link(staging, target).await {
        Ok(()) => {
            fs::remove_file(staging).await?;
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(Error::AlreadyExists(target.display().to_string()))
        }
        Err(e) => {
            debug!(error = %e, "No hard links here, renaming staged copy");
            if occupied(target).await {
                return Err(Error::AlreadyExists(target.display().to_string()));
            }
            fs::rename(staging, target)
                .await
                .map_err(|e| Error::from_io(e, target.display()))
        }
    }
}

/// Open an existing file for a caller-owned stream.
///
/// On Windows the file is opened without sharing, so other opens fail
/// while the stream is alive. Elsewhere exclusivity is by convention.
pub(crate) async fn open_stream(path: &Path, for_writing: bool) -> std::io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.read(true).write(for_writing);
    #[cfg(windows)]
    options.share_mode(0);
    options.open(path).await
}

/// Create the directory `path` unless a directory is already there. The
/// parent must exist.
///
/// # Errors
/// - `NotFound` if the parent is missing
/// - `AlreadyExists` if a non-directory occupies the name
pub(crate) async fn open_or_create_dir(path: &Path) -> Result<bool> {
    match fs::create_dir(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            match fs::metadata(path).await {
                Ok(meta) if meta.is_dir() => Ok(false),
                _ => Err(Error::AlreadyExists(format!(
                    "Not a folder: {}",
                    path.display()
                ))),
            }
        }
        Err(e) => Err(Error::from_io(e, path.display())),
    }
}

/// Create an application root and any missing parents.
pub(crate) async fn ensure_root(root: &Path) -> Result<()> {
    fs::create_dir_all(root)
        .await
        .map_err(|e| Error::from_io(e, root.display()))
}
