//! Quota-scoped isolated store.
//!
//! An [`IsolatedStore`] owns one directory on the host and only ever
//! touches entries beneath it: every address is a [`StoragePath`], which
//! cannot contain separators or relative components. The store carries the
//! quota and session state, so all files and folders of a store share one
//! `Arc<IsolatedStore>`. Its label prefixes the full paths it hands out.

use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs;
use tracing::{debug, info};

use crate::host;
use unifs_common::{Error, Result, StoragePath};

/// How [`IsolatedStore::create_file`] treats an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Fail with `AlreadyExists` if the file exists.
    CreateNew,
    /// Truncate an existing file.
    Truncate,
    /// Keep an existing file as it is.
    OpenOrCreate,
}

/// An application-isolated store with a byte quota.
#[derive(Debug)]
pub struct IsolatedStore {
    label: String,
    root: PathBuf,
    quota: u64,
    removed: AtomicBool,
}

impl IsolatedStore {
    /// Open (creating if needed) the store rooted at `root`. `label` names
    /// the store in full paths and must be a valid entry name.
    ///
    /// # Errors
    /// - `NameInvalid` if `label` is not a valid name
    /// - I/O errors creating the root directory
    pub fn open(label: impl Into<String>, root: impl AsRef<Path>, quota: u64) -> Result<Self> {
        let label = label.into();
        unifs_common::validate_name(&label)?;
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        debug!(label = %label, root = %root.display(), quota, "Opened isolated store");
        Ok(Self {
            label,
            root,
            quota,
            removed: AtomicBool::new(false),
        })
    }

    /// Name of the store, the first component of its full paths.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Full path of an entry: the label followed by the store-relative path.
    pub fn full_path(&self, path: &StoragePath) -> String {
        if path.is_root() {
            return self.label.clone();
        }
        format!("{}/{}", self.label, path.to_relative_string())
    }

    /// Host directory backing the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maximum number of bytes the store may hold.
    pub fn quota(&self) -> u64 {
        self.quota
    }

    /// Whether the store is still usable (not removed).
    pub fn is_available(&self) -> bool {
        !self.removed.load(Ordering::Acquire)
    }

    fn host_path(&self, path: &StoragePath) -> Result<PathBuf> {
        if !self.is_available() {
            return Err(Error::NotFound(
                "Isolated store has been removed".to_string(),
            ));
        }
        let mut host = self.root.clone();
        for component in path.components() {
            host.push(component);
        }
        Ok(host)
    }

    /// Total size of all files in the store.
    pub async fn used_size(&self) -> Result<u64> {
        let mut total = 0;
        let mut pending = vec![self.host_path(&StoragePath::root())?];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    pending.push(entry.path());
                } else {
                    total += meta.len();
                }
            }
        }

        Ok(total)
    }

    /// Bytes left before the quota is reached.
    pub async fn available_free_space(&self) -> Result<u64> {
        Ok(self.quota.saturating_sub(self.used_size().await?))
    }

    async fn ensure_capacity(&self, additional: u64) -> Result<()> {
        let used = self.used_size().await?;
        if used.saturating_add(additional) > self.quota {
            return Err(Error::QuotaExceeded(format!(
                "{} bytes used, {} requested, quota is {}",
                used, additional, self.quota
            )));
        }
        Ok(())
    }

    /// Whether a file exists at `path`.
    pub async fn file_exists(&self, path: &StoragePath) -> bool {
        match self.host_path(path) {
            Ok(host) => fs::metadata(host).await.map(|m| m.is_file()).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Whether a directory exists at `path`. The root always exists while
    /// the store is available.
    pub async fn directory_exists(&self, path: &StoragePath) -> bool {
        match self.host_path(path) {
            Ok(host) => fs::metadata(host).await.map(|m| m.is_dir()).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Create a file.
    ///
    /// # Errors
    /// - `AlreadyExists` in [`CreateMode::CreateNew`] if the file exists
    /// - `NotFound` if the parent directory does not exist
    /// - `QuotaExceeded` if the store is already over quota
    pub async fn create_file(&self, path: &StoragePath, mode: CreateMode) -> Result<()> {
        let host = self.host_path(path)?;
        self.ensure_capacity(0).await?;

        let mut options = fs::OpenOptions::new();
        options.read(true).write(true);
        match mode {
            CreateMode::CreateNew => options.create_new(true),
            CreateMode::Truncate => options.create(true).truncate(true),
            CreateMode::OpenOrCreate => options.create(true),
        };
        options.open(&host).await.map_err(|e| Error::from_io(e, path))?;

        debug!(path = %path, ?mode, "Created isolated file");
        Ok(())
    }

    /// Open an existing file.
    pub async fn open_file(&self, path: &StoragePath, for_writing: bool) -> Result<fs::File> {
        let target = self.host_path(path)?;
        host::open_stream(&target, for_writing)
            .await
            .map_err(|e| Error::from_io(e, path))
    }

    /// Create a single directory.
    ///
    /// # Errors
    /// - `AlreadyExists` if it exists
    /// - `NotFound` if the parent does not exist
    pub async fn create_directory(&self, path: &StoragePath) -> Result<()> {
        let host = self.host_path(path)?;
        fs::create_dir(&host).await.map_err(|e| Error::from_io(e, path))
    }

    /// Create a directory unless one already exists. Returns whether it was
    /// created.
    ///
    /// # Errors
    /// - `NotFound` if the parent does not exist
    /// - `AlreadyExists` if a file occupies the name
    pub async fn open_or_create_directory(&self, path: &StoragePath) -> Result<bool> {
        let target = self.host_path(path)?;
        host::open_or_create_dir(&target)
            .await
            .map_err(|e| logical(e, path))
    }

    /// Delete a file.
    pub async fn delete_file(&self, path: &StoragePath) -> Result<()> {
        let host = self.host_path(path)?;
        fs::remove_file(&host).await.map_err(|e| Error::from_io(e, path))
    }

    /// Delete a directory and its contents.
    pub async fn delete_directory(&self, path: &StoragePath) -> Result<()> {
        if path.is_root() {
            return Err(Error::Unsupported(
                "The store root cannot be deleted; use remove()".to_string(),
            ));
        }
        let host = self.host_path(path)?;
        fs::remove_dir_all(&host).await.map_err(|e| Error::from_io(e, path))
    }

    /// Move a file within the store.
    ///
    /// # Errors
    /// - `NotFound` if the source does not exist
    /// - `AlreadyExists` if the destination exists
    pub async fn move_file(&self, from: &StoragePath, to: &StoragePath) -> Result<()> {
        let source = self.host_path(from)?;
        let target = self.host_path(to)?;

        if !self.file_exists(from).await {
            return Err(Error::NotFound(format!("File not found: {}", from)));
        }
        if host::occupied(&target).await {
            return Err(Error::AlreadyExists(to.to_string()));
        }

        fs::rename(&source, &target)
            .await
            .map_err(|e| Error::from_io(e, to))
    }

    /// Move a directory within the store.
    pub async fn move_directory(&self, from: &StoragePath, to: &StoragePath) -> Result<()> {
        if from.is_root() {
            return Err(Error::Unsupported(
                "The store root cannot be moved".to_string(),
            ));
        }
        if from.contains(to) {
            return Err(Error::InvalidInput(format!(
                "Cannot move {} into itself",
                from
            )));
        }

        let source = self.host_path(from)?;
        let target = self.host_path(to)?;

        if !self.directory_exists(from).await {
            return Err(Error::NotFound(format!("Directory not found: {}", from)));
        }
        if host::occupied(&target).await {
            return Err(Error::AlreadyExists(to.to_string()));
        }

        fs::rename(&source, &target)
            .await
            .map_err(|e| Error::from_io(e, to))
    }

    /// Copy a file from this store into `destination` (which may be this
    /// store), enforcing the destination's quota.
    ///
    /// # Errors
    /// - `NotFound` if the source or the destination folder is missing
    /// - `AlreadyExists` if the target exists and `overwrite` is false
    /// - `QuotaExceeded` if the copy would not fit
    pub async fn copy_file(
        &self,
        from: &StoragePath,
        destination: &IsolatedStore,
        to: &StoragePath,
        overwrite: bool,
    ) -> Result<()> {
        let source = self.host_path(from)?;
        let target = destination.host_path(to)?;

        let source_meta = fs::metadata(&source)
            .await
            .map_err(|e| Error::from_io(e, from))?;
        if !source_meta.is_file() {
            return Err(Error::NotFound(format!("File not found: {}", from)));
        }

        let replaced = match fs::metadata(&target).await {
            Ok(meta) if !overwrite || meta.is_dir() => {
                return Err(Error::AlreadyExists(to.to_string()));
            }
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(Error::from_io(e, to)),
        };

        destination
            .ensure_capacity(source_meta.len().saturating_sub(replaced))
            .await?;

        host::copy_file(&source, &target, overwrite)
            .await
            .map_err(|e| logical(e, to))
    }

    /// Names of the files directly inside `dir`.
    pub async fn file_names(&self, dir: &StoragePath) -> Result<Vec<String>> {
        self.entry_names(dir, false).await
    }

    /// Names of the directories directly inside `dir`.
    pub async fn directory_names(&self, dir: &StoragePath) -> Result<Vec<String>> {
        self.entry_names(dir, true).await
    }

    async fn entry_names(&self, dir: &StoragePath, directories: bool) -> Result<Vec<String>> {
        let host = self.host_path(dir)?;
        let mut entries = fs::read_dir(&host)
            .await
            .map_err(|e| Error::from_io(e, dir))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if (directories && file_type.is_dir()) || (!directories && file_type.is_file()) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    /// Creation time of an entry.
    pub fn creation_time(&self, path: &StoragePath) -> Result<DateTime<Utc>> {
        let host = self.host_path(path)?;
        let created = std::fs::metadata(&host)
            .and_then(|meta| meta.created())
            .map_err(|e| Error::from_io(e, path))?;
        Ok(created.into())
    }

    /// Delete the store and everything in it. The store is unusable
    /// afterwards.
    pub async fn remove(&self) -> Result<()> {
        let host = self.host_path(&StoragePath::root())?;
        self.removed.store(true, Ordering::Release);
        match fs::remove_dir_all(&host).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!(root = %host.display(), "Isolated store removed");
        Ok(())
    }
}

/// Restate a host-path error in terms of the store-relative path.
fn logical(err: Error, path: &StoragePath) -> Error {
    match err {
        Error::NotFound(_) => Error::NotFound(path.to_string()),
        Error::AlreadyExists(_) => Error::AlreadyExists(path.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    fn path(s: &str) -> StoragePath {
        StoragePath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let temp = TempDir::new().unwrap();
        let store = IsolatedStore::open("local", temp.path().join("store"), 1024).unwrap();

        store.create_directory(&path("A")).await.unwrap();
        store.create_file(&path("A/x.txt"), CreateMode::CreateNew).await.unwrap();
        store.create_file(&path("top.txt"), CreateMode::CreateNew).await.unwrap();

        assert_eq!(store.file_names(&path("A")).await.unwrap(), vec!["x.txt"]);
        assert_eq!(store.directory_names(&StoragePath::root()).await.unwrap(), vec!["A"]);
        assert_eq!(store.file_names(&StoragePath::root()).await.unwrap(), vec!["top.txt"]);
    }

    #[tokio::test]
    async fn test_create_modes() {
        let temp = TempDir::new().unwrap();
        let store = IsolatedStore::open("local", temp.path(), 1024).unwrap();
        let file = path("f.bin");

        store.create_file(&file, CreateMode::CreateNew).await.unwrap();
        assert!(matches!(
            store.create_file(&file, CreateMode::CreateNew).await,
            Err(Error::AlreadyExists(_))
        ));
        store.create_file(&file, CreateMode::OpenOrCreate).await.unwrap();
        store.create_file(&file, CreateMode::Truncate).await.unwrap();

        assert!(matches!(
            store.create_file(&path("missing/f.bin"), CreateMode::CreateNew).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_quota_enforced_on_copy() {
        let temp = TempDir::new().unwrap();
        let store = IsolatedStore::open("local", temp.path(), 8).unwrap();

        store.create_file(&path("a"), CreateMode::CreateNew).await.unwrap();
        let mut stream = store.open_file(&path("a"), true).await.unwrap();
        stream.write_all(b"12345678").await.unwrap();
        stream.flush().await.unwrap();
        drop(stream);

        assert_eq!(store.used_size().await.unwrap(), 8);
        assert_eq!(store.available_free_space().await.unwrap(), 0);
        assert!(matches!(
            store.copy_file(&path("a"), &store, &path("b"), false).await,
            Err(Error::QuotaExceeded(_))
        ));
        assert!(!store.file_exists(&path("b")).await);
    }

    #[tokio::test]
    async fn test_move_collisions() {
        let temp = TempDir::new().unwrap();
        let store = IsolatedStore::open("local", temp.path(), 1024).unwrap();

        store.create_file(&path("a"), CreateMode::CreateNew).await.unwrap();
        store.create_file(&path("b"), CreateMode::CreateNew).await.unwrap();

        assert!(matches!(
            store.move_file(&path("a"), &path("b")).await,
            Err(Error::AlreadyExists(_))
        ));
        assert!(matches!(
            store.move_file(&path("zzz"), &path("c")).await,
            Err(Error::NotFound(_))
        ));
        store.move_file(&path("a"), &path("c")).await.unwrap();
        assert!(store.file_exists(&path("c")).await);

        store.create_directory(&path("D")).await.unwrap();
        assert!(matches!(
            store.move_directory(&path("D"), &path("D/E")).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_ends_session() {
        let temp = TempDir::new().unwrap();
        let store = IsolatedStore::open("local", temp.path().join("s"), 1024).unwrap();
        store.create_file(&path("a"), CreateMode::CreateNew).await.unwrap();

        store.remove().await.unwrap();
        assert!(!store.is_available());
        assert!(!store.file_exists(&path("a")).await);
        assert!(!temp.path().join("s").exists());
        assert!(store.create_file(&path("b"), CreateMode::CreateNew).await.is_err());
    }

    #[tokio::test]
    async fn test_open_or_create_directory() {
        let temp = TempDir::new().unwrap();
        let store = IsolatedStore::open("local", temp.path(), 1024).unwrap();

        assert!(store.open_or_create_directory(&path("A")).await.unwrap());
        assert!(!store.open_or_create_directory(&path("A")).await.unwrap());
        assert!(matches!(
            store.open_or_create_directory(&path("gone/B")).await,
            Err(Error::NotFound(_))
        ));
        assert!(!store.directory_exists(&path("gone")).await);

        store.create_file(&path("f"), CreateMode::CreateNew).await.unwrap();
        assert!(matches!(
            store.open_or_create_directory(&path("f")).await,
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_full_paths_carry_label() {
        let temp = TempDir::new().unwrap();
        let store = IsolatedStore::open("temp", temp.path(), 1024).unwrap();

        assert_eq!(store.label(), "temp");
        assert_eq!(store.full_path(&StoragePath::root()), "temp");
        assert_eq!(store.full_path(&path("A/x.txt")), "temp/A/x.txt");
        assert!(matches!(
            IsolatedStore::open("a/b", temp.path(), 1024),
            Err(Error::NameInvalid(_))
        ));
    }
}
