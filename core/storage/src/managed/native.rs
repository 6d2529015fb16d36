//! Handle-based managed storage API.
//!
//! Models an OS-managed storage service: entries are reached through
//! handles, every call is asynchronous, and name collisions are resolved by
//! a policy passed into the call rather than by a separate existence check.
//! Handles snapshot their basic properties when acquired.

use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::host;
use crate::host::occupied;
use unifs_common::{split_extension, Error, Result};

/// Upper bound on `name (n)` candidates tried by
/// [`CreationCollisionOption::GenerateUniqueName`].
const MAX_UNIQUE_ATTEMPTS: u32 = 10_000;

/// Collision policy for creating files and folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationCollisionOption {
    /// Append ` (n)` to the name until it is free.
    GenerateUniqueName,
    /// Replace an existing entry.
    ReplaceExisting,
    /// Fail with `AlreadyExists`.
    FailIfExists,
    /// Return the existing entry.
    OpenIfExists,
}

/// Collision policy for copying, moving and renaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameCollisionOption {
    /// Append ` (n)` to the name until it is free.
    GenerateUniqueName,
    /// Replace an existing entry.
    ReplaceExisting,
    /// Fail with `AlreadyExists`.
    FailIfExists,
}

impl NameCollisionOption {
    /// Policy matching a `can_replace` flag.
    pub fn from_replace(can_replace: bool) -> Self {
        if can_replace {
            NameCollisionOption::ReplaceExisting
        } else {
            NameCollisionOption::FailIfExists
        }
    }
}

impl From<NameCollisionOption> for CreationCollisionOption {
    fn from(option: NameCollisionOption) -> Self {
        match option {
            NameCollisionOption::GenerateUniqueName => CreationCollisionOption::GenerateUniqueName,
            NameCollisionOption::ReplaceExisting => CreationCollisionOption::ReplaceExisting,
            NameCollisionOption::FailIfExists => CreationCollisionOption::FailIfExists,
        }
    }
}

/// Access requested when opening a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccessMode {
    Read,
    ReadWrite,
}

/// Attribute flags of an entry. `None` means the host cannot report the
/// flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileAttributes {
    pub read_only: bool,
    pub archive: Option<bool>,
    pub temporary: Option<bool>,
}

/// Properties captured when a handle is acquired.
#[derive(Debug, Clone)]
pub struct BasicProperties {
    pub attributes: FileAttributes,
    pub size: u64,
    pub date_created: Option<DateTime<Utc>>,
    pub date_modified: Option<DateTime<Utc>>,
}

impl BasicProperties {
    fn from_metadata(meta: &Metadata) -> Self {
        Self {
            attributes: attributes_of(meta),
            size: if meta.is_file() { meta.len() } else { 0 },
            date_created: meta.created().ok().map(Into::into),
            date_modified: meta.modified().ok().map(Into::into),
        }
    }
}

#[cfg(windows)]
fn attributes_of(meta: &Metadata) -> FileAttributes {
    use std::os::windows::fs::MetadataExt;
    let flags = meta.file_attributes();
    FileAttributes {
        read_only: meta.permissions().readonly(),
        archive: Some(flags & 0x20 != 0),
        temporary: Some(flags & 0x100 != 0),
    }
}

#[cfg(not(windows))]
fn attributes_of(meta: &Metadata) -> FileAttributes {
    FileAttributes {
        read_only: meta.permissions().readonly(),
        archive: None,
        temporary: None,
    }
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Candidate name for attempt `n` (1 is the name itself).
fn unique_candidate(name: &str, attempt: u32) -> String {
    if attempt <= 1 {
        return name.to_string();
    }
    let (stem, ext) = split_extension(name);
    format!("{} ({}){}", stem, attempt, ext)
}

/// Handle to a folder.
#[derive(Debug, Clone)]
pub struct StorageFolderHandle {
    path: PathBuf,
    properties: BasicProperties,
}

impl StorageFolderHandle {
    /// Acquire a handle to the folder at an absolute path.
    ///
    /// # Errors
    /// - `InvalidInput` if the path is relative
    /// - `NotFound` if no folder exists there
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_absolute() {
            return Err(Error::InvalidInput(format!(
                "Path must be absolute: {}",
                path.display()
            )));
        }
        Self::acquire(path.to_path_buf()).await
    }

    /// Create (if needed) and acquire an application folder.
    pub async fn application_folder(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        host::ensure_root(path).await?;
        Self::acquire(path.to_path_buf()).await
    }

    async fn acquire(path: PathBuf) -> Result<Self> {
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(Self {
                properties: BasicProperties::from_metadata(&meta),
                path,
            }),
            Ok(_) => Err(Error::NotFound(format!("Not a folder: {}", path.display()))),
            Err(e) => Err(Error::from_io(e, path.display())),
        }
    }

    /// Name of the folder.
    pub fn name(&self) -> String {
        entry_name(&self.path)
    }

    /// Host path of the folder.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Properties captured at acquisition.
    pub fn properties(&self) -> &BasicProperties {
        &self.properties
    }

    /// Re-read properties from the host.
    pub async fn basic_properties(&self) -> Result<BasicProperties> {
        Ok(Self::acquire(self.path.clone()).await?.properties)
    }

    /// Create a file in this folder under `option`.
    pub async fn create_file(
        &self,
        name: &str,
        option: CreationCollisionOption,
    ) -> Result<StorageFileHandle> {
        debug!(folder = %self.path.display(), name, ?option, "Native create file");

        if option == CreationCollisionOption::GenerateUniqueName {
            for attempt in 1..=MAX_UNIQUE_ATTEMPTS {
                let path = self.path.join(unique_candidate(name, attempt));
                match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                    Ok(_) => return StorageFileHandle::acquire(path).await,
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                    Err(e) => return Err(Error::from_io(e, path.display())),
                }
            }
            return Err(Error::AlreadyExists(format!("No free name for {}", name)));
        }

        let path = self.path.join(name);
        let mut options = fs::OpenOptions::new();
        options.write(true);
        match option {
            CreationCollisionOption::FailIfExists => options.create_new(true),
            CreationCollisionOption::ReplaceExisting => options.create(true).truncate(true),
            _ => options.create(true),
        };
        options
            .open(&path)
            .await
            .map_err(|e| Error::from_io(e, path.display()))?;
        StorageFileHandle::acquire(path).await
    }

    /// Create a subfolder under `option`.
    pub async fn create_folder(
        &self,
        name: &str,
        option: CreationCollisionOption,
    ) -> Result<StorageFolderHandle> {
        debug!(folder = %self.path.display(), name, ?option, "Native create folder");

        match option {
            CreationCollisionOption::GenerateUniqueName => {
                for attempt in 1..=MAX_UNIQUE_ATTEMPTS {
                    let path = self.path.join(unique_candidate(name, attempt));
                    match fs::create_dir(&path).await {
                        Ok(()) => return Self::acquire(path).await,
                        Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                        Err(e) => return Err(Error::from_io(e, path.display())),
                    }
                }
                Err(Error::AlreadyExists(format!("No free name for {}", name)))
            }
            CreationCollisionOption::FailIfExists => {
                let path = self.path.join(name);
                fs::create_dir(&path)
                    .await
                    .map_err(|e| Error::from_io(e, path.display()))?;
                Self::acquire(path).await
            }
            CreationCollisionOption::ReplaceExisting => {
                let path = self.path.join(name);
                match fs::remove_dir_all(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(Error::from_io(e, path.display())),
                }
                fs::create_dir(&path)
                    .await
                    .map_err(|e| Error::from_io(e, path.display()))?;
                Self::acquire(path).await
            }
            CreationCollisionOption::OpenIfExists => {
                let path = self.path.join(name);
                host::open_or_create_dir(&path).await?;
                Self::acquire(path).await
            }
        }
    }

    /// Get a child file.
    pub async fn get_file(&self, name: &str) -> Result<StorageFileHandle> {
        StorageFileHandle::acquire(self.path.join(name)).await
    }

    /// Get a child folder.
    pub async fn get_folder(&self, name: &str) -> Result<StorageFolderHandle> {
        Self::acquire(self.path.join(name)).await
    }

    /// Immediate child files.
    pub async fn get_files(&self) -> Result<Vec<StorageFileHandle>> {
        let (files, _) = self.children(&self.path).await?;
        Ok(files)
    }

    /// Immediate child folders.
    pub async fn get_folders(&self) -> Result<Vec<StorageFolderHandle>> {
        let (_, folders) = self.children(&self.path).await?;
        Ok(folders)
    }

    /// Files at any depth below this folder.
    pub async fn get_files_deep(&self) -> Result<Vec<StorageFileHandle>> {
        let mut files = Vec::new();
        let mut pending = vec![self.path.clone()];

        while let Some(dir) = pending.pop() {
            let (mut found, folders) = self.children(&dir).await?;
            files.append(&mut found);
            pending.extend(folders.into_iter().map(|f| f.path));
        }

        Ok(files)
    }

    async fn children(
        &self,
        dir: &Path,
    ) -> Result<(Vec<StorageFileHandle>, Vec<StorageFolderHandle>)> {
        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| Error::from_io(e, dir.display()))?;

        let mut files = Vec::new();
        let mut folders = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            let properties = BasicProperties::from_metadata(&meta);
            if meta.is_dir() {
                folders.push(StorageFolderHandle {
                    path: entry.path(),
                    properties,
                });
            } else if meta.is_file() {
                files.push(StorageFileHandle {
                    path: entry.path(),
                    properties,
                });
            }
        }
        Ok((files, folders))
    }

    /// Rename the folder, returning a handle to the renamed folder.
    pub async fn rename(&self, new_name: &str, option: NameCollisionOption) -> Result<Self> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::Unsupported(format!("Cannot rename {}", self.path.display())))?;

        let target = match option {
            NameCollisionOption::GenerateUniqueName => {
                let mut free = None;
                for attempt in 1..=MAX_UNIQUE_ATTEMPTS {
                    let candidate = parent.join(unique_candidate(new_name, attempt));
                    if !occupied(&candidate).await {
                        free = Some(candidate);
                        break;
                    }
                }
                free.ok_or_else(|| Error::AlreadyExists(format!("No free name for {}", new_name)))?
            }
            NameCollisionOption::FailIfExists => {
                let target = parent.join(new_name);
                if occupied(&target).await {
                    return Err(Error::AlreadyExists(target.display().to_string()));
                }
                target
            }
            NameCollisionOption::ReplaceExisting => {
                let target = parent.join(new_name);
                if fs::metadata(&target).await.map(|m| m.is_dir()).unwrap_or(false) {
                    fs::remove_dir_all(&target)
                        .await
                        .map_err(|e| Error::from_io(e, target.display()))?;
                }
                target
            }
        };

        fs::rename(&self.path, &target)
            .await
            .map_err(|e| Error::from_io(e, self.path.display()))?;
        Self::acquire(target).await
    }

    /// Delete the folder and its contents.
    pub async fn delete(&self) -> Result<()> {
        fs::remove_dir_all(&self.path)
            .await
            .map_err(|e| Error::from_io(e, self.path.display()))
    }
}

/// Handle to a file.
#[derive(Debug, Clone)]
pub struct StorageFileHandle {
    path: PathBuf,
    properties: BasicProperties,
}

impl StorageFileHandle {
    /// Acquire a handle to the file at an absolute path.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_absolute() {
            return Err(Error::InvalidInput(format!(
                "Path must be absolute: {}",
                path.display()
            )));
        }
        Self::acquire(path.to_path_buf()).await
    }

    async fn acquire(path: PathBuf) -> Result<Self> {
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Self {
                properties: BasicProperties::from_metadata(&meta),
                path,
            }),
            Ok(_) => Err(Error::NotFound(format!("Not a file: {}", path.display()))),
            Err(e) => Err(Error::from_io(e, path.display())),
        }
    }

    /// Name of the file.
    pub fn name(&self) -> String {
        entry_name(&self.path)
    }

    /// Extension including the leading period.
    pub fn file_type(&self) -> String {
        split_extension(&self.name()).1.to_string()
    }

    /// Host path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Properties captured at acquisition.
    pub fn properties(&self) -> &BasicProperties {
        &self.properties
    }

    /// Re-read properties from the host.
    pub async fn basic_properties(&self) -> Result<BasicProperties> {
        Ok(Self::acquire(self.path.clone()).await?.properties)
    }

    /// Copy into `folder` as `name` under `option`.
    ///
    /// The copy is staged beside the target and only then put in place. A
    /// target that is this very file, reached through any alias, is left
    /// untouched.
    pub async fn copy(
        &self,
        folder: &StorageFolderHandle,
        name: &str,
        option: NameCollisionOption,
    ) -> Result<StorageFileHandle> {
        if !host::occupied(&self.path).await {
            return Err(Error::NotFound(self.path.display().to_string()));
        }

        if option == NameCollisionOption::GenerateUniqueName {
            let claimed = folder.create_file(name, option.into()).await?;
            if let Err(e) = host::copy_file(&self.path, &claimed.path, true).await {
                if let Err(cleanup) = fs::remove_file(&claimed.path).await {
                    debug!(path = %claimed.path.display(), error = %cleanup, "Claimed name left behind");
                }
                return Err(e);
            }
            return StorageFileHandle::acquire(claimed.path).await;
        }

        let target = folder.path.join(name);
        let can_replace = option == NameCollisionOption::ReplaceExisting;
        if host::same_entry(&self.path, &target).await {
            if can_replace {
                return StorageFileHandle::acquire(target).await;
            }
            return Err(Error::AlreadyExists(target.display().to_string()));
        }

        host::copy_file(&self.path, &target, can_replace).await?;
        StorageFileHandle::acquire(target).await
    }

    /// Move into `folder` as `name` under `option`, returning a handle to
    /// the moved file.
    ///
    /// `FailIfExists` and `GenerateUniqueName` claim the target name with a
    /// hard link, so an existing file is never clobbered. Where linking is
    /// impossible (another device, no link support) the file is copied and
    /// the source removed.
    pub async fn move_to(
        &self,
        folder: &StorageFolderHandle,
        name: &str,
        option: NameCollisionOption,
    ) -> Result<StorageFileHandle> {
        if option == NameCollisionOption::ReplaceExisting {
            let target = folder.path.join(name);
            match fs::rename(&self.path, &target).await {
                Ok(()) => return StorageFileHandle::acquire(target).await,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(Error::from_io(e, self.path.display()));
                }
                Err(e) => {
                    debug!(error = %e, "Native rename failed, copying instead");
                    let moved = self.copy(folder, name, option).await?;
                    self.remove_source(&moved).await?;
                    return Ok(moved);
                }
            }
        }

        if !host::occupied(&self.path).await {
            return Err(Error::NotFound(self.path.display().to_string()));
        }

        let attempts = if option == NameCollisionOption::GenerateUniqueName {
            MAX_UNIQUE_ATTEMPTS
        } else {
            1
        };
        for attempt in 1..=attempts {
            let target = folder.path.join(unique_candidate(name, attempt));
            match fs::hard_link(&self.path, &target).await {
                Ok(()) => {
                    let moved = StorageFileHandle::acquire(target).await?;
                    self.remove_source(&moved).await?;
                    return Ok(moved);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    debug!(error = %e, "Native link failed, copying instead");
                    let moved = self.copy(folder, name, option).await?;
                    self.remove_source(&moved).await?;
                    return Ok(moved);
                }
            }
        }

        Err(Error::AlreadyExists(folder.path.join(name).display().to_string()))
    }

    async fn remove_source(&self, moved: &StorageFileHandle) -> Result<()> {
        if let Err(e) = fs::remove_file(&self.path).await {
            warn!(
                from = %self.path.display(),
                to = %moved.path.display(),
                error = %e,
                "Move left both copies in place"
            );
            return Err(Error::MoveIncomplete(format!(
                "Moved {} to {} but could not remove the source: {}",
                self.path.display(),
                moved.path.display(),
                e
            )));
        }
        Ok(())
    }

    /// Rename within the containing folder.
    pub async fn rename(&self, new_name: &str, option: NameCollisionOption) -> Result<Self> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::InvalidInput(format!("No parent folder: {}", self.path.display())))?;
        let folder = StorageFolderHandle::acquire(parent.to_path_buf()).await?;
        self.move_to(&folder, new_name, option).await
    }

    /// Delete the file.
    pub async fn delete(&self) -> Result<()> {
        fs::remove_file(&self.path)
            .await
            .map_err(|e| Error::from_io(e, self.path.display()))
    }

    /// Open with the given access.
    pub async fn open(&self, mode: FileAccessMode) -> Result<fs::File> {
        host::open_stream(&self.path, mode == FileAccessMode::ReadWrite)
            .await
            .map_err(|e| Error::from_io(e, self.path.display()))
    }

    /// Open for sequential reading.
    pub async fn open_sequential_read(&self) -> Result<fs::File> {
        self.open(FileAccessMode::Read).await
    }
}
