//! Standard filesystem backend.
//!
//! Every operation maps onto a host path operation through `tokio::fs`.
//! Copies stream into a staging file that is put in place once complete,
//! so the copy gets fresh attributes, and moves are copy-then-delete.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::host;
use crate::provider::{File, FileStream, FileSystemProvider, Folder};
use unifs_common::{split_extension, validate_name, Error, Result};

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn sync_metadata(path: &Path) -> Result<Metadata> {
    std::fs::metadata(path).map_err(|e| Error::from_io(e, path.display()))
}

fn read_only(path: &Path) -> Result<bool> {
    Ok(sync_metadata(path)?.permissions().readonly())
}

#[cfg(windows)]
fn has_attribute(path: &Path, flag: u32) -> Result<bool> {
    use std::os::windows::fs::MetadataExt;
    Ok(sync_metadata(path)?.file_attributes() & flag != 0)
}

#[cfg(not(windows))]
fn has_attribute(_path: &Path, _flag: u32) -> Result<bool> {
    Err(Error::Unsupported(
        "File attribute flags are not available on this platform".to_string(),
    ))
}

const FILE_ATTRIBUTE_ARCHIVE: u32 = 0x20;
const FILE_ATTRIBUTE_TEMPORARY: u32 = 0x100;

fn created(path: &Path) -> Result<DateTime<Utc>> {
    let time = sync_metadata(path)?
        .created()
        .map_err(|e| Error::from_io(e, path.display()))?;
    Ok(time.into())
}

/// A file addressed by host path.
#[derive(Debug, Clone)]
pub struct StandardFile {
    path: PathBuf,
}

impl StandardFile {
    /// Bind a file to a host path. Existence is not checked.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Host path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn target_path(&self, destination: &dyn Folder, new_name: Option<&str>) -> Result<PathBuf> {
        let name = match new_name {
            Some(name) => name.to_string(),
            None => self.name(),
        };
        validate_name(&name)?;
        Ok(StandardFolder::host_path_of(destination)?.join(name))
    }
}

#[async_trait]
impl File for StandardFile {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn extension(&self) -> String {
        let name = self.name();
        split_extension(&name).1.to_string()
    }

    fn full_path(&self) -> String {
        display(&self.path)
    }

    fn is_read_only(&self) -> Result<bool> {
        read_only(&self.path)
    }

    fn is_archive(&self) -> Result<bool> {
        has_attribute(&self.path, FILE_ATTRIBUTE_ARCHIVE)
    }

    fn is_temporary(&self) -> Result<bool> {
        has_attribute(&self.path, FILE_ATTRIBUTE_TEMPORARY)
    }

    fn date_created(&self) -> Result<DateTime<Utc>> {
        created(&self.path)
    }

    async fn copy_to(
        &self,
        destination: &dyn Folder,
        new_name: Option<&str>,
        can_replace: bool,
    ) -> Result<Box<dyn File>> {
        let target = self.target_path(destination, new_name)?;
        debug!(from = %self.path.display(), to = %target.display(), "Copying file");

        if host::same_entry(&self.path, &target).await {
            if can_replace {
                return Ok(Box::new(self.clone()));
            }
            return Err(Error::AlreadyExists(display(&target)));
        }

        host::copy_file(&self.path, &target, can_replace).await?;

        info!(from = %self.path.display(), to = %target.display(), "File copied");
        Ok(Box::new(StandardFile::new(target)))
    }

    async fn move_to(
        &mut self,
        destination: &dyn Folder,
        new_name: Option<&str>,
        can_replace: bool,
    ) -> Result<Box<dyn File>> {
        let target = self.target_path(destination, new_name)?;
        debug!(from = %self.path.display(), to = %target.display(), "Moving file");

        if host::same_entry(&self.path, &target).await {
            if can_replace {
                return Ok(Box::new(self.clone()));
            }
            return Err(Error::AlreadyExists(display(&target)));
        }

        host::copy_file(&self.path, &target, can_replace).await?;

        if let Err(e) = fs::remove_file(&self.path).await {
            warn!(
                from = %self.path.display(),
                to = %target.display(),
                error = %e,
                "Move left both copies in place"
            );
            return Err(Error::MoveIncomplete(format!(
                "Copied {} to {} but could not remove the source: {}",
                self.path.display(),
                target.display(),
                e
            )));
        }

        info!(from = %self.path.display(), to = %target.display(), "File moved");
        self.path = target.clone();
        Ok(Box::new(StandardFile::new(target)))
    }

    async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    async fn rename(&mut self, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        let parent = self
            .path
            .parent()
            .map(StandardFolder::new)
            .ok_or_else(|| Error::InvalidInput(format!("No parent folder: {}", self.path.display())))?;

        self.move_to(&parent, Some(new_name), false).await?;
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        debug!(path = %self.path.display(), "Deleting file");
        fs::remove_file(&self.path)
            .await
            .map_err(|e| Error::from_io(e, self.path.display()))?;
        info!(path = %self.path.display(), "File deleted");
        Ok(())
    }

    async fn open(&self, for_writing: bool) -> Result<FileStream> {
        let file = host::open_stream(&self.path, for_writing)
            .await
            .map_err(|e| Error::from_io(e, self.path.display()))?;
        Ok(Box::new(file))
    }

    async fn open_sequential_read(&self) -> Result<FileStream> {
        self.open(false).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A folder addressed by host path.
#[derive(Debug, Clone)]
pub struct StandardFolder {
    path: PathBuf,
}

impl StandardFolder {
    /// Bind a folder to a host path. Existence is not checked.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Host path of the folder.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Host path behind any folder handed to this backend.
    fn host_path_of(folder: &dyn Folder) -> Result<PathBuf> {
        match folder.as_any().downcast_ref::<StandardFolder>() {
            Some(standard) => Ok(standard.path.clone()),
            None => Ok(PathBuf::from(folder.full_path()?)),
        }
    }

    fn child(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.path.join(name))
    }

    async fn collect_files(
        dir: &Path,
        files: &mut Vec<Box<dyn File>>,
        mut subdirs: Option<&mut Vec<PathBuf>>,
    ) -> Result<()> {
        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| Error::from_io(e, dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_file() {
                files.push(Box::new(StandardFile::new(entry.path())));
            } else if file_type.is_dir() {
                if let Some(subdirs) = subdirs.as_deref_mut() {
                    subdirs.push(entry.path());
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Folder for StandardFolder {
    fn name(&self) -> Result<String> {
        Ok(self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| display(&self.path)))
    }

    fn full_path(&self) -> Result<String> {
        Ok(display(&self.path))
    }

    fn is_read_only(&self) -> Result<bool> {
        read_only(&self.path)
    }

    fn is_archive(&self) -> Result<bool> {
        has_attribute(&self.path, FILE_ATTRIBUTE_ARCHIVE)
    }

    fn is_temporary(&self) -> Result<bool> {
        has_attribute(&self.path, FILE_ATTRIBUTE_TEMPORARY)
    }

    fn date_created(&self) -> Result<DateTime<Utc>> {
        created(&self.path)
    }

    async fn create_file(&self, name: &str, can_replace: bool) -> Result<Box<dyn File>> {
        let path = self.child(name)?;
        debug!(path = %path.display(), can_replace, "Creating file");

        let mut options = fs::OpenOptions::new();
        options.write(true);
        if can_replace {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        options
            .open(&path)
            .await
            .map_err(|e| Error::from_io(e, path.display()))?;

        info!(path = %path.display(), "File created");
        Ok(Box::new(StandardFile::new(path)))
    }

    async fn get_or_create_file(&self, name: &str) -> Result<Box<dyn File>> {
        let path = self.child(name)?;
        fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .await
            .map_err(|e| Error::from_io(e, path.display()))?;
        Ok(Box::new(StandardFile::new(path)))
    }

    async fn get_file(&self, name: &str) -> Result<Box<dyn File>> {
        let path = self.child(name)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Box::new(StandardFile::new(path))),
            _ => Err(Error::NotFound(format!("File not found: {}", path.display()))),
        }
    }

    async fn get_files(&self) -> Result<Vec<Box<dyn File>>> {
        let mut files = Vec::new();
        Self::collect_files(&self.path, &mut files, None).await?;
        Ok(files)
    }

    async fn get_files_deep(&self) -> Result<Vec<Box<dyn File>>> {
        let mut files = Vec::new();
        let mut pending = vec![self.path.clone()];

        while let Some(dir) = pending.pop() {
            let mut subdirs = Vec::new();
            Self::collect_files(&dir, &mut files, Some(&mut subdirs)).await?;
            pending.extend(subdirs);
        }

        Ok(files)
    }

    async fn create_folder(&self, name: &str, can_replace: bool) -> Result<Box<dyn Folder>> {
        let path = self.child(name)?;
        debug!(path = %path.display(), can_replace, "Creating folder");

        if can_replace {
            match fs::remove_dir_all(&path).await {
                Ok(()) => debug!(path = %path.display(), "Replaced existing folder"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::from_io(e, path.display())),
            }
        }

        fs::create_dir(&path)
            .await
            .map_err(|e| Error::from_io(e, path.display()))?;

        info!(path = %path.display(), "Folder created");
        Ok(Box::new(StandardFolder::new(path)))
    }

    async fn get_or_create_folder(&self, name: &str) -> Result<Box<dyn Folder>> {
        let path = self.child(name)?;
        if host::open_or_create_dir(&path).await? {
            info!(path = %path.display(), "Folder created");
        }
        Ok(Box::new(StandardFolder::new(path)))
    }

    async fn get_folder(&self, name: &str) -> Result<Box<dyn Folder>> {
        let path = self.child(name)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(Box::new(StandardFolder::new(path))),
            _ => Err(Error::NotFound(format!("Folder not found: {}", path.display()))),
        }
    }

    async fn get_folders(&self) -> Result<Vec<Box<dyn Folder>>> {
        let mut entries = fs::read_dir(&self.path)
            .await
            .map_err(|e| Error::from_io(e, self.path.display()))?;

        let mut folders: Vec<Box<dyn Folder>> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                folders.push(Box::new(StandardFolder::new(entry.path())));
            }
        }
        Ok(folders)
    }

    async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn rename(&mut self, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        let target = self
            .path
            .parent()
            .map(|parent| parent.join(new_name))
            .ok_or_else(|| Error::Unsupported(format!("Cannot rename {}", self.path.display())))?;

        if fs::symlink_metadata(&target).await.is_ok() {
            return Err(Error::AlreadyExists(display(&target)));
        }

        fs::rename(&self.path, &target)
            .await
            .map_err(|e| Error::from_io(e, self.path.display()))?;

        info!(from = %self.path.display(), to = %target.display(), "Folder renamed");
        self.path = target;
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        debug!(path = %self.path.display(), "Deleting folder");
        fs::remove_dir_all(&self.path)
            .await
            .map_err(|e| Error::from_io(e, self.path.display()))?;
        info!(path = %self.path.display(), "Folder deleted");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Host filesystem provider.
///
/// Local storage lives under the user's local data directory and temporary
/// storage under the system temp directory, both in a subfolder named
/// after the application.
#[derive(Debug, Clone)]
pub struct StandardFsProvider {
    local_root: PathBuf,
    temp_root: PathBuf,
}

impl StandardFsProvider {
    /// Create a provider from configuration.
    ///
    /// # Errors
    /// - `NotFound` if the platform has no local data directory and none
    ///   was configured
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let local_root = match &config.local_root {
            Some(root) => root.clone(),
            None => dirs::data_local_dir()
                .ok_or_else(|| Error::NotFound("No local data directory".to_string()))?
                .join(config.app_name()),
        };
        let temp_root = match &config.temp_root {
            Some(root) => root.clone(),
            None => std::env::temp_dir().join(config.app_name()),
        };

        Ok(Self {
            local_root,
            temp_root,
        })
    }

    async fn ensure_root(root: &Path) -> Result<Box<dyn Folder>> {
        host::ensure_root(root).await?;
        Ok(Box::new(StandardFolder::new(root)))
    }
}

#[async_trait]
impl FileSystemProvider for StandardFsProvider {
    fn name(&self) -> &str {
        "standard_fs"
    }

    /// Accepts absolute host paths and `file://` URIs.
    async fn get_file(&self, full_path: &str) -> Result<Box<dyn File>> {
        let path = host::absolute_path(full_path)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Box::new(StandardFile::new(path))),
            _ => Err(Error::NotFound(format!("File not found: {}", full_path))),
        }
    }

    async fn get_folder(&self, full_path: &str) -> Result<Box<dyn Folder>> {
        let path = host::absolute_path(full_path)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(Box::new(StandardFolder::new(path))),
            _ => Err(Error::NotFound(format!("Folder not found: {}", full_path))),
        }
    }

    async fn local_storage(&self) -> Result<Box<dyn Folder>> {
        Self::ensure_root(&self.local_root).await
    }

    async fn temporary_storage(&self) -> Result<Box<dyn Folder>> {
        Self::ensure_root(&self.temp_root).await
    }
}
