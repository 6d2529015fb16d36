//! Folders inside an isolated store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, info};

use super::file::IsolatedFile;
use super::root::IsolatedRoot;
use super::store::{CreateMode, IsolatedStore};
use crate::provider::{File, Folder};
use unifs_common::{validate_name, Error, Result, StoragePath};

/// Operations shared by [`IsolatedFolder`] and [`IsolatedRoot`]: both are a
/// directory of the same store, the root being the empty path.
pub(super) struct Directory<'a> {
    pub store: &'a Arc<IsolatedStore>,
    pub path: &'a StoragePath,
}

impl Directory<'_> {
    fn child(&self, name: &str) -> Result<StoragePath> {
        validate_name(name)?;
        self.path.join(name)
    }

    fn file(&self, path: StoragePath) -> Box<dyn File> {
        Box::new(IsolatedFile::new(self.store.clone(), path))
    }

    fn folder(&self, path: StoragePath) -> Box<dyn Folder> {
        Box::new(IsolatedFolder::new(self.store.clone(), path))
    }

    pub async fn create_file(&self, name: &str, can_replace: bool) -> Result<Box<dyn File>> {
        let path = self.child(name)?;
        debug!(path = %path, can_replace, "Creating isolated file");

        let mode = if can_replace {
            CreateMode::Truncate
        } else {
            CreateMode::CreateNew
        };
        self.store.create_file(&path, mode).await?;

        info!(path = %path, "Isolated file created");
        Ok(self.file(path))
    }

    pub async fn get_or_create_file(&self, name: &str) -> Result<Box<dyn File>> {
        let path = self.child(name)?;
        self.store.create_file(&path, CreateMode::OpenOrCreate).await?;
        Ok(self.file(path))
    }

    pub async fn get_file(&self, name: &str) -> Result<Box<dyn File>> {
        let path = self.child(name)?;
        if !self.store.file_exists(&path).await {
            return Err(Error::NotFound(format!("File not found: {}", path)));
        }
        Ok(self.file(path))
    }

    pub async fn get_files(&self) -> Result<Vec<Box<dyn File>>> {
        let names = self.store.file_names(self.path).await?;
        names
            .iter()
            .map(|name| Ok(self.file(self.path.join(name)?)))
            .collect()
    }

    pub async fn create_folder(&self, name: &str, can_replace: bool) -> Result<Box<dyn Folder>> {
        let path = self.child(name)?;
        debug!(path = %path, can_replace, "Creating isolated folder");

        if can_replace && self.store.directory_exists(&path).await {
            self.store.delete_directory(&path).await?;
        }
        self.store.create_directory(&path).await?;

        info!(path = %path, "Isolated folder created");
        Ok(self.folder(path))
    }

    pub async fn get_or_create_folder(&self, name: &str) -> Result<Box<dyn Folder>> {
        let path = self.child(name)?;
        if self.store.open_or_create_directory(&path).await? {
            info!(path = %path, "Isolated folder created");
        }
        Ok(self.folder(path))
    }

    pub async fn get_folder(&self, name: &str) -> Result<Box<dyn Folder>> {
        let path = self.child(name)?;
        if !self.store.directory_exists(&path).await {
            return Err(Error::NotFound(format!("Folder not found: {}", path)));
        }
        Ok(self.folder(path))
    }

    pub async fn get_folders(&self) -> Result<Vec<Box<dyn Folder>>> {
        let names = self.store.directory_names(self.path).await?;
        names
            .iter()
            .map(|name| Ok(self.folder(self.path.join(name)?)))
            .collect()
    }
}

pub(super) fn deep_enumeration_unsupported() -> Error {
    Error::Unsupported("Isolated storage cannot enumerate files recursively".to_string())
}

pub(super) fn attribute_unsupported(attribute: &str) -> Error {
    Error::Unsupported(format!("Isolated storage has no {} attribute", attribute))
}

/// Store and directory path behind a folder handed to this backend.
pub(super) fn location_of(folder: &dyn Folder) -> Result<(Arc<IsolatedStore>, StoragePath)> {
    let any = folder.as_any();
    if let Some(nested) = any.downcast_ref::<IsolatedFolder>() {
        return Ok((nested.store.clone(), nested.path.clone()));
    }
    if let Some(root) = any.downcast_ref::<IsolatedRoot>() {
        return Ok((root.store().clone(), StoragePath::root()));
    }
    Err(Error::Unsupported(
        "Destination folder does not belong to isolated storage".to_string(),
    ))
}

/// A folder beneath the root of an isolated store.
#[derive(Debug, Clone)]
pub struct IsolatedFolder {
    store: Arc<IsolatedStore>,
    path: StoragePath,
}

impl IsolatedFolder {
    /// Bind a folder to a store path. Existence is not checked.
    pub fn new(store: Arc<IsolatedStore>, path: StoragePath) -> Self {
        Self { store, path }
    }

    /// Store-relative path of the folder.
    pub fn path(&self) -> &StoragePath {
        &self.path
    }

    fn directory(&self) -> Directory<'_> {
        Directory {
            store: &self.store,
            path: &self.path,
        }
    }
}

#[async_trait]
impl Folder for IsolatedFolder {
    fn name(&self) -> Result<String> {
        Ok(self.path.name().unwrap_or_default().to_string())
    }

    fn full_path(&self) -> Result<String> {
        Ok(self.store.full_path(&self.path))
    }

    fn is_read_only(&self) -> Result<bool> {
        Err(attribute_unsupported("read-only"))
    }

    fn is_archive(&self) -> Result<bool> {
        Err(attribute_unsupported("archive"))
    }

    fn is_temporary(&self) -> Result<bool> {
        Err(attribute_unsupported("temporary"))
    }

    fn date_created(&self) -> Result<DateTime<Utc>> {
        self.store.creation_time(&self.path)
    }

    async fn create_file(&self, name: &str, can_replace: bool) -> Result<Box<dyn File>> {
        self.directory().create_file(name, can_replace).await
    }

    async fn get_or_create_file(&self, name: &str) -> Result<Box<dyn File>> {
        self.directory().get_or_create_file(name).await
    }

    async fn get_file(&self, name: &str) -> Result<Box<dyn File>> {
        self.directory().get_file(name).await
    }

    async fn get_files(&self) -> Result<Vec<Box<dyn File>>> {
        self.directory().get_files().await
    }

    async fn get_files_deep(&self) -> Result<Vec<Box<dyn File>>> {
        Err(deep_enumeration_unsupported())
    }

    async fn create_folder(&self, name: &str, can_replace: bool) -> Result<Box<dyn Folder>> {
        self.directory().create_folder(name, can_replace).await
    }

    async fn get_or_create_folder(&self, name: &str) -> Result<Box<dyn Folder>> {
        self.directory().get_or_create_folder(name).await
    }

    async fn get_folder(&self, name: &str) -> Result<Box<dyn Folder>> {
        self.directory().get_folder(name).await
    }

    async fn get_folders(&self) -> Result<Vec<Box<dyn Folder>>> {
        self.directory().get_folders().await
    }

    async fn exists(&self) -> bool {
        self.store.directory_exists(&self.path).await
    }

    async fn rename(&mut self, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        let target = self.path.with_name(new_name)?;

        self.store.move_directory(&self.path, &target).await?;

        info!(from = %self.path, to = %target, "Isolated folder renamed");
        self.path = target;
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        debug!(path = %self.path, "Deleting isolated folder");
        self.store.delete_directory(&self.path).await?;
        info!(path = %self.path, "Isolated folder deleted");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
