//! Folders of the managed storage backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::any::Any;
use tracing::{debug, info};

use super::file::{attribute_unavailable, ManagedFile};
use super::native::{CreationCollisionOption, NameCollisionOption, StorageFolderHandle};
use crate::provider::{File, Folder};
use unifs_common::{validate_name, Result};

/// Native handle for a destination folder. Folders of other backends are
/// re-acquired from their full path.
pub(super) async fn folder_handle_of(folder: &dyn Folder) -> Result<StorageFolderHandle> {
    if let Some(managed) = folder.as_any().downcast_ref::<ManagedFolder>() {
        return Ok(managed.handle.clone());
    }
    StorageFolderHandle::from_path(folder.full_path()?).await
}

fn creation_option(can_replace: bool) -> CreationCollisionOption {
    if can_replace {
        CreationCollisionOption::ReplaceExisting
    } else {
        CreationCollisionOption::FailIfExists
    }
}

/// A folder reached through a managed storage handle.
#[derive(Debug, Clone)]
pub struct ManagedFolder {
    handle: StorageFolderHandle,
}

impl ManagedFolder {
    /// Wrap a native handle.
    pub fn new(handle: StorageFolderHandle) -> Self {
        Self { handle }
    }

    /// The underlying handle.
    pub fn handle(&self) -> &StorageFolderHandle {
        &self.handle
    }

    /// Create a file under an explicit collision policy.
    pub async fn create_file_with(
        &self,
        name: &str,
        option: CreationCollisionOption,
    ) -> Result<ManagedFile> {
        validate_name(name)?;
        let handle = self.handle.create_file(name, option).await?;
        info!(path = %handle.path().display(), "Managed file created");
        Ok(ManagedFile::new(handle))
    }

    /// Create a subfolder under an explicit collision policy.
    pub async fn create_folder_with(
        &self,
        name: &str,
        option: CreationCollisionOption,
    ) -> Result<ManagedFolder> {
        validate_name(name)?;
        let handle = self.handle.create_folder(name, option).await?;
        info!(path = %handle.path().display(), "Managed folder created");
        Ok(ManagedFolder::new(handle))
    }
}

#[async_trait]
impl Folder for ManagedFolder {
    fn name(&self) -> Result<String> {
        Ok(self.handle.name())
    }

    fn full_path(&self) -> Result<String> {
        Ok(self.handle.path().display().to_string())
    }

    fn is_read_only(&self) -> Result<bool> {
        Ok(self.handle.properties().attributes.read_only)
    }

    fn is_archive(&self) -> Result<bool> {
        self.handle
            .properties()
            .attributes
            .archive
            .ok_or_else(|| attribute_unavailable("archive"))
    }

    fn is_temporary(&self) -> Result<bool> {
        self.handle
            .properties()
            .attributes
            .temporary
            .ok_or_else(|| attribute_unavailable("temporary"))
    }

    fn date_created(&self) -> Result<DateTime<Utc>> {
        self.handle
            .properties()
            .date_created
            .ok_or_else(|| attribute_unavailable("creation time"))
    }

    async fn create_file(&self, name: &str, can_replace: bool) -> Result<Box<dyn File>> {
        debug!(folder = %self.handle.path().display(), name, can_replace, "Creating managed file");
        Ok(Box::new(
            self.create_file_with(name, creation_option(can_replace)).await?,
        ))
    }

    async fn get_or_create_file(&self, name: &str) -> Result<Box<dyn File>> {
        Ok(Box::new(
            self.create_file_with(name, CreationCollisionOption::OpenIfExists)
                .await?,
        ))
    }

    async fn get_file(&self, name: &str) -> Result<Box<dyn File>> {
        validate_name(name)?;
        Ok(Box::new(ManagedFile::new(self.handle.get_file(name).await?)))
    }

    async fn get_files(&self) -> Result<Vec<Box<dyn File>>> {
        let files = self.handle.get_files().await?;
        Ok(files
            .into_iter()
            .map(|handle| Box::new(ManagedFile::new(handle)) as Box<dyn File>)
            .collect())
    }

    async fn get_files_deep(&self) -> Result<Vec<Box<dyn File>>> {
        let files = self.handle.get_files_deep().await?;
        Ok(files
            .into_iter()
            .map(|handle| Box::new(ManagedFile::new(handle)) as Box<dyn File>)
            .collect())
    }

    async fn create_folder(&self, name: &str, can_replace: bool) -> Result<Box<dyn Folder>> {
        debug!(folder = %self.handle.path().display(), name, can_replace, "Creating managed folder");
        Ok(Box::new(
            self.create_folder_with(name, creation_option(can_replace))
                .await?,
        ))
    }

    async fn get_or_create_folder(&self, name: &str) -> Result<Box<dyn Folder>> {
        Ok(Box::new(
            self.create_folder_with(name, CreationCollisionOption::OpenIfExists)
                .await?,
        ))
    }

    async fn get_folder(&self, name: &str) -> Result<Box<dyn Folder>> {
        validate_name(name)?;
        Ok(Box::new(ManagedFolder::new(
            self.handle.get_folder(name).await?,
        )))
    }

    async fn get_folders(&self) -> Result<Vec<Box<dyn Folder>>> {
        let folders = self.handle.get_folders().await?;
        Ok(folders
            .into_iter()
            .map(|handle| Box::new(ManagedFolder::new(handle)) as Box<dyn Folder>)
            .collect())
    }

    async fn exists(&self) -> bool {
        self.handle.basic_properties().await.is_ok()
    }

    async fn rename(&mut self, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        let renamed = self
            .handle
            .rename(new_name, NameCollisionOption::FailIfExists)
            .await?;
        info!(from = %self.handle.path().display(), to = %renamed.path().display(), "Managed folder renamed");
        self.handle = renamed;
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        self.handle.delete().await?;
        info!(path = %self.handle.path().display(), "Managed folder deleted");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
