//! Files of the managed storage backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::any::Any;
use tracing::{debug, info};

use super::folder::folder_handle_of;
use super::native::{FileAccessMode, NameCollisionOption, StorageFileHandle};
use crate::host;
use crate::provider::{File, FileStream, Folder};
use unifs_common::{validate_name, Error, Result};

pub(super) fn attribute_unavailable(attribute: &str) -> Error {
    Error::Unsupported(format!("The host reports no {} attribute", attribute))
}

/// A file reached through a managed storage handle.
#[derive(Debug, Clone)]
pub struct ManagedFile {
    handle: StorageFileHandle,
}

impl ManagedFile {
    /// Wrap a native handle.
    pub fn new(handle: StorageFileHandle) -> Self {
        Self { handle }
    }

    /// The underlying handle.
    pub fn handle(&self) -> &StorageFileHandle {
        &self.handle
    }

    /// Move under an explicit collision policy.
    pub async fn move_with(
        &mut self,
        destination: &dyn Folder,
        new_name: Option<&str>,
        option: NameCollisionOption,
    ) -> Result<Box<dyn File>> {
        let name = match new_name {
            Some(name) => name.to_string(),
            None => self.handle.name(),
        };
        validate_name(&name)?;
        let folder = folder_handle_of(destination).await?;
        let target = folder.path().join(&name);
        debug!(from = %self.handle.path().display(), to = %target.display(), ?option, "Moving managed file");

        if host::same_entry(self.handle.path(), &target).await {
            if option == NameCollisionOption::FailIfExists {
                return Err(Error::AlreadyExists(target.display().to_string()));
            }
            return Ok(Box::new(self.clone()));
        }

        let moved = self.handle.move_to(&folder, &name, option).await?;
        info!(from = %self.handle.path().display(), to = %moved.path().display(), "Managed file moved");
        self.handle = moved.clone();
        Ok(Box::new(ManagedFile::new(moved)))
    }
}

#[async_trait]
impl File for ManagedFile {
    fn name(&self) -> String {
        self.handle.name()
    }

    fn extension(&self) -> String {
        self.handle.file_type()
    }

    fn full_path(&self) -> String {
        self.handle.path().display().to_string()
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

    async fn copy_to(
        &self,
        destination: &dyn Folder,
        new_name: Option<&str>,
        can_replace: bool,
    ) -> Result<Box<dyn File>> {
        let name = match new_name {
            Some(name) => name.to_string(),
            None => self.handle.name(),
        };
        validate_name(&name)?;
        let folder = folder_handle_of(destination).await?;
        let target = folder.path().join(&name);
        debug!(from = %self.handle.path().display(), to = %target.display(), "Copying managed file");

        if host::same_entry(self.handle.path(), &target).await {
            if can_replace {
                return Ok(Box::new(self.clone()));
            }
            return Err(Error::AlreadyExists(target.display().to_string()));
        }

        let copied = self
            .handle
            .copy(&folder, &name, NameCollisionOption::from_replace(can_replace))
            .await?;
        info!(from = %self.handle.path().display(), to = %copied.path().display(), "Managed file copied");
        Ok(Box::new(ManagedFile::new(copied)))
    }

    async fn move_to(
        &mut self,
        destination: &dyn Folder,
        new_name: Option<&str>,
        can_replace: bool,
    ) -> Result<Box<dyn File>> {
        self.move_with(destination, new_name, NameCollisionOption::from_replace(can_replace))
            .await
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
        info!(from = %self.handle.path().display(), to = %renamed.path().display(), "Managed file renamed");
        self.handle = renamed;
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        self.handle.delete().await?;
        info!(path = %self.handle.path().display(), "Managed file deleted");
        Ok(())
    }

    async fn open(&self, for_writing: bool) -> Result<FileStream> {
        let mode = if for_writing {
            FileAccessMode::ReadWrite
        } else {
            FileAccessMode::Read
        };
        Ok(Box::new(self.handle.open(mode).await?))
    }

    async fn open_sequential_read(&self) -> Result<FileStream> {
        Ok(Box::new(self.handle.open_sequential_read().await?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
