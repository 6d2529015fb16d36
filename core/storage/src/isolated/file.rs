//! Files inside an isolated store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::folder::{attribute_unsupported, location_of};
use super::store::IsolatedStore;
use crate::provider::{File, FileStream, Folder};
use unifs_common::{split_extension, validate_name, Error, Result, StoragePath};

/// A file inside an isolated store, addressed by store-relative path.
///
/// Its full path is qualified with the store label, as in `temp/A/x.txt`.
#[derive(Debug, Clone)]
pub struct IsolatedFile {
    store: Arc<IsolatedStore>,
    path: StoragePath,
}

impl IsolatedFile {
    /// Bind a file to a store path. Existence is not checked.
    pub fn new(store: Arc<IsolatedStore>, path: StoragePath) -> Self {
        Self { store, path }
    }

    /// Store-relative path of the file.
    pub fn path(&self) -> &StoragePath {
        &self.path
    }

    fn target(
        &self,
        destination: &dyn Folder,
        new_name: Option<&str>,
    ) -> Result<(Arc<IsolatedStore>, StoragePath)> {
        let name = new_name.unwrap_or_else(|| self.path.name().unwrap_or_default());
        validate_name(name)?;
        let (store, dir) = location_of(destination)?;
        let path = dir.join(name)?;
        Ok((store, path))
    }

    fn is_same_entry(&self, store: &Arc<IsolatedStore>, path: &StoragePath) -> bool {
        Arc::ptr_eq(&self.store, store) && &self.path == path
    }
}

#[async_trait]
impl File for IsolatedFile {
    fn name(&self) -> String {
        self.path.name().unwrap_or_default().to_string()
    }

    fn extension(&self) -> String {
        split_extension(self.path.name().unwrap_or_default())
            .1
            .to_string()
    }

    fn full_path(&self) -> String {
        self.store.full_path(&self.path)
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

    async fn copy_to(
        &self,
        destination: &dyn Folder,
        new_name: Option<&str>,
        can_replace: bool,
    ) -> Result<Box<dyn File>> {
        let (store, target) = self.target(destination, new_name)?;
        debug!(from = %self.path, to = %target, "Copying isolated file");

        if self.is_same_entry(&store, &target) {
            if can_replace {
                return Ok(Box::new(self.clone()));
            }
            return Err(Error::AlreadyExists(target.to_string()));
        }

        self.store
            .copy_file(&self.path, &store, &target, can_replace)
            .await?;

        info!(from = %self.path, to = %target, "Isolated file copied");
        Ok(Box::new(IsolatedFile::new(store, target)))
    }

    async fn move_to(
        &mut self,
        destination: &dyn Folder,
        new_name: Option<&str>,
        can_replace: bool,
    ) -> Result<Box<dyn File>> {
        let (store, target) = self.target(destination, new_name)?;
        debug!(from = %self.path, to = %target, "Moving isolated file");

        if self.is_same_entry(&store, &target) {
            if can_replace {
                return Ok(Box::new(self.clone()));
            }
            return Err(Error::AlreadyExists(target.to_string()));
        }

        if Arc::ptr_eq(&self.store, &store) {
            if !self.store.file_exists(&self.path).await {
                return Err(Error::NotFound(format!("File not found: {}", self.path)));
            }
            if can_replace && store.file_exists(&target).await {
                store.delete_file(&target).await?;
            }
            self.store.move_file(&self.path, &target).await?;
        } else {
            // Separate stores share no native move.
            self.store
                .copy_file(&self.path, &store, &target, can_replace)
                .await?;
            if let Err(e) = self.store.delete_file(&self.path).await {
                warn!(from = %self.path, to = %target, error = %e, "Move left both copies in place");
                return Err(Error::MoveIncomplete(format!(
                    "Copied {} to {} but could not remove the source: {}",
                    self.path, target, e
                )));
            }
        }

        info!(from = %self.path, to = %target, "Isolated file moved");
        self.store = store.clone();
        self.path = target.clone();
        Ok(Box::new(IsolatedFile::new(store, target)))
    }

    async fn exists(&self) -> bool {
        self.store.file_exists(&self.path).await
    }

    async fn rename(&mut self, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        let target = self.path.with_name(new_name)?;

        self.store.move_file(&self.path, &target).await?;

        info!(from = %self.path, to = %target, "Isolated file renamed");
        self.path = target;
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        debug!(path = %self.path, "Deleting isolated file");
        self.store.delete_file(&self.path).await?;
        info!(path = %self.path, "Isolated file deleted");
        Ok(())
    }

    async fn open(&self, for_writing: bool) -> Result<FileStream> {
        let file = self.store.open_file(&self.path, for_writing).await?;
        Ok(Box::new(file))
    }

    async fn open_sequential_read(&self) -> Result<FileStream> {
        self.open(false).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
