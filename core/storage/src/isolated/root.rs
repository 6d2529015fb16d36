//! The top level of an isolated store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::sync::Arc;

use super::folder::{attribute_unsupported, deep_enumeration_unsupported, Directory};
use super::store::IsolatedStore;
use crate::provider::{File, Folder};
use unifs_common::{Error, Result, StoragePath};

/// Root folder of an isolated store.
///
/// The root has no name, path or creation time, and cannot be renamed or
/// deleted; those operations fail with `Unsupported`. Remove the whole
/// store through [`IsolatedStore::remove`] instead.
#[derive(Debug, Clone)]
pub struct IsolatedRoot {
    store: Arc<IsolatedStore>,
}

impl IsolatedRoot {
    /// Wrap a store.
    pub fn new(store: Arc<IsolatedStore>) -> Self {
        Self { store }
    }

    /// The store this root belongs to.
    pub fn store(&self) -> &Arc<IsolatedStore> {
        &self.store
    }

    fn directory<'a>(&'a self, root: &'a StoragePath) -> Directory<'a> {
        Directory {
            store: &self.store,
            path: root,
        }
    }
}

fn root_unsupported(what: &str) -> Error {
    Error::Unsupported(format!("The isolated store root has no {}", what))
}

#[async_trait]
impl Folder for IsolatedRoot {
    fn name(&self) -> Result<String> {
        Err(root_unsupported("name"))
    }

    fn full_path(&self) -> Result<String> {
        Err(root_unsupported("path"))
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
        Err(root_unsupported("creation time"))
    }

    async fn create_file(&self, name: &str, can_replace: bool) -> Result<Box<dyn File>> {
        let root = StoragePath::root();
        self.directory(&root).create_file(name, can_replace).await
    }

    async fn get_or_create_file(&self, name: &str) -> Result<Box<dyn File>> {
        let root = StoragePath::root();
        self.directory(&root).get_or_create_file(name).await
    }

    async fn get_file(&self, name: &str) -> Result<Box<dyn File>> {
        let root = StoragePath::root();
        self.directory(&root).get_file(name).await
    }

    async fn get_files(&self) -> Result<Vec<Box<dyn File>>> {
        let root = StoragePath::root();
        self.directory(&root).get_files().await
    }

    async fn get_files_deep(&self) -> Result<Vec<Box<dyn File>>> {
        Err(deep_enumeration_unsupported())
    }

    async fn create_folder(&self, name: &str, can_replace: bool) -> Result<Box<dyn Folder>> {
        let root = StoragePath::root();
        self.directory(&root).create_folder(name, can_replace).await
    }

    async fn get_or_create_folder(&self, name: &str) -> Result<Box<dyn Folder>> {
        let root = StoragePath::root();
        self.directory(&root).get_or_create_folder(name).await
    }

    async fn get_folder(&self, name: &str) -> Result<Box<dyn Folder>> {
        let root = StoragePath::root();
        self.directory(&root).get_folder(name).await
    }

    async fn get_folders(&self) -> Result<Vec<Box<dyn Folder>>> {
        let root = StoragePath::root();
        self.directory(&root).get_folders().await
    }

    async fn exists(&self) -> bool {
        self.store.is_available()
    }

    async fn rename(&mut self, _new_name: &str) -> Result<()> {
        Err(Error::Unsupported(
            "The isolated store root cannot be renamed".to_string(),
        ))
    }

    async fn delete(&self) -> Result<()> {
        Err(Error::Unsupported(
            "The isolated store root cannot be deleted".to_string(),
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
