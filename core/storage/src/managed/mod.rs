//! Managed storage backend.
//!
//! Built on the handle-based API in [`native`]: every entry is reached
//! through a handle, and name collisions are settled by the collision
//! policy handed to each call.

pub mod file;
pub mod folder;
pub mod native;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::ProviderConfig;
use crate::host;
use crate::provider::{File, FileSystemProvider, Folder};
use unifs_common::{Error, Result};

pub use file::ManagedFile;
pub use folder::ManagedFolder;
pub use native::{
    BasicProperties, CreationCollisionOption, FileAccessMode, FileAttributes,
    NameCollisionOption, StorageFileHandle, StorageFolderHandle,
};

const LOCAL_STATE: &str = "LocalState";
const TEMP_STATE: &str = "TempState";

/// Managed storage provider with per-application `LocalState` and
/// `TempState` folders.
#[derive(Debug, Clone)]
pub struct ManagedStorageProvider {
    local_root: PathBuf,
    temp_root: PathBuf,
}

impl ManagedStorageProvider {
    /// Create a provider. Without configured roots both folders live under
    /// the application's package directory in the local data directory.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let package = || -> Result<PathBuf> {
            Ok(dirs::data_local_dir()
                .ok_or_else(|| Error::NotFound("No local data directory".to_string()))?
                .join(config.app_name()))
        };

        let local_root = match &config.local_root {
            Some(root) => root.clone(),
            None => package()?.join(LOCAL_STATE),
        };
        let temp_root = match &config.temp_root {
            Some(root) => root.clone(),
            None => package()?.join(TEMP_STATE),
        };

        Ok(Self {
            local_root,
            temp_root,
        })
    }

    /// Application folder for local data.
    pub async fn local_folder(&self) -> Result<ManagedFolder> {
        Ok(ManagedFolder::new(
            StorageFolderHandle::application_folder(&self.local_root).await?,
        ))
    }

    /// Application folder for temporary data.
    pub async fn temporary_folder(&self) -> Result<ManagedFolder> {
        Ok(ManagedFolder::new(
            StorageFolderHandle::application_folder(&self.temp_root).await?,
        ))
    }
}

#[async_trait]
impl FileSystemProvider for ManagedStorageProvider {
    fn name(&self) -> &str {
        "managed_storage"
    }

    /// Accepts absolute host paths and `file://` URIs.
    async fn get_file(&self, full_path: &str) -> Result<Box<dyn File>> {
        let handle = StorageFileHandle::from_path(host::absolute_path(full_path)?).await?;
        Ok(Box::new(ManagedFile::new(handle)))
    }

    async fn get_folder(&self, full_path: &str) -> Result<Box<dyn Folder>> {
        let handle = StorageFolderHandle::from_path(host::absolute_path(full_path)?).await?;
        Ok(Box::new(ManagedFolder::new(handle)))
    }

    async fn local_storage(&self) -> Result<Box<dyn Folder>> {
        Ok(Box::new(self.local_folder().await?))
    }

    async fn temporary_storage(&self) -> Result<Box<dyn Folder>> {
        Ok(Box::new(self.temporary_folder().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn provider(temp: &TempDir) -> ManagedStorageProvider {
        let config = ProviderConfig::default()
            .with_roots(temp.path().join(LOCAL_STATE), temp.path().join(TEMP_STATE));
        ManagedStorageProvider::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_storage_roots_created() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp);

        let local = provider.local_storage().await.unwrap();
        assert_eq!(local.name().unwrap(), LOCAL_STATE);
        assert!(local.exists().await);
        assert!(provider.local_storage().await.is_ok());
        assert!(provider.temporary_storage().await.unwrap().exists().await);
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp);
        let root = provider.local_storage().await.unwrap();

        let file = root.create_file_new("notes.txt").await.unwrap();
        assert_eq!(file.extension(), ".txt");
        assert!(!file.is_read_only().unwrap());
        {
            let mut stream = file.open(true).await.unwrap();
            stream.write_all(b"hello").await.unwrap();
            stream.flush().await.unwrap();
        }

        let found = provider.get_file(&file.full_path()).await.unwrap();
        let mut contents = String::new();
        found
            .open_sequential_read()
            .await
            .unwrap()
            .read_to_string(&mut contents)
            .await
            .unwrap();
        assert_eq!(contents, "hello");

        assert!(matches!(root.create_file_new("notes.txt").await, Err(Error::AlreadyExists(_))));
        assert!(matches!(root.create_file("a/b", false).await, Err(Error::NameInvalid(_))));
    }

    #[tokio::test]
    async fn test_generate_unique_name() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp);
        let root = provider.local_folder().await.unwrap();

        root.create_file_new("x.txt").await.unwrap();
        let second = root
            .create_file_with("x.txt", CreationCollisionOption::GenerateUniqueName)
            .await
            .unwrap();
        assert_eq!(second.name(), "x (2).txt");

        let third = root
            .create_file_with("x.txt", CreationCollisionOption::GenerateUniqueName)
            .await
            .unwrap();
        assert_eq!(third.name(), "x (3).txt");
    }

    #[tokio::test]
    async fn test_deep_enumeration() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp);
        let root = provider.local_storage().await.unwrap();

        let a = root.create_folder_new("A").await.unwrap();
        let b = a.create_folder_new("B").await.unwrap();
        root.create_file_new("top").await.unwrap();
        a.create_file_new("mid").await.unwrap();
        b.create_file_new("low").await.unwrap();

        let mut names: Vec<String> = root
            .get_files_deep()
            .await
            .unwrap()
            .iter()
            .map(|f| f.name())
            .collect();
        names.sort();
        assert_eq!(names, vec!["low", "mid", "top"]);
        assert_eq!(root.get_files().await.unwrap().len(), 1);
        assert_eq!(root.get_folders().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_move_and_rename() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp);
        let root = provider.local_storage().await.unwrap();
        let dest = root.create_folder_new("dest").await.unwrap();

        let mut file = root.create_file_new("x.txt").await.unwrap();
        dest.create_file_new("x.txt").await.unwrap();

        assert!(matches!(
            file.move_to(&*dest, None, false).await,
            Err(Error::AlreadyExists(_))
        ));
        assert!(file.exists().await);

        let moved = file.move_to(&*dest, Some("y.txt"), false).await.unwrap();
        assert_eq!(moved.name(), "y.txt");
        assert_eq!(file.full_path(), moved.full_path());
        assert!(matches!(root.get_file("x.txt").await, Err(Error::NotFound(_))));

        assert!(matches!(file.rename("x.txt").await, Err(Error::AlreadyExists(_))));
        file.rename("z.txt").await.unwrap();
        assert_eq!(file.name(), "z.txt");

        file.move_to(&*dest, Some("x.txt"), true).await.unwrap();
        assert_eq!(dest.get_files().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_copy_into_other_root() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp);
        let local = provider.local_storage().await.unwrap();
        let scratch = provider.temporary_storage().await.unwrap();

        let file = local.create_file_new("x.txt").await.unwrap();
        let copy = file.copy_to(&*scratch, None, false).await.unwrap();
        assert!(copy.exists().await);
        assert!(file.exists().await);
        assert!(matches!(
            file.copy_to(&*scratch, None, false).await,
            Err(Error::AlreadyExists(_))
        ));
        file.copy_to(&*scratch, None, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_folder_rename_and_delete() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp);
        let root = provider.local_storage().await.unwrap();

        let mut folder = root.create_folder_new("A").await.unwrap();
        root.create_folder_new("B").await.unwrap();
        folder.create_file_new("x").await.unwrap();

        assert!(matches!(folder.rename("B").await, Err(Error::AlreadyExists(_))));
        folder.rename("C").await.unwrap();
        assert_eq!(folder.name().unwrap(), "C");
        assert!(folder.get_file("x").await.is_ok());

        folder.delete().await.unwrap();
        assert!(!folder.exists().await);
    }

    #[tokio::test]
    async fn test_relative_lookup_rejected() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp);
        assert!(matches!(provider.get_file("x.txt").await, Err(Error::InvalidInput(_))));
        assert!(matches!(
            provider.get_folder(&temp.path().join("missing").display().to_string()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_lookup_by_file_uri() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp);
        let root = provider.local_storage().await.unwrap();
        let file = root.create_file_new("a b.txt").await.unwrap();

        let uri = url::Url::from_file_path(file.full_path()).unwrap().to_string();
        assert_eq!(provider.get_file(&uri).await.unwrap().name(), "a b.txt");
        assert!(matches!(
            provider.get_folder("relative/dir").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_copy_through_symlinked_folder_keeps_contents() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp);
        let root = provider.local_storage().await.unwrap();
        let real = root.create_folder_new("real").await.unwrap();
        let mut file = real.create_file_new("x.txt").await.unwrap();
        {
            let mut stream = file.open(true).await.unwrap();
            stream.write_all(b"precious").await.unwrap();
            stream.flush().await.unwrap();
        }

        let alias_path = temp.path().join("alias");
        std::os::unix::fs::symlink(real.full_path().unwrap(), &alias_path).unwrap();
        let alias = provider
            .get_folder(&alias_path.display().to_string())
            .await
            .unwrap();

        file.copy_to(&*alias, None, true).await.unwrap();
        file.move_to(&*alias, None, true).await.unwrap();
        assert!(matches!(
            file.copy_to(&*alias, None, false).await,
            Err(Error::AlreadyExists(_))
        ));

        let mut contents = String::new();
        real.get_file("x.txt")
            .await
            .unwrap()
            .open_sequential_read()
            .await
            .unwrap()
            .read_to_string(&mut contents)
            .await
            .unwrap();
        assert_eq!(contents, "precious");
    }
}
