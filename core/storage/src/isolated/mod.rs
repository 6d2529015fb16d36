//! Isolated storage backend.
//!
//! Entries live in application-scoped stores with a byte quota. Full paths
//! are qualified with the store label (`local/...` or `temp/...`), the top
//! level of each store is an [`IsolatedRoot`], and
//! the backend deliberately offers no recursive enumeration and none of the
//! read-only/archive/temporary attributes.

pub mod file;
pub mod folder;
pub mod root;
pub mod store;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::provider::{File, FileSystemProvider, Folder};
use unifs_common::{Error, Result, StoragePath};

pub use file::IsolatedFile;
pub use folder::IsolatedFolder;
pub use root::IsolatedRoot;
pub use store::{CreateMode, IsolatedStore};

const STORE_DIRNAME: &str = "IsolatedStorage";

/// Label of the local store in full paths.
pub const LOCAL_SCOPE: &str = "local";

/// Label of the temporary store in full paths.
pub const TEMPORARY_SCOPE: &str = "temp";

/// Isolated storage provider: one store for local data, one for temporary
/// files.
#[derive(Debug, Clone)]
pub struct IsolatedStorageProvider {
    local: Arc<IsolatedStore>,
    temporary: Arc<IsolatedStore>,
}

impl IsolatedStorageProvider {
    /// Open the application's stores.
    ///
    /// Configured roots are used as the store directories; otherwise the
    /// stores live in `IsolatedStorage/<app>` under the local data and
    /// temp directories.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let app = config.app_name();
        let local_root = match &config.local_root {
            Some(root) => root.clone(),
            None => dirs::data_local_dir()
                .ok_or_else(|| Error::NotFound("No local data directory".to_string()))?
                .join(STORE_DIRNAME)
                .join(&app),
        };
        let temp_root: PathBuf = match &config.temp_root {
            Some(root) => root.clone(),
            None => std::env::temp_dir().join(STORE_DIRNAME).join(&app),
        };

        let quota = config.isolated_quota();
        Ok(Self {
            local: Arc::new(IsolatedStore::open(LOCAL_SCOPE, local_root, quota)?),
            temporary: Arc::new(IsolatedStore::open(TEMPORARY_SCOPE, temp_root, quota)?),
        })
    }

    /// Store backing local storage.
    pub fn local_store(&self) -> &Arc<IsolatedStore> {
        &self.local
    }

    /// Store backing temporary storage.
    pub fn temporary_store(&self) -> &Arc<IsolatedStore> {
        &self.temporary
    }

    /// Split a full path into its store and the path within that store.
    ///
    /// # Errors
    /// - `InvalidInput` if the path names no store
    /// - `NotFound` if the label matches neither store
    fn locate(&self, full_path: &str) -> Result<(&Arc<IsolatedStore>, StoragePath)> {
        let path = StoragePath::parse(full_path)?;
        let (label, rest) = path.components().split_first().ok_or_else(|| {
            Error::InvalidInput(format!(
                "Path must start with {} or {}",
                LOCAL_SCOPE, TEMPORARY_SCOPE
            ))
        })?;
        let store = [&self.local, &self.temporary]
            .into_iter()
            .find(|store| store.label() == label)
            .ok_or_else(|| Error::NotFound(format!("No isolated store named {}", label)))?;
        Ok((store, StoragePath::from_components(rest.to_vec())?))
    }
}

#[async_trait]
impl FileSystemProvider for IsolatedStorageProvider {
    fn name(&self) -> &str {
        "isolated_storage"
    }

    /// Resolves a store-qualified path such as `temp/A/x.txt`.
    async fn get_file(&self, full_path: &str) -> Result<Box<dyn File>> {
        let (store, path) = self.locate(full_path)?;
        if path.is_root() || !store.file_exists(&path).await {
            return Err(Error::NotFound(format!("File not found: {}", full_path)));
        }
        Ok(Box::new(IsolatedFile::new(store.clone(), path)))
    }

    /// Resolves a store-qualified path. A bare label is the store root.
    async fn get_folder(&self, full_path: &str) -> Result<Box<dyn Folder>> {
        let (store, path) = self.locate(full_path)?;
        if path.is_root() {
            return Ok(Box::new(IsolatedRoot::new(store.clone())));
        }
        if !store.directory_exists(&path).await {
            return Err(Error::NotFound(format!("Folder not found: {}", full_path)));
        }
        Ok(Box::new(IsolatedFolder::new(store.clone(), path)))
    }

    async fn local_storage(&self) -> Result<Box<dyn Folder>> {
        Ok(Box::new(IsolatedRoot::new(self.local.clone())))
    }

    async fn temporary_storage(&self) -> Result<Box<dyn Folder>> {
        Ok(Box::new(IsolatedRoot::new(self.temporary.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn provider(temp: &TempDir, quota: u64) -> IsolatedStorageProvider {
        let config = ProviderConfig {
            isolated_quota: Some(quota),
            ..ProviderConfig::default()
        }
        .with_roots(temp.path().join("local"), temp.path().join("temp"));
        IsolatedStorageProvider::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_scenario_folder_with_file() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp, 1024);
        let storage = provider.temporary_storage().await.unwrap();

        let a = storage.create_folder_new("A").await.unwrap();
        a.create_file_new("x.txt").await.unwrap();

        let files = a.get_files().await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name(), "x.txt");
        assert_eq!(files[0].full_path(), "temp/A/x.txt");

        assert!(matches!(storage.get_files_deep().await, Err(Error::Unsupported(_))));
        assert!(matches!(a.get_files_deep().await, Err(Error::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_root_capabilities() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp, 1024);
        let mut root = provider.local_storage().await.unwrap();

        assert!(root.exists().await);
        assert!(matches!(root.name(), Err(Error::Unsupported(_))));
        assert!(matches!(root.full_path(), Err(Error::Unsupported(_))));
        assert!(matches!(root.date_created(), Err(Error::Unsupported(_))));
        assert!(matches!(root.is_read_only(), Err(Error::Unsupported(_))));
        assert!(matches!(root.rename("other").await, Err(Error::Unsupported(_))));
        assert!(matches!(root.delete().await, Err(Error::Unsupported(_))));

        root.create_folder_new("B").await.unwrap();
        root.create_file_new("top.txt").await.unwrap();
        assert_eq!(root.get_folders().await.unwrap().len(), 1);
        assert_eq!(root.get_files().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_names_validated_before_store() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp, 1024);
        let root = provider.local_storage().await.unwrap();
        let nested = root.create_folder_new("A").await.unwrap();

        for folder in [&root, &nested] {
            assert!(matches!(folder.create_file("a/b", false).await, Err(Error::NameInvalid(_))));
            assert!(matches!(folder.create_folder("a\\b", false).await, Err(Error::NameInvalid(_))));
            assert!(matches!(folder.get_file("a/b").await, Err(Error::NameInvalid(_))));
            assert!(matches!(folder.get_folder("a/b").await, Err(Error::NameInvalid(_))));
        }
    }

    #[tokio::test]
    async fn test_file_attributes_unsupported() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp, 1024);
        let file = provider
            .local_storage()
            .await
            .unwrap()
            .create_file_new("x.txt")
            .await
            .unwrap();

        assert_eq!(file.extension(), ".txt");
        assert!(matches!(file.is_read_only(), Err(Error::Unsupported(_))));
        assert!(matches!(file.is_archive(), Err(Error::Unsupported(_))));
        assert!(matches!(file.is_temporary(), Err(Error::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_collisions_and_replace() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp, 1024);
        let root = provider.local_storage().await.unwrap();

        let file = root.create_file_new("x.txt").await.unwrap();
        {
            let mut stream = file.open(true).await.unwrap();
            stream.write_all(b"data").await.unwrap();
            stream.flush().await.unwrap();
        }
        assert!(matches!(root.create_file("x.txt", false).await, Err(Error::AlreadyExists(_))));

        let replaced = root.create_file("x.txt", true).await.unwrap();
        let mut contents = Vec::new();
        replaced
            .open_sequential_read()
            .await
            .unwrap()
            .read_to_end(&mut contents)
            .await
            .unwrap();
        assert!(contents.is_empty());

        let a = root.create_folder_new("A").await.unwrap();
        a.create_file_new("inner").await.unwrap();
        assert!(matches!(root.create_folder("A", false).await, Err(Error::AlreadyExists(_))));
        let a = root.create_folder("A", true).await.unwrap();
        assert!(a.get_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp, 1024);
        let root = provider.local_storage().await.unwrap();

        let mut folder = root.create_folder_new("A").await.unwrap();
        let mut file = folder.create_file_new("x.txt").await.unwrap();
        folder.create_file_new("y.txt").await.unwrap();

        assert!(matches!(file.rename("y.txt").await, Err(Error::AlreadyExists(_))));
        file.rename("z.txt").await.unwrap();
        assert_eq!(file.full_path(), "local/A/z.txt");
        assert!(file.exists().await);

        folder.rename("B").await.unwrap();
        assert_eq!(folder.full_path().unwrap(), "local/B");
        assert!(folder.get_file("z.txt").await.is_ok());
        // The file instance still addresses the old folder
        assert!(!file.exists().await);

        folder.delete().await.unwrap();
        assert!(!folder.exists().await);
        assert!(matches!(folder.delete().await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_move_between_folders_and_stores() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp, 1024);
        let local = provider.local_storage().await.unwrap();
        let temporary = provider.temporary_storage().await.unwrap();

        let dest = local.create_folder_new("dest").await.unwrap();
        let mut file = local.create_file_new("x.txt").await.unwrap();
        dest.create_file_new("x.txt").await.unwrap();

        assert!(matches!(
            file.move_to(&*dest, None, false).await,
            Err(Error::AlreadyExists(_))
        ));
        assert!(file.exists().await);
        assert_eq!(file.full_path(), "local/x.txt");

        let moved = file.move_to(&*dest, None, true).await.unwrap();
        assert_eq!(moved.full_path(), "local/dest/x.txt");
        assert_eq!(file.full_path(), "local/dest/x.txt");
        assert!(matches!(local.get_file("x.txt").await, Err(Error::NotFound(_))));

        let copied = file.copy_to(&*temporary, Some("copy.txt"), false).await.unwrap();
        assert!(copied.exists().await);
        assert!(temporary.get_file("copy.txt").await.is_ok());

        file.move_to(&*temporary, None, false).await.unwrap();
        assert!(file.exists().await);
        assert!(!dest.get_file("x.txt").await.is_ok());
    }

    #[tokio::test]
    async fn test_quota_exceeded() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp, 4);
        let root = provider.local_storage().await.unwrap();

        let file = root.create_file_new("big").await.unwrap();
        {
            let mut stream = file.open(true).await.unwrap();
            stream.write_all(b"0123456789").await.unwrap();
            stream.flush().await.unwrap();
        }

        assert!(matches!(root.create_file_new("more").await, Err(Error::QuotaExceeded(_))));
        assert!(matches!(
            file.copy_to(&*root, Some("copy"), false).await,
            Err(Error::QuotaExceeded(_))
        ));
        assert_eq!(provider.local_store().available_free_space().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_provider_lookup() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp, 1024);
        let root = provider.local_storage().await.unwrap();
        root.create_folder_new("A").await.unwrap().create_file_new("x.txt").await.unwrap();

        assert_eq!(provider.get_file("local/A/x.txt").await.unwrap().name(), "x.txt");
        assert_eq!(provider.get_folder("/local/A").await.unwrap().name().unwrap(), "A");
        assert!(provider.get_folder("local").await.unwrap().name().is_err());
        assert!(matches!(provider.get_folder("").await, Err(Error::InvalidInput(_))));
        assert!(matches!(provider.get_file("local").await, Err(Error::NotFound(_))));
        assert!(matches!(provider.get_file("local/A/missing").await, Err(Error::NotFound(_))));
        assert!(matches!(provider.get_file("other/A/x.txt").await, Err(Error::NotFound(_))));
        assert!(provider.get_file("local/A/../x.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_full_paths_round_trip_per_store() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp, 1024);
        let local = provider.local_storage().await.unwrap();
        let scratch = provider.temporary_storage().await.unwrap();

        local.create_folder_new("A").await.unwrap().create_file_new("x.txt").await.unwrap();
        let temp_file = scratch
            .create_folder_new("A")
            .await
            .unwrap()
            .create_file_new("x.txt")
            .await
            .unwrap();
        {
            let mut stream = temp_file.open(true).await.unwrap();
            stream.write_all(b"TEMP").await.unwrap();
            stream.flush().await.unwrap();
        }

        let found = provider.get_file(&temp_file.full_path()).await.unwrap();
        let mut contents = String::new();
        found
            .open_sequential_read()
            .await
            .unwrap()
            .read_to_string(&mut contents)
            .await
            .unwrap();
        assert_eq!(contents, "TEMP");

        let folder = provider.get_folder("temp/A").await.unwrap();
        assert_eq!(folder.full_path().unwrap(), "temp/A");
        assert_eq!(folder.get_files().await.unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_move_across_stores_reports_undeletable_source() {
        let temp = TempDir::new().unwrap();
        let provider = provider(&temp, 1024);
        let local = provider.local_storage().await.unwrap();
        let scratch = provider.temporary_storage().await.unwrap();
        let src = local.create_folder_new("src").await.unwrap();
        let mut file = src.create_file_new("x.txt").await.unwrap();

        let src_dir = provider.local_store().root().join("src");
        if !crate::testing::lock_dir(&src_dir) {
            return;
        }
        let result = file.move_to(&*scratch, None, false).await;
        crate::testing::unlock_dir(&src_dir);

        assert!(matches!(result, Err(Error::MoveIncomplete(_))));
        assert_eq!(file.full_path(), "local/src/x.txt");
        assert!(file.exists().await);
        assert!(scratch.get_file("x.txt").await.is_ok());
    }
}
