//! Provider registry for backend resolution.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use crate::config::{BackendKind, ProviderConfig};
use crate::isolated::IsolatedStorageProvider;
use crate::managed::ManagedStorageProvider;
use crate::provider::{File, FileSystemProvider, Folder};
use crate::standard::StandardFsProvider;
use unifs_common::{Error, Result};

/// A constructed storage backend.
#[derive(Debug, Clone)]
pub enum Backend {
    StandardFs(StandardFsProvider),
    IsolatedStorage(IsolatedStorageProvider),
    ManagedStorage(ManagedStorageProvider),
}

impl Backend {
    /// Which backend this is.
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::StandardFs(_) => BackendKind::StandardFs,
            Backend::IsolatedStorage(_) => BackendKind::IsolatedStorage,
            Backend::ManagedStorage(_) => BackendKind::ManagedStorage,
        }
    }

    fn provider(&self) -> &dyn FileSystemProvider {
        match self {
            Backend::StandardFs(p) => p,
            Backend::IsolatedStorage(p) => p,
            Backend::ManagedStorage(p) => p,
        }
    }
}

#[async_trait]
impl FileSystemProvider for Backend {
    fn name(&self) -> &str {
        self.provider().name()
    }

    async fn get_file(&self, full_path: &str) -> Result<Box<dyn File>> {
        self.provider().get_file(full_path).await
    }

    async fn get_folder(&self, full_path: &str) -> Result<Box<dyn Folder>> {
        self.provider().get_folder(full_path).await
    }

    async fn local_storage(&self) -> Result<Box<dyn Folder>> {
        self.provider().local_storage().await
    }

    async fn temporary_storage(&self) -> Result<Box<dyn Folder>> {
        self.provider().temporary_storage().await
    }
}

/// Factory function type for creating backends.
pub type ProviderFactory = Box<dyn Fn(&ProviderConfig) -> Result<Backend> + Send + Sync>;

/// Registry of backend factories.
///
/// The backends available at run time are exactly those registered here.
pub struct ProviderRegistry {
    factories: HashMap<BackendKind, ProviderFactory>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a backend factory.
    ///
    /// # Errors
    /// - `AlreadyExists` if the backend is already registered
    pub fn register(&mut self, kind: BackendKind, factory: ProviderFactory) -> Result<()> {
        if self.factories.contains_key(&kind) {
            return Err(Error::AlreadyExists(format!(
                "Provider '{}' is already registered",
                kind
            )));
        }
        self.factories.insert(kind, factory);
        Ok(())
    }

    /// Construct the backend selected by `config`.
    ///
    /// A configured backend must be registered. Otherwise the platform
    /// default is tried first, then every other registered backend in
    /// [`BackendKind::ALL`] order.
    ///
    /// # Errors
    /// - `ProviderNotFound` if the configured backend is not registered, or
    ///   no backend is registered at all
    /// - Any error of the chosen factory
    pub fn resolve(&self, config: &ProviderConfig) -> Result<Backend> {
        if let Some(kind) = config.backend {
            let factory = self.factories.get(&kind).ok_or_else(|| {
                Error::ProviderNotFound(format!("Provider '{}' is not registered", kind))
            })?;
            return factory(config);
        }

        let preferred = BackendKind::platform_default();
        let (kind, factory) = std::iter::once(preferred)
            .chain(BackendKind::ALL.into_iter().filter(|k| *k != preferred))
            .find_map(|kind| self.factories.get(&kind).map(|factory| (kind, factory)))
            .ok_or_else(|| {
                Error::ProviderNotFound("No storage backend is registered".to_string())
            })?;

        debug!(backend = %kind, "Resolving storage backend");
        factory(config)
    }

    /// Registered backends.
    pub fn providers(&self) -> Vec<BackendKind> {
        self.factories.keys().copied().collect()
    }

    /// Check if a backend is registered.
    pub fn has_provider(&self, kind: BackendKind) -> bool {
        self.factories.contains_key(&kind)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a registry with every built-in backend.
pub fn create_default_registry() -> ProviderRegistry {
    let mut factories: HashMap<BackendKind, ProviderFactory> = HashMap::new();

    factories.insert(
        BackendKind::StandardFs,
        Box::new(|config| Ok(Backend::StandardFs(StandardFsProvider::new(config)?))),
    );
    factories.insert(
        BackendKind::IsolatedStorage,
        Box::new(|config| {
            Ok(Backend::IsolatedStorage(IsolatedStorageProvider::new(
                config,
            )?))
        }),
    );
    factories.insert(
        BackendKind::ManagedStorage,
        Box::new(|config| {
            Ok(Backend::ManagedStorage(ManagedStorageProvider::new(
                config,
            )?))
        }),
    );

    ProviderRegistry { factories }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(temp: &TempDir) -> ProviderConfig {
        ProviderConfig::default().with_roots(temp.path().join("local"), temp.path().join("temp"))
    }

    fn managed_only() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry
            .register(
                BackendKind::ManagedStorage,
                Box::new(|config| Ok(Backend::ManagedStorage(ManagedStorageProvider::new(config)?))),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_register_and_resolve() {
        let temp = TempDir::new().unwrap();
        let registry = managed_only();

        let backend = registry
            .resolve(&config(&temp).with_backend(BackendKind::ManagedStorage))
            .unwrap();
        assert_eq!(backend.kind(), BackendKind::ManagedStorage);
        assert_eq!(backend.name(), "managed_storage");
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = managed_only();
        let result = registry.register(
            BackendKind::ManagedStorage,
            Box::new(|config| Ok(Backend::ManagedStorage(ManagedStorageProvider::new(config)?))),
        );
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }

    #[test]
    fn test_configured_backend_must_be_registered() {
        let temp = TempDir::new().unwrap();
        let registry = managed_only();
        let result = registry.resolve(&config(&temp).with_backend(BackendKind::StandardFs));
        assert!(matches!(result, Err(Error::ProviderNotFound(_))));
    }

    #[test]
    fn test_fallback_order() {
        let temp = TempDir::new().unwrap();

        let backend = create_default_registry().resolve(&config(&temp)).unwrap();
        assert_eq!(backend.kind(), BackendKind::platform_default());

        let backend = managed_only().resolve(&config(&temp)).unwrap();
        assert_eq!(backend.kind(), BackendKind::ManagedStorage);
    }

    #[test]
    fn test_empty_registry() {
        let temp = TempDir::new().unwrap();
        let result = ProviderRegistry::new().resolve(&config(&temp));
        assert!(matches!(result, Err(Error::ProviderNotFound(_))));
    }

    #[test]
    fn test_providers_list() {
        let registry = create_default_registry();
        let providers = registry.providers();
        assert_eq!(providers.len(), 3);
        for kind in BackendKind::ALL {
            assert!(registry.has_provider(kind));
        }
    }

    #[tokio::test]
    async fn test_get_or_create_folder_agrees_across_backends() {
        for kind in BackendKind::ALL {
            let temp = TempDir::new().unwrap();
            let backend = create_default_registry()
                .resolve(&config(&temp).with_backend(kind))
                .unwrap();
            let root = backend.local_storage().await.unwrap();

            let a = root.create_folder_new("A").await.unwrap();
            a.delete().await.unwrap();
            assert!(
                matches!(a.get_or_create_folder("B").await, Err(Error::NotFound(_))),
                "{kind}"
            );
            assert!(!a.exists().await, "{kind}");

            root.create_file_new("f").await.unwrap();
            assert!(
                matches!(root.get_or_create_folder("f").await, Err(Error::AlreadyExists(_))),
                "{kind}"
            );

            let b = root.get_or_create_folder("B").await.unwrap();
            assert!(b.exists().await, "{kind}");
            assert!(root.get_or_create_folder("B").await.is_ok(), "{kind}");
        }
    }
}
