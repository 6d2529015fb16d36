//! Lazy, once-only backend resolution and the process-wide entry points.

use once_cell::sync::OnceCell;
use tracing::info;

use crate::config::ProviderConfig;
use crate::provider::{File, FileSystemProvider, Folder};
use crate::registry::{create_default_registry, Backend, ProviderRegistry};
use unifs_common::{Error, Result};

static GLOBAL: OnceCell<ProviderResolver> = OnceCell::new();

/// Resolves a backend from a registry on first use and keeps it for the
/// resolver's lifetime.
pub struct ProviderResolver {
    registry: ProviderRegistry,
    config: ProviderConfig,
    backend: OnceCell<Backend>,
}

impl ProviderResolver {
    /// Create an unresolved resolver.
    pub fn new(registry: ProviderRegistry, config: ProviderConfig) -> Self {
        Self {
            registry,
            config,
            backend: OnceCell::new(),
        }
    }

    /// Resolve the backend if that has not happened yet.
    ///
    /// Concurrent callers observe a single backend and the factory runs
    /// once. A failed resolution is not cached.
    ///
    /// # Errors
    /// - `ProviderNotFound` if no backend can be resolved
    pub fn ensure_initialized(&self) -> Result<&Backend> {
        self.backend.get_or_try_init(|| {
            let backend = self.registry.resolve(&self.config)?;
            info!(backend = %backend.kind(), "Storage backend resolved");
            Ok(backend)
        })
    }

    /// Whether a backend has been resolved.
    pub fn is_resolved(&self) -> bool {
        self.backend.get().is_some()
    }

    /// Get the file at `full_path` on the resolved backend.
    pub async fn get_file(&self, full_path: &str) -> Result<Box<dyn File>> {
        self.ensure_initialized()?.get_file(full_path).await
    }

    /// Get the folder at `full_path` on the resolved backend.
    pub async fn get_folder(&self, full_path: &str) -> Result<Box<dyn Folder>> {
        self.ensure_initialized()?.get_folder(full_path).await
    }

    /// Local storage folder of the resolved backend.
    pub async fn local_storage(&self) -> Result<Box<dyn Folder>> {
        self.ensure_initialized()?.local_storage().await
    }

    /// Temporary storage folder of the resolved backend.
    pub async fn temporary_storage(&self) -> Result<Box<dyn Folder>> {
        self.ensure_initialized()?.temporary_storage().await
    }
}

fn global() -> Result<&'static ProviderResolver> {
    GLOBAL.get_or_try_init(|| {
        Ok(ProviderResolver::new(
            create_default_registry(),
            ProviderConfig::from_env()?,
        ))
    })
}

/// Install the process-wide resolver.
///
/// Without this call the first entry point builds one from the default
/// registry and [`ProviderConfig::from_env`].
///
/// # Errors
/// - `AlreadyExists` if a resolver is already installed
pub fn configure(registry: ProviderRegistry, config: ProviderConfig) -> Result<()> {
    GLOBAL
        .set(ProviderResolver::new(registry, config))
        .map_err(|_| Error::AlreadyExists("The provider resolver is already configured".to_string()))
}

/// Resolve the process-wide backend now.
pub fn ensure_initialized() -> Result<&'static Backend> {
    global()?.ensure_initialized()
}

/// Get the file at `full_path`.
///
/// The path is whatever the resolved backend hands out from
/// [`File::full_path`]: an absolute host path (or `file://` URI) on the
/// standard and managed backends, a store-qualified path such as
/// `local/A/x.txt` on the isolated backend.
pub async fn get_file(full_path: &str) -> Result<Box<dyn File>> {
    global()?.get_file(full_path).await
}

/// Get the folder at `full_path`.
pub async fn get_folder(full_path: &str) -> Result<Box<dyn Folder>> {
    global()?.get_folder(full_path).await
}

/// Folder for persisting data of the running application.
pub async fn local_storage() -> Result<Box<dyn Folder>> {
    global()?.local_storage().await
}

/// Folder for temporary files of the running application.
pub async fn temporary_storage() -> Result<Box<dyn Folder>> {
    global()?.temporary_storage().await
}
