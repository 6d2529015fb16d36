//! Portable file and folder access for UniFS.
//!
//! Application code works against the [`File`], [`Folder`] and
//! [`FileSystemProvider`] contracts and never names a backend. Three
//! backends implement them:
//!
//! - [`standard`]: direct host filesystem access
//! - [`isolated`]: quota-scoped application stores with store-qualified paths
//! - [`managed`]: a handle-based API with collision policies
//!
//! The backend is chosen once per process by the [`resolver`] from a
//! [`ProviderRegistry`] and a [`ProviderConfig`].
//!
//! # Design Principles
//! - Async operations: everything that touches storage is async
//! - Unified error semantics: every backend reports `unifs_common::Error`
//! - Capability gaps are errors (`Unsupported`), not silent defaults

pub mod config;
mod host;
pub mod isolated;
pub mod managed;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod standard;

#[cfg(all(test, unix))]
mod testing;

pub use config::{BackendKind, ProviderConfig};
pub use isolated::{IsolatedFile, IsolatedFolder, IsolatedRoot, IsolatedStorageProvider, IsolatedStore};
pub use managed::{
    CreationCollisionOption, ManagedFile, ManagedFolder, ManagedStorageProvider,
    NameCollisionOption,
};
pub use provider::{File, FileStream, FileSystemProvider, Folder, StorageStream};
pub use registry::{create_default_registry, Backend, ProviderFactory, ProviderRegistry};
pub use resolver::{
    configure, ensure_initialized, get_file, get_folder, local_storage, temporary_storage,
    ProviderResolver,
};
pub use standard::{StandardFile, StandardFolder, StandardFsProvider};
pub use unifs_common::{Error, Result};
