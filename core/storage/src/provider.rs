//! File, folder and provider contracts shared by every storage backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};

use unifs_common::Result;

/// Byte stream returned by [`File::open`] and [`File::open_sequential_read`].
///
/// Streams are positioned at the start of the file. A stream opened for
/// reading only fails on write at the native layer.
pub trait StorageStream: AsyncRead + AsyncWrite + AsyncSeek + Unpin + Send {}

impl<T> StorageStream for T where T: AsyncRead + AsyncWrite + AsyncSeek + Unpin + Send {}

/// Boxed stream type handed out by every backend.
pub type FileStream = Box<dyn StorageStream>;

/// A file on any backend.
///
/// The only mutable state of a file is its address: [`File::rename`] and
/// [`File::move_to`] re-point the instance at the new location. Other
/// instances obtained earlier for the old location are not affected.
#[async_trait]
pub trait File: fmt::Debug + Send + Sync {
    /// Name of the file including any extension.
    fn name(&self) -> String;

    /// Extension including the leading period, or an empty string.
    fn extension(&self) -> String;

    /// Full path of the file within its backend.
    fn full_path(&self) -> String;

    /// Whether the file is read-only.
    fn is_read_only(&self) -> Result<bool>;

    /// Whether the file is marked for archiving.
    fn is_archive(&self) -> Result<bool>;

    /// Whether the file is marked temporary.
    fn is_temporary(&self) -> Result<bool>;

    /// Creation time of the file.
    fn date_created(&self) -> Result<DateTime<Utc>>;

    /// Copy the file into `destination`.
    ///
    /// `new_name` defaults to the current name.
    ///
    /// # Errors
    /// - `NameInvalid` if `new_name` is not a valid name
    /// - `AlreadyExists` if the target exists and `can_replace` is false
    /// - `NotFound` if this file or the destination no longer exists
    async fn copy_to(
        &self,
        destination: &dyn Folder,
        new_name: Option<&str>,
        can_replace: bool,
    ) -> Result<Box<dyn File>>;

    /// Move the file into `destination`.
    ///
    /// # Postconditions
    /// - This instance addresses the destination
    /// - Returns a new instance for the destination
    ///
    /// # Errors
    /// - Same as [`File::copy_to`], with the source left untouched
    /// - `MoveIncomplete` if the destination was written but the source
    ///   could not be removed
    async fn move_to(
        &mut self,
        destination: &dyn Folder,
        new_name: Option<&str>,
        can_replace: bool,
    ) -> Result<Box<dyn File>>;

    /// Whether the file currently exists. Never fails.
    async fn exists(&self) -> bool;

    /// Rename the file within its folder and re-point this instance.
    ///
    /// # Errors
    /// - `NameInvalid` for an invalid name
    /// - `AlreadyExists` if the new name is taken
    async fn rename(&mut self, new_name: &str) -> Result<()>;

    /// Delete the file.
    ///
    /// # Errors
    /// - `NotFound` if the file does not exist
    async fn delete(&self) -> Result<()>;

    /// Open the file for reading, or for reading and writing.
    ///
    /// The caller owns the stream exclusively. On Windows the file is opened
    /// without sharing; elsewhere concurrent opens are not prevented.
    async fn open(&self, for_writing: bool) -> Result<FileStream>;

    /// Open the file for sequential reading.
    async fn open_sequential_read(&self) -> Result<FileStream>;

    /// Access to the concrete type, used by adapters of the same backend.
    fn as_any(&self) -> &dyn Any;
}

/// A folder on any backend.
#[async_trait]
pub trait Folder: fmt::Debug + Send + Sync {
    /// Name of the folder. `Unsupported` on a store root.
    fn name(&self) -> Result<String>;

    /// Full path of the folder within its backend. `Unsupported` on a
    /// store root.
    fn full_path(&self) -> Result<String>;

    /// Whether the folder is read-only.
    fn is_read_only(&self) -> Result<bool>;

    /// Whether the folder is marked for archiving.
    fn is_archive(&self) -> Result<bool>;

    /// Whether the folder is marked temporary.
    fn is_temporary(&self) -> Result<bool>;

    /// Creation time of the folder.
    fn date_created(&self) -> Result<DateTime<Utc>>;

    /// Create an empty file in this folder.
    ///
    /// # Preconditions
    /// - `name` contains no path separator
    ///
    /// # Postconditions
    /// - A zero-length file named `name` exists in this folder
    ///
    /// # Errors
    /// - `NameInvalid` before touching storage if `name` is invalid
    /// - `AlreadyExists` if the file exists and `can_replace` is false
    async fn create_file(&self, name: &str, can_replace: bool) -> Result<Box<dyn File>>;

    /// Create an empty file, failing if it exists.
    async fn create_file_new(&self, name: &str) -> Result<Box<dyn File>> {
        self.create_file(name, false).await
    }

    /// Open an existing file or create an empty one.
    async fn get_or_create_file(&self, name: &str) -> Result<Box<dyn File>>;

    /// Get an existing file.
    ///
    /// # Errors
    /// - `NameInvalid` before touching storage if `name` is invalid
    /// - `NotFound` if no such file exists
    async fn get_file(&self, name: &str) -> Result<Box<dyn File>>;

    /// Immediate child files, in no particular order.
    async fn get_files(&self) -> Result<Vec<Box<dyn File>>>;

    /// All descendant files at any depth, in no particular order.
    async fn get_files_deep(&self) -> Result<Vec<Box<dyn File>>>;

    /// Create a subfolder. With `can_replace` an existing folder is deleted
    /// recursively first.
    async fn create_folder(&self, name: &str, can_replace: bool) -> Result<Box<dyn Folder>>;

    /// Create a subfolder, failing if it exists.
    async fn create_folder_new(&self, name: &str) -> Result<Box<dyn Folder>> {
        self.create_folder(name, false).await
    }

    /// Open an existing subfolder or create it.
    async fn get_or_create_folder(&self, name: &str) -> Result<Box<dyn Folder>>;

    /// Get an existing subfolder.
    async fn get_folder(&self, name: &str) -> Result<Box<dyn Folder>>;

    /// Immediate child folders, in no particular order.
    async fn get_folders(&self) -> Result<Vec<Box<dyn Folder>>>;

    /// Whether the folder currently exists. Never fails.
    async fn exists(&self) -> bool;

    /// Rename the folder and re-point this instance.
    async fn rename(&mut self, new_name: &str) -> Result<()>;

    /// Delete the folder and everything beneath it.
    async fn delete(&self) -> Result<()>;

    /// Access to the concrete type, used by adapters of the same backend.
    fn as_any(&self) -> &dyn Any;
}

/// A storage backend: resolves absolute paths and supplies the
/// application-scoped storage roots.
#[async_trait]
pub trait FileSystemProvider: Send + Sync {
    /// Get the provider name (e.g., "standard_fs", "isolated_storage").
    fn name(&self) -> &str;

    /// Get the file at `full_path`, as reported by [`File::full_path`].
    ///
    /// # Errors
    /// - `InvalidInput` if the path cannot be interpreted by the backend
    /// - `NotFound` if no file exists there
    async fn get_file(&self, full_path: &str) -> Result<Box<dyn File>>;

    /// Get the folder at `full_path`, as reported by [`Folder::full_path`].
    async fn get_folder(&self, full_path: &str) -> Result<Box<dyn Folder>>;

    /// Folder for persisting data of the running application. Created on
    /// first access.
    async fn local_storage(&self) -> Result<Box<dyn Folder>>;

    /// Folder for temporary files of the running application. Created on
    /// first access.
    async fn temporary_storage(&self) -> Result<Box<dyn Folder>>;
}
