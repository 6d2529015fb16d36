//! Common utilities and types shared across UniFS crates.
//!
//! This crate provides the error taxonomy every storage backend reports
//! through, plus the name and path types used to address entries.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{split_extension, validate_name, StoragePath};
