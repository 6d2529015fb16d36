//! Common types used throughout UniFS.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters treated as path separators in entry names, on every platform.
pub const SEPARATORS: [char; 2] = ['/', '\\'];

/// Validate a single file or folder name.
///
/// # Errors
/// - `NameInvalid` if the name is empty, whitespace only, or contains a
///   path separator
pub fn validate_name(name: &str) -> crate::Result<()> {
    if name.trim().is_empty() {
        return Err(crate::Error::NameInvalid(
            "Name cannot be empty".to_string(),
        ));
    }
    if name.contains(SEPARATORS) {
        return Err(crate::Error::NameInvalid(format!(
            "Name cannot contain path separators: {}",
            name
        )));
    }
    Ok(())
}

/// Split a file name into stem and extension.
///
/// The extension keeps its leading period and is empty when the name has
/// none. A leading period alone (".profile") is not an extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => name.split_at(idx),
    }
}

/// A logical path inside a store, independent of the host filesystem.
///
/// Used by the isolated backend to address entries relative to the store
/// root. Components are validated names, so a `StoragePath` can never name
/// anything outside its store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoragePath {
    components: Vec<String>,
}

impl StoragePath {
    /// Create a root path.
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Create a path from string components.
    ///
    /// # Errors
    /// - `NameInvalid` if any component is empty or contains a separator
    /// - `InvalidInput` if any component is `.` or `..`
    pub fn from_components(components: Vec<String>) -> crate::Result<Self> {
        for comp in &components {
            validate_name(comp)?;
            if comp == "." || comp == ".." {
                return Err(crate::Error::InvalidInput(format!(
                    "Relative component not allowed: {}",
                    comp
                )));
            }
        }
        Ok(Self { components })
    }

    /// Parse a path string. Both `/` and `\` separate components; leading,
    /// trailing and repeated separators are ignored.
    pub fn parse(path: &str) -> crate::Result<Self> {
        let components: Vec<String> = path
            .split(SEPARATORS)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect();
        Self::from_components(components)
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            let mut components = self.components.clone();
            components.pop();
            Some(Self { components })
        }
    }

    /// Get the file/directory name (last component).
    pub fn name(&self) -> Option<&str> {
        self.components.last().map(|s| s.as_str())
    }

    /// Join this path with a child name.
    pub fn join(&self, child: &str) -> crate::Result<Self> {
        validate_name(child)?;
        let mut components = self.components.clone();
        components.push(child.to_string());
        Self::from_components(components)
    }

    /// Replace the last component, keeping the parent.
    pub fn with_name(&self, name: &str) -> crate::Result<Self> {
        match self.parent() {
            Some(parent) => parent.join(name),
            None => Err(crate::Error::Unsupported(
                "The root path has no name".to_string(),
            )),
        }
    }

    /// Whether `other` is this path or lies beneath it.
    pub fn contains(&self, other: &StoragePath) -> bool {
        other.components.starts_with(&self.components)
    }

    /// Get the path components.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Store-relative string form, without a leading separator. The root is
    /// the empty string.
    pub fn to_relative_string(&self) -> String {
        self.components.join("/")
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.components.join("/"))
    }
}
