//! Provider configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use unifs_common::{Error, Result};

/// Environment variable naming the backend to resolve.
pub const ENV_BACKEND: &str = "UNIFS_BACKEND";
/// Environment variable overriding the application name.
pub const ENV_APP_NAME: &str = "UNIFS_APP_NAME";
/// Environment variable overriding the local storage root.
pub const ENV_LOCAL_ROOT: &str = "UNIFS_LOCAL_ROOT";
/// Environment variable overriding the temporary storage root.
pub const ENV_TEMP_ROOT: &str = "UNIFS_TEMP_ROOT";
/// Environment variable setting the isolated store quota in bytes.
pub const ENV_ISOLATED_QUOTA: &str = "UNIFS_ISOLATED_QUOTA";

/// Default quota of an isolated store (1 MiB, the classic per-user default).
pub const DEFAULT_ISOLATED_QUOTA: u64 = 1024 * 1024;

const FALLBACK_APP_NAME: &str = "unifs";

/// The closed set of storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Direct host filesystem access.
    StandardFs,
    /// Quota-scoped, application-isolated store.
    IsolatedStorage,
    /// Handle-based, collision-policy-driven storage API.
    ManagedStorage,
}

impl BackendKind {
    /// Every backend, in resolution fallback order.
    pub const ALL: [BackendKind; 3] = [
        BackendKind::StandardFs,
        BackendKind::IsolatedStorage,
        BackendKind::ManagedStorage,
    ];

    /// Backend preferred when configuration names none.
    pub fn platform_default() -> Self {
        BackendKind::StandardFs
    }

    /// Stable name used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::StandardFs => "standard_fs",
            BackendKind::IsolatedStorage => "isolated_storage",
            BackendKind::ManagedStorage => "managed_storage",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::ProviderNotFound(format!("Unknown backend '{}'", s)))
    }
}

/// Configuration for resolving and constructing a backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Backend to resolve; the platform default when absent.
    pub backend: Option<BackendKind>,
    /// Application name scoping the storage roots.
    pub app_name: Option<String>,
    /// Override for the local storage root.
    pub local_root: Option<PathBuf>,
    /// Override for the temporary storage root.
    pub temp_root: Option<PathBuf>,
    /// Quota of isolated stores, in bytes.
    pub isolated_quota: Option<u64>,
}

impl ProviderConfig {
    /// Build a configuration from `UNIFS_*` environment variables.
    ///
    /// # Errors
    /// - `ProviderNotFound` if `UNIFS_BACKEND` names an unknown backend
    /// - `InvalidInput` if `UNIFS_ISOLATED_QUOTA` is not a number
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from a JSON value.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = non_empty(ENV_BACKEND)
            .map(|v| v.parse::<BackendKind>())
            .transpose()?;
        let isolated_quota = non_empty(ENV_ISOLATED_QUOTA)
            .map(|v| {
                v.trim().parse::<u64>().map_err(|_| {
                    Error::InvalidInput(format!("{} must be a byte count: {}", ENV_ISOLATED_QUOTA, v))
                })
            })
            .transpose()?;

        Ok(Self {
            backend,
            app_name: non_empty(ENV_APP_NAME),
            local_root: non_empty(ENV_LOCAL_ROOT).map(PathBuf::from),
            temp_root: non_empty(ENV_TEMP_ROOT).map(PathBuf::from),
            isolated_quota,
        })
    }

    /// Set the backend.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the application name.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Set both storage roots.
    pub fn with_roots(mut self, local: impl Into<PathBuf>, temp: impl Into<PathBuf>) -> Self {
        self.local_root = Some(local.into());
        self.temp_root = Some(temp.into());
        self
    }

    /// Application name: configured, else the running executable's stem.
    pub fn app_name(&self) -> String {
        if let Some(name) = &self.app_name {
            return name.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| FALLBACK_APP_NAME.to_string())
    }

    /// Quota applied to isolated stores.
    pub fn isolated_quota(&self) -> u64 {
        self.isolated_quota.unwrap_or(DEFAULT_ISOLATED_QUOTA)
    }
}
