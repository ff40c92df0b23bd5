//! Legacy server emulation settings.
//!
//! Read from the `[sync]` table of a TOML file:
//!
//! ```toml
//! [sync]
//! emulate_http = true
//! emulate_json = false
//! ```

use crate::error::SyncResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// How requests are shaped for servers with limited HTTP support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Send PUT, PATCH and DELETE as POST with an `X-HTTP-Method-Override`
    /// header.
    pub emulate_http: bool,
    /// Send bodies form-encoded, with the JSON under a `model` field.
    pub emulate_json: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    sync: SyncConfig,
}

impl SyncConfig {
    /// Parses a TOML document. A missing `[sync]` table yields the defaults.
    pub fn from_toml_str(contents: &str) -> SyncResult<Self> {
        let file: ConfigFile = toml::from_str(contents)?;
        Ok(file.sync)
    }

    /// Reads and parses a config file, surfacing every failure.
    pub fn read(path: impl AsRef<Path>) -> SyncResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Loads config from `path`, falling back to the defaults when the file
    /// is absent or unusable.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No sync config found at {:?}, using defaults", path);
            return Self::default();
        }

        match Self::read(path) {
            Ok(config) => {
                info!(
                    emulate_http = config.emulate_http,
                    emulate_json = config.emulate_json,
                    "Loaded sync config from {:?}",
                    path
                );
                config
            }
            Err(e) => {
                warn!(
                    "Failed to load sync config {:?}: {}. Falling back to defaults.",
                    path, e
                );
                Self::default()
            }
        }
    }

    /// Applies per-call overrides.
    #[must_use]
    pub fn with_overrides(self, emulate_http: Option<bool>, emulate_json: Option<bool>) -> Self {
        Self {
            emulate_http: emulate_http.unwrap_or(self.emulate_http),
            emulate_json: emulate_json.unwrap_or(self.emulate_json),
        }
    }
}
