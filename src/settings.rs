//! Credential storage
//!
//! The API key comes from the command line or environment first, then from a
//! small TOML settings file in the user's config directory. The controller
//! only ever reads the currently active value through a [`CredentialSource`].

use crate::{EmtyError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const SETTINGS_DIR: &str = "emty";
const SETTINGS_FILE: &str = "settings.toml";

/// Access token for the completion service
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Build a credential from user input, rejecting blank keys
    pub fn new(key: impl AsRef<str>) -> Option<Self> {
        let key = key.as_ref().trim();
        if key.is_empty() {
            None
        } else {
            Some(Self(key.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Shared handle to the active credential
///
/// Updating it affects the next submitted turn, never one already in flight.
#[derive(Clone, Debug, Default)]
pub struct CredentialSource {
    inner: Arc<RwLock<Option<Credential>>>,
}

impl CredentialSource {
    pub fn new(credential: Option<Credential>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(credential)),
        }
    }

    pub fn get(&self) -> Option<Credential> {
        self.inner.read().clone()
    }

    pub fn set(&self, credential: Option<Credential>) {
        *self.inner.write() = credential;
    }

    pub fn is_configured(&self) -> bool {
        self.inner.read().is_some()
    }
}

/// Persisted user settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Reads and writes the settings file
#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<config dir>/emty/settings.toml`
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| EmtyError::Settings("No configuration directory available".into()))?;
        Ok(Self::new(dir.join(SETTINGS_DIR).join(SETTINGS_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings; a missing file yields defaults
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            debug!("No settings file at {}", self.path.display());
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&self.path)?;
        toml::from_str(&content).map_err(|e| {
            EmtyError::Settings(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string(settings)
            .map_err(|e| EmtyError::Settings(format!("Failed to serialize settings: {}", e)))?;
        write_private(&self.path, &content)
    }

    /// Persist a new API key
    ///
    /// Blank input is ignored and returns `None` without touching the file.
    pub fn save_api_key(&self, key: &str) -> Result<Option<Credential>> {
        let Some(credential) = Credential::new(key) else {
            return Ok(None);
        };

        let mut settings = self.load()?;
        settings.api_key = Some(credential.expose().to_string());
        self.save(&settings)?;
        info!("API key saved to {}", self.path.display());
        Ok(Some(credential))
    }

    /// Pick the active credential: an explicit key wins over the saved one
    pub fn resolve(&self, explicit: Option<&str>) -> Result<Option<Credential>> {
        if let Some(credential) = explicit.and_then(Credential::new) {
            return Ok(Some(credential));
        }
        Ok(self.load()?.api_key.and_then(Credential::new))
    }
}

/// Write a file only the owner can read, since it holds the API key
#[cfg(unix)]
fn write_private(path: &Path, content: &str) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; tighten files from older versions too
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)?;
    Ok(())
}
