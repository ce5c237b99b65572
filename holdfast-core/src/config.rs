//! Configuration management
//!
//! Server settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "server": {
//!     "sessionDurationSecs": 1800,
//!     "saveDatabase": true,
//!     "hashDatabase": "hashes.db",
//!     "argon2": { "timeCost": 3, "memoryCost": 65536, "parallelism": 4 }
//!   }
//! }
//! ```
//! The server secret is kept apart in `secret.json` and generated on first use.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{Argon2Params, ServerSecret};

pub const SETTINGS_FILE: &str = "settings.json";
pub const SECRET_FILE: &str = "secret.json";

pub const DEFAULT_SESSION_DURATION_SECS: u64 = 30 * 60;
pub const DEFAULT_HASH_DATABASE: &str = "hashes.db";

const SESSION_DURATION_ENV: &str = "HOLDFAST_SESSION_DURATION_SECS";
const SAVE_DATABASE_ENV: &str = "HOLDFAST_SAVE_DATABASE";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    server: ServerSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerSettings {
    #[serde(default = "default_session_duration")]
    session_duration_secs: u64,
    #[serde(default)]
    save_database: bool,
    #[serde(default = "default_hash_database")]
    hash_database: String,
    #[serde(default)]
    argon2: Argon2Params,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            session_duration_secs: DEFAULT_SESSION_DURATION_SECS,
            save_database: false,
            hash_database: DEFAULT_HASH_DATABASE.to_string(),
            argon2: Argon2Params::default(),
            other: HashMap::new(),
        }
    }
}

fn default_session_duration() -> u64 {
    DEFAULT_SESSION_DURATION_SECS
}

fn default_hash_database() -> String {
    DEFAULT_HASH_DATABASE.to_string()
}

/// On-disk form of the server secret
#[derive(Debug, Serialize, Deserialize)]
struct SecretFile {
    version: u32,
    /// Base64-encoded 32-byte secret
    secret: String,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub session_duration_secs: u64,
    /// Persist the hash registry to `hash_database` instead of memory
    pub save_database: bool,
    pub hash_database: String,
    pub argon2: Argon2Params,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_duration_secs: DEFAULT_SESSION_DURATION_SECS,
            save_database: false,
            hash_database: DEFAULT_HASH_DATABASE.to_string(),
            argon2: Argon2Params::default(),
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// Environment overrides (for CI/testing):
    /// - `HOLDFAST_SESSION_DURATION_SECS`
    /// - `HOLDFAST_SAVE_DATABASE`
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(data_dir)?;

        let session_duration_secs = match std::env::var(SESSION_DURATION_ENV) {
            Ok(value) => value
                .trim()
                .parse()
                .with_context(|| format!("{SESSION_DURATION_ENV} must be a number of seconds"))?,
            Err(_) => raw.server.session_duration_secs,
        };

        let save_database = match std::env::var(SAVE_DATABASE_ENV).ok().as_deref() {
            Some("true" | "1" | "yes" | "TRUE" | "YES") => true,
            Some("false" | "0" | "no" | "FALSE" | "NO") => false,
            _ => raw.server.save_database,
        };

        if session_duration_secs == 0 {
            anyhow::bail!("session duration must be positive");
        }

        Ok(Self {
            session_duration_secs,
            save_database,
            hash_database: raw.server.hash_database,
            argon2: raw.server.argon2,
        })
    }

    /// Save config to the data directory
    /// Preserves settings this crate doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let mut settings = read_settings(data_dir)?;

        settings.server.session_duration_secs = self.session_duration_secs;
        settings.server.save_database = self.save_database;
        settings.server.hash_database = self.hash_database.clone();
        settings.server.argon2 = self.argon2.clone();

        std::fs::create_dir_all(data_dir)?;
        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(data_dir.join(SETTINGS_FILE), content)?;
        Ok(())
    }
}

fn read_settings(data_dir: &Path) -> Result<SettingsFile> {
    let settings_path = data_dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    serde_json::from_str(&content)
        .with_context(|| format!("invalid settings file {}", settings_path.display()))
}

/// Load the server secret, generating and storing one if none exists
pub fn load_or_create_secret(data_dir: &Path) -> Result<ServerSecret> {
    let secret_path = data_dir.join(SECRET_FILE);

    if secret_path.exists() {
        let content = std::fs::read_to_string(&secret_path)?;
        let file: SecretFile = serde_json::from_str(&content)
            .with_context(|| format!("invalid secret file {}", secret_path.display()))?;
        return ServerSecret::from_base64(&file.secret)
            .with_context(|| format!("secret in {} is not 32 bytes of base64", secret_path.display()));
    }

    let secret = ServerSecret::generate();
    let file = SecretFile {
        version: 1,
        secret: secret.to_base64(),
    };
    std::fs::create_dir_all(data_dir)?;
    std::fs::write(&secret_path, serde_json::to_string_pretty(&file)?)?;
    restrict_permissions(&secret_path)?;
    info!(path = %secret_path.display(), "generated new server secret");
    Ok(secret)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
