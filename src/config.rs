//! Configuration management for codelift
//!
//! Stores settings in ~/.config/codelift/config.json. Secrets never live here:
//! the model API key and GitHub token are kept in the system keychain.

use crate::keyring;
use crate::suggest::llm::client::OPENROUTER_BASE_URL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const GITHUB_API_BASE_URL: &str = "https://api.github.com";

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_RETRIES: u32 = 3;
const MAX_RETRIES_LIMIT: u32 = 10;
const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Model id sent for every call instead of the built-in tiers
    #[serde(default)]
    pub model: Option<String>,
    /// OpenAI-compatible API base (defaults to OpenRouter)
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Retries on HTTP 429 inside the client; the orchestrator itself never retries
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub github_api_base_url: Option<String>,
    /// Client id of the GitHub OAuth app used for device flow login
    #[serde(default)]
    pub github_client_id: Option<String>,
    /// Maximum number of analyzed snippets kept in history
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// If false, `analyze` does not record its input in history
    #[serde(default = "default_record_history")]
    pub record_history: bool,
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_record_history() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: None,
            api_base_url: None,
            request_timeout_secs: None,
            max_retries: None,
            github_api_base_url: None,
            github_client_id: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            record_history: true,
        }
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("codelift"))
    }

    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load config from a specific file. A corrupt file is set aside and defaults are used.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                preserve_corrupt_config(path, &content);
                tracing::warn!(
                    "Config file was corrupted ({}). A backup was saved and defaults were loaded.",
                    err
                );
                Self::default()
            }
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().context("Could not determine config directory")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o700)) {
                    tracing::warn!("Failed to set config directory permissions: {}", e);
                }
            }
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        write_config_atomic(path, &content).context("Failed to write config")
    }

    /// Model override: `CODELIFT_MODEL` first, then the config file.
    pub fn model_override(&self) -> Option<String> {
        env_non_empty("CODELIFT_MODEL").or_else(|| {
            self.model
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
        })
    }

    pub fn api_base_url(&self) -> String {
        env_non_empty("CODELIFT_API_BASE")
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| OPENROUTER_BASE_URL.to_string())
    }

    pub fn github_api_base_url(&self) -> String {
        self.github_api_base_url
            .clone()
            .unwrap_or_else(|| GITHUB_API_BASE_URL.to_string())
    }

    /// OAuth client id: `CODELIFT_GITHUB_CLIENT_ID` first, then the config file.
    pub fn github_client_id(&self) -> Option<String> {
        env_non_empty("CODELIFT_GITHUB_CLIENT_ID").or_else(|| {
            self.github_client_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        })
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    /// Rate-limit retries, clamped to `MAX_RETRIES_LIMIT`.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
            .unwrap_or(DEFAULT_MAX_RETRIES)
            .min(MAX_RETRIES_LIMIT)
    }

    /// Get the OpenRouter API key (environment first, then keychain)
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(key) = env_non_empty("OPENROUTER_API_KEY") {
            return Some(key);
        }

        match keyring::get_api_key() {
            Ok(key) => key,
            Err(err) => {
                keyring::warn_keychain_error_once("API key", &err);
                None
            }
        }
    }

    /// Store the API key in the keychain and verify it reads back
    pub fn set_api_key(&self, key: &str) -> Result<()> {
        keyring::set_api_key(key).map_err(|err| {
            anyhow::anyhow!(
                "Failed to store API key in {}: {}. \
                 You can set the OPENROUTER_API_KEY environment variable instead.",
                keyring::credentials_store_label(),
                err
            )
        })?;

        match keyring::get_api_key() {
            Ok(Some(stored)) if stored == key => Ok(()),
            Ok(_) => Err(anyhow::anyhow!(
                "API key verification failed: key was not persisted. \
                 You can set the OPENROUTER_API_KEY environment variable instead."
            )),
            Err(err) => Err(anyhow::anyhow!(
                "API key verification failed: couldn't read back from keychain ({}).",
                err
            )),
        }
    }

    /// Check if API key is configured
    pub fn has_api_key(&self) -> bool {
        self.get_api_key().is_some()
    }

    /// Validate API key format (OpenRouter keys start with sk-)
    pub fn validate_api_key_format(key: &str) -> bool {
        key.starts_with("sk-")
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/codelift/config.json".to_string())
    }
}

/// Interactive prompt to set up the API key
pub fn setup_api_key_interactive() -> Result<String> {
    use std::io;

    println!();
    println!("  ┌─────────────────────────────────────────────────────────┐");
    println!("  │  OPENROUTER SETUP                                       │");
    println!("  └─────────────────────────────────────────────────────────┘");
    println!();
    println!("  codelift uses OpenRouter to analyze and convert legacy code.");
    println!();
    println!("  1. Get an API key at: https://openrouter.ai/keys");
    println!("  2. Paste it below (saved in your system keychain)");
    println!();
    print!("  API Key: ");
    io::stdout().flush()?;

    let mut key = String::new();
    io::stdin().read_line(&mut key)?;
    let key = key.trim().to_string();

    if key.is_empty() {
        anyhow::bail!("No API key provided");
    }

    if !Config::validate_api_key_format(&key) {
        println!();
        println!("  Warning: Key doesn't look like an OpenRouter key (should start with sk-)");
        println!("     Saving anyway...");
    }

    Config::load().set_api_key(&key)?;

    println!();
    println!("  + API key saved to {}", keyring::credentials_store_label());
    println!();

    Ok(key)
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

fn write_config_atomic(path: &Path, content: &str) -> Result<()> {
    use std::fs::OpenOptions;

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
            tracing::warn!("Failed to set temp config file permissions: {}", e);
        }
    }

    file.write_all(content.as_bytes())?;
    drop(file);

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.into());
    }
    Ok(())
}
