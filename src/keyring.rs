//! Unified credential storage for codelift
//!
//! The model API key and the GitHub token share a single keychain entry, stored
//! as JSON, so the OS prompts at most once. With `CODELIFT_DISABLE_KEYRING=1`
//! (and always under test) a 0600 credentials file in the config directory is
//! used instead.

use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

const KEYRING_SERVICE: &str = "codelift-credentials";
const KEYRING_USERNAME: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    openrouter_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    github_token: Option<String>,
}

type KeyringResult<T> = Result<T, String>;

static CREDENTIALS_CACHE: OnceLock<Mutex<Option<StoredCredentials>>> = OnceLock::new();
static KEYRING_ERROR_WARNED: AtomicBool = AtomicBool::new(false);

fn credentials_cache() -> &'static Mutex<Option<StoredCredentials>> {
    CREDENTIALS_CACHE.get_or_init(|| Mutex::new(None))
}

fn keyring_disabled() -> bool {
    if cfg!(test) {
        return true;
    }
    matches!(
        std::env::var("CODELIFT_DISABLE_KEYRING")
            .unwrap_or_default()
            .to_lowercase()
            .as_str(),
        "1" | "true" | "yes"
    )
}

/// Human-friendly credential backend label used in CLI messages.
pub fn credentials_store_label() -> &'static str {
    if keyring_disabled() {
        "local credentials file"
    } else {
        "system keychain"
    }
}

fn keyring_entry() -> Result<Entry, keyring::Error> {
    Entry::new(KEYRING_SERVICE, KEYRING_USERNAME)
}

fn fallback_credentials_path() -> KeyringResult<PathBuf> {
    if let Ok(path) = std::env::var("CODELIFT_CREDENTIALS_FILE") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    if cfg!(test) {
        return Ok(std::env::temp_dir().join(format!(
            "codelift-test-credentials-{}.json",
            std::process::id()
        )));
    }

    dirs::config_dir()
        .map(|p| p.join("codelift").join("credentials.json"))
        .ok_or_else(|| "Could not determine credentials file path".to_string())
}

fn read_fallback_credentials() -> KeyringResult<StoredCredentials> {
    let path = fallback_credentials_path()?;
    if !path.exists() {
        return Ok(StoredCredentials::default());
    }
    let json = fs::read_to_string(&path).map_err(|e| {
        format!(
            "Failed to read credentials file '{}': {}",
            path.display(),
            e
        )
    })?;
    serde_json::from_str(&json).map_err(|e| {
        format!(
            "Failed to parse credentials file '{}': {}",
            path.display(),
            e
        )
    })
}

fn write_fallback_credentials(creds: &StoredCredentials) -> KeyringResult<()> {
    let path = fallback_credentials_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            format!(
                "Failed to create credentials directory '{}': {}",
                parent.display(),
                e
            )
        })?;
    }

    let content = serde_json::to_string(creds)
        .map_err(|e| format!("Failed to serialize credentials: {}", e))?;
    let tmp_path = path.with_extension("json.tmp");
    let mut tmp_file = fs::File::create(&tmp_path)
        .map_err(|e| format!("Failed to create '{}': {}", tmp_path.display(), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = tmp_file.set_permissions(fs::Permissions::from_mode(0o600));
    }

    tmp_file
        .write_all(content.as_bytes())
        .map_err(|e| format!("Failed to write '{}': {}", tmp_path.display(), e))?;
    drop(tmp_file);
    fs::rename(&tmp_path, &path)
        .map_err(|e| format!("Failed to finalize '{}': {}", path.display(), e))
}

/// Warn about keychain errors only once per session
pub fn warn_keychain_error_once(context: &str, err: &str) {
    if KEYRING_ERROR_WARNED.swap(true, Ordering::Relaxed) {
        return;
    }
    tracing::warn!("Couldn't access system keychain for {}: {}", context, err);
    tracing::warn!(
        "Set OPENROUTER_API_KEY / GITHUB_TOKEN, or export CODELIFT_DISABLE_KEYRING=1, to bypass the keychain."
    );
}

fn read_credentials_uncached() -> KeyringResult<StoredCredentials> {
    if keyring_disabled() {
        return read_fallback_credentials();
    }
    let entry = keyring_entry().map_err(|e| e.to_string())?;
    match entry.get_password() {
        Ok(json) => {
            serde_json::from_str(&json).map_err(|e| format!("Failed to parse credentials: {}", e))
        }
        Err(keyring::Error::NoEntry) => Ok(StoredCredentials::default()),
        Err(err) => Err(err.to_string()),
    }
}

fn write_credentials(creds: &StoredCredentials) -> KeyringResult<()> {
    if keyring_disabled() {
        return write_fallback_credentials(creds);
    }
    let entry = keyring_entry().map_err(|e| e.to_string())?;
    let json = serde_json::to_string(creds)
        .map_err(|e| format!("Failed to serialize credentials: {}", e))?;
    entry.set_password(&json).map_err(|e| e.to_string())
}

fn read_credentials_cached() -> KeyringResult<StoredCredentials> {
    let mut guard = match credentials_cache().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(creds) = guard.as_ref() {
        return Ok(creds.clone());
    }
    let creds = read_credentials_uncached()?;
    *guard = Some(creds.clone());
    Ok(creds)
}

fn update_credentials(update: impl FnOnce(&mut StoredCredentials)) -> KeyringResult<()> {
    let mut creds = read_credentials_cached().unwrap_or_default();
    update(&mut creds);
    write_credentials(&creds)?;
    let mut guard = match credentials_cache().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = Some(creds);
    Ok(())
}

// ============================================================================
// Public API
// ============================================================================

/// Get the OpenRouter API key from the credential store
pub fn get_api_key() -> KeyringResult<Option<String>> {
    Ok(read_credentials_cached()?.openrouter_api_key)
}

pub fn set_api_key(key: &str) -> KeyringResult<()> {
    update_credentials(|creds| creds.openrouter_api_key = Some(key.to_string()))
}

/// Get the GitHub token from the credential store
pub fn get_github_token() -> KeyringResult<Option<String>> {
    Ok(read_credentials_cached()?.github_token)
}

pub fn set_github_token(token: &str) -> KeyringResult<()> {
    update_credentials(|creds| creds.github_token = Some(token.to_string()))
}

pub fn clear_github_token() -> KeyringResult<()> {
    update_credentials(|creds| creds.github_token = None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_credentials_partial_serialization() {
        let creds = StoredCredentials {
            openrouter_api_key: Some("sk-test".to_string()),
            github_token: None,
        };
        let json = serde_json::to_string(&creds).unwrap();
        assert!(json.contains("sk-test"));
        assert!(!json.contains("github_token"));
    }

    #[test]
    fn test_stored_credentials_deserialize_empty() {
        let parsed: StoredCredentials = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, StoredCredentials::default());
    }

    #[test]
    fn test_tests_never_touch_the_system_keychain() {
        assert!(keyring_disabled());
        assert_eq!(credentials_store_label(), "local credentials file");
    }

    #[test]
    fn test_github_token_round_trip_through_fallback_file() {
        set_github_token("gho_roundtrip").unwrap();
        assert_eq!(get_github_token().unwrap().as_deref(), Some("gho_roundtrip"));
        clear_github_token().unwrap();
        assert_eq!(get_github_token().unwrap(), None);
        let _ = fs::remove_file(fallback_credentials_path().unwrap());
    }
}
