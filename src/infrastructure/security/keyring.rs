use crate::domain::error::{AppError, Result};
use keyring::Entry;

/// Secret store backed by the OS credential manager. One entry per setting key.
pub struct KeyringManager {
    service: String,
}

impl KeyringManager {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key)
            .map_err(|e| AppError::SecurityError(format!("Failed to open entry {}: {}", key, e)))
    }

    pub fn store(&self, key: &str, secret: &str) -> Result<()> {
        self.entry(key)?
            .set_password(secret)
            .map_err(|e| AppError::SecurityError(format!("Failed to store {}: {}", key, e)))
    }

    /// `Ok(None)` when nothing was ever stored under `key`.
    pub fn load(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AppError::SecurityError(format!(
                "Failed to read {}: {}",
                key, e
            ))),
        }
    }

    /// Removing a missing entry is not an error.
    pub fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AppError::SecurityError(format!(
                "Failed to remove {}: {}",
                key, e
            ))),
        }
    }
}
