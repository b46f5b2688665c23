use crate::error::AppError;
use crate::storage::{CREDENTIAL_KEY, KvStore};
use std::sync::Arc;
use tracing::warn;

/// Holds the single bearer credential for the remote task source.
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KvStore>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn save(&self, value: &str) -> Result<(), AppError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_input("credential is required"));
        }
        self.kv.set(CREDENTIAL_KEY, trimmed)
    }

    /// Read failures degrade to "no credential".
    pub fn get(&self) -> Option<String> {
        match self.kv.get(CREDENTIAL_KEY) {
            Ok(Some(value)) if !value.trim().is_empty() => Some(value.trim().to_string()),
            Ok(_) => None,
            Err(err) => {
                warn!(error = %err, "failed to read stored credential");
                None
            }
        }
    }

    pub fn exists(&self) -> bool {
        self.get().is_some()
    }

    pub fn clear(&self) {
        if let Err(err) = self.kv.remove(CREDENTIAL_KEY) {
            warn!(error = %err, "failed to clear stored credential");
        }
    }
}
