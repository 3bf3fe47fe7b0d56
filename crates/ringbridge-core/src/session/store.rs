// ── Token persistence seam ──

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use secrecy::SecretString;

use crate::error::CoreError;

/// Where the current refresh token is persisted between runs.
///
/// Writes are last-write-wins: no versioning, no compare-and-swap.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<SecretString>, CoreError>;

    fn save(&self, token: &SecretString) -> Result<(), CoreError>;

    fn clear(&self) -> Result<(), CoreError>;
}

/// Process-local token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: ArcSwapOption<SecretString>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `token`.
    pub fn with_token(token: SecretString) -> Self {
        Self {
            token: ArcSwapOption::from_pointee(token),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<SecretString>, CoreError> {
        Ok(self.token.load_full().map(|t| SecretString::clone(&t)))
    }

    fn save(&self, token: &SecretString) -> Result<(), CoreError> {
        self.token.store(Some(Arc::new(token.clone())));
        Ok(())
    }

    fn clear(&self) -> Result<(), CoreError> {
        self.token.store(None);
        Ok(())
    }
}
