//! [`CredentialProvider`] — deterministic API key resolution with caching.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use super::prompt::CredentialPrompt;
use super::store::CredentialStore;

/// Label shown by the interactive prompt.
const PROMPT_LABEL: &str = "OpenAI API Key";

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// A non-empty API key.
///
/// `Debug` never prints the key itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap `raw`, trimming whitespace.  Returns `None` for empty input.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// The key itself, for building the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

// ---------------------------------------------------------------------------
// CredentialError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// Every source was empty or the prompt was cancelled.
    #[error("no API key available (cache, configuration and prompt all empty)")]
    Missing,
}

// ---------------------------------------------------------------------------
// CredentialProvider
// ---------------------------------------------------------------------------

/// Resolves the API key once and remembers it for the rest of the process.
///
/// Precedence: memory cache, persisted store, configured value, prompt.  Only
/// a prompted key is written back to the persisted store.
pub struct CredentialProvider {
    cached: Mutex<Option<Credential>>,
    store: Box<dyn CredentialStore>,
    cache_key: String,
    configured: Option<String>,
    prompt: Box<dyn CredentialPrompt>,
}

impl CredentialProvider {
    /// * `store`      — persisted cache, read first and written after a prompt.
    /// * `cache_key`  — namespaced slot name inside `store`.
    /// * `configured` — value from settings/environment, read once at startup.
    /// * `prompt`     — last-resort interactive source.
    pub fn new(
        store: Box<dyn CredentialStore>,
        cache_key: impl Into<String>,
        configured: Option<String>,
        prompt: Box<dyn CredentialPrompt>,
    ) -> Self {
        Self {
            cached: Mutex::new(None),
            store,
            cache_key: cache_key.into(),
            configured,
            prompt,
        }
    }

    /// Resolve the credential.  May block on the interactive prompt.
    pub fn resolve(&self) -> Result<Credential, CredentialError> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(credential) = cached.as_ref() {
            return Ok(credential.clone());
        }

        let credential = self.resolve_uncached()?;
        *cached = Some(credential.clone());
        Ok(credential)
    }

    fn resolve_uncached(&self) -> Result<Credential, CredentialError> {
        match self.store.get(&self.cache_key) {
            Ok(Some(value)) => {
                if let Some(credential) = Credential::new(&value) {
                    log::debug!("credential: using cached key");
                    return Ok(credential);
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("credential: cache unreadable, ignoring it: {e}"),
        }

        if let Some(credential) = self.configured.as_deref().and_then(Credential::new) {
            log::debug!("credential: using configured key");
            return Ok(credential);
        }

        let prompted = self
            .prompt
            .ask(PROMPT_LABEL)
            .as_deref()
            .and_then(Credential::new)
            .ok_or(CredentialError::Missing)?;

        if let Err(e) = self.store.set(&self.cache_key, prompted.expose()) {
            log::warn!("credential: failed to persist prompted key: {e}");
        }
        log::info!("credential: using key entered at the prompt");
        Ok(prompted)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
