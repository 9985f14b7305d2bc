//! API key resolution for the realtime service.
//!
//! [`CredentialProvider::resolve`] walks the sources in a fixed order:
//!
//! ```text
//! memory cache ─▶ persisted cache (credentials.toml) ─▶ configured value ─▶ prompt
//! ```
//!
//! A key obtained from the prompt is written back to the persisted cache so
//! later runs skip the question.

pub mod prompt;
pub mod provider;
pub mod store;

pub use prompt::{CredentialPrompt, NoPrompt, StdinPrompt};
pub use provider::{Credential, CredentialError, CredentialProvider};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, StoreError};
