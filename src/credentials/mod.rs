//! Provider API-key credential vault: encryption at rest, per-model
//! enablement, and validity bookkeeping for third-party LLM keys.

pub mod cipher;
pub mod models;
pub mod probe;
pub mod service;

pub use cipher::{CipherError, CipherText};
pub use models::{CredentialSummary, Provider, ProviderCredential};
pub use probe::{HttpProviderProbe, ProviderProbe};
pub use service::{CredentialVault, ModelToggleOutcome, TestOutcome};
