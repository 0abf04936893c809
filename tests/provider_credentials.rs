use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ai_tools_backend::credentials::{CredentialVault, Provider, ProviderProbe};
use async_trait::async_trait;
use sqlx::PgPool;

/// Returns a scripted sequence of probe results, then `false` forever.
struct ScriptedProbe {
    results: Vec<bool>,
    cursor: AtomicUsize,
}

impl ScriptedProbe {
    fn new(results: Vec<bool>) -> Self {
        Self {
            results,
            cursor: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProviderProbe for ScriptedProbe {
    async fn test_key(&self, _provider: Provider, _api_key: &str) -> bool {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.results.get(index).copied().unwrap_or(false)
    }
}

const SECRET: &str = "integration-test-encryption-secret";

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn save_then_list_reports_state_without_ciphertext(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let vault = CredentialVault::new(
        pool.clone(),
        Arc::new(ScriptedProbe::new(vec![true])),
        SECRET,
    );

    vault
        .save_key(41, Provider::Openai, "sk-test-123")
        .await
        .unwrap();

    let summaries = vault.list(41).await.unwrap();
    assert_eq!(summaries.len(), 1);
    let openai = &summaries[0];
    assert_eq!(openai.provider, Provider::Openai);
    assert!(openai.is_valid);
    assert_eq!(openai.enabled_models.get("gpt-4"), Some(&true));

    let json = serde_json::to_value(openai).unwrap();
    assert!(json.get("api_key").is_none());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn test_key_moves_between_valid_and_invalid(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    // Save succeeds, the explicit re-test fails, a later re-test succeeds.
    let vault = CredentialVault::new(
        pool.clone(),
        Arc::new(ScriptedProbe::new(vec![true, false, true])),
        SECRET,
    );

    let saved = vault
        .save_key(42, Provider::Anthropic, "sk-ant-123")
        .await
        .unwrap();
    assert!(saved.is_valid);

    let retested = vault.test_key(42, Provider::Anthropic).await.unwrap();
    assert!(!retested.is_valid);

    let summaries = vault.list(42).await.unwrap();
    assert!(!summaries[0].is_valid);
    assert!(summaries[0].last_tested.is_some());

    let recovered = vault.test_key(42, Provider::Anthropic).await.unwrap();
    assert!(recovered.is_valid);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn deleting_missing_credential_is_not_found(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let vault = CredentialVault::new(
        pool.clone(),
        Arc::new(ScriptedProbe::new(vec![true])),
        SECRET,
    );

    assert!(vault.delete_key(43, Provider::Gemini).await.is_err());

    vault
        .save_key(43, Provider::Gemini, "g-key-123")
        .await
        .unwrap();
    vault.delete_key(43, Provider::Gemini).await.unwrap();
    assert!(vault.list(43).await.unwrap().is_empty());
}
