use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;

use crate::error::{AppError, AppResult};

use super::cipher::{self, CipherText};
use super::models::{CredentialSummary, Provider, ProviderCredential};
use super::probe::ProviderProbe;

/// Owns encryption, storage shape, and lifecycle of per-user provider API
/// keys. Plaintext keys exist only transiently in memory during encryption,
/// decryption, and the outbound validity probe; they are never persisted or
/// logged.
///
/// Concurrent saves/tests for the same (user, provider) are not serialized;
/// per-statement atomicity plus last-writer-wins is accepted given the low
/// write concurrency per user.
#[derive(Clone)]
pub struct CredentialVault {
    pool: PgPool,
    probe: Arc<dyn ProviderProbe>,
    secret: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TestOutcome {
    pub is_valid: bool,
    pub last_tested: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ModelToggleOutcome {
    pub model: String,
    pub enabled: bool,
    pub enabled_models: HashMap<String, bool>,
}

impl CredentialVault {
    pub fn new(pool: PgPool, probe: Arc<dyn ProviderProbe>, secret: impl Into<String>) -> Self {
        Self {
            pool,
            probe,
            secret: secret.into(),
        }
    }

    /// Save or replace the key for (user, provider). Encrypts with a fresh IV,
    /// probes the plaintext immediately, and records the outcome. New records
    /// default-enable every model in the provider's catalog; a valid test
    /// enables the full catalog on updates as well.
    pub async fn save_key(
        &self,
        user_id: i32,
        provider: Provider,
        raw_key: &str,
    ) -> AppResult<CredentialSummary> {
        let raw_key = raw_key.trim();
        if raw_key.is_empty() {
            return Err(AppError::BadRequest("API key is required".into()));
        }

        let existing = self.fetch_optional(user_id, provider).await?;

        let blob = cipher::encrypt(&self.secret, raw_key);
        let is_valid = self.probe.test_key(provider, raw_key).await;
        let last_tested = Utc::now();

        let mut enabled_models = match existing {
            Some(record) => record.enabled_models,
            None => provider
                .models()
                .iter()
                .map(|model| (model.to_string(), true))
                .collect(),
        };
        if is_valid {
            for model in provider.models() {
                enabled_models.insert(model.to_string(), true);
            }
        }

        let row = sqlx::query_as::<_, CredentialRow>(
            r#"INSERT INTO provider_credentials (user_id, provider, api_key, enabled_models, last_tested, is_valid)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, provider) DO UPDATE
            SET api_key = EXCLUDED.api_key,
                enabled_models = EXCLUDED.enabled_models,
                last_tested = EXCLUDED.last_tested,
                is_valid = EXCLUDED.is_valid,
                updated_at = now()
            RETURNING id, user_id, provider, api_key, is_enabled, enabled_models, last_tested, is_valid, created_at, updated_at"#,
        )
        .bind(user_id)
        .bind(provider.as_str())
        .bind(blob.encode())
        .bind(serde_json::to_value(&enabled_models).unwrap_or_default())
        .bind(last_tested)
        .bind(is_valid)
        .fetch_one(&self.pool)
        .await?;

        info!(
            user_id,
            provider = provider.as_str(),
            is_valid,
            "saved provider API key"
        );
        Ok(CredentialSummary::from(&ProviderCredential::try_from(row)?))
    }

    /// Return the plaintext key for an outbound call. Records still in the
    /// pre-IV format are re-encrypted with the current scheme and re-saved on
    /// first read.
    pub async fn decrypted_key(&self, user_id: i32, provider: Provider) -> AppResult<String> {
        let record = self.fetch(user_id, provider).await?;
        let stored = CipherText::parse(&record.api_key);
        let plaintext = cipher::decrypt(&self.secret, &stored)?;

        if stored.is_legacy() {
            let upgraded = cipher::encrypt(&self.secret, &plaintext);
            sqlx::query(
                "UPDATE provider_credentials SET api_key = $1, updated_at = now() WHERE id = $2",
            )
            .bind(upgraded.encode())
            .bind(record.id)
            .execute(&self.pool)
            .await?;
            info!(
                user_id,
                provider = provider.as_str(),
                "migrated legacy ciphertext to IV-per-record format"
            );
        }

        Ok(plaintext)
    }

    /// Re-test the stored key against the live provider and record the result.
    pub async fn test_key(&self, user_id: i32, provider: Provider) -> AppResult<TestOutcome> {
        let plaintext = self.decrypted_key(user_id, provider).await?;
        let is_valid = self.probe.test_key(provider, &plaintext).await;
        let last_tested = Utc::now();

        sqlx::query(
            "UPDATE provider_credentials SET is_valid = $1, last_tested = $2, updated_at = now() WHERE user_id = $3 AND provider = $4",
        )
        .bind(is_valid)
        .bind(last_tested)
        .bind(user_id)
        .bind(provider.as_str())
        .execute(&self.pool)
        .await?;

        Ok(TestOutcome {
            is_valid,
            last_tested,
        })
    }

    /// Flip the user-controlled enabled toggle. Key material and validity are
    /// untouched.
    pub async fn toggle_enabled(&self, user_id: i32, provider: Provider) -> AppResult<bool> {
        let is_enabled: Option<bool> = sqlx::query_scalar(
            "UPDATE provider_credentials SET is_enabled = NOT is_enabled, updated_at = now() WHERE user_id = $1 AND provider = $2 RETURNING is_enabled",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await?;

        is_enabled.ok_or(AppError::NotFound)
    }

    /// Flip one model's enablement flag. A model absent from the map counts as
    /// disabled, so the first toggle enables it. Model names outside the
    /// provider catalog are accepted; callers are expected to offer known
    /// models only.
    pub async fn toggle_model(
        &self,
        user_id: i32,
        provider: Provider,
        model: &str,
    ) -> AppResult<ModelToggleOutcome> {
        let mut record = self.fetch(user_id, provider).await?;
        let enabled = !record.enabled_models.get(model).copied().unwrap_or(false);
        record.enabled_models.insert(model.to_string(), enabled);

        sqlx::query(
            "UPDATE provider_credentials SET enabled_models = $1, updated_at = now() WHERE id = $2",
        )
        .bind(serde_json::to_value(&record.enabled_models).unwrap_or_default())
        .bind(record.id)
        .execute(&self.pool)
        .await?;

        Ok(ModelToggleOutcome {
            model: model.to_string(),
            enabled,
            enabled_models: record.enabled_models,
        })
    }

    /// Remove the credential entirely. Absence is reported as not-found so
    /// callers can tell it apart from a deletion that actually happened.
    pub async fn delete_key(&self, user_id: i32, provider: Provider) -> AppResult<()> {
        let result = sqlx::query(
            "DELETE FROM provider_credentials WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        info!(user_id, provider = provider.as_str(), "deleted provider API key");
        Ok(())
    }

    /// Every credential summary for a user, newest first. Ciphertext is never
    /// included.
    pub async fn list(&self, user_id: i32) -> AppResult<Vec<CredentialSummary>> {
        let rows = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, user_id, provider, api_key, is_enabled, enabled_models, last_tested, is_valid, created_at, updated_at FROM provider_credentials WHERE user_id = $1 ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Ok(CredentialSummary::from(&ProviderCredential::try_from(row)?)))
            .collect()
    }

    async fn fetch(&self, user_id: i32, provider: Provider) -> AppResult<ProviderCredential> {
        self.fetch_optional(user_id, provider)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn fetch_optional(
        &self,
        user_id: i32,
        provider: Provider,
    ) -> AppResult<Option<ProviderCredential>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, user_id, provider, api_key, is_enabled, enabled_models, last_tested, is_valid, created_at, updated_at FROM provider_credentials WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProviderCredential::try_from).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: i32,
    user_id: i32,
    provider: String,
    api_key: String,
    is_enabled: bool,
    enabled_models: serde_json::Value,
    last_tested: Option<DateTime<Utc>>,
    is_valid: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CredentialRow> for ProviderCredential {
    type Error = AppError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        let provider = Provider::parse(&row.provider).ok_or_else(|| {
            AppError::Message(format!("unknown provider '{}' in store", row.provider))
        })?;
        let enabled_models =
            serde_json::from_value::<HashMap<String, bool>>(row.enabled_models).unwrap_or_default();
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            provider,
            api_key: row.api_key,
            is_enabled: row.is_enabled,
            enabled_models,
            last_tested: row.last_tested,
            is_valid: row.is_valid,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
