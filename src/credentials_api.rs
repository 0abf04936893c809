use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::credentials::{
    CredentialSummary, CredentialVault, ModelToggleOutcome, Provider, ProviderProbe, TestOutcome,
};
use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;

pub fn routes() -> Router {
    Router::new()
        .route("/api/provider-keys", get(list_keys))
        .route(
            "/api/provider-keys/:provider",
            post(save_key).delete(delete_key),
        )
        .route("/api/provider-keys/:provider/test", post(test_key))
        .route("/api/provider-keys/:provider/toggle", patch(toggle_enabled))
        .route(
            "/api/provider-keys/:provider/models/:model/toggle",
            patch(toggle_model),
        )
}

#[derive(Deserialize)]
pub struct SaveKeyRequest {
    pub api_key: String,
}

#[derive(Serialize)]
pub struct ToggleResponse {
    pub is_enabled: bool,
}

fn vault(pool: PgPool, probe: Arc<dyn ProviderProbe>) -> CredentialVault {
    CredentialVault::new(pool, probe, crate::config::ENCRYPTION_KEY.clone())
}

fn parse_provider(raw: &str) -> AppResult<Provider> {
    Provider::parse(raw).ok_or_else(|| AppError::BadRequest(format!("unknown provider '{raw}'")))
}

async fn list_keys(
    Extension(pool): Extension<PgPool>,
    Extension(probe): Extension<Arc<dyn ProviderProbe>>,
    AuthUser { user_id }: AuthUser,
) -> AppResult<Json<HashMap<String, CredentialSummary>>> {
    let summaries = vault(pool, probe).list(user_id).await?;
    let keyed = summaries
        .into_iter()
        .map(|summary| (summary.provider.as_str().to_string(), summary))
        .collect();
    Ok(Json(keyed))
}

async fn save_key(
    Extension(pool): Extension<PgPool>,
    Extension(probe): Extension<Arc<dyn ProviderProbe>>,
    AuthUser { user_id }: AuthUser,
    Path(provider): Path<String>,
    Json(payload): Json<SaveKeyRequest>,
) -> AppResult<Json<CredentialSummary>> {
    let provider = parse_provider(&provider)?;
    let summary = vault(pool, probe)
        .save_key(user_id, provider, &payload.api_key)
        .await?;
    Ok(Json(summary))
}

async fn test_key(
    Extension(pool): Extension<PgPool>,
    Extension(probe): Extension<Arc<dyn ProviderProbe>>,
    AuthUser { user_id }: AuthUser,
    Path(provider): Path<String>,
) -> AppResult<Json<TestOutcome>> {
    let provider = parse_provider(&provider)?;
    let outcome = vault(pool, probe).test_key(user_id, provider).await?;
    Ok(Json(outcome))
}

async fn toggle_enabled(
    Extension(pool): Extension<PgPool>,
    Extension(probe): Extension<Arc<dyn ProviderProbe>>,
    AuthUser { user_id }: AuthUser,
    Path(provider): Path<String>,
) -> AppResult<Json<ToggleResponse>> {
    let provider = parse_provider(&provider)?;
    let is_enabled = vault(pool, probe).toggle_enabled(user_id, provider).await?;
    Ok(Json(ToggleResponse { is_enabled }))
}

async fn toggle_model(
    Extension(pool): Extension<PgPool>,
    Extension(probe): Extension<Arc<dyn ProviderProbe>>,
    AuthUser { user_id }: AuthUser,
    Path((provider, model)): Path<(String, String)>,
) -> AppResult<Json<ModelToggleOutcome>> {
    let provider = parse_provider(&provider)?;
    let outcome = vault(pool, probe)
        .toggle_model(user_id, provider, &model)
        .await?;
    Ok(Json(outcome))
}

async fn delete_key(
    Extension(pool): Extension<PgPool>,
    Extension(probe): Extension<Arc<dyn ProviderProbe>>,
    AuthUser { user_id }: AuthUser,
    Path(provider): Path<String>,
) -> AppResult<StatusCode> {
    let provider = parse_provider(&provider)?;
    vault(pool, probe).delete_key(user_id, provider).await?;
    Ok(StatusCode::NO_CONTENT)
}
