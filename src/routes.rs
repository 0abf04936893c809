use axum::Router;

use crate::credentials_api;

pub fn api_routes() -> Router {
    Router::new().merge(credentials_api::routes())
}
