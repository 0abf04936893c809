pub mod config;
pub mod credentials;
pub mod credentials_api;
pub mod error;
pub mod extractor;
pub mod routes;
