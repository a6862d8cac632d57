//! Hospital API - serviço HTTP do sistema hospitalar
//!
//! Rotas sob `/api/v1`: usuários, consultas, mensagens e painel administrativo.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod images;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use state::AppState;

/// Metadados de compilação gerados pelo `built`
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Limite do corpo das requisições (uploads de avatar)
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "service": built_info::PKG_NAME,
        "version": built_info::PKG_VERSION,
    }))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Origem CORS ignorada: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

/// Monta o roteador completo do serviço
pub fn app(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .nest("/api/v1/user", routes::users::router())
        .nest("/api/v1/appointment", routes::appointments::router())
        .nest("/api/v1/message", routes::messages::router())
        .nest("/api/v1/dashboard", routes::dashboard::router())
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
