use anyhow::{Context, Result};
use chrono::Duration;
use hospital_api::config::AppConfig;
use hospital_api::images::CloudinaryClient;
use hospital_api::{app, built_info, AppState};
use hospital_auth::TokenService;
use hospital_db::Store;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    info!(
        "Iniciando {} v{} ({})",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        built_info::PROFILE
    );

    let config = AppConfig::from_env().context("Configuração inválida")?;

    let store = Store::open(&config.db)
        .await
        .context("Falha ao abrir o banco de dados")?;
    let tokens = TokenService::new(&config.jwt_secret, Duration::hours(config.jwt_expires_hours));
    let images = Arc::new(CloudinaryClient::new(config.images.clone()));
    let state = AppState::new(store, tokens, images, config.cookies.clone());

    let router = app(state, &config.allowed_origins);

    info!("Servidor ouvindo em {}", config.listen_addr);
    axum::Server::bind(&config.listen_addr)
        .serve(router.into_make_service())
        .await
        .context("Falha no servidor HTTP")?;

    Ok(())
}
