//! Configuração do serviço lida do ambiente

use anyhow::{ensure, Context, Result};
use hospital_db::DbConfig;
use std::env;
use std::net::SocketAddr;

/// Configuração do serviço de imagens (API compatível com Cloudinary)
#[derive(Debug, Clone)]
pub struct ImageHostConfig {
    pub api_base: String,
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Atributos dos cookies de sessão
#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Validade do cookie em dias
    pub expire_days: i64,
    /// `Secure` + `SameSite=None` quando verdadeiro; `SameSite=Lax` caso contrário
    pub production: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub db: DbConfig,
    pub jwt_secret: String,
    pub jwt_expires_hours: i64,
    pub cookies: CookieConfig,
    /// Origens autorizadas (site do paciente e painel)
    pub allowed_origins: Vec<String>,
    pub images: ImageHostConfig,
}

/// Validade máxima da sessão: um ano
const MAX_JWT_EXPIRES_HOURS: i64 = 24 * 365;

fn required(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("Variável de ambiente obrigatória ausente: {}", name))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("Valor inválido para {}: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

fn session_hours(hours: i64) -> Result<i64> {
    ensure!(
        (1..=MAX_JWT_EXPIRES_HOURS).contains(&hours),
        "JWT_EXPIRES_HOURS deve estar entre 1 e {}: {}",
        MAX_JWT_EXPIRES_HOURS,
        hours
    );
    Ok(hours)
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let port: u16 = parsed("PORT", 4000)?;

        let db = DbConfig {
            db_path: optional("DATABASE_PATH", &DbConfig::default().db_path),
            key_phrase: required("DB_KEY_PHRASE")?,
            max_connections: parsed("DB_MAX_CONNECTIONS", 5)?,
            log_statements: parsed("DB_LOG_STATEMENTS", false)?,
        };

        let allowed_origins = ["FRONTEND_URL", "DASHBOARD_URL"]
            .iter()
            .filter_map(|name| env::var(name).ok())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            db,
            jwt_secret: required("JWT_SECRET_KEY")?,
            jwt_expires_hours: session_hours(parsed("JWT_EXPIRES_HOURS", 24 * 7)?)?,
            cookies: CookieConfig {
                expire_days: parsed("COOKIE_EXPIRE_DAYS", 7)?,
                production: optional("APP_ENV", "development") == "production",
            },
            allowed_origins,
            images: ImageHostConfig {
                api_base: optional("CLOUDINARY_API_BASE", "https://api.cloudinary.com/v1_1"),
                cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
                api_key: required("CLOUDINARY_API_KEY")?,
                api_secret: required("CLOUDINARY_API_SECRET")?,
            },
        })
    }
}
