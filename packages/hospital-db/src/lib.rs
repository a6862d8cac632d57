//! Hospital DB - Biblioteca compartilhada de persistência do sistema hospitalar
//!
//! Esta biblioteca fornece:
//! - Modelos de dados compartilhados (usuários, consultas, mensagens)
//! - Migrações automáticas do banco de dados
//! - Criptografia dos campos sensíveis
//! - Operações de repositório sobre um pool SQLite

use anyhow::{bail, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub mod appointments;
pub mod crypto;
pub mod error;
pub mod keyring;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod stats;
pub mod users;

pub use error::DbError;
pub use sqlx::SqlitePool;

/// Configuração da conexão com o banco de dados
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Caminho para o arquivo SQLite
    pub db_path: String,
    /// Frase secreta que protege a chave de dados.
    /// Será convertida em chave derivada usando Argon2id
    pub key_phrase: String,
    /// Número máximo de conexões no pool
    pub max_connections: u32,
    /// Registra cada instrução SQL executada
    pub log_statements: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            db_path: "data/hospital.db".to_string(),
            key_phrase: "".to_string(), // Vazio por segurança, deve ser definido explicitamente
            max_connections: 5,
            log_statements: false,
        }
    }
}

/// Inicializa o pool de conexões SQLite e aplica as migrações
pub async fn init_db_pool(config: &DbConfig) -> Result<SqlitePool> {
    let db_path = Path::new(&config.db_path);

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .context("Falha ao criar diretório para banco de dados")?;
        }
    }

    let mut connection_options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .foreign_keys(true)
        .pragma("synchronous", "NORMAL");

    if !config.log_statements {
        connection_options = connection_options.disable_statement_logging();
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(connection_options)
        .await
        .context("Falha ao conectar ao banco de dados SQLite")?;

    migrations::run_migrations(&pool)
        .await
        .context("Falha ao aplicar migrações")?;

    info!("Banco de dados inicializado com sucesso: {}", config.db_path);
    Ok(pool)
}

/// Ponto de acesso aos dados: pool de conexões mais a chave de dados
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    key: Arc<crypto::EncryptionKey>,
}

impl Store {
    /// Abre o banco, aplica migrações e carrega a chave de dados
    pub async fn open(config: &DbConfig) -> Result<Self> {
        if config.key_phrase.is_empty() {
            bail!("A frase secreta do banco de dados deve ser definida");
        }

        let pool = init_db_pool(config).await?;
        let key = keyring::load_or_create_data_key(&pool, &config.key_phrase)
            .await
            .context("Falha ao carregar a chave de dados")?;

        Ok(Self::new(pool, key))
    }

    pub fn new(pool: SqlitePool, key: crypto::EncryptionKey) -> Self {
        Self {
            pool,
            key: Arc::new(key),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) fn seal(&self, text: &str) -> Result<crypto::EncryptedData, DbError> {
        Ok(crypto::encrypt_str(text, &self.key)?)
    }

    pub(crate) fn open_sealed(&self, ciphertext: Vec<u8>, nonce: Vec<u8>) -> Result<String, DbError> {
        Ok(crypto::decrypt_str(
            &crypto::EncryptedData { ciphertext, nonce },
            &self.key,
        )?)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_db_connection() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test.db");

        let config = DbConfig {
            db_path: db_path.to_string_lossy().to_string(),
            key_phrase: "test_password".to_string(),
            max_connections: 2,
            log_statements: true,
        };

        let pool = init_db_pool(&config).await?;

        let result: (i64,) = sqlx::query_as("SELECT 1").fetch_one(&pool).await?;
        assert_eq!(result.0, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_reopen_requires_same_key_phrase() -> Result<()> {
        let temp_dir = tempdir()?;
        let mut config = DbConfig {
            db_path: temp_dir.path().join("keys.db").to_string_lossy().to_string(),
            key_phrase: "frase-original".to_string(),
            max_connections: 1,
            log_statements: false,
        };

        let store = Store::open(&config).await?;
        let sealed = store.seal("123")?;
        store.pool().close().await;

        let reopened = Store::open(&config).await?;
        assert_eq!(reopened.open_sealed(sealed.ciphertext, sealed.nonce)?, "123");
        reopened.pool().close().await;

        config.key_phrase = "outra-frase".to_string();
        assert!(Store::open(&config).await.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_empty_key_phrase_is_rejected() {
        let config = DbConfig::default();
        assert!(Store::open(&config).await.is_err());
    }
}
