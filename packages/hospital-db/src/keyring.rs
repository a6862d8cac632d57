//! Gestão da chave de dados usada na criptografia de campos sensíveis
//!
//! A chave de dados é gerada uma única vez, embrulhada com a frase secreta
//! configurada e persistida na tabela `master_keys`.

use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tracing::info;

use crate::crypto::{self, EncryptedData, EncryptionKey, WrappedKey};
use crate::error::DbError;

/// Versão atual do formato da chave
const KEY_VERSION: i64 = 1;

#[derive(FromRow)]
struct MasterKeyRow {
    wrapped_key_ciphertext: Vec<u8>,
    wrapped_key_nonce: Vec<u8>,
    kdf_salt: Vec<u8>,
    key_version: i64,
}

/// Carrega a chave de dados ativa, criando-a na primeira execução
pub async fn load_or_create_data_key(
    pool: &SqlitePool,
    key_phrase: &str,
) -> Result<EncryptionKey, DbError> {
    let row: Option<MasterKeyRow> = sqlx::query_as(
        "SELECT wrapped_key_ciphertext, wrapped_key_nonce, kdf_salt, key_version
         FROM master_keys WHERE active = 1 ORDER BY id DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    if let Some(row) = row {
        let wrapped = WrappedKey {
            data: EncryptedData {
                ciphertext: row.wrapped_key_ciphertext,
                nonce: row.wrapped_key_nonce,
            },
            salt: row.kdf_salt,
        };
        let key = crypto::unwrap_key(&wrapped, key_phrase)?;
        info!("Chave de dados carregada (versão {})", row.key_version);
        return Ok(key);
    }

    let key = EncryptionKey::generate();
    let wrapped = crypto::wrap_key(&key, key_phrase)?;

    sqlx::query(
        "INSERT INTO master_keys
         (created_at, active, wrapped_key_ciphertext, wrapped_key_nonce, kdf_salt, key_version)
         VALUES (?, 1, ?, ?, ?, ?)",
    )
    .bind(Utc::now())
    .bind(&wrapped.data.ciphertext)
    .bind(&wrapped.data.nonce)
    .bind(&wrapped.salt)
    .bind(KEY_VERSION)
    .execute(pool)
    .await?;

    info!("Nova chave de dados gerada e armazenada");
    Ok(key)
}
