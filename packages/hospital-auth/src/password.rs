//! Hash de senhas com Argon2id

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::warn;

use crate::error::AuthError;

/// Tamanho mínimo aceito para novas senhas
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Gera o hash PHC de uma senha com salt aleatório
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::HashingFailed(e.to_string()))
}

/// Verifica uma senha contra o hash armazenado.
/// Um hash corrompido é tratado como senha incorreta.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Hash de senha armazenado inválido: {}", e);
            false
        }
    }
}
