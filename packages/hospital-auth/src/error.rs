//! Erros de autenticação

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token inválido: {0}")]
    InvalidToken(String),

    #[error("Token expirado")]
    ExpiredToken,

    #[error("Falha ao gerar hash da senha: {0}")]
    HashingFailed(String),

    #[error("Falha ao assinar token: {0}")]
    SigningFailed(String),
}
