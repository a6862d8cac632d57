//! Tokens de sessão assinados (JWT HS256)
//!
//! O token carrega o id do usuário e o papel com que ele se autenticou.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;
use hospital_db::models::Role;

/// Conteúdo do token de sessão
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Id do usuário
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Emite e verifica tokens com um segredo compartilhado
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn sign(&self, user_id: Uuid, role: Role) -> Result<String, AuthError> {
        let now = Utc::now();
        let expires = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::SigningFailed("validade do token fora do intervalo".to_string()))?;
        let claims = Claims {
            sub: user_id,
            role,
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::SigningFailed(e.to_string()))
    }

    /// Verifica assinatura e expiração
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }
}
