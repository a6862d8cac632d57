//! Erros da API e sua conversão para o envelope JSON `{success: false, message}`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hospital_auth::AuthError;
use hospital_db::DbError;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::images::ImageError;

pub const FILL_FULL_FORM: &str = "Preencha o formulário completo!";

#[derive(Error, Debug)]
pub enum ApiError {
    /// Campos ausentes ou malformados
    #[error("{0}")]
    Validation(String),

    /// Id inexistente ou com papel diferente do esperado
    #[error("{0}")]
    NotFound(String),

    /// E-mail repetido ou médico ambíguo
    #[error("{0}")]
    Conflict(String),

    /// Token ausente, inválido, expirado ou credenciais incorretas
    #[error("{0}")]
    Authentication(String),

    /// Autenticado, mas sem permissão sobre o recurso
    #[error("{0}")]
    Authorization(String),

    /// Falha do serviço de imagens
    #[error("{0}")]
    Upstream(String),

    #[error("Erro interno: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(detail) => {
                error!("Erro interno: {}", detail);
                "Erro interno do servidor".to_string()
            }
            other => other.to_string(),
        };

        (
            self.status(),
            Json(json!({ "success": false, "message": message })),
        )
            .into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::NotFound(msg) => ApiError::NotFound(msg),
            DbError::ConstraintViolation(_) => {
                ApiError::Conflict("Já existe um usuário com este e-mail!".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::ExpiredToken => {
                ApiError::Authentication("Sessão expirada, faça login novamente!".to_string())
            }
            AuthError::InvalidToken(_) => ApiError::Authentication("Token inválido!".to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ImageError> for ApiError {
    fn from(error: ImageError) -> Self {
        ApiError::Upstream(format!("Falha ao enviar imagem: {}", error))
    }
}

/// Resume os erros do validator em uma única mensagem estável:
/// campo obrigatório ausente tem precedência; depois, a primeira mensagem em ordem alfabética.
impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .values()
            .flat_map(|list| list.iter())
            .map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| FILL_FULL_FORM.to_string())
            })
            .collect();

        if messages.iter().any(|m| m == FILL_FULL_FORM) {
            return ApiError::Validation(FILL_FULL_FORM.to_string());
        }
        messages.sort();
        ApiError::Validation(
            messages
                .into_iter()
                .next()
                .unwrap_or_else(|| FILL_FULL_FORM.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "Preencha o formulário completo!"))]
        name: String,
        #[validate(email(message = "Forneça um e-mail válido!"))]
        email: String,
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Authentication("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Authorization("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Upstream("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_missing_field_takes_precedence() {
        let sample = Sample {
            name: String::new(),
            email: "invalido".into(),
        };
        let err = ApiError::from(sample.validate().unwrap_err());
        assert!(matches!(err, ApiError::Validation(m) if m == FILL_FULL_FORM));
    }

    #[test]
    fn test_format_error_message() {
        let sample = Sample {
            name: "Ana".into(),
            email: "invalido".into(),
        };
        let err = ApiError::from(sample.validate().unwrap_err());
        assert!(matches!(err, ApiError::Validation(m) if m == "Forneça um e-mail válido!"));
    }

    #[test]
    fn test_constraint_violation_is_conflict() {
        let err = ApiError::from(DbError::ConstraintViolation("UNIQUE".into()));
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn test_internal_detail_is_not_exposed() {
        let response = ApiError::Internal("segredo do banco".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
