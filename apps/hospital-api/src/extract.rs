//! Extratores de requisição: JSON validado e formulários com arquivos

use axum::async_trait;
use axum::body::Body;
use axum::extract::{FromRequest, Multipart};
use axum::http::{header::CONTENT_TYPE, Request};
use axum::Json;
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::images::ImageUpload;

/// Corpo JSON desserializado e validado
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S, Body> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Campos de formulário mais os arquivos enviados.
/// Aceita `multipart/form-data` ou, sem arquivos, um corpo JSON.
pub struct FormWithFiles<T> {
    pub fields: T,
    files: HashMap<String, ImageUpload>,
}

impl<T> FormWithFiles<T> {
    /// Retira o arquivo enviado no campo informado
    pub fn take_file(&mut self, field: &str) -> Option<ImageUpload> {
        self.files.remove(field)
    }
}

fn is_multipart(req: &Request<Body>) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

#[async_trait]
impl<S, T> FromRequest<S, Body> for FormWithFiles<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let ValidJson(fields) = ValidJson::<T>::from_request(req, state).await?;
            return Ok(Self {
                fields,
                files: HashMap::new(),
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;

        let mut values = Map::new();
        let mut files = HashMap::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            match file_name {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::Validation(e.body_text()))?;
                    files.insert(
                        name,
                        ImageUpload {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ApiError::Validation(e.body_text()))?;
                    values.insert(name, Value::String(text));
                }
            }
        }

        let fields: T = serde_json::from_value(Value::Object(values))
            .map_err(|e| ApiError::Validation(format!("Dados inválidos: {}", e)))?;
        fields.validate()?;

        Ok(Self { fields, files })
    }
}

/// Trata ausência, `null` e texto em branco como `None`; o restante é convertido com `FromStr`
pub fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        Some(text) => text.parse().map(Some).map_err(de::Error::custom),
        None => Ok(None),
    }
}

/// Converte o id do caminho; um id malformado não corresponde a nenhum registro
pub fn parse_id(raw: &str, not_found: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(not_found.to_string()))
}

/// Exige um campo já validado como presente
pub fn present<T>(value: Option<T>) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::Validation(crate::error::FILL_FULL_FORM.to_string()))
}
