//! Caixa de mensagens do formulário público de contato

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use hospital_db::models::{MessageChanges, NewMessage};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

use crate::auth::{AdminRole, Authenticated};
use crate::error::{ApiError, ApiResult};
use crate::extract::{blank_as_none, parse_id, ValidJson};
use crate::state::AppState;

const NOT_FOUND: &str = "Mensagem não encontrada!";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send", post(send_message))
        .route("/getall", get(list_messages))
        .route(
            "/:id",
            get(get_message).put(update_message).delete(delete_message),
        )
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Preencha o formulário completo!"))]
    first_name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Preencha o formulário completo!"))]
    last_name: String,
    #[serde(default)]
    #[validate(
        length(min = 1, message = "Preencha o formulário completo!"),
        email(message = "Forneça um e-mail válido!")
    )]
    email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Preencha o formulário completo!"))]
    phone: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Preencha o formulário completo!"))]
    message: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessageRequest {
    #[serde(default, deserialize_with = "blank_as_none")]
    first_name: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    last_name: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(email(message = "Forneça um e-mail válido!"))]
    email: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    phone: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    message: Option<String>,
}

async fn send_message(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<NewMessageRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let message = state
        .store
        .create_message(NewMessage {
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            phone: request.phone,
            message: request.message,
        })
        .await?;
    info!("Mensagem {} recebida", message.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Mensagem enviada com sucesso!",
        })),
    ))
}

async fn list_messages(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
) -> ApiResult<Json<Value>> {
    let messages = state.store.list_messages().await?;
    Ok(Json(json!({ "success": true, "messages": messages })))
}

async fn get_message(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, NOT_FOUND)?;
    let message = state
        .store
        .find_message(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;
    Ok(Json(json!({ "success": true, "data": message })))
}

async fn update_message(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
    Path(id): Path<String>,
    ValidJson(request): ValidJson<UpdateMessageRequest>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, NOT_FOUND)?;
    let changes = MessageChanges {
        first_name: request.first_name,
        last_name: request.last_name,
        email: request.email,
        phone: request.phone,
        message: request.message,
    };
    let message = state
        .store
        .update_message(id, &changes)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Mensagem atualizada!",
        "data": message,
    })))
}

async fn delete_message(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, NOT_FOUND)?;
    if !state.store.delete_message(id).await? {
        return Err(ApiError::NotFound(NOT_FOUND.to_string()));
    }
    info!("Mensagem {} removida", id);

    Ok(Json(json!({
        "success": true,
        "message": "Mensagem removida!",
    })))
}
