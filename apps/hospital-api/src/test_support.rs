//! Utilitários compartilhados pelos testes do serviço

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, NaiveDate};
use hospital_auth::{hash_password, Role, TokenService};
use hospital_db::models::{Gender, ImageRef, NewUser, User};
use hospital_db::{DbConfig, Store};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::auth::cookie_name;
use crate::config::CookieConfig;
use crate::images::{ImageError, ImageHost, ImageUpload};
use crate::state::AppState;

pub const SEED_PASSWORD: &str = "senha-segura";
const BOUNDARY: &str = "hospital-test-boundary";

/// Serviço de imagens que aceita tudo sem rede
pub struct StubImages;

#[async_trait]
impl ImageHost for StubImages {
    async fn upload(&self, image: &ImageUpload) -> Result<ImageRef, ImageError> {
        Ok(ImageRef {
            public_id: format!("stub/{}", image.file_name),
            url: format!("https://images.test/stub/{}", image.file_name),
        })
    }

    async fn destroy(&self, _public_id: &str) -> Result<(), ImageError> {
        Ok(())
    }
}

pub async fn test_state(images: Arc<dyn ImageHost>) -> (AppState, TempDir) {
    let temp_dir = tempfile::tempdir().expect("diretório temporário");
    let config = DbConfig {
        db_path: temp_dir.path().join("api.db").to_string_lossy().to_string(),
        key_phrase: "test_password".to_string(),
        max_connections: 2,
        log_statements: false,
    };
    let store = Store::open(&config).await.expect("banco de teste");
    let state = AppState::new(
        store,
        TokenService::new("test-secret", Duration::hours(1)),
        images,
        CookieConfig {
            expire_days: 7,
            production: false,
        },
    );
    (state, temp_dir)
}

pub async fn seed_user(
    state: &AppState,
    role: Role,
    first_name: &str,
    last_name: &str,
    email: &str,
    department: Option<&str>,
) -> User {
    state
        .store
        .create_user(NewUser {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            phone: "11999990000".to_string(),
            nic: "1234567890123".to_string(),
            dob: NaiveDate::from_ymd_opt(1985, 3, 2).unwrap(),
            gender: Gender::Female,
            password_hash: hash_password(SEED_PASSWORD).unwrap(),
            role,
            doctor_department: department.map(str::to_string),
            doc_avatar: None,
        })
        .await
        .unwrap()
}

/// Valor do cabeçalho `Cookie` com uma sessão válida para o usuário
pub fn session_for(state: &AppState, user: &User) -> String {
    let token = state.tokens.sign(user.id, user.role).unwrap();
    format!("{}={}", cookie_name(user.role), token)
}

pub fn request(method: Method, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: Method, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Arquivo anexado a um formulário multipart de teste
pub struct TestFile<'a> {
    pub field: &'a str,
    pub file_name: &'a str,
    pub content_type: &'a str,
}

pub fn multipart_request(
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    fields: &[(&str, &str)],
    file: Option<TestFile<'_>>,
) -> Request<Body> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            BOUNDARY, name, value
        ));
    }
    if let Some(file) = file {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\nconteudo\r\n",
            BOUNDARY, file.field, file.file_name, file.content_type
        ));
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));

    let mut builder = Request::builder().method(method).uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

/// Executa a requisição e devolve o status, os `Set-Cookie` e o corpo JSON
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<String>, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let cookies = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, cookies, body)
}

pub fn router(state: &AppState) -> Router {
    crate::app(state.clone(), &[])
}
