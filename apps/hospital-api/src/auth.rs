//! Controle de acesso
//!
//! Cada papel tem seu próprio cookie de sessão. Uma única verificação
//! parametrizada (`require_role`) valida o token, confere o papel declarado
//! no token e o papel armazenado do usuário, e entrega a identidade ao handler
//! por meio do extrator `Authenticated<R>`.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use hospital_auth::Role;
use hospital_db::models::User;
use std::marker::PhantomData;
use tracing::warn;

use crate::config::CookieConfig;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn cookie_name(role: Role) -> &'static str {
    match role {
        Role::Patient => "patientToken",
        Role::Doctor => "doctorToken",
        Role::Admin => "adminToken",
    }
}

/// Nome do papel exibido nas mensagens
pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::Patient => "Paciente",
        Role::Doctor => "Médico",
        Role::Admin => "Administrador",
    }
}

/// Papel exigido por uma rota, resolvido em tempo de compilação
pub trait RoleGuard: Send + Sync + 'static {
    const ROLE: Role;
}

pub struct PatientRole;
pub struct DoctorRole;
pub struct AdminRole;

impl RoleGuard for PatientRole {
    const ROLE: Role = Role::Patient;
}

impl RoleGuard for DoctorRole {
    const ROLE: Role = Role::Doctor;
}

impl RoleGuard for AdminRole {
    const ROLE: Role = Role::Admin;
}

/// Identidade verificada de um usuário com o papel `R`
pub struct Authenticated<R: RoleGuard> {
    pub user: User,
    _role: PhantomData<fn() -> R>,
}

impl<R: RoleGuard> Authenticated<R> {
    pub fn new(user: User) -> Self {
        Self {
            user,
            _role: PhantomData,
        }
    }
}

/// Resolve a identidade do portador do cookie do papel informado
pub async fn require_role(state: &AppState, jar: &CookieJar, role: Role) -> ApiResult<User> {
    let token = jar
        .get(cookie_name(role))
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::Authentication(format!("{} não autenticado!", role_label(role))))?;

    let claims = state.tokens.verify(&token)?;
    if claims.role != role {
        warn!("Token com papel {} apresentado como {}", claims.role, role);
        return Err(ApiError::Authentication(format!(
            "{} não autorizado para este recurso!",
            role_label(claims.role)
        )));
    }

    let user = state
        .store
        .find_user(claims.sub)
        .await?
        .ok_or_else(|| ApiError::Authentication("Usuário não encontrado!".to_string()))?;

    if user.role != role {
        return Err(ApiError::Authentication(format!(
            "{} não autorizado para este recurso!",
            role_label(user.role)
        )));
    }

    Ok(user)
}

#[async_trait]
impl<R: RoleGuard> FromRequestParts<AppState> for Authenticated<R> {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let user = require_role(state, &jar, R::ROLE).await?;
        Ok(Self::new(user))
    }
}

/// Cookie de sessão para o papel informado
pub fn session_cookie(config: &CookieConfig, role: Role, token: String) -> Cookie<'static> {
    let same_site = if config.production {
        SameSite::None
    } else {
        SameSite::Lax
    };

    Cookie::build(cookie_name(role), token)
        .path("/")
        .http_only(true)
        .secure(config.production)
        .same_site(same_site)
        .max_age(time::Duration::days(config.expire_days))
        .finish()
}

/// Cookie que apaga a sessão do papel no navegador
pub fn removal_cookie(role: Role) -> Cookie<'static> {
    let mut cookie = Cookie::named(cookie_name(role));
    cookie.set_path("/");
    cookie
}
