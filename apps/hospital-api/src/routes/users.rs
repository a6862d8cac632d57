//! Diretório de usuários: cadastro, login, perfil e administração de pacientes e médicos

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use chrono::NaiveDate;
use hospital_auth::{hash_password, verify_password, Role, MIN_PASSWORD_LENGTH};
use hospital_db::models::{Gender, ImageRef, NewUser, User, UserChanges};
use serde::Deserialize;
use serde_json::{json, Value};
use std::borrow::Cow;
use tracing::{info, warn};
use validator::{Validate, ValidationError};

use crate::auth::{
    removal_cookie, role_label, session_cookie, AdminRole, Authenticated, DoctorRole, PatientRole,
    RoleGuard,
};
use crate::error::{ApiError, ApiResult, FILL_FULL_FORM};
use crate::extract::{blank_as_none, parse_id, present, FormWithFiles, ValidJson};
use crate::images::ImageUpload;
use crate::state::AppState;

const SHORT_PASSWORD: &str = "A senha deve ter pelo menos 8 caracteres!";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patient/register", post(register_patient))
        .route("/login", post(login))
        .route("/doctors", get(list_doctors))
        .route("/patient/me", get(me::<PatientRole>))
        .route("/doctor/me", get(me::<DoctorRole>))
        .route("/admin/me", get(me::<AdminRole>))
        .route("/patient/logout", get(logout::<PatientRole>))
        .route("/doctor/logout", get(logout::<DoctorRole>))
        .route("/admin/logout", get(logout::<AdminRole>))
        .route("/patient/profile", put(update_profile::<PatientRole>))
        .route("/doctor/profile", put(update_profile::<DoctorRole>))
        .route("/admin/profile", put(update_profile::<AdminRole>))
        .route("/patient/password", put(change_password::<PatientRole>))
        .route("/doctor/password", put(change_password::<DoctorRole>))
        .route("/admin/password", put(change_password::<AdminRole>))
        .route("/patients", get(list_patients))
        .route(
            "/patient/:id",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
        .route("/doctor/addnew", post(add_doctor))
        .route(
            "/doctor/:id",
            get(get_doctor).put(update_doctor).delete(delete_doctor),
        )
        .route("/admin/addnew", post(add_admin))
}

fn new_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some(Cow::Borrowed(FILL_FULL_FORM));
        return Err(error);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        let mut error = ValidationError::new("length");
        error.message = Some(Cow::Borrowed(SHORT_PASSWORD));
        return Err(error);
    }
    Ok(())
}

/// Campos de cadastro de paciente, médico ou administrador
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewUserRequest {
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
    nic: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(required(message = "Preencha o formulário completo!"))]
    dob: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(required(message = "Preencha o formulário completo!"))]
    gender: Option<Gender>,
    #[serde(default)]
    #[validate(custom = "new_password")]
    password: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    doctor_department: Option<String>,
}

impl NewUserRequest {
    fn into_new_user(self, role: Role) -> ApiResult<NewUser> {
        let doctor_department = match role {
            Role::Doctor => Some(present(self.doctor_department)?),
            _ => None,
        };

        Ok(NewUser {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            nic: self.nic,
            dob: present(self.dob)?,
            gender: present(self.gender)?,
            password_hash: hash_password(&self.password)?,
            role,
            doctor_department,
            doc_avatar: None,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Preencha o formulário completo!"))]
    email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Preencha o formulário completo!"))]
    password: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Preencha o formulário completo!"))]
    confirm_password: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(required(message = "Preencha o formulário completo!"))]
    role: Option<Role>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Preencha o formulário completo!"))]
    current_password: String,
    #[serde(default)]
    #[validate(custom = "new_password")]
    new_password: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Preencha o formulário completo!"))]
    confirm_password: String,
}

/// Alterações de perfil; campos ausentes ou em branco permanecem como estão.
/// Papel e senha não são aceitos aqui.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
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
    nic: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    dob: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    gender: Option<Gender>,
    #[serde(default, deserialize_with = "blank_as_none")]
    doctor_department: Option<String>,
}

impl UpdateUserRequest {
    fn into_changes(self, role: Role) -> UserChanges {
        UserChanges {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            nic: self.nic,
            dob: self.dob,
            gender: self.gender,
            doctor_department: self.doctor_department.filter(|_| role == Role::Doctor),
            ..UserChanges::default()
        }
    }
}

fn not_found(role: Role) -> ApiError {
    ApiError::NotFound(format!("{} não encontrado!", role_label(role)))
}

async fn ensure_email_available(state: &AppState, email: &str, role: Role) -> ApiResult<()> {
    if state.store.email_exists(email).await? {
        return Err(ApiError::Conflict(format!(
            "{} com este e-mail já cadastrado!",
            role_label(role)
        )));
    }
    Ok(())
}

/// Um e-mail novo não pode pertencer a outro usuário
async fn ensure_email_change_allowed(
    state: &AppState,
    user: &User,
    changes: &UserChanges,
) -> ApiResult<()> {
    match &changes.email {
        Some(email) if *email != user.email && state.store.email_exists(email).await? => Err(
            ApiError::Conflict("E-mail já cadastrado para outro usuário!".to_string()),
        ),
        _ => Ok(()),
    }
}

fn ensure_image_type(image: &ImageUpload) -> ApiResult<()> {
    if image.is_allowed_type() {
        Ok(())
    } else {
        Err(ApiError::Validation(
            "Formato de arquivo não suportado! Use PNG, JPEG ou WEBP.".to_string(),
        ))
    }
}

/// Destrói as imagens do usuário no serviço. Se uma remoção falha depois de outra ter
/// funcionado, as referências já destruídas saem do registro antes de o erro subir.
async fn destroy_images(state: &AppState, user: &User) -> ApiResult<()> {
    let mut destroyed: Vec<String> = Vec::new();

    for public_id in user.image_ids() {
        if let Err(err) = state.images.destroy(&public_id).await {
            if !destroyed.is_empty() {
                warn!("Imagem {} do usuário {} não foi removida: {}", public_id, user.id, err);
                let gone = |image: &Option<ImageRef>| {
                    image
                        .as_ref()
                        .map_or(false, |image| destroyed.contains(&image.public_id))
                };
                let cleared = UserChanges {
                    avatar: gone(&user.avatar).then_some(None),
                    doc_avatar: gone(&user.doc_avatar).then_some(None),
                    ..UserChanges::default()
                };
                state.store.update_user(user.id, &cleared).await?;
            }
            return Err(err.into());
        }
        destroyed.push(public_id);
    }
    Ok(())
}

/// Substitui a imagem do usuário: as atuais são removidas do serviço antes do envio da nova.
/// Médicos recebem a mesma imagem em `avatar` e `docAvatar`.
async fn replace_avatar(
    state: &AppState,
    user: &User,
    image: &ImageUpload,
    changes: &mut UserChanges,
) -> ApiResult<()> {
    ensure_image_type(image)?;
    destroy_images(state, user).await?;

    match state.images.upload(image).await {
        Ok(uploaded) => {
            if user.role == Role::Doctor {
                changes.doc_avatar = Some(Some(uploaded.clone()));
            }
            changes.avatar = Some(Some(uploaded));
            Ok(())
        }
        Err(err) => {
            // A imagem antiga já foi removida; o registro não pode continuar apontando para ela
            warn!("Envio de imagem do usuário {} falhou: {}", user.id, err);
            let cleared = UserChanges {
                avatar: Some(None),
                doc_avatar: Some(None),
                ..UserChanges::default()
            };
            state.store.update_user(user.id, &cleared).await?;
            Err(err.into())
        }
    }
}

/// Remove o usuário; as imagens são destruídas antes e uma falha do serviço aborta a remoção
async fn remove_user(state: &AppState, raw_id: &str, role: Role) -> ApiResult<()> {
    let user = find_with_role(state, raw_id, role).await?;
    destroy_images(state, &user).await?;

    if !state.store.delete_user(user.id).await? {
        return Err(not_found(role));
    }
    info!("{} {} removido", role_label(role), user.id);
    Ok(())
}

async fn find_with_role(state: &AppState, raw_id: &str, role: Role) -> ApiResult<User> {
    let id = parse_id(raw_id, &format!("{} não encontrado!", role_label(role)))?;
    state
        .store
        .find_user_with_role(id, role)
        .await?
        .ok_or_else(|| not_found(role))
}

async fn register_patient(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidJson(request): ValidJson<NewUserRequest>,
) -> ApiResult<(StatusCode, CookieJar, Json<Value>)> {
    ensure_email_available(&state, &request.email, Role::Patient).await?;
    let user = state
        .store
        .create_user(request.into_new_user(Role::Patient)?)
        .await?;

    let token = state.tokens.sign(user.id, user.role)?;
    let jar = jar.add(session_cookie(&state.cookies, user.role, token.clone()));
    info!("Paciente {} cadastrado", user.id);

    Ok((
        StatusCode::CREATED,
        jar,
        Json(json!({
            "success": true,
            "message": "Paciente cadastrado com sucesso!",
            "user": user,
            "token": token,
        })),
    ))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidJson(request): ValidJson<LoginRequest>,
) -> ApiResult<(CookieJar, Json<Value>)> {
    if request.password != request.confirm_password {
        return Err(ApiError::Validation(
            "Senha e confirmação de senha não conferem!".to_string(),
        ));
    }
    let role = present(request.role)?;

    let invalid = || ApiError::Authentication("E-mail ou senha inválidos!".to_string());
    let user = state
        .store
        .find_user_by_email(&request.email)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&request.password, &user.password_hash) {
        return Err(invalid());
    }
    if user.role != role {
        warn!("Login de {} recusado para o papel {}", user.id, role);
        return Err(ApiError::Authentication(
            "Usuário não encontrado com este papel!".to_string(),
        ));
    }

    let token = state.tokens.sign(user.id, user.role)?;
    let jar = jar.add(session_cookie(&state.cookies, user.role, token.clone()));
    info!("{} {} autenticado", role_label(role), user.id);

    Ok((
        jar,
        Json(json!({
            "success": true,
            "message": "Login realizado com sucesso!",
            "user": user,
            "token": token,
        })),
    ))
}

async fn list_doctors(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let doctors = state.store.list_users_by_role(Role::Doctor).await?;
    Ok(Json(json!({ "success": true, "doctors": doctors })))
}

async fn me<R: RoleGuard>(auth: Authenticated<R>) -> Json<Value> {
    Json(json!({ "success": true, "user": auth.user }))
}

async fn logout<R: RoleGuard>(_auth: Authenticated<R>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    (
        jar.remove(removal_cookie(R::ROLE)),
        Json(json!({
            "success": true,
            "message": format!("{} desconectado com sucesso!", role_label(R::ROLE)),
        })),
    )
}

async fn update_profile<R: RoleGuard>(
    State(state): State<AppState>,
    auth: Authenticated<R>,
    mut form: FormWithFiles<UpdateUserRequest>,
) -> ApiResult<Json<Value>> {
    let user = auth.user;
    let image = form.take_file("avatar");
    let mut changes = form.fields.into_changes(user.role);

    ensure_email_change_allowed(&state, &user, &changes).await?;
    if let Some(image) = image {
        replace_avatar(&state, &user, &image, &mut changes).await?;
    }

    let updated = state
        .store
        .update_user(user.id, &changes)
        .await?
        .ok_or_else(|| not_found(user.role))?;

    Ok(Json(json!({
        "success": true,
        "message": "Perfil atualizado com sucesso!",
        "user": updated,
    })))
}

async fn change_password<R: RoleGuard>(
    State(state): State<AppState>,
    auth: Authenticated<R>,
    ValidJson(request): ValidJson<ChangePasswordRequest>,
) -> ApiResult<Json<Value>> {
    if request.new_password != request.confirm_password {
        return Err(ApiError::Validation(
            "Nova senha e confirmação não conferem!".to_string(),
        ));
    }
    if !verify_password(&request.current_password, &auth.user.password_hash) {
        return Err(ApiError::Validation("Senha atual incorreta!".to_string()));
    }

    let hash = hash_password(&request.new_password)?;
    if !state.store.set_password_hash(auth.user.id, &hash).await? {
        return Err(not_found(R::ROLE));
    }
    info!("Senha de {} alterada", auth.user.id);

    Ok(Json(json!({
        "success": true,
        "message": "Senha alterada com sucesso!",
    })))
}

async fn list_patients(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
) -> ApiResult<Json<Value>> {
    let patients = state.store.list_users_by_role(Role::Patient).await?;
    Ok(Json(json!({ "success": true, "patients": patients })))
}

async fn get_patient(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let patient = find_with_role(&state, &id, Role::Patient).await?;
    Ok(Json(json!({ "success": true, "patient": patient })))
}

async fn update_patient(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
    Path(id): Path<String>,
    ValidJson(request): ValidJson<UpdateUserRequest>,
) -> ApiResult<Json<Value>> {
    let patient = find_with_role(&state, &id, Role::Patient).await?;
    let changes = request.into_changes(Role::Patient);
    ensure_email_change_allowed(&state, &patient, &changes).await?;

    let updated = state
        .store
        .update_user(patient.id, &changes)
        .await?
        .ok_or_else(|| not_found(Role::Patient))?;

    Ok(Json(json!({
        "success": true,
        "message": "Paciente atualizado com sucesso!",
        "patient": updated,
    })))
}

async fn delete_patient(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    remove_user(&state, &id, Role::Patient).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Paciente removido com sucesso!",
    })))
}

async fn add_doctor(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
    mut form: FormWithFiles<NewUserRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let image = form
        .take_file("docAvatar")
        .ok_or_else(|| ApiError::Validation("Avatar do médico é obrigatório!".to_string()))?;
    ensure_image_type(&image)?;

    let request = form.fields;
    ensure_email_available(&state, &request.email, Role::Doctor).await?;
    let mut new_doctor = request.into_new_user(Role::Doctor)?;

    let uploaded = state.images.upload(&image).await?;
    new_doctor.doc_avatar = Some(uploaded.clone());

    let doctor = match state.store.create_user(new_doctor).await {
        Ok(doctor) => doctor,
        Err(err) => {
            if let Err(cleanup) = state.images.destroy(&uploaded.public_id).await {
                warn!("Imagem {} ficou órfã: {}", uploaded.public_id, cleanup);
            }
            return Err(err.into());
        }
    };
    info!("Médico {} cadastrado", doctor.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Novo médico cadastrado!",
            "doctor": doctor,
        })),
    ))
}

async fn get_doctor(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let doctor = find_with_role(&state, &id, Role::Doctor).await?;
    Ok(Json(json!({ "success": true, "doctor": doctor })))
}

async fn update_doctor(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
    Path(id): Path<String>,
    mut form: FormWithFiles<UpdateUserRequest>,
) -> ApiResult<Json<Value>> {
    let doctor = find_with_role(&state, &id, Role::Doctor).await?;
    let image = form.take_file("docAvatar");
    let mut changes = form.fields.into_changes(Role::Doctor);

    ensure_email_change_allowed(&state, &doctor, &changes).await?;
    if let Some(image) = image {
        replace_avatar(&state, &doctor, &image, &mut changes).await?;
    }

    let updated = state
        .store
        .update_user(doctor.id, &changes)
        .await?
        .ok_or_else(|| not_found(Role::Doctor))?;

    Ok(Json(json!({
        "success": true,
        "message": "Médico atualizado com sucesso!",
        "doctor": updated,
    })))
}

async fn delete_doctor(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    remove_user(&state, &id, Role::Doctor).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Médico removido com sucesso!",
    })))
}

async fn add_admin(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
    ValidJson(request): ValidJson<NewUserRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    ensure_email_available(&state, &request.email, Role::Admin).await?;
    let admin = state
        .store
        .create_user(request.into_new_user(Role::Admin)?)
        .await?;
    info!("Administrador {} cadastrado", admin.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Novo administrador cadastrado!",
            "admin": admin,
        })),
    ))
}
