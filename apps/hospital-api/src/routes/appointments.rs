//! Livro de consultas

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use hospital_auth::Role;
use hospital_db::models::{
    AppointmentChanges, AppointmentStatus, DoctorSnapshot, Gender, NewAppointment, User,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use validator::Validate;

use crate::auth::{AdminRole, Authenticated, DoctorRole, PatientRole};
use crate::error::{ApiError, ApiResult};
use crate::extract::{blank_as_none, parse_id, present, ValidJson};
use crate::state::AppState;

const NOT_FOUND: &str = "Consulta não encontrada!";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post", post(post_appointment))
        .route("/getall", get(list_appointments))
        .route("/patient/myappointments", get(patient_appointments))
        .route("/doctor/myappointments", get(doctor_appointments))
        .route("/update/:id", put(update_appointment))
        .route("/doctor/update/:id", put(update_status_as_doctor))
        .route("/delete/:id", delete(delete_appointment))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointmentRequest {
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
    #[serde(rename = "appointment_date", default, deserialize_with = "blank_as_none")]
    #[validate(required(message = "Preencha o formulário completo!"))]
    appointment_date: Option<NaiveDate>,
    #[serde(default)]
    #[validate(length(min = 1, message = "Preencha o formulário completo!"))]
    department: String,
    #[serde(rename = "doctor_firstName", default)]
    #[validate(length(min = 1, message = "Preencha o formulário completo!"))]
    doctor_first_name: String,
    #[serde(rename = "doctor_lastName", default)]
    #[validate(length(min = 1, message = "Preencha o formulário completo!"))]
    doctor_last_name: String,
    #[serde(default)]
    has_visited: bool,
    #[serde(default)]
    #[validate(length(min = 1, message = "Preencha o formulário completo!"))]
    address: String,
}

/// Campos editáveis pela administração. Médico e paciente da consulta não mudam.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
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
    #[serde(rename = "appointment_date", default, deserialize_with = "blank_as_none")]
    appointment_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    department: Option<String>,
    #[serde(default)]
    has_visited: Option<bool>,
    #[serde(default, deserialize_with = "blank_as_none")]
    address: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    status: Option<AppointmentStatus>,
}

impl From<UpdateAppointmentRequest> for AppointmentChanges {
    fn from(request: UpdateAppointmentRequest) -> Self {
        AppointmentChanges {
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            phone: request.phone,
            nic: request.nic,
            dob: request.dob,
            gender: request.gender,
            appointment_date: request.appointment_date,
            department: request.department,
            has_visited: request.has_visited,
            address: request.address,
            status: request.status,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(required(message = "Preencha o formulário completo!"))]
    status: Option<AppointmentStatus>,
}

/// Localiza o único médico com o nome e o departamento informados
async fn resolve_doctor(
    state: &AppState,
    first_name: &str,
    last_name: &str,
    department: &str,
) -> ApiResult<User> {
    let mut doctors = state
        .store
        .find_doctors(first_name, last_name, department)
        .await?;

    match doctors.len() {
        0 => Err(ApiError::NotFound("Médico não encontrado!".to_string())),
        1 => Ok(doctors.remove(0)),
        n => {
            warn!(
                "{} médicos chamados {} {} em {}",
                n, first_name, last_name, department
            );
            Err(ApiError::Conflict(
                "Conflito de médicos! Entre em contato por e-mail ou telefone.".to_string(),
            ))
        }
    }
}

async fn post_appointment(
    State(state): State<AppState>,
    auth: Authenticated<PatientRole>,
    ValidJson(request): ValidJson<NewAppointmentRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let doctor = resolve_doctor(
        &state,
        &request.doctor_first_name,
        &request.doctor_last_name,
        &request.department,
    )
    .await?;

    let appointment = state
        .store
        .create_appointment(NewAppointment {
            first_name: request.first_name,
            last_name: request.last_name,
            email: request.email,
            phone: request.phone,
            nic: request.nic,
            dob: present(request.dob)?,
            gender: present(request.gender)?,
            appointment_date: present(request.appointment_date)?,
            department: request.department,
            doctor: DoctorSnapshot {
                first_name: doctor.first_name,
                last_name: doctor.last_name,
            },
            doctor_id: doctor.id,
            patient_id: auth.user.id,
            has_visited: request.has_visited,
            address: request.address,
        })
        .await?;
    info!(
        "Consulta {} solicitada por {} com {}",
        appointment.id, appointment.patient_id, appointment.doctor_id
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Consulta solicitada com sucesso!",
            "appointment": appointment,
        })),
    ))
}

async fn list_appointments(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
) -> ApiResult<Json<Value>> {
    let appointments = state.store.list_appointments().await?;
    Ok(Json(json!({ "success": true, "appointments": appointments })))
}

async fn patient_appointments(
    State(state): State<AppState>,
    auth: Authenticated<PatientRole>,
) -> ApiResult<Json<Value>> {
    let appointments = state
        .store
        .list_appointments_for_patient(auth.user.id)
        .await?;
    Ok(Json(json!({ "success": true, "appointments": appointments })))
}

async fn doctor_appointments(
    State(state): State<AppState>,
    auth: Authenticated<DoctorRole>,
) -> ApiResult<Json<Value>> {
    let appointments = state
        .store
        .list_appointments_for_doctor(auth.user.id)
        .await?;
    Ok(Json(json!({ "success": true, "appointments": appointments })))
}

async fn update_appointment(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
    Path(id): Path<String>,
    ValidJson(request): ValidJson<UpdateAppointmentRequest>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, NOT_FOUND)?;
    let appointment = state
        .store
        .update_appointment(id, &request.into())
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;
    info!("Consulta {} atualizada pela administração", id);

    Ok(Json(json!({
        "success": true,
        "message": "Consulta atualizada!",
        "appointment": appointment,
    })))
}

/// O médico só responde às próprias consultas. O status atual não é verificado.
async fn update_status_as_doctor(
    State(state): State<AppState>,
    auth: Authenticated<DoctorRole>,
    Path(id): Path<String>,
    ValidJson(request): ValidJson<StatusRequest>,
) -> ApiResult<Json<Value>> {
    let status = present(request.status)?;
    if !matches!(
        status,
        AppointmentStatus::Accepted | AppointmentStatus::Rejected
    ) {
        return Err(ApiError::Validation(
            "Status inválido! Use Accepted ou Rejected.".to_string(),
        ));
    }

    let id = parse_id(&id, NOT_FOUND)?;
    let appointment = state
        .store
        .find_appointment(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;

    if appointment.doctor_id != auth.user.id {
        warn!(
            "Médico {} tentou alterar a consulta {} de outro médico",
            auth.user.id, id
        );
        return Err(ApiError::Authorization(
            "Você não tem permissão para alterar esta consulta!".to_string(),
        ));
    }

    let updated = state
        .store
        .set_appointment_status(id, status)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;
    info!("Consulta {} marcada como {} pelo médico", id, status);

    Ok(Json(json!({
        "success": true,
        "message": format!("Consulta {}!", status_label(status)),
        "appointment": updated,
    })))
}

fn status_label(status: AppointmentStatus) -> &'static str {
    match status {
        AppointmentStatus::Pending => "pendente",
        AppointmentStatus::Accepted => "aceita",
        AppointmentStatus::Rejected => "recusada",
    }
}

async fn delete_appointment(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, NOT_FOUND)?;
    if !state.store.delete_appointment(id).await? {
        return Err(ApiError::NotFound(NOT_FOUND.to_string()));
    }
    info!("Consulta {} removida", id);

    Ok(Json(json!({
        "success": true,
        "message": "Consulta removida!",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        json_request, request, router, seed_user, send, session_for, test_state, StubImages,
    };
    use axum::http::Method;
    use std::sync::Arc;
    use uuid::Uuid;

    fn booking(doctor_first: &str, doctor_last: &str, department: &str) -> Value {
        json!({
            "firstName": "Maria",
            "lastName": "Silva",
            "email": "maria@x.com",
            "phone": "11988887777",
            "nic": "9876543210123",
            "dob": "1992-08-14",
            "gender": "Female",
            "appointment_date": "2026-12-01",
            "department": department,
            "doctor_firstName": doctor_first,
            "doctor_lastName": doctor_last,
            "hasVisited": false,
            "address": "Rua das Flores, 100",
        })
    }

    async fn book(state: &AppState, patient: &User, body: Value) -> (StatusCode, Value) {
        let (status, _, body) = send(
            router(state),
            json_request(
                Method::POST,
                "/api/v1/appointment/post",
                Some(&session_for(state, patient)),
                body,
            ),
        )
        .await;
        (status, body)
    }

    #[tokio::test]
    async fn test_booking_references_resolved_doctor() {
        let (state, _dir) = test_state(Arc::new(StubImages)).await;
        let doctor = seed_user(&state, Role::Doctor, "J", "Doe", "j@x.com", Some("Cardiology")).await;
        let patient = seed_user(&state, Role::Patient, "M", "S", "m@x.com", None).await;

        let (status, body) = book(&state, &patient, booking("J", "Doe", "Cardiology")).await;

        assert_eq!(status, StatusCode::CREATED);
        let appointment = &body["appointment"];
        assert_eq!(appointment["status"], "Pending");
        assert_eq!(appointment["hasVisited"], false);
        assert_eq!(appointment["doctorId"], doctor.id.to_string());
        assert_eq!(appointment["patientId"], patient.id.to_string());
        assert_eq!(appointment["doctor"]["firstName"], "J");
    }

    #[tokio::test]
    async fn test_unknown_doctor_creates_nothing() {
        let (state, _dir) = test_state(Arc::new(StubImages)).await;
        seed_user(&state, Role::Doctor, "J", "Doe", "j@x.com", Some("Cardiology")).await;
        let patient = seed_user(&state, Role::Patient, "M", "S", "m@x.com", None).await;

        // Mesmo nome, outro departamento
        let (status, _) = book(&state, &patient, booking("J", "Doe", "Neurology")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(state.store.count_appointments().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ambiguous_doctor_creates_nothing() {
        let (state, _dir) = test_state(Arc::new(StubImages)).await;
        seed_user(&state, Role::Doctor, "J", "Doe", "j1@x.com", Some("Cardiology")).await;
        seed_user(&state, Role::Doctor, "J", "Doe", "j2@x.com", Some("Cardiology")).await;
        let patient = seed_user(&state, Role::Patient, "M", "S", "m@x.com", None).await;

        let (status, body) = book(&state, &patient, booking("J", "Doe", "Cardiology")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(state.store.count_appointments().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_booking_requires_every_field() {
        let (state, _dir) = test_state(Arc::new(StubImages)).await;
        seed_user(&state, Role::Doctor, "J", "Doe", "j@x.com", Some("Cardiology")).await;
        let patient = seed_user(&state, Role::Patient, "M", "S", "m@x.com", None).await;

        let mut body = booking("J", "Doe", "Cardiology");
        body["appointment_date"] = json!("");
        let (status, _) = book(&state, &patient, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_doctor_cannot_update_foreign_appointment() {
        let (state, _dir) = test_state(Arc::new(StubImages)).await;
        seed_user(&state, Role::Doctor, "J", "Doe", "j@x.com", Some("Cardiology")).await;
        let other = seed_user(&state, Role::Doctor, "K", "Roe", "k@x.com", Some("ENT")).await;
        let patient = seed_user(&state, Role::Patient, "M", "S", "m@x.com", None).await;
        let (_, body) = book(&state, &patient, booking("J", "Doe", "Cardiology")).await;
        let id = body["appointment"]["_id"].as_str().unwrap().to_string();

        let (status, _, _) = send(
            router(&state),
            json_request(
                Method::PUT,
                &format!("/api/v1/appointment/doctor/update/{}", id),
                Some(&session_for(&state, &other)),
                json!({ "status": "Accepted" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        let stored = state
            .store
            .find_appointment(Uuid::parse_str(&id).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, AppointmentStatus::Pending);
    }

    #[tokio::test]
    async fn test_doctor_status_update() {
        let (state, _dir) = test_state(Arc::new(StubImages)).await;
        let doctor = seed_user(&state, Role::Doctor, "J", "Doe", "j@x.com", Some("Cardiology")).await;
        let patient = seed_user(&state, Role::Patient, "M", "S", "m@x.com", None).await;
        let (_, body) = book(&state, &patient, booking("J", "Doe", "Cardiology")).await;
        let uri = format!(
            "/api/v1/appointment/doctor/update/{}",
            body["appointment"]["_id"].as_str().unwrap()
        );
        let cookie = session_for(&state, &doctor);
        let app = router(&state);

        let (status, _, _) = send(
            app.clone(),
            json_request(Method::PUT, &uri, Some(&cookie), json!({ "status": "Pending" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, body) = send(
            app.clone(),
            json_request(Method::PUT, &uri, Some(&cookie), json!({ "status": "Accepted" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["appointment"]["status"], "Accepted");

        let missing = format!("/api/v1/appointment/doctor/update/{}", Uuid::new_v4());
        let (status, _, _) = send(
            app,
            json_request(Method::PUT, &missing, Some(&cookie), json!({ "status": "Rejected" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_listings_are_scoped_to_caller() {
        let (state, _dir) = test_state(Arc::new(StubImages)).await;
        let doctor = seed_user(&state, Role::Doctor, "J", "Doe", "j@x.com", Some("Cardiology")).await;
        let other_doctor = seed_user(&state, Role::Doctor, "K", "Roe", "k@x.com", Some("ENT")).await;
        let patient = seed_user(&state, Role::Patient, "M", "S", "m@x.com", None).await;
        let other_patient = seed_user(&state, Role::Patient, "N", "T", "n@x.com", None).await;
        let admin = seed_user(&state, Role::Admin, "A", "D", "a@x.com", None).await;

        book(&state, &patient, booking("J", "Doe", "Cardiology")).await;
        book(&state, &other_patient, booking("K", "Roe", "ENT")).await;
        let app = router(&state);

        let (_, _, body) = send(
            app.clone(),
            request(Method::GET, "/api/v1/appointment/patient/myappointments", Some(&session_for(&state, &patient))),
        )
        .await;
        assert_eq!(body["appointments"].as_array().unwrap().len(), 1);

        let (_, _, body) = send(
            app.clone(),
            request(Method::GET, "/api/v1/appointment/doctor/myappointments", Some(&session_for(&state, &other_doctor))),
        )
        .await;
        let mine = body["appointments"].as_array().unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0]["doctorId"], other_doctor.id.to_string());

        let (_, _, body) = send(
            app.clone(),
            request(Method::GET, "/api/v1/appointment/getall", Some(&session_for(&state, &admin))),
        )
        .await;
        assert_eq!(body["appointments"].as_array().unwrap().len(), 2);

        let (status, _, _) = send(
            app,
            request(Method::GET, "/api/v1/appointment/getall", Some(&session_for(&state, &doctor))),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_update_and_delete() {
        let (state, _dir) = test_state(Arc::new(StubImages)).await;
        let doctor = seed_user(&state, Role::Doctor, "J", "Doe", "j@x.com", Some("Cardiology")).await;
        let patient = seed_user(&state, Role::Patient, "M", "S", "m@x.com", None).await;
        let admin = seed_user(&state, Role::Admin, "A", "D", "a@x.com", None).await;
        let (_, body) = book(&state, &patient, booking("J", "Doe", "Cardiology")).await;
        let id = body["appointment"]["_id"].as_str().unwrap().to_string();
        let cookie = session_for(&state, &admin);
        let app = router(&state);

        let (status, _, body) = send(
            app.clone(),
            json_request(
                Method::PUT,
                &format!("/api/v1/appointment/update/{}", id),
                Some(&cookie),
                json!({ "hasVisited": true, "status": "Accepted", "doctorId": Uuid::new_v4() }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["appointment"]["hasVisited"], true);
        assert_eq!(body["appointment"]["status"], "Accepted");
        assert_eq!(body["appointment"]["doctorId"], doctor.id.to_string());

        let uri = format!("/api/v1/appointment/delete/{}", id);
        let (status, _, _) = send(app.clone(), request(Method::DELETE, &uri, Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);

        for _ in 0..2 {
            let (status, _, _) = send(app.clone(), request(Method::DELETE, &uri, Some(&cookie))).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
    }
}
