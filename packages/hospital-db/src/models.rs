//! Modelos de dados compartilhados entre aplicações
//!
//! Este módulo define as estruturas de dados principais do sistema hospitalar.
//! Os nomes serializados seguem o formato consumido pelos front-ends
//! (site do paciente e painel administrativo).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::DbError;

/// Papel de um usuário no sistema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "Patient",
            Role::Doctor => "Doctor",
            Role::Admin => "Admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Patient" => Ok(Role::Patient),
            "Doctor" => Ok(Role::Doctor),
            "Admin" => Ok(Role::Admin),
            _ => Err(DbError::QueryError(format!("Papel inválido: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            _ => Err(DbError::QueryError(format!("Gênero inválido: {}", s))),
        }
    }
}

/// Status possíveis de uma consulta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    /// Solicitação inicial, aguardando resposta
    Pending,
    /// Aceita pelo médico ou pela administração
    Accepted,
    /// Recusada
    Rejected,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Accepted => "Accepted",
            AppointmentStatus::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(AppointmentStatus::Pending),
            "Accepted" => Ok(AppointmentStatus::Accepted),
            "Rejected" => Ok(AppointmentStatus::Rejected),
            _ => Err(DbError::QueryError(format!("Valor de status inválido: {}", s))),
        }
    }
}

/// Referência a uma imagem armazenada no serviço externo de imagens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub public_id: String,
    pub url: String,
}

/// Usuário do sistema (paciente, médico ou administrador)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    /// Documento de identidade (armazenado criptografado)
    pub nic: String,
    pub dob: NaiveDate,
    pub gender: Gender,
    /// Hash Argon2 da senha; nunca serializado
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<ImageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_avatar: Option<ImageRef>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Identificadores de imagem distintos associados ao usuário
    pub fn image_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for image in [&self.avatar, &self.doc_avatar].into_iter().flatten() {
            if !ids.contains(&image.public_id) {
                ids.push(image.public_id.clone());
            }
        }
        ids
    }
}

/// Dados para criação de um usuário
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub nic: String,
    pub dob: NaiveDate,
    pub gender: Gender,
    pub password_hash: String,
    pub role: Role,
    pub doctor_department: Option<String>,
    pub doc_avatar: Option<ImageRef>,
}

/// Alterações parciais de um usuário. Papel e senha não fazem parte deste conjunto.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub nic: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub doctor_department: Option<String>,
    /// `Some(None)` remove a imagem
    pub avatar: Option<Option<ImageRef>>,
    pub doc_avatar: Option<Option<ImageRef>>,
}

impl UserChanges {
    pub fn apply(&self, user: &mut User) {
        if let Some(v) = &self.first_name {
            user.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            user.last_name = v.clone();
        }
        if let Some(v) = &self.email {
            user.email = v.clone();
        }
        if let Some(v) = &self.phone {
            user.phone = v.clone();
        }
        if let Some(v) = &self.nic {
            user.nic = v.clone();
        }
        if let Some(v) = self.dob {
            user.dob = v;
        }
        if let Some(v) = self.gender {
            user.gender = v;
        }
        if let Some(v) = &self.doctor_department {
            user.doctor_department = Some(v.clone());
        }
        if let Some(v) = &self.avatar {
            user.avatar = v.clone();
        }
        if let Some(v) = &self.doc_avatar {
            user.doc_avatar = v.clone();
        }
    }
}

/// Cópia do nome do médico no momento da marcação, apenas para exibição
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSnapshot {
    pub first_name: String,
    pub last_name: String,
}

/// Representa uma consulta
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub nic: String,
    pub dob: NaiveDate,
    pub gender: Gender,
    #[serde(rename = "appointment_date")]
    pub appointment_date: NaiveDate,
    pub department: String,
    pub doctor: DoctorSnapshot,
    /// Referência autoritativa ao médico responsável
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub has_visited: bool,
    pub address: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

/// Dados para criação de uma consulta
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub nic: String,
    pub dob: NaiveDate,
    pub gender: Gender,
    pub appointment_date: NaiveDate,
    pub department: String,
    pub doctor: DoctorSnapshot,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub has_visited: bool,
    pub address: String,
}

/// Alterações administrativas de uma consulta. A referência ao médico e ao paciente é imutável.
#[derive(Debug, Clone, Default)]
pub struct AppointmentChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub nic: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub appointment_date: Option<NaiveDate>,
    pub department: Option<String>,
    pub has_visited: Option<bool>,
    pub address: Option<String>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentChanges {
    pub fn apply(&self, appointment: &mut Appointment) {
        if let Some(v) = &self.first_name {
            appointment.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            appointment.last_name = v.clone();
        }
        if let Some(v) = &self.email {
            appointment.email = v.clone();
        }
        if let Some(v) = &self.phone {
            appointment.phone = v.clone();
        }
        if let Some(v) = &self.nic {
            appointment.nic = v.clone();
        }
        if let Some(v) = self.dob {
            appointment.dob = v;
        }
        if let Some(v) = self.gender {
            appointment.gender = v;
        }
        if let Some(v) = self.appointment_date {
            appointment.appointment_date = v;
        }
        if let Some(v) = &self.department {
            appointment.department = v.clone();
        }
        if let Some(v) = self.has_visited {
            appointment.has_visited = v;
        }
        if let Some(v) = &self.address {
            appointment.address = v.clone();
        }
        if let Some(v) = self.status {
            appointment.status = v;
        }
    }
}

/// Mensagem enviada pelo formulário público de contato
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct MessageChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
}

impl MessageChanges {
    pub fn apply(&self, message: &mut Message) {
        if let Some(v) = &self.first_name {
            message.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            message.last_name = v.clone();
        }
        if let Some(v) = &self.email {
            message.email = v.clone();
        }
        if let Some(v) = &self.phone {
            message.phone = v.clone();
        }
        if let Some(v) = &self.message {
            message.message = v.clone();
        }
    }
}

/// Contagens exibidas no painel administrativo
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_patients: i64,
    pub total_doctors: i64,
    pub total_admins: i64,
    pub total_appointments: i64,
    pub pending_appointments: i64,
    pub accepted_appointments: i64,
    pub rejected_appointments: i64,
    pub total_messages: i64,
    /// Consultas criadas nos últimos 7 dias
    pub recent_appointments: i64,
}
