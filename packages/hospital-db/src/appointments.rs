//! Registro de consultas
//!
//! As consultas guardam uma cópia do nome do médico (apenas exibição) e a
//! referência `doctor_id`, que é a única usada em verificações de permissão.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{
    Appointment, AppointmentChanges, AppointmentStatus, DoctorSnapshot, NewAppointment,
};
use crate::Store;

const APPOINTMENT_COLUMNS: &str = "id, created_at, first_name, last_name, email, phone, \
     nic_ciphertext, nic_nonce, dob, gender, appointment_date, department, doctor_first_name, \
     doctor_last_name, doctor_id, patient_id, has_visited, address, status";

const NEWEST_FIRST: &str = "ORDER BY created_at DESC, rowid DESC";

#[derive(FromRow)]
struct AppointmentRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    nic_ciphertext: Vec<u8>,
    nic_nonce: Vec<u8>,
    dob: NaiveDate,
    gender: String,
    appointment_date: NaiveDate,
    department: String,
    doctor_first_name: String,
    doctor_last_name: String,
    doctor_id: Uuid,
    patient_id: Uuid,
    has_visited: bool,
    address: String,
    status: String,
}

impl Store {
    fn appointment_from_row(&self, row: AppointmentRow) -> Result<Appointment, DbError> {
        Ok(Appointment {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            nic: self.open_sealed(row.nic_ciphertext, row.nic_nonce)?,
            dob: row.dob,
            gender: row.gender.parse()?,
            appointment_date: row.appointment_date,
            department: row.department,
            doctor: DoctorSnapshot {
                first_name: row.doctor_first_name,
                last_name: row.doctor_last_name,
            },
            doctor_id: row.doctor_id,
            patient_id: row.patient_id,
            has_visited: row.has_visited,
            address: row.address,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }

    fn appointments_from_rows(&self, rows: Vec<AppointmentRow>) -> Result<Vec<Appointment>, DbError> {
        rows.into_iter()
            .map(|row| self.appointment_from_row(row))
            .collect()
    }

    /// Registra uma nova consulta com status `Pending`
    pub async fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, DbError> {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            phone: new.phone,
            nic: new.nic,
            dob: new.dob,
            gender: new.gender,
            appointment_date: new.appointment_date,
            department: new.department,
            doctor: new.doctor,
            doctor_id: new.doctor_id,
            patient_id: new.patient_id,
            has_visited: new.has_visited,
            address: new.address,
            status: AppointmentStatus::Pending,
            created_at: Utc::now(),
        };
        let nic = self.seal(&appointment.nic)?;

        sqlx::query(
            "INSERT INTO appointments
             (id, created_at, first_name, last_name, email, phone, nic_ciphertext, nic_nonce,
              dob, gender, appointment_date, department, doctor_first_name, doctor_last_name,
              doctor_id, patient_id, has_visited, address, status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(appointment.id)
        .bind(appointment.created_at)
        .bind(&appointment.first_name)
        .bind(&appointment.last_name)
        .bind(&appointment.email)
        .bind(&appointment.phone)
        .bind(&nic.ciphertext)
        .bind(&nic.nonce)
        .bind(appointment.dob)
        .bind(appointment.gender.as_str())
        .bind(appointment.appointment_date)
        .bind(&appointment.department)
        .bind(&appointment.doctor.first_name)
        .bind(&appointment.doctor.last_name)
        .bind(appointment.doctor_id)
        .bind(appointment.patient_id)
        .bind(appointment.has_visited)
        .bind(&appointment.address)
        .bind(appointment.status.as_str())
        .execute(self.pool())
        .await?;

        debug!(
            "Consulta {} criada para o médico {}",
            appointment.id, appointment.doctor_id
        );
        Ok(appointment)
    }

    pub async fn find_appointment(&self, id: Uuid) -> Result<Option<Appointment>, DbError> {
        let row: Option<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM appointments WHERE id = ?",
            APPOINTMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| self.appointment_from_row(row)).transpose()
    }

    /// Todas as consultas, mais recentes primeiro
    pub async fn list_appointments(&self) -> Result<Vec<Appointment>, DbError> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM appointments {}",
            APPOINTMENT_COLUMNS, NEWEST_FIRST
        ))
        .fetch_all(self.pool())
        .await?;

        self.appointments_from_rows(rows)
    }

    pub async fn list_appointments_for_patient(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, DbError> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM appointments WHERE patient_id = ? {}",
            APPOINTMENT_COLUMNS, NEWEST_FIRST
        ))
        .bind(patient_id)
        .fetch_all(self.pool())
        .await?;

        self.appointments_from_rows(rows)
    }

    pub async fn list_appointments_for_doctor(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<Appointment>, DbError> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM appointments WHERE doctor_id = ? {}",
            APPOINTMENT_COLUMNS, NEWEST_FIRST
        ))
        .bind(doctor_id)
        .fetch_all(self.pool())
        .await?;

        self.appointments_from_rows(rows)
    }

    /// Aplica alterações administrativas; devolve `None` se a consulta não existir
    pub async fn update_appointment(
        &self,
        id: Uuid,
        changes: &AppointmentChanges,
    ) -> Result<Option<Appointment>, DbError> {
        let Some(mut appointment) = self.find_appointment(id).await? else {
            return Ok(None);
        };
        changes.apply(&mut appointment);
        let nic = self.seal(&appointment.nic)?;

        sqlx::query(
            "UPDATE appointments SET
             first_name = ?, last_name = ?, email = ?, phone = ?, nic_ciphertext = ?,
             nic_nonce = ?, dob = ?, gender = ?, appointment_date = ?, department = ?,
             has_visited = ?, address = ?, status = ?
             WHERE id = ?",
        )
        .bind(&appointment.first_name)
        .bind(&appointment.last_name)
        .bind(&appointment.email)
        .bind(&appointment.phone)
        .bind(&nic.ciphertext)
        .bind(&nic.nonce)
        .bind(appointment.dob)
        .bind(appointment.gender.as_str())
        .bind(appointment.appointment_date)
        .bind(&appointment.department)
        .bind(appointment.has_visited)
        .bind(&appointment.address)
        .bind(appointment.status.as_str())
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(Some(appointment))
    }

    /// Altera somente o status; devolve `None` se a consulta não existir
    pub async fn set_appointment_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, DbError> {
        let result = sqlx::query("UPDATE appointments SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_appointment(id).await
    }

    pub async fn delete_appointment(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_appointments(&self) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM appointments")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }

    pub async fn count_appointments_with_status(
        &self,
        status: AppointmentStatus,
    ) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM appointments WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }

    /// Consultas criadas no intervalo `[since, until]`
    pub async fn count_appointments_created_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM appointments WHERE created_at >= ? AND created_at <= ?",
        )
        .bind(since)
        .bind(until)
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::models::Gender;

    pub fn new_appointment(doctor_id: Uuid, patient_id: Uuid) -> NewAppointment {
        NewAppointment {
            first_name: "Ana".to_string(),
            last_name: "Souza".to_string(),
            email: "ana@x.com".to_string(),
            phone: "11988887777".to_string(),
            nic: "9876543210987".to_string(),
            dob: NaiveDate::from_ymd_opt(1985, 2, 3).unwrap(),
            gender: Gender::Female,
            appointment_date: NaiveDate::from_ymd_opt(2026, 11, 20).unwrap(),
            department: "Cardiology".to_string(),
            doctor: DoctorSnapshot {
                first_name: "J".to_string(),
                last_name: "Doe".to_string(),
            },
            doctor_id,
            patient_id,
            has_visited: false,
            address: "Rua A, 10".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::new_appointment;
    use super::*;
    use crate::test_support::temp_store;

    #[tokio::test]
    async fn test_create_defaults_to_pending() {
        let (store, _dir) = temp_store().await;
        let created = store
            .create_appointment(new_appointment(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        assert_eq!(created.status, AppointmentStatus::Pending);
        let found = store.find_appointment(created.id).await.unwrap().unwrap();
        assert_eq!(found.nic, "9876543210987");
        assert_eq!(found.doctor.last_name, "Doe");
    }

    #[tokio::test]
    async fn test_lists_are_scoped_and_newest_first() {
        let (store, _dir) = temp_store().await;
        let doctor = Uuid::new_v4();
        let patient = Uuid::new_v4();

        let first = store.create_appointment(new_appointment(doctor, patient)).await.unwrap();
        let second = store.create_appointment(new_appointment(doctor, patient)).await.unwrap();
        store
            .create_appointment(new_appointment(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        let for_doctor = store.list_appointments_for_doctor(doctor).await.unwrap();
        let ids: Vec<Uuid> = for_doctor.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        assert_eq!(store.list_appointments_for_patient(patient).await.unwrap().len(), 2);
        assert_eq!(store.list_appointments().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_and_status_change() {
        let (store, _dir) = temp_store().await;
        let created = store
            .create_appointment(new_appointment(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        let changes = AppointmentChanges {
            has_visited: Some(true),
            status: Some(AppointmentStatus::Rejected),
            ..Default::default()
        };
        let updated = store.update_appointment(created.id, &changes).await.unwrap().unwrap();
        assert!(updated.has_visited);
        assert_eq!(updated.status, AppointmentStatus::Rejected);

        let accepted = store
            .set_appointment_status(created.id, AppointmentStatus::Accepted)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(accepted.status, AppointmentStatus::Accepted);

        assert!(store
            .set_appointment_status(Uuid::new_v4(), AppointmentStatus::Accepted)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_is_false_every_time() {
        let (store, _dir) = temp_store().await;
        let id = Uuid::new_v4();
        assert!(!store.delete_appointment(id).await.unwrap());
        assert!(!store.delete_appointment(id).await.unwrap());
    }
}
