//! Estatísticas do painel administrativo
//!
//! Sempre recalculadas a partir das tabelas; nada é persistido.

use chrono::{DateTime, Duration, Utc};

use crate::error::DbError;
use crate::models::{AppointmentStatus, DashboardStats, Role};
use crate::Store;

/// Janela usada para "consultas recentes"
pub const RECENT_WINDOW_DAYS: i64 = 7;

impl Store {
    /// Calcula as contagens do painel no instante `now`
    pub async fn dashboard_stats(&self, now: DateTime<Utc>) -> Result<DashboardStats, DbError> {
        let since = now - Duration::days(RECENT_WINDOW_DAYS);

        Ok(DashboardStats {
            total_patients: self.count_users_by_role(Role::Patient).await?,
            total_doctors: self.count_users_by_role(Role::Doctor).await?,
            total_admins: self.count_users_by_role(Role::Admin).await?,
            total_appointments: self.count_appointments().await?,
            pending_appointments: self
                .count_appointments_with_status(AppointmentStatus::Pending)
                .await?,
            accepted_appointments: self
                .count_appointments_with_status(AppointmentStatus::Accepted)
                .await?,
            rejected_appointments: self
                .count_appointments_with_status(AppointmentStatus::Rejected)
                .await?,
            total_messages: self.count_messages().await?,
            recent_appointments: self.count_appointments_created_between(since, now).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointments::fixtures::new_appointment;
    use crate::models::{Gender, NewMessage, NewUser};
    use crate::test_support::temp_store;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn user(email: &str, role: Role) -> NewUser {
        NewUser {
            first_name: "X".to_string(),
            last_name: "Y".to_string(),
            email: email.to_string(),
            phone: "1".to_string(),
            nic: "2".to_string(),
            dob: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            gender: Gender::Male,
            password_hash: "h".to_string(),
            role,
            doctor_department: None,
            doc_avatar: None,
        }
    }

    #[tokio::test]
    async fn test_stats_match_inserted_records() {
        let (store, _dir) = temp_store().await;

        for i in 0..3 {
            store.create_user(user(&format!("p{}@x.com", i), Role::Patient)).await.unwrap();
        }
        for i in 0..2 {
            store.create_user(user(&format!("d{}@x.com", i), Role::Doctor)).await.unwrap();
        }
        store.create_user(user("a@x.com", Role::Admin)).await.unwrap();

        let statuses = [
            AppointmentStatus::Accepted,
            AppointmentStatus::Accepted,
            AppointmentStatus::Rejected,
            AppointmentStatus::Pending,
            AppointmentStatus::Pending,
        ];
        for status in statuses {
            let created = store
                .create_appointment(new_appointment(Uuid::new_v4(), Uuid::new_v4()))
                .await
                .unwrap();
            store.set_appointment_status(created.id, status).await.unwrap();
        }
        store
            .create_message(NewMessage {
                first_name: "M".to_string(),
                last_name: "N".to_string(),
                email: "m@x.com".to_string(),
                phone: "3".to_string(),
                message: "olá".to_string(),
            })
            .await
            .unwrap();

        let stats = store.dashboard_stats(Utc::now()).await.unwrap();
        assert_eq!(
            stats,
            DashboardStats {
                total_patients: 3,
                total_doctors: 2,
                total_admins: 1,
                total_appointments: 5,
                pending_appointments: 2,
                accepted_appointments: 2,
                rejected_appointments: 1,
                total_messages: 1,
                recent_appointments: 5,
            }
        );
    }

    #[tokio::test]
    async fn test_recent_window_is_trailing_seven_days() {
        let (store, _dir) = temp_store().await;
        store
            .create_appointment(new_appointment(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        let later = Utc::now() + Duration::days(RECENT_WINDOW_DAYS + 1);
        let stats = store.dashboard_stats(later).await.unwrap();
        assert_eq!(stats.total_appointments, 1);
        assert_eq!(stats.recent_appointments, 0);
    }
}
