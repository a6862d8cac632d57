//! Estatísticas do painel administrativo

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use crate::auth::{AdminRole, Authenticated};
use crate::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(stats))
}

async fn stats(
    State(state): State<AppState>,
    _admin: Authenticated<AdminRole>,
) -> ApiResult<Json<Value>> {
    let stats = state.store.dashboard_stats(Utc::now()).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        json_request, request, router, seed_user, send, session_for, test_state, StubImages,
    };
    use axum::http::{Method, StatusCode};
    use hospital_auth::Role;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_stats_count_users_and_bookings() {
        let (state, _dir) = test_state(Arc::new(StubImages)).await;
        let admin = seed_user(&state, Role::Admin, "A", "D", "a@x.com", None).await;
        seed_user(&state, Role::Doctor, "J", "Doe", "j@x.com", Some("Cardiology")).await;
        let patient = seed_user(&state, Role::Patient, "M", "S", "m@x.com", None).await;
        let app = router(&state);

        let booking = json!({
            "firstName": "M", "lastName": "S", "email": "m@x.com", "phone": "1", "nic": "2",
            "dob": "1990-01-01", "gender": "Male", "appointment_date": "2026-12-01",
            "department": "Cardiology", "doctor_firstName": "J", "doctor_lastName": "Doe",
            "address": "Rua B, 5",
        });
        let (status, _, _) = send(
            app.clone(),
            json_request(Method::POST, "/api/v1/appointment/post", Some(&session_for(&state, &patient)), booking),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _, body) = send(
            app,
            request(Method::GET, "/api/v1/dashboard/stats", Some(&session_for(&state, &admin))),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let stats = &body["stats"];
        assert_eq!(stats["totalPatients"], 1);
        assert_eq!(stats["totalDoctors"], 1);
        assert_eq!(stats["totalAdmins"], 1);
        assert_eq!(stats["totalAppointments"], 1);
        assert_eq!(stats["pendingAppointments"], 1);
        assert_eq!(stats["recentAppointments"], 1);
    }

    #[tokio::test]
    async fn test_stats_require_admin() {
        let (state, _dir) = test_state(Arc::new(StubImages)).await;
        let doctor = seed_user(&state, Role::Doctor, "J", "Doe", "j@x.com", Some("Cardiology")).await;

        let (status, _, _) = send(
            router(&state),
            request(Method::GET, "/api/v1/dashboard/stats", Some(&session_for(&state, &doctor))),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
