use crate::core::error::ApiError;
use crate::core::state::AppState;
use crate::models::payloads::{
    ActiveSessionResponse, GenerateSessionRequest, GenerateSessionResponse, StopSessionRequest,
    StopSessionResponse, VerifySessionResponse,
};
use crate::models::user::Principal;
use crate::security::auth_layer::require_teacher;
use crate::validation::payloads::Validate;
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;

/// POST /qr/generate
///
/// Opens a new session and deactivates every other one. Teachers open
/// sessions as themselves; admins may name any teacher.
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<GenerateSessionRequest>,
) -> Result<Json<GenerateSessionResponse>, ApiError> {
    require_teacher(&principal)?;
    payload.validate()?;

    let teacher_id = payload.teacher_id.unwrap_or_else(|| principal.usn.clone());
    if teacher_id != principal.usn && !principal.is_admin {
        return Err(ApiError::Forbidden(format!(
            "cannot open a session as teacher {}",
            teacher_id
        )));
    }

    let session = state
        .sessions
        .open_session(&payload.subject, &teacher_id, &payload.section)?;
    state.metrics.increment_sessions_opened();

    Ok(Json(session.into()))
}

/// POST /qr/stop
pub async fn stop_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<StopSessionRequest>,
) -> Result<Json<StopSessionResponse>, ApiError> {
    require_teacher(&principal)?;
    payload.validate()?;

    state.sessions.stop_session(&payload.session_id)?;

    Ok(Json(StopSessionResponse {
        message: "QR session stopped".to_string(),
        session_id: payload.session_id,
    }))
}

/// GET /qr/verify/{session_id}
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<VerifySessionResponse>, ApiError> {
    let info = state.sessions.verify_session(&session_id)?;

    Ok(Json(VerifySessionResponse {
        valid: true,
        subject: info.subject,
        teacher_id: info.teacher_id,
        section: info.section,
    }))
}

/// GET /qr/active-session
pub async fn active_session_handler(State(state): State<Arc<AppState>>) -> Json<ActiveSessionResponse> {
    Json(state.sessions.get_active_session().into())
}

#[cfg(test)]
mod tests {
    use crate::core::routes::testing::TestApp;
    use axum::http::StatusCode;
    use chrono::Duration;
    use serde_json::json;

    #[tokio::test]
    async fn test_generate_and_poll_active_session() {
        let app = TestApp::new();
        let teacher = app.seed_teacher("T01", &["Math"]);

        let (status, body) = app
            .post("/qr/generate", Some(&teacher), json!({"subject": "Math", "section": "CSE-3A"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["teacher_id"], "T01");
        assert_eq!(body["section"], "CSE-3A");
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let (status, body) = app.get("/qr/active-session", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active"], true);
        assert_eq!(body["session_id"], session_id.as_str());

        let (status, body) = app.get(&format!("/qr/verify/{}", session_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);
        assert_eq!(body["subject"], "Math");
    }

    #[tokio::test]
    async fn test_generate_requires_teacher() {
        let app = TestApp::new();
        let student = app.seed_student("U1", "Asha", "CSE-3A");

        let (status, _) = app
            .post("/qr/generate", Some(&student), json!({"subject": "Math", "section": "CSE-3A"}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .post("/qr/generate", None, json!({"subject": "Math", "section": "CSE-3A"}))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_teacher_cannot_open_as_someone_else() {
        let app = TestApp::new();
        let teacher = app.seed_teacher("T01", &["Math"]);
        let admin = app.seed_admin("ADMIN");

        let body = json!({"subject": "Math", "section": "CSE-3A", "teacher_id": "T02"});
        let (status, _) = app.post("/qr/generate", Some(&teacher), body.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.post("/qr/generate", Some(&admin), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["teacher_id"], "T02");
    }

    #[tokio::test]
    async fn test_superseded_session_reports_expired() {
        let app = TestApp::new();
        let teacher = app.seed_teacher("T01", &["Math"]);

        let (_, first) = app
            .post("/qr/generate", Some(&teacher), json!({"subject": "Math", "section": "CSE-3A"}))
            .await;
        app.post("/qr/generate", Some(&teacher), json!({"subject": "Math", "section": "CSE-3B"}))
            .await;

        let (status, body) = app
            .get(&format!("/qr/verify/{}", first["session_id"].as_str().unwrap()), None)
            .await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_expiry_after_ttl() {
        let app = TestApp::new();
        let teacher = app.seed_teacher("T01", &["Math"]);
        let (_, body) = app
            .post("/qr/generate", Some(&teacher), json!({"subject": "Math", "section": "CSE-3A"}))
            .await;
        let session_id = body["session_id"].as_str().unwrap().to_string();

        app.clock.advance(Duration::minutes(11));

        let (_, body) = app.get("/qr/active-session", None).await;
        assert_eq!(body, json!({"active": false}));

        let (status, _) = app.get(&format!("/qr/verify/{}", session_id), None).await;
        assert_eq!(status, StatusCode::GONE);
    }

    #[tokio::test]
    async fn test_stop_and_unknown_session() {
        let app = TestApp::new();
        let teacher = app.seed_teacher("T01", &["Math"]);
        let (_, body) = app
            .post("/qr/generate", Some(&teacher), json!({"subject": "Math", "section": "CSE-3A"}))
            .await;
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let (status, _) = app
            .post("/qr/stop", Some(&teacher), json!({"session_id": session_id}))
            .await;
        assert_eq!(status, StatusCode::OK);

        // Stopping again is fine
        let (status, _) = app
            .post("/qr/stop", Some(&teacher), json!({"session_id": session_id}))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .post("/qr/stop", Some(&teacher), json!({"session_id": "missing"}))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.get("/qr/verify/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
