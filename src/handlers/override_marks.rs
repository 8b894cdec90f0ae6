use crate::core::error::{ApiError, AttendanceError};
use crate::core::state::AppState;
use crate::models::payloads::{
    ManualMarkRequest, ManualMarkResponse, SectionStudentsResponse, StudentSummary,
};
use crate::models::user::Principal;
use crate::security::auth_layer::require_teacher;
use crate::stores::identity_store::StudentFilter;
use crate::validation::payloads::Validate;
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;

/// GET /override/students/{section}
pub async fn section_students_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(section): Path<String>,
) -> Result<Json<SectionStudentsResponse>, ApiError> {
    require_teacher(&principal)?;

    let students = state.identity.list_students(&StudentFilter {
        section: Some(section.clone()),
        ..Default::default()
    });
    if students.is_empty() {
        return Err(AttendanceError::NotFound(format!("Students in section {}", section)).into());
    }

    Ok(Json(SectionStudentsResponse {
        students: students.iter().map(StudentSummary::from).collect(),
    }))
}

/// POST /override/mark
pub async fn manual_mark_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<ManualMarkRequest>,
) -> Result<Json<ManualMarkResponse>, ApiError> {
    require_teacher(&principal)?;
    payload.validate()?;

    let outcome = state.ledger.record_manual_marks(
        &state.identity,
        &payload.subject,
        &payload.usns,
        payload.classroom_id,
        &principal.usn,
    )?;
    state.metrics.add_manual_marks(outcome.marked.len() as u64);

    Ok(Json(ManualMarkResponse {
        success: true,
        marked: outcome.marked,
        session_id: outcome.session_id,
        message: "Attendance overridden successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::core::routes::testing::TestApp;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_manual_override_skips_unknown() {
        let app = TestApp::new();
        let teacher = app.seed_teacher("T01", &["Physics"]);
        app.seed_student("U1", "Asha", "CSE-3A");
        app.seed_student("U2", "Ravi", "CSE-3A");

        let (status, body) = app
            .post(
                "/override/mark",
                Some(&teacher),
                json!({"subject": "Physics", "usns": ["U1", "U2", "UNKNOWN"], "classroom_id": 4}),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["marked"], json!(["U1", "U2"]));
        assert_eq!(body["session_id"], "manual-T01-Physics");

        let records = app.state.ledger.records_for_session("manual-T01-Physics");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.by_teacher && r.classroom_id == Some(4)));
    }

    #[tokio::test]
    async fn test_manual_override_validation_and_roles() {
        let app = TestApp::new();
        let teacher = app.seed_teacher("T01", &["Physics"]);
        let student = app.seed_student("U1", "Asha", "CSE-3A");

        let (status, _) = app
            .post("/override/mark", Some(&teacher), json!({"subject": "Physics", "usns": []}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post("/override/mark", Some(&teacher), json!({"subject": "", "usns": ["U1"]}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post("/override/mark", Some(&student), json!({"subject": "Physics", "usns": ["U1"]}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_section_students() {
        let app = TestApp::new();
        let teacher = app.seed_teacher("T01", &["Physics"]);
        app.seed_student("U2", "Ravi", "CSE-3A");
        app.seed_student("U1", "Asha", "CSE-3A");
        app.seed_student("U9", "Dev", "CSE-3B");

        let (status, body) = app.get("/override/students/CSE-3A", Some(&teacher)).await;
        assert_eq!(status, StatusCode::OK);
        let students = body["students"].as_array().unwrap();
        assert_eq!(students.len(), 2);
        assert_eq!(students[0]["usn"], "U1");
        assert_eq!(students[0]["email"], "u1@example.edu");

        let (status, _) = app.get("/override/students/EEE-1A", Some(&teacher)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
