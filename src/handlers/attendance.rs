use crate::core::error::{ApiError, AttendanceError};
use crate::core::state::AppState;
use crate::face::client::face_evidence;
use crate::models::attendance::Evidence;
use crate::models::payloads::{MarkAttendanceRequest, MarkAttendanceResponse};
use crate::models::user::Principal;
use crate::policy::eligibility::check_eligibility;
use crate::policy::evidence::location_present;
use crate::reports::stats::{session_stats, student_history, SessionStats, StudentHistory};
use crate::security::auth_layer::require_student;
use crate::validation::payloads::Validate;
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;

/// POST /attendance/mark
///
/// The marking student is always the caller. A `student_id` in the body is
/// only accepted when it names the caller.
pub async fn mark_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<MarkAttendanceRequest>,
) -> Result<Json<MarkAttendanceResponse>, ApiError> {
    require_student(&principal)?;
    payload.validate()?;

    let result = mark(&state, &principal, payload).await;
    match &result {
        Ok(_) => state.metrics.increment_marks_recorded(),
        Err(ApiError::Domain(_)) => state.metrics.increment_marks_rejected(),
        Err(_) => {}
    }
    result.map(Json)
}

async fn mark(
    state: &AppState,
    principal: &Principal,
    payload: MarkAttendanceRequest,
) -> Result<MarkAttendanceResponse, ApiError> {
    if let Some(student_id) = &payload.student_id {
        if student_id != &principal.usn {
            tracing::warn!(
                usn = %principal.usn,
                student_id = %student_id,
                "Attempt to mark attendance for another student"
            );
            return Err(AttendanceError::Forbidden(
                "attendance can only be marked for yourself".to_string(),
            )
            .into());
        }
    }

    let student = state
        .identity
        .get_student(&principal.usn)
        .ok_or_else(|| AttendanceError::NotFound(format!("Student {}", principal.usn)))?;
    let session = state.sessions.live_session(&payload.session_id)?;

    // Refuse before calling out to the face-match service
    check_eligibility(&student, &session)?;

    let location = location_present(payload.location.as_ref());
    let face = face_evidence(
        state.face.as_deref(),
        &state.config.storage.face_dir,
        &student.usn,
        payload.face_image.as_deref(),
    )
    .await;

    // Liveness is checked again under the ledger lock
    let record = state.ledger.record_mark(
        &state.sessions,
        &student,
        &session.session_id,
        Evidence::qr_scan(location, face),
    )?;

    Ok(MarkAttendanceResponse {
        success: true,
        attendance_id: record.id,
        session_id: record.session_id,
        qr: record.qr,
        location: record.location,
        face: record.face,
    })
}

/// GET /attendance/session/{session_id}
pub async fn session_stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(_principal): Extension<Principal>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStats>, ApiError> {
    let stats = session_stats(&state.sessions, &state.identity, &state.ledger, &session_id)?;
    Ok(Json(stats))
}

/// GET /attendance/history/{usn}
///
/// Students may read only their own history.
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(usn): Path<String>,
) -> Result<Json<StudentHistory>, ApiError> {
    if principal.is_student() && principal.usn != usn {
        return Err(ApiError::Forbidden("students may only view their own history".to_string()));
    }

    let history = student_history(&state.sessions, &state.identity, &state.ledger, &usn)?;
    Ok(Json(history))
}
