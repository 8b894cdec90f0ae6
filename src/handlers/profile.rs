use crate::core::error::{ApiError, AttendanceError};
use crate::core::state::AppState;
use crate::models::payloads::TeacherSubjectsResponse;
use crate::models::user::{Principal, Student};
use crate::security::auth_layer::{require_student, require_teacher};
use axum::{extract::State, Extension, Json};
use std::sync::Arc;

/// GET /student/me
pub async fn student_me_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Student>, ApiError> {
    require_student(&principal)?;

    let student = state
        .identity
        .get_student(&principal.usn)
        .ok_or_else(|| AttendanceError::NotFound(format!("Student {}", principal.usn)))?;
    Ok(Json(student))
}

/// GET /teacher/subjects
pub async fn teacher_subjects_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<TeacherSubjectsResponse>, ApiError> {
    require_teacher(&principal)?;

    let teacher = state
        .identity
        .get_teacher(&principal.usn)
        .ok_or_else(|| AttendanceError::NotFound(format!("Teacher {}", principal.usn)))?;

    Ok(Json(TeacherSubjectsResponse {
        teacher_id: teacher.teacher_id,
        subjects: teacher.subjects.into_iter().collect(),
    }))
}
