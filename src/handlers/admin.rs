use crate::core::error::{ApiError, AttendanceError};
use crate::core::state::AppState;
use crate::face::images::{decode_image, store_reference};
use crate::models::admin::{
    AddSlotRequest, AssignSectionRequest, AssignSectionResponse, ClassroomRequest,
    CreateStudentRequest, CreateTeacherRequest, CreatedResponse, FaceRegisterRequest,
    FaceRegisterResponse, ReportRequest, ReportResponse, SectionTimetableResponse,
    SetTimetableRequest, StudentListQuery, TeacherSummary,
};
use crate::models::classroom::Classroom;
use crate::models::payloads::SuccessResponse;
use crate::models::user::{Principal, Student, TimetableSlot};
use crate::reports::filter::{filtered_report, ReportFilter};
use crate::security::auth_layer::require_admin;
use crate::security::password::hash_password;
use crate::stores::identity_store::{NewStudent, NewTeacher, StudentFilter};
use crate::validation::payloads::Validate;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use tracing::{info, warn};

async fn hash_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::InternalError(format!("Hashing task failed: {}", e)))?
        .map_err(|e| ApiError::InternalError(e.to_string()))
}

/// Create a student account
///
/// POST /admin/students
pub async fn create_student_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CreateStudentRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    require_admin(&principal)?;
    payload.validate()?;

    let password_hash = hash_blocking(payload.password).await?;
    let student = state.identity.create_student(NewStudent {
        usn: payload.usn,
        name: payload.name,
        email: payload.email,
        password_hash,
        department: payload.department,
        year: payload.year,
        section: payload.section,
    })?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            success: true,
            message: "Student created".to_string(),
            usn: student.usn,
        }),
    ))
}

/// Create a teacher account
///
/// POST /admin/teachers
pub async fn create_teacher_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CreateTeacherRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    require_admin(&principal)?;
    payload.validate()?;

    let password_hash = hash_blocking(payload.password).await?;
    let teacher = state.identity.create_teacher(NewTeacher {
        teacher_id: payload.teacher_id,
        name: payload.name,
        email: payload.email,
        password_hash,
        phone_number: payload.phone_number,
        qualification: payload.qualification,
        subjects: payload.subjects,
    })?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            success: true,
            message: "Teacher created".to_string(),
            usn: teacher.teacher_id,
        }),
    ))
}

/// GET /admin/teachers
pub async fn list_teachers_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<TeacherSummary>>, ApiError> {
    require_admin(&principal)?;

    let teachers = state
        .identity
        .list_teachers()
        .into_iter()
        .map(|(teacher, user)| TeacherSummary::new(teacher, user.as_deref()))
        .collect();
    Ok(Json(teachers))
}

/// GET /admin/students?department=&year=&section=
pub async fn list_students_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<StudentListQuery>,
) -> Result<Json<Vec<Student>>, ApiError> {
    require_admin(&principal)?;

    let students = state.identity.list_students(&StudentFilter {
        department: query.department,
        year: query.year,
        section: query.section,
    });
    Ok(Json(students))
}

/// Bulk section reassignment; unknown usns are ignored
///
/// POST /admin/sections/assign
pub async fn assign_section_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<AssignSectionRequest>,
) -> Result<Json<AssignSectionResponse>, ApiError> {
    require_admin(&principal)?;
    payload.validate()?;

    let updated = state.identity.assign_section(
        &payload.usns,
        &payload.department,
        payload.year,
        &payload.section,
    )?;

    Ok(Json(AssignSectionResponse {
        success: true,
        updated,
    }))
}

/// Replace a teacher's timetable
///
/// POST /admin/timetable
pub async fn set_timetable_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<SetTimetableRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_admin(&principal)?;
    payload.validate()?;

    let slots = payload.timetable.slots.len();
    state
        .identity
        .set_timetable(&payload.teacher_id, payload.timetable)?;

    Ok(Json(SuccessResponse {
        success: true,
        message: format!("Timetable saved with {} slots", slots),
    }))
}

/// POST /admin/timetable/slot
pub async fn add_slot_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<AddSlotRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_admin(&principal)?;
    payload.validate()?;

    state.identity.add_timetable_slot(
        &payload.teacher_id,
        TimetableSlot {
            day: payload.day,
            time: payload.time,
            subject: payload.subject,
            section: payload.section,
        },
    )?;

    Ok(Json(SuccessResponse {
        success: true,
        message: "Slot added".to_string(),
    }))
}

/// GET /admin/timetable/section/{section}
pub async fn section_timetable_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(section): Path<String>,
) -> Result<Json<SectionTimetableResponse>, ApiError> {
    require_admin(&principal)?;

    let slots = state.identity.section_timetable(&section);
    Ok(Json(SectionTimetableResponse { section, slots }))
}

/// Insert or update a classroom by room number
///
/// POST /admin/classrooms
pub async fn save_classroom_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<ClassroomRequest>,
) -> Result<Json<Classroom>, ApiError> {
    require_admin(&principal)?;
    payload.validate()?;

    let classroom = state.identity.save_classroom(
        &payload.room_number,
        payload.lat,
        payload.lon,
        payload.image_paths,
    )?;
    info!(room_number = %classroom.room_number, id = classroom.id, "Classroom saved");
    Ok(Json(classroom))
}

/// Store a reference face image for a user
///
/// POST /admin/face/register
pub async fn register_face_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<FaceRegisterRequest>,
) -> Result<Json<FaceRegisterResponse>, ApiError> {
    require_admin(&principal)?;
    payload.validate()?;

    if state.identity.get_user(&payload.usn).is_none() {
        return Err(AttendanceError::NotFound(format!("User {}", payload.usn)).into());
    }

    let image = decode_image(&payload.image).map_err(|e| {
        warn!(usn = %payload.usn, error = %e, "Rejected face image");
        ApiError::InvalidParameter(format!("image: {}", e))
    })?;

    let path = store_reference(&state.config.storage.face_dir, &payload.usn, &image)
        .await
        .map_err(|e| ApiError::InternalError(format!("{:#}", e)))?;

    Ok(Json(FaceRegisterResponse {
        success: true,
        message: "Face registered".to_string(),
        path: path.display().to_string(),
    }))
}

/// POST /admin/attendance/report
pub async fn attendance_report_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<ReportRequest>,
) -> Result<Json<ReportResponse>, ApiError> {
    require_admin(&principal)?;

    let filter = ReportFilter::parse(
        payload.subject.as_deref(),
        payload.from_date.as_deref(),
        payload.to_date.as_deref(),
    );
    let records = filtered_report(&state.ledger, &filter);

    Ok(Json(ReportResponse {
        count: records.len(),
        records,
    }))
}
