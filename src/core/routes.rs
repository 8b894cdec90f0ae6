// HTTP routes configuration

use crate::core::state::AppState;
use crate::handlers::{
    admin, attendance, auth, face, fallback, health, metrics, override_marks, profile, qr,
};
use crate::security::auth_layer::require_auth;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/admin/login", post(auth::admin_login_handler))
        .route("/qr/verify/{session_id}", get(qr::verify_handler))
        .route("/qr/active-session", get(qr::active_session_handler));

    // Everything below needs a bearer token; role checks happen per handler
    let protected = Router::new()
        .route("/auth/logout", post(auth::logout_handler))
        // QR sessions
        .route("/qr/generate", post(qr::generate_handler))
        .route("/qr/stop", post(qr::stop_handler))
        // Attendance
        .route("/attendance/mark", post(attendance::mark_handler))
        .route("/attendance/session/{session_id}", get(attendance::session_stats_handler))
        .route("/attendance/history/{usn}", get(attendance::history_handler))
        // Manual override
        .route("/override/students/{section}", get(override_marks::section_students_handler))
        .route("/override/mark", post(override_marks::manual_mark_handler))
        // Profiles
        .route("/student/me", get(profile::student_me_handler))
        .route("/teacher/subjects", get(profile::teacher_subjects_handler))
        .route("/face/verify", post(face::verify_face_handler))
        // Administration
        .route(
            "/admin/students",
            get(admin::list_students_handler).post(admin::create_student_handler),
        )
        .route(
            "/admin/teachers",
            get(admin::list_teachers_handler).post(admin::create_teacher_handler),
        )
        .route("/admin/sections/assign", post(admin::assign_section_handler))
        .route("/admin/timetable", post(admin::set_timetable_handler))
        .route("/admin/timetable/slot", post(admin::add_slot_handler))
        .route(
            "/admin/timetable/section/{section}",
            get(admin::section_timetable_handler),
        )
        .route("/admin/classrooms", post(admin::save_classroom_handler))
        .route("/admin/face/register", post(admin::register_face_handler))
        .route("/admin/attendance/report", post(admin::attendance_report_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        // 404 fallback for all unmatched routes
        .fallback(fallback::fallback_handler)
        .with_state(state)
}
