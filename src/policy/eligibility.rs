use crate::core::error::AttendanceError;
use crate::models::session::ActiveSession;
use crate::models::user::Student;
use tracing::warn;

/// A student may mark a session only when their section matches exactly.
/// Comparison is case-sensitive; no other rule applies at this layer.
pub fn may_mark(student: &Student, session: &ActiveSession) -> bool {
    student.section == session.section
}

pub fn check_eligibility(student: &Student, session: &ActiveSession) -> Result<(), AttendanceError> {
    if may_mark(student, session) {
        return Ok(());
    }

    warn!(
        usn = %student.usn,
        student_section = %student.section,
        session_id = %session.session_id,
        session_section = %session.section,
        "Section mismatch, attendance mark rejected"
    );

    Err(AttendanceError::Forbidden(format!(
        "student {} is in section {}, session is for section {}",
        student.usn, student.section, session.section
    )))
}
