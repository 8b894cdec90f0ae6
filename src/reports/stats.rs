use crate::core::error::AttendanceError;
use crate::models::attendance::AttendanceRecord;
use crate::stores::identity_store::IdentityStore;
use crate::stores::ledger::AttendanceLedger;
use crate::stores::session_store::SessionStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,
    pub section: String,
    pub present_count: usize,
    pub total_students: usize,
    pub percentage: f64,
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentHistory {
    pub usn: String,
    pub total_records: usize,
    pub attended_sessions: usize,
    pub sessions_offered: usize,
    pub percentage: f64,
    pub records: Vec<AttendanceRecord>,
}

/// `part / whole * 100`, 0 for an empty whole, clamped to [0, 100]
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 100.0).clamp(0.0, 100.0)
}

/// Live stats for one session.
///
/// The denominator is the section's headcount right now, so a later section
/// reassignment changes it retroactively.
pub fn session_stats(
    sessions: &SessionStore,
    identity: &IdentityStore,
    ledger: &AttendanceLedger,
    session_id: &str,
) -> Result<SessionStats, AttendanceError> {
    let session = sessions
        .get(session_id)
        .ok_or_else(|| AttendanceError::NotFound(format!("session {}", session_id)))?;

    let records = ledger.records_for_session(session_id);
    let total_students = identity.count_in_section(&session.section);
    let present_count = records.len();

    Ok(SessionStats {
        session_id: session.session_id,
        section: session.section,
        present_count,
        total_students,
        percentage: percentage(present_count, total_students),
        records,
    })
}

/// Attendance history for one student.
///
/// The percentage counts distinct QR sessions the student marked out of every
/// session ever opened for their current section. Manual overrides show up in
/// `records` and `total_records` only.
pub fn student_history(
    sessions: &SessionStore,
    identity: &IdentityStore,
    ledger: &AttendanceLedger,
    usn: &str,
) -> Result<StudentHistory, AttendanceError> {
    let student = identity
        .get_student(usn)
        .ok_or_else(|| AttendanceError::NotFound(format!("student {}", usn)))?;

    let records = ledger.records_for_usn(usn);
    let offered: HashSet<String> = sessions
        .session_ids_for_section(&student.section)
        .into_iter()
        .collect();

    let attended: HashSet<&str> = records
        .iter()
        .filter(|r| !r.by_teacher && offered.contains(&r.session_id))
        .map(|r| r.session_id.as_str())
        .collect();
    let attended_sessions = attended.len();

    Ok(StudentHistory {
        usn: student.usn,
        total_records: records.len(),
        attended_sessions,
        sessions_offered: offered.len(),
        percentage: percentage(attended_sessions, offered.len()),
        records,
    })
}
