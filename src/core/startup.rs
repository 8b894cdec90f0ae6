use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::config::AdminConfig;
use crate::core::state::AppState;
use crate::security::password::hash_password;
use crate::wal::wal::WalOperation;

// this runs at boot time, before any listener is bound
pub fn apply_wal_operations(state: &AppState, operations: &[WalOperation]) -> Result<()> {
    for op in operations {
        match op {
            WalOperation::CreateUser { user } => {
                state.identity.restore_user(user.clone());
            }
            WalOperation::CreateStudent { user, student } => {
                state.identity.restore_student(user.clone(), student.clone());
            }
            WalOperation::CreateTeacher { user, teacher } => {
                state.identity.restore_teacher(user.clone(), teacher.clone());
            }
            WalOperation::AssignSection {
                usns,
                department,
                year,
                section,
            } => {
                state
                    .identity
                    .restore_assign_section(usns, department, *year, section);
            }
            WalOperation::SetTimetable {
                teacher_id,
                timetable,
            } => {
                state.identity.restore_timetable(teacher_id, timetable.clone());
            }
            WalOperation::AddTimetableSlot { teacher_id, slot } => {
                state.identity.restore_timetable_slot(teacher_id, slot.clone());
            }
            WalOperation::SaveClassroom { classroom } => {
                state.identity.restore_classroom(classroom.clone());
            }
            WalOperation::OpenSession { session, version } => {
                state.sessions.restore_open(session.clone(), *version);
            }
            WalOperation::StopSession { session_id } => {
                state.sessions.restore_stop(session_id);
            }
            WalOperation::RecordMark { record } => {
                state.ledger.restore(vec![record.clone()]);
            }
            WalOperation::RecordBatch { records } => {
                state.ledger.restore(records.clone());
            }
        }
    }

    // Sessions that lapsed while the process was down
    let swept = state.sessions.sweep_expired();
    debug!(swept = swept, "Post-replay session sweep");
    Ok(())
}

/// Create the configured administrator unless a user with that email exists.
pub fn bootstrap_admin(state: &AppState, admin: &AdminConfig) -> Result<bool> {
    if state.identity.get_user_by_email(&admin.email).is_some() {
        debug!(email = %admin.email, "Administrator already present");
        return Ok(false);
    }

    let password_hash =
        hash_password(&admin.password).context("Failed to hash administrator password")?;
    state
        .identity
        .create_user(
            &admin.usn,
            &admin.name,
            &admin.email,
            password_hash,
            false,
            true,
        )
        .context("Failed to create administrator")?;

    info!(usn = %admin.usn, email = %admin.email, "Administrator bootstrapped");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::models::attendance::Evidence;
    use crate::security::password::verify_password;
    use crate::stores::identity_store::fixtures::{new_student, new_teacher};
    use crate::utils::time::ManualClock;
    use crate::wal::wal::testing::MemoryJournal;
    use crate::wal::wal::{Journal, Wal};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn state_with(journal: Arc<dyn Journal>, clock: Arc<ManualClock>, dir: &TempDir) -> AppState {
        AppState::with_parts(Config::for_tests(dir.path()), journal, clock, None)
    }

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_replay_restores_everything() {
        let dir = TempDir::new().unwrap();
        let wal_path = dir.path().join("replay.wal");
        let clock = Arc::new(ManualClock::new(start()));

        let (session_id, stopped_id) = {
            let wal = Arc::new(Wal::new(wal_path.clone()).unwrap());
            let state = state_with(wal, clock.clone(), &dir);

            let student = state
                .identity
                .create_student(new_student("U1", "Asha", "CSE-3A"))
                .unwrap();
            state
                .identity
                .create_teacher(new_teacher("T01", &["Math"]))
                .unwrap();
            state
                .identity
                .save_classroom("A-101", 12.9, 77.5, vec![])
                .unwrap();

            let stopped = state.sessions.open_session("Math", "T01", "CSE-3A").unwrap();
            state.sessions.stop_session(&stopped.session_id).unwrap();
            let session = state.sessions.open_session("Math", "T01", "CSE-3A").unwrap();
            state
                .ledger
                .record_mark(
                    &state.sessions,
                    &student,
                    &session.session_id,
                    Evidence::qr_scan(true, false),
                )
                .unwrap();
            state
                .ledger
                .record_manual_marks(&state.identity, "Math", &["U1".to_string()], None, "T01")
                .unwrap();

            (session.session_id, stopped.session_id)
        };

        let wal = Wal::new(wal_path).unwrap();
        let operations = wal.replay().unwrap();
        let restored = state_with(Arc::new(MemoryJournal::default()), clock, &dir);
        apply_wal_operations(&restored, &operations).unwrap();

        assert_eq!(restored.identity.get_student("U1").unwrap().section, "CSE-3A");
        assert!(restored.identity.get_teacher("T01").is_some());
        assert!(restored.identity.get_classroom("A-101").is_some());
        assert_eq!(restored.ledger.len(), 2);

        let active = restored.sessions.get_active_session().unwrap();
        assert_eq!(active.session_id, session_id);
        assert!(!restored.sessions.get(&stopped_id).unwrap().active);

        // Uniqueness survives a restart
        let student = restored.identity.get_student("U1").unwrap();
        assert!(restored
            .ledger
            .record_mark(
                &restored.sessions,
                &student,
                &active.session_id,
                Evidence::qr_scan(false, false),
            )
            .is_err());
    }

    #[test]
    fn test_replay_sweeps_lapsed_sessions() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let journal = Arc::new(MemoryJournal::default());

        let state = state_with(journal.clone(), clock.clone(), &dir);
        state.sessions.open_session("Math", "T01", "CSE-3A").unwrap();
        let operations = journal.ops.lock().unwrap().clone();

        clock.advance(Duration::minutes(30));
        let restored = state_with(Arc::new(MemoryJournal::default()), clock, &dir);
        apply_wal_operations(&restored, &operations).unwrap();

        assert_eq!(restored.sessions.active_count(), 0);
        assert!(restored.sessions.get_active_session().is_none());
    }

    #[test]
    fn test_bootstrap_admin_once() {
        let dir = TempDir::new().unwrap();
        let journal = Arc::new(MemoryJournal::default());
        let state = state_with(journal.clone(), Arc::new(ManualClock::new(start())), &dir);
        let admin = AdminConfig {
            usn: "ADMIN".to_string(),
            name: "Administrator".to_string(),
            email: "admin@example.edu".to_string(),
            password: "change-me-now".to_string(),
        };

        assert!(bootstrap_admin(&state, &admin).unwrap());
        assert!(!bootstrap_admin(&state, &admin).unwrap());
        assert_eq!(journal.len(), 1);

        let user = state.identity.get_user("ADMIN").unwrap();
        assert!(user.is_admin);
        assert!(verify_password("change-me-now", &user.password_hash));
    }
}
