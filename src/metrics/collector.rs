use crate::stores::identity_store::IdentityStore;
use crate::stores::ledger::AttendanceLedger;
use crate::stores::session_store::SessionStore;
use crate::utils::time::current_timestamp;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

pub struct Metrics {
    pub sessions_opened: AtomicU64,
    pub marks_recorded: AtomicU64,
    pub marks_rejected: AtomicU64,
    pub manual_marks: AtomicU64,
    pub failed_logins: AtomicU64,
    pub start_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub sessions_opened: u64,
    pub marks_recorded: u64,
    pub marks_rejected: u64,
    pub manual_marks: u64,
    pub failed_logins: u64,
    pub rejection_rate: f64,
    pub users: usize,
    pub students: usize,
    pub teachers: usize,
    pub session_active: bool,
    pub ledger_size: usize,
    pub uptime_seconds: i64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            sessions_opened: AtomicU64::new(0),
            marks_recorded: AtomicU64::new(0),
            marks_rejected: AtomicU64::new(0),
            manual_marks: AtomicU64::new(0),
            failed_logins: AtomicU64::new(0),
            start_time: current_timestamp(),
        }
    }

    pub fn increment_sessions_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_marks_recorded(&self) {
        self.marks_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_marks_rejected(&self) {
        self.marks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_manual_marks(&self, count: u64) {
        self.manual_marks.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_failed_logins(&self) {
        self.failed_logins.fetch_add(1, Ordering::Relaxed);
    }

    /// Counters plus live store sizes. `session_active` triggers the lazy expiry sweep.
    pub fn get_snapshot(
        &self,
        identity: &IdentityStore,
        sessions: &SessionStore,
        ledger: &AttendanceLedger,
    ) -> MetricsSnapshot {
        let marks_recorded = self.marks_recorded.load(Ordering::Relaxed);
        let marks_rejected = self.marks_rejected.load(Ordering::Relaxed);

        let attempts = marks_recorded + marks_rejected;
        let rejection_rate = if attempts > 0 {
            (marks_rejected as f64 / attempts as f64) * 100.0
        } else {
            0.0
        };

        MetricsSnapshot {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            marks_recorded,
            marks_rejected,
            manual_marks: self.manual_marks.load(Ordering::Relaxed),
            failed_logins: self.failed_logins.load(Ordering::Relaxed),
            rejection_rate,
            users: identity.user_count(),
            students: identity.student_count(),
            teachers: identity.teacher_count(),
            session_active: sessions.get_active_session().is_some(),
            ledger_size: ledger.len(),
            uptime_seconds: current_timestamp() - self.start_time,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
