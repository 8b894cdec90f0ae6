use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One QR attendance window.
///
/// `active` only ever goes from true to false. A session stays "active" in
/// storage until something sweeps it, so liveness must always be judged with
/// [`ActiveSession::is_live`], never with the flag alone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub session_id: String,
    pub subject: String,
    pub teacher_id: String,
    pub section: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
}

impl ActiveSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        crate::utils::time::is_past(self.expires_at, now)
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired(now)
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            subject: self.subject.clone(),
            teacher_id: self.teacher_id.clone(),
            section: self.section.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub subject: String,
    pub teacher_id: String,
    pub section: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn session(active: bool) -> ActiveSession {
        let created = Utc.with_ymd_and_hms(2024, 9, 2, 9, 0, 0).unwrap();
        ActiveSession {
            session_id: "s-1".to_string(),
            subject: "Math".to_string(),
            teacher_id: "T01".to_string(),
            section: "CSE-3A".to_string(),
            created_at: created,
            expires_at: created + Duration::minutes(10),
            active,
        }
    }

    #[test]
    fn test_live_requires_flag_and_time() {
        let s = session(true);
        assert!(s.is_live(s.created_at + Duration::minutes(9)));
        assert!(!s.is_live(s.expires_at));

        let stopped = session(false);
        assert!(!stopped.is_live(stopped.created_at));
    }

    #[test]
    fn test_flag_set_but_expired_is_not_live() {
        let s = session(true);
        let later = s.created_at + Duration::minutes(11);
        assert!(s.active);
        assert!(s.is_expired(later));
        assert!(!s.is_live(later));
    }
}
