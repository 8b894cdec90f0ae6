use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which signals were present when a mark was made. Informational only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub qr: bool,
    pub location: bool,
    pub face: bool,
}

impl Evidence {
    pub fn qr_scan(location: bool, face: bool) -> Self {
        Self {
            qr: true,
            location,
            face,
        }
    }
}

/// Append-only attendance fact. Never mutated or deleted once written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: u64,
    pub usn: String,
    /// Name as it was when the mark was made; later renames do not touch history
    pub student_name: String,
    /// QR session id, or the `manual-...` grouping key of a teacher override
    pub session_id: String,
    pub classroom_id: Option<i64>,
    pub subject: String,
    pub qr: bool,
    pub location: bool,
    pub face: bool,
    pub by_teacher: bool,
    pub timestamp: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn evidence(&self) -> Evidence {
        Evidence {
            qr: self.qr,
            location: self.location,
            face: self.face,
        }
    }
}

/// Result of a manual override batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManualMarkOutcome {
    /// Usns that were written, in request order
    pub marked: Vec<String>,
    pub session_id: String,
}
