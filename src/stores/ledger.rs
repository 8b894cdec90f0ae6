use crate::core::error::AttendanceError;
use crate::models::attendance::{AttendanceRecord, Evidence, ManualMarkOutcome};
use crate::models::user::Student;
use crate::policy::eligibility::check_eligibility;
use crate::stores::identity_store::IdentityStore;
use crate::stores::session_store::SessionStore;
use crate::utils::time::Clock;
use crate::wal::wal::{Journal, WalOperation};
use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

#[derive(Default)]
struct LedgerTable {
    records: Vec<AttendanceRecord>,
    /// (usn, session_id) of every QR mark. Manual overrides are not indexed.
    qr_marks: HashSet<(String, String)>,
    next_id: u64,
}

impl LedgerTable {
    fn push(&mut self, record: AttendanceRecord) {
        if !record.by_teacher {
            self.qr_marks
                .insert((record.usn.clone(), record.session_id.clone()));
        }
        self.next_id = self.next_id.max(record.id + 1);
        self.records.push(record);
    }
}

/// Grouping key shared by every override a teacher makes for one subject
pub fn manual_session_id(actor: &str, subject: &str) -> String {
    format!("manual-{}-{}", actor, subject.replace(' ', "_"))
}

/// Append-only attendance ledger.
pub struct AttendanceLedger {
    table: RwLock<LedgerTable>,
    journal: Arc<dyn Journal>,
    clock: Arc<dyn Clock>,
}

impl AttendanceLedger {
    pub fn new(journal: Arc<dyn Journal>, clock: Arc<dyn Clock>) -> Self {
        Self {
            table: RwLock::new(LedgerTable {
                next_id: 1,
                ..Default::default()
            }),
            journal,
            clock,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerTable> {
        self.table.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerTable> {
        self.table.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a QR mark for `student` against a live session.
    ///
    /// The session is resolved from `sessions` under the ledger write lock
    /// and stays locked until the record is journaled, so a stop or a newer
    /// session cannot slip in between the check and the append. Rejects with
    /// NotFound or Expired for a session that is not live, Forbidden on
    /// section mismatch, and Conflict if this student already marked it.
    ///
    /// Lock order is ledger then sessions.
    pub fn record_mark(
        &self,
        sessions: &SessionStore,
        student: &Student,
        session_id: &str,
        evidence: Evidence,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let mut table = self.write();

        let record = sessions.with_live_session(session_id, |session| {
            check_eligibility(student, session)?;

            let key = (student.usn.clone(), session.session_id.clone());
            if table.qr_marks.contains(&key) {
                warn!(
                    usn = %student.usn,
                    session_id = %session.session_id,
                    "Duplicate attendance mark rejected"
                );
                return Err(AttendanceError::Conflict(format!(
                    "{} has already marked attendance for session {}",
                    student.usn, session.session_id
                )));
            }

            let record = AttendanceRecord {
                id: table.next_id,
                usn: student.usn.clone(),
                student_name: student.name.clone(),
                session_id: session.session_id.clone(),
                classroom_id: None,
                subject: session.subject.clone(),
                qr: evidence.qr,
                location: evidence.location,
                face: evidence.face,
                by_teacher: false,
                timestamp: self.clock.now(),
            };

            self.journal
                .append(&WalOperation::RecordMark {
                    record: record.clone(),
                })
                .map_err(|e| AttendanceError::Storage(e.to_string()))?;
            table.push(record.clone());
            Ok(record)
        })?;
        drop(table);

        info!(
            attendance_id = record.id,
            usn = %record.usn,
            session_id = %record.session_id,
            qr = record.qr,
            location = record.location,
            face = record.face,
            "Attendance marked"
        );

        Ok(record)
    }

    /// Teacher override for a batch of students.
    ///
    /// Unknown usns are skipped silently and repeated usns collapse to one
    /// mark. The batch is one journal entry: either every record lands or
    /// none does.
    pub fn record_manual_marks(
        &self,
        identity: &IdentityStore,
        subject: &str,
        usns: &[String],
        classroom_id: Option<i64>,
        actor: &str,
    ) -> Result<ManualMarkOutcome, AttendanceError> {
        let session_id = manual_session_id(actor, subject);
        let now = self.clock.now();

        let mut seen = HashSet::new();
        let students: Vec<Student> = usns
            .iter()
            .filter(|usn| seen.insert(usn.as_str()))
            .filter_map(|usn| {
                let student = identity.get_student(usn);
                if student.is_none() {
                    debug!(usn = %usn, "Unknown usn skipped in manual override");
                }
                student
            })
            .collect();

        let mut table = self.write();
        let first_id = table.next_id;
        let records: Vec<AttendanceRecord> = students
            .into_iter()
            .enumerate()
            .map(|(i, student)| AttendanceRecord {
                id: first_id + i as u64,
                usn: student.usn,
                student_name: student.name,
                session_id: session_id.clone(),
                classroom_id,
                subject: subject.to_string(),
                qr: false,
                location: false,
                face: false,
                by_teacher: true,
                timestamp: now,
            })
            .collect();

        let marked: Vec<String> = records.iter().map(|r| r.usn.clone()).collect();

        if !records.is_empty() {
            self.journal
                .append(&WalOperation::RecordBatch {
                    records: records.clone(),
                })
                .map_err(|e| {
                    warn!(
                        session_id = %session_id,
                        batch_size = records.len(),
                        error = %e,
                        "Manual override batch rolled back"
                    );
                    AttendanceError::BatchFailure(e.to_string())
                })?;

            for record in records {
                table.push(record);
            }
        }
        drop(table);

        info!(
            session_id = %session_id,
            actor = %actor,
            subject = %subject,
            requested = usns.len(),
            marked = marked.len(),
            "Manual override recorded"
        );

        Ok(ManualMarkOutcome { marked, session_id })
    }

    pub fn records_for_session(&self, session_id: &str) -> Vec<AttendanceRecord> {
        self.query(|r| r.session_id == session_id)
    }

    pub fn records_for_usn(&self, usn: &str) -> Vec<AttendanceRecord> {
        self.query(|r| r.usn == usn)
    }

    /// Records matching `predicate`, in write order
    pub fn query<F>(&self, predicate: F) -> Vec<AttendanceRecord>
    where
        F: Fn(&AttendanceRecord) -> bool,
    {
        self.read()
            .records
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().records.is_empty()
    }

    /// Replay path: apply logged records without journaling them again.
    pub fn restore(&self, records: Vec<AttendanceRecord>) {
        let mut table = self.write();
        for record in records {
            table.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::identity_store::fixtures::new_student;
    use crate::utils::time::ManualClock;
    use crate::wal::wal::testing::MemoryJournal;
    use chrono::{Duration, TimeZone, Utc};

    struct Fixture {
        ledger: AttendanceLedger,
        sessions: SessionStore,
        identity: IdentityStore,
        clock: Arc<ManualClock>,
        journal: Arc<MemoryJournal>,
    }

    fn setup() -> Fixture {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 9, 2, 9, 0, 0).unwrap(),
        ));
        let journal = Arc::new(MemoryJournal::default());
        let identity = IdentityStore::new(Arc::new(MemoryJournal::default()));
        identity.create_student(new_student("U1", "Asha", "CSE-3A")).unwrap();
        identity.create_student(new_student("U2", "Ravi", "CSE-3A")).unwrap();
        identity.create_student(new_student("U3", "Meera", "CSE-3B")).unwrap();

        Fixture {
            ledger: AttendanceLedger::new(journal.clone(), clock.clone()),
            sessions: SessionStore::new(
                Arc::new(MemoryJournal::default()),
                clock.clone(),
                Duration::minutes(10),
            ),
            identity,
            clock,
            journal,
        }
    }

    /// Open a Math session for `section` and return its id
    fn open(f: &Fixture, section: &str) -> String {
        f.sessions.open_session("Math", "T01", section).unwrap().session_id
    }

    #[test]
    fn test_record_mark_snapshot_fields() {
        let f = setup();
        let student = f.identity.get_student("U1").unwrap();
        let session_id = open(&f, "CSE-3A");

        let record = f
            .ledger
            .record_mark(&f.sessions, &student, &session_id, Evidence::qr_scan(true, false))
            .unwrap();

        assert_eq!(record.usn, "U1");
        assert_eq!(record.student_name, "Asha");
        assert_eq!(record.session_id, session_id);
        assert_eq!(record.subject, "Math");
        assert!(record.qr && record.location && !record.face);
        assert!(!record.by_teacher);
        assert_eq!(record.timestamp, f.clock.now());
        assert_eq!(f.journal.len(), 1);
    }

    #[test]
    fn test_record_mark_wrong_section_forbidden() {
        let f = setup();
        let student = f.identity.get_student("U3").unwrap();
        let session_id = open(&f, "CSE-3A");

        let result =
            f.ledger
                .record_mark(&f.sessions, &student, &session_id, Evidence::qr_scan(false, false));
        assert!(matches!(result, Err(AttendanceError::Forbidden(_))));
        assert!(f.ledger.is_empty());
        assert_eq!(f.journal.len(), 0);
    }

    #[test]
    fn test_record_mark_expired_session() {
        let f = setup();
        let student = f.identity.get_student("U1").unwrap();
        let session_id = open(&f, "CSE-3A");
        f.clock.advance(Duration::minutes(10));

        let result =
            f.ledger
                .record_mark(&f.sessions, &student, &session_id, Evidence::qr_scan(false, false));
        assert!(matches!(result, Err(AttendanceError::Expired(_))));
    }

    #[test]
    fn test_record_mark_unknown_session() {
        let f = setup();
        let student = f.identity.get_student("U1").unwrap();

        let result =
            f.ledger
                .record_mark(&f.sessions, &student, "no-such-session", Evidence::qr_scan(false, false));
        assert!(matches!(result, Err(AttendanceError::NotFound(_))));
    }

    #[test]
    fn test_record_mark_rejects_session_stopped_after_lookup() {
        let f = setup();
        let student = f.identity.get_student("U1").unwrap();
        let session_id = open(&f, "CSE-3A");

        // The caller saw a live session, then the teacher stopped it
        let seen = f.sessions.live_session(&session_id).unwrap();
        assert!(seen.active);
        f.sessions.stop_session(&session_id).unwrap();

        let result =
            f.ledger
                .record_mark(&f.sessions, &student, &seen.session_id, Evidence::qr_scan(true, true));
        assert!(matches!(result, Err(AttendanceError::Expired(_))));
        assert!(f.ledger.is_empty());
        assert_eq!(f.journal.len(), 0);
    }

    #[test]
    fn test_record_mark_rejects_superseded_session() {
        let f = setup();
        let student = f.identity.get_student("U1").unwrap();
        let old = open(&f, "CSE-3A");
        let seen = f.sessions.live_session(&old).unwrap();
        let current = open(&f, "CSE-3A");

        let result =
            f.ledger
                .record_mark(&f.sessions, &student, &seen.session_id, Evidence::qr_scan(false, false));
        assert!(matches!(result, Err(AttendanceError::Expired(_))));
        assert_eq!(f.journal.len(), 0);

        assert!(f
            .ledger
            .record_mark(&f.sessions, &student, &current, Evidence::qr_scan(false, false))
            .is_ok());
    }

    #[test]
    fn test_duplicate_mark_conflict() {
        let f = setup();
        let student = f.identity.get_student("U1").unwrap();
        let session_id = open(&f, "CSE-3A");

        f.ledger
            .record_mark(&f.sessions, &student, &session_id, Evidence::qr_scan(false, false))
            .unwrap();
        let again =
            f.ledger
                .record_mark(&f.sessions, &student, &session_id, Evidence::qr_scan(true, true));

        assert!(matches!(again, Err(AttendanceError::Conflict(_))));
        assert_eq!(f.ledger.records_for_session(&session_id).len(), 1);

        // Same student, different session is fine
        let other = open(&f, "CSE-3A");
        assert!(f
            .ledger
            .record_mark(&f.sessions, &student, &other, Evidence::qr_scan(false, false))
            .is_ok());
    }

    #[test]
    fn test_concurrent_duplicate_marks_one_wins() {
        let f = setup();
        let session_id = open(&f, "CSE-3A");
        let student = f.identity.get_student("U1").unwrap();
        let ledger = Arc::new(f.ledger);
        let sessions = Arc::new(f.sessions);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let sessions = Arc::clone(&sessions);
                let student = student.clone();
                let session_id = session_id.clone();
                std::thread::spawn(move || {
                    ledger
                        .record_mark(&sessions, &student, &session_id, Evidence::qr_scan(false, false))
                        .is_ok()
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_marks_racing_a_stop_are_all_before_it() {
        let f = setup();
        let session_id = open(&f, "CSE-3A");
        let ledger = Arc::new(f.ledger);
        let sessions = Arc::new(f.sessions);
        let journal = f.journal;

        let handles: Vec<_> = ["U1", "U2"]
            .into_iter()
            .map(|usn| {
                let ledger = Arc::clone(&ledger);
                let sessions = Arc::clone(&sessions);
                let student = f.identity.get_student(usn).unwrap();
                let session_id = session_id.clone();
                std::thread::spawn(move || {
                    ledger.record_mark(&sessions, &student, &session_id, Evidence::qr_scan(false, false))
                })
            })
            .collect();
        sessions.stop_session(&session_id).unwrap();

        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) | Err(AttendanceError::Expired(_)) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        // Whatever landed was journaled while the session was still live
        assert_eq!(journal.len(), ledger.len());
        assert!(!sessions.get(&session_id).unwrap().active);
        let late = f.identity.get_student("U1").unwrap();
        assert!(ledger
            .record_mark(&sessions, &late, &session_id, Evidence::qr_scan(false, false))
            .is_err());
    }

    #[test]
    fn test_manual_marks_skip_unknown() {
        let f = setup();
        let usns = vec!["U1".to_string(), "U2".to_string(), "UNKNOWN".to_string()];

        let outcome = f
            .ledger
            .record_manual_marks(&f.identity, "Physics", &usns, Some(1), "T01")
            .unwrap();

        assert_eq!(outcome.marked, vec!["U1".to_string(), "U2".to_string()]);
        assert_eq!(outcome.session_id, "manual-T01-Physics");

        let records = f.ledger.records_for_session("manual-T01-Physics");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.by_teacher && !r.qr && !r.location && !r.face));
        assert!(records.iter().all(|r| r.classroom_id == Some(1)));
        // One journal entry for the whole batch
        assert_eq!(f.journal.len(), 1);
    }

    #[test]
    fn test_manual_session_id_is_deterministic() {
        assert_eq!(
            manual_session_id("T01", "Computer Networks"),
            "manual-T01-Computer_Networks"
        );
        assert_eq!(
            manual_session_id("T01", "Computer Networks"),
            manual_session_id("T01", "Computer Networks")
        );
    }

    #[test]
    fn test_manual_marks_repeatable_and_deduped_within_batch() {
        let f = setup();
        let usns = vec!["U1".to_string(), "U1".to_string()];

        let first = f
            .ledger
            .record_manual_marks(&f.identity, "Physics", &usns, None, "T01")
            .unwrap();
        assert_eq!(first.marked, vec!["U1".to_string()]);

        let second = f
            .ledger
            .record_manual_marks(&f.identity, "Physics", &usns, None, "T01")
            .unwrap();
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(f.ledger.records_for_usn("U1").len(), 2);
    }

    #[test]
    fn test_manual_marks_roll_back_on_write_failure() {
        let f = setup();
        f.journal.set_failing(true);
        let usns = vec!["U1".to_string(), "U2".to_string()];

        let result = f
            .ledger
            .record_manual_marks(&f.identity, "Physics", &usns, None, "T01");

        assert!(matches!(result, Err(AttendanceError::BatchFailure(_))));
        assert!(f.ledger.is_empty());

        // Ids were not consumed by the failed batch
        f.journal.set_failing(false);
        let outcome = f
            .ledger
            .record_manual_marks(&f.identity, "Physics", &usns, None, "T01")
            .unwrap();
        assert_eq!(outcome.marked.len(), 2);
        assert_eq!(f.ledger.records_for_usn("U1")[0].id, 1);
    }

    #[test]
    fn test_manual_marks_all_unknown_writes_nothing() {
        let f = setup();
        let outcome = f
            .ledger
            .record_manual_marks(&f.identity, "Physics", &["X".to_string()], None, "T01")
            .unwrap();
        assert!(outcome.marked.is_empty());
        assert_eq!(f.journal.len(), 0);
    }

    #[test]
    fn test_restore_rebuilds_duplicate_index() {
        let f = setup();
        let student = f.identity.get_student("U1").unwrap();
        let session_id = open(&f, "CSE-3A");
        let record = AttendanceRecord {
            id: 10,
            usn: "U1".to_string(),
            student_name: "Asha".to_string(),
            session_id: session_id.clone(),
            classroom_id: None,
            subject: "Math".to_string(),
            qr: true,
            location: false,
            face: false,
            by_teacher: false,
            timestamp: f.clock.now(),
        };
        f.ledger.restore(vec![record]);

        let again =
            f.ledger
                .record_mark(&f.sessions, &student, &session_id, Evidence::qr_scan(false, false));
        assert!(matches!(again, Err(AttendanceError::Conflict(_))));

        let other = f.identity.get_student("U2").unwrap();
        let next = f
            .ledger
            .record_mark(&f.sessions, &other, &session_id, Evidence::qr_scan(false, false))
            .unwrap();
        assert_eq!(next.id, 11);
    }
}
