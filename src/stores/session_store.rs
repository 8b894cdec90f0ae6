use crate::core::error::AttendanceError;
use crate::models::session::{ActiveSession, SessionInfo};
use crate::utils::time::Clock;
use crate::wal::wal::{Journal, WalOperation};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Default)]
struct SessionTable {
    sessions: HashMap<String, ActiveSession>,
    /// Bumped on every open; the open that bumps it is the only active session
    version: u64,
}

impl SessionTable {
    fn deactivate_all(&mut self) -> usize {
        let mut count = 0;
        for session in self.sessions.values_mut().filter(|s| s.active) {
            session.active = false;
            count += 1;
        }
        count
    }
}

/// Session authority for QR attendance windows.
///
/// Enforces a system-wide "at most one active session" policy: opening a
/// session deactivates every other one under the same lock that inserts the
/// new one, so concurrent opens serialize and exactly one wins.
pub struct SessionStore {
    table: Mutex<SessionTable>,
    journal: Arc<dyn Journal>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(journal: Arc<dyn Journal>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            table: Mutex::new(SessionTable::default()),
            journal,
            clock,
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Open a new session, superseding whatever was active.
    pub fn open_session(
        &self,
        subject: &str,
        teacher_id: &str,
        section: &str,
    ) -> Result<ActiveSession, AttendanceError> {
        let now = self.clock.now();
        let session = ActiveSession {
            session_id: uuid::Uuid::new_v4().to_string(),
            subject: subject.to_string(),
            teacher_id: teacher_id.to_string(),
            section: section.to_string(),
            created_at: now,
            expires_at: now + self.ttl,
            active: true,
        };

        let mut table = self.lock();
        let version = table.version + 1;

        self.journal
            .append(&WalOperation::OpenSession {
                session: session.clone(),
                version,
            })
            .map_err(|e| AttendanceError::Storage(e.to_string()))?;

        let superseded = table.deactivate_all();
        table.version = version;
        table
            .sessions
            .insert(session.session_id.clone(), session.clone());
        drop(table);

        info!(
            session_id = %session.session_id,
            subject = %session.subject,
            teacher_id = %session.teacher_id,
            section = %session.section,
            expires_at = %session.expires_at,
            superseded = superseded,
            version = version,
            "QR session opened"
        );

        Ok(session)
    }

    /// Mark a session inactive. Stopping an already stopped session is a no-op.
    pub fn stop_session(&self, session_id: &str) -> Result<(), AttendanceError> {
        let mut table = self.lock();

        let is_active = match table.sessions.get(session_id) {
            Some(session) => session.active,
            None => {
                warn!(session_id = %session_id, "Stop requested for unknown session");
                return Err(AttendanceError::NotFound(format!("Session {}", session_id)));
            }
        };

        if !is_active {
            debug!(session_id = %session_id, "Session already inactive");
            return Ok(());
        }

        self.journal
            .append(&WalOperation::StopSession {
                session_id: session_id.to_string(),
            })
            .map_err(|e| AttendanceError::Storage(e.to_string()))?;

        if let Some(session) = table.sessions.get_mut(session_id) {
            session.active = false;
        }

        info!(session_id = %session_id, "QR session stopped");
        Ok(())
    }

    /// Deactivate every session whose expiry has passed. Returns how many flipped.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut table = self.lock();

        let mut swept = 0;
        for session in table.sessions.values_mut() {
            if session.active && session.is_expired(now) {
                session.active = false;
                swept += 1;
            }
        }

        if swept > 0 {
            debug!(swept = swept, "Expired sessions deactivated");
        }
        swept
    }

    /// The newest session that is still active and unexpired, after a lazy sweep.
    pub fn get_active_session(&self) -> Option<ActiveSession> {
        self.sweep_expired();

        let now = self.clock.now();
        let table = self.lock();
        table
            .sessions
            .values()
            .filter(|s| s.is_live(now))
            .max_by_key(|s| s.created_at)
            .cloned()
    }

    /// Check that a session exists and is still open for marking.
    pub fn verify_session(&self, session_id: &str) -> Result<SessionInfo, AttendanceError> {
        let session = self.live_session(session_id)?;
        Ok(session.info())
    }

    /// Fetch a session that must be live. NotFound and Expired are kept distinct.
    pub fn live_session(&self, session_id: &str) -> Result<ActiveSession, AttendanceError> {
        self.with_live_session(session_id, |session| Ok(session.clone()))
    }

    /// Run `f` against a live session with the table locked.
    ///
    /// The session cannot be stopped, superseded or swept until `f` returns.
    /// `f` must not call back into this store.
    pub fn with_live_session<T, F>(&self, session_id: &str, f: F) -> Result<T, AttendanceError>
    where
        F: FnOnce(&ActiveSession) -> Result<T, AttendanceError>,
    {
        let now = self.clock.now();
        let table = self.lock();
        let session = table
            .sessions
            .get(session_id)
            .ok_or_else(|| AttendanceError::NotFound(format!("Session {}", session_id)))?;

        if !session.is_live(now) {
            debug!(
                session_id = %session_id,
                active = session.active,
                expires_at = %session.expires_at,
                "Session is no longer live"
            );
            return Err(AttendanceError::Expired(session_id.to_string()));
        }

        f(session)
    }

    /// Any session, live or not
    pub fn get(&self, session_id: &str) -> Option<ActiveSession> {
        self.lock().sessions.get(session_id).cloned()
    }

    /// Ids of every session ever opened for a section
    pub fn session_ids_for_section(&self, section: &str) -> Vec<String> {
        self.lock()
            .sessions
            .values()
            .filter(|s| s.section == section)
            .map(|s| s.session_id.clone())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.lock().sessions.values().filter(|s| s.active).count()
    }

    pub fn version(&self) -> u64 {
        self.lock().version
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().sessions.is_empty()
    }

    /// Replay path: apply a logged open without journaling it again.
    pub fn restore_open(&self, session: ActiveSession, version: u64) {
        let mut table = self.lock();
        table.deactivate_all();
        table.version = table.version.max(version);
        table.sessions.insert(session.session_id.clone(), session);
    }

    /// Replay path: apply a logged stop without journaling it again.
    pub fn restore_stop(&self, session_id: &str) {
        if let Some(session) = self.lock().sessions.get_mut(session_id) {
            session.active = false;
        }
    }
}
