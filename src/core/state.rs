// Application state (AppState)

use crate::core::config::Config;
use crate::face::client::{FaceMatcher, HttpFaceMatcher};
use crate::metrics::collector::Metrics;
use crate::security::{rate_limiter::LoginThrottle, tokens::TokenStore};
use crate::stores::{
    identity_store::IdentityStore, ledger::AttendanceLedger, session_store::SessionStore,
};
use crate::utils::time::{Clock, SystemClock};
use crate::wal::wal::{Journal, Wal};
use anyhow::Result;
use chrono::Duration;
use std::sync::Arc;

/// Shared application state
///
/// Every store journals through the same write-ahead log, and every
/// time-dependent decision reads the same clock.
#[derive(Clone)]
pub struct AppState {
    /// Users, students, teachers, classrooms
    pub identity: Arc<IdentityStore>,

    /// QR sessions and the single-active-session rule
    pub sessions: Arc<SessionStore>,

    /// Attendance records
    pub ledger: Arc<AttendanceLedger>,

    /// Bearer tokens issued at login
    pub tokens: Arc<TokenStore>,

    /// Failed-login throttle
    pub login_throttle: Arc<LoginThrottle>,

    /// Face-match service, when configured
    pub face: Option<Arc<dyn FaceMatcher>>,

    pub metrics: Arc<Metrics>,

    pub clock: Arc<dyn Clock>,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, wal: Wal) -> Result<Self> {
        let face: Option<Arc<dyn FaceMatcher>> = match &config.face {
            Some(face) => Some(Arc::new(HttpFaceMatcher::new(
                face.endpoint.clone(),
                face.api_key.clone(),
                face.timeout_seconds,
            )?)),
            None => None,
        };

        Ok(Self::with_parts(config, Arc::new(wal), Arc::new(SystemClock), face))
    }

    pub fn with_parts(
        config: Config,
        journal: Arc<dyn Journal>,
        clock: Arc<dyn Clock>,
        face: Option<Arc<dyn FaceMatcher>>,
    ) -> Self {
        let config = Arc::new(config);

        let sessions = SessionStore::new(
            journal.clone(),
            clock.clone(),
            Duration::seconds(config.sessions.ttl_seconds),
        );
        let tokens = TokenStore::new(
            Duration::minutes(config.auth.token_ttl_minutes),
            clock.clone(),
        );

        Self {
            identity: Arc::new(IdentityStore::new(journal.clone())),
            sessions: Arc::new(sessions),
            ledger: Arc::new(AttendanceLedger::new(journal, clock.clone())),
            tokens: Arc::new(tokens),
            login_throttle: Arc::new(LoginThrottle::new(
                config.auth.max_login_attempts_per_minute,
            )),
            face,
            metrics: Arc::new(Metrics::new()),
            clock,
            config,
        }
    }
}
