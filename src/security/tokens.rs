use crate::models::user::Principal;
use crate::utils::time::Clock;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

struct TokenEntry {
    principal: Principal,
    expires_at: DateTime<Utc>,
}

/// Opaque bearer tokens mapped to the principal they were issued for.
///
/// Tokens live only in memory; a restart logs everyone out.
pub struct TokenStore {
    tokens: DashMap<String, TokenEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            tokens: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Issue a fresh token (32 random bytes, hex encoded).
    pub fn issue(&self, principal: Principal) -> (String, DateTime<Utc>) {
        let bytes: [u8; 32] = rand::random();
        let token = hex::encode(bytes);
        let expires_at = self.clock.now() + self.ttl;

        debug!(usn = %principal.usn, "Bearer token issued");
        self.tokens.insert(
            token.clone(),
            TokenEntry {
                principal,
                expires_at,
            },
        );
        (token, expires_at)
    }

    /// Principal for a token, if it exists and has not expired.
    /// Expired tokens are dropped on access.
    pub fn resolve(&self, token: &str) -> Option<Principal> {
        let now = self.clock.now();
        {
            let entry = self.tokens.get(token)?;
            if now < entry.expires_at {
                return Some(entry.principal.clone());
            }
        }

        self.tokens.remove(token);
        debug!("Expired bearer token removed");
        None
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.remove(token).is_some()
    }

    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.tokens.len();
        self.tokens.retain(|_, entry| now < entry.expires_at);
        before - self.tokens.len()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
