use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

const WINDOW_SECONDS: i64 = 60;

/// Per-IP throttle on failed logins over a fixed one-minute window.
///
/// Only failures are counted; a client that keeps logging in successfully is
/// never blocked.
pub struct LoginThrottle {
    failures: DashMap<IpAddr, (AtomicU32, AtomicI64)>,
    max_failures_per_minute: u32,
}

impl LoginThrottle {
    pub fn new(max_failures_per_minute: u32) -> Self {
        Self {
            failures: DashMap::new(),
            max_failures_per_minute,
        }
    }

    /// True when `ip` has used up its failures for the current window.
    pub fn is_blocked(&self, ip: IpAddr, current_time: i64) -> bool {
        match self.failures.get(&ip) {
            Some(entry) => {
                let (count, window_start) = entry.value();
                current_time - window_start.load(Ordering::Relaxed) < WINDOW_SECONDS
                    && count.load(Ordering::Relaxed) >= self.max_failures_per_minute
            }
            None => false,
        }
    }

    /// Count a failed attempt. Returns the failures seen in the current window.
    pub fn record_failure(&self, ip: IpAddr, current_time: i64) -> u32 {
        let entry = self
            .failures
            .entry(ip)
            .or_insert_with(|| (AtomicU32::new(0), AtomicI64::new(current_time)));

        let (count, window_start) = entry.value();
        if current_time - window_start.load(Ordering::Relaxed) >= WINDOW_SECONDS {
            window_start.store(current_time, Ordering::Relaxed);
            count.store(1, Ordering::Relaxed);
            return 1;
        }

        count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn cleanup_old_entries(&self, current_time: i64) {
        self.failures.retain(|_, (_, window_start)| {
            current_time - window_start.load(Ordering::Relaxed) < WINDOW_SECONDS
        });
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}
