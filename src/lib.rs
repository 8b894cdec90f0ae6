pub mod core {
    pub mod config;
    pub mod error;
    pub mod routes;
    pub mod startup;
    pub mod state;
    pub mod tracing_init;
}

pub mod face {
    pub mod client;
    pub mod images;
}

pub mod handlers {
    pub mod admin;
    pub mod attendance;
    pub mod auth;
    pub mod face;
    pub mod fallback;
    pub mod health;
    pub mod metrics;
    pub mod override_marks;
    pub mod profile;
    pub mod qr;
}

pub mod metrics {
    pub mod collector;
}

pub mod models {
    pub mod admin;
    pub mod attendance;
    pub mod classroom;
    pub mod payloads;
    pub mod session;
    pub mod user;
}

pub mod policy {
    pub mod eligibility;
    pub mod evidence;
}

pub mod reports {
    pub mod filter;
    pub mod stats;
}

pub mod security {
    pub mod auth_layer;
    pub mod password;
    pub mod rate_limiter;
    pub mod tokens;
}

pub mod stores {
    pub mod identity_store;
    pub mod ledger;
    pub mod session_store;
}

pub mod utils {
    pub mod client_ip;
    pub mod time;
}

pub mod validation {
    pub mod payloads;
}

pub mod wal {
    pub mod wal;
}
