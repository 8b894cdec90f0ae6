use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub face: Option<FaceConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub admin: Option<AdminConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: Option<u16>,
    pub unix_socket: Option<PathBuf>,
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: i64,
    /// Seconds between background sweeps, 0 disables the task
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
    #[serde(default = "default_max_login_attempts_per_minute")]
    pub max_login_attempts_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_wal_path")]
    pub wal_path: PathBuf,
    #[serde(default = "default_face_dir")]
    pub face_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaceConfig {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_face_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_console")]
    pub console: bool,
}

/// Administrator created at startup when no user has this email yet
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub usn: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

// Default value functions
fn default_num_threads() -> usize {
    num_cpus::get()
}

fn default_ttl_seconds() -> i64 {
    600 // 10 minutes
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_token_ttl_minutes() -> i64 {
    1440 // 24 hours
}

fn default_max_login_attempts_per_minute() -> u32 {
    20
}

fn default_wal_path() -> PathBuf {
    PathBuf::from("attendance.wal")
}

fn default_face_dir() -> PathBuf {
    PathBuf::from("face_data")
}

fn default_face_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_console() -> bool {
    false
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_minutes: default_token_ttl_minutes(),
            max_login_attempts_per_minute: default_max_login_attempts_per_minute(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            wal_path: default_wal_path(),
            face_dir: default_face_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            console: default_console(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port.is_none() && self.server.unix_socket.is_none() {
            bail!("Either port or unix_socket must be specified in server config");
        }

        if let Some(port) = self.server.port {
            if port == 0 {
                bail!("Server port must be greater than 0");
            }
        }

        if self.server.num_threads == 0 {
            bail!("num_threads must be greater than 0");
        }

        if self.sessions.ttl_seconds <= 0 {
            bail!("sessions.ttl_seconds must be greater than 0");
        }

        if self.auth.token_ttl_minutes <= 0 {
            bail!("auth.token_ttl_minutes must be greater than 0");
        }

        if self.auth.max_login_attempts_per_minute == 0 {
            bail!("auth.max_login_attempts_per_minute must be greater than 0");
        }

        if self.storage.wal_path.as_os_str().is_empty() {
            bail!("storage.wal_path must not be empty");
        }

        if let Some(face) = &self.face {
            if face.endpoint.is_empty() {
                bail!("face.endpoint must not be empty");
            }
            if face.timeout_seconds == 0 {
                bail!("face.timeout_seconds must be greater than 0");
            }
        }

        if let Some(admin) = &self.admin {
            if admin.usn.is_empty() || admin.email.is_empty() {
                bail!("admin.usn and admin.email must not be empty");
            }
            if admin.password.len() < 8 {
                bail!("admin.password must be at least 8 characters");
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            );
        }

        let valid_formats = ["json", "console"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            bail!(
                "Invalid log format '{}'. Must be one of: json, console",
                self.logging.format
            );
        }

        Ok(())
    }

    /// Minimal valid config for in-process tests
    #[cfg(test)]
    pub fn for_tests(storage_root: &std::path::Path) -> Self {
        Config {
            server: ServerConfig {
                port: Some(8080),
                unix_socket: None,
                num_threads: 2,
            },
            sessions: SessionsConfig::default(),
            auth: AuthConfig {
                token_ttl_minutes: 60,
                max_login_attempts_per_minute: 3,
            },
            storage: StorageConfig {
                wal_path: storage_root.join("test.wal"),
                face_dir: storage_root.join("faces"),
            },
            face: None,
            logging: LoggingConfig::default(),
            admin: None,
        }
    }
}
