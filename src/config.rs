//! Runtime configuration.
//!
//! Built once at startup and handed to each component constructor.
//! Nothing in the crate reads the environment after `from_env` returns.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Application-level constants
pub const APP_NAME: &str = "Pulmo";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default timeout for the mail relay, in seconds.
const DEFAULT_MAIL_TIMEOUT_SECS: u64 = 20;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "pulmo_lib=info,pulmo=info,warn"
}

/// Default data root: ~/Pulmo/ (falls back to the working directory
/// when no home directory can be determined).
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Mail relay settings for the direct notification channel.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MailConfig {
    pub relay_url: Option<String>,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub from_address: String,
    pub timeout_secs: u64,
}

impl MailConfig {
    /// True when a real transport can be attempted.
    pub fn has_credentials(&self) -> bool {
        self.relay_url.as_deref().is_some_and(|u| !u.trim().is_empty())
            && !self.username.trim().is_empty()
            && !self.password.is_empty()
    }
}

/// Paths and credentials consumed by the triage core.
#[derive(Debug, Clone, Serialize)]
pub struct TriageConfig {
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub model_path: PathBuf,
    pub reports_dir: PathBuf,
    /// Internal alert queue (JSON array).
    pub alerts_path: PathBuf,
    /// Direct messages that could not reach a real transport.
    pub outbox_path: PathBuf,
    pub mail: MailConfig,
}

impl TriageConfig {
    /// Derive every path from a single data root.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            database_path: data_dir.join("database.db"),
            model_path: data_dir.join("models").join("pneumonia_model.onnx"),
            reports_dir: data_dir.join("reports"),
            alerts_path: data_dir.join("alerts_queue.json"),
            outbox_path: data_dir.join("outbox.json"),
            mail: MailConfig {
                timeout_secs: DEFAULT_MAIL_TIMEOUT_SECS,
                ..MailConfig::default()
            },
            data_dir,
        }
    }

    /// Build from `PULMO_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        Self::from_env_in(env_path("PULMO_DATA_DIR").unwrap_or_else(default_data_dir))
    }

    /// Like `from_env`, with the data root already chosen by the caller.
    pub fn from_env_in(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::with_data_dir(data_dir);

        if let Some(url) = env_string("PULMO_DATABASE_URL") {
            config.database_path = database_path_from_url(&url);
        }
        if let Some(path) = env_path("PULMO_MODEL_PATH") {
            config.model_path = path;
        }
        if let Some(path) = env_path("PULMO_REPORTS_DIR") {
            config.reports_dir = path;
        }

        config.mail.relay_url = env_string("PULMO_MAIL_RELAY_URL");
        config.mail.username = env_string("PULMO_MAIL_USER").unwrap_or_default();
        config.mail.password = env_string("PULMO_MAIL_PASSWORD").unwrap_or_default();
        config.mail.from_address = env_string("PULMO_MAIL_FROM")
            .unwrap_or_else(|| config.mail.username.clone());

        config
    }

    /// Create the data and reports directories if missing.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.reports_dir)?;
        if let Some(parent) = self.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn is_model_available(&self) -> bool {
        self.model_path.is_file()
    }
}

/// Accepts a bare filesystem path or a `sqlite:///path` URL.
pub fn database_path_from_url(url: &str) -> PathBuf {
    let trimmed = url.trim();
    match trimmed.strip_prefix("sqlite://") {
        Some(rest) => Path::new(rest).to_path_buf(),
        None => PathBuf::from(trimmed),
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_string(key).map(PathBuf::from)
}
