//! Client configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the client can start with zero
//! configuration for local use.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use taskflow_shared::constants::DEFAULT_PROJECT_ID;
use taskflow_store::persist::default_state_path;
use taskflow_store::MemoryConfig;

/// Client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Backend project identifier.
    /// Env: `TASKFLOW_PROJECT_ID`
    /// Default: `taskflow-local`
    pub project_id: String,

    /// API key handed to the backend SDK. Redacted in `Debug` output.
    /// Env: `TASKFLOW_API_KEY`
    /// Default: none.
    pub api_key: Option<String>,

    /// Auth domain of the project.
    /// Env: `TASKFLOW_AUTH_DOMAIN`
    /// Default: `<project_id>.local`
    pub auth_domain: String,

    /// Whether email/password sign-in is enabled on the project.
    /// Env: `TASKFLOW_EMAIL_AUTH` (true/false)
    /// Default: `true`
    pub email_auth_enabled: bool,

    /// Whether guest (anonymous) sign-in is enabled on the project.
    /// Env: `TASKFLOW_ANONYMOUS_AUTH` (true/false)
    /// Default: `true`
    pub anonymous_auth_enabled: bool,

    /// Where backend state (and therefore the session) is persisted.
    /// Env: `TASKFLOW_STATE_PATH` (`none` or empty keeps state in memory)
    /// Default: the platform data directory.
    pub state_path: Option<PathBuf>,

    /// Artificial latency added to every backend request, in milliseconds.
    /// Env: `TASKFLOW_LATENCY_MS`
    /// Default: `0`
    pub latency_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            project_id: DEFAULT_PROJECT_ID.to_string(),
            api_key: None,
            auth_domain: format!("{DEFAULT_PROJECT_ID}.local"),
            email_auth_enabled: true,
            anonymous_auth_enabled: true,
            state_path: default_state_path().ok(),
            latency_ms: 0,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("project_id", &self.project_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("auth_domain", &self.auth_domain)
            .field("email_auth_enabled", &self.email_auth_enabled)
            .field("anonymous_auth_enabled", &self.anonymous_auth_enabled)
            .field("state_path", &self.state_path)
            .field("latency_ms", &self.latency_ms)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(id) = lookup("TASKFLOW_PROJECT_ID") {
            if !id.trim().is_empty() {
                config.project_id = id.trim().to_string();
                config.auth_domain = format!("{}.local", config.project_id);
            }
        }

        if let Some(key) = lookup("TASKFLOW_API_KEY") {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }

        if let Some(domain) = lookup("TASKFLOW_AUTH_DOMAIN") {
            config.auth_domain = domain;
        }

        if let Some(val) = lookup("TASKFLOW_EMAIL_AUTH") {
            match parse_flag(&val) {
                Some(enabled) => config.email_auth_enabled = enabled,
                None => {
                    tracing::warn!(value = %val, "Invalid TASKFLOW_EMAIL_AUTH, using default");
                }
            }
        }

        if let Some(val) = lookup("TASKFLOW_ANONYMOUS_AUTH") {
            match parse_flag(&val) {
                Some(enabled) => config.anonymous_auth_enabled = enabled,
                None => {
                    tracing::warn!(value = %val, "Invalid TASKFLOW_ANONYMOUS_AUTH, using default");
                }
            }
        }

        if let Some(path) = lookup("TASKFLOW_STATE_PATH") {
            let path = path.trim();
            config.state_path = if path.is_empty() || path.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }

        if let Some(val) = lookup("TASKFLOW_LATENCY_MS") {
            match val.trim().parse::<u64>() {
                Ok(ms) => config.latency_ms = ms,
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid TASKFLOW_LATENCY_MS, using default");
                }
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// Settings for the in-process backend.
    pub fn memory_config(&self) -> MemoryConfig {
        MemoryConfig {
            project_id: self.project_id.clone(),
            auth_domain: self.auth_domain.clone(),
            api_key: self.api_key.clone(),
            email_auth_enabled: self.email_auth_enabled,
            anonymous_auth_enabled: self.anonymous_auth_enabled,
            latency: Duration::from_millis(self.latency_ms),
            state_path: self.state_path.clone(),
        }
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
