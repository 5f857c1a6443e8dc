use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::session::SessionConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { listen_addr: default_listen_addr() }
    }
}

/// Per-session settings as they appear in the configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub buffer_capacity: usize,
    pub max_request_size: usize,
    /// Deadline for the first request on a fresh connection.
    pub read_timeout_ms: Option<u64>,
    /// Deadline for each following request on a kept-alive connection.
    pub idle_timeout_ms: Option<u64>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            buffer_capacity: defaults.buffer_capacity,
            max_request_size: defaults.max_request_size,
            read_timeout_ms: None,
            idle_timeout_ms: None,
        }
    }
}

impl SessionSettings {
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            buffer_capacity: self.buffer_capacity,
            max_request_size: self.max_request_size,
            idle_timeout: self.idle_timeout_ms.map(Duration::from_millis),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

impl Config {
    /// Loads the file named by `CONFIG` (if set), then applies `LISTEN`.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG").ok();
        let listen = std::env::var("LISTEN").ok();
        Self::resolve(path.as_deref().map(Path::new), listen)
    }

    pub fn resolve(path: Option<&Path>, listen_override: Option<String>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                Self::from_yaml(&raw)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => Self::default(),
        };

        if let Some(listen_addr) = listen_override {
            cfg.server.listen_addr = listen_addr;
        }
        Ok(cfg)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }
}
