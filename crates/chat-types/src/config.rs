use crate::{ChatError, Result};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:3000/ws";

/// Relay server configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Upstream API credential. Required; absence fails startup.
    pub api_key: String,
    pub model: String,
    /// Override for OpenAI-compatible services
    pub api_base: Option<String>,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Read configuration from the environment. A missing `OPENAI_API_KEY`
    /// is a startup error, not a per-request one.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ChatError::Config("OPENAI_API_KEY is not set".to_string()))?;
        if api_key.trim().is_empty() {
            return Err(ChatError::Config("OPENAI_API_KEY is empty".to_string()));
        }

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ChatError::Config(format!("invalid PORT value: {raw}")))?,
            Err(_) => DEFAULT_PORT,
        };

        let allowed_origins = match std::env::var("ALLOWED_ORIGINS") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
        };

        Ok(Self {
            api_key,
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            api_base: std::env::var("OPENAI_API_BASE").ok(),
            port,
            allowed_origins,
        })
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint of the relay
    pub server_url: String,
    /// Override for the session storage directory
    pub data_dir: Option<std::path::PathBuf>,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            server_url: std::env::var("CHAT_SERVER_URL")
                .unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string()),
            data_dir: std::env::var("CHAT_DATA_DIR").ok().map(Into::into),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            data_dir: None,
        }
    }
}
