//! Configuration and credential storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::auth::{StoredToken, TokenStore};
use crate::chat::HistoryPolicy;
use crate::models::Participant;

/// Service location used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000";

const ENDPOINT_ENV: &str = "DUOCHAT_ENDPOINT";
const TOKEN_ENV: &str = "DUOCHAT_TOKEN";

/// Application configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the chat service (real-time channel and history endpoint)
    pub endpoint: Option<String>,
    /// Stored bearer token
    pub token: Option<StoredToken>,
    /// Local participant id
    pub sender_id: Option<String>,
    /// Local participant role
    pub sender_role: Option<String>,
    /// How fetched history is reconciled with local messages
    #[serde(default)]
    pub history_policy: HistoryPolicy,
    /// Command-line `--endpoint`, never persisted
    #[serde(skip)]
    endpoint_override: Option<String>,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "duochat", "duochat")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains tokens)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Use `endpoint` for this run only.
    pub fn override_endpoint(&mut self, endpoint: impl Into<String>) {
        self.endpoint_override = Some(endpoint.into());
    }

    /// Effective endpoint: command line, environment, config file, then default.
    pub fn endpoint(&self) -> String {
        self.endpoint_override
            .clone()
            .or_else(|| {
                std::env::var(ENDPOINT_ENV)
                    .ok()
                    .filter(|s| !s.trim().is_empty())
            })
            .or_else(|| self.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// The configured local participant.
    pub fn participant(&self) -> Result<Participant> {
        let id = self
            .sender_id
            .as_deref()
            .context("No identity configured. Run `duochat whoami --id <ID> --role <ROLE>`.")?;
        let role = self
            .sender_role
            .as_deref()
            .context("No role configured. Run `duochat whoami --id <ID> --role <ROLE>`.")?;
        Ok(Participant::new(id, role))
    }

    pub fn set_participant(&mut self, participant: &Participant) {
        self.sender_id = Some(participant.id.clone());
        self.sender_role = Some(participant.role.clone());
    }
}

impl TokenStore for Config {
    fn get_token(&self) -> Option<StoredToken> {
        match std::env::var(TOKEN_ENV) {
            Ok(tok) if !tok.trim().is_empty() => Some(StoredToken::new(tok, None)),
            _ => self.token.clone(),
        }
    }

    fn set_token(&mut self, token: String, expires_in: Option<u64>) {
        self.token = Some(StoredToken::new(token, expires_in));
    }

    fn clear_tokens(&mut self) {
        self.token = None;
    }
}
