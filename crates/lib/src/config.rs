//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.analyst/config.json`) and environment.
//! Every field has a default, so a missing file or `{}` is a valid config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Analysis backend settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Chat settings (quick actions).
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Where the backend lives and how long a request may take.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Base URL of the backend (default "http://127.0.0.1:8000"). Overridden by ANALYST_SERVER_URL env.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout for upload and chat, in seconds (default 120).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    crate::api::DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// A canned query: clicking it fills the input with `query` and sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickAction {
    pub label: String,
    pub query: String,
}

impl QuickAction {
    fn new(label: &str, query: &str) -> Self {
        Self {
            label: label.to_string(),
            query: query.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// Quick-action buttons, in display order.
    #[serde(default = "default_quick_actions")]
    pub quick_actions: Vec<QuickAction>,
}

fn default_quick_actions() -> Vec<QuickAction> {
    vec![
        QuickAction::new("💰 Total spend", "What is my total spend?"),
        QuickAction::new("📂 Top categories", "What are my top spending categories?"),
        QuickAction::new("🏪 Top merchants", "Who are my top 5 merchants by spend?"),
        QuickAction::new("📈 Spending chart", "Show a chart of my spending by category."),
    ]
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            quick_actions: default_quick_actions(),
        }
    }
}

/// Resolve the backend URL: env ANALYST_SERVER_URL overrides config.
pub fn resolve_server_url(config: &Config) -> String {
    std::env::var("ANALYST_SERVER_URL")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .unwrap_or_else(|| config.server.base_url.trim().to_string())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("ANALYST_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".analyst").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the default path (or ANALYST_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.server.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.server.timeout_secs, 120);
        assert_eq!(config.chat.quick_actions.len(), 4);
    }

    #[test]
    fn camel_case_keys_parse() {
        let config: Config = serde_json::from_str(
            r#"{"server":{"baseUrl":"http://10.0.0.2:9000","timeoutSecs":5},
                "chat":{"quickActions":[{"label":"Sum","query":"total?"}]}}"#,
        )
        .unwrap();
        assert_eq!(config.server.base_url, "http://10.0.0.2:9000");
        assert_eq!(config.server.timeout(), Duration::from_secs(5));
        assert_eq!(config.chat.quick_actions[0].query, "total?");
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let mut config = Config::default();
        config.server.timeout_secs = 0;
        assert_eq!(config.server.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("analyst-missing-{}.json", uuid::Uuid::new_v4()));
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.server.timeout_secs, 120);
    }
}
