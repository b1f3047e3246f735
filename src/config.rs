use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::device::types::Platform;
use crate::errors::TapsightResult;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub device: DeviceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub active_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
    /// Role-to-model mapping. If a role is absent, falls back to active_provider defaults.
    #[serde(default)]
    pub roles: RolesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    /// Full chat-completions URL.
    pub api_base: String,
    /// Default model for this provider (used as fallback when no role config exists).
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Optional API key stored in config.toml (falls back to env var TAPSIGHT_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Screen analysis during goal runs and exploration. Must accept images.
    pub vision: Option<RoleEntry>,
    /// Free-form "how do I get unstuck" advice.
    pub recovery: Option<RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under [llm.providers.*].
    pub provider: String,
    /// Model name sent to the API.
    pub model: String,
    #[serde(default)]
    pub stream: bool,
    /// Overrides the provider-level temperature for this role.
    pub temperature: Option<f64>,
}

fn default_temperature() -> f64 {
    0.1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub max_steps: usize,
    pub settle_delay_ms: u64,
    pub recovery_wait_ms: u64,
    /// Number of previous steps summarised into each prompt.
    pub context_window: usize,
    pub max_run_duration_secs: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            settle_delay_ms: 1000,
            recovery_wait_ms: 3000,
            context_window: 5,
            max_run_duration_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub max_steps: usize,
    pub max_screens: usize,
    /// Case-insensitive substrings; matching elements are never chosen.
    pub avoid: Vec<String>,
    /// Element types in descending priority. Unlisted types sort last.
    pub priority: Vec<String>,
    pub placeholder_text: String,
    /// Consecutive action failures before a forced back-navigation.
    pub failure_threshold: u32,
    pub settle_delay_ms: u64,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            max_screens: 20,
            avoid: [
                "logout",
                "log out",
                "sign out",
                "delete",
                "remove account",
                "cancel subscription",
                "unsubscribe",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            priority: ["tab", "button", "input", "toggle", "list"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            placeholder_text: "test".to_string(),
            failure_threshold: 3,
            settle_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub adb_path: String,
    /// Target a specific device (`adb -s`). None uses the only attached device.
    pub serial: Option<String>,
    pub artifacts_dir: PathBuf,
    pub scroll_distance_px: u32,
    /// Narrows the scroll-container search. None tries every platform.
    pub platform: Option<Platform>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: "adb".to_string(),
            serial: None,
            artifacts_dir: default_artifacts_dir(),
            scroll_distance_px: 300,
            platform: None,
        }
    }
}

/// `<local data dir>/tapsight/artifacts`, falling back to `./tapsight-artifacts`.
fn default_artifacts_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tapsight").join("artifacts"))
        .unwrap_or_else(|| PathBuf::from("tapsight-artifacts"))
}

/// Looks for `config.toml` next to the executable, then in the working directory.
fn find_config_path() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Some(candidate);
            }
        }
    }

    let candidate = std::env::current_dir().ok()?.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Some(candidate);
    }
    None
}

/// Load the discovered `config.toml`. Defaults are used only when no file
/// exists; a file that fails to read or parse is an error.
pub fn load_config() -> TapsightResult<AppConfig> {
    load_discovered(find_config_path())
}

fn load_discovered(found: Option<PathBuf>) -> TapsightResult<AppConfig> {
    match found {
        Some(path) => load_config_from(&path),
        None => {
            tracing::warn!("config.toml not found next to executable or in working directory, using defaults");
            Ok(AppConfig::default())
        }
    }
}

pub fn load_config_from(path: &Path) -> TapsightResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &Path) -> TapsightResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
