//! Read-only typed configuration view, loaded from TOML with environment
//! variable overrides. Ported from the `aish.config` prototype. Swapped
//! atomically on `reload_config` via [`ConfigHandle`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Deserialize;

const PRODUCT_ENV_KEY: &str = "SHELLASSIST_API_KEY";

/// Programs that capture full-screen or interactive output; proactive
/// suggestions skip session-buffer capture after running one of these.
pub const DEFAULT_CAPTURE_BLOCKLIST: &[&str] = &[
    "vim", "nvim", "vi", "nano", "emacs", "pico", "less", "more", "most", "bat", "top", "htop",
    "btop", "glances", "tmux", "screen", "ssh", "mosh", "python", "ipython", "node", "irb",
    "ghci", "fzf", "sk", "man", "info", "watch",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    Openai,
    Anthropic,
}

impl Default for ProviderName {
    fn default() -> Self {
        ProviderName::Openai
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawProviderConfig {
    name: ProviderName,
    api_key: String,
    api_base_url: String,
    model: Option<String>,
    autocomplete_model: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawUiConfig {
    autocomplete_delay_ms: u32,
    autocomplete_delay_short_ms: u32,
    autocomplete_delay_threshold: u32,
    autocomplete_min_chars: u32,
    nl_hotkey: String,
    history_search_hotkey: String,
    cheat_sheet_hotkey: String,
    history_search_limit: u32,
    error_correction: bool,
    proactive_suggestions: bool,
    proactive_output_lines: u32,
    proactive_capture_blocklist: Vec<String>,
}

impl Default for RawUiConfig {
    fn default() -> Self {
        Self {
            autocomplete_delay_ms: 200,
            autocomplete_delay_short_ms: 100,
            autocomplete_delay_threshold: 8,
            autocomplete_min_chars: 3,
            nl_hotkey: "^G".to_string(),
            history_search_hotkey: "^R".to_string(),
            cheat_sheet_hotkey: "^_".to_string(),
            history_search_limit: 500,
            error_correction: true,
            proactive_suggestions: true,
            proactive_output_lines: 50,
            proactive_capture_blocklist: DEFAULT_CAPTURE_BLOCKLIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    provider: RawProviderConfig,
    #[serde(default)]
    ui: RawUiConfig,
}

fn default_api_base_url(provider: ProviderName) -> &'static str {
    match provider {
        ProviderName::Anthropic => "https://api.anthropic.com",
        ProviderName::Openai => "https://api.openai.com/v1",
    }
}

/// Immutable provider settings, with defaults already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub name: ProviderName,
    pub api_key: String,
    pub api_base_url: String,
    pub model: String,
    pub autocomplete_model: String,
}

impl ProviderConfig {
    /// `autocomplete_model` falls back to `model` when unset.
    pub fn effective_autocomplete_model(&self) -> &str {
        if self.autocomplete_model.is_empty() {
            &self.model
        } else {
            &self.autocomplete_model
        }
    }
}

/// Immutable UI/policy settings — consumed by the dispatcher and echoed
/// back to the shell client via `init`; the daemon itself only reads the
/// handful of fields that affect server-side behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct UiConfig {
    pub autocomplete_delay_ms: u32,
    pub autocomplete_delay_short_ms: u32,
    pub autocomplete_delay_threshold: u32,
    pub autocomplete_min_chars: u32,
    pub nl_hotkey: String,
    pub history_search_hotkey: String,
    pub cheat_sheet_hotkey: String,
    pub history_search_limit: u32,
    pub error_correction: bool,
    pub proactive_suggestions: bool,
    pub proactive_output_lines: u32,
    pub proactive_capture_blocklist: Vec<String>,
}

/// One consistent, immutable configuration snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigView {
    pub provider: ProviderConfig,
    pub ui: UiConfig,
}

impl ConfigView {
    fn from_raw(raw: RawConfig) -> Self {
        let mut api_key = raw.provider.api_key;
        if let Ok(env_key) = std::env::var(PRODUCT_ENV_KEY) {
            if !env_key.is_empty() {
                api_key = env_key;
            }
        }
        let model = raw.provider.model.unwrap_or_else(|| "gpt-4o".to_string());
        let api_base_url = if raw.provider.api_base_url.is_empty() {
            default_api_base_url(raw.provider.name).to_string()
        } else {
            raw.provider.api_base_url
        };

        ConfigView {
            provider: ProviderConfig {
                name: raw.provider.name,
                api_key,
                api_base_url,
                model,
                autocomplete_model: raw.provider.autocomplete_model,
            },
            ui: UiConfig {
                autocomplete_delay_ms: raw.ui.autocomplete_delay_ms,
                autocomplete_delay_short_ms: raw.ui.autocomplete_delay_short_ms,
                autocomplete_delay_threshold: raw.ui.autocomplete_delay_threshold,
                autocomplete_min_chars: raw.ui.autocomplete_min_chars,
                nl_hotkey: raw.ui.nl_hotkey,
                history_search_hotkey: raw.ui.history_search_hotkey,
                cheat_sheet_hotkey: raw.ui.cheat_sheet_hotkey,
                history_search_limit: raw.ui.history_search_limit,
                error_correction: raw.ui.error_correction,
                proactive_suggestions: raw.ui.proactive_suggestions,
                proactive_output_lines: raw.ui.proactive_output_lines,
                proactive_capture_blocklist: raw.ui.proactive_capture_blocklist,
            },
        }
    }

    /// Load from a TOML file; a missing file yields all-defaults.
    pub fn load(path: &Path) -> Result<ConfigView, ConfigError> {
        let raw = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Read(path.to_path_buf(), e.to_string()))?;
            toml::from_str(&text)
                .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?
        } else {
            RawConfig::default()
        };
        Ok(ConfigView::from_raw(raw))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Read(PathBuf, String),
    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, String),
}

/// The config directory, honoring `XDG_CONFIG_HOME`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("shellassist");
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("shellassist")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

fn runtime_dir() -> Option<PathBuf> {
    std::env::var("XDG_RUNTIME_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// `$XDG_RUNTIME_DIR/shellassist.sock` or `/tmp/shellassist-<uid>.sock`.
pub fn socket_path() -> PathBuf {
    match runtime_dir() {
        Some(dir) => dir.join("shellassist.sock"),
        None => PathBuf::from(format!("/tmp/shellassist-{}.sock", current_uid())),
    }
}

/// Sibling PID file next to the socket.
pub fn pid_path() -> PathBuf {
    match runtime_dir() {
        Some(dir) => dir.join("shellassist.pid"),
        None => PathBuf::from(format!("/tmp/shellassist-{}.pid", current_uid())),
    }
}

fn current_uid() -> u32 {
    nix::unistd::getuid().as_raw()
}

/// Atomically-swappable holder for the active [`ConfigView`], shared between
/// the dispatcher (writer, on `reload_config`) and the façade (reader, for
/// endpoint/model/key on every provider call).
#[derive(Debug)]
pub struct ConfigHandle(ArcSwap<ConfigView>);

impl ConfigHandle {
    pub fn new(initial: ConfigView) -> Self {
        Self(ArcSwap::from_pointee(initial))
    }

    pub fn load(&self) -> Arc<ConfigView> {
        self.0.load_full()
    }

    pub fn store(&self, new: ConfigView) {
        self.0.store(Arc::new(new));
    }
}
