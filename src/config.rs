//! Updater configuration.
//!
//! A small JSON file holds provider and pacing settings; CLI flags override
//! it field by field. Secrets never live in the file: API keys are read from
//! the environment once, at the CLI boundary, and passed down explicitly.
use crate::enrich::ProviderConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Fixed pause after every batch item.
pub const DEFAULT_DELAY_MS: u64 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;

pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const LM_COMMAND_VAR: &str = "MATJIP_LM_COMMAND";
pub const FETCH_COMMAND_VAR: &str = "MATJIP_FETCH_COMMAND";

/// Which completion backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Openai,
    Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdaterConfig {
    pub schema_version: u32,
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_command: Option<String>,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Gemini
}

fn default_delay_ms() -> u64 {
    DEFAULT_DELAY_MS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            provider: default_provider(),
            model: None,
            base_url: None,
            delay_ms: DEFAULT_DELAY_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            lm_command: None,
            fetch_command: None,
        }
    }
}

/// Per-invocation overrides collected from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub lm_command: Option<String>,
    pub fetch_command: Option<String>,
    pub delay_ms: Option<u64>,
}

impl UpdaterConfig {
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(provider) = overrides.provider {
            self.provider = provider;
        }
        if let Some(model) = &overrides.model {
            self.model = Some(model.clone());
        }
        if let Some(command) = &overrides.lm_command {
            self.lm_command = Some(command.clone());
        }
        if let Some(command) = &overrides.fetch_command {
            self.fetch_command = Some(command.clone());
        }
        if let Some(delay_ms) = overrides.delay_ms {
            self.delay_ms = delay_ms;
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Default location: `<config dir>/matjip/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("matjip").join("config.json"))
}

pub fn load_config(path: &Path) -> Result<UpdaterConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: UpdaterConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Load the explicit config, else the default file when it exists, else
/// built-in defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<UpdaterConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match default_config_path() {
        Some(path) if path.is_file() => load_config(&path),
        _ => Ok(UpdaterConfig::default()),
    }
}

pub fn write_config(path: &Path, config: &UpdaterConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(config).context("serialize config")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn validate_config(config: &UpdaterConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.request_timeout_ms == 0 {
        return Err(anyhow!("request_timeout_ms must be greater than zero"));
    }
    if let Some(model) = config.model.as_deref() {
        if model.trim().is_empty() {
            return Err(anyhow!("model must be non-empty when set"));
        }
    }
    if let Some(base_url) = config.base_url.as_deref() {
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(anyhow!("base_url must be an http(s) URL (got {base_url:?})"));
        }
    }
    Ok(())
}

/// Resolve backend settings, reading the API key or command from `lookup`
/// (the process environment in production).
pub fn provider_config<F>(config: &UpdaterConfig, lookup: F) -> Result<ProviderConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let api_key = match config.provider {
        ProviderKind::Gemini => Some(
            lookup(GEMINI_API_KEY_VAR)
                .ok_or_else(|| anyhow!("{GEMINI_API_KEY_VAR} is not set (add it to .env)"))?,
        ),
        ProviderKind::Openai => Some(
            lookup(OPENAI_API_KEY_VAR)
                .ok_or_else(|| anyhow!("{OPENAI_API_KEY_VAR} is not set (add it to .env)"))?,
        ),
        ProviderKind::Command => None,
    };
    let lm_command = config.lm_command.clone().or_else(|| lookup(LM_COMMAND_VAR));
    if config.provider == ProviderKind::Command && lm_command.is_none() {
        return Err(anyhow!(
            "command provider needs --lm-command, lm_command in config, or {LM_COMMAND_VAR}"
        ));
    }
    Ok(ProviderConfig {
        kind: config.provider,
        model: config.model.clone(),
        api_key,
        base_url: config.base_url.clone(),
        lm_command,
        request_timeout: Duration::from_millis(config.request_timeout_ms),
    })
}
