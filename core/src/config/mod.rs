use crate::agent::{AgentConfig, ConflictPolicy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const NANOAGENTS_DIR: &str = ".nanoagents";
const API_KEY_ENV_VARS: &[&str] = &["NANOAGENTS_API_KEY", "OPENAI_API_KEY"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_steps: usize,
    pub include_builtin_tools: bool,
    pub conflict_policy: ConflictPolicy,
    pub log_level: String,
    #[serde(skip)]
    pub workspace_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_steps: 5,
            include_builtin_tools: true,
            conflict_policy: ConflictPolicy::default(),
            log_level: "info".to_string(),
            workspace_dir: get_nanoagents_dir().join("workspace"),
        }
    }
}

pub fn get_nanoagents_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(NANOAGENTS_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_nanoagents_dir().join("config.toml")
}

pub fn ensure_nanoagents_dir() -> Result<PathBuf> {
    let dir = get_nanoagents_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir).with_context(|| {
            format!("Failed to create nanoagents directory at {}", dir.display())
        })?;
    }

    Ok(dir)
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let mut config = if config_exists() {
            load_config()?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content).context("Failed to parse config")?;
        config.workspace_dir = get_nanoagents_dir().join("workspace");
        Ok(config)
    }

    /// The first non-empty API key variable wins over the file value.
    pub fn apply_env_overrides(&mut self) {
        if let Some(key) = API_KEY_ENV_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|key| !key.trim().is_empty())
        {
            self.api_key = key;
        }
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig::new(self.max_steps)
            .with_builtin_tools(self.include_builtin_tools)
            .with_workspace(self.workspace_dir.clone())
            .with_conflict_policy(self.conflict_policy)
    }
}

pub fn load_config() -> Result<Config> {
    let config_path = get_config_path();

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!(
                "Config file not found. Run 'nanoagents init' to set up your configuration."
            )
        } else {
            anyhow::anyhow!("Failed to read config from {}: {}", config_path.display(), e)
        }
    })?;

    Config::from_toml(&content)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_nanoagents_dir()?;

    let config_path = get_config_path();
    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(&config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    Ok(())
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}
