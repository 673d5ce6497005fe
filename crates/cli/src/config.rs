use anyhow::{Context, Result};
use directories::ProjectDirs;
use ipc::{ChannelName, ClientConfig, DEFAULT_CLIENT_PREFIX, DEFAULT_SERVER_CHANNEL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "msgq";

/// Environment variable overriding the config directory
pub const CONFIG_PATH_ENV: &str = "MSGQ_CONFIG_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub client: ClientSection,
}

/// Channel names shared by the server and every client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_server_name")]
    pub server_name: String,
    #[serde(default = "default_client_prefix")]
    pub client_prefix: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            client_prefix: default_client_prefix(),
        }
    }
}

fn default_server_name() -> String {
    DEFAULT_SERVER_CHANNEL.to_string()
}

fn default_client_prefix() -> String {
    DEFAULT_CLIENT_PREFIX.to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientSection {
    /// Give up waiting for a reply after this many seconds (unset waits forever)
    pub reply_timeout_secs: Option<u64>,
}

impl Config {
    pub fn server_channel(&self) -> Result<ChannelName> {
        ChannelName::new(self.queue.server_name.as_str())
            .with_context(|| format!("Invalid queue.server_name: {:?}", self.queue.server_name))
    }

    pub fn client_config(&self) -> Result<ClientConfig> {
        Ok(ClientConfig::new(self.server_channel()?)
            .with_client_prefix(self.queue.client_prefix.as_str())
            .with_reply_timeout(self.client.reply_timeout_secs.map(Duration::from_secs)))
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    // MSGQ_CONFIG_PATH overrides the default config directory
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }

    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .context("Could not determine config directory")
}

pub fn get_config_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&get_config_file()?)
}

/// Read a config file; a missing file yields the defaults
pub fn load_config_from(config_file: &Path) -> Result<Config> {
    if !config_file.exists() {
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(config_file)
        .with_context(|| format!("Failed to read config file: {}", config_file.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", config_file.display()))
}
