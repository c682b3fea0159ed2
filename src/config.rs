//! Mount configuration

use crate::vfs::TreeOptions;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Region of the IoT account; the SDK default chain applies when unset.
    pub region: Option<String>,
    /// Topics mirrored under `/topics`
    pub topics: Vec<String>,
    /// Seconds before collection directories are listed again, 0 never.
    pub collection_ttl_secs: u64,
    pub message_poll_interval_ms: u64,
    /// Messages kept per topic, 0 keeps all of them.
    pub messages_retained: usize,
    /// Publish with the retain flag. Only retained messages reach polling
    /// subscribers, this mount's own publishes included.
    pub publish_retain: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            region: None,
            topics: Vec::new(),
            collection_ttl_secs: 30,
            message_poll_interval_ms: 2000,
            messages_retained: 100,
            publish_retain: false,
        }
    }
}

impl Settings {
    pub fn config_path() -> Result<PathBuf> {
        let mut path =
            dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
        path.push(".iot-fuse");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Load settings from `path`, writing the defaults there first if it
    /// does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let default = Self::default();
            default.save_to(path)?;
            return Ok(default);
        }
        let data = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&data)
            .map_err(|e| anyhow!("Invalid settings file {}: {}", path.display(), e))?;
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.message_poll_interval_ms.max(1))
    }

    pub fn tree_options(&self) -> TreeOptions {
        TreeOptions {
            collection_ttl: match self.collection_ttl_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            messages_retained: self.messages_retained,
            topics: self.topics.clone(),
        }
    }
}
