// ABOUTME: Wait plan configuration parsed from container-wait.yml.
// ABOUTME: Handles YAML parsing, file discovery and conversion into a ForAll strategy.

mod deserialize;
mod init;
mod strategy;

pub use init::init_config;
pub use strategy::{StrategyConfig, StrategyKind};

use crate::error::{Error, Result};
use crate::types::ContainerPort;
use crate::wait::{ForAll, PollConfig};
use deserialize::deserialize_strategies;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "container-wait.yml";
pub const CONFIG_FILENAME_ALT: &str = "container-wait.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".container-wait/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct WaitConfig {
    /// Timeout and poll interval for strategies that do not override them.
    #[serde(default)]
    pub defaults: PollConfig,

    /// Upper bound for the whole plan.
    #[serde(default, with = "humantime_serde")]
    pub deadline: Option<Duration>,

    /// Timeout for strategies without their own `timeout`.
    #[serde(default, with = "humantime_serde")]
    pub startup_timeout: Option<Duration>,

    #[serde(deserialize_with = "deserialize_strategies")]
    pub strategies: NonEmpty<StrategyConfig>,
}

impl WaitConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Path of the first config file found in `dir`.
    pub fn find(dir: &Path) -> Option<PathBuf> {
        [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ]
        .into_iter()
        .find(|path| path.exists())
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        match Self::find(dir) {
            Some(path) => Self::load(&path),
            None => Err(Error::ConfigNotFound(dir.to_path_buf())),
        }
    }

    /// Build the composite strategy this plan describes.
    pub fn into_strategy(&self) -> Result<ForAll> {
        let strategies = self
            .strategies
            .iter()
            .map(|entry| entry.build(self.defaults))
            .collect::<Result<Vec<_>>>()?;

        let mut all = ForAll::new(strategies);
        if let Some(deadline) = self.deadline {
            all = all.with_deadline(deadline);
        }
        if let Some(timeout) = self.startup_timeout {
            all = all.with_startup_timeout_default(timeout);
        }
        Ok(all)
    }

    /// Plan used by `init`: the port must accept connections, then answer HTTP.
    pub fn template(port: ContainerPort) -> Self {
        Self {
            defaults: PollConfig::default(),
            deadline: Some(Duration::from_secs(120)),
            startup_timeout: None,
            strategies: NonEmpty::from((
                StrategyConfig {
                    kind: StrategyKind::ListeningPort {
                        port,
                        skip_internal_check: false,
                        skip_external_check: false,
                    },
                    timeout: None,
                    poll_interval: None,
                },
                vec![StrategyConfig {
                    kind: StrategyKind::Http {
                        path: "/".to_string(),
                        port: Some(port),
                        method: "GET".to_string(),
                        headers: Default::default(),
                        body: None,
                        status: None,
                    },
                    timeout: None,
                    poll_interval: None,
                }],
            )),
        }
    }
}
