//! Configuration management

use crate::skills::executor::{validate_timeout, DEFAULT_TIMEOUT_SECS};
use crate::skills::{ExecutorConfig, ManagerConfig};
use anyhow::Result;
use std::path::PathBuf;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding one sub-directory per skill
    pub skills_dir: PathBuf,

    /// Maximum number of cached invocation results
    pub max_cache_size: usize,

    /// Default script timeout in seconds (1..=600)
    pub script_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            skills_dir: PathBuf::from("./skills"),
            max_cache_size: 100,
            script_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let skills_dir = std::env::var("SKILL_RUNTIME_SKILLS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.skills_dir);

        let max_cache_size = std::env::var("SKILL_RUNTIME_CACHE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_cache_size);

        let script_timeout_secs = std::env::var("SKILL_RUNTIME_SCRIPT_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.script_timeout_secs);
        validate_timeout("SKILL_RUNTIME_SCRIPT_TIMEOUT", script_timeout_secs)?;

        Ok(Self {
            skills_dir,
            max_cache_size,
            script_timeout_secs,
        })
    }

    /// Library-level settings for a [`SkillManager`](crate::SkillManager)
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            max_cache_size: self.max_cache_size,
            executor: ExecutorConfig {
                default_timeout_secs: self.script_timeout_secs,
                ..ExecutorConfig::default()
            },
        }
    }
}
