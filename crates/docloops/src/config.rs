//! Project configuration file support for docloops.
//!
//! Loads configuration from `docloops.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use docloops_core::CycleOptions;

/// Project-level configuration loaded from `docloops.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Global default agent (applies to both evaluator and improver)
    pub agent: Option<String>,
    /// Global default model (applies to both evaluator and improver)
    pub model: Option<String>,
    #[serde(default)]
    pub evaluator: RoleConfig,
    #[serde(default)]
    pub improver: RoleConfig,
    /// Defaults for every cycle; command line flags win
    #[serde(default)]
    pub cycle: CycleDefaults,
    /// Relative paths resolve against the working directory
    pub history_dir: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
}

/// Configuration for a specific role (evaluator or improver)
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    pub agent: Option<String>,
    pub model: Option<String>,
    /// Kill the agent process after this many seconds
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CycleDefaults {
    pub max_iterations: Option<usize>,
    pub min_improvement: Option<f64>,
    pub target_score: Option<f64>,
    pub focus_categories: Option<Vec<String>>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "docloops.toml";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let mut config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.history_dir = config.history_dir.map(|dir| working_dir.join(dir));
        config.results_dir = config.results_dir.map(|dir| working_dir.join(dir));

        Ok(Some(config))
    }

    /// Priority: [evaluator].agent > global agent > None
    pub fn evaluator_agent(&self) -> Option<&str> {
        self.evaluator.agent.as_deref().or(self.agent.as_deref())
    }

    pub fn evaluator_model(&self) -> Option<&str> {
        self.evaluator.model.as_deref().or(self.model.as_deref())
    }

    /// Priority: [improver].agent > global agent > None
    pub fn improver_agent(&self) -> Option<&str> {
        self.improver.agent.as_deref().or(self.agent.as_deref())
    }

    pub fn improver_model(&self) -> Option<&str> {
        self.improver.model.as_deref().or(self.model.as_deref())
    }

    /// Cycle options with the `[cycle]` table applied over the defaults
    pub fn cycle_options(&self) -> CycleOptions {
        let mut options = CycleOptions::default();
        if let Some(max) = self.cycle.max_iterations {
            options = options.with_max_iterations(max);
        }
        if let Some(min) = self.cycle.min_improvement {
            options = options.with_min_improvement(min);
        }
        if let Some(target) = self.cycle.target_score {
            options = options.with_target_score(target);
        }
        if let Some(categories) = &self.cycle.focus_categories {
            options = options.with_focus_categories(categories.clone());
        }
        options
    }
}

impl RoleConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
