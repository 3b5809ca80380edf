use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Category, Result, WindowError};

/// Top-level configuration for one realization layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    pub window: WindowConfig,
    pub debug: DebugConfig,
    pub categories: Vec<CategoryConfig>,
}

impl LayerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;
        for (index, entry) in self.categories.iter().enumerate() {
            if self.categories[..index]
                .iter()
                .any(|other| other.category == entry.category)
            {
                return Err(WindowError::config(format!(
                    "category {} is configured more than once",
                    entry.category
                )));
            }
        }
        Ok(())
    }

    pub fn pool_config(&self, category: Category) -> Option<PoolConfig> {
        self.categories
            .iter()
            .find(|entry| entry.category == category)
            .map(|entry| entry.pool)
    }
}

/// Display and judge windows plus the global scroll multiplier.
///
/// Roll windows are in scaled delta-roll units relative to the play position;
/// judge windows are seconds relative to the judge time. `up` is the later /
/// farther side, `down` the earlier / nearer side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub display_window_up: f64,
    pub display_window_down: f64,
    pub judge_window_up: f64,
    pub judge_window_down: f64,
    pub speed_scale: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            display_window_up: 1.0,
            display_window_down: -0.1,
            judge_window_up: 0.5,
            judge_window_down: -0.5,
            speed_scale: 1.0,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.speed_scale.is_finite() && self.speed_scale > 0.0) {
            return Err(WindowError::config("speed_scale must be finite and positive"));
        }
        if !(self.display_window_down <= self.display_window_up) {
            return Err(WindowError::config(
                "display_window_down must not exceed display_window_up",
            ));
        }
        if !(self.judge_window_down <= self.judge_window_up) {
            return Err(WindowError::config(
                "judge_window_down must not exceed judge_window_up",
            ));
        }
        Ok(())
    }

    /// Upper roll window expressed in unscaled roll, i.e. divided by the global
    /// speed scale.
    pub fn scaled_display_up(&self) -> f64 {
        self.display_window_up / self.speed_scale
    }

    pub fn scaled_display_down(&self) -> f64 {
        self.display_window_down / self.speed_scale
    }
}

/// Sizing of one category's instance pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle instances the pool tries to keep ready.
    pub buffered_idle_target: usize,
    /// New instances the pool may create in a single tick.
    pub max_instantiations_per_tick: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            buffered_idle_target: 50,
            max_instantiations_per_tick: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub category: Category,
    #[serde(flatten)]
    pub pool: PoolConfig,
}

/// Diagnostics switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Destroy released instances instead of recycling them.
    pub destroy_without_recycling: bool,
    /// Pre-buffer one instance per loaded carrier instead of the idle target.
    pub prebuffer_all_at_once: bool,
    /// Emit a trace event for every realization and virtualization.
    pub log_realization: bool,
}
