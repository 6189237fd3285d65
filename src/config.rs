// Chart configuration
// Stored as JSON with the same option names the panel settings use

use crate::color::resolve;
use crate::error::{ChartError, ChartResult};
use crate::layout::{FontSpec, LayoutParams};
use crate::render::RenderStyle;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_COMMAND: &str = "echo \"CR:g\"";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ChartConfig {
    pub command: String,
    /// Seconds between ticks
    pub update_interval: u64,
    pub chart_width: u32,
    pub bar_width: u32,
    pub chart_area_transparency: f64,
    pub font_family: String,
    pub font_size: f64,
    pub font_color: String,
    pub enable_font_shadow: bool,
    pub font_shadow_color: String,
    pub verbose_logging: bool,
    /// Seconds before a running command is killed
    pub command_timeout: u64,
    pub panel_height: u32,
    pub background_color: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            update_interval: 60,
            chart_width: 200,
            bar_width: 16,
            chart_area_transparency: 0.3,
            font_family: "Sans".to_string(),
            font_size: 10.0,
            font_color: "rgba(255,255,255,1.0)".to_string(),
            enable_font_shadow: true,
            font_shadow_color: "rgba(0,0,0,0.8)".to_string(),
            verbose_logging: false,
            command_timeout: 10,
            panel_height: 32,
            background_color: "k".to_string(),
        }
    }
}

/// What has to be redone after a configuration change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSet {
    pub timer: bool,
    pub canvas: bool,
    pub command: bool,
}

impl RefreshSet {
    pub fn all() -> Self {
        Self {
            timer: true,
            canvas: true,
            command: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.timer || self.canvas || self.command)
    }
}

/// Compare two snapshots. Any changed option reschedules the timer, rebuilds the
/// canvas and re-runs the command.
pub fn apply_config(current: &ChartConfig, next: &ChartConfig) -> RefreshSet {
    if current == next {
        RefreshSet::default()
    } else {
        RefreshSet::all()
    }
}

impl ChartConfig {
    /// Get the config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cmd-chart")
            .join("config.json")
    }

    /// Load configuration from file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> ChartResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ChartError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ChartError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> ChartResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Set one option by its kebab-case name, parsing `value` to the option's type.
    pub fn set(&mut self, key: &str, value: &str) -> ChartResult<()> {
        let invalid = || ChartError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        let mut doc = serde_json::to_value(&*self)?;
        let slot = doc
            .get_mut(key)
            .ok_or_else(|| ChartError::UnknownOption(key.to_string()))?;
        let replacement = match &*slot {
            Value::String(_) => Value::String(value.to_string()),
            Value::Bool(_) => Value::Bool(value.parse().map_err(|_| invalid())?),
            Value::Number(_) => serde_json::from_str::<Value>(value)
                .ok()
                .filter(Value::is_number)
                .ok_or_else(invalid)?,
            _ => return Err(invalid()),
        };
        *slot = replacement;
        *self = serde_json::from_value(doc).map_err(|_| invalid())?;
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.update_interval.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout.max(1))
    }

    pub fn effective_command(&self) -> &str {
        if self.command.trim().is_empty() {
            DEFAULT_COMMAND
        } else {
            &self.command
        }
    }

    pub fn font(&self) -> FontSpec {
        FontSpec::new(&self.font_family, self.font_size)
    }

    pub fn layout_params(&self) -> LayoutParams {
        LayoutParams::new(
            self.chart_width as f64,
            self.panel_height as f64,
            self.font(),
        )
        .with_bar_width(self.bar_width as f64)
    }

    pub fn render_style(&self) -> RenderStyle {
        RenderStyle {
            width: self.chart_width as f64,
            height: self.panel_height as f64,
            background: resolve(&self.background_color).with_alpha(self.chart_area_transparency),
            font: self.font(),
            font_color: resolve(&self.font_color),
            shadow_color: self
                .enable_font_shadow
                .then(|| resolve(&self.font_shadow_color)),
        }
    }
}
