use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::undo::DEFAULT_MAX_DEPTH;

pub const MAX_STEP_COUNT: usize = 20;
/// Smallest accepted row spacing, in document units.
pub const MIN_ROW_HEIGHT: f64 = 1.0;
/// Zoom never drops below this, whatever the configuration says.
pub const MIN_ZOOM_SCALE: f64 = 0.01;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("row height must be at least {MIN_ROW_HEIGHT}, got {0}")]
    RowHeight(f64),
    #[error("start Y must not be negative, got {0}")]
    StartY(f64),
    #[error("step count must be between 1 and {MAX_STEP_COUNT}, got {0}")]
    StepCount(usize),
    #[error("zoom limits are invalid: min {min}, max {max}")]
    ZoomLimits { min: f64, max: f64 },
}

/// Spacing used to lay out row markers and the number of rows one advance covers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowSettings {
    pub start_y: f64,
    pub row_height: f64,
    pub step_count: usize,
}

impl Default for RowSettings {
    fn default() -> Self {
        Self {
            start_y: 100.0,
            row_height: 40.0,
            step_count: 1,
        }
    }
}

impl RowSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.row_height.is_finite() || self.row_height < MIN_ROW_HEIGHT {
            return Err(ConfigError::RowHeight(self.row_height));
        }
        if !self.start_y.is_finite() || self.start_y < 0.0 {
            return Err(ConfigError::StartY(self.start_y));
        }
        if !(1..=MAX_STEP_COUNT).contains(&self.step_count) {
            return Err(ConfigError::StepCount(self.step_count));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub max_depth: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportSettings {
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            min_zoom: 0.25,
            max_zoom: 5.0,
        }
    }
}

impl ViewportSettings {
    pub fn clamp_zoom(&self, scale: f64) -> f64 {
        let min = self.min_zoom.max(MIN_ZOOM_SCALE);
        let max = self.max_zoom.max(min);
        if scale.is_nan() {
            return min;
        }
        scale.clamp(min, max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rows: RowSettings,
    pub history: HistorySettings,
    pub viewport: ViewportSettings,
}

impl AppConfig {
    pub fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("net", "knitchart", "knitchart")
    }

    pub fn default_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rows.validate()?;
        let ViewportSettings { min_zoom, max_zoom } = self.viewport;
        if !min_zoom.is_finite() || !max_zoom.is_finite() || min_zoom <= 0.0 || max_zoom < min_zoom
        {
            return Err(ConfigError::ZoomLimits {
                min: min_zoom,
                max: max_zoom,
            });
        }
        Ok(())
    }
}
