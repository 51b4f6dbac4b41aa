//! Viewer configuration
//!
//! JSON document with every field optional. Missing fields take the
//! defaults below; relative paths are resolved against the directory of the
//! configuration file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{LayerCatalog, DEFAULT_OPACITY};
use crate::dataset::DatasetIndex;
use crate::error::{Result, TerraError};
use crate::panel::{PanelPlacement, DEFAULT_REVEAL_DELAY};

/// Feature attribute carrying the region name on the bundled boundaries
pub const DEFAULT_REGION_ATTRIBUTE: &str = "ADM2_EN";

/// Maximum number of activity log entries kept
pub const DEFAULT_ACTIVITY_LOG_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Layer catalog file; the bundled catalog when absent
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// Dataset file or directory; the bundled dataset when absent
    #[serde(default)]
    pub datasets_path: Option<PathBuf>,

    /// Attribute read from clicked and hovered features
    #[serde(default = "default_region_attribute")]
    pub region_attribute: String,

    #[serde(default = "default_reveal_delay_ms")]
    pub reveal_delay_ms: u64,

    #[serde(default)]
    pub default_placement: PanelPlacement,

    /// Opacity for layers whose style does not declare one
    #[serde(default = "default_opacity")]
    pub default_opacity: f32,

    #[serde(default = "default_activity_log_limit")]
    pub activity_log_limit: usize,
}

fn default_region_attribute() -> String {
    DEFAULT_REGION_ATTRIBUTE.to_string()
}

fn default_reveal_delay_ms() -> u64 {
    DEFAULT_REVEAL_DELAY.as_millis() as u64
}

fn default_opacity() -> f32 {
    DEFAULT_OPACITY
}

fn default_activity_log_limit() -> usize {
    DEFAULT_ACTIVITY_LOG_LIMIT
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            datasets_path: None,
            region_attribute: default_region_attribute(),
            reveal_delay_ms: default_reveal_delay_ms(),
            default_placement: PanelPlacement::default(),
            default_opacity: default_opacity(),
            activity_log_limit: default_activity_log_limit(),
        }
    }
}

impl ViewerConfig {
    /// Load a configuration file
    ///
    /// # Errors
    /// `FileNotFound` when the file cannot be read, `Serialization` for
    /// malformed JSON and `InvalidCatalog` for an out-of-range opacity.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| TerraError::FileNotFound {
            path: path.to_path_buf(),
            source: Some(e),
        })?;
        let mut config: ViewerConfig = serde_json::from_str(&json)?;

        if let Some(base) = path.parent() {
            config.catalog_path = config.catalog_path.map(|p| resolve(base, p));
            config.datasets_path = config.datasets_path.map(|p| resolve(base, p));
        }
        config.validate()?;

        debug!(path = %path.display(), "loaded viewer configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_opacity) {
            return Err(TerraError::InvalidCatalog {
                reason: format!("default opacity {} outside [0, 1]", self.default_opacity),
            });
        }
        Ok(())
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }

    /// Configured catalog, or the bundled one
    pub fn load_catalog(&self) -> Result<LayerCatalog> {
        match &self.catalog_path {
            Some(path) => LayerCatalog::load(path),
            None => LayerCatalog::builtin(),
        }
    }

    /// Configured dataset index, or the bundled one
    pub fn load_index(&self) -> Result<DatasetIndex> {
        match &self.datasets_path {
            Some(path) => DatasetIndex::load(path),
            None => DatasetIndex::builtin(),
        }
    }
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
