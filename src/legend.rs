//! Legend for the selected tile layer
//!
//! Tile layers expose a legend image through a GetLegendGraphic URL. The
//! viewer shows the legend of the selected layer only. When the image
//! cannot be loaded the legend is hidden and nothing else changes.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::{LayerDescriptor, LayerId};
use crate::error::{Result, TerraError};

/// Timeout for legend image probes
pub const LEGEND_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Legend to display next to the map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendView {
    pub layer: LayerId,
    pub layer_name: String,
    pub url: String,
    pub collapsed: bool,
}

/// Collapse state and load failures of legends
#[derive(Debug, Clone, Default)]
pub struct LegendController {
    collapsed: bool,
    failed: HashSet<LayerId>,
}

impl LegendController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Legend of the selected layer, if it has one that has not failed
    pub fn view(&self, selected: Option<&LayerDescriptor>) -> Option<LegendView> {
        let descriptor = selected?;
        if self.failed.contains(&descriptor.id) {
            return None;
        }
        let url = descriptor.legend_url()?;
        Some(LegendView {
            layer: descriptor.id,
            layer_name: descriptor.name.clone(),
            url,
            collapsed: self.collapsed,
        })
    }

    /// Record that a layer's legend image failed to load
    pub fn mark_failed(&mut self, layer: LayerId) {
        if self.failed.insert(layer) {
            warn!(layer = %layer, "legend image failed to load, hiding legend");
        }
    }

    /// Forget a failure so a re-added layer tries again
    pub fn clear_failure(&mut self, layer: LayerId) {
        self.failed.remove(&layer);
    }

    pub fn has_failed(&self, layer: LayerId) -> bool {
        self.failed.contains(&layer)
    }

    pub fn toggle_collapsed(&mut self) -> bool {
        self.collapsed = !self.collapsed;
        self.collapsed
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }
}

/// Fetch a legend image and check the server answered with one
#[cfg(feature = "legend-probe")]
pub fn probe_legend(url: &str) -> Result<()> {
    let unavailable = |reason: String| TerraError::LegendUnavailable {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(LEGEND_PROBE_TIMEOUT)
        .build()
        .map_err(|e| unavailable(e.to_string()))?;

    let response = client.get(url).send().map_err(|e| unavailable(e.to_string()))?;
    if !response.status().is_success() {
        return Err(unavailable(format!("server returned {}", response.status())));
    }

    let is_image = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("image/"))
        .unwrap_or(false);
    if !is_image {
        return Err(unavailable("response is not an image".to_string()));
    }
    Ok(())
}

#[cfg(not(feature = "legend-probe"))]
pub fn probe_legend(url: &str) -> Result<()> {
    Err(TerraError::LegendUnavailable {
        url: url.to_string(),
        reason: "built without the legend-probe feature".to_string(),
    })
}
