//! Layer Catalog
//!
//! Static registry of selectable layers. Loaded once at startup, either from
//! the bundled catalog or from a JSON file, and never mutated afterwards.

mod descriptor;

pub use descriptor::{
    AnalyticsBinding, FeatureSource, LayerDescriptor, LayerId, LayerStyle, ProtocolKind,
    VectorStyle, DEFAULT_FILL_COLOR, DEFAULT_OPACITY, DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH,
};

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::Epoch;
use crate::error::{Result, TerraError};

const BUILTIN_CATALOG: &str = include_str!("../../data/catalog.json");

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    layers: Vec<LayerDescriptor>,
}

/// Ordered, validated set of layer descriptors
#[derive(Debug, Clone)]
pub struct LayerCatalog {
    descriptors: Vec<LayerDescriptor>,
}

impl LayerCatalog {
    /// Build a catalog, normalizing and validating every descriptor
    ///
    /// # Errors
    /// Returns `InvalidCatalog` for zero or duplicate ids, blank names or
    /// opacities outside [0, 1].
    pub fn new(descriptors: Vec<LayerDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(descriptors.len());

        for mut descriptor in descriptors {
            if descriptor.id.0 == 0 {
                return Err(TerraError::InvalidCatalog {
                    reason: format!("layer '{}' has id 0", descriptor.name),
                });
            }
            if !seen.insert(descriptor.id) {
                return Err(TerraError::InvalidCatalog {
                    reason: format!("duplicate layer id {}", descriptor.id),
                });
            }

            descriptor.name = descriptor.name.trim().to_string();
            descriptor.endpoint = descriptor.endpoint.trim().to_string();
            descriptor.source_layer_id = descriptor.source_layer_id.trim().to_string();

            if descriptor.name.is_empty() {
                return Err(TerraError::InvalidCatalog {
                    reason: format!("layer {} has an empty name", descriptor.id),
                });
            }
            if let Some(opacity) = descriptor.style.as_ref().and_then(|s| s.opacity) {
                if !(0.0..=1.0).contains(&opacity) {
                    return Err(TerraError::InvalidCatalog {
                        reason: format!("layer {} has opacity {} outside [0, 1]", descriptor.id, opacity),
                    });
                }
            }

            normalized.push(descriptor);
        }

        Ok(Self {
            descriptors: normalized,
        })
    }

    /// Parse a catalog document of the form `{ "layers": [...] }`
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.layers)
    }

    /// Load a catalog document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| TerraError::FileNotFound {
            path: path.to_path_buf(),
            source: Some(e),
        })?;
        let catalog = Self::from_json(&json)?;
        debug!(path = %path.display(), layers = catalog.len(), "loaded layer catalog");
        Ok(catalog)
    }

    /// The catalog bundled with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn get(&self, id: LayerId) -> Option<&LayerDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Descriptors that can still be added, in catalog order
    pub fn available(&self, taken: &[LayerId]) -> Vec<&LayerDescriptor> {
        self.descriptors.iter().filter(|d| !taken.contains(&d.id)).collect()
    }

    /// Dataset epoch a layer activates; `None` for unknown or plain layers
    pub fn epoch_for(&self, id: LayerId) -> Option<Epoch> {
        self.get(id).and_then(LayerDescriptor::epoch)
    }

    pub fn is_analytics_bearing(&self, id: LayerId) -> bool {
        self.epoch_for(id).is_some()
    }

    /// Every epoch some analytics-bearing layer points at
    pub fn bound_epochs(&self) -> Vec<Epoch> {
        let mut epochs: Vec<Epoch> = self.descriptors.iter().filter_map(LayerDescriptor::epoch).collect();
        epochs.sort();
        epochs.dedup();
        epochs
    }
}
