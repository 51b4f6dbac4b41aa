//! Layer descriptors
//!
//! A descriptor is an immutable catalog entry: where a layer comes from,
//! which protocol serves it and how it should look when first activated.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dataset::Epoch;

/// Opacity applied when a descriptor does not declare one
pub const DEFAULT_OPACITY: f32 = 0.8;

/// Vector fill colour applied when a descriptor does not declare one
pub const DEFAULT_FILL_COLOR: &str = "rgba(0, 0, 255, 0.1)";

/// Vector stroke colour applied when a descriptor does not declare one
pub const DEFAULT_STROKE_COLOR: &str = "#0000ff";

/// Vector stroke width applied when a descriptor does not declare one
pub const DEFAULT_STROKE_WIDTH: f32 = 2.0;

const LEGEND_OPTIONS: &str = "fontAntiAliasing:true;fontSize:12;fontColor:0x333333";

/// Stable identifier of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub u32);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote protocol serving a layer
///
/// Catalog files may name protocols the viewer cannot render. Those are kept
/// as `Unsupported` so activation can reject them instead of the whole
/// catalog failing to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProtocolKind {
    /// Pre-rendered raster tiles (WMS)
    TileService,
    /// Queryable vector features (WFS or a bundled GeoJSON file)
    FeatureService,
    /// Anything else found in configuration
    Unsupported(String),
}

impl ProtocolKind {
    /// Short protocol label used in listings
    pub fn as_str(&self) -> &str {
        match self {
            ProtocolKind::TileService => "WMS",
            ProtocolKind::FeatureService => "WFS",
            ProtocolKind::Unsupported(name) => name,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, ProtocolKind::Unsupported(_))
    }
}

impl From<String> for ProtocolKind {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "wms" | "tileservice" | "tile" => ProtocolKind::TileService,
            "wfs" | "featureservice" | "feature" => ProtocolKind::FeatureService,
            _ => ProtocolKind::Unsupported(value.trim().to_string()),
        }
    }
}

impl From<&str> for ProtocolKind {
    fn from(value: &str) -> Self {
        ProtocolKind::from(value.to_string())
    }
}

impl From<ProtocolKind> for String {
    fn from(kind: ProtocolKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional styling declared in the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    #[serde(default)]
    pub fill_color: Option<String>,
    #[serde(default)]
    pub stroke_color: Option<String>,
    #[serde(default)]
    pub stroke_width: Option<f32>,
    #[serde(default)]
    pub opacity: Option<f32>,
}

/// Fully resolved vector style handed to the render gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStyle {
    pub fill_color: String,
    pub stroke_color: String,
    pub stroke_width: f32,
}

impl Default for VectorStyle {
    fn default() -> Self {
        Self {
            fill_color: DEFAULT_FILL_COLOR.to_string(),
            stroke_color: DEFAULT_STROKE_COLOR.to_string(),
            stroke_width: DEFAULT_STROKE_WIDTH,
        }
    }
}

/// Marks a layer as analytics-bearing: showing it selects a dataset epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsBinding {
    pub epoch: Epoch,
}

/// Where a feature layer's vectors come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureSource {
    /// Remote feature service queried by type name
    Remote { endpoint: String, type_name: String },
    /// Bundled GeoJSON document
    Local { url: String },
}

impl FeatureSource {
    /// Classify an endpoint: http(s) URLs are feature services, anything
    /// else is a bundled document path.
    pub fn classify(endpoint: &str, source_layer_id: &str) -> Self {
        let endpoint = endpoint.trim();
        let lower = endpoint.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            FeatureSource::Remote {
                endpoint: endpoint.to_string(),
                type_name: source_layer_id.to_string(),
            }
        } else {
            FeatureSource::Local {
                url: endpoint.to_string(),
            }
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, FeatureSource::Local { .. })
    }
}

/// Immutable catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Unique, stable, positive identifier
    pub id: LayerId,
    /// Display name
    pub name: String,
    /// Protocol serving the layer
    #[serde(rename = "protocol")]
    pub protocol_kind: ProtocolKind,
    /// Service URL or bundled document path
    pub endpoint: String,
    /// Layer name on the remote service
    pub source_layer_id: String,
    #[serde(default)]
    pub style: Option<LayerStyle>,
    /// Present when showing this layer drives the analytics panel
    #[serde(default)]
    pub analytics: Option<AnalyticsBinding>,
    /// Feature layers that register hover and click handlers
    #[serde(default)]
    pub interactive: bool,
}

impl LayerDescriptor {
    /// Build a tile layer descriptor with no style
    pub fn tile(id: u32, name: &str, endpoint: &str, source_layer_id: &str) -> Self {
        Self {
            id: LayerId(id),
            name: name.to_string(),
            protocol_kind: ProtocolKind::TileService,
            endpoint: endpoint.to_string(),
            source_layer_id: source_layer_id.to_string(),
            style: None,
            analytics: None,
            interactive: false,
        }
    }

    /// Build a feature layer descriptor with no style
    pub fn feature(id: u32, name: &str, endpoint: &str, source_layer_id: &str) -> Self {
        Self {
            protocol_kind: ProtocolKind::FeatureService,
            ..Self::tile(id, name, endpoint, source_layer_id)
        }
    }

    /// Bind this descriptor to a dataset epoch
    pub fn with_analytics(mut self, epoch: Epoch) -> Self {
        self.analytics = Some(AnalyticsBinding { epoch });
        self
    }

    pub fn with_style(mut self, style: LayerStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    pub fn is_analytics_bearing(&self) -> bool {
        self.analytics.is_some()
    }

    /// Dataset epoch this layer activates, if any
    pub fn epoch(&self) -> Option<Epoch> {
        self.analytics.map(|binding| binding.epoch)
    }

    /// Whether activation registers pointer-move and click handlers
    pub fn registers_handlers(&self) -> bool {
        self.interactive && self.protocol_kind == ProtocolKind::FeatureService
    }

    /// Opacity a freshly activated layer starts with
    pub fn initial_opacity(&self, fallback: f32) -> f32 {
        self.style
            .as_ref()
            .and_then(|style| style.opacity)
            .unwrap_or(fallback)
            .clamp(0.0, 1.0)
    }

    /// Declared style with defaults filled in
    pub fn vector_style(&self) -> VectorStyle {
        let defaults = VectorStyle::default();
        match &self.style {
            Some(style) => VectorStyle {
                fill_color: style.fill_color.clone().unwrap_or(defaults.fill_color),
                stroke_color: style.stroke_color.clone().unwrap_or(defaults.stroke_color),
                stroke_width: style.stroke_width.unwrap_or(defaults.stroke_width),
            },
            None => defaults,
        }
    }

    pub fn feature_source(&self) -> FeatureSource {
        FeatureSource::classify(&self.endpoint, &self.source_layer_id)
    }

    /// GetLegendGraphic URL for tile layers; feature layers have no legend
    pub fn legend_url(&self) -> Option<String> {
        if self.protocol_kind != ProtocolKind::TileService {
            return None;
        }
        Some(format!(
            "{}?REQUEST=GetLegendGraphic&VERSION=1.0.0&FORMAT=image/png&WIDTH=20&HEIGHT=20&LAYER={}&STYLE=&LEGEND_OPTIONS={}",
            self.endpoint.trim(),
            self.source_layer_id,
            LEGEND_OPTIONS
        ))
    }
}
