//! Render Gateway
//!
//! The capability the core uses to talk to a rendering surface. The core
//! only ever holds the opaque ids handed out here; drawing, projection and
//! hit-testing stay on the other side of the trait.
//!
//! Every call is synchronous from the caller's point of view. Surfaces that
//! build layers asynchronously answer a create request with
//! [`Creation::Pending`] and report the outcome later through
//! `LayerRegistry::complete_creation`.

mod recording;

pub use recording::{GatewayCall, RecordingGateway, SurfaceLayer};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{FeatureSource, LayerId, VectorStyle};

/// Opaque reference to a renderable layer owned by the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RenderHandle(pub u64);

impl fmt::Display for RenderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "render#{}", self.0)
    }
}

/// Opaque reference to a registered surface event handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandlerId(pub u64);

/// Identifies a creation request the surface has not answered yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CreationTicket(pub u64);

/// Surface events an interactive layer listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    PointerMove,
    Click,
}

/// Position on the map in surface coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MapCoordinate {
    pub x: f64,
    pub y: f64,
}

impl MapCoordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// String-keyed feature attributes as delivered by hit-testing
pub type AttributeBag = BTreeMap<String, serde_json::Value>;

/// The single feature found under a pointer event
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureHit {
    pub attributes: AttributeBag,
}

impl FeatureHit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Attribute as text; non-string values are not region names
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}

/// Floating label content shown next to a hovered feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoverLabel {
    pub title: String,
    pub hint: String,
}

/// Raster tile layer creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayerRequest {
    pub layer: LayerId,
    pub endpoint: String,
    pub source_layer_id: String,
    pub opacity: f32,
}

/// Vector feature layer creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorLayerRequest {
    pub layer: LayerId,
    pub source: FeatureSource,
    pub style: VectorStyle,
    pub opacity: f32,
}

/// Answer to a creation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Creation {
    /// The layer exists and can be attached
    Ready(RenderHandle),
    /// The surface will finish the layer later
    Pending(CreationTicket),
}

/// Failures reported by a surface
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("malformed feature source: {reason}")]
    MalformedSource { reason: String },

    #[error("surface rejected layer: {reason}")]
    Rejected { reason: String },
}

/// Capabilities the layer registry and viewer need from a rendering surface
pub trait RenderGateway {
    fn create_tile_layer(&mut self, request: TileLayerRequest) -> Result<Creation, GatewayError>;

    fn create_vector_layer(&mut self, request: VectorLayerRequest) -> Result<Creation, GatewayError>;

    /// Put a created layer on the live surface
    fn attach(&mut self, handle: RenderHandle);

    /// Take a layer off the live surface
    fn detach(&mut self, handle: RenderHandle);

    /// Release a layer; the handle is invalid afterwards
    fn destroy(&mut self, handle: RenderHandle);

    fn set_visible(&mut self, handle: RenderHandle, visible: bool);

    fn set_opacity(&mut self, handle: RenderHandle, opacity: f32);

    /// Register a surface-wide handler for one kind of pointer event
    fn register_handler(&mut self, kind: InteractionKind) -> HandlerId;

    /// Remove a handler; removing an unknown handler does nothing
    fn unregister_handler(&mut self, handler: HandlerId);

    fn show_label(&mut self, at: MapCoordinate, label: &HoverLabel);

    fn hide_label(&mut self);
}
