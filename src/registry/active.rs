//! Runtime state of activated layers

use serde::{Deserialize, Serialize};

use crate::catalog::{LayerDescriptor, LayerId};
use crate::dataset::Epoch;
use crate::gateway::{CreationTicket, HandlerId, RenderHandle};

/// A catalog layer currently on the map
#[derive(Debug, Clone)]
pub struct ActiveLayer {
    descriptor: LayerDescriptor,
    visible: bool,
    opacity: f32,
    handle: RenderHandle,
}

impl ActiveLayer {
    pub(crate) fn new(descriptor: LayerDescriptor, opacity: f32, handle: RenderHandle) -> Self {
        Self {
            descriptor,
            visible: true,
            opacity,
            handle,
        }
    }

    pub fn id(&self) -> LayerId {
        self.descriptor.id
    }

    pub fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Always within [0, 1]
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn render_handle(&self) -> RenderHandle {
        self.handle
    }

    pub(crate) fn set_visible(&mut self, visible: bool) -> bool {
        let changed = self.visible != visible;
        self.visible = visible;
        changed
    }

    pub(crate) fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity;
    }
}

/// The handler pair an interactive layer owns while active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionHandlers {
    pub pointer_move: HandlerId,
    pub click: HandlerId,
}

/// Emitted whenever an analytics-bearing layer appears or disappears
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSignal {
    pub layer: LayerId,
    pub epoch: Epoch,
    pub visible: bool,
}

/// Result of a successful add request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The layer is attached and visible
    Active(LayerId),
    /// The surface is still building the layer
    Pending(CreationTicket),
}

/// Serializable snapshot of an active layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveLayerView {
    pub id: LayerId,
    pub name: String,
    pub protocol: String,
    pub visible: bool,
    pub opacity: f32,
}

impl From<&ActiveLayer> for ActiveLayerView {
    fn from(layer: &ActiveLayer) -> Self {
        Self {
            id: layer.id(),
            name: layer.descriptor.name.clone(),
            protocol: layer.descriptor.protocol_kind.to_string(),
            visible: layer.visible,
            opacity: layer.opacity,
        }
    }
}
