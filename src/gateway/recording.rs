//! In-memory render gateway
//!
//! Keeps the surface state a real renderer would own (layers, handlers,
//! the floating label) and records every call, so the core can be driven
//! and inspected without a rendering surface.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{
    Creation, CreationTicket, GatewayError, HandlerId, HoverLabel, InteractionKind, MapCoordinate,
    RenderGateway, RenderHandle, TileLayerRequest, VectorLayerRequest,
};
use crate::catalog::{FeatureSource, LayerId};

/// One call received by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum GatewayCall {
    CreateTile { layer: LayerId },
    CreateVector { layer: LayerId },
    Attach { handle: RenderHandle },
    Detach { handle: RenderHandle },
    Destroy { handle: RenderHandle },
    SetVisible { handle: RenderHandle, visible: bool },
    SetOpacity { handle: RenderHandle, opacity: f32 },
    Register { handler: HandlerId, kind: InteractionKind },
    Unregister { handler: HandlerId },
    ShowLabel { title: String },
    HideLabel,
}

/// Surface-side state of a created layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceLayer {
    pub layer: LayerId,
    pub attached: bool,
    pub visible: bool,
    pub opacity: f32,
}

/// Gateway double that renders nothing and remembers everything
#[derive(Debug, Default)]
pub struct RecordingGateway {
    next_id: u64,
    deferred: bool,
    failing: HashSet<LayerId>,
    layers: BTreeMap<RenderHandle, SurfaceLayer>,
    pending: BTreeMap<CreationTicket, SurfaceLayer>,
    handlers: BTreeMap<HandlerId, InteractionKind>,
    label: Option<(MapCoordinate, HoverLabel)>,
    calls: Vec<GatewayCall>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every creation request with a pending ticket
    pub fn deferred() -> Self {
        Self {
            deferred: true,
            ..Self::default()
        }
    }

    /// Make creation fail for a layer
    pub fn fail_layer(&mut self, layer: LayerId) {
        self.failing.insert(layer);
    }

    /// Finish a deferred creation; the new layer is created but not attached
    pub fn resolve_pending(&mut self, ticket: CreationTicket) -> Result<RenderHandle, GatewayError> {
        let surface = self.pending.remove(&ticket).ok_or_else(|| GatewayError::Rejected {
            reason: format!("unknown creation ticket {}", ticket.0),
        })?;
        if self.failing.contains(&surface.layer) {
            return Err(GatewayError::Rejected {
                reason: format!("layer {} failed to load", surface.layer),
            });
        }
        let handle = RenderHandle(self.next());
        self.layers.insert(handle, surface);
        Ok(handle)
    }

    /// Unanswered creation tickets, oldest first
    pub fn pending_tickets(&self) -> Vec<CreationTicket> {
        self.pending.keys().copied().collect()
    }

    pub fn layer(&self, handle: RenderHandle) -> Option<&SurfaceLayer> {
        self.layers.get(&handle)
    }

    /// Handles currently on the live surface
    pub fn attached_handles(&self) -> Vec<RenderHandle> {
        self.layers
            .iter()
            .filter(|(_, layer)| layer.attached)
            .map(|(handle, _)| *handle)
            .collect()
    }

    /// Layers created and not yet destroyed, attached or not
    pub fn live_layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Registered handlers of one kind, in registration order
    pub fn handlers(&self, kind: InteractionKind) -> Vec<HandlerId> {
        self.handlers
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn handler_count(&self, kind: InteractionKind) -> usize {
        self.handlers.values().filter(|k| **k == kind).count()
    }

    pub fn label(&self) -> Option<&(MapCoordinate, HoverLabel)> {
        self.label.as_ref()
    }

    pub fn calls(&self) -> &[GatewayCall] {
        &self.calls
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn create(&mut self, layer: LayerId, opacity: f32) -> Result<Creation, GatewayError> {
        let surface = SurfaceLayer {
            layer,
            attached: false,
            visible: true,
            opacity,
        };

        if self.deferred {
            let ticket = CreationTicket(self.next());
            self.pending.insert(ticket, surface);
            return Ok(Creation::Pending(ticket));
        }
        if self.failing.contains(&layer) {
            return Err(GatewayError::Rejected {
                reason: format!("layer {} failed to load", layer),
            });
        }

        let handle = RenderHandle(self.next());
        self.layers.insert(handle, surface);
        Ok(Creation::Ready(handle))
    }
}

impl RenderGateway for RecordingGateway {
    fn create_tile_layer(&mut self, request: TileLayerRequest) -> Result<Creation, GatewayError> {
        self.calls.push(GatewayCall::CreateTile { layer: request.layer });
        if request.source_layer_id.is_empty() {
            return Err(GatewayError::Rejected {
                reason: "tile request without a source layer".to_string(),
            });
        }
        self.create(request.layer, request.opacity)
    }

    fn create_vector_layer(&mut self, request: VectorLayerRequest) -> Result<Creation, GatewayError> {
        self.calls.push(GatewayCall::CreateVector { layer: request.layer });
        match &request.source {
            FeatureSource::Local { url } if url.is_empty() => {
                return Err(GatewayError::MalformedSource {
                    reason: "empty document url".to_string(),
                })
            }
            FeatureSource::Remote { type_name, .. } if type_name.is_empty() => {
                return Err(GatewayError::MalformedSource {
                    reason: "remote source without a type name".to_string(),
                })
            }
            _ => {}
        }
        self.create(request.layer, request.opacity)
    }

    fn attach(&mut self, handle: RenderHandle) {
        self.calls.push(GatewayCall::Attach { handle });
        if let Some(layer) = self.layers.get_mut(&handle) {
            layer.attached = true;
        }
    }

    fn detach(&mut self, handle: RenderHandle) {
        self.calls.push(GatewayCall::Detach { handle });
        if let Some(layer) = self.layers.get_mut(&handle) {
            layer.attached = false;
        }
    }

    fn destroy(&mut self, handle: RenderHandle) {
        self.calls.push(GatewayCall::Destroy { handle });
        self.layers.remove(&handle);
    }

    fn set_visible(&mut self, handle: RenderHandle, visible: bool) {
        self.calls.push(GatewayCall::SetVisible { handle, visible });
        if let Some(layer) = self.layers.get_mut(&handle) {
            layer.visible = visible;
        }
    }

    fn set_opacity(&mut self, handle: RenderHandle, opacity: f32) {
        self.calls.push(GatewayCall::SetOpacity { handle, opacity });
        if let Some(layer) = self.layers.get_mut(&handle) {
            layer.opacity = opacity;
        }
    }

    fn register_handler(&mut self, kind: InteractionKind) -> HandlerId {
        let handler = HandlerId(self.next());
        self.handlers.insert(handler, kind);
        self.calls.push(GatewayCall::Register { handler, kind });
        handler
    }

    fn unregister_handler(&mut self, handler: HandlerId) {
        self.calls.push(GatewayCall::Unregister { handler });
        self.handlers.remove(&handler);
    }

    fn show_label(&mut self, at: MapCoordinate, label: &HoverLabel) {
        self.calls.push(GatewayCall::ShowLabel {
            title: label.title.clone(),
        });
        self.label = Some((at, label.clone()));
    }

    fn hide_label(&mut self) {
        self.calls.push(GatewayCall::HideLabel);
        self.label = None;
    }
}
