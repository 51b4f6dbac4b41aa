//! Layer Registry
//!
//! Runtime set of active layers, in insertion order, with visibility,
//! opacity, render handles, the interaction handlers of interactive layers
//! and the current selection. The registry is the only owner of render
//! handles and handler ids; it pairs every handler registration with an
//! unregistration on removal.
//!
//! Changes to which analytics-bearing layers are visible are queued as
//! [`AnalyticsSignal`]s and drained by the viewer.

mod active;

pub use active::{Activation, ActiveLayer, ActiveLayerView, AnalyticsSignal, InteractionHandlers};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::catalog::{LayerCatalog, LayerDescriptor, LayerId, ProtocolKind, DEFAULT_OPACITY};
use crate::error::{Result, TerraError};
use crate::gateway::{
    Creation, CreationTicket, GatewayError, HandlerId, InteractionKind, RenderGateway, RenderHandle,
    TileLayerRequest, VectorLayerRequest,
};

/// Active layers and the surface resources they own
pub struct LayerRegistry<G: RenderGateway> {
    catalog: Arc<LayerCatalog>,
    gateway: G,
    default_opacity: f32,
    active: Vec<ActiveLayer>,
    handlers: HashMap<LayerId, InteractionHandlers>,
    pending: HashMap<CreationTicket, LayerId>,
    selected: Option<LayerId>,
    signals: Vec<AnalyticsSignal>,
}

impl<G: RenderGateway> LayerRegistry<G> {
    pub fn new(catalog: Arc<LayerCatalog>, gateway: G) -> Self {
        Self {
            catalog,
            gateway,
            default_opacity: DEFAULT_OPACITY,
            active: Vec::new(),
            handlers: HashMap::new(),
            pending: HashMap::new(),
            selected: None,
            signals: Vec::new(),
        }
    }

    /// Opacity for layers whose style does not declare one
    pub fn with_default_opacity(mut self, opacity: f32) -> Self {
        self.default_opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Activate a catalog layer
    ///
    /// Ready layers are attached, made visible, selected and (for
    /// interactive feature layers) given their handler pair. Pending layers
    /// finish in [`complete_creation`](Self::complete_creation).
    ///
    /// # Errors
    /// `AlreadyActive` if the layer is active or pending, `UnknownLayer`,
    /// `UnknownProtocol` and `CreationFailed`. The registry is unchanged on
    /// every error.
    pub fn add_layer(&mut self, id: LayerId) -> Result<Activation> {
        if self.is_active(id) || self.is_pending(id) {
            debug!(layer = %id, "ignoring duplicate add");
            return Err(TerraError::AlreadyActive { layer: id });
        }

        let descriptor = self
            .catalog
            .get(id)
            .cloned()
            .ok_or(TerraError::UnknownLayer { layer: id })?;
        let opacity = descriptor.initial_opacity(self.default_opacity);

        let creation = match &descriptor.protocol_kind {
            ProtocolKind::TileService => self.gateway.create_tile_layer(TileLayerRequest {
                layer: id,
                endpoint: descriptor.endpoint.clone(),
                source_layer_id: descriptor.source_layer_id.clone(),
                opacity,
            }),
            ProtocolKind::FeatureService => self.gateway.create_vector_layer(VectorLayerRequest {
                layer: id,
                source: descriptor.feature_source(),
                style: descriptor.vector_style(),
                opacity,
            }),
            ProtocolKind::Unsupported(protocol) => {
                error!(layer = %id, protocol = %protocol, "unsupported layer protocol");
                return Err(TerraError::UnknownProtocol {
                    layer: id,
                    protocol: protocol.clone(),
                });
            }
        }
        .map_err(|e| creation_failed(id, e))?;

        match creation {
            Creation::Ready(handle) => {
                self.activate(descriptor, handle);
                Ok(Activation::Active(id))
            }
            Creation::Pending(ticket) => {
                debug!(layer = %id, ticket = ticket.0, "layer creation pending");
                self.pending.insert(ticket, id);
                Ok(Activation::Pending(ticket))
            }
        }
    }

    /// Finish a pending creation
    ///
    /// Returns the activated layer, or `None` when the layer was removed
    /// while pending; in that case a created handle is destroyed without
    /// ever being attached.
    ///
    /// # Errors
    /// `CreationFailed` when the surface failed to build a still-wanted layer.
    pub fn complete_creation(
        &mut self,
        ticket: CreationTicket,
        result: std::result::Result<RenderHandle, GatewayError>,
    ) -> Result<Option<LayerId>> {
        let Some(id) = self.pending.remove(&ticket) else {
            if let Ok(handle) = result {
                debug!(ticket = ticket.0, "discarding layer removed while pending");
                self.gateway.destroy(handle);
            }
            return Ok(None);
        };

        let handle = result.map_err(|e| creation_failed(id, e))?;
        match self.catalog.get(id).cloned() {
            Some(descriptor) => {
                self.activate(descriptor, handle);
                Ok(Some(id))
            }
            None => {
                self.gateway.destroy(handle);
                Err(TerraError::UnknownLayer { layer: id })
            }
        }
    }

    fn activate(&mut self, descriptor: LayerDescriptor, handle: RenderHandle) {
        let id = descriptor.id;
        let opacity = descriptor.initial_opacity(self.default_opacity);

        self.gateway.set_opacity(handle, opacity);
        self.gateway.set_visible(handle, true);
        self.gateway.attach(handle);

        if descriptor.registers_handlers() {
            let handlers = InteractionHandlers {
                pointer_move: self.gateway.register_handler(InteractionKind::PointerMove),
                click: self.gateway.register_handler(InteractionKind::Click),
            };
            self.handlers.insert(id, handlers);
        }

        if let Some(epoch) = descriptor.epoch() {
            self.signals.push(AnalyticsSignal {
                layer: id,
                epoch,
                visible: true,
            });
        }

        info!(layer = %id, name = %descriptor.name, "layer activated");
        self.active.push(ActiveLayer::new(descriptor, opacity, handle));
        self.selected = Some(id);
    }

    /// Deactivate a layer, or cancel its pending creation
    ///
    /// Returns `false` when the layer was neither active nor pending.
    pub fn remove_layer(&mut self, id: LayerId) -> bool {
        if let Some(ticket) = self.pending_ticket(id) {
            debug!(layer = %id, ticket = ticket.0, "cancelling pending creation");
            self.pending.remove(&ticket);
            return true;
        }

        let Some(position) = self.active.iter().position(|layer| layer.id() == id) else {
            return false;
        };

        if let Some(handlers) = self.handlers.remove(&id) {
            self.gateway.unregister_handler(handlers.pointer_move);
            self.gateway.unregister_handler(handlers.click);
        }

        let layer = self.active.remove(position);
        self.gateway.detach(layer.render_handle());
        self.gateway.destroy(layer.render_handle());

        if self.selected == Some(id) {
            self.selected = self.active.first().map(ActiveLayer::id);
        }

        if let Some(epoch) = layer.descriptor().epoch() {
            self.signals.push(AnalyticsSignal {
                layer: id,
                epoch,
                visible: false,
            });
        }

        info!(layer = %id, "layer removed");
        true
    }

    /// Show or hide an active layer; returns `false` if it is not active
    pub fn set_visible(&mut self, id: LayerId, visible: bool) -> bool {
        let Some(layer) = self.active.iter_mut().find(|layer| layer.id() == id) else {
            return false;
        };

        let changed = layer.set_visible(visible);
        self.gateway.set_visible(layer.render_handle(), visible);

        if changed {
            if let Some(epoch) = layer.descriptor().epoch() {
                self.signals.push(AnalyticsSignal {
                    layer: id,
                    epoch,
                    visible,
                });
            }
        }
        true
    }

    /// Flip visibility; returns the new state for active layers
    pub fn toggle_visibility(&mut self, id: LayerId) -> Option<bool> {
        let visible = !self.get(id)?.is_visible();
        self.set_visible(id, visible);
        Some(visible)
    }

    /// Set opacity, clamped to [0, 1]; returns the stored value
    pub fn set_opacity(&mut self, id: LayerId, value: f32) -> Option<f32> {
        if value.is_nan() {
            warn!(layer = %id, "ignoring NaN opacity");
            return None;
        }

        let layer = self.active.iter_mut().find(|layer| layer.id() == id)?;
        let opacity = value.clamp(0.0, 1.0);
        layer.set_opacity(opacity);
        self.gateway.set_opacity(layer.render_handle(), opacity);
        Some(opacity)
    }

    /// Select an active layer; returns `false` and keeps the selection otherwise
    pub fn select_layer(&mut self, id: LayerId) -> bool {
        if !self.is_active(id) {
            return false;
        }
        self.selected = Some(id);
        true
    }

    pub fn selected(&self) -> Option<LayerId> {
        self.selected
    }

    pub fn selected_layer(&self) -> Option<&ActiveLayer> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: LayerId) -> Option<&ActiveLayer> {
        self.active.iter().find(|layer| layer.id() == id)
    }

    /// Active layers in insertion order
    pub fn active_layers(&self) -> &[ActiveLayer] {
        &self.active
    }

    pub fn active_ids(&self) -> Vec<LayerId> {
        self.active.iter().map(ActiveLayer::id).collect()
    }

    pub fn pending_ids(&self) -> Vec<LayerId> {
        let mut ids: Vec<LayerId> = self.pending.values().copied().collect();
        ids.sort();
        ids
    }

    pub fn is_active(&self, id: LayerId) -> bool {
        self.active.iter().any(|layer| layer.id() == id)
    }

    pub fn is_pending(&self, id: LayerId) -> bool {
        self.pending.values().any(|pending| *pending == id)
    }

    fn pending_ticket(&self, id: LayerId) -> Option<CreationTicket> {
        self.pending
            .iter()
            .find(|(_, pending)| **pending == id)
            .map(|(ticket, _)| *ticket)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// True while any analytics-bearing layer is active, visible or not
    pub fn has_active_analytics(&self) -> bool {
        self.active.iter().any(|layer| layer.descriptor().is_analytics_bearing())
    }

    /// Handler pair of an active interactive layer
    pub fn handlers_for(&self, id: LayerId) -> Option<InteractionHandlers> {
        self.handlers.get(&id).copied()
    }

    /// Owner and kind of a live handler; `None` for stale or foreign ids
    pub fn handler_owner(&self, handler: HandlerId) -> Option<(LayerId, InteractionKind)> {
        self.handlers.iter().find_map(|(id, pair)| {
            if pair.pointer_move == handler {
                Some((*id, InteractionKind::PointerMove))
            } else if pair.click == handler {
                Some((*id, InteractionKind::Click))
            } else {
                None
            }
        })
    }

    /// Number of registered handler pairs
    pub fn handler_pair_count(&self) -> usize {
        self.handlers.len()
    }

    /// Take the queued analytics signals, oldest first
    pub fn drain_signals(&mut self) -> Vec<AnalyticsSignal> {
        std::mem::take(&mut self.signals)
    }

    pub fn catalog(&self) -> &LayerCatalog {
        &self.catalog
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }
}

fn creation_failed(layer: LayerId, error: GatewayError) -> TerraError {
    warn!(layer = %layer, error = %error, "layer creation failed");
    TerraError::CreationFailed {
        layer,
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Epoch;
    use crate::gateway::RecordingGateway;

    fn catalog() -> Arc<LayerCatalog> {
        Arc::new(
            LayerCatalog::new(vec![
                LayerDescriptor::tile(1, "LULC 2022", "https://host/wms", "lulc:2022")
                    .with_analytics(Epoch(2022)),
                LayerDescriptor::tile(2, "LULC 2024", "https://host/wms", "lulc:2024")
                    .with_analytics(Epoch(2024)),
                LayerDescriptor::tile(3, "Rivers", "https://host/wms", "hydro:rivers"),
                LayerDescriptor::feature(4, "Sub-counties", "data/sub_counties.geojson", "")
                    .interactive(),
                LayerDescriptor {
                    protocol_kind: ProtocolKind::Unsupported("WCS".to_string()),
                    ..LayerDescriptor::tile(5, "Elevation", "https://host/wcs", "dem")
                },
            ])
            .unwrap(),
        )
    }

    fn registry() -> LayerRegistry<RecordingGateway> {
        LayerRegistry::new(catalog(), RecordingGateway::new())
    }

    #[test]
    fn test_add_layer_activates_and_selects() {
        let mut registry = registry();

        assert_eq!(registry.add_layer(LayerId(3)).unwrap(), Activation::Active(LayerId(3)));

        let layer = registry.get(LayerId(3)).unwrap();
        assert!(layer.is_visible());
        assert_eq!(layer.opacity(), DEFAULT_OPACITY);
        assert_eq!(registry.selected(), Some(LayerId(3)));
        assert_eq!(registry.gateway().attached_handles(), vec![layer.render_handle()]);
    }

    #[test]
    fn test_duplicate_add_is_rejected() {
        let mut registry = registry();
        registry.add_layer(LayerId(1)).unwrap();
        registry.drain_signals();

        let err = registry.add_layer(LayerId(1)).unwrap_err();
        assert!(matches!(err, TerraError::AlreadyActive { layer } if layer == LayerId(1)));
        assert_eq!(registry.len(), 1);
        assert!(registry.drain_signals().is_empty());
    }

    #[test]
    fn test_add_errors_leave_registry_unchanged() {
        let mut registry = registry();

        assert!(matches!(
            registry.add_layer(LayerId(99)),
            Err(TerraError::UnknownLayer { .. })
        ));
        assert!(matches!(
            registry.add_layer(LayerId(5)),
            Err(TerraError::UnknownProtocol { ref protocol, .. }) if protocol == "WCS"
        ));

        registry.gateway_mut().fail_layer(LayerId(2));
        assert!(matches!(
            registry.add_layer(LayerId(2)),
            Err(TerraError::CreationFailed { .. })
        ));

        assert!(registry.is_empty());
        assert_eq!(registry.selected(), None);
        assert!(registry.drain_signals().is_empty());
    }

    #[test]
    fn test_interactive_layer_handler_pairing() {
        let mut registry = registry();

        registry.add_layer(LayerId(4)).unwrap();
        let handlers = registry.handlers_for(LayerId(4)).unwrap();
        assert_eq!(
            registry.handler_owner(handlers.click),
            Some((LayerId(4), InteractionKind::Click))
        );
        assert_eq!(registry.gateway().handler_count(InteractionKind::Click), 1);

        assert!(registry.remove_layer(LayerId(4)));
        assert_eq!(registry.handler_pair_count(), 0);
        assert_eq!(registry.handler_owner(handlers.click), None);
        assert_eq!(registry.gateway().handler_count(InteractionKind::Click), 0);
        assert_eq!(registry.gateway().handler_count(InteractionKind::PointerMove), 0);
    }

    #[test]
    fn test_tile_layers_register_no_handlers() {
        let mut registry = registry();
        registry.add_layer(LayerId(1)).unwrap();

        assert!(registry.handlers_for(LayerId(1)).is_none());
        assert_eq!(registry.gateway().handler_count(InteractionKind::Click), 0);
    }

    #[test]
    fn test_remove_moves_selection_to_first_remaining() {
        let mut registry = registry();
        registry.add_layer(LayerId(3)).unwrap();
        registry.add_layer(LayerId(1)).unwrap();
        registry.add_layer(LayerId(2)).unwrap();
        assert_eq!(registry.selected(), Some(LayerId(2)));

        registry.remove_layer(LayerId(2));
        assert_eq!(registry.selected(), Some(LayerId(3)));

        registry.select_layer(LayerId(1));
        registry.remove_layer(LayerId(3));
        assert_eq!(registry.selected(), Some(LayerId(1)));

        registry.remove_layer(LayerId(1));
        assert_eq!(registry.selected(), None);
        assert!(!registry.remove_layer(LayerId(1)));
    }

    #[test]
    fn test_remove_detaches_and_destroys() {
        let mut registry = registry();
        registry.add_layer(LayerId(3)).unwrap();
        let handle = registry.get(LayerId(3)).unwrap().render_handle();

        registry.remove_layer(LayerId(3));
        assert!(registry.gateway().layer(handle).is_none());
        assert!(registry.gateway().attached_handles().is_empty());
    }

    #[test]
    fn test_opacity_is_clamped() {
        let mut registry = registry();
        registry.add_layer(LayerId(1)).unwrap();

        assert_eq!(registry.set_opacity(LayerId(1), 1.7), Some(1.0));
        assert_eq!(registry.set_opacity(LayerId(1), -0.2), Some(0.0));
        assert_eq!(registry.set_opacity(LayerId(1), f32::NAN), None);
        assert_eq!(registry.get(LayerId(1)).unwrap().opacity(), 0.0);
        assert_eq!(registry.set_opacity(LayerId(3), 0.5), None);
    }

    #[test]
    fn test_signals_track_analytics_visibility() {
        let mut registry = registry();
        registry.add_layer(LayerId(1)).unwrap();
        registry.add_layer(LayerId(3)).unwrap();

        registry.set_visible(LayerId(1), false);
        registry.set_visible(LayerId(1), false);
        registry.set_visible(LayerId(3), false);
        registry.remove_layer(LayerId(1));

        let signals = registry.drain_signals();
        let visibility: Vec<bool> = signals.iter().map(|s| s.visible).collect();
        assert_eq!(visibility, vec![true, false, false]);
        assert!(signals.iter().all(|s| s.layer == LayerId(1) && s.epoch == Epoch(2022)));
    }

    #[test]
    fn test_toggle_visibility() {
        let mut registry = registry();
        registry.add_layer(LayerId(3)).unwrap();

        assert_eq!(registry.toggle_visibility(LayerId(3)), Some(false));
        assert_eq!(registry.toggle_visibility(LayerId(3)), Some(true));
        assert_eq!(registry.toggle_visibility(LayerId(1)), None);
    }

    #[test]
    fn test_pending_creation_completes() {
        let mut registry = LayerRegistry::new(catalog(), RecordingGateway::deferred());

        let Activation::Pending(ticket) = registry.add_layer(LayerId(4)).unwrap() else {
            panic!("expected pending creation");
        };
        assert!(registry.is_pending(LayerId(4)));
        assert!(matches!(
            registry.add_layer(LayerId(4)),
            Err(TerraError::AlreadyActive { .. })
        ));

        let handle = registry.gateway_mut().resolve_pending(ticket).unwrap();
        assert_eq!(registry.complete_creation(ticket, Ok(handle)).unwrap(), Some(LayerId(4)));
        assert!(registry.is_active(LayerId(4)));
        assert_eq!(registry.handler_pair_count(), 1);
    }

    #[test]
    fn test_removal_while_pending_discards_handle() {
        let mut registry = LayerRegistry::new(catalog(), RecordingGateway::deferred());

        let Activation::Pending(ticket) = registry.add_layer(LayerId(4)).unwrap() else {
            panic!("expected pending creation");
        };
        assert!(registry.remove_layer(LayerId(4)));

        let handle = registry.gateway_mut().resolve_pending(ticket).unwrap();
        assert_eq!(registry.complete_creation(ticket, Ok(handle)).unwrap(), None);

        assert!(!registry.is_active(LayerId(4)));
        assert!(registry.gateway().layer(handle).is_none());
        assert_eq!(registry.gateway().handler_count(InteractionKind::Click), 0);
    }
}
