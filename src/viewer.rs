//! Map viewer
//!
//! Ties the catalog, dataset index, layer registry, analytics panel and
//! legend together behind one event-driven API. Every method is a discrete
//! user or timer event; the viewer applies it, forwards analytics signals
//! from the registry to the panel and records the visible outcome in the
//! activity log.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::activity::ActivityLog;
use crate::catalog::{LayerCatalog, LayerDescriptor, LayerId};
use crate::config::ViewerConfig;
use crate::dataset::{DatasetIndex, RegionRecord};
use crate::error::{Result, TerraError};
use crate::gateway::{
    CreationTicket, FeatureHit, GatewayError, HandlerId, HoverLabel, InteractionKind, MapCoordinate,
    RenderGateway, RenderHandle,
};
use crate::legend::{probe_legend, LegendController, LegendView};
use crate::panel::{AnalyticsPanelController, PanelPlacement, PanelState};
use crate::registry::{Activation, ActiveLayerView, LayerRegistry};
use crate::resolver::{FeatureDataResolver, Resolution, ResolutionOutcome};

/// Label title for features without a region name
pub const UNKNOWN_AREA: &str = "Unknown Area";

/// Hint shown under the hovered region name
pub const CLICK_HINT: &str = "Click to view data";

/// Snapshot of what the user is looking at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    pub selected_layer_id: Option<LayerId>,
    pub current_record: RegionRecord,
    pub panel_visible: bool,
    pub panel_placement: PanelPlacement,
}

/// Full serializable state, printed by the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerReport {
    pub session_id: Uuid,
    pub active_layers: Vec<ActiveLayerView>,
    pub pending_layers: Vec<LayerId>,
    pub selection: SelectionState,
    pub legend: Option<LegendView>,
    pub label: Option<String>,
    pub activity: Vec<String>,
}

pub struct MapViewer<G: RenderGateway> {
    session_id: Uuid,
    config: ViewerConfig,
    catalog: Arc<LayerCatalog>,
    index: DatasetIndex,
    registry: LayerRegistry<G>,
    panel: AnalyticsPanelController,
    legend: LegendController,
    activity: ActivityLog,
    label: Option<String>,
}

impl<G: RenderGateway> MapViewer<G> {
    /// Build a viewer over a loaded catalog and index
    ///
    /// # Errors
    /// `MissingAggregate` when an analytics-bearing layer points at an
    /// epoch the index has no aggregate for.
    pub fn new(config: ViewerConfig, catalog: LayerCatalog, index: DatasetIndex, gateway: G) -> Result<Self> {
        config.validate()?;
        index.ensure_epochs(&catalog.bound_epochs())?;

        let catalog = Arc::new(catalog);
        let registry = LayerRegistry::new(Arc::clone(&catalog), gateway).with_default_opacity(config.default_opacity);
        let panel = AnalyticsPanelController::new(
            index.default_aggregate().clone(),
            config.default_placement,
            config.reveal_delay(),
        );
        let activity = ActivityLog::new(config.activity_log_limit);
        let session_id = Uuid::new_v4();

        info!(
            session = %session_id,
            layers = catalog.len(),
            records = index.len(),
            "map viewer ready"
        );

        Ok(Self {
            session_id,
            config,
            catalog,
            index,
            registry,
            panel,
            legend: LegendController::new(),
            activity,
            label: None,
        })
    }

    /// Load catalog and dataset as configured
    pub fn from_config(config: ViewerConfig, gateway: G) -> Result<Self> {
        let catalog = config.load_catalog()?;
        let index = config.load_index()?;
        Self::new(config, catalog, index, gateway)
    }

    /// Viewer over the bundled catalog and dataset with default settings
    pub fn with_builtin(gateway: G) -> Result<Self> {
        Self::from_config(ViewerConfig::default(), gateway)
    }

    // Layer events

    /// Activate a catalog layer
    ///
    /// Failures are logged and returned; none of them change state.
    pub fn add_layer(&mut self, id: LayerId) -> Result<Activation> {
        let result = self.registry.add_layer(id);
        match &result {
            Ok(Activation::Active(_)) => self.record_layer("Added", id),
            Ok(Activation::Pending(ticket)) => debug!(layer = %id, ticket = ticket.0, "waiting for layer"),
            Err(TerraError::AlreadyActive { .. }) => debug!(layer = %id, "layer already active"),
            Err(e) => warn!(layer = %id, error = %e, "layer not added"),
        }
        self.flush_signals();
        result
    }

    /// Finish a pending layer creation reported by the surface
    pub fn complete_creation(
        &mut self,
        ticket: CreationTicket,
        result: std::result::Result<RenderHandle, GatewayError>,
    ) -> Result<Option<LayerId>> {
        let outcome = self.registry.complete_creation(ticket, result);
        match &outcome {
            Ok(Some(id)) => self.record_layer("Added", *id),
            Ok(None) => {}
            Err(e) => warn!(ticket = ticket.0, error = %e, "pending layer failed"),
        }
        self.flush_signals();
        outcome
    }

    /// Deactivate a layer
    ///
    /// Removing the layer that owns the pointer handlers also takes down the
    /// hover label, since no handler is left to hide it.
    pub fn remove_layer(&mut self, id: LayerId) -> bool {
        let owned_handlers = self.registry.handlers_for(id).is_some();
        let removed = self.registry.remove_layer(id);
        if removed {
            if owned_handlers && self.label.take().is_some() {
                self.registry.gateway_mut().hide_label();
            }
            self.legend.clear_failure(id);
            self.record_layer("Removed", id);
        }
        self.flush_signals();
        removed
    }

    pub fn set_visible(&mut self, id: LayerId, visible: bool) -> bool {
        let applied = self.registry.set_visible(id, visible);
        self.flush_signals();
        applied
    }

    pub fn toggle_visibility(&mut self, id: LayerId) -> Option<bool> {
        let visible = self.registry.toggle_visibility(id);
        self.flush_signals();
        visible
    }

    pub fn set_opacity(&mut self, id: LayerId, value: f32) -> Option<f32> {
        self.registry.set_opacity(id, value)
    }

    pub fn select_layer(&mut self, id: LayerId) -> bool {
        let selected = self.registry.select_layer(id);
        if selected {
            debug!(layer = %id, "layer selected");
        }
        selected
    }

    // Pointer events

    /// Pointer moved over the map; `hit` is the feature under the pointer
    ///
    /// Returns `false` for handlers the viewer does not own any more.
    pub fn handle_pointer_move(&mut self, handler: HandlerId, at: MapCoordinate, hit: Option<&FeatureHit>) -> bool {
        if !self.owns_handler(handler, InteractionKind::PointerMove) {
            return false;
        }

        match hit {
            Some(feature) => {
                let title = feature
                    .attribute_str(&self.config.region_attribute)
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .unwrap_or(UNKNOWN_AREA)
                    .to_string();
                let label = HoverLabel {
                    title: title.clone(),
                    hint: CLICK_HINT.to_string(),
                };
                self.registry.gateway_mut().show_label(at, &label);
                self.label = Some(title);
            }
            None => {
                if self.label.take().is_some() {
                    self.registry.gateway_mut().hide_label();
                }
            }
        }
        true
    }

    /// Feature clicked
    ///
    /// Resolves the clicked region against the selected layer's epoch and
    /// shows the result. Clicks while no analytics layer is active, clicks
    /// on empty map and clicks from stale handlers are ignored.
    ///
    /// The epoch comes from the selected layer, not from the analytics
    /// layer. Adding the boundaries layer selects it, so a click right after
    /// adding an analytics layer and then the boundaries resolves against
    /// the default epoch until the analytics layer is selected again.
    pub fn handle_click(&mut self, handler: HandlerId, hit: Option<&FeatureHit>) -> Option<ResolutionOutcome> {
        if !self.owns_handler(handler, InteractionKind::Click) {
            return None;
        }
        let feature = hit?;
        if !self.registry.has_active_analytics() {
            debug!("click ignored, no analytics layer active");
            return None;
        }

        let raw = feature.attribute_str(&self.config.region_attribute);
        let resolver = FeatureDataResolver::new(&self.catalog, &self.index);
        let resolution = resolver.resolve_detailed(self.registry.selected(), raw);
        self.panel.show_record(resolution.record);

        info!(
            region = %resolution.record.region_name,
            epoch = %resolution.epoch,
            outcome = ?resolution.outcome,
            "feature resolved"
        );
        self.activity.record(&format!(
            "Showing {} ({})",
            resolution.record.region_name, resolution.epoch
        ));
        Some(resolution.outcome)
    }

    fn owns_handler(&self, handler: HandlerId, kind: InteractionKind) -> bool {
        match self.registry.handler_owner(handler) {
            Some((_, owned)) if owned == kind => true,
            _ => {
                debug!(handler = handler.0, ?kind, "ignoring event from stale handler");
                false
            }
        }
    }

    // Panel events

    pub fn toggle_panel(&mut self) -> bool {
        let visible = self.panel.toggle();
        self.activity.record(if visible { "Panel shown" } else { "Panel hidden" });
        visible
    }

    /// Show the aggregate of the selected layer's epoch
    pub fn reset_to_aggregate(&mut self) {
        let resolver = FeatureDataResolver::new(&self.catalog, &self.index);
        let aggregate = resolver.aggregate(resolver.epoch_for(self.registry.selected()));
        self.panel.reset_to_aggregate(aggregate);
        self.activity.record(&format!("Showing {} ({})", aggregate.region_name, aggregate.epoch));
    }

    pub fn set_placement(&mut self, placement: PanelPlacement) {
        self.panel.set_placement(placement);
        debug!(%placement, "panel placement changed");
    }

    /// The map surface finished its initial setup
    pub fn surface_ready(&mut self, now: Instant) {
        self.panel.surface_ready(now);
    }

    /// Timer event; fires the scheduled panel reveal when due
    pub fn tick(&mut self, now: Instant) -> bool {
        let revealed = self.panel.tick(now, self.index.default_aggregate());
        if revealed {
            self.activity.record("Panel revealed");
        }
        revealed
    }

    // Legend events

    pub fn legend(&self) -> Option<LegendView> {
        self.legend
            .view(self.registry.selected_layer().map(|layer| layer.descriptor()))
    }

    /// The legend image of a layer failed to load
    pub fn legend_failed(&mut self, id: LayerId) {
        self.legend.mark_failed(id);
    }

    /// Probe the selected layer's legend image
    ///
    /// A failed probe hides that legend only; layers and panel are left as
    /// they are. Does nothing when the selection has no legend.
    pub fn check_legend(&mut self) -> Result<()> {
        let Some(view) = self.legend() else {
            return Ok(());
        };
        if let Err(e) = probe_legend(&view.url) {
            self.legend_failed(view.layer);
            return Err(e);
        }
        debug!(layer = %view.layer, "legend image reachable");
        Ok(())
    }

    pub fn toggle_legend_collapsed(&mut self) -> bool {
        self.legend.toggle_collapsed()
    }

    // Queries

    /// Catalog layers not active or pending, in catalog order
    pub fn available_layers(&self) -> Vec<&LayerDescriptor> {
        let mut taken = self.registry.active_ids();
        taken.extend(self.registry.pending_ids());
        self.catalog.available(&taken)
    }

    pub fn resolve(&self, selected: Option<LayerId>, raw_name: Option<&str>) -> Resolution<'_> {
        FeatureDataResolver::new(&self.catalog, &self.index).resolve_detailed(selected, raw_name)
    }

    pub fn selection(&self) -> SelectionState {
        SelectionState {
            selected_layer_id: self.registry.selected(),
            current_record: self.panel.record().clone(),
            panel_visible: self.panel.is_visible(),
            panel_placement: self.panel.placement(),
        }
    }

    pub fn panel_state(&self) -> PanelState<'_> {
        self.panel.state()
    }

    /// Title of the floating label, if shown
    pub fn hover_label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn report(&self) -> ViewerReport {
        ViewerReport {
            session_id: self.session_id,
            active_layers: self.registry.active_layers().iter().map(ActiveLayerView::from).collect(),
            pending_layers: self.registry.pending_ids(),
            selection: self.selection(),
            legend: self.legend(),
            label: self.label.clone(),
            activity: self.activity.entries().map(|e| e.description.clone()).collect(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &LayerCatalog {
        &self.catalog
    }

    pub fn index(&self) -> &DatasetIndex {
        &self.index
    }

    pub fn registry(&self) -> &LayerRegistry<G> {
        &self.registry
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn gateway(&self) -> &G {
        self.registry.gateway()
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        self.registry.gateway_mut()
    }

    fn flush_signals(&mut self) {
        for signal in self.registry.drain_signals() {
            let resolver = FeatureDataResolver::new(&self.catalog, &self.index);
            let aggregate = resolver.aggregate(signal.epoch);
            if self.panel.on_signal(&signal, aggregate) {
                let description = if signal.visible {
                    format!("Showing {} ({})", aggregate.region_name, signal.epoch)
                } else {
                    "Panel hidden".to_string()
                };
                self.activity.record(&description);
            }
        }
    }

    fn record_layer(&mut self, verb: &str, id: LayerId) {
        let name = self
            .catalog
            .get(id)
            .map(|d| d.name.as_str())
            .unwrap_or("unknown");
        self.activity.record(&format!("{} layer {} ({})", verb, id, name));
    }
}
