//! Scripted viewer sessions
//!
//! A replay script is a JSON list of user and timer events run against a
//! viewer backed by the [`RecordingGateway`]. Time is virtual: it starts at
//! the moment the script runs and only moves on `advance` steps.
//!
//! ```json
//! { "steps": [
//!     { "action": "surface_ready" },
//!     { "action": "add", "layer": 2 },
//!     { "action": "add", "layer": 4 },
//!     { "action": "select", "layer": 2 },
//!     { "action": "click", "region": "Kangema" },
//!     { "action": "advance", "ms": 1000 }
//! ] }
//! ```

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::LayerId;
use crate::error::{Result, TerraError};
use crate::gateway::{FeatureHit, InteractionKind, MapCoordinate, RecordingGateway};
use crate::panel::PanelPlacement;
use crate::viewer::MapViewer;

/// One scripted event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReplayStep {
    Add { layer: LayerId },
    Remove { layer: LayerId },
    SetVisible { layer: LayerId, visible: bool },
    ToggleVisibility { layer: LayerId },
    SetOpacity { layer: LayerId, opacity: f32 },
    Select { layer: LayerId },
    /// Pointer over a feature; no `region` means the feature has no name
    Hover {
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
    },
    /// Pointer over empty map
    HoverNothing,
    Click {
        #[serde(default)]
        region: Option<String>,
    },
    TogglePanel,
    ResetToAggregate,
    Placement { placement: PanelPlacement },
    SurfaceReady,
    Advance { ms: u64 },
    LegendFailed { layer: LayerId },
    /// Probe the selected layer's legend image
    CheckLegend,
    ToggleLegend,
    /// Let the surface finish every pending layer creation
    ResolvePending,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReplayScript {
    pub steps: Vec<ReplayStep>,
}

impl ReplayScript {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| TerraError::FileNotFound {
            path: path.to_path_buf(),
            source: Some(e),
        })?;
        Self::from_json(&json)
    }
}

/// A step whose event was rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: usize,
    pub code: String,
    pub message: String,
}

/// Drives a viewer through a script
pub struct ReplayRunner {
    start: Instant,
    elapsed: Duration,
}

impl ReplayRunner {
    pub fn new(start: Instant) -> Self {
        Self {
            start,
            elapsed: Duration::ZERO,
        }
    }

    fn now(&self) -> Instant {
        self.start + self.elapsed
    }

    /// Run every step; rejected events are collected, never fatal
    pub fn run(&mut self, viewer: &mut MapViewer<RecordingGateway>, script: &ReplayScript) -> Vec<StepFailure> {
        let mut failures = Vec::new();

        for (step, event) in script.steps.iter().enumerate() {
            debug!(step, ?event, "replaying step");
            for e in self.apply(viewer, event) {
                warn!(step, error = %e, "step rejected");
                failures.push(StepFailure {
                    step,
                    code: e.error_code().to_string(),
                    message: e.to_string(),
                });
            }
        }
        failures
    }

    /// Apply one step; a step can reject more than one event
    fn apply(&mut self, viewer: &mut MapViewer<RecordingGateway>, event: &ReplayStep) -> Vec<TerraError> {
        let mut rejected = Vec::new();
        match event {
            ReplayStep::Add { layer } => {
                if let Err(e) = viewer.add_layer(*layer) {
                    rejected.push(e);
                }
            }
            ReplayStep::Remove { layer } => {
                viewer.remove_layer(*layer);
            }
            ReplayStep::SetVisible { layer, visible } => {
                viewer.set_visible(*layer, *visible);
            }
            ReplayStep::ToggleVisibility { layer } => {
                viewer.toggle_visibility(*layer);
            }
            ReplayStep::SetOpacity { layer, opacity } => {
                viewer.set_opacity(*layer, *opacity);
            }
            ReplayStep::Select { layer } => {
                viewer.select_layer(*layer);
            }
            ReplayStep::Hover { region, x, y } => {
                let hit = feature(viewer, region.as_deref());
                let at = MapCoordinate::new(*x, *y);
                let handlers = viewer.gateway().handlers(InteractionKind::PointerMove);
                for handler in handlers {
                    viewer.handle_pointer_move(handler, at, Some(&hit));
                }
            }
            ReplayStep::HoverNothing => {
                let handlers = viewer.gateway().handlers(InteractionKind::PointerMove);
                for handler in handlers {
                    viewer.handle_pointer_move(handler, MapCoordinate::default(), None);
                }
            }
            ReplayStep::Click { region } => {
                let hit = feature(viewer, region.as_deref());
                let handlers = viewer.gateway().handlers(InteractionKind::Click);
                for handler in handlers {
                    viewer.handle_click(handler, Some(&hit));
                }
            }
            ReplayStep::TogglePanel => {
                viewer.toggle_panel();
            }
            ReplayStep::ResetToAggregate => viewer.reset_to_aggregate(),
            ReplayStep::Placement { placement } => viewer.set_placement(*placement),
            ReplayStep::SurfaceReady => viewer.surface_ready(self.now()),
            ReplayStep::Advance { ms } => {
                self.elapsed += Duration::from_millis(*ms);
                viewer.tick(self.now());
            }
            ReplayStep::LegendFailed { layer } => viewer.legend_failed(*layer),
            ReplayStep::CheckLegend => {
                if let Err(e) = viewer.check_legend() {
                    rejected.push(e);
                }
            }
            ReplayStep::ToggleLegend => {
                viewer.toggle_legend_collapsed();
            }
            ReplayStep::ResolvePending => {
                let tickets = viewer.gateway().pending_tickets();
                for ticket in tickets {
                    let result = viewer.gateway_mut().resolve_pending(ticket);
                    if let Err(e) = viewer.complete_creation(ticket, result) {
                        rejected.push(e);
                    }
                }
            }
        }
        rejected
    }
}

fn feature(viewer: &MapViewer<RecordingGateway>, region: Option<&str>) -> FeatureHit {
    match region {
        Some(name) => FeatureHit::new().with_attribute(&viewer.config().region_attribute, name),
        None => FeatureHit::new(),
    }
}
