//! Analytics Panel Controller
//!
//! Two-state machine deciding whether the analytics panel is shown, which
//! record it displays and where it sits. The current record survives while
//! the panel is hidden so toggling it back shows the same data.
//!
//! The panel is driven by analytics signals from the layer registry, by
//! resolved clicks and by explicit user transitions. A one-shot reveal can
//! be scheduled once the map surface is ready; any explicit transition
//! before it fires cancels it.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::LayerId;
use crate::dataset::RegionRecord;
use crate::registry::AnalyticsSignal;

/// Delay between the map surface becoming ready and the automatic reveal
pub const DEFAULT_REVEAL_DELAY: Duration = Duration::from_millis(1000);

/// Horizontal position of the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelPlacement {
    #[default]
    Left,
    Center,
    Right,
}

impl PanelPlacement {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelPlacement::Left => "left",
            PanelPlacement::Center => "center",
            PanelPlacement::Right => "right",
        }
    }
}

impl fmt::Display for PanelPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PanelPlacement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(PanelPlacement::Left),
            "center" | "centre" => Ok(PanelPlacement::Center),
            "right" => Ok(PanelPlacement::Right),
            other => Err(format!("unknown panel placement '{}'", other)),
        }
    }
}

/// What the panel currently shows
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelState<'a> {
    Hidden,
    Visible {
        record: &'a RegionRecord,
        placement: PanelPlacement,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reveal {
    Waiting,
    Scheduled(Instant),
    Done,
}

/// Panel visibility, record and placement
#[derive(Debug, Clone)]
pub struct AnalyticsPanelController {
    visible: bool,
    record: RegionRecord,
    placement: PanelPlacement,
    default_placement: PanelPlacement,
    driving_layer: Option<LayerId>,
    reveal: Reveal,
    reveal_delay: Duration,
}

impl AnalyticsPanelController {
    /// Hidden panel holding `initial` (normally the default aggregate)
    pub fn new(initial: RegionRecord, placement: PanelPlacement, reveal_delay: Duration) -> Self {
        Self {
            visible: false,
            record: initial,
            placement,
            default_placement: placement,
            driving_layer: None,
            reveal: Reveal::Waiting,
            reveal_delay,
        }
    }

    pub fn state(&self) -> PanelState<'_> {
        if self.visible {
            PanelState::Visible {
                record: &self.record,
                placement: self.placement,
            }
        } else {
            PanelState::Hidden
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Record shown when visible; retained while hidden
    pub fn record(&self) -> &RegionRecord {
        &self.record
    }

    pub fn placement(&self) -> PanelPlacement {
        self.placement
    }

    /// Analytics layer whose appearance last showed the panel
    pub fn driving_layer(&self) -> Option<LayerId> {
        self.driving_layer
    }

    /// Schedule the one-shot reveal; later calls do nothing
    pub fn surface_ready(&mut self, now: Instant) {
        if self.reveal == Reveal::Waiting {
            self.reveal = Reveal::Scheduled(now + self.reveal_delay);
        }
    }

    /// Fire the reveal once its deadline has passed
    ///
    /// Returns `true` when the panel was revealed by this call.
    pub fn tick(&mut self, now: Instant, aggregate: &RegionRecord) -> bool {
        match self.reveal {
            Reveal::Scheduled(at) if now >= at => {
                self.reveal = Reveal::Done;
                self.record = aggregate.clone();
                self.placement = self.default_placement;
                self.visible = true;
                debug!(region = %self.record.region_name, "analytics panel revealed");
                true
            }
            _ => false,
        }
    }

    /// Whether a reveal is scheduled and has not fired yet
    pub fn reveal_pending(&self) -> bool {
        matches!(self.reveal, Reveal::Scheduled(_))
    }

    /// React to an analytics layer appearing or disappearing
    ///
    /// A shown layer becomes the driving layer and the panel shows the
    /// aggregate of its epoch. Hiding or removing the driving layer hides
    /// the panel; other layers disappearing leave it alone. Returns `true`
    /// when the panel changed.
    pub fn on_signal(&mut self, signal: &AnalyticsSignal, aggregate: &RegionRecord) -> bool {
        if signal.visible {
            self.driving_layer = Some(signal.layer);
            self.show(aggregate.clone());
            true
        } else if self.driving_layer == Some(signal.layer) {
            self.driving_layer = None;
            self.cancel_reveal();
            self.visible = false;
            true
        } else {
            false
        }
    }

    /// Show the record resolved from a feature click
    pub fn show_record(&mut self, record: &RegionRecord) {
        self.show(record.clone());
    }

    /// Flip visibility; returns the new state
    pub fn toggle(&mut self) -> bool {
        self.cancel_reveal();
        self.visible = !self.visible;
        self.visible
    }

    /// Show the aggregate of the active epoch
    pub fn reset_to_aggregate(&mut self, aggregate: &RegionRecord) {
        self.show(aggregate.clone());
    }

    pub fn set_placement(&mut self, placement: PanelPlacement) {
        self.cancel_reveal();
        self.placement = placement;
    }

    fn show(&mut self, record: RegionRecord) {
        self.cancel_reveal();
        self.record = record;
        self.visible = true;
    }

    fn cancel_reveal(&mut self) {
        if self.reveal_pending() {
            debug!("cancelling scheduled panel reveal");
        }
        self.reveal = Reveal::Done;
    }
}
