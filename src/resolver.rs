//! Feature Data Resolver
//!
//! Maps a clicked region name plus the selected layer onto the region
//! record to display. Resolution never fails: a missing, empty or unknown
//! name resolves to the aggregate record of the active epoch.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{LayerCatalog, LayerId};
use crate::dataset::{DatasetIndex, Epoch, RegionRecord};

/// How a resolution was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// A subdivision record matched the name
    Matched,
    /// No usable name or no record for it; the aggregate was used
    RegionNotFound,
}

/// The record chosen for a click, with how it was chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution<'a> {
    pub record: &'a RegionRecord,
    pub epoch: Epoch,
    pub outcome: ResolutionOutcome,
}

/// Read-only view over the catalog and dataset index
#[derive(Debug, Clone, Copy)]
pub struct FeatureDataResolver<'a> {
    catalog: &'a LayerCatalog,
    index: &'a DatasetIndex,
}

impl<'a> FeatureDataResolver<'a> {
    pub fn new(catalog: &'a LayerCatalog, index: &'a DatasetIndex) -> Self {
        Self { catalog, index }
    }

    /// Epoch of the selected layer, or the dataset default when the
    /// selection is absent or not analytics-bearing
    pub fn epoch_for(&self, selected: Option<LayerId>) -> Epoch {
        selected
            .and_then(|id| self.catalog.epoch_for(id))
            .filter(|epoch| self.index.has_epoch(*epoch))
            .unwrap_or_else(|| self.index.default_epoch())
    }

    /// Aggregate record of an epoch, falling back to the default aggregate
    pub fn aggregate(&self, epoch: Epoch) -> &'a RegionRecord {
        self.index
            .aggregate(epoch)
            .unwrap_or_else(|| self.index.default_aggregate())
    }

    /// Record to display for a click on `raw_name`
    pub fn resolve(&self, selected: Option<LayerId>, raw_name: Option<&str>) -> &'a RegionRecord {
        self.resolve_detailed(selected, raw_name).record
    }

    pub fn resolve_detailed(&self, selected: Option<LayerId>, raw_name: Option<&str>) -> Resolution<'a> {
        let epoch = self.epoch_for(selected);
        let name = raw_name.map(str::trim).filter(|name| !name.is_empty());

        match name.and_then(|name| self.index.lookup(name, epoch)) {
            Some(record) => Resolution {
                record,
                epoch,
                outcome: ResolutionOutcome::Matched,
            },
            None => {
                debug!(region = ?raw_name, epoch = %epoch, "region not found, using aggregate");
                Resolution {
                    record: self.aggregate(epoch),
                    epoch,
                    outcome: ResolutionOutcome::RegionNotFound,
                }
            }
        }
    }
}
