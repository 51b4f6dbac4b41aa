//! Region records
//!
//! A region record is the unit the analytics panel displays: the land-cover
//! class breakdown of one region for one survey epoch.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TerraError};

/// Dataset version tag, e.g. a survey year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(pub u16);

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Granularity of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelKind {
    /// Whole managed area
    Aggregate,
    /// One administrative subdivision
    Subdivision,
}

/// Area and share of one land-cover class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassShare {
    #[serde(rename = "class")]
    pub name: String,
    pub area_ha: f64,
    /// Share of the region in percent; source data is lossy, so shares of a
    /// record need not sum to 100
    pub percentage: f64,
}

impl ClassShare {
    pub fn new(name: &str, area_ha: f64, percentage: f64) -> Self {
        Self {
            name: name.to_string(),
            area_ha,
            percentage,
        }
    }
}

/// Land-cover breakdown of one region at one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub region_name: String,
    pub level: LevelKind,
    pub epoch: Epoch,
    /// Classes in source order
    pub classes: Vec<ClassShare>,
}

impl RegionRecord {
    pub fn new(region_name: &str, level: LevelKind, epoch: Epoch, classes: Vec<ClassShare>) -> Self {
        Self {
            region_name: region_name.to_string(),
            level,
            epoch,
            classes,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        self.level == LevelKind::Aggregate
    }

    /// Lookup key used by the dataset index
    pub fn normalized_name(&self) -> String {
        normalize_region_name(&self.region_name)
    }

    pub fn class(&self, name: &str) -> Option<&ClassShare> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// Percentage of a class, 0 when the record does not list it
    pub fn percentage_of(&self, name: &str) -> f64 {
        self.class(name).map(|c| c.percentage).unwrap_or(0.0)
    }

    pub fn total_area_ha(&self) -> f64 {
        self.classes.iter().map(|c| c.area_ha).sum()
    }

    /// Check the load-time contract for a single record
    ///
    /// # Errors
    /// `InvalidDataset` when the class list is empty, a class name is blank,
    /// a percentage is outside [0, 100] or an area is negative.
    pub fn validate(&self) -> Result<()> {
        let label = format!("{} ({})", self.region_name, self.epoch);

        if self.region_name.trim().is_empty() {
            return Err(TerraError::InvalidDataset {
                reason: format!("record for epoch {} has an empty region name", self.epoch),
            });
        }
        if self.classes.is_empty() {
            return Err(TerraError::InvalidDataset {
                reason: format!("{} has no classes", label),
            });
        }
        for class in &self.classes {
            if class.name.trim().is_empty() {
                return Err(TerraError::InvalidDataset {
                    reason: format!("{} has an unnamed class", label),
                });
            }
            if !(0.0..=100.0).contains(&class.percentage) {
                return Err(TerraError::InvalidDataset {
                    reason: format!("{}: '{}' is {}%", label, class.name, class.percentage),
                });
            }
            if !(class.area_ha >= 0.0) {
                return Err(TerraError::InvalidDataset {
                    reason: format!("{}: '{}' has area {}", label, class.name, class.area_ha),
                });
            }
        }
        Ok(())
    }
}

/// Normalize a region name for lookup: trimmed and lower-cased
pub fn normalize_region_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}
