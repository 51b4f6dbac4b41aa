//! Dataset Index
//!
//! Keyed, versioned collection of region records. Built once at startup from
//! a JSON document (or a directory of them) and read-only afterwards.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::record::{normalize_region_name, Epoch, LevelKind, RegionRecord};
use crate::error::{Result, TerraError};

const BUILTIN_DATASET: &str = include_str!("../../data/lulc_muranga.json");

/// On-disk dataset document
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DatasetFile {
    #[serde(default)]
    default_epoch: Option<Epoch>,
    records: Vec<RegionRecord>,
}

/// Provenance of one loaded document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSource {
    /// `None` for the bundled dataset
    pub path: Option<PathBuf>,
    /// SHA-256 of the document contents
    pub sha256: String,
    pub record_count: usize,
}

/// Region records keyed by (normalized name, epoch) plus one aggregate per epoch
#[derive(Debug, Clone)]
pub struct DatasetIndex {
    default_epoch: Epoch,
    subdivisions: HashMap<(String, Epoch), RegionRecord>,
    aggregates: BTreeMap<Epoch, RegionRecord>,
    sources: Vec<DatasetSource>,
}

impl DatasetIndex {
    /// Build an index from records
    ///
    /// `default_epoch` falls back to the earliest epoch present.
    ///
    /// # Errors
    /// `InvalidDataset` for invalid records, duplicate keys, a second
    /// aggregate for an epoch or an empty record set; `MissingAggregate` when
    /// an epoch (or the default epoch) has no aggregate record.
    pub fn from_records(records: Vec<RegionRecord>, default_epoch: Option<Epoch>) -> Result<Self> {
        if records.is_empty() {
            return Err(TerraError::InvalidDataset {
                reason: "dataset contains no records".to_string(),
            });
        }

        let mut subdivisions = HashMap::new();
        let mut aggregates = BTreeMap::new();

        for record in records {
            record.validate()?;
            let epoch = record.epoch;

            match record.level {
                LevelKind::Aggregate => {
                    if aggregates.contains_key(&epoch) {
                        return Err(TerraError::InvalidDataset {
                            reason: format!("more than one aggregate record for epoch {}", epoch),
                        });
                    }
                    aggregates.insert(epoch, record);
                }
                LevelKind::Subdivision => {
                    let key = (record.normalized_name(), epoch);
                    if subdivisions.contains_key(&key) {
                        return Err(TerraError::InvalidDataset {
                            reason: format!("duplicate record for '{}' in epoch {}", record.region_name, epoch),
                        });
                    }
                    subdivisions.insert(key, record);
                }
            }
        }

        for (_, epoch) in subdivisions.keys() {
            if !aggregates.contains_key(epoch) {
                return Err(TerraError::MissingAggregate { epoch: *epoch });
            }
        }

        let default_epoch = match default_epoch {
            Some(epoch) => epoch,
            None => match aggregates.keys().next() {
                Some(epoch) => *epoch,
                None => {
                    return Err(TerraError::InvalidDataset {
                        reason: "dataset contains no aggregate records".to_string(),
                    })
                }
            },
        };
        if !aggregates.contains_key(&default_epoch) {
            return Err(TerraError::MissingAggregate { epoch: default_epoch });
        }

        Ok(Self {
            default_epoch,
            subdivisions,
            aggregates,
            sources: Vec::new(),
        })
    }

    /// Parse a single dataset document
    pub fn from_json(json: &str) -> Result<Self> {
        let file: DatasetFile = serde_json::from_str(json)?;
        let record_count = file.records.len();
        let mut index = Self::from_records(file.records, file.default_epoch)?;
        index.sources.push(DatasetSource {
            path: None,
            sha256: checksum(json),
            record_count,
        });
        Ok(index)
    }

    /// The dataset bundled with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_DATASET)
    }

    /// Load a dataset file, or every `*.json` file directly inside a directory
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TerraError::FileNotFound {
                path: path.to_path_buf(),
                source: None,
            });
        }

        let files = if path.is_dir() {
            list_dataset_files(path)
        } else {
            vec![path.to_path_buf()]
        };
        if files.is_empty() {
            return Err(TerraError::InvalidDataset {
                reason: format!("no dataset files in {}", path.display()),
            });
        }

        let mut records = Vec::new();
        let mut default_epoch = None;
        let mut sources = Vec::with_capacity(files.len());

        for file_path in files {
            let json = fs::read_to_string(&file_path).map_err(|e| TerraError::FileNotFound {
                path: file_path.clone(),
                source: Some(e),
            })?;
            let file: DatasetFile = serde_json::from_str(&json)?;
            debug!(path = %file_path.display(), records = file.records.len(), "read dataset file");

            if default_epoch.is_none() {
                default_epoch = file.default_epoch;
            }
            sources.push(DatasetSource {
                path: Some(file_path),
                sha256: checksum(&json),
                record_count: file.records.len(),
            });
            records.extend(file.records);
        }

        let mut index = Self::from_records(records, default_epoch)?;
        index.sources = sources;
        info!(
            path = %path.display(),
            records = index.len(),
            epochs = index.aggregates.len(),
            "loaded dataset index"
        );
        Ok(index)
    }

    /// Record for a region name at an epoch; the name is normalized first
    pub fn lookup(&self, region_name: &str, epoch: Epoch) -> Option<&RegionRecord> {
        self.subdivisions.get(&(normalize_region_name(region_name), epoch))
    }

    /// Whole-area record of an epoch
    pub fn aggregate(&self, epoch: Epoch) -> Option<&RegionRecord> {
        self.aggregates.get(&epoch)
    }

    pub fn default_epoch(&self) -> Epoch {
        self.default_epoch
    }

    /// Aggregate of the default epoch, guaranteed present by construction
    pub fn default_aggregate(&self) -> &RegionRecord {
        &self.aggregates[&self.default_epoch]
    }

    /// Epochs with an aggregate record, ascending
    pub fn epochs(&self) -> Vec<Epoch> {
        self.aggregates.keys().copied().collect()
    }

    pub fn has_epoch(&self, epoch: Epoch) -> bool {
        self.aggregates.contains_key(&epoch)
    }

    /// Subdivision names of an epoch, sorted
    pub fn regions(&self, epoch: Epoch) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .subdivisions
            .values()
            .filter(|r| r.epoch == epoch)
            .map(|r| r.region_name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Fail unless every given epoch has an aggregate record
    pub fn ensure_epochs(&self, epochs: &[Epoch]) -> Result<()> {
        match epochs.iter().find(|e| !self.has_epoch(**e)) {
            Some(missing) => Err(TerraError::MissingAggregate { epoch: *missing }),
            None => Ok(()),
        }
    }

    pub fn sources(&self) -> &[DatasetSource] {
        &self.sources
    }

    /// Total number of records, aggregates included
    pub fn len(&self) -> usize {
        self.subdivisions.len() + self.aggregates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn list_dataset_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".json"))
        .map(|entry| entry.path().to_path_buf())
        .collect();
    files.sort();
    files
}

fn checksum(contents: &str) -> String {
    format!("{:x}", Sha256::digest(contents.as_bytes()))
}
