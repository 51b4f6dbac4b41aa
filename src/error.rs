//! Error handling for Terralens
//!
//! Layer and dataset failures degrade the viewer instead of halting it, so
//! most variants are recoverable and carry recovery suggestions.

use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::LayerId;
use crate::dataset::Epoch;

/// Result type alias for Terralens operations
pub type Result<T> = std::result::Result<T, TerraError>;

/// Main error type for Terralens operations
#[derive(Error, Debug)]
pub enum TerraError {
    // Layer Errors
    #[error("Layer {layer} is already active")]
    AlreadyActive { layer: LayerId },

    #[error("Layer {layer} is not in the catalog")]
    UnknownLayer { layer: LayerId },

    #[error("Layer {layer} uses unsupported protocol '{protocol}'")]
    UnknownProtocol { layer: LayerId, protocol: String },

    #[error("Failed to create layer {layer}: {reason}")]
    CreationFailed { layer: LayerId, reason: String },

    #[error("Legend unavailable at {url}: {reason}")]
    LegendUnavailable { url: String, reason: String },

    // Configuration Errors
    #[error("Invalid layer catalog: {reason}")]
    InvalidCatalog { reason: String },

    #[error("Invalid dataset: {reason}")]
    InvalidDataset { reason: String },

    #[error("No aggregate record for epoch {epoch}")]
    MissingAggregate { epoch: Epoch },

    // File Errors
    #[error("File not found: {}", path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TerraError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            TerraError::AlreadyActive { .. } => "ALREADY_ACTIVE",
            TerraError::UnknownLayer { .. } => "UNKNOWN_LAYER",
            TerraError::UnknownProtocol { .. } => "UNKNOWN_PROTOCOL",
            TerraError::CreationFailed { .. } => "CREATION_FAILED",
            TerraError::LegendUnavailable { .. } => "LEGEND_UNAVAILABLE",
            TerraError::InvalidCatalog { .. } => "INVALID_CATALOG",
            TerraError::InvalidDataset { .. } => "INVALID_DATASET",
            TerraError::MissingAggregate { .. } => "MISSING_AGGREGATE",
            TerraError::FileNotFound { .. } => "FILE_NOT_FOUND",
            TerraError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the viewer keeps running normally after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TerraError::AlreadyActive { .. }
                | TerraError::UnknownLayer { .. }
                | TerraError::UnknownProtocol { .. }
                | TerraError::CreationFailed { .. }
                | TerraError::LegendUnavailable { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TerraError::AlreadyActive { .. } => vec![
                "The layer is already on the map",
                "Use the visibility toggle to show it again",
            ],
            TerraError::UnknownLayer { .. } => vec![
                "Check the layer id against the catalog listing",
                "Run 'terralens-cli catalog' to see available layers",
            ],
            TerraError::UnknownProtocol { .. } => vec![
                "Supported protocols: WMS (TileService), WFS (FeatureService)",
                "Fix the protocol field of the catalog entry",
            ],
            TerraError::CreationFailed { .. } => vec![
                "Check that the layer endpoint is reachable",
                "Verify the source layer identifier on the server",
            ],
            TerraError::LegendUnavailable { .. } => {
                vec!["The layer is still usable; only its legend is hidden"]
            }
            TerraError::InvalidCatalog { .. } => vec![
                "Layer ids must be unique positive integers",
                "Opacity values must lie between 0 and 1",
            ],
            TerraError::InvalidDataset { .. } | TerraError::MissingAggregate { .. } => vec![
                "Every epoch needs exactly one aggregate record",
                "Class percentages must lie between 0 and 100",
            ],
            TerraError::FileNotFound { .. } => vec![
                "Check the path in the viewer configuration",
                "Remove the path to fall back to the built-in data",
            ],
            _ => vec![],
        }
    }
}
