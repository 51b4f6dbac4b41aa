//! CLI Module
//!
//! Command-line interface for inspecting the layer catalog and dataset and
//! for replaying scripted viewer sessions.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Terralens - layer orchestration and land-cover analytics for map viewers
#[derive(Parser, Debug)]
#[command(name = "terralens")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Viewer configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List catalog layers
    #[command(name = "catalog")]
    Catalog,

    /// List dataset epochs, regions and sources
    #[command(name = "datasets")]
    Datasets,

    /// Resolve a region against a layer's epoch
    #[command(name = "resolve")]
    Resolve {
        /// Selected layer id
        #[arg(short, long)]
        layer: Option<u32>,

        /// Region name as found in the feature attribute
        #[arg(short, long)]
        region: Option<String>,
    },

    /// Check that a layer's legend image can be fetched
    #[command(name = "legend")]
    Legend {
        /// Layer id
        layer: u32,
    },

    /// Run a scripted session and print the final state
    #[command(name = "replay")]
    Replay {
        /// Script file
        script: PathBuf,
    },
}
