//! Terralens - layer orchestration for map-centric analytics viewers
//!
//! Terralens keeps the state behind a land-cover map viewer: which catalog
//! layers are on the map, how they look, which region the analytics panel
//! describes and when the panel is shown. Rendering is delegated to a
//! [`gateway::RenderGateway`] implementation so the core runs without a
//! drawing surface.
//!
//! # Architecture
//!
//! - `catalog`: static layer descriptors
//! - `dataset`: region records keyed by name and epoch
//! - `registry`: active layers and the surface resources they own
//! - `resolver`: clicked region to record, with aggregate fallback
//! - `panel`: analytics panel state machine
//! - `viewer`: the event-driven façade over all of the above

pub mod activity;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod gateway;
pub mod legend;
pub mod panel;
pub mod registry;
pub mod replay;
pub mod resolver;
pub mod viewer;

pub use error::{Result, TerraError};
