//! CLI Command Implementations

use std::path::Path;
use std::time::Instant;

use tracing::info;

use crate::catalog::LayerId;
use crate::config::ViewerConfig;
use crate::dataset::{class_color, summarize};
use crate::error::Result;
use crate::gateway::RecordingGateway;
use crate::replay::{ReplayRunner, ReplayScript};
use crate::resolver::FeatureDataResolver;
use crate::viewer::MapViewer;

/// Load the configuration file, or defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<ViewerConfig> {
    match path {
        Some(path) => ViewerConfig::load(path),
        None => Ok(ViewerConfig::default()),
    }
}

/// Print the layer catalog.
pub fn list_catalog(config: &ViewerConfig) -> Result<()> {
    let catalog = config.load_catalog()?;
    info!("Listing {} catalog layers", catalog.len());

    println!("{:>4}  {:<8} {:<8} Name", "ID", "Protocol", "Epoch");
    println!("{:-<60}", "");
    for descriptor in catalog.iter() {
        let epoch = descriptor
            .epoch()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "-".to_string());
        let marker = if descriptor.registers_handlers() { " *" } else { "" };
        println!(
            "{:>4}  {:<8} {:<8} {}{}",
            descriptor.id.to_string(),
            descriptor.protocol_kind.as_str(),
            epoch,
            descriptor.name,
            marker
        );
    }
    println!();
    println!("* interactive");

    Ok(())
}

/// Print dataset epochs, regions and source checksums.
pub fn list_datasets(config: &ViewerConfig) -> Result<()> {
    let index = config.load_index()?;
    info!("Listing {} dataset records", index.len());

    for epoch in index.epochs() {
        let marker = if epoch == index.default_epoch() { " (default)" } else { "" };
        println!("Epoch {}{}", epoch, marker);
        for region in index.regions(epoch) {
            println!("  - {}", region);
        }
    }

    println!();
    println!("Sources:");
    for source in index.sources() {
        let path = source
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<builtin>".to_string());
        println!("  {} ({} records) sha256:{}", path, source.record_count, source.sha256);
    }

    Ok(())
}

/// Resolve a region and print the record with its summary.
pub fn resolve(config: &ViewerConfig, layer: Option<u32>, region: Option<&str>) -> Result<()> {
    let catalog = config.load_catalog()?;
    let index = config.load_index()?;
    let resolver = FeatureDataResolver::new(&catalog, &index);

    let resolution = resolver.resolve_detailed(layer.map(LayerId), region);
    let record = resolution.record;
    let summary = summarize(record);

    println!("{} ({}) [{:?}]", record.region_name, resolution.epoch, resolution.outcome);
    println!("Total area: {:.2} ha", summary.total_area_ha);
    println!("{:-<60}", "");
    for class in &record.classes {
        println!(
            "  {:<16} {:>10.2} ha {:>6.2}%  {}",
            class.name,
            class.area_ha,
            class.percentage,
            class_color(&class.name)
        );
    }
    println!();
    for insight in &summary.insights {
        println!("  • {}", insight);
    }

    Ok(())
}

/// Probe the legend image of a layer.
pub fn legend(config: ViewerConfig, layer: u32) -> Result<()> {
    let mut viewer = MapViewer::from_config(config, RecordingGateway::new())?;
    viewer.add_layer(LayerId(layer))?;

    let Some(view) = viewer.legend() else {
        println!("Layer {} has no legend", layer);
        return Ok(());
    };
    match viewer.check_legend() {
        Ok(()) => println!("{}: legend ok ({})", view.layer_name, view.url),
        Err(e) => println!("{}: legend hidden, {}", view.layer_name, e),
    }
    Ok(())
}

/// Replay a scripted session and print the final state as JSON.
pub fn replay(config: ViewerConfig, script_path: &Path) -> Result<()> {
    info!("Replaying session: {}", script_path.display());

    let script = ReplayScript::load(script_path)?;
    let mut viewer = MapViewer::from_config(config, RecordingGateway::new())?;
    let failures = ReplayRunner::new(Instant::now()).run(&mut viewer, &script);

    for failure in &failures {
        eprintln!("step {}: [{}] {}", failure.step, failure.code, failure.message);
    }
    println!("{}", serde_json::to_string_pretty(&viewer.report())?);

    Ok(())
}
