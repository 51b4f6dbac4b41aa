//! Replay Tests
//!
//! Scripted sessions run end to end through the replay runner.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use terralens::catalog::LayerId;
use terralens::config::ViewerConfig;
use terralens::dataset::Epoch;
use terralens::gateway::RecordingGateway;
use terralens::panel::PanelPlacement;
use terralens::replay::{ReplayRunner, ReplayScript, ReplayStep};
use terralens::viewer::MapViewer;

fn demo_script() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/kangema_session.json")
}

#[test]
fn test_demo_session() {
    let script = ReplayScript::load(&demo_script()).unwrap();
    let mut viewer = MapViewer::with_builtin(RecordingGateway::new()).unwrap();

    let failures = ReplayRunner::new(Instant::now()).run(&mut viewer, &script);
    assert!(failures.is_empty(), "unexpected failures: {:?}", failures);

    let report = viewer.report();
    let ids: Vec<LayerId> = report.active_layers.iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![LayerId(2), LayerId(4)]);
    assert_eq!(report.active_layers[0].opacity, 1.0);

    // The click cancelled the scheduled reveal, so the record is still Kangema
    assert_eq!(report.selection.current_record.region_name, "Kangema");
    assert_eq!(report.selection.current_record.epoch, Epoch(2024));
    assert_eq!(report.selection.panel_placement, PanelPlacement::Right);
    assert!(report.selection.panel_visible);
    assert_eq!(report.label, None);
    assert_eq!(report.legend.map(|legend| legend.layer), Some(LayerId(2)));
}

#[test]
fn test_reveal_without_interaction() {
    let mut viewer = MapViewer::with_builtin(RecordingGateway::new()).unwrap();
    let script = ReplayScript {
        steps: vec![
            ReplayStep::SurfaceReady,
            ReplayStep::Advance { ms: 600 },
            ReplayStep::Advance { ms: 400 },
        ],
    };

    ReplayRunner::new(Instant::now()).run(&mut viewer, &script);

    let selection = viewer.selection();
    assert!(selection.panel_visible);
    assert_eq!(selection.current_record.region_name, "Murang'a County");
    assert_eq!(viewer.activity().last().unwrap().description, "Panel revealed");
}

#[test]
fn test_pending_session_with_removal() {
    let mut viewer = MapViewer::with_builtin(RecordingGateway::deferred()).unwrap();
    let script = ReplayScript {
        steps: vec![
            ReplayStep::Add { layer: LayerId(4) },
            ReplayStep::Add { layer: LayerId(1) },
            ReplayStep::Remove { layer: LayerId(4) },
            ReplayStep::ResolvePending,
        ],
    };

    let failures = ReplayRunner::new(Instant::now()).run(&mut viewer, &script);
    assert!(failures.is_empty());
    assert_eq!(viewer.registry().active_ids(), vec![LayerId(1)]);
    assert_eq!(viewer.gateway().live_layer_count(), 1);
}

#[test]
fn test_failed_pending_creation_does_not_block_others() {
    let mut gateway = RecordingGateway::deferred();
    gateway.fail_layer(LayerId(1));
    let mut viewer = MapViewer::with_builtin(gateway).unwrap();
    let script = ReplayScript {
        steps: vec![
            ReplayStep::Add { layer: LayerId(1) },
            ReplayStep::Add { layer: LayerId(3) },
            ReplayStep::ResolvePending,
        ],
    };

    let failures = ReplayRunner::new(Instant::now()).run(&mut viewer, &script);
    let codes: Vec<&str> = failures.iter().map(|f| f.code.as_str()).collect();
    assert_eq!(codes, vec!["CREATION_FAILED"]);
    assert_eq!(failures[0].step, 2);

    assert_eq!(viewer.registry().active_ids(), vec![LayerId(3)]);
    assert!(viewer.registry().pending_ids().is_empty());
    assert!(viewer.gateway().pending_tickets().is_empty());
    assert_eq!(viewer.gateway().live_layer_count(), 1);
}

#[cfg(not(feature = "legend-probe"))]
#[test]
fn test_legend_check_step_hides_legend() {
    let mut viewer = MapViewer::with_builtin(RecordingGateway::new()).unwrap();
    let script = ReplayScript {
        steps: vec![ReplayStep::Add { layer: LayerId(3) }, ReplayStep::CheckLegend],
    };

    let failures = ReplayRunner::new(Instant::now()).run(&mut viewer, &script);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].code, "LEGEND_UNAVAILABLE");
    assert!(viewer.legend().is_none());
    assert_eq!(viewer.registry().active_ids(), vec![LayerId(3)]);
}

#[test]
fn test_replay_with_configured_dataset_dir() {
    let dir = TempDir::new().unwrap();
    let datasets = dir.path().join("datasets");
    fs::create_dir(&datasets).unwrap();
    fs::write(
        datasets.join("muranga.json"),
        include_str!("../data/lulc_muranga.json"),
    )
    .unwrap();
    let config_path = dir.path().join("viewer.json");
    fs::write(
        &config_path,
        r#"{ "datasets_path": "datasets", "default_placement": "center", "reveal_delay_ms": 0 }"#,
    )
    .unwrap();

    let config = ViewerConfig::load(&config_path).unwrap();
    let mut viewer = MapViewer::from_config(config, RecordingGateway::new()).unwrap();
    let script = ReplayScript {
        steps: vec![ReplayStep::SurfaceReady, ReplayStep::Advance { ms: 0 }],
    };
    ReplayRunner::new(Instant::now()).run(&mut viewer, &script);

    assert_eq!(viewer.selection().panel_placement, PanelPlacement::Center);
    assert!(viewer.selection().panel_visible);
    assert!(viewer.index().sources()[0].path.is_some());
}
