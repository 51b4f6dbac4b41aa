//! Integration Tests
//!
//! End-to-end tests for the Terralens viewer core against the bundled
//! catalog and dataset, driven through the recording gateway.

use approx::assert_relative_eq;
use pretty_assertions::assert_eq;

use terralens::catalog::LayerId;
use terralens::dataset::Epoch;
use terralens::gateway::{FeatureHit, InteractionKind, MapCoordinate, RecordingGateway};
use terralens::panel::{PanelPlacement, PanelState};
use terralens::registry::Activation;
use terralens::resolver::ResolutionOutcome;
use terralens::viewer::MapViewer;
use terralens::TerraError;

const LULC_2022: LayerId = LayerId(1);
const LULC_2024: LayerId = LayerId(2);
const CROP_TYPE: LayerId = LayerId(3);
const SUB_COUNTIES: LayerId = LayerId(4);
const NDVI: LayerId = LayerId(6);

fn viewer() -> MapViewer<RecordingGateway> {
    MapViewer::with_builtin(RecordingGateway::new()).unwrap()
}

fn region(name: &str) -> FeatureHit {
    FeatureHit::new().with_attribute("ADM2_EN", name)
}

fn click(viewer: &mut MapViewer<RecordingGateway>, hit: Option<&FeatureHit>) -> Option<ResolutionOutcome> {
    let handler = viewer.gateway().handlers(InteractionKind::Click)[0];
    viewer.handle_click(handler, hit)
}

/// Click handlers registered on the surface must match interactive active layers
fn assert_handler_pairing(viewer: &MapViewer<RecordingGateway>) {
    let interactive = viewer
        .registry()
        .active_layers()
        .iter()
        .filter(|layer| layer.descriptor().registers_handlers())
        .count();
    assert_eq!(viewer.gateway().handler_count(InteractionKind::Click), interactive);
    assert_eq!(viewer.gateway().handler_count(InteractionKind::PointerMove), interactive);
}

// === Layer Registry ===

#[test]
fn test_add_layer_is_idempotent() {
    let mut viewer = viewer();

    assert_eq!(viewer.add_layer(LULC_2024).unwrap(), Activation::Active(LULC_2024));
    let err = viewer.add_layer(LULC_2024).unwrap_err();

    assert!(matches!(err, TerraError::AlreadyActive { layer } if layer == LULC_2024));
    assert!(err.is_recoverable());
    assert_eq!(viewer.registry().active_ids(), vec![LULC_2024]);
    assert_eq!(viewer.gateway().live_layer_count(), 1);
}

#[test]
fn test_remove_layer_is_idempotent() {
    let mut viewer = viewer();
    viewer.add_layer(CROP_TYPE).unwrap();

    assert!(viewer.remove_layer(CROP_TYPE));
    assert!(!viewer.remove_layer(CROP_TYPE));
    assert!(viewer.registry().is_empty());
    assert_eq!(viewer.selection().selected_layer_id, None);
}

#[test]
fn test_handler_pairing_over_add_remove_sequence() {
    let mut viewer = viewer();
    let sequence: [(bool, LayerId); 9] = [
        (true, SUB_COUNTIES),
        (true, LULC_2022),
        (true, SUB_COUNTIES),
        (false, LULC_2022),
        (false, SUB_COUNTIES),
        (false, SUB_COUNTIES),
        (true, SUB_COUNTIES),
        (true, LULC_2024),
        (false, SUB_COUNTIES),
    ];

    for (add, id) in sequence {
        if add {
            let _ = viewer.add_layer(id);
        } else {
            viewer.remove_layer(id);
        }
        assert_handler_pairing(&viewer);
    }
}

#[test]
fn test_opacity_clamp() {
    let mut viewer = viewer();
    viewer.add_layer(NDVI).unwrap();

    viewer.set_opacity(NDVI, 1.7);
    assert_relative_eq!(viewer.registry().get(NDVI).unwrap().opacity(), 1.0);

    viewer.set_opacity(NDVI, -0.2);
    assert_relative_eq!(viewer.registry().get(NDVI).unwrap().opacity(), 0.0);

    let handle = viewer.registry().get(NDVI).unwrap().render_handle();
    assert_relative_eq!(viewer.gateway().layer(handle).unwrap().opacity, 0.0);
}

#[test]
fn test_style_opacity_applies_on_activation() {
    let mut viewer = viewer();
    viewer.add_layer(SUB_COUNTIES).unwrap();

    assert_relative_eq!(viewer.registry().get(SUB_COUNTIES).unwrap().opacity(), 0.7);
}

#[test]
fn test_failed_creation_leaves_no_state() {
    let mut viewer = viewer();
    viewer.gateway_mut().fail_layer(SUB_COUNTIES);

    let err = viewer.add_layer(SUB_COUNTIES).unwrap_err();
    assert_eq!(err.error_code(), "CREATION_FAILED");
    assert!(viewer.registry().is_empty());
    assert_handler_pairing(&viewer);
    assert!(viewer
        .available_layers()
        .iter()
        .any(|descriptor| descriptor.id == SUB_COUNTIES));
}

#[test]
fn test_removal_during_pending_creation() {
    let mut viewer = MapViewer::with_builtin(RecordingGateway::deferred()).unwrap();

    let Activation::Pending(ticket) = viewer.add_layer(SUB_COUNTIES).unwrap() else {
        panic!("expected a pending activation");
    };
    assert!(viewer.available_layers().iter().all(|d| d.id != SUB_COUNTIES));
    assert!(viewer.remove_layer(SUB_COUNTIES));

    let result = viewer.gateway_mut().resolve_pending(ticket);
    assert_eq!(viewer.complete_creation(ticket, result).unwrap(), None);

    assert!(!viewer.registry().is_active(SUB_COUNTIES));
    assert!(viewer.gateway().attached_handles().is_empty());
    assert_eq!(viewer.gateway().live_layer_count(), 0);
    assert_handler_pairing(&viewer);
}

#[test]
fn test_pending_creation_failure_leaves_no_state() {
    let mut viewer = MapViewer::with_builtin(RecordingGateway::deferred()).unwrap();
    viewer.gateway_mut().fail_layer(LULC_2022);

    let Activation::Pending(ticket) = viewer.add_layer(LULC_2022).unwrap() else {
        panic!("expected a pending activation");
    };
    let result = viewer.gateway_mut().resolve_pending(ticket);
    assert!(viewer.complete_creation(ticket, result).is_err());

    assert!(viewer.registry().is_empty());
    assert!(!viewer.selection().panel_visible);
}

// === Resolver ===

#[test]
fn test_resolver_fallback_to_epoch_aggregate() {
    let viewer = viewer();

    for raw in ["", "Unmapped Region"] {
        let resolution = viewer.resolve(Some(LULC_2024), Some(raw));
        assert_eq!(resolution.outcome, ResolutionOutcome::RegionNotFound);
        assert!(resolution.record.is_aggregate());
        assert_eq!(resolution.record.epoch, Epoch(2024));
    }
}

#[test]
fn test_resolver_is_deterministic() {
    let viewer = viewer();

    let first = viewer.resolve(Some(LULC_2022), Some("Kangema")).record.clone();
    viewer.resolve(Some(LULC_2024), Some("Kangema"));
    viewer.resolve(Some(LULC_2022), Some("Kiharu"));
    let again = viewer.resolve(Some(LULC_2022), Some("Kangema")).record.clone();

    assert_eq!(first, again);
}

// === Analytics Panel ===

#[test]
fn test_adding_analytics_layer_shows_panel() {
    let mut viewer = viewer();
    assert_eq!(viewer.panel_state(), PanelState::Hidden);

    viewer.add_layer(LULC_2024).unwrap();

    match viewer.panel_state() {
        PanelState::Visible { record, placement } => {
            assert!(record.is_aggregate());
            assert_eq!(record.epoch, Epoch(2024));
            assert_eq!(placement, PanelPlacement::Left);
        }
        PanelState::Hidden => panic!("panel should be visible"),
    }
}

#[test]
fn test_kangema_click_uses_selected_epoch() {
    let mut viewer = viewer();
    viewer.add_layer(LULC_2024).unwrap();
    viewer.add_layer(SUB_COUNTIES).unwrap();
    assert!(viewer.select_layer(LULC_2024));

    let outcome = click(&mut viewer, Some(&region("Kangema")));
    assert_eq!(outcome, Some(ResolutionOutcome::Matched));

    let record = viewer.selection().current_record;
    assert_eq!(record.region_name, "Kangema");
    assert_eq!(record.epoch, Epoch(2024));
    assert_relative_eq!(record.percentage_of("Trees"), 69.9);
    assert_relative_eq!(record.percentage_of("Crop"), 21.72);
}

#[test]
fn test_click_after_hiding_panel_reshows_it() {
    let mut viewer = viewer();
    viewer.add_layer(LULC_2022).unwrap();
    viewer.add_layer(SUB_COUNTIES).unwrap();
    viewer.select_layer(LULC_2022);
    assert!(!viewer.toggle_panel());

    click(&mut viewer, Some(&region("  MATHIOYA ")));

    let selection = viewer.selection();
    assert!(selection.panel_visible);
    assert_eq!(selection.current_record.region_name, "Mathioya");
    assert_eq!(selection.current_record.epoch, Epoch(2022));
}

#[test]
fn test_click_with_plain_layer_selected_uses_default_epoch() {
    let mut viewer = viewer();
    viewer.add_layer(LULC_2024).unwrap();
    viewer.add_layer(SUB_COUNTIES).unwrap();

    // The boundaries layer itself is selected after being added
    let outcome = click(&mut viewer, Some(&region("Kangema")));
    assert_eq!(outcome, Some(ResolutionOutcome::Matched));
    assert_eq!(viewer.selection().current_record.epoch, viewer.index().default_epoch());
}

#[test]
fn test_click_on_unnamed_feature_shows_aggregate() {
    let mut viewer = viewer();
    viewer.add_layer(LULC_2024).unwrap();
    viewer.add_layer(SUB_COUNTIES).unwrap();
    viewer.select_layer(LULC_2024);

    let outcome = click(&mut viewer, Some(&FeatureHit::new()));
    assert_eq!(outcome, Some(ResolutionOutcome::RegionNotFound));
    assert!(viewer.selection().current_record.is_aggregate());
}

#[test]
fn test_hiding_driving_layer_hides_panel() {
    let mut viewer = viewer();
    viewer.add_layer(LULC_2022).unwrap();
    viewer.add_layer(LULC_2024).unwrap();

    // Layer 2 drives the panel now; hiding layer 1 changes nothing
    viewer.set_visible(LULC_2022, false);
    assert!(viewer.selection().panel_visible);

    viewer.set_visible(LULC_2024, false);
    assert!(!viewer.selection().panel_visible);

    viewer.toggle_visibility(LULC_2022);
    let selection = viewer.selection();
    assert!(selection.panel_visible);
    assert_eq!(selection.current_record.epoch, Epoch(2022));
}

#[test]
fn test_reset_to_aggregate_from_hidden() {
    let mut viewer = viewer();
    viewer.add_layer(LULC_2024).unwrap();
    viewer.add_layer(SUB_COUNTIES).unwrap();
    viewer.select_layer(LULC_2024);
    click(&mut viewer, Some(&region("Gatanga")));
    viewer.toggle_panel();

    viewer.reset_to_aggregate();

    let selection = viewer.selection();
    assert!(selection.panel_visible);
    assert!(selection.current_record.is_aggregate());
    assert_eq!(selection.current_record.epoch, Epoch(2024));
}

#[test]
fn test_placement_is_kept_across_records() {
    let mut viewer = viewer();
    viewer.set_placement(PanelPlacement::Right);
    viewer.add_layer(LULC_2022).unwrap();

    match viewer.panel_state() {
        PanelState::Visible { placement, .. } => assert_eq!(placement, PanelPlacement::Right),
        PanelState::Hidden => panic!("panel should be visible"),
    }
}

// === Hover and legend ===

#[test]
fn test_hover_label_follows_pointer() {
    let mut viewer = viewer();
    viewer.add_layer(SUB_COUNTIES).unwrap();
    let handler = viewer.gateway().handlers(InteractionKind::PointerMove)[0];

    viewer.handle_pointer_move(handler, MapCoordinate::new(1.0, 2.0), Some(&region("Kandara")));
    assert_eq!(viewer.hover_label(), Some("Kandara"));

    viewer.handle_pointer_move(handler, MapCoordinate::new(3.0, 4.0), None);
    assert_eq!(viewer.hover_label(), None);
}

#[test]
fn test_legend_failure_leaves_layers_and_panel_alone() {
    let mut viewer = viewer();
    viewer.add_layer(LULC_2024).unwrap();
    let before = viewer.selection();
    assert!(viewer.legend().is_some());

    viewer.legend_failed(LULC_2024);

    assert!(viewer.legend().is_none());
    assert_eq!(viewer.selection(), before);
    assert!(viewer.registry().get(LULC_2024).unwrap().is_visible());
}
