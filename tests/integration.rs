use std::path::PathBuf;
use std::time::Duration;

use approx::assert_relative_eq;

use tactile_plate::config::{FunctionSpec, LayoutConfig, MarkerShape, PreviewConfig};
use tactile_plate::export::{
    ExportError, ExportRequest, FileSource, RetryPolicy, ThreadSleeper, load_with_retry,
};
use tactile_plate::preview::PreviewBuilder;
use tactile_plate::scene::{FragmentKind, Stage};
use tactile_plate::session::{STATUS_ARTIFACT_READY, Session};

fn fixed_layout(x: [f64; 2], y: [f64; 2]) -> LayoutConfig {
    LayoutConfig {
        auto_limits: false,
        x_limits: Some(x),
        y_limits: Some(y),
        ..LayoutConfig::default()
    }
}

const CUBE_STL: &str = "solid cube
facet normal 0 0 -1
 outer loop
  vertex 0 0 0
  vertex 10 10 0
  vertex 10 0 0
 endloop
endfacet
facet normal 0 0 -1
 outer loop
  vertex 0 0 0
  vertex 0 10 0
  vertex 10 10 0
 endloop
endfacet
facet normal 0 0 1
 outer loop
  vertex 0 0 10
  vertex 10 0 10
  vertex 10 10 10
 endloop
endfacet
facet normal 0 0 1
 outer loop
  vertex 0 0 10
  vertex 10 10 10
  vertex 0 10 10
 endloop
endfacet
facet normal 0 -1 0
 outer loop
  vertex 0 0 0
  vertex 10 0 0
  vertex 10 0 10
 endloop
endfacet
facet normal 0 -1 0
 outer loop
  vertex 0 0 0
  vertex 10 0 10
  vertex 0 0 10
 endloop
endfacet
facet normal 1 0 0
 outer loop
  vertex 10 0 0
  vertex 10 10 0
  vertex 10 10 10
 endloop
endfacet
facet normal 1 0 0
 outer loop
  vertex 10 0 0
  vertex 10 10 10
  vertex 10 0 10
 endloop
endfacet
facet normal 0 1 0
 outer loop
  vertex 10 10 0
  vertex 0 10 0
  vertex 0 10 10
 endloop
endfacet
facet normal 0 1 0
 outer loop
  vertex 10 10 0
  vertex 0 10 10
  vertex 10 10 10
 endloop
endfacet
facet normal -1 0 0
 outer loop
  vertex 0 10 0
  vertex 0 0 0
  vertex 0 0 10
 endloop
endfacet
facet normal -1 0 0
 outer loop
  vertex 0 10 0
  vertex 0 0 10
  vertex 0 10 10
 endloop
endfacet
endsolid cube
";

fn temp_stl(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("tactile-plate-{}-{name}.stl", std::process::id()));
    std::fs::write(&path, CUBE_STL).expect("write temp stl");
    path
}

#[test]
fn linear_function_places_markers_on_the_plate() {
    let functions = [FunctionSpec::new("x", MarkerShape::Circle, 3.0, 5)];
    let layout = fixed_layout([-5.5, 5.5], [-5.5, 5.5]);
    let snapshot = PreviewBuilder::new().build(&functions, &layout);

    assert_eq!(snapshot.count(FragmentKind::Plate), 1);
    assert_eq!(snapshot.count(FragmentKind::Marker), 5);
    assert_eq!(snapshot.stats.sampled, 5);
    assert_eq!(snapshot.stats.non_finite, 0);

    let half_w = layout.plate_width_mm / 2.0;
    let half_h = layout.plate_height_mm / 2.0;
    let markers: Vec<_> = snapshot
        .fragments()
        .iter()
        .filter(|f| f.kind == FragmentKind::Marker)
        .collect();
    for marker in &markers {
        assert!(marker.offset.x.abs() <= half_w + 1e-9, "x {}", marker.offset.x);
        assert!(marker.offset.y.abs() <= half_h + 1e-9, "y {}", marker.offset.y);
        assert_relative_eq!(marker.offset.z, layout.plate_thickness_mm);
    }

    // y = x on a square domain runs corner to corner.
    assert_relative_eq!(markers[0].offset.x, -half_w);
    assert_relative_eq!(markers[0].offset.y, -half_h);
    assert_relative_eq!(markers[4].offset.x, half_w);
    assert_relative_eq!(markers[4].offset.y, half_h);
    assert_relative_eq!(markers[2].offset.x, 0.0, epsilon = 1e-9);
}

#[test]
fn linear_function_with_automatic_limits() {
    let functions = [FunctionSpec::new("x", MarkerShape::Circle, 3.0, 5)];
    let layout = LayoutConfig::default();
    assert!(layout.auto_limits);
    let snapshot = PreviewBuilder::new().build(&functions, &layout);

    assert_eq!(snapshot.count(FragmentKind::Plate), 1);
    assert_eq!(snapshot.count(FragmentKind::Marker), 5);
    let markers: Vec<_> = snapshot
        .fragments()
        .iter()
        .filter(|f| f.kind == FragmentKind::Marker)
        .collect();
    for marker in &markers {
        assert!(marker.offset.x.is_finite() && marker.offset.y.is_finite());
        assert!(marker.offset.x.abs() <= layout.plate_width_mm / 2.0 + 1e-9);
        assert_relative_eq!(marker.offset.z, layout.plate_thickness_mm);
    }
    // The x-range spans the plate width; the middle sample sits at the origin.
    assert_relative_eq!(markers[0].offset.x, -layout.plate_width_mm / 2.0);
    assert_relative_eq!(markers[2].offset.x, 0.0, epsilon = 1e-9);
    assert_relative_eq!(markers[2].offset.y, 0.0, epsilon = 1e-9);
}

#[test]
fn pole_is_skipped_without_aborting_the_function() {
    let functions = [FunctionSpec::new("1/x", MarkerShape::Square, 3.0, 3)];
    let snapshot = PreviewBuilder::new().build(&functions, &fixed_layout([-1.0, 1.0], [-1.0, 1.0]));

    assert_eq!(snapshot.count(FragmentKind::Marker), 2);
    assert_eq!(snapshot.stats.non_finite, 1);
    assert!(
        snapshot
            .fragments()
            .iter()
            .filter(|f| f.kind == FragmentKind::Marker)
            .all(|f| f.offset.x.abs() > 1.0)
    );
}

#[test]
fn stage_keeps_a_single_snapshot_and_frames_it() {
    let mut stage = Stage::new();
    let builder = PreviewBuilder::new();
    stage.publish(builder.build_config(&PreviewConfig::default()));
    let first_camera = *stage.camera();
    let generation = stage.publish(builder.build_config(&PreviewConfig::default()));

    assert_eq!(generation, 2);
    assert_eq!(stage.current().map(|s| s.count(FragmentKind::Plate)), Some(1));
    let camera = stage.camera();
    for axis in 0..3 {
        assert_relative_eq!(
            camera.position.to_array()[axis],
            first_camera.position.to_array()[axis],
            epsilon = 1e-9
        );
    }
    assert_relative_eq!(camera.far, first_camera.far);

    stage.reset_view();
    assert_relative_eq!(stage.camera().position.x, 300.0);
    assert_relative_eq!(stage.camera().target.z, 0.0);
}

#[test]
fn session_debounces_a_burst_of_edits() {
    let mut session = Session::default();
    let mut rebuilt = 0;
    for (i, t) in [0_u64, 50, 100, 150].into_iter().enumerate() {
        let config = PreviewConfig {
            functions: vec![FunctionSpec::new("x**2", MarkerShape::Triangle, 3.5, i as u32 + 2)],
            ..PreviewConfig::default()
        };
        session.edit(config, Duration::from_millis(t));
        rebuilt += usize::from(session.tick(Duration::from_millis(t + 10)));
    }
    assert_eq!(rebuilt, 0);
    assert_eq!(session.next_deadline(), Some(Duration::from_millis(450)));
    assert!(session.tick(Duration::from_millis(450)));

    let snapshot = session.stage().current().expect("published");
    assert_eq!(snapshot.count(FragmentKind::Marker), 5);
}

#[test]
fn export_payload_follows_the_config() {
    let request = ExportRequest::from_config(&PreviewConfig::default()).expect("payload");
    assert_eq!(request.functions, ["x", "x**2", "x**3"]);
    assert_eq!(request.marker_densities, [vec![20], vec![7], vec![6]]);
    assert_eq!(request.fig_size_mm, [173.0, 113.0]);
    assert!(request.auto_limits);
    assert!(request.xlim.is_none());

    let empty = PreviewConfig {
        functions: Vec::new(),
        ..PreviewConfig::default()
    };
    assert!(matches!(
        ExportRequest::from_config(&empty),
        Err(ExportError::InvalidRequest(_))
    ));
}

#[test]
fn artifact_loads_from_disk_and_replaces_the_preview() {
    let path = temp_stl("cube");
    let url = format!("file://{}", path.display());

    let loaded = pollster::block_on(load_with_retry(
        &FileSource,
        &ThreadSleeper,
        &url,
        RetryPolicy::new(2, Duration::from_millis(10)),
    ))
    .expect("artifact loads");
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.attempts, 1);
    assert_eq!(loaded.fragment.mesh.triangle_count(), 12);
    let bbox = loaded.fragment.mesh.bbox().expect("bbox");
    assert_relative_eq!(bbox.min.x, -5.0);
    assert_relative_eq!(bbox.max.y, 5.0);
    assert_relative_eq!(bbox.min.z, 0.0);

    let mut session = Session::default();
    session.rebuild_now();
    session.publish_artifact(loaded);
    assert_eq!(session.status(), STATUS_ARTIFACT_READY);
    let snapshot = session.stage().current().expect("artifact snapshot");
    assert_eq!(snapshot.count(FragmentKind::Artifact), 1);
    assert_eq!(snapshot.count(FragmentKind::Plate), 0);
}

#[test]
fn missing_artifact_gives_up_after_the_attempt_budget() {
    let url = std::env::temp_dir().join("tactile-plate-does-not-exist.stl");
    let result = pollster::block_on(load_with_retry(
        &FileSource,
        &ThreadSleeper,
        &url.display().to_string(),
        RetryPolicy::new(3, Duration::from_millis(5)),
    ));

    match result {
        Err(error @ ExportError::ArtifactUnavailable { attempts: 3, .. }) => {
            assert_eq!(
                error.status_message(),
                "Could not load the STL automatically. Download it manually."
            );
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
