use crate::geom::{ExtrusionCaps, ExtrusionError, Point3, extrude_polygon};

fn unit_square() -> [Point3; 4] {
    [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ]
}

#[test]
fn extrude_closed_square_with_caps_is_watertight() {
    let (mesh, diag) = extrude_polygon(&unit_square(), 1.0, ExtrusionCaps::BOTH).unwrap();

    assert_eq!(mesh.triangle_count(), 12);
    assert_eq!(diag.vertex_count, 8);
    assert_eq!(diag.open_edge_count, 0);
    assert_eq!(diag.non_manifold_edge_count, 0);
    assert!(diag.warnings.is_empty(), "unexpected warnings: {:?}", diag.warnings);
}

#[test]
fn extrude_without_caps_leaves_two_open_rings() {
    let (_mesh, diag) = extrude_polygon(&unit_square(), 1.0, ExtrusionCaps::NONE).unwrap();

    assert_eq!(diag.triangle_count, 8);
    assert_eq!(diag.open_edge_count, 8);
    assert!(!diag.is_watertight());
}

#[test]
fn clockwise_profile_is_reoriented_outward() {
    let mut profile = unit_square();
    profile.reverse();
    let (_mesh, diag) = extrude_polygon(&profile, 2.0, ExtrusionCaps::BOTH).unwrap();

    assert!(diag.is_valid_solid());
    assert!(diag.warnings.is_empty(), "unexpected warnings: {:?}", diag.warnings);
}

#[test]
fn closing_duplicate_point_is_ignored() {
    let square = unit_square();
    let profile = [square[0], square[1], square[2], square[3], square[0]];
    let (mesh, _diag) = extrude_polygon(&profile, 1.0, ExtrusionCaps::BOTH).unwrap();
    assert_eq!(mesh.vertex_count(), 8);
}

#[test]
fn extrusion_rejects_bad_inputs() {
    assert!(matches!(
        extrude_polygon(&unit_square(), 0.0, ExtrusionCaps::BOTH),
        Err(ExtrusionError::InvalidHeight(_))
    ));
    assert!(matches!(
        extrude_polygon(&unit_square()[..2], 1.0, ExtrusionCaps::BOTH),
        Err(ExtrusionError::NotEnoughPoints { min: 3 })
    ));

    let collinear = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
    ];
    assert!(matches!(
        extrude_polygon(&collinear, 1.0, ExtrusionCaps::BOTH),
        Err(ExtrusionError::ProfileDegenerate)
    ));

    let notch = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(1.0, 0.5, 0.0),
        Point3::new(2.0, 2.0, 0.0),
        Point3::new(0.0, 2.0, 0.0),
    ];
    assert!(matches!(
        extrude_polygon(&notch, 1.0, ExtrusionCaps::BOTH),
        Err(ExtrusionError::ProfileNotConvex)
    ));
    assert!(extrude_polygon(&notch, 1.0, ExtrusionCaps::NONE).is_ok());

    let tilted = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.5),
        Point3::new(0.0, 1.0, 0.0),
    ];
    assert!(matches!(
        extrude_polygon(&tilted, 1.0, ExtrusionCaps::BOTH),
        Err(ExtrusionError::ProfileNotPlanar)
    ));
}
