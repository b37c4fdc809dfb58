use proptest::prelude::*;
use tally_core::geometry::{Point2, Vector2};
use tally_core::measure::PolylineGeometry;
use tally_core::shape::{ClosedShape, ShapeCategory, ShapeId};
use tally_engine::containment::ContainmentTester;

fn rectangle(x: i32, y: i32, width: i32, height: i32) -> ClosedShape {
    ClosedShape::rectangle(
        ShapeId::new(1),
        ShapeCategory::BoundaryCandidate,
        Point2::new(x as f64, y as f64),
        Point2::new((x + width) as f64, (y + height) as f64),
    )
}

fn l_shape() -> ClosedShape {
    ClosedShape::polygon(
        ShapeId::new(2),
        ShapeCategory::BoundaryCandidate,
        [
            Point2::new(0.0, 0.0),
            Point2::new(20.0, 0.0),
            Point2::new(20.0, 10.0),
            Point2::new(10.0, 10.0),
            Point2::new(10.0, 20.0),
            Point2::new(0.0, 20.0),
        ],
    )
}

/// 半整数坐标的点不会落在 L 形边界上。
fn inside_l_shape(x: f64, y: f64) -> bool {
    let lower = (0.0..=20.0).contains(&x) && (0.0..=10.0).contains(&y);
    let upper = (0.0..=10.0).contains(&x) && (10.0..=20.0).contains(&y);
    lower || upper
}

proptest! {
    #[test]
    fn points_outside_extents_are_never_contained(
        x in -50..50i32,
        y in -50..50i32,
        width in 1..40i32,
        height in 1..40i32,
        gap in 1..30i32,
        side in 0..4usize,
        along in 0..40i32,
    ) {
        let geometry = PolylineGeometry::new();
        let tester = ContainmentTester::new(&geometry);
        let shape = rectangle(x, y, width, height);
        let (px, py) = match side {
            0 => (x - gap, y + along),
            1 => (x + width + gap, y + along),
            2 => (x + along, y - gap),
            _ => (x + along, y + height + gap),
        };
        prop_assert!(!tester.contains(&shape, Point2::new(px as f64, py as f64)));
    }

    #[test]
    fn boundary_points_are_contained(
        x in -50..50i32,
        y in -50..50i32,
        width in 1..40i32,
        height in 1..40i32,
        side in 0..4usize,
        step in 0..=40i32,
    ) {
        let geometry = PolylineGeometry::new();
        let tester = ContainmentTester::new(&geometry);
        let shape = rectangle(x, y, width, height);
        let (px, py) = match side {
            0 => (x, y + step.min(height)),
            1 => (x + width, y + step.min(height)),
            2 => (x + step.min(width), y),
            _ => (x + step.min(width), y + height),
        };
        prop_assert!(tester.contains(&shape, Point2::new(px as f64, py as f64)));
    }

    #[test]
    fn l_shape_matches_oracle_under_translation(
        px in -3..23i32,
        py in -3..23i32,
        dx in -1000..1000i32,
        dy in -1000..1000i32,
    ) {
        let geometry = PolylineGeometry::new();
        let tester = ContainmentTester::new(&geometry);
        let shape = l_shape();
        let point = Point2::new(px as f64 + 0.5, py as f64 + 0.5);
        let expected = inside_l_shape(point.x(), point.y());

        prop_assert_eq!(tester.contains(&shape, point), expected);

        let offset = Vector2::new(dx as f64, dy as f64);
        let moved = shape.translated(offset);
        prop_assert_eq!(tester.contains(&moved, point.translate(offset)), expected);
    }
}

#[test]
fn concave_notch_is_outside() {
    let geometry = PolylineGeometry::new();
    let tester = ContainmentTester::new(&geometry);
    assert!(!tester.contains(&l_shape(), Point2::new(15.0, 15.0)));
    assert!(tester.contains(&l_shape(), Point2::new(5.0, 15.0)));
}
