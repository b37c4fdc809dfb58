//! 点在闭合图形内的判定：范围快速排除、边界容差、射线奇偶。

use tally_core::geometry::{Point2, Vector2};
use tally_core::measure::{GeometryError, ShapeGeometry};
use tally_core::shape::ClosedShape;
use tracing::{debug, warn};

/// 默认的相等容差（图形单位）。
pub const DEFAULT_TOLERANCE: f64 = 1e-7;

/// 射线方向在对角线垂直方向上的偏移比例，避免射线恰好穿过顶点或与边平行。
const RAY_OFFSET_FRACTION: f64 = 0.123_456_7;

/// 判定结果，携带判定所走的分支，便于诊断。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    OutsideExtents,
    OnBoundary,
    Inside { crossings: usize },
    Outside { crossings: usize },
}

impl Containment {
    #[inline]
    pub fn is_contained(self) -> bool {
        matches!(self, Containment::OnBoundary | Containment::Inside { .. })
    }
}

pub struct ContainmentTester<'g, G: ShapeGeometry + ?Sized> {
    geometry: &'g G,
    tolerance: f64,
}

impl<'g, G: ShapeGeometry + ?Sized> ContainmentTester<'g, G> {
    pub fn new(geometry: &'g G) -> Self {
        Self {
            geometry,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// 非正数或非有限值会回退到默认容差。
    pub fn with_tolerance(geometry: &'g G, tolerance: f64) -> Self {
        let tolerance = if tolerance.is_finite() && tolerance > 0.0 {
            tolerance
        } else {
            DEFAULT_TOLERANCE
        };
        Self {
            geometry,
            tolerance,
        }
    }

    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    #[inline]
    pub fn geometry(&self) -> &'g G {
        self.geometry
    }

    /// 边界上的点视为在内。任何几何异常都按“不包含”处理，不向上传播。
    pub fn contains(&self, shape: &ClosedShape, point: Point2) -> bool {
        match self.classify(shape, point) {
            Ok(result) => result.is_contained(),
            Err(err) => {
                warn!(shape = %shape.id(), error = %err, "包含判定失败，按不包含处理");
                false
            }
        }
    }

    pub fn classify(&self, shape: &ClosedShape, point: Point2) -> Result<Containment, GeometryError> {
        let bounds = self.geometry.bounding_box(shape)?;
        if !bounds.contains_point(point) {
            return Ok(Containment::OutsideExtents);
        }

        let closest = self.geometry.closest_point_on_boundary(shape, point)?;
        if closest.distance_to(point) <= self.tolerance {
            return Ok(Containment::OnBoundary);
        }

        let diagonal = bounds.diagonal();
        let direction = diagonal + diagonal.perp().scale(RAY_OFFSET_FRACTION);
        let hits = self.geometry.intersect_ray(shape, point, direction)?;
        let crossings = self.count_forward_crossings(point, direction, &hits);
        debug!(
            shape = %shape.id(),
            x = point.x(),
            y = point.y(),
            raw_hits = hits.len(),
            crossings,
            "射线奇偶判定"
        );

        if crossings % 2 == 1 {
            Ok(Containment::Inside { crossings })
        } else {
            Ok(Containment::Outside { crossings })
        }
    }

    fn count_forward_crossings(&self, origin: Point2, direction: Vector2, hits: &[Point2]) -> usize {
        let mut kept: Vec<Point2> = Vec::with_capacity(hits.len());
        for hit in hits {
            if !hit.is_finite() || hit.distance_to(origin) <= self.tolerance {
                continue;
            }
            if origin.vector_to(*hit).dot(direction) <= 0.0 {
                continue;
            }
            if kept
                .iter()
                .any(|existing| existing.distance_to(*hit) <= self.tolerance)
            {
                continue;
            }
            kept.push(*hit);
        }
        kept.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::geometry::Bounds2D;
    use tally_core::measure::PolylineGeometry;
    use tally_core::shape::{BoundaryVertex, ShapeCategory, ShapeId};

    fn l_shape() -> ClosedShape {
        ClosedShape::polygon(
            ShapeId::new(1),
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

    /// 总是失败的几何实现，用于验证异常被吞掉。
    struct BrokenGeometry;

    impl ShapeGeometry for BrokenGeometry {
        fn planar_area(&self, shape: &ClosedShape) -> Result<f64, GeometryError> {
            Err(GeometryError::Degenerate(shape.id()))
        }

        fn bounding_box(&self, _shape: &ClosedShape) -> Result<Bounds2D, GeometryError> {
            Ok(Bounds2D::new(Point2::new(-100.0, -100.0), Point2::new(100.0, 100.0)))
        }

        fn closest_point_on_boundary(
            &self,
            shape: &ClosedShape,
            _point: Point2,
        ) -> Result<Point2, GeometryError> {
            Err(GeometryError::NonFinite(shape.id()))
        }

        fn intersect_ray(
            &self,
            shape: &ClosedShape,
            _origin: Point2,
            _direction: Vector2,
        ) -> Result<Vec<Point2>, GeometryError> {
            Err(GeometryError::ZeroDirection(shape.id()))
        }
    }

    #[test]
    fn concave_polygon_classification() {
        let geometry = PolylineGeometry::new();
        let tester = ContainmentTester::new(&geometry);
        let shape = l_shape();

        assert!(tester.contains(&shape, Point2::new(5.0, 5.0)));
        assert!(tester.contains(&shape, Point2::new(15.0, 5.0)));
        assert!(tester.contains(&shape, Point2::new(5.0, 15.0)));
        // 凹角处位于包围盒内但在图形外。
        assert_eq!(
            tester.classify(&shape, Point2::new(15.0, 15.0)).unwrap(),
            Containment::Outside { crossings: 0 }
        );
        assert_eq!(
            tester.classify(&shape, Point2::new(25.0, 5.0)).unwrap(),
            Containment::OutsideExtents
        );
    }

    #[test]
    fn boundary_points_count_as_inside() {
        let geometry = PolylineGeometry::new();
        let tester = ContainmentTester::new(&geometry);
        let shape = l_shape();

        for point in [
            Point2::new(0.0, 0.0),
            Point2::new(20.0, 4.0),
            Point2::new(15.0, 10.0),
            Point2::new(10.0, 15.0),
            Point2::new(10.0, 10.0),
        ] {
            assert_eq!(
                tester.classify(&shape, point).unwrap(),
                Containment::OnBoundary,
                "point {point:?}"
            );
        }
        // 超出容差则走射线判定。
        assert!(!tester.contains(&shape, Point2::new(15.0, 10.001)));
    }

    #[test]
    fn caller_tolerance_widens_boundary_band() {
        let geometry = PolylineGeometry::new();
        let tester = ContainmentTester::with_tolerance(&geometry, 0.01);
        assert!(tester.contains(&l_shape(), Point2::new(15.0, 10.005)));

        let fallback = ContainmentTester::with_tolerance(&geometry, -1.0);
        assert_eq!(fallback.tolerance(), DEFAULT_TOLERANCE);
    }

    #[test]
    fn ray_through_vertex_height_is_not_double_counted() {
        let geometry = PolylineGeometry::new();
        let tester = ContainmentTester::new(&geometry);
        let diamond = ClosedShape::polygon(
            ShapeId::new(2),
            ShapeCategory::Cut,
            [
                Point2::new(0.0, -10.0),
                Point2::new(10.0, 0.0),
                Point2::new(0.0, 10.0),
                Point2::new(-10.0, 0.0),
            ],
        );
        assert!(tester.contains(&diamond, Point2::new(0.0, 0.0)));
        assert!(tester.contains(&diamond, Point2::new(-4.0, 0.0)));
        assert!(!tester.contains(&diamond, Point2::new(8.0, 8.0)));
    }

    #[test]
    fn arc_boundary_is_respected() {
        let geometry = PolylineGeometry::with_arc_segments(64);
        let tester = ContainmentTester::new(&geometry);
        // 上半圆盘：直径在 x 轴上，圆弧向上。
        let dome = ClosedShape::new(
            ShapeId::new(3),
            ShapeCategory::BoundaryCandidate,
            vec![
                BoundaryVertex::new(Point2::new(-10.0, 0.0)),
                BoundaryVertex::with_bulge(Point2::new(10.0, 0.0), 1.0),
            ],
        );
        assert!(tester.contains(&dome, Point2::new(0.0, 9.0)));
        assert!(!tester.contains(&dome, Point2::new(9.0, 9.0)));
        assert!(!tester.contains(&dome, Point2::new(0.0, -1.0)));
    }

    #[test]
    fn geometry_failures_are_not_contained() {
        let tester = ContainmentTester::new(&BrokenGeometry);
        let shape = l_shape();
        assert!(!tester.contains(&shape, Point2::new(5.0, 5.0)));
        assert!(tester.classify(&shape, Point2::new(5.0, 5.0)).is_err());

        let geometry = PolylineGeometry::new();
        let tester = ContainmentTester::new(&geometry);
        let sliver = ClosedShape::polygon(
            ShapeId::new(4),
            ShapeCategory::Cut,
            [Point2::new(0.0, 0.0), Point2::new(5.0, 5.0), Point2::new(10.0, 10.0)],
        );
        assert!(!tester.contains(&sliver, Point2::new(5.0, 5.0)));
    }
}
