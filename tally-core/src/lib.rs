pub mod geometry {
    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，所有包含判定均在 XY 平面进行。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn distance_to(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn dot(self, other: Vector2) -> f64 {
            self.0.dot(other.0)
        }

        /// 逆时针旋转 90° 得到的垂直向量。
        #[inline]
        pub fn perp(self) -> Vector2 {
            Self(self.0.perp())
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Vector2 {
            Self(self.0 * factor)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl std::ops::Add for Vector2 {
        type Output = Vector2;

        fn add(self, rhs: Vector2) -> Vector2 {
            Vector2(self.0 + rhs.0)
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 三维点。宿主采集的参考点可能带 Z 值，包含判定时忽略。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        /// 投影到 XY 平面。
        #[inline]
        pub fn to_point2(self) -> Point2 {
            Point2::new(self.0.x, self.0.y)
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框。包含判定对边界本身视为在内。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let center = (self.min.as_vec2() + self.max.as_vec2()) * 0.5;
            Point2::from_vec(center)
        }

        /// 从最小角指向最大角的对角线向量。
        #[inline]
        pub fn diagonal(&self) -> Vector2 {
            self.min.vector_to(self.max)
        }

        /// 零容差判定点是否落在框内（含边界）。
        pub fn contains_point(&self, point: Point2) -> bool {
            !self.is_empty()
                && point.x() >= self.min.x()
                && point.x() <= self.max.x()
                && point.y() >= self.min.y()
                && point.y() <= self.max.y()
        }

        /// 另一个框的四条边是否全部落在本框内。
        pub fn contains_bounds(&self, other: &Bounds2D) -> bool {
            !self.is_empty()
                && !other.is_empty()
                && other.min.x() >= self.min.x()
                && other.max.x() <= self.max.x()
                && other.min.y() >= self.min.y()
                && other.max.y() <= self.max.y()
        }

        pub fn translate(&self, offset: Vector2) -> Bounds2D {
            if self.is_empty() {
                return *self;
            }
            Bounds2D::new(self.min.translate(offset), self.max.translate(offset))
        }
    }

}

pub mod shape {
    use std::f64::consts::{FRAC_PI_2, TAU};
    use std::fmt;

    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2, Vector2};

    const BULGE_EPSILON: f64 = 1e-9;

    /// 宿主侧图形句柄，对引擎而言不透明。
    #[derive(
        Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    )]
    pub struct ShapeId(u64);

    impl ShapeId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    impl fmt::Display for ShapeId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "#{}", self.0)
        }
    }

    /// 图形所在类别，通常由图层推导。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum ShapeCategory {
        Cut,
        Disposition,
        BoundaryCandidate,
        #[serde(other)]
        Other,
    }

    impl ShapeCategory {
        /// 既有扰动（开挖或既有处置）类别。
        #[inline]
        pub fn is_disturbance(self) -> bool {
            matches!(self, ShapeCategory::Cut | ShapeCategory::Disposition)
        }
    }

    /// 边界顶点；`bulge` 非零时描述到下一个顶点的圆弧段。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct BoundaryVertex {
        pub position: Point2,
        #[serde(default)]
        pub bulge: f64,
    }

    impl BoundaryVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    /// 由 bulge 值展开得到的圆弧段，`sweep` 为带符号圆心角（逆时针为正）。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct BulgeArc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub sweep: f64,
    }

    impl BulgeArc {
        pub fn from_segment(start: Point2, end: Point2, bulge: f64) -> Option<Self> {
            if !bulge.is_finite() || bulge.abs() <= BULGE_EPSILON {
                return None;
            }
            let start_vec = start.as_vec2();
            let end_vec = end.as_vec2();
            let chord = end_vec - start_vec;
            let chord_len = chord.length();
            if chord_len <= f64::EPSILON {
                return None;
            }

            let sweep = 4.0 * bulge.atan();
            let half = sweep / 2.0;
            let radius = (chord_len / (2.0 * half.sin())).abs();
            let left = DVec2::new(-chord.y, chord.x) / chord_len;
            let offset = chord_len / (2.0 * half.tan());
            let center = (start_vec + end_vec) * 0.5 + left * offset;

            let start_dir = start_vec - center;
            Some(Self {
                center: Point2::from_vec(center),
                radius,
                start_angle: start_dir.y.atan2(start_dir.x),
                sweep,
            })
        }

        /// `t` 取 0..=1，沿圆弧插值。
        pub fn point_at(&self, t: f64) -> Point2 {
            let angle = self.start_angle + self.sweep * t;
            self.center
                .translate(Vector2::new(self.radius * angle.cos(), self.radius * angle.sin()))
        }

        pub fn include_in(&self, bounds: &mut Bounds2D) {
            bounds.include_point(self.point_at(0.0));
            bounds.include_point(self.point_at(1.0));

            let low = self.start_angle.min(self.start_angle + self.sweep);
            let high = self.start_angle.max(self.start_angle + self.sweep);
            for quadrant in 0..4 {
                let base = FRAC_PI_2 * quadrant as f64;
                let candidate = base + TAU * ((low - base) / TAU).ceil();
                if candidate <= high {
                    bounds.include_point(self.center.translate(Vector2::new(
                        self.radius * candidate.cos(),
                        self.radius * candidate.sin(),
                    )));
                }
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct ShapeRecord {
        id: ShapeId,
        category: ShapeCategory,
        #[serde(default)]
        layer: String,
        vertices: Vec<BoundaryVertex>,
    }

    /// 闭合平面图形。由宿主创建，引擎只读。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(from = "ShapeRecord", into = "ShapeRecord")]
    pub struct ClosedShape {
        id: ShapeId,
        category: ShapeCategory,
        layer: String,
        vertices: Vec<BoundaryVertex>,
        bounds: Bounds2D,
    }

    impl From<ShapeRecord> for ClosedShape {
        fn from(record: ShapeRecord) -> Self {
            ClosedShape::new(record.id, record.category, record.vertices).with_layer(record.layer)
        }
    }

    impl From<ClosedShape> for ShapeRecord {
        fn from(shape: ClosedShape) -> Self {
            ShapeRecord {
                id: shape.id,
                category: shape.category,
                layer: shape.layer,
                vertices: shape.vertices,
            }
        }
    }

    impl ClosedShape {
        /// 构造闭合图形；若末顶点与首顶点重合则去掉重复的闭合点。
        pub fn new(id: ShapeId, category: ShapeCategory, mut vertices: Vec<BoundaryVertex>) -> Self {
            if vertices.len() > 1 {
                let first = vertices[0].position;
                let last = vertices[vertices.len() - 1].position;
                if first.distance_to(last) <= f64::EPSILON {
                    vertices.pop();
                }
            }
            let bounds = compute_bounds(&vertices);
            Self {
                id,
                category,
                layer: String::new(),
                vertices,
                bounds,
            }
        }

        /// 以直线段构造多边形。
        pub fn polygon<I>(id: ShapeId, category: ShapeCategory, points: I) -> Self
        where
            I: IntoIterator<Item = Point2>,
        {
            Self::new(
                id,
                category,
                points.into_iter().map(BoundaryVertex::new).collect(),
            )
        }

        /// 轴对齐矩形，常用于测试与块状扰动区。
        pub fn rectangle(id: ShapeId, category: ShapeCategory, min: Point2, max: Point2) -> Self {
            Self::polygon(
                id,
                category,
                [
                    min,
                    Point2::new(max.x(), min.y()),
                    max,
                    Point2::new(min.x(), max.y()),
                ],
            )
        }

        pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
            self.layer = layer.into();
            self
        }

        #[inline]
        pub fn id(&self) -> ShapeId {
            self.id
        }

        #[inline]
        pub fn category(&self) -> ShapeCategory {
            self.category
        }

        #[inline]
        pub fn layer(&self) -> &str {
            &self.layer
        }

        #[inline]
        pub fn vertices(&self) -> &[BoundaryVertex] {
            &self.vertices
        }

        #[inline]
        pub fn bounds(&self) -> Bounds2D {
            self.bounds
        }

        /// 整体平移，保持类别与句柄不变。
        pub fn translated(&self, offset: Vector2) -> ClosedShape {
            let vertices = self
                .vertices
                .iter()
                .map(|vertex| BoundaryVertex::with_bulge(vertex.position.translate(offset), vertex.bulge))
                .collect();
            ClosedShape::new(self.id, self.category, vertices).with_layer(self.layer.clone())
        }

        /// 将边界展开为折线环（不重复首点）。每个圆弧段拆成 `arc_segments` 段弦。
        pub fn flatten(&self, arc_segments: usize) -> Vec<Point2> {
            let count = self.vertices.len();
            let steps = arc_segments.max(1);
            let mut ring = Vec::with_capacity(count);
            for (index, vertex) in self.vertices.iter().enumerate() {
                ring.push(vertex.position);
                let next = self.vertices[(index + 1) % count].position;
                if let Some(arc) = BulgeArc::from_segment(vertex.position, next, vertex.bulge) {
                    for step in 1..steps {
                        ring.push(arc.point_at(step as f64 / steps as f64));
                    }
                }
            }
            ring
        }
    }

    fn compute_bounds(vertices: &[BoundaryVertex]) -> Bounds2D {
        let mut bounds = Bounds2D::empty();
        let count = vertices.len();
        for (index, vertex) in vertices.iter().enumerate() {
            bounds.include_point(vertex.position);
            let next = vertices[(index + 1) % count].position;
            if let Some(arc) = BulgeArc::from_segment(vertex.position, next, vertex.bulge) {
                arc.include_in(&mut bounds);
            }
        }
        bounds
    }

}

pub mod measure {
    use glam::DVec2;
    use thiserror::Error;

    use crate::geometry::{Bounds2D, Point2, Vector2};
    use crate::shape::{ClosedShape, ShapeId};

    /// 默认每个圆弧段展开的弦数。
    pub const DEFAULT_ARC_SEGMENTS: usize = 16;

    const PARALLEL_EPSILON: f64 = 1e-12;
    const SEGMENT_PARAM_EPSILON: f64 = 1e-12;

    #[derive(Debug, Error)]
    pub enum GeometryError {
        #[error("shape {0} has fewer than three distinct vertices or zero area")]
        Degenerate(ShapeId),
        #[error("shape {0} contains a non-finite coordinate")]
        NonFinite(ShapeId),
        #[error("ray direction for shape {0} has zero length")]
        ZeroDirection(ShapeId),
    }

    /// 宿主提供的几何能力。面积单位为图形单位的平方。
    pub trait ShapeGeometry {
        fn planar_area(&self, shape: &ClosedShape) -> Result<f64, GeometryError>;

        fn bounding_box(&self, shape: &ClosedShape) -> Result<Bounds2D, GeometryError> {
            let bounds = shape.bounds();
            if bounds.is_empty() {
                Err(GeometryError::Degenerate(shape.id()))
            } else if !bounds.min().is_finite() || !bounds.max().is_finite() {
                Err(GeometryError::NonFinite(shape.id()))
            } else {
                Ok(bounds)
            }
        }

        fn closest_point_on_boundary(
            &self,
            shape: &ClosedShape,
            point: Point2,
        ) -> Result<Point2, GeometryError>;

        /// 返回经过 `origin`、方向为 `direction` 的直线与边界的全部交点，
        /// 起点之后与之前的交点都会返回，由调用方自行筛选。
        fn intersect_ray(
            &self,
            shape: &ClosedShape,
            origin: Point2,
            direction: Vector2,
        ) -> Result<Vec<Point2>, GeometryError>;
    }

    /// 基于折线近似的默认几何实现。
    #[derive(Debug, Clone, Copy)]
    pub struct PolylineGeometry {
        arc_segments: usize,
    }

    impl PolylineGeometry {
        pub fn new() -> Self {
            Self {
                arc_segments: DEFAULT_ARC_SEGMENTS,
            }
        }

        pub fn with_arc_segments(arc_segments: usize) -> Self {
            Self {
                arc_segments: arc_segments.max(1),
            }
        }

        #[inline]
        pub fn arc_segments(&self) -> usize {
            self.arc_segments
        }

        fn outline(&self, shape: &ClosedShape) -> Result<Vec<DVec2>, GeometryError> {
            let mut ring: Vec<DVec2> = Vec::new();
            for point in shape.flatten(self.arc_segments) {
                if !point.is_finite() {
                    return Err(GeometryError::NonFinite(shape.id()));
                }
                let vec = point.as_vec2();
                if ring.last().is_none_or(|last| last.distance(vec) > f64::EPSILON) {
                    ring.push(vec);
                }
            }
            while ring.len() > 1 && ring[0].distance(ring[ring.len() - 1]) <= f64::EPSILON {
                ring.pop();
            }
            if ring.len() < 3 || signed_area(&ring).abs() <= f64::EPSILON {
                return Err(GeometryError::Degenerate(shape.id()));
            }
            Ok(ring)
        }
    }

    impl Default for PolylineGeometry {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ShapeGeometry for PolylineGeometry {
        fn planar_area(&self, shape: &ClosedShape) -> Result<f64, GeometryError> {
            let ring = self.outline(shape)?;
            Ok(signed_area(&ring).abs())
        }

        fn closest_point_on_boundary(
            &self,
            shape: &ClosedShape,
            point: Point2,
        ) -> Result<Point2, GeometryError> {
            let ring = self.outline(shape)?;
            let target = point.as_vec2();
            let mut best = ring[0];
            let mut best_distance = f64::INFINITY;
            for (start, end) in segments(&ring) {
                let candidate = closest_on_segment(start, end, target);
                let distance = candidate.distance_squared(target);
                if distance < best_distance {
                    best_distance = distance;
                    best = candidate;
                }
            }
            Ok(Point2::from_vec(best))
        }

        fn intersect_ray(
            &self,
            shape: &ClosedShape,
            origin: Point2,
            direction: Vector2,
        ) -> Result<Vec<Point2>, GeometryError> {
            let dir = direction.as_vec2();
            if !dir.is_finite() || dir.length_squared() <= f64::EPSILON {
                return Err(GeometryError::ZeroDirection(shape.id()));
            }
            let ring = self.outline(shape)?;
            let origin_vec = origin.as_vec2();
            let mut hits = Vec::new();
            for (start, end) in segments(&ring) {
                let edge = end - start;
                let denom = dir.perp_dot(edge);
                if denom.abs() <= PARALLEL_EPSILON * dir.length() * edge.length() {
                    continue;
                }
                let offset = start - origin_vec;
                let t = offset.perp_dot(edge) / denom;
                let s = offset.perp_dot(dir) / denom;
                if (-SEGMENT_PARAM_EPSILON..=1.0 + SEGMENT_PARAM_EPSILON).contains(&s) {
                    hits.push(Point2::from_vec(origin_vec + dir * t));
                }
            }
            Ok(hits)
        }
    }

    fn segments(ring: &[DVec2]) -> impl Iterator<Item = (DVec2, DVec2)> + '_ {
        ring.iter()
            .enumerate()
            .map(move |(index, start)| (*start, ring[(index + 1) % ring.len()]))
    }

    fn signed_area(ring: &[DVec2]) -> f64 {
        0.5 * segments(ring)
            .map(|(start, end)| start.perp_dot(end))
            .sum::<f64>()
    }

    fn closest_on_segment(start: DVec2, end: DVec2, target: DVec2) -> DVec2 {
        let edge = end - start;
        let len2 = edge.length_squared();
        if len2 <= f64::EPSILON {
            return start;
        }
        let t = ((target - start).dot(edge) / len2).clamp(0.0, 1.0);
        start + edge * t
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::shape::{BoundaryVertex, ShapeCategory};

        fn square(size: f64) -> ClosedShape {
            ClosedShape::rectangle(
                ShapeId::new(1),
                ShapeCategory::BoundaryCandidate,
                Point2::new(0.0, 0.0),
                Point2::new(size, size),
            )
        }

        #[test]
        fn planar_area_of_rectangle_and_triangle() {
            let geometry = PolylineGeometry::new();
            assert!((geometry.planar_area(&square(100.0)).unwrap() - 10_000.0).abs() < 1e-9);

            // 顺时针顶点顺序同样返回正面积。
            let triangle = ClosedShape::polygon(
                ShapeId::new(2),
                ShapeCategory::Cut,
                [
                    Point2::new(0.0, 0.0),
                    Point2::new(0.0, 4.0),
                    Point2::new(3.0, 0.0),
                ],
            );
            assert!((geometry.planar_area(&triangle).unwrap() - 6.0).abs() < 1e-9);
        }

        #[test]
        fn bulged_disc_area_approaches_circle() {
            let disc = ClosedShape::new(
                ShapeId::new(3),
                ShapeCategory::Disposition,
                vec![
                    BoundaryVertex::with_bulge(Point2::new(-10.0, 0.0), 1.0),
                    BoundaryVertex::with_bulge(Point2::new(10.0, 0.0), 1.0),
                ],
            );
            let geometry = PolylineGeometry::with_arc_segments(256);
            let area = geometry.planar_area(&disc).unwrap();
            let exact = std::f64::consts::PI * 100.0;
            assert!((area - exact).abs() / exact < 1e-3, "area = {area}");
        }

        #[test]
        fn degenerate_shapes_report_errors() {
            let geometry = PolylineGeometry::new();
            let line = ClosedShape::polygon(
                ShapeId::new(9),
                ShapeCategory::Cut,
                [Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), Point2::new(2.0, 2.0)],
            );
            assert!(matches!(
                geometry.planar_area(&line),
                Err(GeometryError::Degenerate(id)) if id == ShapeId::new(9)
            ));

            let broken = ClosedShape::polygon(
                ShapeId::new(10),
                ShapeCategory::Cut,
                [
                    Point2::new(0.0, 0.0),
                    Point2::new(f64::NAN, 1.0),
                    Point2::new(2.0, 0.0),
                ],
            );
            assert!(matches!(
                geometry.planar_area(&broken),
                Err(GeometryError::NonFinite(_))
            ));
        }

        #[test]
        fn closest_point_projects_onto_nearest_edge() {
            let geometry = PolylineGeometry::new();
            let closest = geometry
                .closest_point_on_boundary(&square(10.0), Point2::new(3.0, 1.0))
                .unwrap();
            assert!((closest.x() - 3.0).abs() < 1e-12);
            assert!(closest.y().abs() < 1e-12);

            let corner = geometry
                .closest_point_on_boundary(&square(10.0), Point2::new(12.0, 13.0))
                .unwrap();
            assert_eq!(corner, Point2::new(10.0, 10.0));
        }

        #[test]
        fn ray_intersections_cover_both_directions() {
            let geometry = PolylineGeometry::new();
            let hits = geometry
                .intersect_ray(&square(10.0), Point2::new(5.0, 5.0), Vector2::new(1.0, 0.0))
                .unwrap();
            assert_eq!(hits.len(), 2);
            assert!(hits.iter().any(|p| (p.x() - 10.0).abs() < 1e-12));
            assert!(hits.iter().any(|p| p.x().abs() < 1e-12));

            assert!(matches!(
                geometry.intersect_ray(&square(10.0), Point2::new(5.0, 5.0), Vector2::new(0.0, 0.0)),
                Err(GeometryError::ZeroDirection(_))
            ));
        }
    }
}

pub mod drawing {
    use std::collections::HashSet;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Point2, Point3};
    use crate::shape::{ClosedShape, ShapeCategory, ShapeId};

    /// 块属性中的（编号, 注记文字）对。
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AttributePair {
        pub identifier: String,
        pub text: String,
    }

    impl AttributePair {
        pub fn new(identifier: impl Into<String>, text: impl Into<String>) -> Self {
            Self {
                identifier: identifier.into(),
                text: text.into(),
            }
        }
    }

    /// 属性块扫描能力。返回结果按完全相同的（编号, 文字）去重，保持首次出现的顺序。
    pub trait AttributeSource {
        fn collect_attribute_pairs(&self) -> Vec<AttributePair>;
    }

    /// 已持久化的图形标签。
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ShapeLabel {
        pub shape: ShapeId,
        pub label: String,
    }

    /// 宿主导出的图纸快照：图形、参考线顶点、属性对以及既有标签。
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct Drawing {
        #[serde(default)]
        shapes: Vec<ClosedShape>,
        #[serde(default)]
        reference_points: Vec<Point3>,
        #[serde(default)]
        attributes: Vec<AttributePair>,
        #[serde(default)]
        labels: Vec<ShapeLabel>,
    }

    impl Drawing {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_shape(&mut self, shape: ClosedShape) -> ShapeId {
            let id = shape.id();
            self.shapes.push(shape);
            id
        }

        pub fn add_attribute(&mut self, identifier: impl Into<String>, text: impl Into<String>) {
            self.attributes.push(AttributePair::new(identifier, text));
        }

        pub fn add_label(&mut self, shape: ShapeId, label: impl Into<String>) {
            self.labels.push(ShapeLabel {
                shape,
                label: label.into(),
            });
        }

        pub fn set_reference_points<I>(&mut self, points: I)
        where
            I: IntoIterator<Item = Point3>,
        {
            self.reference_points = points.into_iter().collect();
        }

        #[inline]
        pub fn shapes(&self) -> &[ClosedShape] {
            &self.shapes
        }

        pub fn shape(&self, id: ShapeId) -> Option<&ClosedShape> {
            self.shapes.iter().find(|shape| shape.id() == id)
        }

        pub fn shapes_in(&self, category: ShapeCategory) -> impl Iterator<Item = &ClosedShape> {
            self.shapes
                .iter()
                .filter(move |shape| shape.category() == category)
        }

        #[inline]
        pub fn reference_points(&self) -> &[Point3] {
            &self.reference_points
        }

        /// 参考点投影到 XY 平面后的序列。
        pub fn reference_vertices(&self) -> Vec<Point2> {
            self.reference_points
                .iter()
                .map(|point| point.to_point2())
                .collect()
        }

        #[inline]
        pub fn labels(&self) -> &[ShapeLabel] {
            &self.labels
        }
    }

    impl AttributeSource for Drawing {
        fn collect_attribute_pairs(&self) -> Vec<AttributePair> {
            let mut seen = HashSet::new();
            self.attributes
                .iter()
                .filter(|pair| seen.insert((*pair).clone()))
                .cloned()
                .collect()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn attribute_pairs_are_deduplicated_by_exact_pair() {
            let mut drawing = Drawing::new();
            drawing.add_attribute("W1", "10x50");
            drawing.add_attribute("W2", "20x30");
            drawing.add_attribute("W1", "10x50");
            drawing.add_attribute("W1", "10 x 50");

            let pairs = drawing.collect_attribute_pairs();
            assert_eq!(pairs.len(), 3);
            assert_eq!(pairs[0], AttributePair::new("W1", "10x50"));
            assert_eq!(pairs[2], AttributePair::new("W1", "10 x 50"));
        }

        #[test]
        fn reference_vertices_drop_elevation() {
            let mut drawing = Drawing::new();
            drawing.set_reference_points([Point3::new(1.0, 2.0, 350.0), Point3::new(3.0, 4.0, 0.0)]);
            let vertices = drawing.reference_vertices();
            assert_eq!(vertices, vec![Point2::new(1.0, 2.0), Point2::new(3.0, 4.0)]);
        }

        #[test]
        fn shapes_are_filtered_by_category() {
            let mut drawing = Drawing::new();
            drawing.add_shape(ClosedShape::rectangle(
                ShapeId::new(1),
                ShapeCategory::Cut,
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 1.0),
            ));
            drawing.add_shape(ClosedShape::rectangle(
                ShapeId::new(2),
                ShapeCategory::BoundaryCandidate,
                Point2::new(0.0, 0.0),
                Point2::new(5.0, 5.0),
            ));
            assert_eq!(drawing.shapes_in(ShapeCategory::Cut).count(), 1);
            assert!(drawing.shape(ShapeId::new(2)).is_some());
            assert!(drawing.shape(ShapeId::new(3)).is_none());
        }
    }
}
