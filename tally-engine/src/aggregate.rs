use std::collections::HashMap;
use std::fmt;

use serde::{Serialize, Serializer};
use tally_core::measure::ShapeGeometry;
use tally_core::shape::{ClosedShape, ShapeCategory, ShapeId};
use tracing::{debug, warn};

use crate::labeling::BoundaryMap;
use crate::units::{format_area, round_area, square_units_to_hectares};

/// “位于既有处置范围内”的分类。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WithinDisposition {
    No,
    Yes,
    Area(f64),
}

impl WithinDisposition {
    /// 按三位小数比较：为 0 记 "No"，等于总面积记 "Yes"，否则保留数值。
    pub fn classify(within_ha: f64, total_ha: f64) -> Self {
        let within = round_area(within_ha);
        if within == 0.0 {
            WithinDisposition::No
        } else if within == round_area(total_ha) {
            WithinDisposition::Yes
        } else {
            WithinDisposition::Area(within)
        }
    }
}

impl fmt::Display for WithinDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WithinDisposition::No => f.write_str("No"),
            WithinDisposition::Yes => f.write_str("Yes"),
            WithinDisposition::Area(value) => f.write_str(&format_area(*value)),
        }
    }
}

impl Serialize for WithinDisposition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 单个边界的面积汇总，单位均为公顷。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryAggregate {
    pub identifier: String,
    pub shape: ShapeId,
    /// 实测边界面积；几何计算失败时为 `None`。
    pub boundary_area_ha: Option<f64>,
    /// 实测面积优先，否则取注记面积。
    pub total_area_ha: f64,
    pub existing_cut_ha: f64,
    pub existing_disposition_ha: f64,
    pub existing_cut_disturbance_ha: f64,
    pub new_cut_disturbance_ha: f64,
    pub within_disposition: WithinDisposition,
}

pub struct AreaAggregator<'g, G: ShapeGeometry + ?Sized> {
    geometry: &'g G,
}

impl<'g, G: ShapeGeometry + ?Sized> AreaAggregator<'g, G> {
    pub fn new(geometry: &'g G) -> Self {
        Self { geometry }
    }

    /// 面积（公顷）；几何失败记为 0 并告警。
    fn area_ha(&self, shape: &ClosedShape) -> Option<f64> {
        match self.geometry.planar_area(shape) {
            Ok(area) => Some(square_units_to_hectares(area)),
            Err(err) => {
                warn!(shape = %shape.id(), error = %err, "面积计算失败");
                None
            }
        }
    }

    /// 包围盒完全落在边界包围盒内的扰动图形（开挖 / 既有处置）。
    /// 包围盒取自几何能力；取不到包围盒的图形不计入。
    pub fn enclosed<'s>(
        &self,
        boundary: &ClosedShape,
        disturbances: &'s [ClosedShape],
    ) -> Vec<&'s ClosedShape> {
        let outer = match self.geometry.bounding_box(boundary) {
            Ok(bounds) => bounds,
            Err(err) => {
                warn!(shape = %boundary.id(), error = %err, "边界包围盒不可用，不计入任何扰动图形");
                return Vec::new();
            }
        };
        disturbances
            .iter()
            .filter(|shape| shape.id() != boundary.id() && shape.category().is_disturbance())
            .filter(|shape| match self.geometry.bounding_box(shape) {
                Ok(inner) => outer.contains_bounds(&inner),
                Err(err) => {
                    warn!(shape = %shape.id(), error = %err, "扰动图形包围盒不可用，跳过");
                    false
                }
            })
            .collect()
    }

    pub fn aggregate_boundary(
        &self,
        identifier: &str,
        boundary: &ClosedShape,
        disturbances: &[ClosedShape],
        fallback_area_ha: Option<f64>,
    ) -> BoundaryAggregate {
        let mut existing_cut_ha = 0.0;
        let mut existing_disposition_ha = 0.0;
        for shape in self.enclosed(boundary, disturbances) {
            let area = self.area_ha(shape).unwrap_or(0.0);
            match shape.category() {
                ShapeCategory::Disposition => existing_disposition_ha += area,
                _ => existing_cut_ha += area,
            }
        }

        let boundary_area_ha = self.area_ha(boundary);
        let total_area_ha = match (boundary_area_ha, fallback_area_ha) {
            (Some(measured), _) => measured,
            (None, Some(parsed)) => {
                debug!(identifier, parsed, "边界面积不可用，使用注记面积");
                parsed
            }
            (None, None) => {
                warn!(identifier, "边界面积与注记面积均不可用，按 0 计");
                0.0
            }
        };

        let existing_cut_disturbance_ha = existing_cut_ha + existing_disposition_ha;
        let new_cut_disturbance_ha = (total_area_ha - existing_cut_disturbance_ha).max(0.0);

        BoundaryAggregate {
            identifier: identifier.to_string(),
            shape: boundary.id(),
            boundary_area_ha,
            total_area_ha,
            existing_cut_ha,
            existing_disposition_ha,
            existing_cut_disturbance_ha,
            new_cut_disturbance_ha,
            within_disposition: WithinDisposition::classify(existing_disposition_ha, total_area_ha),
        }
    }

    /// 按边界映射逐一汇总。映射中的图形若已不在快照中则跳过并告警。
    pub fn aggregate_all(
        &self,
        boundaries: &BoundaryMap,
        shapes: &[ClosedShape],
        fallback_areas: &HashMap<String, f64>,
    ) -> Vec<BoundaryAggregate> {
        let by_id: HashMap<ShapeId, &ClosedShape> =
            shapes.iter().map(|shape| (shape.id(), shape)).collect();

        boundaries
            .iter()
            .filter_map(|(identifier, id)| match by_id.get(&id) {
                Some(boundary) => Some(self.aggregate_boundary(
                    identifier,
                    boundary,
                    shapes,
                    fallback_areas.get(identifier).copied(),
                )),
                None => {
                    warn!(identifier, shape = %id, "边界图形不存在，跳过");
                    None
                }
            })
            .collect()
    }
}
