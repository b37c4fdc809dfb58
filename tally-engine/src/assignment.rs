use std::collections::BTreeMap;

use serde::Serialize;
use tally_core::geometry::Point2;
use tally_core::measure::ShapeGeometry;
use tally_core::shape::{ClosedShape, ShapeId};
use tracing::{debug, info};

use crate::containment::ContainmentTester;
use crate::errors::EngineError;

/// 一次计算得到的“图形 -> 标签”映射，只在内存中存在，写入由 [`crate::labeling`] 负责。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelAssignment {
    prefix: String,
    labels: BTreeMap<ShapeId, String>,
}

impl LabelAssignment {
    #[inline]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[inline]
    pub fn get(&self, shape: ShapeId) -> Option<&str> {
        self.labels.get(&shape).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShapeId, &str)> {
        self.labels.iter().map(|(id, label)| (*id, label.as_str()))
    }

    /// 拥有指定标签的全部图形。
    pub fn shapes_for<'a>(&'a self, label: &'a str) -> impl Iterator<Item = ShapeId> + 'a {
        self.labels
            .iter()
            .filter(move |(_, value)| value.as_str() == label)
            .map(|(id, _)| *id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// 第 i 个顶点（从 1 开始）对应标签 `prefix + i`。
#[inline]
pub fn vertex_label(prefix: &str, index: usize) -> String {
    format!("{prefix}{index}")
}

/// 按参考线顶点顺序为候选图形分配标签。
///
/// 一个顶点命中多个图形时全部赋同一标签；同一图形被多个顶点命中时以后者为准。
/// 任一顶点没有命中任何图形则整体失败，不返回部分结果。
pub fn compute_vertex_assignments<G: ShapeGeometry + ?Sized>(
    tester: &ContainmentTester<'_, G>,
    vertices: &[Point2],
    candidates: &[ClosedShape],
    prefix: &str,
) -> Result<LabelAssignment, EngineError> {
    let mut labels = BTreeMap::new();
    for (offset, vertex) in vertices.iter().enumerate() {
        let index = offset + 1;
        let label = vertex_label(prefix, index);
        let matches: Vec<ShapeId> = candidates
            .iter()
            .filter(|shape| tester.contains(shape, *vertex))
            .map(ClosedShape::id)
            .collect();

        if matches.is_empty() {
            return Err(EngineError::UnassignedVertex { index, label });
        }
        if matches.len() > 1 {
            debug!(label = %label, count = matches.len(), "顶点同时落在多个候选图形内");
        }
        for id in matches {
            labels.insert(id, label.clone());
        }
    }

    info!(
        prefix,
        vertices = vertices.len(),
        shapes = labels.len(),
        "标签分配计算完成"
    );
    Ok(LabelAssignment {
        prefix: prefix.to_string(),
        labels,
    })
}
