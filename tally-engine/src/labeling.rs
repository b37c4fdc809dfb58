//! 标签的两阶段写入与边界映射读取。
//!
//! 计算阶段只读快照；全部成功后才进入写入阶段，且写入阶段总是先清除
//! 同前缀的旧标签，再写入新标签。

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tally_core::geometry::Point2;
use tally_core::measure::ShapeGeometry;
use tally_core::shape::{ClosedShape, ShapeId};
use tracing::{debug, info, warn};

use crate::assignment::{LabelAssignment, compute_vertex_assignments};
use crate::containment::ContainmentTester;
use crate::errors::{EngineError, LabelConflict};
use crate::ordering::compare_identifiers;

/// 宿主的对象数据存储，每个图形至多一个标签。
pub trait ObjectDataStore {
    fn read_label(&self, shape: ShapeId) -> Option<String>;
    fn write_label(&mut self, shape: ShapeId, value: &str) -> Result<(), EngineError>;
    fn clear_label(&mut self, shape: ShapeId) -> Result<(), EngineError>;
}

/// 内存实现，供 CLI 与测试使用。
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectData {
    labels: HashMap<ShapeId, String>,
}

impl MemoryObjectData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = (ShapeId, S)>,
        S: Into<String>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(|(id, label)| (id, label.into()))
                .collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// 按图形句柄排序的标签快照。
    pub fn snapshot(&self) -> Vec<(ShapeId, String)> {
        let mut entries: Vec<_> = self
            .labels
            .iter()
            .map(|(id, label)| (*id, label.clone()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }
}

impl ObjectDataStore for MemoryObjectData {
    fn read_label(&self, shape: ShapeId) -> Option<String> {
        self.labels.get(&shape).cloned()
    }

    fn write_label(&mut self, shape: ShapeId, value: &str) -> Result<(), EngineError> {
        self.labels.insert(shape, value.to_string());
        Ok(())
    }

    fn clear_label(&mut self, shape: ShapeId) -> Result<(), EngineError> {
        self.labels.remove(&shape);
        Ok(())
    }
}

/// 写入阶段的统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LabelReport {
    pub cleared: usize,
    pub written: usize,
}

/// 标签是否形如 `prefix + 数字`。"W" 前缀不会匹配 "WS1"。
pub fn is_prefixed_label(label: &str, prefix: &str) -> bool {
    label
        .strip_prefix(prefix)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// 写入阶段：先清除 `universe` 中所有同前缀旧标签，再写入新映射。
pub fn apply_assignment<S, I>(
    store: &mut S,
    universe: I,
    assignment: &LabelAssignment,
) -> Result<LabelReport, EngineError>
where
    S: ObjectDataStore + ?Sized,
    I: IntoIterator<Item = ShapeId>,
{
    let universe: BTreeSet<ShapeId> = universe.into_iter().collect();
    let mut report = LabelReport::default();

    for id in &universe {
        let stale = store
            .read_label(*id)
            .is_some_and(|label| is_prefixed_label(&label, assignment.prefix()));
        if stale {
            store.clear_label(*id)?;
            report.cleared += 1;
        }
    }

    for (id, label) in assignment.iter() {
        store.write_label(id, label)?;
        report.written += 1;
    }

    info!(
        prefix = assignment.prefix(),
        cleared = report.cleared,
        written = report.written,
        "标签已写入对象数据"
    );
    Ok(report)
}

/// 完整的标注流程：先计算，成功后再写入。计算失败时存储保持不变。
pub fn label_workspaces<G, S, I>(
    tester: &ContainmentTester<'_, G>,
    store: &mut S,
    vertices: &[Point2],
    candidates: &[ClosedShape],
    universe: I,
    prefix: &str,
) -> Result<(LabelAssignment, LabelReport), EngineError>
where
    G: ShapeGeometry + ?Sized,
    S: ObjectDataStore + ?Sized,
    I: IntoIterator<Item = ShapeId>,
{
    let assignment = compute_vertex_assignments(tester, vertices, candidates, prefix)?;
    let report = apply_assignment(store, universe, &assignment)?;
    Ok((assignment, report))
}

/// 边界标签到图形的映射，按编号自然顺序排列。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryMap {
    entries: Vec<(String, ShapeId)>,
}

impl BoundaryMap {
    pub fn iter(&self) -> impl Iterator<Item = (&str, ShapeId)> {
        self.entries.iter().map(|(label, id)| (label.as_str(), *id))
    }

    pub fn get(&self, label: &str) -> Option<ShapeId> {
        self.entries
            .iter()
            .find(|(value, _)| value == label)
            .map(|(_, id)| *id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 从对象数据读取边界标签。扰动类图形不参与；空白标签忽略。
/// 多个图形共享同一标签时，列出所有冲突图形并整体失败。
pub fn build_boundary_map<S: ObjectDataStore + ?Sized>(
    store: &S,
    shapes: &[ClosedShape],
) -> Result<BoundaryMap, EngineError> {
    let mut by_label: BTreeMap<String, Vec<ShapeId>> = BTreeMap::new();
    for shape in shapes {
        if shape.category().is_disturbance() {
            continue;
        }
        let Some(label) = store.read_label(shape.id()) else {
            continue;
        };
        let label = label.trim();
        if label.is_empty() {
            debug!(shape = %shape.id(), "忽略空白标签");
            continue;
        }
        let ids = by_label.entry(label.to_string()).or_default();
        if !ids.contains(&shape.id()) {
            ids.push(shape.id());
        }
    }

    let conflicts: Vec<LabelConflict> = by_label
        .iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(label, ids)| LabelConflict {
            label: label.clone(),
            shapes: ids.clone(),
        })
        .collect();
    if !conflicts.is_empty() {
        for conflict in &conflicts {
            warn!(conflict = %conflict, "边界标签重复");
        }
        return Err(EngineError::DuplicateLabels { conflicts });
    }

    let mut entries: Vec<(String, ShapeId)> = by_label
        .into_iter()
        .map(|(label, mut ids)| (label, ids.remove(0)))
        .collect();
    entries.sort_by(|a, b| compare_identifiers(&a.0, &b.0));
    Ok(BoundaryMap { entries })
}
