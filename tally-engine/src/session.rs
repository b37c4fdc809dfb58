use serde::Serialize;
use tally_core::drawing::{Drawing, ShapeLabel};
use tally_core::measure::{DEFAULT_ARC_SEGMENTS, PolylineGeometry};
use tally_core::shape::{ClosedShape, ShapeCategory};
use tracing::{debug, info};

use crate::aggregate::{AreaAggregator, BoundaryAggregate};
use crate::assignment::LabelAssignment;
use crate::containment::{ContainmentTester, DEFAULT_TOLERANCE};
use crate::dimension::{DimensionRecord, DimensionRow, dimension_records, fallback_areas};
use crate::errors::EngineError;
use crate::labeling::{LabelReport, MemoryObjectData, build_boundary_map, label_workspaces};
use crate::summary::{
    CategoryTable, DEFAULT_ROW_TOLERANCE, GroupSummary, RowWarning, SummaryRow,
    group_and_summarize, resolve_duplicate_rows,
};

/// 引擎运行参数，通常由配置文件转换而来。
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub containment_tolerance: f64,
    pub row_tolerance: f64,
    pub arc_segments: usize,
    pub label_prefix: String,
    pub categories: CategoryTable,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            containment_tolerance: DEFAULT_TOLERANCE,
            row_tolerance: DEFAULT_ROW_TOLERANCE,
            arc_segments: DEFAULT_ARC_SEGMENTS,
            label_prefix: "W".to_string(),
            categories: CategoryTable::default(),
        }
    }
}

/// 一次汇总的完整结果，交给表格渲染或持久化协作方。
#[derive(Debug, Clone, Default, Serialize)]
pub struct AreaReport {
    pub dimensions: Vec<DimensionRow>,
    pub aggregates: Vec<BoundaryAggregate>,
    pub rows: Vec<SummaryRow>,
    pub groups: Vec<GroupSummary>,
    pub warnings: Vec<RowWarning>,
    /// 汇总时对象数据中的标签，按图形句柄排序。
    pub labels: Vec<ShapeLabel>,
}

impl AreaReport {
    /// 对已有汇总行（例如从已渲染表格读回的行）去重并分组。
    pub fn from_rows(rows: Vec<SummaryRow>, settings: &EngineSettings) -> Self {
        let (rows, warnings) = resolve_duplicate_rows(rows, settings.row_tolerance);
        let groups = group_and_summarize(&rows, &settings.categories);
        Self {
            rows,
            groups,
            warnings,
            ..Self::default()
        }
    }
}

/// 一次用户操作的工作上下文：图纸快照、对象数据与引擎参数。
#[derive(Debug)]
pub struct Session {
    drawing: Drawing,
    store: MemoryObjectData,
    geometry: PolylineGeometry,
    settings: EngineSettings,
    records: Vec<DimensionRecord>,
    report: Option<AreaReport>,
}

impl Session {
    pub fn new(drawing: Drawing, settings: EngineSettings) -> Self {
        let store = MemoryObjectData::from_labels(
            drawing
                .labels()
                .iter()
                .map(|entry| (entry.shape, entry.label.clone())),
        );
        let geometry = PolylineGeometry::with_arc_segments(settings.arc_segments);
        Self {
            drawing,
            store,
            geometry,
            settings,
            records: Vec::new(),
            report: None,
        }
    }

    #[inline]
    pub fn drawing(&self) -> &Drawing {
        &self.drawing
    }

    #[inline]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[inline]
    pub fn store(&self) -> &MemoryObjectData {
        &self.store
    }

    #[inline]
    pub fn dimension_records(&self) -> &[DimensionRecord] {
        &self.records
    }

    #[inline]
    pub fn report(&self) -> Option<&AreaReport> {
        self.report.as_ref()
    }

    /// 用参考线顶点为候选边界分配标签并写入对象数据。
    /// 清除范围覆盖快照中的全部图形。
    pub fn assign_labels(
        &mut self,
        prefix: &str,
    ) -> Result<(LabelAssignment, LabelReport), EngineError> {
        let tester =
            ContainmentTester::with_tolerance(&self.geometry, self.settings.containment_tolerance);
        let vertices = self.drawing.reference_vertices();
        let candidates: Vec<ClosedShape> = self
            .drawing
            .shapes_in(ShapeCategory::BoundaryCandidate)
            .cloned()
            .collect();
        let universe = self.drawing.shapes().iter().map(ClosedShape::id);

        let result = label_workspaces(
            &tester,
            &mut self.store,
            &vertices,
            &candidates,
            universe,
            prefix,
        )?;
        // 标签变化后旧汇总不再有效。
        self.report = None;
        Ok(result)
    }

    pub fn parse_dimensions(&mut self) -> &[DimensionRecord] {
        self.records = dimension_records(&self.drawing);
        debug!(count = self.records.len(), "尺寸注记解析完成");
        &self.records
    }

    /// 读取边界标签、汇总面积并分组。边界标签重复时整体失败。
    pub fn summarize(&mut self) -> Result<&AreaReport, EngineError> {
        if self.records.is_empty() {
            self.parse_dimensions();
        }
        let boundaries = build_boundary_map(&self.store, self.drawing.shapes())?;
        let aggregator = AreaAggregator::new(&self.geometry);
        let aggregates = aggregator.aggregate_all(
            &boundaries,
            self.drawing.shapes(),
            &fallback_areas(&self.records),
        );

        let rows: Vec<SummaryRow> = aggregates.iter().map(SummaryRow::from).collect();
        let mut report = AreaReport::from_rows(rows, &self.settings);
        report.aggregates = aggregates;
        report.dimensions = self.records.iter().map(DimensionRecord::to_row).collect();
        report.labels = self
            .store
            .snapshot()
            .into_iter()
            .map(|(shape, label)| ShapeLabel { shape, label })
            .collect();

        info!(
            boundaries = report.aggregates.len(),
            groups = report.groups.len(),
            warnings = report.warnings.len(),
            "面积汇总完成"
        );
        Ok(self.report.insert(report))
    }
}
