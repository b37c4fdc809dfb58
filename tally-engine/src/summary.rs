//! 汇总行的去重与分组。

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::aggregate::BoundaryAggregate;

/// 行字段比较的默认容差（公顷）。
pub const DEFAULT_ROW_TOLERANCE: f64 = 1e-4;

/// 单个作业区的汇总行，面积单位为公顷。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub identifier: String,
    pub existing_cut_ha: f64,
    pub existing_disposition_ha: f64,
    pub total_ha: f64,
    pub existing_cut_disturbance_ha: f64,
    pub new_cut_disturbance_ha: f64,
}

impl SummaryRow {
    fn fields(&self) -> [f64; 5] {
        [
            self.existing_cut_ha,
            self.existing_disposition_ha,
            self.total_ha,
            self.existing_cut_disturbance_ha,
            self.new_cut_disturbance_ha,
        ]
    }

    fn matches(&self, other: &SummaryRow, tolerance: f64) -> bool {
        self.fields()
            .iter()
            .zip(other.fields().iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

impl From<&BoundaryAggregate> for SummaryRow {
    fn from(aggregate: &BoundaryAggregate) -> Self {
        Self {
            identifier: aggregate.identifier.clone(),
            existing_cut_ha: aggregate.existing_cut_ha,
            existing_disposition_ha: aggregate.existing_disposition_ha,
            total_ha: aggregate.total_area_ha,
            existing_cut_disturbance_ha: aggregate.existing_cut_disturbance_ha,
            new_cut_disturbance_ha: aggregate.new_cut_disturbance_ha,
        }
    }
}

/// 同一编号出现数值不一致的行时给出的非致命警告。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowWarning {
    pub identifier: String,
    pub kept_total_ha: f64,
    pub discarded_total_ha: f64,
}

impl fmt::Display for RowWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: conflicting rows, kept total {:.3} ha over {:.3} ha",
            self.identifier, self.kept_total_ha, self.discarded_total_ha
        )
    }
}

/// 合并重复编号的行。数值在容差内一致则直接去重；不一致时保留总面积较大者并记录警告。
/// 输出保持各编号首次出现的顺序。
pub fn resolve_duplicate_rows(
    rows: Vec<SummaryRow>,
    tolerance: f64,
) -> (Vec<SummaryRow>, Vec<RowWarning>) {
    let mut resolved: Vec<SummaryRow> = Vec::with_capacity(rows.len());
    let mut warnings = Vec::new();

    for row in rows {
        let Some(index) = resolved
            .iter()
            .position(|candidate| candidate.identifier == row.identifier)
        else {
            resolved.push(row);
            continue;
        };
        let existing = &mut resolved[index];
        if existing.matches(&row, tolerance) {
            continue;
        }

        let (kept, discarded) = if row.total_ha > existing.total_ha {
            (row.total_ha, existing.total_ha)
        } else {
            (existing.total_ha, row.total_ha)
        };
        let warning = RowWarning {
            identifier: row.identifier.clone(),
            kept_total_ha: kept,
            discarded_total_ha: discarded,
        };
        warn!(warning = %warning, "汇总行重复且数值不一致");
        warnings.push(warning);
        if row.total_ha > existing.total_ha {
            *existing = row;
        }
    }

    (resolved, warnings)
}

/// 编号字母前缀到分组名称的对照表。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    prefixes: Vec<(String, String)>,
}

impl CategoryTable {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefixes: entries
                .into_iter()
                .map(|(prefix, name)| (prefix.into().to_ascii_uppercase(), name.into()))
                .collect(),
        }
    }

    /// 编号形如“字母前缀 + 数字”且前缀在表中时返回分组名，否则原样返回编号。
    pub fn category_for(&self, identifier: &str) -> String {
        let trimmed = identifier.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(trimmed.len());
        let (letters, rest) = trimmed.split_at(split);
        let numbered = rest.chars().next().is_some_and(|c| c.is_ascii_digit());
        if !letters.is_empty() && numbered {
            let key = letters.to_ascii_uppercase();
            if let Some((_, name)) = self.prefixes.iter().find(|(prefix, _)| *prefix == key) {
                return name.clone();
            }
        }
        identifier.to_string()
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::new([
            ("LD", "LOG DECK"),
            ("AR", "ACCESS ROAD"),
            ("W", "WORKSPACE"),
        ])
    }
}

/// 分组汇总。`key` 为空表示总计行。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: String,
    pub existing_cut_ha: f64,
    pub existing_disposition_ha: f64,
    pub total_ha: f64,
    pub existing_cut_disturbance_ha: f64,
    pub new_cut_disturbance_ha: f64,
}

impl GroupSummary {
    fn empty(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            existing_cut_ha: 0.0,
            existing_disposition_ha: 0.0,
            total_ha: 0.0,
            existing_cut_disturbance_ha: 0.0,
            new_cut_disturbance_ha: 0.0,
        }
    }

    fn add(&mut self, row: &SummaryRow) {
        self.existing_cut_ha += row.existing_cut_ha;
        self.existing_disposition_ha += row.existing_disposition_ha;
        self.total_ha += row.total_ha;
        self.existing_cut_disturbance_ha += row.existing_cut_disturbance_ha;
        self.new_cut_disturbance_ha += row.new_cut_disturbance_ha;
    }

    fn absorb(&mut self, other: &GroupSummary) {
        self.existing_cut_ha += other.existing_cut_ha;
        self.existing_disposition_ha += other.existing_disposition_ha;
        self.total_ha += other.total_ha;
        self.existing_cut_disturbance_ha += other.existing_cut_disturbance_ha;
        self.new_cut_disturbance_ha += other.new_cut_disturbance_ha;
    }

    #[inline]
    pub fn is_grand_total(&self) -> bool {
        self.key.is_empty()
    }
}

/// 按分组求和，分组按首次出现的顺序输出；分组数不少于 2 时末尾追加总计行。
pub fn group_and_summarize(rows: &[SummaryRow], table: &CategoryTable) -> Vec<GroupSummary> {
    let mut groups: Vec<GroupSummary> = Vec::new();
    for row in rows {
        let key = table.category_for(&row.identifier);
        match groups.iter_mut().find(|group| group.key == key) {
            Some(group) => group.add(row),
            None => {
                let mut group = GroupSummary::empty(key);
                group.add(row);
                groups.push(group);
            }
        }
    }

    if groups.len() > 1 {
        let mut total = GroupSummary::empty("");
        for group in &groups {
            total.absorb(group);
        }
        groups.push(total);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(identifier: &str, total: f64) -> SummaryRow {
        SummaryRow {
            identifier: identifier.to_string(),
            existing_cut_ha: 0.0,
            existing_disposition_ha: 0.0,
            total_ha: total,
            existing_cut_disturbance_ha: 0.0,
            new_cut_disturbance_ha: total,
        }
    }

    #[test]
    fn groups_by_prefix_with_grand_total() {
        let rows = vec![row("W1", 1.0), row("W2", 2.0), row("LD1", 0.5)];
        let groups = group_and_summarize(&rows, &CategoryTable::default());

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].key, "WORKSPACE");
        assert!((groups[0].total_ha - 3.0).abs() < 1e-12);
        assert_eq!(groups[1].key, "LOG DECK");
        assert!((groups[1].total_ha - 0.5).abs() < 1e-12);
        assert!(groups[2].is_grand_total());
        assert!((groups[2].total_ha - 3.5).abs() < 1e-12);
        assert!((groups[2].new_cut_disturbance_ha - 3.5).abs() < 1e-12);
    }

    #[test]
    fn single_group_has_no_grand_total() {
        let rows = vec![row("W1", 1.0), row("W2", 2.0)];
        let groups = group_and_summarize(&rows, &CategoryTable::default());
        assert_eq!(groups.len(), 1);
        assert!(!groups[0].is_grand_total());
    }

    #[test]
    fn unknown_prefixes_keep_their_identifier() {
        let table = CategoryTable::default();
        assert_eq!(table.category_for("AR12"), "ACCESS ROAD");
        assert_eq!(table.category_for("ld3"), "LOG DECK");
        assert_eq!(table.category_for("BP1"), "BP1");
        assert_eq!(table.category_for("WX1"), "WX1");
        assert_eq!(table.category_for("W"), "W");

        let rows = vec![row("BP1", 1.0), row("CAMP", 2.0)];
        let groups = group_and_summarize(&rows, &table);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["BP1", "CAMP", ""]);
    }

    #[test]
    fn identical_duplicates_collapse_silently() {
        let rows = vec![row("W1", 1.0), row("W1", 1.00005), row("W2", 2.0)];
        let (resolved, warnings) = resolve_duplicate_rows(rows, DEFAULT_ROW_TOLERANCE);
        assert_eq!(resolved.len(), 2);
        assert!(warnings.is_empty());
        assert_eq!(resolved[0].total_ha, 1.0);
    }

    #[test]
    fn conflicting_duplicates_keep_larger_total() {
        let rows = vec![row("W1", 1.0), row("W2", 2.0), row("W1", 1.5), row("W2", 1.0)];
        let (resolved, warnings) = resolve_duplicate_rows(rows, DEFAULT_ROW_TOLERANCE);

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].identifier, "W1");
        assert_eq!(resolved[0].total_ha, 1.5);
        assert_eq!(resolved[1].total_ha, 2.0);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].kept_total_ha, 1.5);
        assert_eq!(warnings[1].discarded_total_ha, 1.0);
        assert_eq!(
            warnings[0].to_string(),
            "W1: conflicting rows, kept total 1.500 ha over 1.000 ha"
        );
    }
}
