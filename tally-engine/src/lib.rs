pub mod aggregate;
pub mod assignment;
pub mod command;
pub mod containment;
pub mod dimension;
pub mod labeling;
pub mod session;
pub mod summary;

pub mod errors {
    use std::fmt;

    use tally_core::shape::ShapeId;
    use thiserror::Error;

    /// 同一标签被多个图形占用。
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct LabelConflict {
        pub label: String,
        pub shapes: Vec<ShapeId>,
    }

    impl fmt::Display for LabelConflict {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let ids: Vec<String> = self.shapes.iter().map(ShapeId::to_string).collect();
            write!(f, "{} -> {}", self.label, ids.join(", "))
        }
    }

    fn describe_conflicts(conflicts: &[LabelConflict]) -> String {
        conflicts
            .iter()
            .map(LabelConflict::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("reference vertex {index} ({label}) is not inside any candidate shape")]
        UnassignedVertex { index: usize, label: String },
        #[error("duplicate boundary labels: {}", describe_conflicts(.conflicts))]
        DuplicateLabels { conflicts: Vec<LabelConflict> },
        #[error("object data store rejected shape {shape}: {message}")]
        Store { shape: ShapeId, message: String },
    }
}

/// 面积单位换算与格式化。
pub mod units {
    /// 1 英亩对应的公顷数。
    pub const HECTARES_PER_ACRE: f64 = 0.4047;
    /// 图形单位（米）平方到公顷的换算除数。
    pub const SQUARE_UNITS_PER_HECTARE: f64 = 10_000.0;

    #[inline]
    pub fn hectares_to_acres(hectares: f64) -> f64 {
        hectares / HECTARES_PER_ACRE
    }

    #[inline]
    pub fn acres_to_hectares(acres: f64) -> f64 {
        acres * HECTARES_PER_ACRE
    }

    #[inline]
    pub fn square_units_to_hectares(area: f64) -> f64 {
        area / SQUARE_UNITS_PER_HECTARE
    }

    /// 保留三位小数。
    #[inline]
    pub fn round_area(value: f64) -> f64 {
        (value * 1_000.0).round() / 1_000.0
    }

    /// 固定三位小数输出，与区域设置无关；避免出现 `-0.000`。
    pub fn format_area(value: f64) -> String {
        let rounded = round_area(value);
        if rounded == 0.0 {
            "0.000".to_string()
        } else {
            format!("{rounded:.3}")
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn hectare_acre_conversion() {
            assert_eq!(format_area(hectares_to_acres(0.4047)), "1.000");
            assert_eq!(format_area(hectares_to_acres(1.0)), "2.471");
            assert!((acres_to_hectares(hectares_to_acres(3.25)) - 3.25).abs() < 1e-12);
        }

        #[test]
        fn formatting_is_fixed_point() {
            assert_eq!(format_area(0.05), "0.050");
            assert_eq!(format_area(-0.0001), "0.000");
            assert_eq!(format_area(12.3456), "12.346");
            assert_eq!(format_area(square_units_to_hectares(500.0)), "0.050");
        }
    }
}

/// 编号的自然排序：字母前缀按字典序，数字部分按数值（W2 排在 W10 之前）。
pub mod ordering {
    use std::cmp::Ordering;

    fn split_identifier(identifier: &str) -> (&str, Option<u64>, &str) {
        let digits_start = identifier
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(identifier.len());
        let (prefix, rest) = identifier.split_at(digits_start);
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (digits, tail) = rest.split_at(digits_end);
        (prefix, digits.parse().ok(), tail)
    }

    pub fn compare_identifiers(left: &str, right: &str) -> Ordering {
        let (left_prefix, left_number, left_tail) = split_identifier(left);
        let (right_prefix, right_number, right_tail) = split_identifier(right);
        left_prefix
            .cmp(right_prefix)
            .then_with(|| left_number.cmp(&right_number))
            .then_with(|| left_tail.cmp(right_tail))
            .then_with(|| left.cmp(right))
    }

}
