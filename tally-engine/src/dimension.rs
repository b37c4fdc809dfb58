//! 从自由书写的注记中提取临时作业区的宽、长与面积。
//!
//! 判定顺序固定：不规则面积标记 `/P=`（或 `\P=`）优先，其次是 `宽 x 长`
//! 形式，最后把文字中的全部数字拼接为不规则面积。解析永不失败，
//! 无法识别的输入退化为 `N/A` / `irregular`。

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tally_core::drawing::AttributeSource;
use tracing::{debug, warn};

use crate::ordering::compare_identifiers;
use crate::units::{format_area, hectares_to_acres, square_units_to_hectares};

/// 显式面积与宽×长计算值之间允许的差。
const AREA_MISMATCH_TOLERANCE: f64 = 1e-6;

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?|\.\d+").expect("number pattern is valid"));

static IRREGULAR_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[/\\]P=").expect("marker pattern is valid"));

// 候选分隔符：x / × 连同紧贴在其前后的字母串。
static SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([a-z]*)([x×])([a-z]*)").expect("separator pattern is valid")
});

/// 宽或长。保留书写时的原文，便于回填表格。
#[derive(Debug, Clone, PartialEq)]
pub enum Measure {
    Value { value: f64, literal: String },
    Irregular,
    Missing,
}

impl Measure {
    pub fn value(&self) -> Option<f64> {
        match self {
            Measure::Value { value, .. } => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::Value { literal, .. } => f.write_str(literal),
            Measure::Irregular => f.write_str("irregular"),
            Measure::Missing => f.write_str("N/A"),
        }
    }
}

/// 面积（公顷）。`Literal` 为拼接后无法解析成数值的原文。
#[derive(Debug, Clone, PartialEq)]
pub enum AreaValue {
    Hectares(f64),
    Literal(String),
    NotAvailable,
}

impl AreaValue {
    pub fn hectares(&self) -> Option<f64> {
        match self {
            AreaValue::Hectares(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for AreaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AreaValue::Hectares(value) => f.write_str(&format_area(*value)),
            AreaValue::Literal(raw) => f.write_str(raw),
            AreaValue::NotAvailable => f.write_str("N/A"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// 由宽×长计算。
    Computed,
    /// 直接取自文字中的数值。
    Extracted,
    /// 无法识别，面积为 N/A。
    Unparsable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionRecord {
    pub identifier: String,
    pub source: String,
    pub width: Measure,
    pub length: Measure,
    pub area: AreaValue,
    pub provenance: Provenance,
}

impl DimensionRecord {
    #[inline]
    pub fn area_ha(&self) -> Option<f64> {
        self.area.hectares()
    }

    #[inline]
    pub fn area_ac(&self) -> Option<f64> {
        self.area_ha().map(hectares_to_acres)
    }

    /// 表格行视图，所有数值已格式化。
    pub fn to_row(&self) -> DimensionRow {
        DimensionRow {
            identifier: self.identifier.clone(),
            text: self.source.clone(),
            width: self.width.to_string(),
            length: self.length.to_string(),
            area_ha: self.area.to_string(),
            area_ac: self
                .area_ac()
                .map(format_area)
                .unwrap_or_else(|| "N/A".to_string()),
            provenance: self.provenance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionRow {
    pub identifier: String,
    pub text: String,
    pub width: String,
    pub length: String,
    pub area_ha: String,
    pub area_ac: String,
    pub provenance: Provenance,
}

#[derive(Debug, Clone)]
struct Number {
    value: f64,
    literal: String,
}

impl Number {
    fn measure(&self) -> Measure {
        Measure::Value {
            value: self.value,
            literal: self.literal.clone(),
        }
    }
}

struct Parsed {
    width: Measure,
    length: Measure,
    area: AreaValue,
    provenance: Provenance,
}

fn numbers(text: &str) -> Vec<Number> {
    NUMBER
        .find_iter(text)
        .filter_map(|found| {
            found.as_str().parse::<f64>().ok().map(|value| Number {
                value,
                literal: found.as_str().to_string(),
            })
        })
        .collect()
}

/// 宽长分隔符的位置。`x` 须单独成词，或只带紧随数字的单位（`10ftx50`）；
/// 前面要有数字，后面也要有数字。"EXISTING" 之类的单词不会被拆开。
fn find_separator(text: &str) -> Option<(usize, usize)> {
    let has_digit = |part: &str| part.chars().any(|c| c.is_ascii_digit());
    SEPARATOR.captures_iter(text).find_map(|caps| {
        let unit = caps.get(1)?;
        let mark = caps.get(2)?;
        if caps.get(3).is_some_and(|tail| !tail.as_str().is_empty()) {
            return None;
        }
        let before = &text[..unit.start()];
        if !has_digit(before) || !has_digit(&text[mark.end()..]) {
            return None;
        }
        let unit_follows_number = before
            .trim_end()
            .ends_with(|c: char| c.is_ascii_digit() || c == '.');
        if !unit.as_str().is_empty() && !unit_follows_number {
            return None;
        }
        Some((mark.start(), mark.end()))
    })
}

pub fn parse_dimension(text: &str) -> DimensionRecord {
    parse_dimension_for("", text)
}

pub fn parse_dimension_for(identifier: &str, text: &str) -> DimensionRecord {
    let parsed = if let Some(marker) = IRREGULAR_MARKER.find(text) {
        parse_irregular(&text[marker.end()..])
    } else if let Some((start, end)) = find_separator(text) {
        parse_width_by_length(&text[..start], &text[end..])
    } else {
        parse_loose(text)
    };

    debug!(
        identifier,
        text,
        provenance = ?parsed.provenance,
        "解析尺寸注记"
    );
    DimensionRecord {
        identifier: identifier.to_string(),
        source: text.to_string(),
        width: parsed.width,
        length: parsed.length,
        area: parsed.area,
        provenance: parsed.provenance,
    }
}

fn parse_irregular(after_marker: &str) -> Parsed {
    match numbers(after_marker).last() {
        Some(number) => Parsed {
            width: Measure::Irregular,
            length: Measure::Irregular,
            area: AreaValue::Hectares(number.value),
            provenance: Provenance::Extracted,
        },
        None => Parsed {
            width: Measure::Irregular,
            length: Measure::Irregular,
            area: AreaValue::NotAvailable,
            provenance: Provenance::Unparsable,
        },
    }
}

fn parse_width_by_length(first: &str, second: &str) -> Parsed {
    let width = numbers(first).pop();
    let trailing = numbers(second);
    let length = trailing.first().cloned();
    let explicit = if trailing.len() > 1 {
        trailing.last().map(|number| number.value)
    } else {
        None
    };

    let computed = match (&width, &length) {
        (Some(w), Some(l)) if w.value > 0.0 && l.value > 0.0 => {
            Some(square_units_to_hectares(w.value * l.value))
        }
        _ => None,
    };

    match (computed, explicit) {
        (Some(computed), Some(explicit))
            if (computed - explicit).abs() > AREA_MISMATCH_TOLERANCE =>
        {
            Parsed {
                width: Measure::Irregular,
                length: Measure::Irregular,
                area: AreaValue::Hectares(explicit),
                provenance: Provenance::Extracted,
            }
        }
        (Some(computed), _) => Parsed {
            width: width.as_ref().map_or(Measure::Missing, Number::measure),
            length: length.as_ref().map_or(Measure::Missing, Number::measure),
            area: AreaValue::Hectares(computed),
            provenance: Provenance::Computed,
        },
        (None, Some(explicit)) => Parsed {
            width: Measure::Irregular,
            length: Measure::Irregular,
            area: AreaValue::Hectares(explicit),
            provenance: Provenance::Extracted,
        },
        (None, None) => Parsed {
            width: width.as_ref().map_or(Measure::Missing, Number::measure),
            length: length.as_ref().map_or(Measure::Missing, Number::measure),
            area: AreaValue::NotAvailable,
            provenance: Provenance::Unparsable,
        },
    }
}

fn parse_loose(text: &str) -> Parsed {
    let found = numbers(text);
    if found.is_empty() {
        return Parsed {
            width: Measure::Missing,
            length: Measure::Missing,
            area: AreaValue::NotAvailable,
            provenance: Provenance::Unparsable,
        };
    }

    let joined: String = found.iter().map(|number| number.literal.as_str()).collect();
    let area = match joined.parse::<f64>() {
        Ok(value) => AreaValue::Hectares(value),
        Err(_) => AreaValue::Literal(joined),
    };
    Parsed {
        width: Measure::Irregular,
        length: Measure::Irregular,
        area,
        provenance: Provenance::Extracted,
    }
}

/// 收集属性对并逐条解析，结果按编号自然顺序排列。
pub fn dimension_records<S: AttributeSource + ?Sized>(source: &S) -> Vec<DimensionRecord> {
    let mut records: Vec<DimensionRecord> = source
        .collect_attribute_pairs()
        .into_iter()
        .map(|pair| parse_dimension_for(&pair.identifier, &pair.text))
        .collect();
    records.sort_by(|a, b| compare_identifiers(&a.identifier, &b.identifier));
    records
}

/// 每个编号的注记面积（公顷），供边界面积不可用时回退。
/// 同一编号出现多条不同面积时取较大值并给出警告。
pub fn fallback_areas(records: &[DimensionRecord]) -> HashMap<String, f64> {
    let mut areas: HashMap<String, f64> = HashMap::new();
    for record in records {
        let Some(area) = record.area_ha() else {
            continue;
        };
        match areas.get_mut(&record.identifier) {
            Some(existing) => {
                if (*existing - area).abs() > AREA_MISMATCH_TOLERANCE {
                    warn!(
                        identifier = %record.identifier,
                        first = *existing,
                        second = area,
                        "同一编号存在不同的注记面积，取较大值"
                    );
                    *existing = existing.max(area);
                }
            }
            None => {
                areas.insert(record.identifier.clone(), area);
            }
        }
    }
    areas
}
