use tally_engine::dimension::DimensionRow;
use tally_engine::session::AreaReport;
use tally_engine::summary::GroupSummary;
use tally_engine::units::{format_area, hectares_to_acres};

const GRAND_TOTAL: &str = "TOTAL";

fn pad_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    out.push_str(line.join(" | ").trim_end());
    out.push('\n');
}

fn render_table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|title| title.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = header.iter().map(|title| title.to_string()).collect();
    pad_row(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');
    for row in rows {
        pad_row(&mut out, row, &widths);
    }
    out
}

/// 尺寸注记表：编号、原文、宽、长、公顷、英亩。
pub fn render_dimension_table(rows: &[DimensionRow]) -> String {
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            vec![
                row.identifier.clone(),
                row.text.clone(),
                row.width.clone(),
                row.length.clone(),
                row.area_ha.clone(),
                row.area_ac.clone(),
            ]
        })
        .collect();
    render_table(
        &["ID", "TEXT", "WIDTH", "LENGTH", "AREA (ha)", "AREA (ac)"],
        &body,
    )
}

fn ha_ac(value: f64) -> [String; 2] {
    [format_area(value), format_area(hectares_to_acres(value))]
}

/// 边界汇总表与分组表。
pub fn render_summary_table(report: &AreaReport) -> String {
    let header = [
        "ID",
        "TOTAL (ha)",
        "TOTAL (ac)",
        "EXISTING CUT (ha)",
        "EXISTING DISPOSITION (ha)",
        "EXISTING DISTURBANCE (ha)",
        "EXISTING DISTURBANCE (ac)",
        "NEW CUT (ha)",
        "NEW CUT (ac)",
        "WITHIN DISPOSITION",
    ];
    let body: Vec<Vec<String>> = report
        .rows
        .iter()
        .map(|row| {
            let within = report
                .aggregates
                .iter()
                .find(|aggregate| aggregate.identifier == row.identifier)
                .map(|aggregate| aggregate.within_disposition.to_string())
                .unwrap_or_else(|| "N/A".to_string());
            let [total_ha, total_ac] = ha_ac(row.total_ha);
            let [existing_ha, existing_ac] = ha_ac(row.existing_cut_disturbance_ha);
            let [new_ha, new_ac] = ha_ac(row.new_cut_disturbance_ha);
            vec![
                row.identifier.clone(),
                total_ha,
                total_ac,
                format_area(row.existing_cut_ha),
                format_area(row.existing_disposition_ha),
                existing_ha,
                existing_ac,
                new_ha,
                new_ac,
                within,
            ]
        })
        .collect();

    let mut out = render_table(&header, &body);
    if !report.groups.is_empty() {
        out.push('\n');
        out.push_str(&render_group_table(&report.groups));
    }
    out
}

fn render_group_table(groups: &[GroupSummary]) -> String {
    let body: Vec<Vec<String>> = groups
        .iter()
        .map(|group| {
            let key = if group.is_grand_total() {
                GRAND_TOTAL.to_string()
            } else {
                group.key.clone()
            };
            let [total_ha, total_ac] = ha_ac(group.total_ha);
            let [existing_ha, existing_ac] = ha_ac(group.existing_cut_disturbance_ha);
            let [new_ha, new_ac] = ha_ac(group.new_cut_disturbance_ha);
            vec![
                key,
                total_ha,
                total_ac,
                existing_ha,
                existing_ac,
                new_ha,
                new_ac,
            ]
        })
        .collect();
    render_table(
        &[
            "GROUP",
            "TOTAL (ha)",
            "TOTAL (ac)",
            "EXISTING DISTURBANCE (ha)",
            "EXISTING DISTURBANCE (ac)",
            "NEW CUT (ha)",
            "NEW CUT (ac)",
        ],
        &body,
    )
}
