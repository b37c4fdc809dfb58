use std::fs;
use std::path::PathBuf;

use serde_json::Value;
use tally_core::shape::ShapeId;
use tally_engine::command::{CommandBus, CommandContext, CommandRequest};
use tally_engine::session::{EngineSettings, Session};
use tally_io::{JsonSnapshot, SnapshotLoader, write_report};

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

fn load_session() -> Session {
    let drawing = JsonSnapshot::new()
        .load(&fixture("site_snapshot.json"))
        .expect("读取快照失败");
    Session::new(drawing, EngineSettings::default())
}

#[test]
fn snapshot_loads_with_existing_labels() {
    let session = load_session();
    assert_eq!(session.drawing().shapes().len(), 6);
    assert_eq!(session.drawing().reference_points().len(), 2);
    assert_eq!(session.store().len(), 2);
}

#[test]
fn full_pipeline_produces_grouped_report() {
    let mut session = load_session();
    let bus = CommandBus::new();
    let mut context = CommandContext {
        session: &mut session,
    };

    for request in [
        CommandRequest::new("assign_labels").with_arg("W"),
        CommandRequest::new("parse_dimensions"),
        CommandRequest::new("summarize"),
    ] {
        let response = bus.dispatch(&request, &mut context);
        assert!(response.success, "{}: {:?}", request.name, response.message);
    }

    // W9 在非候选图形上，被同前缀的清除步骤移除；LD1 保留。
    let labels = session.store().snapshot();
    assert_eq!(
        labels,
        vec![
            (ShapeId::new(1), "W1".to_string()),
            (ShapeId::new(2), "W2".to_string()),
            (ShapeId::new(3), "LD1".to_string()),
        ]
    );

    let report = session.report().expect("汇总结果缺失");
    let identifiers: Vec<&str> = report
        .aggregates
        .iter()
        .map(|aggregate| aggregate.identifier.as_str())
        .collect();
    assert_eq!(identifiers, vec!["LD1", "W1", "W2"]);

    let w1 = &report.aggregates[1];
    assert!((w1.total_area_ha - 1.0).abs() < 1e-9);
    assert_eq!(w1.within_disposition.to_string(), "0.400");
    let w2 = &report.aggregates[2];
    assert!((w2.existing_cut_ha - 0.1).abs() < 1e-9);
    assert!((w2.new_cut_disturbance_ha - 0.4).abs() < 1e-9);

    let keys: Vec<&str> = report.groups.iter().map(|group| group.key.as_str()).collect();
    assert_eq!(keys, vec!["LOG DECK", "WORKSPACE", ""]);
    assert!((report.groups[2].total_ha - 1.7).abs() < 1e-9);

    assert_eq!(report.dimensions.len(), 3);
    assert_eq!(report.dimensions[0].identifier, "LD1");
    assert_eq!(report.dimensions[0].width, "irregular");
    assert_eq!(report.dimensions[0].area_ha, "0.200");
    assert!(report.warnings.is_empty());
}

#[test]
fn report_is_written_as_json() {
    let mut session = load_session();
    session.assign_labels("W").expect("分配标签失败");
    let report = session.summarize().expect("汇总失败").clone();

    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join("report.json");
    write_report(&report, &path).expect("写出报告失败");

    let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["aggregates"][1]["identifier"], "W1");
    assert_eq!(written["aggregates"][1]["within_disposition"], "0.400");
    assert_eq!(written["aggregates"][0]["within_disposition"], "No");
    assert_eq!(written["groups"].as_array().map(Vec::len), Some(3));
    assert_eq!(written["labels"].as_array().map(Vec::len), Some(3));
}

#[test]
fn missing_snapshot_reports_read_error() {
    let err = JsonSnapshot::new()
        .load(&fixture("does_not_exist.json"))
        .unwrap_err();
    assert!(matches!(err, tally_io::IoError::ReadError { .. }));
}
