use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tally_core::drawing::Drawing;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse snapshot {path:?}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize output: {0}")]
    SerializeError(#[source] serde_json::Error),
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

pub trait SnapshotLoader {
    fn load(&self, path: &Path) -> Result<Drawing, IoError>;
}

pub trait SnapshotSaver {
    fn save(&self, drawing: &Drawing, path: &Path) -> Result<(), IoError>;
}

/// 宿主导出的 JSON 图纸快照。
pub struct JsonSnapshot {
    pretty: bool,
}

impl JsonSnapshot {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// 紧凑输出，不换行缩进。
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    /// 从内存中的 JSON 文本解析快照；`origin` 仅用于错误信息。
    pub fn parse_str(&self, content: &str, origin: &Path) -> Result<Drawing, IoError> {
        let drawing: Drawing =
            serde_json::from_str(content).map_err(|source| IoError::ParseError {
                path: origin.to_path_buf(),
                source,
            })?;
        validate(&drawing)?;
        Ok(drawing)
    }
}

impl Default for JsonSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotLoader for JsonSnapshot {
    fn load(&self, path: &Path) -> Result<Drawing, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_str(&data, path)
    }
}

impl SnapshotSaver for JsonSnapshot {
    fn save(&self, drawing: &Drawing, path: &Path) -> Result<(), IoError> {
        write_json(drawing, path, self.pretty)
    }
}

/// 图形句柄必须唯一，既有标签必须指向快照中的图形。
fn validate(drawing: &Drawing) -> Result<(), IoError> {
    let mut seen = HashSet::new();
    for shape in drawing.shapes() {
        if !seen.insert(shape.id()) {
            return Err(IoError::InvalidSnapshot(format!(
                "图形句柄 {} 重复",
                shape.id()
            )));
        }
    }
    if let Some(orphan) = drawing
        .labels()
        .iter()
        .find(|entry| !seen.contains(&entry.shape))
    {
        return Err(IoError::InvalidSnapshot(format!(
            "标签 {} 指向不存在的图形 {}",
            orphan.label, orphan.shape
        )));
    }
    Ok(())
}

/// 以带缩进的 JSON 写出汇总报告或其他可序列化结果。
pub fn write_report<T: Serialize + ?Sized>(report: &T, path: &Path) -> Result<(), IoError> {
    write_json(report, path, true)
}

fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path, pretty: bool) -> Result<(), IoError> {
    let mut content = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(IoError::SerializeError)?;
    content.push('\n');
    fs::write(path, content).map_err(|source| IoError::WriteError {
        path: path.to_path_buf(),
        source,
    })
}
