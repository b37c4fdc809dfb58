use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub categories: CategoryConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.engine.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `TALLY_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("TALLY_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 引擎容差与标签前缀。
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "EngineConfig::default_containment_tolerance")]
    pub containment_tolerance: f64,
    #[serde(default = "EngineConfig::default_row_tolerance")]
    pub row_tolerance: f64,
    #[serde(default = "EngineConfig::default_arc_segments")]
    pub arc_segments: usize,
    #[serde(default = "EngineConfig::default_label_prefix")]
    pub label_prefix: String,
}

impl EngineConfig {
    fn default_containment_tolerance() -> f64 {
        1e-7
    }

    fn default_row_tolerance() -> f64 {
        1e-4
    }

    fn default_arc_segments() -> usize {
        16
    }

    fn default_label_prefix() -> String {
        "W".to_string()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = |value: f64| value.is_finite() && value > 0.0;
        if !positive(self.containment_tolerance) {
            return Err(ConfigError::Invalid {
                field: "engine.containment_tolerance",
                message: format!("必须为正数，实际为 {}", self.containment_tolerance),
            });
        }
        if !(self.row_tolerance.is_finite() && self.row_tolerance >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "engine.row_tolerance",
                message: format!("不能为负数，实际为 {}", self.row_tolerance),
            });
        }
        if self.arc_segments == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.arc_segments",
                message: "至少为 1".to_string(),
            });
        }
        if self.label_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "engine.label_prefix",
                message: "不能为空".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            containment_tolerance: Self::default_containment_tolerance(),
            row_tolerance: Self::default_row_tolerance(),
            arc_segments: Self::default_arc_segments(),
            label_prefix: Self::default_label_prefix(),
        }
    }
}

/// 编号前缀到分组名称的对照表；配置中出现该表时整体替换默认值。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct CategoryConfig {
    pub prefixes: BTreeMap<String, String>,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        let prefixes = [("LD", "LOG DECK"), ("AR", "ACCESS ROAD"), ("W", "WORKSPACE")]
            .into_iter()
            .map(|(prefix, name)| (prefix.to_string(), name.to_string()))
            .collect();
        Self { prefixes }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("配置项 {field} 无效: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
