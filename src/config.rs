//! 会话配置：可选的 JSON/YAML 文件，缺省值与编辑器内置行为一致

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::data_core::AppError;
use crate::utils::fs::read_data_file;

/// 未设置 `file_base` 时输出文件的公共前缀
pub const DEFAULT_FILE_BASE: &str = "peacock_run_tmp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 合并时按路径补全缺失的 `type` 参数
    pub type_defaults: IndexMap<String, String>,
    pub default_file_base: String,
    /// trace / debug / info / warn / error
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let mut type_defaults = IndexMap::new();
        type_defaults.insert("/Mesh".to_string(), "FileMesh".to_string());
        type_defaults.insert("/Problem".to_string(), "FEProblem".to_string());
        Self {
            type_defaults,
            default_file_base: DEFAULT_FILE_BASE.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        read_data_file(path)
    }

    /// 不认识的级别回退到 INFO
    pub fn max_level(&self) -> tracing::Level {
        self.log_level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    }
}
