// ==========================================
// 合金材料数据库 - 流水线配置
// ==========================================
// 存储: JSON 配置文件（缺省键取默认值）
// ==========================================

use crate::domain::types::UpdateMode;
use crate::importer::normalizer::NormalizerOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 默认数据文件
pub const DEFAULT_DATA_FILE: &str = "backend/data/materials.json";

/// 默认结构文件根目录（逻辑路径）
pub const DEFAULT_DATA_ROOT: &str = "data";

/// 默认主元素
pub const DEFAULT_PRIMARY_ELEMENTS: [&str; 7] = ["Al", "Ni", "Cu", "Zr", "Nb", "Ta", "W"];

// ==========================================
// PipelineConfig
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_file: PathBuf,
    pub backup_dir: Option<PathBuf>, // None: 与数据文件同目录
    pub data_root: String,
    pub normalizer: NormalizerOptions,
    pub data_source_aliases: BTreeMap<String, String>, // 覆盖内置标签表
    pub primary_elements: Vec<String>,
    pub default_update_mode: UpdateMode,
    pub admin_token: Option<String>,
    pub rewrite_nonconforming_ids: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            backup_dir: None,
            data_root: DEFAULT_DATA_ROOT.to_string(),
            normalizer: NormalizerOptions::default(),
            data_source_aliases: BTreeMap::new(),
            primary_elements: DEFAULT_PRIMARY_ELEMENTS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            default_update_mode: UpdateMode::Full,
            admin_token: None,
            rewrite_nonconforming_ids: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"data_root": "structures", "normalizer": {"prune_empty": false}}"#,
        )
        .unwrap();

        assert_eq!(config.data_root, "structures");
        assert_eq!(config.data_file, PathBuf::from(DEFAULT_DATA_FILE));
        assert!(!config.normalizer.prune_empty);
        assert!(config.normalizer.field_rename);
        assert_eq!(config.primary_elements.len(), 7);
        assert_eq!(config.default_update_mode, UpdateMode::Full);
    }

    #[test]
    fn test_update_mode_kebab_case() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"default_update_mode": "add-temp"}"#).unwrap();
        assert_eq!(config.default_update_mode, UpdateMode::AddTemp);
    }
}
