// ==========================================
// 合金材料数据库 - 配置管理器
// ==========================================
// 职责: 配置加载与环境变量覆写
// 查找顺序: 显式路径 → ./alloy-catalog.json
//          → <用户配置目录>/alloy-catalog/config.json → 内置默认值
// ==========================================

use crate::config::pipeline_config::PipelineConfig;
use crate::config::pipeline_config_trait::PipelineConfigReader;
use crate::domain::types::UpdateMode;
use crate::importer::normalizer::NormalizerOptions;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// 当前目录下的配置文件名
pub const LOCAL_CONFIG_FILE: &str = "alloy-catalog.json";

/// 环境变量键
pub mod env_keys {
    pub const DATA_FILE: &str = "ALLOY_CATALOG_DATA_FILE";
    pub const ADMIN_TOKEN: &str = "ADMIN_TOKEN";
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {0}")]
    NotFound(String),

    #[error("配置文件读取失败: path={path}, {message}")]
    Io { path: String, message: String },

    #[error("配置文件解析失败: path={path}, {message}")]
    Parse { path: String, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    config: PipelineConfig,
    source: Option<PathBuf>, // None: 内置默认值
}

impl ConfigManager {
    /// 从已有配置创建（不读取文件与环境变量）
    pub fn from_config(config: PipelineConfig) -> Self {
        Self {
            config,
            source: None,
        }
    }

    /// 按查找顺序加载配置，并应用环境变量覆写
    ///
    /// # 参数
    /// - explicit: 显式指定的配置文件（必须存在）
    pub fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        let mut manager = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()));
                }
                Self::from_file(path)?
            }
            None => match Self::candidate_paths().into_iter().find(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("未找到配置文件，使用内置默认值");
                    Self::default()
                }
            },
        };

        manager.apply_env_overrides(|key| std::env::var(key).ok());
        info!(
            source = %manager.source_description(),
            data_file = %manager.config.data_file.display(),
            "配置加载完成"
        );
        Ok(manager)
    }

    /// 读取单个配置文件
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: PipelineConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            config,
            source: Some(path.to_path_buf()),
        })
    }

    /// 隐式查找路径（按优先级）
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("alloy-catalog").join("config.json"));
        }
        paths
    }

    /// 环境变量覆写（lookup 便于测试注入）
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(data_file) = lookup(env_keys::DATA_FILE).filter(|v| !v.trim().is_empty()) {
            debug!(data_file = %data_file, "环境变量覆写数据文件");
            self.config.data_file = PathBuf::from(data_file.trim());
        }
        if let Some(token) = lookup(env_keys::ADMIN_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.config.admin_token = Some(token.trim().to_string());
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn source_description(&self) -> String {
        self.source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "内置默认值".to_string())
    }
}

impl PipelineConfigReader for ConfigManager {
    fn data_file(&self) -> PathBuf {
        self.config.data_file()
    }

    fn backup_dir(&self) -> Option<PathBuf> {
        self.config.backup_dir()
    }

    fn data_root(&self) -> String {
        self.config.data_root()
    }

    fn normalizer_options(&self) -> NormalizerOptions {
        self.config.normalizer_options()
    }

    fn data_source_aliases(&self) -> BTreeMap<String, String> {
        self.config.data_source_aliases()
    }

    fn primary_elements(&self) -> Vec<String> {
        self.config.primary_elements()
    }

    fn default_update_mode(&self) -> UpdateMode {
        self.config.default_update_mode()
    }

    fn admin_token(&self) -> Option<String> {
        self.config.admin_token()
    }

    fn rewrite_nonconforming_ids(&self) -> bool {
        self.config.rewrite_nonconforming_ids()
    }
}
