// ==========================================
// 合金材料数据库 - 配置层
// ==========================================
// 职责: 流水线配置加载，支持文件 + 环境变量覆写
// 存储: JSON 配置文件
// ==========================================

pub mod config_manager;
pub mod pipeline_config;
pub mod pipeline_config_trait;

pub use config_manager::{env_keys, ConfigError, ConfigManager, ConfigResult};
pub use pipeline_config::{PipelineConfig, DEFAULT_DATA_FILE, DEFAULT_DATA_ROOT};
pub use pipeline_config_trait::PipelineConfigReader;
