// ==========================================
// 合金材料数据库 - 核心库
// ==========================================
// 职责: 材料记录的导入、规范化、校验、去重与合并
// 数据: 单一 JSON 数组文件（2 空格缩进，UTF-8）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 记录与类型
pub mod domain;

// 数据仓储层 - 数据文件访问
pub mod repository;

// 引擎层 - 合并 / 路径 / ID
pub mod engine;

// 导入层 - 解析 / 映射 / 规范化 / 校验
pub mod importer;

// 配置层 - 流水线配置
pub mod config;

// 日志系统
pub mod logging;

// API 层 - 查询与管理接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{MaterialType, PropertyCategory, TypeCode, UpdateMode};

// 领域实体
pub use domain::{
    DataPoint, DataSeries, FixSummary, IngestBatch, Material, Properties, Severity,
    ValidationReport, Violation,
};

// 引擎
pub use engine::{IdAssigner, MergeEngine, PathResolver};

// 导入
pub use importer::{MaterialImporter, MaterialImporterImpl, Normalizer, Validator};

// API
pub use api::{MaterialApi, MaterialQuery};

// 配置
pub use config::{ConfigManager, PipelineConfig};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
