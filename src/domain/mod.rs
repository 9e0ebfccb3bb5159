// ==========================================
// 合金材料数据库 - 领域模型层
// ==========================================
// 职责: 定义材料记录、枚举类型、报告结构
// 红线: 不含文件访问逻辑,不含流水线逻辑
// ==========================================

pub mod material;
pub mod report;
pub mod types;

// 重导出核心类型
pub use material::{is_blank, sort_data_points, DataPoint, DataSeries, Material, Properties};
pub use report::{
    CrossMatch, DuplicatePair, DuplicateReport, FixSummary, IdAssignSummary, IngestBatch,
    IngestWarning, PathSummary, PlannedUpdate, Severity, UpdateOutcome, UpdatePlan,
    ValidationReport, ValidationSummary, Violation,
};
pub use types::{
    format_material_id, is_valid_material_id, parse_material_id, MaterialType, PropertyCategory,
    TypeCode, UpdateMode,
};
