// ==========================================
// 合金材料数据库 - 引擎层
// ==========================================
// 职责: 合并 / 路径推导 / ID 分配
// 红线: 纯内存计算，不访问文件系统
// ==========================================

pub mod id_assigner;
pub mod merge_engine;
pub mod path_resolver;

pub use id_assigner::IdAssigner;
pub use merge_engine::{MergeEngine, MergeStats};
pub use path_resolver::{
    clean_invalid_paths, fill_missing_paths, upgrade_legacy_paths, PathExists, PathResolveError,
    PathResolver,
};
