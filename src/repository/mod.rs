// ==========================================
// 合金材料数据库 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 读写 JSON 数据文件与备份，屏蔽文件系统细节
// ==========================================

pub mod error;
pub mod material_repository;

pub use error::{RepositoryError, RepositoryResult};
pub use material_repository::{FsPathExists, JsonFileRepository, MaterialRepository};
