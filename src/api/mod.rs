// ==========================================
// 合金材料数据库 - API 层
// ==========================================
// 职责: 提供材料查询与管理员增删改接口（库内调用，不含 HTTP）
// ==========================================

pub mod error;
pub mod material_api;

pub use error::{ApiError, ApiResult};
pub use material_api::{MaterialApi, MaterialPage, MaterialQuery, DEFAULT_PER_PAGE};
