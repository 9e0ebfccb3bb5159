// ==========================================
// 合金材料数据库 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository错误为用户友好的错误消息
// ==========================================

use crate::domain::report::Violation;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 权限错误
    // ==========================================
    #[error("未授权: {0}")]
    Unauthorized(String),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 校验失败（携带全部违规明细）
    #[error("数据校验失败: {} 条 critical 违规", critical_count(.violations))]
    ValidationFailed { violations: Vec<Violation> },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("存储错误: {0}")]
    Repository(String),
}

fn critical_count(violations: &[Violation]) -> usize {
    violations.iter().filter(|v| v.is_critical()).count()
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            other => ApiError::Repository(other.to_string()),
        }
    }
}

/// API层Result类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_not_found_maps_to_not_found() {
        let err: ApiError = RepositoryError::NotFound {
            entity: "Material".to_string(),
            id: "Alloy-E-00001".to_string(),
        }
        .into();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(err.to_string().contains("Alloy-E-00001"));
    }

    #[test]
    fn test_other_repository_errors_wrap() {
        let err: ApiError = RepositoryError::InvalidStructure("顶层必须是数组".to_string()).into();
        assert!(matches!(err, ApiError::Repository(_)));
    }
}
