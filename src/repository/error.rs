// ==========================================
// 合金材料数据库 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("文件读写失败 ({path}): {message}")]
    Io { path: String, message: String },

    #[error("JSON 序列化失败: {0}")]
    Serialization(String),

    #[error("数据文件结构错误: {0}")]
    InvalidStructure(String),

    #[error("备份失败 ({path}): {message}")]
    BackupFailed { path: String, message: String },
}

impl RepositoryError {
    pub fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        RepositoryError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
