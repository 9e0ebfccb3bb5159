// ==========================================
// 合金材料数据库 - 材料数据仓储
// ==========================================
// 存储: 单个 JSON 文件（Material 数组，2 空格缩进，UTF-8）
// 红线: Repository 不含业务逻辑；写入为整体替换（临时文件 + rename）
// ==========================================

use crate::domain::material::Material;
use crate::engine::path_resolver::PathExists;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ==========================================
// MaterialRepository Trait
// ==========================================
pub trait MaterialRepository {
    /// 读取全部记录（数据文件不存在时返回空集）
    fn load_all(&self) -> RepositoryResult<Vec<Material>>;

    /// 整体写入
    fn save_all(&self, materials: &[Material]) -> RepositoryResult<()>;

    /// 备份当前持久化状态，返回备份路径（数据文件不存在时返回 None）
    fn backup(&self) -> RepositoryResult<Option<PathBuf>>;
}

// ==========================================
// JsonFileRepository
// ==========================================
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    data_file: PathBuf,
    backup_dir: Option<PathBuf>,
}

impl JsonFileRepository {
    pub fn new<P: Into<PathBuf>>(data_file: P) -> Self {
        Self {
            data_file: data_file.into(),
            backup_dir: None,
        }
    }

    /// 指定备份目录（缺省为数据文件所在目录）
    pub fn with_backup_dir<P: Into<PathBuf>>(mut self, backup_dir: Option<P>) -> Self {
        self.backup_dir = backup_dir.map(Into::into);
        self
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    fn backup_path(&self) -> PathBuf {
        let file_name = self
            .data_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "materials.json".to_string());
        let backup_name = format!("{}.backup.{}", file_name, Utc::now().timestamp_millis());

        match &self.backup_dir {
            Some(dir) => dir.join(backup_name),
            None => self.data_file.with_file_name(backup_name),
        }
    }
}

impl MaterialRepository for JsonFileRepository {
    fn load_all(&self) -> RepositoryResult<Vec<Material>> {
        if !self.data_file.exists() {
            debug!(path = %self.data_file.display(), "数据文件不存在，按空集处理");
            return Ok(Vec::new());
        }

        let content =
            fs::read_to_string(&self.data_file).map_err(|e| RepositoryError::io(&self.data_file, e))?;
        let value: Value = serde_json::from_str(&content)?;
        let Value::Array(items) = value else {
            return Err(RepositoryError::InvalidStructure(format!(
                "{} 顶层必须是数组",
                self.data_file.display()
            )));
        };

        let materials = items
            .into_iter()
            .map(serde_json::from_value::<Material>)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = materials.len(), "读取材料数据");
        Ok(materials)
    }

    fn save_all(&self, materials: &[Material]) -> RepositoryResult<()> {
        let mut content = serde_json::to_string_pretty(materials)?;
        content.push('\n');

        if let Some(parent) = self.data_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RepositoryError::io(parent, e))?;
        }

        // 先写临时文件再 rename，失败时原文件保持不变
        let tmp = self.data_file.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| RepositoryError::io(&tmp, e))?;
        fs::rename(&tmp, &self.data_file).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            RepositoryError::io(&self.data_file, e)
        })?;

        info!(path = %self.data_file.display(), count = materials.len(), "材料数据已写入");
        Ok(())
    }

    fn backup(&self) -> RepositoryResult<Option<PathBuf>> {
        if !self.data_file.exists() {
            return Ok(None);
        }

        let target = self.backup_path();
        let fail = |message: String| RepositoryError::BackupFailed {
            path: target.display().to_string(),
            message,
        };
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).map_err(|e| fail(e.to_string()))?;
        }
        fs::copy(&self.data_file, &target).map_err(|e| fail(e.to_string()))?;

        info!(backup = %target.display(), "已创建备份");
        Ok(Some(target))
    }
}

// ==========================================
// FsPathExists - 文件系统存在性谓词
// ==========================================
// 逻辑路径相对 base_dir 解析（前导 / 忽略）
#[derive(Debug, Clone)]
pub struct FsPathExists {
    base_dir: PathBuf,
}

impl FsPathExists {
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl PathExists for FsPathExists {
    fn exists(&self, logical_path: &str) -> bool {
        self.base_dir
            .join(logical_path.trim_start_matches('/'))
            .exists()
    }
}
