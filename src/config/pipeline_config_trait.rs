// ==========================================
// 合金材料数据库 - 配置读取 Trait
// ==========================================
// 职责: 定义流水线所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::pipeline_config::PipelineConfig;
use crate::domain::types::UpdateMode;
use crate::importer::normalizer::NormalizerOptions;
use std::collections::BTreeMap;
use std::path::PathBuf;

// ==========================================
// PipelineConfigReader Trait
// ==========================================
// 用途: 导入流水线 / CRUD 所需的配置读取接口
// 实现者: ConfigManager, PipelineConfig（测试直接构造）
pub trait PipelineConfigReader {
    /// 数据文件路径
    fn data_file(&self) -> PathBuf;

    /// 备份目录（None: 与数据文件同目录）
    fn backup_dir(&self) -> Option<PathBuf>;

    /// 结构文件逻辑根目录
    ///
    /// # 默认值
    /// - "data"
    fn data_root(&self) -> String;

    /// 规范化操作开关
    fn normalizer_options(&self) -> NormalizerOptions;

    /// 附加数据来源标签映射
    fn data_source_aliases(&self) -> BTreeMap<String, String>;

    /// 主元素列表（其他元素导入时告警）
    fn primary_elements(&self) -> Vec<String>;

    fn default_update_mode(&self) -> UpdateMode;

    /// 管理员令牌（None: 禁止一切写操作）
    fn admin_token(&self) -> Option<String>;

    /// 是否替换不合规的旧 ID
    fn rewrite_nonconforming_ids(&self) -> bool;
}

impl PipelineConfigReader for PipelineConfig {
    fn data_file(&self) -> PathBuf {
        self.data_file.clone()
    }

    fn backup_dir(&self) -> Option<PathBuf> {
        self.backup_dir.clone()
    }

    fn data_root(&self) -> String {
        self.data_root.clone()
    }

    fn normalizer_options(&self) -> NormalizerOptions {
        self.normalizer
    }

    fn data_source_aliases(&self) -> BTreeMap<String, String> {
        self.data_source_aliases.clone()
    }

    fn primary_elements(&self) -> Vec<String> {
        self.primary_elements.clone()
    }

    fn default_update_mode(&self) -> UpdateMode {
        self.default_update_mode
    }

    fn admin_token(&self) -> Option<String> {
        self.admin_token.clone()
    }

    fn rewrite_nonconforming_ids(&self) -> bool {
        self.rewrite_nonconforming_ids
    }
}
