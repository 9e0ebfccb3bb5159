// ==========================================
// 合金材料数据库 - 报告与汇总结构
// ==========================================
// 职责: 校验报告 / 修复汇总 / 导入警告 / 更新计划
// 红线: 汇总值由每个阶段显式返回，不使用全局计数器
// ==========================================

use crate::domain::material::Material;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Severity - 违规级别
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical, // 严重（阻断入库）
    Warning,  // 警告（允许入库）
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

// ==========================================
// Violation - 校验违规记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub record_index: usize,           // 批次内记录序号（0 起）
    pub material_id: Option<String>,   // 材料 ID（如果存在）
    pub material_name: String,         // 显示名称
    pub severity: Severity,            // 违规级别
    pub field: String,                 // 违规字段（数据点内为 data[i].xxx）
    pub message: String,               // 违规描述
}

impl Violation {
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

// ==========================================
// ValidationReport - 校验报告
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_records: usize, // 记录总数
    pub admissible: usize,    // 可入库（无 critical）
    pub critical: usize,      // critical 违规数
    pub warning: usize,       // warning 违规数
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub summary: ValidationSummary,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn has_critical(&self) -> bool {
        self.summary.critical > 0
    }

    pub fn critical(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_critical())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| !v.is_critical())
    }

    /// 某条记录的违规明细
    pub fn for_record(&self, index: usize) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.record_index == index)
    }
}

// ==========================================
// FixSummary - 规范化修复汇总
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixSummary {
    pub total_materials: usize,      // 处理记录数
    pub changed_materials: usize,    // 发生变化的记录数
    pub field_renames: usize,        // 字段重命名（ori_source → source）
    pub type_fixes: usize,           // 类型值修正
    pub data_source_fixes: usize,    // 数据来源标签修正
    pub path_normalizations: usize,  // 路径规范化
    pub empty_fields_removed: usize, // 删除的空字段
    pub composition_derived: usize,  // 由 composition 派生 elements/atomCount
    pub data_reordered: usize,       // 数据点重新排序
    pub paths_filled: usize,         // 补全的 poscar 路径
}

impl FixSummary {
    /// 修复动作总数（不含记录计数）
    pub fn total_changes(&self) -> usize {
        self.field_renames
            + self.type_fixes
            + self.data_source_fixes
            + self.path_normalizations
            + self.empty_fields_removed
            + self.composition_derived
            + self.data_reordered
            + self.paths_filled
    }

    pub fn is_clean(&self) -> bool {
        self.total_changes() == 0
    }

    /// 累加另一份汇总
    pub fn absorb(&mut self, other: &FixSummary) {
        self.total_materials += other.total_materials;
        self.changed_materials += other.changed_materials;
        self.field_renames += other.field_renames;
        self.type_fixes += other.type_fixes;
        self.data_source_fixes += other.data_source_fixes;
        self.path_normalizations += other.path_normalizations;
        self.empty_fields_removed += other.empty_fields_removed;
        self.composition_derived += other.composition_derived;
        self.data_reordered += other.data_reordered;
        self.paths_filled += other.paths_filled;
    }
}

// ==========================================
// IngestWarning - 导入警告
// ==========================================
// 单元格解析失败 / 非主元素等，不阻断导入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestWarning {
    pub row_number: usize,       // 原始文件行号（0 表示非行级）
    pub column: Option<String>,  // 列名
    pub message: String,
}

// ==========================================
// IngestBatch - 导入批次结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestBatch {
    pub batch_id: String,               // 批次 ID（UUID）
    pub file_name: Option<String>,      // 源文件名
    pub total_rows: usize,              // 数据行数（JSON 输入为记录数）
    pub materials: Vec<Material>,       // 规范化后的记录
    pub warnings: Vec<IngestWarning>,   // 导入警告
    pub fix_summary: FixSummary,        // 规范化汇总
    pub report: ValidationReport,       // 校验报告
    pub elapsed_time: std::time::Duration,
}

// ==========================================
// 重复检测 / 更新计划
// ==========================================

/// 同批次重复: duplicate 与 first 共享身份键
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicatePair {
    pub first_index: usize,
    pub duplicate_index: usize,
    pub key: String,
}

/// 跨批次匹配: incoming 命中 existing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossMatch {
    pub incoming_index: usize,
    pub existing_index: usize,
    pub existing_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub intra_batch: Vec<DuplicatePair>,
    pub cross_batch: Vec<CrossMatch>,
}

impl DuplicateReport {
    pub fn is_empty(&self) -> bool {
        self.intra_batch.is_empty() && self.cross_batch.is_empty()
    }
}

/// 更新计划: 命中已有记录的更新 + 新增记录
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePlan {
    pub updates: Vec<PlannedUpdate>,
    pub additions: Vec<Material>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpdate {
    pub existing_index: usize,
    pub incoming: Material,
}

impl UpdatePlan {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.additions.is_empty()
    }
}

// ==========================================
// 维护任务汇总
// ==========================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSummary {
    pub filled: usize,    // 新补全
    pub upgraded: usize,  // 旧格式升级
    pub removed: usize,   // 无效路径删除
    pub unresolved: usize, // 无法推导
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAssignSummary {
    pub assigned: usize,  // 新分配
    pub rewritten: usize, // 替换不合规 ID
    pub skipped: usize,   // 类型非法，未分配
}

/// 更新入库结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub updated: usize,
    pub added: usize,
    pub backup_path: Option<String>,
    pub ids: IdAssignSummary,
}
