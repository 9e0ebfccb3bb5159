// ==========================================
// 合金材料数据库 - 导入流水线 Trait
// ==========================================
// 职责: 定义流水线各阶段接口（不包含实现）
// 流程: 文件解析 → 字段映射 → 规范化 → 校验 → 身份匹配 → 合并
// ==========================================

use crate::domain::material::Material;
use crate::domain::report::{
    DuplicatePair, CrossMatch, FixSummary, IngestBatch, IngestWarning, UpdateOutcome,
    UpdatePlan, ValidationReport, Violation,
};
use crate::domain::types::UpdateMode;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::RawRow;
use std::path::Path;

// ==========================================
// MaterialImporter Trait
// ==========================================
// 用途: 导入主接口
// 实现者: MaterialImporterImpl
pub trait MaterialImporter {
    /// 导入文件（CSV / TSV / JSON）并完成规范化与校验
    ///
    /// # 返回
    /// - Ok(IngestBatch): 规范化后的记录 + 导入警告 + 校验报告
    /// - Err: 扩展名不支持、文件不存在、整体结构错误
    ///
    /// # 说明
    /// - 单条记录的问题不会返回 Err，而是体现在报告中
    fn ingest_file(&self, file_path: &Path) -> ImportResult<IngestBatch>;

    /// 生成更新计划（不写入）
    fn plan_update(&self, incoming: &[Material]) -> ImportResult<UpdatePlan>;

    /// 合并写入存储
    ///
    /// # 流程
    /// 1. 校验（存在 critical 违规则中止）
    /// 2. 生成更新计划
    /// 3. 确认（force 时跳过）
    /// 4. 备份 → 合并 → 分配 ID → 排序 → 写入
    fn update_store(
        &self,
        incoming: Vec<Material>,
        mode: UpdateMode,
        force: bool,
        prompt: &dyn ConfirmPrompt,
    ) -> ImportResult<UpdateOutcome>;
}

// ==========================================
// ConfirmPrompt Trait
// ==========================================
// 用途: 破坏性操作前的确认（控制台实现位于 CLI）
pub trait ConfirmPrompt {
    fn confirm(&self, plan: &UpdatePlan, mode: UpdateMode) -> bool;
}

/// 自动确认（测试 / --force）
pub struct AlwaysConfirm;

impl ConfirmPrompt for AlwaysConfirm {
    fn confirm(&self, _plan: &UpdatePlan, _mode: UpdateMode) -> bool {
        true
    }
}

/// 自动拒绝
pub struct NeverConfirm;

impl ConfirmPrompt for NeverConfirm {
    fn confirm(&self, _plan: &UpdatePlan, _mode: UpdateMode) -> bool {
        false
    }
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 表格文件解析接口
// 实现者: TabularParser
pub trait FileParser {
    /// 解析文件为原始行
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<Vec<RawRow>>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// 用途: 一组原始行 → 一条 Material
// 实现者: FieldMapper
pub trait FieldMapper {
    /// 空分组返回 None；单元格问题写入 warnings
    fn map_group(&self, rows: &[RawRow], warnings: &mut Vec<IngestWarning>) -> Option<Material>;
}

// ==========================================
// RecordNormalizer Trait
// ==========================================
// 用途: 记录规范化接口
// 实现者: Normalizer
pub trait RecordNormalizer {
    /// 规范化单条记录，返回本条的修复汇总
    fn normalize(&self, material: &mut Material) -> FixSummary;

    /// 规范化整批记录，返回累计汇总
    fn normalize_all(&self, materials: &mut [Material]) -> FixSummary;
}

// ==========================================
// RecordValidator Trait
// ==========================================
// 用途: 规则校验接口（只报告，不抛错）
// 实现者: Validator
pub trait RecordValidator {
    /// 单条记录校验
    fn validate(&self, index: usize, material: &Material) -> Vec<Violation>;

    /// 整批校验（含批内 ID 唯一性）
    fn validate_batch(&self, materials: &[Material]) -> ValidationReport;
}

// ==========================================
// IdentityResolver Trait
// ==========================================
// 用途: 身份键匹配与重复检测
// 实现者: ConflictHandler
pub trait IdentityResolver {
    /// 同批次内重复（首次出现保留）
    fn detect_duplicates(&self, materials: &[Material]) -> Vec<DuplicatePair>;

    /// 跨批次匹配
    fn detect_cross_batch_duplicates(
        &self,
        incoming: &[Material],
        existing: &[Material],
    ) -> Vec<CrossMatch>;

    /// 线性扫描，返回第一个匹配的下标
    fn find_match(&self, candidate: &Material, existing: &[Material]) -> Option<usize>;
}
