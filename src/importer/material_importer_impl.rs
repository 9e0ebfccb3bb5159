// ==========================================
// 合金材料数据库 - 导入流水线实现
// ==========================================
// 职责: 整合导入流程，从文件到数据文件
// 流程: 解析 → 映射 → 规范化 → 校验 → 身份匹配 → 合并 → ID 分配 → 落盘
// ==========================================

use crate::config::PipelineConfigReader;
use crate::domain::material::Material;
use crate::domain::report::{DuplicateReport, IngestBatch, UpdateOutcome, UpdatePlan};
use crate::domain::types::UpdateMode;
use crate::engine::id_assigner::IdAssigner;
use crate::engine::merge_engine::MergeEngine;
use crate::engine::path_resolver::PathResolver;
use crate::importer::conflict_handler::ConflictHandler;
use crate::importer::dq_validator::Validator;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper;
use crate::importer::file_parser::{ParsedInput, UniversalFileParser};
use crate::importer::material_importer_trait::{
    ConfirmPrompt, IdentityResolver, MaterialImporter, RecordNormalizer, RecordValidator,
};
use crate::importer::normalizer::Normalizer;
use crate::importer::tabular_ingestor::TabularIngestor;
use crate::repository::MaterialRepository;
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn, Span};
use uuid::Uuid;

// ==========================================
// MaterialImporterImpl - 导入流水线实现
// ==========================================
pub struct MaterialImporterImpl<R, C>
where
    R: MaterialRepository,
    C: PipelineConfigReader,
{
    // 数据访问层
    repo: R,

    // 配置读取器
    config: C,

    // 流水线组件
    file_parser: UniversalFileParser,
    tabular: TabularIngestor,
    normalizer: Box<dyn RecordNormalizer>,
    validator: Box<dyn RecordValidator>,
    conflict_handler: ConflictHandler,
    merge_engine: MergeEngine,
}

impl<R, C> MaterialImporterImpl<R, C>
where
    R: MaterialRepository,
    C: PipelineConfigReader,
{
    /// 按配置装配流水线组件
    ///
    /// # 参数
    /// - repo: 材料数据仓储
    /// - config: 配置读取器
    pub fn new(repo: R, config: C) -> Self {
        let resolver = PathResolver::new(&config.data_root());
        let normalizer = Normalizer::new(
            config.normalizer_options(),
            &config.data_source_aliases(),
            resolver,
        );
        let tabular = TabularIngestor::new(FieldMapper::new(config.primary_elements()));

        Self {
            repo,
            config,
            file_parser: UniversalFileParser,
            tabular,
            normalizer: Box::new(normalizer),
            validator: Box::new(Validator::new()),
            conflict_handler: ConflictHandler,
            merge_engine: MergeEngine,
        }
    }

    /// 替换规范化器（测试 / 定制开关）
    pub fn with_normalizer(mut self, normalizer: Box<dyn RecordNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    /// 重复检测: 批内重复 + 与数据文件的跨批次匹配
    pub fn check_duplicates(&self, incoming: &[Material]) -> ImportResult<DuplicateReport> {
        let existing = self.repo.load_all()?;
        let report = DuplicateReport {
            intra_batch: self.conflict_handler.detect_duplicates(incoming),
            cross_batch: self
                .conflict_handler
                .detect_cross_batch_duplicates(incoming, &existing),
        };
        info!(
            intra_batch = report.intra_batch.len(),
            cross_batch = report.cross_batch.len(),
            "重复检测完成"
        );
        Ok(report)
    }

    /// 按计划合并到已有记录
    ///
    /// 先追加新增记录，再按顺序应用更新（更新可指向本批新增的位置）。
    /// 新增记录的 ID 与已占用 ID 冲突时清空，由后续 ID 分配重新编号。
    fn apply_plan(
        &self,
        existing: Vec<Material>,
        plan: &UpdatePlan,
        mode: UpdateMode,
    ) -> ImportResult<Vec<Material>> {
        // ID → 持有该 ID 的存储下标（新增与合并结果都不得占用他人 ID）
        let mut owners: HashMap<String, usize> = HashMap::new();
        for (index, material) in existing.iter().enumerate() {
            if let Some(id) = material.id.clone() {
                owners.entry(id).or_insert(index);
            }
        }

        let mut store = existing;
        for addition in &plan.additions {
            let mut material = addition.clone();
            if let Some(id) = material.id.take() {
                if owners.contains_key(&id) {
                    debug!(id = %id, "新增记录 ID 已被占用，重新分配");
                } else {
                    owners.insert(id.clone(), store.len());
                    material.id = Some(id);
                }
            }
            store.push(material);
        }

        for update in &plan.updates {
            let index = update.existing_index;
            let Some(target) = store.get(index) else {
                return Err(ImportError::InternalError(format!(
                    "更新目标越界: index={}, len={}",
                    index,
                    store.len()
                )));
            };
            let (mut merged, stats) = self.merge_engine.merge(target, &update.incoming, mode);
            debug!(
                index,
                added = stats.points_added,
                merged = stats.points_merged,
                "应用更新"
            );

            // 原记录无 ID 时合并结果沿用来件 ID，可能与其他记录冲突
            if merged.id != target.id {
                if let Some(id) = merged.id.take() {
                    match owners.get(&id) {
                        Some(&owner) if owner != index => {
                            debug!(id = %id, owner, "合并后 ID 已被占用，重新分配");
                        }
                        _ => {
                            owners.insert(id.clone(), index);
                            merged.id = Some(id);
                        }
                    }
                }
            }
            store[index] = merged;
        }

        Ok(store)
    }
}

impl<R, C> MaterialImporter for MaterialImporterImpl<R, C>
where
    R: MaterialRepository,
    C: PipelineConfigReader,
{
    #[instrument(skip(self, file_path), fields(batch_id))]
    fn ingest_file(&self, file_path: &Path) -> ImportResult<IngestBatch> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        Span::current().record("batch_id", batch_id.as_str());

        info!(batch_id = %batch_id, file_path = %file_path.display(), "开始导入材料数据");

        // === 步骤 1: 解析文件 ===
        debug!("步骤 1: 解析文件");
        let parsed = self.file_parser.parse(file_path).map_err(|e| {
            error!(error = %e, "文件解析失败");
            e
        })?;

        // === 步骤 2: 字段映射（表格输入） ===
        debug!("步骤 2: 字段映射");
        let (total_rows, mut materials, warnings) = match parsed {
            ParsedInput::Rows(rows) => {
                let output = self.tabular.ingest_rows(&rows);
                (output.total_rows, output.materials, output.warnings)
            }
            ParsedInput::Records(records) => (records.len(), records, Vec::new()),
        };
        info!(
            total_rows = total_rows,
            materials = materials.len(),
            warnings = warnings.len(),
            "文件解析完成"
        );

        // === 步骤 3: 规范化 ===
        debug!("步骤 3: 规范化");
        let fix_summary = self.normalizer.normalize_all(&mut materials);
        info!(
            changed = fix_summary.changed_materials,
            changes = fix_summary.total_changes(),
            "规范化完成"
        );

        // === 步骤 4: ID 分配（批内编号） ===
        debug!("步骤 4: ID 分配");
        let ids = IdAssigner::new(self.config.rewrite_nonconforming_ids()).assign(&mut materials);
        debug!(assigned = ids.assigned, skipped = ids.skipped, "ID 分配完成");

        // === 步骤 5: 校验 ===
        debug!("步骤 5: 校验");
        let report = self.validator.validate_batch(&materials);
        if report.has_critical() {
            warn!(
                critical = report.summary.critical,
                warning = report.summary.warning,
                "批次存在 critical 违规"
            );
        } else {
            info!(
                admissible = report.summary.admissible,
                warning = report.summary.warning,
                "校验完成"
            );
        }

        let elapsed_time = start_time.elapsed();
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string());

        info!(
            batch_id = %batch_id,
            total = total_rows,
            materials = materials.len(),
            elapsed_ms = elapsed_time.as_millis(),
            "材料数据导入完成"
        );

        Ok(IngestBatch {
            batch_id,
            file_name,
            total_rows,
            materials,
            warnings,
            fix_summary,
            report,
            elapsed_time,
        })
    }

    fn plan_update(&self, incoming: &[Material]) -> ImportResult<UpdatePlan> {
        let existing = self.repo.load_all()?;
        let plan = self.conflict_handler.plan_update(incoming, &existing);
        debug!(
            existing = existing.len(),
            updates = plan.updates.len(),
            additions = plan.additions.len(),
            "更新计划生成"
        );
        Ok(plan)
    }

    #[instrument(skip(self, incoming, prompt), fields(count = incoming.len(), mode = %mode))]
    fn update_store(
        &self,
        incoming: Vec<Material>,
        mode: UpdateMode,
        force: bool,
        prompt: &dyn ConfirmPrompt,
    ) -> ImportResult<UpdateOutcome> {
        // === 步骤 1: 校验（缺失的 ID 以临时编号参与校验，入库时重新分配） ===
        let mut probe = incoming.clone();
        IdAssigner::default().assign(&mut probe);
        let report = self.validator.validate_batch(&probe);
        if report.has_critical() {
            error!(critical = report.summary.critical, "存在 critical 违规，拒绝写入");
            return Err(ImportError::CriticalViolations {
                count: report.summary.critical,
            });
        }

        // === 步骤 2: 更新计划 ===
        let existing = self.repo.load_all()?;
        let plan = self.conflict_handler.plan_update(&incoming, &existing);
        info!(
            updates = plan.updates.len(),
            additions = plan.additions.len(),
            "更新计划生成"
        );
        if plan.is_empty() {
            return Ok(UpdateOutcome::default());
        }

        // === 步骤 3: 确认 ===
        if !force && !prompt.confirm(&plan, mode) {
            info!("用户取消更新");
            return Err(ImportError::UpdateCancelled);
        }

        // === 步骤 4: 备份 ===
        let backup_path = self.repo.backup()?;

        // === 步骤 5: 合并 ===
        let mut store = self.apply_plan(existing, &plan, mode)?;

        // === 步骤 6: ID 分配 + 排序 ===
        let ids = IdAssigner::new(self.config.rewrite_nonconforming_ids()).assign(&mut store);
        for material in store.iter_mut() {
            material.sort_data();
        }

        // === 步骤 7: 落盘 ===
        self.repo.save_all(&store)?;

        let outcome = UpdateOutcome {
            updated: plan.updates.len(),
            added: plan.additions.len(),
            backup_path: backup_path.map(|p| p.display().to_string()),
            ids,
        };
        info!(
            updated = outcome.updated,
            added = outcome.added,
            assigned = outcome.ids.assigned,
            total = store.len(),
            "更新写入完成"
        );
        Ok(outcome)
    }
}
