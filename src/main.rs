// ==========================================
// 合金材料数据库 - 命令行入口
// ==========================================
// 子命令: convert / fix / validate / check-duplicates / update /
//        assign-ids / fix-paths / template
// 输出: 报告写 stdout，日志写 stderr
// ==========================================

use alloy_catalog::config::{ConfigManager, PipelineConfigReader};
use alloy_catalog::domain::report::{FixSummary, IngestBatch, UpdatePlan, ValidationReport};
use alloy_catalog::domain::types::UpdateMode;
use alloy_catalog::engine::path_resolver::{
    clean_invalid_paths, fill_missing_paths, upgrade_legacy_paths, PathExists, PathResolver,
};
use alloy_catalog::engine::IdAssigner;
use alloy_catalog::importer::{
    csv_template, ConfirmPrompt, MaterialImporter, MaterialImporterImpl,
};
use alloy_catalog::repository::{FsPathExists, JsonFileRepository, MaterialRepository};
use alloy_catalog::{logging, PipelineConfig};
use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// 报告中逐条列出的违规上限
const REPORT_LIMIT: usize = 50;

#[derive(Parser)]
#[command(name = "alloy-catalog", version, about = "合金材料数据库 - 数据规范化与校验管道")]
struct Cli {
    /// 配置文件路径
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 覆盖配置中的数据文件
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    /// 日志输出为 JSON 行
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// CSV / TSV / JSON → 规范化 JSON 数组
    Convert {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// 规范化 JSON 数据文件（默认原地写回）
    Fix(FixArgs),
    /// 校验输入文件，存在 critical 违规时退出码非 0
    Validate { input: PathBuf },
    /// 检测批内重复与已有数据的匹配
    CheckDuplicates {
        input: PathBuf,
        /// 对比数据文件（默认配置中的数据文件）
        #[arg(long)]
        against: Option<PathBuf>,
    },
    /// 合并写入数据文件
    Update(UpdateArgs),
    /// 为缺少 ID 的记录分配 ID
    AssignIds {
        /// 同时替换不合规的旧 ID
        #[arg(long)]
        rewrite: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// 结构文件路径维护
    FixPaths(FixPathsArgs),
    /// 输出 CSV 模板
    Template {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct FixArgs {
    input: PathBuf,
    /// 输出文件（默认覆盖输入，仅限 .json）
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// 只报告，不写入
    #[arg(long)]
    dry_run: bool,
    /// 输出各项修复计数
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args)]
struct UpdateArgs {
    input: PathBuf,
    /// full | partial | add-temp | add-source（默认取配置）
    #[arg(long)]
    mode: Option<UpdateMode>,
    /// 跳过确认
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct FixPathsArgs {
    /// 结构文件所在的根目录（用于存在性检查）
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,
    /// 补全缺失路径
    #[arg(long)]
    fill: bool,
    /// 升级旧版 intermetallic 路径
    #[arg(long)]
    upgrade: bool,
    /// 删除指向不存在文件的顶层路径
    #[arg(long)]
    clean: bool,
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    if cli.log_json {
        logging::init_json();
    } else {
        logging::init();
    }

    let manager = ConfigManager::load(cli.config.as_deref()).context("加载配置失败")?;
    let mut config = manager.config().clone();
    if let Some(data_file) = cli.data_file {
        config.data_file = data_file;
    }

    match cli.command {
        Command::Convert { input, output } => convert(&config, &input, &output),
        Command::Fix(args) => fix(&config, args),
        Command::Validate { input } => validate(&config, &input),
        Command::CheckDuplicates { input, against } => check_duplicates(config, &input, against),
        Command::Update(args) => update(config, args),
        Command::AssignIds { rewrite, dry_run } => assign_ids(&config, rewrite, dry_run),
        Command::FixPaths(args) => fix_paths(&config, args),
        Command::Template { output } => template(output.as_deref()),
    }
}

// ==========================================
// 子命令实现
// ==========================================

fn importer_for(config: &PipelineConfig) -> MaterialImporterImpl<JsonFileRepository, PipelineConfig> {
    let repo = JsonFileRepository::new(config.data_file()).with_backup_dir(config.backup_dir());
    MaterialImporterImpl::new(repo, config.clone())
}

fn ingest(config: &PipelineConfig, input: &Path) -> anyhow::Result<IngestBatch> {
    importer_for(config)
        .ingest_file(input)
        .with_context(|| format!("导入失败: {}", input.display()))
}

fn convert(config: &PipelineConfig, input: &Path, output: &Path) -> anyhow::Result<ExitCode> {
    let batch = ingest(config, input)?;
    print_ingest(&batch);
    print_report(&batch.report);

    JsonFileRepository::new(output)
        .save_all(&batch.materials)
        .with_context(|| format!("写入失败: {}", output.display()))?;
    println!("已写入 {} 条记录 → {}", batch.materials.len(), output.display());
    Ok(ExitCode::SUCCESS)
}

fn fix(config: &PipelineConfig, args: FixArgs) -> anyhow::Result<ExitCode> {
    let batch = ingest(config, &args.input)?;
    print_fix_summary(&batch.fix_summary, args.verbose);

    if args.dry_run {
        println!("dry-run: 未写入");
        return Ok(ExitCode::SUCCESS);
    }

    let target = match args.output {
        Some(path) => path,
        None if has_extension(&args.input, "json") => args.input.clone(),
        None => bail!("非 JSON 输入需要通过 --output 指定输出文件"),
    };
    JsonFileRepository::new(&target)
        .save_all(&batch.materials)
        .with_context(|| format!("写入失败: {}", target.display()))?;
    println!("已写入 {}", target.display());
    Ok(ExitCode::SUCCESS)
}

fn validate(config: &PipelineConfig, input: &Path) -> anyhow::Result<ExitCode> {
    let batch = ingest(config, input)?;
    print_report(&batch.report);

    if batch.report.has_critical() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn check_duplicates(
    mut config: PipelineConfig,
    input: &Path,
    against: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    if let Some(reference) = against {
        config.data_file = reference;
    }
    let importer = importer_for(&config);
    let batch = importer
        .ingest_file(input)
        .with_context(|| format!("导入失败: {}", input.display()))?;
    let report = importer.check_duplicates(&batch.materials)?;

    println!("批内重复: {}", report.intra_batch.len());
    for pair in &report.intra_batch {
        println!(
            "  #{} 与 #{} 重复 [{}]",
            pair.duplicate_index + 1,
            pair.first_index + 1,
            pair.key
        );
    }
    println!("已存在记录匹配: {}", report.cross_batch.len());
    for hit in &report.cross_batch {
        let name = batch.materials[hit.incoming_index].display_name();
        println!(
            "  #{} {} → 已有记录 #{} ({})",
            hit.incoming_index + 1,
            name,
            hit.existing_index + 1,
            hit.existing_id.as_deref().unwrap_or("无 ID")
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn update(config: PipelineConfig, args: UpdateArgs) -> anyhow::Result<ExitCode> {
    let mode = args.mode.unwrap_or(config.default_update_mode);
    let importer = importer_for(&config);
    let batch = importer
        .ingest_file(&args.input)
        .with_context(|| format!("导入失败: {}", args.input.display()))?;
    print_report(&batch.report);

    if batch.report.has_critical() {
        println!("存在 critical 违规，未写入");
        return Ok(ExitCode::FAILURE);
    }

    let outcome = importer
        .update_store(batch.materials, mode, args.force, &ConsolePrompt)
        .context("更新失败")?;

    if let Some(backup) = &outcome.backup_path {
        println!("备份: {}", backup);
    }
    println!(
        "更新 {} 条, 新增 {} 条, 分配 ID {} 个",
        outcome.updated, outcome.added, outcome.ids.assigned
    );
    Ok(ExitCode::SUCCESS)
}

fn assign_ids(config: &PipelineConfig, rewrite: bool, dry_run: bool) -> anyhow::Result<ExitCode> {
    let repo = JsonFileRepository::new(config.data_file()).with_backup_dir(config.backup_dir());
    let mut materials = repo.load_all()?;
    let summary = IdAssigner::new(rewrite || config.rewrite_nonconforming_ids).assign(&mut materials);

    println!(
        "分配 {} 个, 替换 {} 个, 跳过 {} 条（类型非法）",
        summary.assigned, summary.rewritten, summary.skipped
    );
    if dry_run || summary.assigned + summary.rewritten == 0 {
        return Ok(ExitCode::SUCCESS);
    }

    repo.backup()?;
    repo.save_all(&materials)?;
    Ok(ExitCode::SUCCESS)
}

fn fix_paths(config: &PipelineConfig, args: FixPathsArgs) -> anyhow::Result<ExitCode> {
    let repo = JsonFileRepository::new(config.data_file()).with_backup_dir(config.backup_dir());
    let mut materials = repo.load_all()?;
    let resolver = PathResolver::new(&config.data_root);
    let exists = FsPathExists::new(&args.base_dir);
    let run_all = !(args.fill || args.upgrade || args.clean);

    let mut changes = 0;
    if run_all || args.upgrade {
        let summary = upgrade_legacy_paths(&resolver, &mut materials);
        println!("升级旧版路径: {}", summary.upgraded);
        changes += summary.upgraded;
    }
    if run_all || args.fill {
        let summary = fill_missing_paths(&resolver, &mut materials, Some(&exists as &dyn PathExists));
        println!("补全路径: {}, 无法推导: {}", summary.filled, summary.unresolved);
        changes += summary.filled;
    }
    if run_all || args.clean {
        let summary = clean_invalid_paths(&mut materials, &exists);
        println!("删除无效路径: {}", summary.removed);
        changes += summary.removed;
    }

    if args.dry_run || changes == 0 {
        return Ok(ExitCode::SUCCESS);
    }
    repo.backup()?;
    repo.save_all(&materials)?;
    Ok(ExitCode::SUCCESS)
}

fn template(output: Option<&Path>) -> anyhow::Result<ExitCode> {
    let content = csv_template();
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("写入失败: {}", path.display()))?;
            println!("模板已写入 {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(ExitCode::SUCCESS)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case(ext))
}

// ==========================================
// 控制台输出
// ==========================================

/// 控制台确认
struct ConsolePrompt;

impl ConfirmPrompt for ConsolePrompt {
    fn confirm(&self, plan: &UpdatePlan, mode: UpdateMode) -> bool {
        println!("更新模式: {}", mode);
        println!("  更新已有记录: {}", plan.updates.len());
        for update in plan.updates.iter().take(REPORT_LIMIT) {
            println!(
                "    → #{} {}",
                update.existing_index + 1,
                update.incoming.display_name()
            );
        }
        println!("  新增记录: {}", plan.additions.len());
        print!("确认写入? [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

fn print_ingest(batch: &IngestBatch) {
    println!(
        "批次 {}: {} 行 → {} 条记录（{} 条导入警告）",
        batch.batch_id,
        batch.total_rows,
        batch.materials.len(),
        batch.warnings.len()
    );
    for warning in batch.warnings.iter().take(REPORT_LIMIT) {
        println!(
            "  第 {} 行 [{}] {}",
            warning.row_number,
            warning.column.as_deref().unwrap_or("-"),
            warning.message
        );
    }
}

fn print_fix_summary(summary: &FixSummary, verbose: bool) {
    println!(
        "规范化: {} 条记录, {} 条有变更, 共 {} 项修复",
        summary.total_materials,
        summary.changed_materials,
        summary.total_changes()
    );
    if verbose {
        println!("  字段重命名:     {}", summary.field_renames);
        println!("  类型修正:       {}", summary.type_fixes);
        println!("  数据来源修正:   {}", summary.data_source_fixes);
        println!("  路径规范化:     {}", summary.path_normalizations);
        println!("  空字段删除:     {}", summary.empty_fields_removed);
        println!("  组成派生:       {}", summary.composition_derived);
        println!("  数据点重排:     {}", summary.data_reordered);
        println!("  路径补全:       {}", summary.paths_filled);
    }
}

fn print_report(report: &ValidationReport) {
    let summary = &report.summary;
    println!(
        "校验: {} 条记录, {} 条可入库, critical {}, warning {}",
        summary.total_records, summary.admissible, summary.critical, summary.warning
    );
    for violation in report.violations.iter().take(REPORT_LIMIT) {
        println!(
            "  [{}] #{} {} {}: {}",
            violation.severity,
            violation.record_index + 1,
            violation.material_name,
            violation.field,
            violation.message
        );
    }
    if report.violations.len() > REPORT_LIMIT {
        println!("  ... 其余 {} 条省略", report.violations.len() - REPORT_LIMIT);
    }
}
