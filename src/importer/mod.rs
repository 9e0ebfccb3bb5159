// ==========================================
// 合金材料数据库 - 导入层
// ==========================================
// 职责: 外部数据导入,生成规范化的材料记录
// 支持: CSV, TSV, JSON
// ==========================================

// 模块声明
pub mod composition;
pub mod conflict_handler;
pub mod dq_validator;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod material_importer_impl;
pub mod material_importer_trait;
pub mod normalizer;
pub mod tabular_ingestor;
pub mod value_parser;

// 重导出核心类型
pub use composition::{normalize_composition, parse_composition, ParsedComposition};
pub use conflict_handler::{materials_match, ConflictHandler as ConflictHandlerImpl, IdentityKey};
pub use dq_validator::Validator;
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapper as FieldMapperImpl;
pub use file_parser::{InputFormat, ParsedInput, RawRow, TabularParser, UniversalFileParser};
pub use material_importer_impl::MaterialImporterImpl;
pub use normalizer::{Normalizer, NormalizerOptions};
pub use tabular_ingestor::{csv_template, TabularIngestor, TabularOutput};

// 重导出 Trait 接口
pub use material_importer_trait::{
    AlwaysConfirm, ConfirmPrompt, FieldMapper, FileParser, IdentityResolver, MaterialImporter,
    NeverConfirm, RecordNormalizer, RecordValidator,
};
