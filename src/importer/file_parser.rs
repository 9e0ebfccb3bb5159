// ==========================================
// 合金材料数据库 - 文件解析器实现
// ==========================================
// 支持: CSV (.csv) / TSV (.tsv/.txt) / JSON (.json)
// 红线: 扩展名在任何读取动作之前校验
// ==========================================

use crate::domain::material::Material;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::material_importer_trait::FileParser;
use csv::{ReaderBuilder, Trim};
use serde_json::Value;
use std::fs;
use std::path::Path;

// ==========================================
// RawRow - 表格原始行
// ==========================================
// 列顺序与表头一致；值已 TRIM，未做类型转换
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub row_number: usize, // 原始文件行号（表头为第 1 行）
    pub cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// 非空单元格值
    pub fn non_empty(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|v| !v.trim().is_empty())
    }
}

// ==========================================
// InputFormat - 输入格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Tsv,
    Json,
}

impl InputFormat {
    /// 根据扩展名判定格式（不触碰文件）
    pub fn from_path(path: &Path) -> ImportResult<InputFormat> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => Ok(InputFormat::Csv),
            "tsv" | "txt" => Ok(InputFormat::Tsv),
            "json" => Ok(InputFormat::Json),
            _ => Err(ImportError::UnsupportedFormat(if ext.is_empty() {
                path.display().to_string()
            } else {
                ext
            })),
        }
    }

    fn delimiter(&self) -> u8 {
        match self {
            InputFormat::Tsv => b'\t',
            _ => b',',
        }
    }
}

// ==========================================
// 表格解析器（CSV / TSV）
// ==========================================
pub struct TabularParser {
    format: InputFormat,
}

impl TabularParser {
    pub fn csv() -> Self {
        Self {
            format: InputFormat::Csv,
        }
    }

    pub fn tsv() -> Self {
        Self {
            format: InputFormat::Tsv,
        }
    }

    /// 解析表格文本为原始行
    pub fn parse_text(&self, content: &str) -> ImportResult<Vec<RawRow>> {
        // 至少需要表头 + 一行数据
        let physical_lines = content.trim().lines().count();
        if physical_lines < 2 {
            return Err(ImportError::MalformedInput(
                "表格至少需要表头和一行数据".to_string(),
            ));
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .trim(Trim::All)
            .delimiter(self.format.delimiter())
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::MalformedInput("表头为空".to_string()));
        }

        let mut rows = Vec::new();
        for (row_idx, result) in reader.records().enumerate() {
            let record = result?;
            let cells: Vec<(String, String)> = headers
                .iter()
                .enumerate()
                .filter(|(_, header)| !header.is_empty())
                .map(|(col_idx, header)| {
                    let value = record.get(col_idx).unwrap_or("").to_string();
                    (header.clone(), value)
                })
                .collect();

            // 跳过完全空白的行
            if cells.iter().all(|(_, v)| v.is_empty()) {
                continue;
            }

            rows.push(RawRow {
                row_number: row_idx + 2,
                cells,
            });
        }

        Ok(rows)
    }
}

impl FileParser for TabularParser {
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<Vec<RawRow>> {
        let format = InputFormat::from_path(file_path)?;
        if format != self.format {
            return Err(ImportError::UnsupportedFormat(format!(
                "{:?} 解析器不接受 {}",
                self.format,
                file_path.display()
            )));
        }

        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        let content = fs::read_to_string(file_path)?;
        self.parse_text(&content)
    }
}

// ==========================================
// JSON 记录解析
// ==========================================

/// 解析 JSON 文本: 顶层为数组或单个对象
pub fn parse_json_records(content: &str) -> ImportResult<Vec<Material>> {
    let value: Value = serde_json::from_str(content)?;
    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => {
            return Err(ImportError::MalformedInput(format!(
                "JSON 顶层必须是数组或对象，实际为 {}",
                json_kind(&other)
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            if !item.is_object() {
                return Err(ImportError::MalformedInput(format!(
                    "第 {} 条记录不是对象（{}）",
                    idx + 1,
                    json_kind(&item)
                )));
            }
            serde_json::from_value::<Material>(item).map_err(|e| {
                ImportError::JsonParseError(format!("第 {} 条记录: {}", idx + 1, e))
            })
        })
        .collect()
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "布尔",
        Value::Number(_) => "数值",
        Value::String(_) => "字符串",
        Value::Array(_) => "数组",
        Value::Object(_) => "对象",
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================

/// 解析结果: 表格行或 JSON 记录
#[derive(Debug, Clone)]
pub enum ParsedInput {
    Rows(Vec<RawRow>),
    Records(Vec<Material>),
}

pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<ParsedInput> {
        let path = file_path.as_ref();
        let format = InputFormat::from_path(path)?;

        match format {
            InputFormat::Csv => TabularParser::csv()
                .parse_to_raw_rows(path)
                .map(ParsedInput::Rows),
            InputFormat::Tsv => TabularParser::tsv()
                .parse_to_raw_rows(path)
                .map(ParsedInput::Rows),
            InputFormat::Json => {
                if !path.exists() {
                    return Err(ImportError::FileNotFound(path.display().to_string()));
                }
                let content = fs::read_to_string(path)?;
                parse_json_records(&content).map(ParsedInput::Records)
            }
        }
    }
}
