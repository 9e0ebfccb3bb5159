// ==========================================
// 合金材料数据库 - 领域枚举类型
// ==========================================
// 职责: 材料类型 / 类型代码 / 属性类别 / 更新模式
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// MaterialType - 材料类型
// ==========================================
// 合法值: element / solid-solution / intermetallic / amorphous / interface
// 非法值保留原文（Other），交由校验器标记
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MaterialType {
    Element,
    SolidSolution,
    Intermetallic,
    Amorphous,
    Interface,
    Other(String),
}

/// 必填字段（五种类型共用同一集合，非法类型同样按此校验）
pub const REQUIRED_FIELDS: &[&str] = &[
    "id",
    "source",
    "name",
    "type",
    "composition",
    "elements",
    "atomCount",
    "data",
];

impl MaterialType {
    /// 五种合法类型的字符串值
    pub const VALID_VALUES: [&'static str; 5] = [
        "element",
        "solid-solution",
        "intermetallic",
        "amorphous",
        "interface",
    ];

    pub fn as_str(&self) -> &str {
        match self {
            MaterialType::Element => "element",
            MaterialType::SolidSolution => "solid-solution",
            MaterialType::Intermetallic => "intermetallic",
            MaterialType::Amorphous => "amorphous",
            MaterialType::Interface => "interface",
            MaterialType::Other(raw) => raw.as_str(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, MaterialType::Other(_))
    }

    /// 历史遗留类型值 → 规范类型（solid_solution / solid-element）
    pub fn from_legacy(raw: &str) -> Option<MaterialType> {
        match raw {
            "solid_solution" => Some(MaterialType::SolidSolution),
            "solid-element" => Some(MaterialType::Element),
            _ => None,
        }
    }

    /// ID 中使用的类型代码
    pub fn type_code(&self) -> Option<TypeCode> {
        match self {
            MaterialType::Element => Some(TypeCode::E),
            MaterialType::SolidSolution => Some(TypeCode::SS),
            MaterialType::Intermetallic => Some(TypeCode::IM),
            MaterialType::Amorphous => Some(TypeCode::AM),
            MaterialType::Interface => Some(TypeCode::IF),
            MaterialType::Other(_) => None,
        }
    }

    /// 结构文件目录名（连字符形式）
    pub fn type_dir(&self) -> Option<&'static str> {
        match self {
            MaterialType::Element => Some("element"),
            MaterialType::SolidSolution => Some("solid-solution"),
            MaterialType::Intermetallic => Some("intermetallic"),
            MaterialType::Amorphous => Some("amorphous-metal"),
            MaterialType::Interface => Some("interface"),
            MaterialType::Other(_) => None,
        }
    }
}

impl From<String> for MaterialType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "element" => MaterialType::Element,
            "solid-solution" => MaterialType::SolidSolution,
            "intermetallic" => MaterialType::Intermetallic,
            "amorphous" => MaterialType::Amorphous,
            "interface" => MaterialType::Interface,
            _ => MaterialType::Other(raw),
        }
    }
}

impl From<&str> for MaterialType {
    fn from(raw: &str) -> Self {
        MaterialType::from(raw.to_string())
    }
}

impl From<MaterialType> for String {
    fn from(value: MaterialType) -> Self {
        match value {
            MaterialType::Other(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for MaterialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// TypeCode - ID 类型代码
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeCode {
    E,  // element
    SS, // solid-solution
    IM, // intermetallic
    AM, // amorphous
    IF, // interface
}

impl TypeCode {
    pub const ALL: [TypeCode; 5] = [
        TypeCode::E,
        TypeCode::SS,
        TypeCode::IM,
        TypeCode::AM,
        TypeCode::IF,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeCode::E => "E",
            TypeCode::SS => "SS",
            TypeCode::IM => "IM",
            TypeCode::AM => "AM",
            TypeCode::IF => "IF",
        }
    }

    pub fn parse(raw: &str) -> Option<TypeCode> {
        TypeCode::ALL.iter().copied().find(|c| c.as_str() == raw)
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 材料 ID: Alloy-<TypeCode>-<5 位数字>
// ==========================================

/// ID 前缀
pub const ID_PREFIX: &str = "Alloy";

/// 解析合规 ID，返回 (类型代码, 序号)
pub fn parse_material_id(id: &str) -> Option<(TypeCode, u32)> {
    let rest = id.strip_prefix(ID_PREFIX)?.strip_prefix('-')?;
    let (code, digits) = rest.split_once('-')?;
    let code = TypeCode::parse(code)?;
    if digits.len() != 5 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().map(|n| (code, n))
}

pub fn is_valid_material_id(id: &str) -> bool {
    parse_material_id(id).is_some()
}

/// 生成 ID（序号补零至 5 位）
pub fn format_material_id(code: TypeCode, number: u32) -> String {
    format!("{}-{}-{:05}", ID_PREFIX, code, number)
}

// ==========================================
// PropertyCategory - 属性类别
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyCategory {
    Structure,      // 密度 / 晶格参数 / RDF / 点群
    Thermodynamics, // 比热 / 混合焓 / 扩散系数 / 热膨胀
    Mechanics,      // 弹性常数 / 应力应变 / 杨氏模量 / 泊松比
    Defects,        // 空位 / 间隙 / 层错能
}

impl PropertyCategory {
    pub const ALL: [PropertyCategory; 4] = [
        PropertyCategory::Structure,
        PropertyCategory::Thermodynamics,
        PropertyCategory::Mechanics,
        PropertyCategory::Defects,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            PropertyCategory::Structure => "structure",
            PropertyCategory::Thermodynamics => "thermodynamics",
            PropertyCategory::Mechanics => "mechanics",
            PropertyCategory::Defects => "defects",
        }
    }

    pub fn from_key(key: &str) -> Option<PropertyCategory> {
        PropertyCategory::ALL.iter().copied().find(|c| c.key() == key)
    }
}

// ==========================================
// UpdateMode - 合并更新模式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateMode {
    #[default]
    Full,      // 整体替换（保留 id）
    Partial,   // 非空字段覆盖 + 数据点深度合并
    AddTemp,   // 仅追加新温度点
    AddSource, // 仅追加新数据来源
}

impl UpdateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMode::Full => "full",
            UpdateMode::Partial => "partial",
            UpdateMode::AddTemp => "add-temp",
            UpdateMode::AddSource => "add-source",
        }
    }
}

impl FromStr for UpdateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(UpdateMode::Full),
            "partial" => Ok(UpdateMode::Partial),
            "add-temp" | "add_temp" => Ok(UpdateMode::AddTemp),
            "add-source" | "add_source" => Ok(UpdateMode::AddSource),
            other => Err(format!(
                "未知更新模式: {}（可选 full / partial / add-temp / add-source）",
                other
            )),
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
