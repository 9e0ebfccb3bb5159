// ==========================================
// 合金材料数据库 - 单元格值解析
// ==========================================
// 规则: 数字字符串 → 数值；JSON 形式 → 对象/数组；
//       逗号分隔（可带方括号）→ 字符串列表；其余保留为字符串
// 红线: 解析失败返回 MalformedValue（保留原始文本），不静默吞掉
// ==========================================

use crate::domain::material::number_value;
use serde_json::Value;
use thiserror::Error;

/// 单元格解析失败（原始文本保留，由调用方决定保留或告警）
#[derive(Error, Debug, Clone, PartialEq)]
#[error("无法解析单元格值 '{raw}': {reason}")]
pub struct MalformedValue {
    pub raw: String,
    pub reason: String,
}

impl MalformedValue {
    fn new(raw: &str, reason: impl Into<String>) -> Self {
        Self {
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }
}

/// 空单元格判定（空白 / "null" / "-"）
pub fn is_null_cell(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") || trimmed == "-"
}

/// 通用单元格解析
///
/// 空单元格返回 `Value::Null`，调用方应跳过该字段。
pub fn parse_value(raw: &str) -> Result<Value, MalformedValue> {
    let trimmed = raw.trim();
    if is_null_cell(trimmed) {
        return Ok(Value::Null);
    }

    if let Some(n) = parse_finite(trimmed) {
        return Ok(number_value(n));
    }

    let looks_like_json = (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));
    if looks_like_json {
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => return Ok(value),
            Err(err) => {
                // "[Al, Ni, Cu]" 这类裸字符串列表
                if trimmed.starts_with('[') {
                    if let Some(list) = split_bracket_list(trimmed) {
                        return Ok(list);
                    }
                }
                return Err(MalformedValue::new(trimmed, err.to_string()));
            }
        }
    }

    if trimmed.contains(',') {
        if let Some(list) = split_bracket_list(trimmed) {
            return Ok(list);
        }
    }

    Ok(Value::String(trimmed.to_string()))
}

/// 数值列解析: 空单元格 → None，非数值 → MalformedValue
pub fn parse_number(raw: &str) -> Result<Option<f64>, MalformedValue> {
    let trimmed = raw.trim();
    if is_null_cell(trimmed) {
        return Ok(None);
    }
    parse_finite(trimmed)
        .map(Some)
        .ok_or_else(|| MalformedValue::new(trimmed, "期望数值"))
}

fn parse_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// "[a, b, c]" 或 "a,b,c" → 字符串列表（嵌套方括号不处理）
fn split_bracket_list(text: &str) -> Option<Value> {
    let inner = text
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(text);
    if inner.contains('[') || inner.contains(']') || inner.contains('{') {
        return None;
    }
    let items: Vec<Value> = inner
        .split(',')
        .map(|item| Value::String(item.trim().to_string()))
        .collect();
    Some(Value::Array(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers() {
        assert_eq!(parse_value("7.85").unwrap(), json!(7.85));
        assert_eq!(parse_value(" 300 ").unwrap(), json!(300));
        assert_eq!(parse_value("1.2e-10").unwrap(), json!(1.2e-10));
    }

    #[test]
    fn test_null_cells() {
        assert_eq!(parse_value("").unwrap(), Value::Null);
        assert_eq!(parse_value("  ").unwrap(), Value::Null);
        assert_eq!(parse_value("NULL").unwrap(), Value::Null);
    }

    #[test]
    fn test_json_values() {
        assert_eq!(
            parse_value("{\"a\": 1}").unwrap(),
            json!({"a": 1})
        );
        assert_eq!(
            parse_value("[[1,2],[3,4]]").unwrap(),
            json!([[1, 2], [3, 4]])
        );
    }

    #[test]
    fn test_bare_string_lists() {
        assert_eq!(parse_value("[Al, Ni, Cu]").unwrap(), json!(["Al", "Ni", "Cu"]));
        assert_eq!(parse_value("Al,Ni").unwrap(), json!(["Al", "Ni"]));
    }

    #[test]
    fn test_plain_string_and_malformed() {
        assert_eq!(parse_value("Fm-3m").unwrap(), json!("Fm-3m"));
        assert_eq!(parse_value("inf").unwrap(), json!("inf"));

        let err = parse_value("{\"a\": }").unwrap_err();
        assert_eq!(err.raw, "{\"a\": }");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0.3").unwrap(), Some(0.3));
        assert_eq!(parse_number("").unwrap(), None);
        assert!(parse_number("abc").is_err());
    }
}
