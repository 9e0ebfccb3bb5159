// ==========================================
// 合金材料数据库 - 化学式解析器
// ==========================================
// 输入: "Al2Cu4Ni1" 形式的化学式
// 输出: elements（首次出现顺序）+ atomCount（重复元素取最后一次计数）
// 红线: 解析器永不失败；空结果由校验器报告
// ==========================================

use std::collections::BTreeMap;

/// 化学式解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedComposition {
    pub elements: Vec<String>,
    pub atom_count: BTreeMap<String, u32>,
}

impl ParsedComposition {
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// 解析化学式
///
/// 元素符号为一个大写字母加可选的一个小写字母，计数为可选整数（缺省为 1）。
/// 不符合该形式的字符被跳过，不会产生部分匹配的元素。
pub fn parse_composition(input: &str) -> ParsedComposition {
    let mut parsed = ParsedComposition::default();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !c.is_ascii_uppercase() {
            i += 1;
            continue;
        }

        let mut symbol = c.to_string();
        i += 1;
        if i < chars.len() && chars[i].is_ascii_lowercase() {
            symbol.push(chars[i]);
            i += 1;
        }

        let digits_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        let digits: String = chars[digits_start..i].iter().collect();
        let count = if digits.is_empty() {
            1
        } else {
            match digits.parse::<u32>() {
                Ok(n) => n,
                // 计数溢出视为畸形片段
                Err(_) => continue,
            }
        };

        if !parsed.atom_count.contains_key(&symbol) {
            parsed.elements.push(symbol.clone());
        }
        parsed.atom_count.insert(symbol, count);
    }

    parsed
}

/// 规范化化学式（去空白 + 小写），用于身份键比较
pub fn normalize_composition(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}
