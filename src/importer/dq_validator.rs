// ==========================================
// 合金材料数据库 - 数据质量校验器实现
// ==========================================
// 职责: 必填字段 / 类型值 / 数据点契约 / ID 格式校验 + 报告生成
// 红线: 只产出违规列表，不抛错；critical 为零的记录可入库
// ==========================================

use crate::domain::material::{DataPoint, DataSeries, Material};
use crate::domain::report::{Severity, ValidationReport, ValidationSummary, Violation};
use crate::domain::types::{is_valid_material_id, MaterialType, REQUIRED_FIELDS};
use crate::importer::composition::parse_composition;
use crate::importer::material_importer_trait::RecordValidator;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};

pub struct Validator;

/// 单条记录的违规收集器
struct RecordCheck<'a> {
    index: usize,
    material: &'a Material,
    violations: Vec<Violation>,
}

impl<'a> RecordCheck<'a> {
    fn new(index: usize, material: &'a Material) -> Self {
        Self {
            index,
            material,
            violations: Vec::new(),
        }
    }

    fn push(&mut self, severity: Severity, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation {
            record_index: self.index,
            material_id: self.material.id.clone(),
            material_name: self.material.display_name(),
            severity,
            field: field.into(),
            message: message.into(),
        });
    }

    fn critical(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Critical, field, message);
    }

    fn warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Warning, field, message);
    }
}

fn blank_str(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// 必填字段是否缺失（空集合视为缺失）
fn is_field_missing(material: &Material, field: &str) -> bool {
    match field {
        "id" => blank_str(&material.id),
        "source" => blank_str(&material.source),
        "name" => blank_str(&material.name),
        "composition" => blank_str(&material.composition),
        "type" => match &material.material_type {
            None => true,
            Some(MaterialType::Other(raw)) => raw.trim().is_empty(),
            Some(_) => false,
        },
        "elements" => material.elements.as_ref().map_or(true, Vec::is_empty),
        "atomCount" => material.atom_count.as_ref().map_or(true, |c| c.is_empty()),
        "data" => material.data.is_none(),
        other => !material.extra.contains_key(other),
    }
}

impl Validator {
    pub fn new() -> Self {
        Self
    }

    fn check_required(&self, check: &mut RecordCheck<'_>) {
        let malformed = check.material.malformed_fields();
        for field in REQUIRED_FIELDS {
            if malformed.contains(field) {
                continue;
            }
            if is_field_missing(check.material, field) {
                check.critical(*field, format!("缺少必填字段: {}", field));
            }
        }
    }

    /// 形状不符的字段（原值保留在 extra 中）
    fn check_shapes(&self, check: &mut RecordCheck<'_>) {
        for field in check.material.malformed_fields() {
            let raw = check.material.extra.get(field).cloned().unwrap_or_default();
            check.critical(field, format!("{} 类型不合法: {}", field, raw));
        }
    }

    fn check_type(&self, check: &mut RecordCheck<'_>) {
        if let Some(MaterialType::Other(raw)) = &check.material.material_type {
            if !raw.trim().is_empty() {
                check.critical(
                    "type",
                    format!(
                        "非法材料类型: {}（可选: {}）",
                        raw,
                        MaterialType::VALID_VALUES.join(", ")
                    ),
                );
            }
        }
    }

    fn check_composition(&self, check: &mut RecordCheck<'_>) {
        let Some(composition) = check.material.composition.as_deref() else {
            return;
        };
        if composition.trim().is_empty() {
            return;
        }

        let parsed = parse_composition(composition);
        if parsed.is_empty() {
            check.critical(
                "composition",
                format!("化学式无法解析出任何元素: {}", composition),
            );
            return;
        }

        if let Some(elements) = check.material.elements.as_ref().filter(|e| !e.is_empty()) {
            let declared: BTreeSet<&str> = elements.iter().map(String::as_str).collect();
            let derived: BTreeSet<&str> = parsed.elements.iter().map(String::as_str).collect();
            if declared != derived {
                check.warning(
                    "elements",
                    format!(
                        "elements 与化学式不一致: {:?} vs {:?}",
                        declared, derived
                    ),
                );
            }
        }
    }

    fn check_id_format(&self, check: &mut RecordCheck<'_>) {
        if let Some(id) = check.material.id.as_deref().filter(|s| !s.trim().is_empty()) {
            if !is_valid_material_id(id) {
                check.warning(
                    "id",
                    format!("ID 格式不符合 Alloy-<E|SS|IM|AM|IF>-<5位数字>: {}", id),
                );
            }
        }
    }

    fn check_poscar(&self, check: &mut RecordCheck<'_>) {
        if blank_str(&check.material.poscar) {
            check.warning("poscar", "缺少顶层 poscar 路径");
        }
    }

    fn check_data(&self, check: &mut RecordCheck<'_>) {
        match &check.material.data {
            None => {}
            Some(DataSeries::Malformed(Value::Array(items))) => {
                for (i, item) in items.iter().enumerate().filter(|(_, item)| !item.is_object()) {
                    check.critical(format!("data[{}]", i), format!("数据点不是对象: {}", item));
                }
            }
            Some(DataSeries::Malformed(_)) => {
                check.critical("data", "data 不是数组");
            }
            Some(DataSeries::Points(points)) => {
                if points.is_empty() {
                    check.warning("data", "data 数组为空");
                }
                for (i, point) in points.iter().enumerate() {
                    self.check_data_point(check, i, point);
                }
            }
        }
    }

    fn check_data_point(&self, check: &mut RecordCheck<'_>, i: usize, point: &DataPoint) {
        let field = |name: &str| format!("data[{}].{}", i, name);

        let malformed = point.malformed_fields();
        for name in &malformed {
            let raw = point.extra.get(*name).cloned().unwrap_or_default();
            check.critical(field(*name), format!("{} 类型不合法: {}", name, raw));
        }

        if blank_str(&point.source) {
            check.critical(field("source"), "数据点缺少 source");
        }

        if point.is_init() {
            if blank_str(&point.poscar) {
                check.critical(field("poscar"), "init 条目必须携带 poscar");
            }
            if point.temperature.is_some() {
                check.warning(field("temperature"), "init 条目不应携带 temperature");
            }
            if point.properties.is_some() {
                check.warning(field("properties"), "init 条目不应携带 properties");
            }
            return;
        }

        if point.temperature.is_none() && !malformed.contains(&"temperature") {
            check.critical(field("temperature"), "数据点缺少 temperature");
        }
        if !point.has_properties() && !malformed.contains(&"properties") {
            check.critical(field("properties"), "数据点缺少 properties 或全部类别为空");
        }
        if blank_str(&point.poscar) {
            check.warning(field("poscar"), "数据点缺少 poscar 路径");
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordValidator for Validator {
    fn validate(&self, index: usize, material: &Material) -> Vec<Violation> {
        let mut check = RecordCheck::new(index, material);
        self.check_required(&mut check);
        self.check_shapes(&mut check);
        self.check_type(&mut check);
        self.check_composition(&mut check);
        self.check_id_format(&mut check);
        self.check_poscar(&mut check);
        self.check_data(&mut check);
        check.violations
    }

    fn validate_batch(&self, materials: &[Material]) -> ValidationReport {
        let mut violations: Vec<Violation> = Vec::new();
        for (index, material) in materials.iter().enumerate() {
            violations.extend(self.validate(index, material));
        }

        // ID 批内唯一（首次出现之后的每一次均为 critical）
        let mut first_seen: HashMap<&str, usize> = HashMap::new();
        for (index, material) in materials.iter().enumerate() {
            let Some(id) = material.id.as_deref().filter(|s| !s.trim().is_empty()) else {
                continue;
            };
            match first_seen.get(id) {
                Some(first) => {
                    let mut check = RecordCheck::new(index, material);
                    check.critical("id", format!("ID 重复: {}（首次出现于第 {} 条）", id, first + 1));
                    violations.extend(check.violations);
                }
                None => {
                    first_seen.insert(id, index);
                }
            }
        }

        violations.sort_by_key(|v| v.record_index);
        build_report(materials.len(), violations)
    }
}

/// 汇总违规明细
pub fn build_report(total_records: usize, violations: Vec<Violation>) -> ValidationReport {
    let blocked: HashSet<usize> = violations
        .iter()
        .filter(|v| v.is_critical())
        .map(|v| v.record_index)
        .collect();
    let critical = violations.iter().filter(|v| v.is_critical()).count();

    ValidationReport {
        summary: ValidationSummary {
            total_records,
            admissible: total_records - blocked.len(),
            critical,
            warning: violations.len() - critical,
        },
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_record() -> serde_json::Value {
        json!({
            "id": "Alloy-IM-00001",
            "source": "mp-1",
            "name": "Al2Cu",
            "type": "intermetallic",
            "composition": "Al2Cu",
            "elements": ["Al", "Cu"],
            "atomCount": {"Al": 2, "Cu": 1},
            "poscar": "data/intermetallic/mp-1/DFT/POSCAR",
            "data": [
                {"source": "init", "poscar": "data/intermetallic/mp-1/init/POSCAR"},
                {"temperature": 0, "source": "DFT", "poscar": "data/intermetallic/mp-1/DFT/POSCAR",
                 "properties": {"structure": {"density": 4.3}}}
            ]
        })
    }

    fn material(value: serde_json::Value) -> Material {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_record_has_no_violations() {
        let violations = Validator.validate(0, &material(valid_record()));
        assert!(violations.is_empty(), "{:?}", violations);
    }

    #[test]
    fn test_missing_composition_single_critical() {
        let mut raw = valid_record();
        raw.as_object_mut().unwrap().remove("composition");

        let violations = Validator.validate(0, &material(raw));
        let critical: Vec<_> = violations.iter().filter(|v| v.is_critical()).collect();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].field, "composition");
    }

    #[test]
    fn test_init_with_temperature_single_warning() {
        let mut raw = valid_record();
        raw["data"][0]["temperature"] = json!(0);

        let violations = Validator.validate(0, &material(raw));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, Severity::Warning);
        assert_eq!(violations[0].field, "data[0].temperature");
    }

    #[test]
    fn test_invalid_type_and_malformed_data() {
        let mut raw = valid_record();
        raw["type"] = json!("crystalline");
        raw["data"] = json!("not an array");

        let violations = Validator.validate(0, &material(raw));
        let fields: Vec<_> = violations
            .iter()
            .filter(|v| v.is_critical())
            .map(|v| v.field.as_str())
            .collect();
        assert_eq!(fields, vec!["type", "data"]);
    }

    #[test]
    fn test_badly_shaped_fields_reported_by_name() {
        let mut raw = valid_record();
        raw["type"] = json!(3);
        raw["elements"] = json!("Al,Cu");
        raw["atomCount"] = json!({"Al": 2.5, "Cu": 1});

        let violations = Validator.validate(0, &material(raw));
        let fields: Vec<_> = violations
            .iter()
            .filter(|v| v.is_critical())
            .map(|v| v.field.as_str())
            .collect();
        assert_eq!(fields, vec!["type", "elements", "atomCount"]);
        assert!(violations[0].message.contains('3'));
    }

    #[test]
    fn test_bad_point_reported_at_point_level() {
        let mut raw = valid_record();
        raw["data"] = json!([
            {"temperature": 0, "source": "DFT", "poscar": "p", "properties": {"structure": {"density": 4.3}}},
            {"temperature": "300K", "source": "DFT", "poscar": "p", "properties": ["x"]},
            7
        ]);
        let violations = Validator.validate(0, &material(raw));
        let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["data[2]"]);

        let mut raw = valid_record();
        raw["data"][1]["temperature"] = json!("300K");
        raw["data"][1]["properties"] = json!(["x"]);
        let violations = Validator.validate(0, &material(raw));
        let fields: Vec<_> = violations
            .iter()
            .map(|v| (v.severity, v.field.as_str()))
            .collect();
        assert_eq!(
            fields,
            vec![
                (Severity::Critical, "data[1].temperature"),
                (Severity::Critical, "data[1].properties"),
            ]
        );
    }

    #[test]
    fn test_data_point_rules() {
        let mut raw = valid_record();
        raw["data"] = json!([
            {"source": "init"},
            {"source": "DFT", "properties": {}},
            {"temperature": 300, "properties": {"mechanics": {"youngsModulus": 1}}}
        ]);

        let violations = Validator.validate(0, &material(raw));
        let summary: Vec<_> = violations
            .iter()
            .map(|v| (v.severity, v.field.as_str()))
            .collect();
        assert!(summary.contains(&(Severity::Critical, "data[0].poscar")));
        assert!(summary.contains(&(Severity::Critical, "data[1].temperature")));
        assert!(summary.contains(&(Severity::Critical, "data[1].properties")));
        assert!(summary.contains(&(Severity::Warning, "data[1].poscar")));
        assert!(summary.contains(&(Severity::Critical, "data[2].source")));
    }

    #[test]
    fn test_warnings_for_id_poscar_and_empty_data() {
        let mut raw = valid_record();
        raw["id"] = json!("IM-1");
        raw.as_object_mut().unwrap().remove("poscar");
        raw["data"] = json!([]);

        let violations = Validator.validate(0, &material(raw));
        assert_eq!(violations.len(), 3);
        assert!(violations.iter().all(|v| !v.is_critical()));
    }

    #[test]
    fn test_unparseable_composition_and_inconsistent_elements() {
        let mut raw = valid_record();
        raw["composition"] = json!("1234");
        let violations = Validator.validate(0, &material(raw));
        assert!(violations
            .iter()
            .any(|v| v.is_critical() && v.field == "composition"));

        let mut raw = valid_record();
        raw["elements"] = json!(["Al", "Ni"]);
        let violations = Validator.validate(0, &material(raw));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "elements");
        assert!(!violations[0].is_critical());
    }

    #[test]
    fn test_batch_duplicate_ids_and_summary() {
        let a = material(valid_record());
        let b = material(valid_record());
        let mut c_raw = valid_record();
        c_raw["id"] = json!("IM-1");
        let c = material(c_raw);

        let report = Validator.validate_batch(&[a, b, c]);
        assert_eq!(report.summary.total_records, 3);
        assert_eq!(report.summary.critical, 1);
        assert_eq!(report.summary.warning, 1);
        assert_eq!(report.summary.admissible, 2);
        assert_eq!(report.violations[0].record_index, 1);
    }
}
