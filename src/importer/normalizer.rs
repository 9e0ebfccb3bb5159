// ==========================================
// 合金材料数据库 - 记录规范化器
// ==========================================
// 职责: 字段重命名 / 类型值修正 / 数据来源标签修正 /
//       路径规范化 / 空字段清理 / 组成派生 / 数据点排序
// 红线: 每项操作可独立开关且幂等；未知字段原样保留
// ==========================================

use crate::domain::material::{is_blank, DataPoint, Material};
use crate::domain::report::FixSummary;
use crate::domain::types::{MaterialType, PropertyCategory};
use crate::engine::path_resolver::{fill_missing_paths, PathResolver};
use crate::importer::composition::parse_composition;
use crate::importer::material_importer_trait::RecordNormalizer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// 旧字段名
pub const LEGACY_SOURCE_FIELD: &str = "ori_source";

/// 内置数据来源标签映射
pub const BUILTIN_DATA_SOURCE_ALIASES: &[(&str, &str)] = &[
    ("DPA1", "DPA-1"),
    ("DPA1_251208", "DPA-1"),
    ("DPA2", "DPA-2"),
    ("DPA3", "DPA-3"),
    ("dft", "DFT"),
    ("md", "MD"),
];

/// 旧版下划线类型目录 → 连字符形式
const LEGACY_TYPE_DIRS: &[(&str, &str)] = &[
    ("solid_solution", "solid-solution"),
    ("amorphous_metal", "amorphous-metal"),
];

// ==========================================
// NormalizerOptions - 操作开关
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerOptions {
    pub field_rename: bool,
    pub type_canonicalize: bool,
    pub data_source_canonicalize: bool,
    pub path_normalize: bool,
    pub prune_empty: bool,
    pub derive_composition: bool,
    pub sort_data_points: bool,
    pub fill_missing_paths: bool,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            field_rename: true,
            type_canonicalize: true,
            data_source_canonicalize: true,
            path_normalize: true,
            prune_empty: true,
            derive_composition: true,
            sort_data_points: true,
            fill_missing_paths: false,
        }
    }
}

// ==========================================
// Normalizer
// ==========================================
pub struct Normalizer {
    options: NormalizerOptions,
    aliases: BTreeMap<String, String>,
    resolver: PathResolver,
}

impl Normalizer {
    pub fn new(
        options: NormalizerOptions,
        extra_aliases: &BTreeMap<String, String>,
        resolver: PathResolver,
    ) -> Self {
        let mut aliases: BTreeMap<String, String> = BUILTIN_DATA_SOURCE_ALIASES
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        aliases.extend(extra_aliases.iter().map(|(k, v)| (k.clone(), v.clone())));

        Self {
            options,
            aliases,
            resolver,
        }
    }

    pub fn options(&self) -> &NormalizerOptions {
        &self.options
    }

    /// 数据来源标签规范化（未映射标签原样返回 None）
    pub fn canonical_data_source(&self, tag: &str) -> Option<&str> {
        self.aliases
            .get(tag)
            .map(String::as_str)
            .filter(|canonical| *canonical != tag)
    }

    // ===== 各项修复 =====

    fn rename_fields(&self, material: &mut Material, summary: &mut FixSummary) {
        if material.source.is_some() {
            return;
        }
        if let Some(value) = material.extra.remove(LEGACY_SOURCE_FIELD) {
            material.source = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
            summary.field_renames += 1;
        }
    }

    fn canonicalize_type(&self, material: &mut Material, summary: &mut FixSummary) {
        if let Some(MaterialType::Other(raw)) = &material.material_type {
            if let Some(canonical) = MaterialType::from_legacy(raw) {
                material.material_type = Some(canonical);
                summary.type_fixes += 1;
            }
        }
    }

    fn canonicalize_data_sources(&self, material: &mut Material, summary: &mut FixSummary) {
        let Some(points) = material.data_points_mut() else {
            return;
        };
        for point in points.iter_mut() {
            let canonical = point
                .source
                .as_deref()
                .and_then(|tag| self.canonical_data_source(tag))
                .map(str::to_string);
            if let Some(canonical) = canonical {
                point.source = Some(canonical);
                summary.data_source_fixes += 1;
            }
        }
    }

    fn normalize_paths(&self, material: &mut Material, summary: &mut FixSummary) {
        normalize_path_field(&mut material.poscar, summary);
        let Some(points) = material.data_points_mut() else {
            return;
        };
        for point in points.iter_mut() {
            normalize_path_field(&mut point.poscar, summary);
            normalize_property_paths(point, summary);
        }
    }

    fn prune_empty(&self, material: &mut Material, summary: &mut FixSummary) {
        // 顶层必填字段即使为空也保留；poscar 非必填
        if material.poscar.as_deref() == Some("") {
            material.poscar = None;
            summary.empty_fields_removed += 1;
        }
        summary.empty_fields_removed += prune_map(&mut material.extra);

        let Some(points) = material.data_points_mut() else {
            return;
        };
        for point in points.iter_mut() {
            for field in [&mut point.source, &mut point.poscar] {
                if field.as_deref() == Some("") {
                    *field = None;
                    summary.empty_fields_removed += 1;
                }
            }
            summary.empty_fields_removed += prune_map(&mut point.extra);
            if let Some(properties) = point.properties.as_mut() {
                summary.empty_fields_removed += prune_map(properties.as_map_mut());
            }
        }
    }

    fn derive_composition(&self, material: &mut Material, summary: &mut FixSummary) {
        let Some(composition) = material.composition.as_deref() else {
            return;
        };
        // 形状非法的原值保留给校验器，不以推导值覆盖
        let malformed = material.malformed_fields();
        let elements_missing = material.elements.as_ref().map_or(true, Vec::is_empty)
            && !malformed.contains(&"elements");
        let counts_missing = material.atom_count.as_ref().map_or(true, BTreeMap::is_empty)
            && !malformed.contains(&"atomCount");
        if !elements_missing && !counts_missing {
            return;
        }

        let parsed = parse_composition(composition);
        if parsed.is_empty() {
            return;
        }
        if elements_missing {
            material.elements = Some(parsed.elements);
        }
        if counts_missing {
            material.atom_count = Some(parsed.atom_count);
        }
        summary.composition_derived += 1;
    }

    fn fill_paths(&self, material: &mut Material, summary: &mut FixSummary) {
        let filled = fill_missing_paths(&self.resolver, std::slice::from_mut(material), None);
        summary.paths_filled += filled.filled;
    }
}

impl RecordNormalizer for Normalizer {
    fn normalize(&self, material: &mut Material) -> FixSummary {
        let mut summary = FixSummary {
            total_materials: 1,
            ..Default::default()
        };
        let opts = self.options;

        if opts.field_rename {
            self.rename_fields(material, &mut summary);
        }
        if opts.type_canonicalize {
            self.canonicalize_type(material, &mut summary);
        }
        if opts.data_source_canonicalize {
            self.canonicalize_data_sources(material, &mut summary);
        }
        if opts.path_normalize {
            self.normalize_paths(material, &mut summary);
        }
        if opts.prune_empty {
            self.prune_empty(material, &mut summary);
        }
        if opts.derive_composition {
            self.derive_composition(material, &mut summary);
        }
        if opts.fill_missing_paths {
            self.fill_paths(material, &mut summary);
        }
        if opts.sort_data_points && material.sort_data() {
            summary.data_reordered += 1;
        }

        if !summary.is_clean() {
            summary.changed_materials = 1;
        }
        summary
    }

    fn normalize_all(&self, materials: &mut [Material]) -> FixSummary {
        let mut total = FixSummary::default();
        for material in materials.iter_mut() {
            total.absorb(&self.normalize(material));
        }
        total
    }
}

// ==========================================
// 路径规范化
// ==========================================

/// 规范化逻辑路径；未变化时返回 None
///
/// 去除前导分隔符，并把整段的 solid_solution / amorphous_metal 替换为连字符形式。
pub fn normalize_path(path: &str) -> Option<String> {
    let stripped = path.trim_start_matches('/');
    let normalized = stripped
        .split('/')
        .map(|segment| {
            LEGACY_TYPE_DIRS
                .iter()
                .find(|(legacy, _)| *legacy == segment)
                .map(|(_, canonical)| *canonical)
                .unwrap_or(segment)
        })
        .collect::<Vec<_>>()
        .join("/");

    (normalized != path).then_some(normalized)
}

fn normalize_path_field(field: &mut Option<String>, summary: &mut FixSummary) {
    if let Some(normalized) = field.as_deref().and_then(normalize_path) {
        *field = Some(normalized);
        summary.path_normalizations += 1;
    }
}

/// 属性中的文件路径字段（structure.rdf / mechanics.stressStrain）
fn normalize_property_paths(point: &mut DataPoint, summary: &mut FixSummary) {
    let Some(properties) = point.properties.as_mut() else {
        return;
    };
    let targets = [
        (PropertyCategory::Structure, "rdf"),
        (PropertyCategory::Mechanics, "stressStrain"),
    ];
    for (category, field) in targets {
        let slot = properties
            .as_map_mut()
            .get_mut(category.key())
            .and_then(Value::as_object_mut)
            .and_then(|map| map.get_mut(field));
        if let Some(Value::String(path)) = slot {
            if let Some(normalized) = normalize_path(path) {
                *path = normalized;
                summary.path_normalizations += 1;
            }
        }
    }
}

// ==========================================
// 空字段清理
// ==========================================

/// 递归删除值为 null / "" 的对象条目，返回删除数量
///
/// 数组逐元素递归，但不按长度删除。
pub fn prune_map(map: &mut serde_json::Map<String, Value>) -> usize {
    let before = map.len();
    map.retain(|_, value| !is_blank(value));
    let mut removed = before - map.len();
    for value in map.values_mut() {
        removed += prune_value(value);
    }
    removed
}

fn prune_value(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => prune_map(map),
        Value::Array(items) => items.iter_mut().map(prune_value).sum(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> Normalizer {
        Normalizer::new(
            NormalizerOptions::default(),
            &BTreeMap::new(),
            PathResolver::default(),
        )
    }

    fn from_json(value: Value) -> Material {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/data/solid_solution/x/DFT/POSCAR"),
            Some("data/solid-solution/x/DFT/POSCAR".to_string())
        );
        assert_eq!(
            normalize_path("data/amorphous_metal/a"),
            Some("data/amorphous-metal/a".to_string())
        );
        // 仅替换整段
        assert_eq!(normalize_path("data/my_solid_solution_x/POSCAR"), None);
        assert_eq!(normalize_path("data/intermetallic/mp-1/DFT/POSCAR"), None);
    }

    #[test]
    fn test_full_fix_pass() {
        let mut material = from_json(json!({
            "ori_source": "mp-1",
            "name": "Al2Cu",
            "type": "solid_solution",
            "composition": "Al2Cu",
            "poscar": "/data/solid_solution/x/DFT/POSCAR",
            "note": "",
            "data": [
                {"temperature": 300, "source": "DPA3", "poscar": "", "properties": {"mechanics": {"youngsModulus": 100, "stressStrain": "/data/ss.dat", "blank": null}}},
                {"temperature": 0, "source": "dft", "properties": {"structure": {"density": 4.3}}}
            ]
        }));

        let summary = normalizer().normalize(&mut material);

        assert_eq!(material.source.as_deref(), Some("mp-1"));
        assert!(!material.extra.contains_key("ori_source"));
        assert!(!material.extra.contains_key("note"));
        assert_eq!(material.material_type, Some(MaterialType::SolidSolution));
        assert_eq!(material.poscar.as_deref(), Some("data/solid-solution/x/DFT/POSCAR"));
        assert_eq!(material.elements, Some(vec!["Al".to_string(), "Cu".to_string()]));

        let points = material.data_points();
        assert_eq!(points[0].source.as_deref(), Some("DFT"));
        assert_eq!(points[1].source.as_deref(), Some("DPA-3"));
        assert!(points[1].poscar.is_none());
        let mechanics = &points[1].properties.as_ref().unwrap().as_map()["mechanics"];
        assert_eq!(mechanics["stressStrain"], json!("data/ss.dat"));
        assert!(mechanics.get("blank").is_none());

        assert_eq!(summary.field_renames, 1);
        assert_eq!(summary.type_fixes, 1);
        assert_eq!(summary.data_source_fixes, 2);
        assert_eq!(summary.path_normalizations, 2);
        assert_eq!(summary.empty_fields_removed, 3);
        assert_eq!(summary.composition_derived, 1);
        assert_eq!(summary.data_reordered, 1);
        assert_eq!(summary.changed_materials, 1);
    }

    #[test]
    fn test_second_pass_is_noop() {
        let mut material = from_json(json!({
            "source": "mp-1",
            "name": "X",
            "type": "solid_solution",
            "composition": "Ni",
            "data": [{"temperature": 0, "source": "DPA1_251208", "properties": {"structure": {"density": 8.9}}}]
        }));

        let n = normalizer();
        let first = n.normalize(&mut material);
        let snapshot = material.clone();
        let second = n.normalize(&mut material);

        assert!(!first.is_clean());
        assert!(second.is_clean());
        assert_eq!(second.changed_materials, 0);
        assert_eq!(material, snapshot);
    }

    #[test]
    fn test_invalid_type_left_untouched() {
        let mut material = from_json(json!({"type": "crystalline"}));
        let summary = normalizer().normalize(&mut material);
        assert_eq!(material.type_str(), "crystalline");
        assert_eq!(summary.type_fixes, 0);
    }

    #[test]
    fn test_malformed_elements_not_rederived() {
        let mut material = from_json(json!({
            "name": "AlNi",
            "composition": "AlNi",
            "elements": "Al,Ni",
            "data": []
        }));

        normalizer().normalize(&mut material);

        assert_eq!(material.elements, None);
        assert_eq!(material.extra["elements"], json!("Al,Ni"));
        // atomCount 缺失照常推导
        assert_eq!(material.atom_count.as_ref().map(|c| c.len()), Some(2));
    }

    #[test]
    fn test_source_present_keeps_legacy_field() {
        let mut material = from_json(json!({"source": "a", "ori_source": "b"}));
        normalizer().normalize(&mut material);
        assert_eq!(material.source.as_deref(), Some("a"));
        assert_eq!(material.extra["ori_source"], json!("b"));
    }

    #[test]
    fn test_toggles_disable_operations() {
        let options = NormalizerOptions {
            type_canonicalize: false,
            sort_data_points: false,
            ..Default::default()
        };
        let n = Normalizer::new(options, &BTreeMap::new(), PathResolver::default());
        let mut material = from_json(json!({
            "type": "solid_solution",
            "data": [
                {"temperature": 300, "source": "DFT"},
                {"temperature": 0, "source": "DFT"}
            ]
        }));

        n.normalize(&mut material);
        assert_eq!(material.type_str(), "solid_solution");
        assert_eq!(material.data_points()[0].temperature, Some(300.0));
    }

    #[test]
    fn test_extra_aliases_extend_builtin_table() {
        let mut extra = BTreeMap::new();
        extra.insert("DPA3_v2".to_string(), "DPA-3".to_string());
        let n = Normalizer::new(NormalizerOptions::default(), &extra, PathResolver::default());

        assert_eq!(n.canonical_data_source("DPA3_v2"), Some("DPA-3"));
        assert_eq!(n.canonical_data_source("DPA1"), Some("DPA-1"));
        assert_eq!(n.canonical_data_source("DFT"), None);
        assert_eq!(n.canonical_data_source("unknown"), None);
    }

    #[test]
    fn test_prune_keeps_array_length() {
        let mut map = json!({"a": [null, {"b": ""}], "c": null})
            .as_object()
            .cloned()
            .unwrap();
        let removed = prune_map(&mut map);
        assert_eq!(removed, 2);
        assert_eq!(Value::Object(map), json!({"a": [null, {}]}));
    }
}
