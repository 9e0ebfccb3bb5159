// ==========================================
// 合金材料数据库 - 合并引擎
// ==========================================
// 模式:
//   full       整体替换，保留已有 id
//   partial    非空字段覆盖；数据点按 (temperature, source) 匹配后深度合并
//   add-temp / add-source  仅追加新的 (temperature, source) 数据点
// 红线: 不删除已有数据点与字段；合并后数据点重新排序
// ==========================================

use crate::domain::material::{is_blank, DataPoint, DataSeries, Material, Properties};
use crate::domain::types::UpdateMode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// 单次合并统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub fields_overwritten: usize, // 覆盖的字段数（含属性字段）
    pub points_merged: usize,      // 深度合并的数据点
    pub points_added: usize,       // 追加的数据点
    pub replaced: bool,            // full 模式整体替换
}

pub struct MergeEngine;

impl MergeEngine {
    pub fn merge(
        &self,
        existing: &Material,
        incoming: &Material,
        mode: UpdateMode,
    ) -> (Material, MergeStats) {
        let (mut merged, stats) = match mode {
            UpdateMode::Full => self.merge_full(existing, incoming),
            UpdateMode::Partial => self.merge_partial(existing, incoming),
            UpdateMode::AddTemp | UpdateMode::AddSource => self.merge_additive(existing, incoming),
        };
        merged.drop_shadowed_raw();
        merged.sort_data();

        debug!(
            material = %merged.display_name(),
            mode = %mode,
            overwritten = stats.fields_overwritten,
            merged = stats.points_merged,
            added = stats.points_added,
            "合并完成"
        );
        (merged, stats)
    }

    fn merge_full(&self, existing: &Material, incoming: &Material) -> (Material, MergeStats) {
        let mut merged = incoming.clone();
        if existing.id.is_some() {
            merged.id = existing.id.clone();
        }
        let stats = MergeStats {
            replaced: true,
            ..Default::default()
        };
        (merged, stats)
    }

    fn merge_partial(&self, existing: &Material, incoming: &Material) -> (Material, MergeStats) {
        let mut merged = existing.clone();
        let mut stats = MergeStats::default();

        // ===== 顶层字段（id / data 除外）=====
        overwrite_str(&mut merged.source, &incoming.source, &mut stats);
        overwrite_str(&mut merged.name, &incoming.name, &mut stats);
        overwrite_str(&mut merged.composition, &incoming.composition, &mut stats);
        overwrite_str(&mut merged.poscar, &incoming.poscar, &mut stats);
        if incoming.material_type.is_some() && merged.material_type != incoming.material_type {
            merged.material_type = incoming.material_type.clone();
            stats.fields_overwritten += 1;
        }
        if incoming.elements.is_some() && merged.elements != incoming.elements {
            merged.elements = incoming.elements.clone();
            stats.fields_overwritten += 1;
        }
        if incoming.atom_count.is_some() && merged.atom_count != incoming.atom_count {
            merged.atom_count = incoming.atom_count.clone();
            stats.fields_overwritten += 1;
        }
        stats.fields_overwritten += merge_map_non_blank(&mut merged.extra, &incoming.extra, false);

        // ===== 数据点 =====
        let incoming_points = incoming.data_points();
        match merged.data_points_mut() {
            Some(points) => {
                for point in incoming_points {
                    match points.iter_mut().find(|p| p.same_slot(point)) {
                        Some(target) => {
                            stats.fields_overwritten += merge_data_point(target, point);
                            stats.points_merged += 1;
                        }
                        None => {
                            points.push(point.clone());
                            stats.points_added += 1;
                        }
                    }
                }
            }
            None => {
                if incoming.data.is_some() {
                    stats.points_added += incoming_points.len();
                    merged.data = incoming.data.clone();
                }
            }
        }

        (merged, stats)
    }

    fn merge_additive(&self, existing: &Material, incoming: &Material) -> (Material, MergeStats) {
        let mut merged = existing.clone();
        let mut stats = MergeStats::default();

        if merged.data_points_mut().is_none() {
            merged.data = Some(DataSeries::Points(Vec::new()));
        }
        if let Some(points) = merged.data_points_mut() {
            for point in incoming.data_points() {
                if !points.iter().any(|p| p.same_slot(point)) {
                    points.push(point.clone());
                    stats.points_added += 1;
                }
            }
        }

        (merged, stats)
    }
}

fn overwrite_str(target: &mut Option<String>, incoming: &Option<String>, stats: &mut MergeStats) {
    if let Some(value) = incoming.as_deref().filter(|s| !s.is_empty()) {
        if target.as_deref() != Some(value) {
            *target = Some(value.to_string());
            stats.fields_overwritten += 1;
        }
    }
}

/// 数据点深度合并，返回覆盖字段数
fn merge_data_point(target: &mut DataPoint, incoming: &DataPoint) -> usize {
    let mut overwritten = 0;

    if let Some(poscar) = incoming.poscar.as_deref().filter(|s| !s.is_empty()) {
        if target.poscar.as_deref() != Some(poscar) {
            target.poscar = Some(poscar.to_string());
            overwritten += 1;
        }
    }
    overwritten += merge_map_non_blank(&mut target.extra, &incoming.extra, false);

    if let Some(incoming_props) = incoming.properties.as_ref() {
        let props = target.properties.get_or_insert_with(Properties::new);
        overwritten += merge_map_non_blank(props.as_map_mut(), incoming_props.as_map(), true);
    }

    overwritten
}

/// 非空覆盖合并；deep 为 true 时对象与对象逐层合并
fn merge_map_non_blank(
    target: &mut Map<String, Value>,
    incoming: &Map<String, Value>,
    deep: bool,
) -> usize {
    let mut overwritten = 0;

    for (key, value) in incoming {
        if is_blank(value) {
            continue;
        }
        if deep {
            if let (Some(Value::Object(existing)), Value::Object(incoming_obj)) =
                (target.get_mut(key), value)
            {
                overwritten += merge_map_non_blank(existing, incoming_obj, true);
                continue;
            }
        }
        if target.get(key) == Some(value) {
            continue;
        }
        target.insert(key.clone(), value.clone());
        overwritten += 1;
    }

    overwritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn material(value: Value) -> Material {
        serde_json::from_value(value).unwrap()
    }

    fn existing() -> Material {
        material(json!({
            "id": "Alloy-IM-00001",
            "name": "Al2Cu",
            "source": "mp-1",
            "type": "intermetallic",
            "composition": "Al2Cu",
            "poscar": "data/intermetallic/mp-1/DFT/POSCAR",
            "data": [{"temperature": 0, "source": "DFT", "properties": {"mechanics": {"youngsModulus": 180}}}]
        }))
    }

    #[test]
    fn test_add_temp_appends_without_modifying() {
        let incoming = material(json!({
            "name": "Al2Cu",
            "data": [{"temperature": 300, "source": "DFT", "properties": {"mechanics": {"poissonsRatio": 0.3}}}]
        }));

        let (merged, stats) = MergeEngine.merge(&existing(), &incoming, UpdateMode::AddTemp);
        let points = merged.data_points();

        assert_eq!(points.len(), 2);
        assert_eq!(stats.points_added, 1);
        assert_eq!(points[0], existing().data_points()[0]);
        assert_eq!(points[1].temperature, Some(300.0));
        assert_eq!(merged.poscar, existing().poscar);
    }

    #[test]
    fn test_add_source_skips_existing_slot() {
        let incoming = material(json!({
            "data": [
                {"temperature": 0, "source": "DFT", "properties": {"mechanics": {"youngsModulus": 1}}},
                {"temperature": 0, "source": "DPA-3", "properties": {"mechanics": {"youngsModulus": 2}}}
            ]
        }));

        let (merged, stats) = MergeEngine.merge(&existing(), &incoming, UpdateMode::AddSource);
        assert_eq!(stats.points_added, 1);
        assert_eq!(
            merged.data_points()[0].properties.as_ref().unwrap().as_map()["mechanics"]["youngsModulus"],
            json!(180)
        );
        assert_eq!(merged.data_points()[1].source.as_deref(), Some("DPA-3"));
    }

    #[test]
    fn test_partial_deep_merges_matching_point() {
        let incoming = material(json!({
            "name": "Al2Cu",
            "poscar": "",
            "data": [{"temperature": 0, "source": "DFT", "properties": {"mechanics": {"poissonsRatio": 0.3}}}]
        }));

        let (merged, stats) = MergeEngine.merge(&existing(), &incoming, UpdateMode::Partial);
        let points = merged.data_points();

        assert_eq!(points.len(), 1);
        let mechanics = &points[0].properties.as_ref().unwrap().as_map()["mechanics"];
        assert_eq!(mechanics["youngsModulus"], json!(180));
        assert_eq!(mechanics["poissonsRatio"], json!(0.3));
        assert_eq!(stats.points_merged, 1);
        // 空字符串不覆盖
        assert_eq!(merged.poscar, existing().poscar);
    }

    #[test]
    fn test_partial_overwrites_non_empty_and_keeps_id() {
        let incoming = material(json!({
            "id": "Alloy-IM-99999",
            "name": "Al2Cu (relaxed)",
            "customField": {"note": "x"},
            "data": [{"temperature": 600, "source": "DFT", "properties": {"structure": {"density": 4.1}}}]
        }));

        let (merged, _) = MergeEngine.merge(&existing(), &incoming, UpdateMode::Partial);
        assert_eq!(merged.id.as_deref(), Some("Alloy-IM-00001"));
        assert_eq!(merged.name.as_deref(), Some("Al2Cu (relaxed)"));
        assert_eq!(merged.extra["customField"], json!({"note": "x"}));
        assert_eq!(merged.data_points().len(), 2);
    }

    #[test]
    fn test_partial_nested_objects_merge_per_field() {
        let base = material(json!({
            "data": [{"temperature": 0, "source": "DFT",
                      "properties": {"structure": {"latticeParameters": {"a": 3.5, "b": 3.5}}}}]
        }));
        let incoming = material(json!({
            "data": [{"temperature": 0, "source": "DFT",
                      "properties": {"structure": {"latticeParameters": {"b": 3.6, "c": null}}}}]
        }));

        let (merged, stats) = MergeEngine.merge(&base, &incoming, UpdateMode::Partial);
        let lattice = &merged.data_points()[0].properties.as_ref().unwrap().as_map()["structure"]["latticeParameters"];
        assert_eq!(lattice, &json!({"a": 3.5, "b": 3.6}));
        assert_eq!(stats.fields_overwritten, 1);
    }

    #[test]
    fn test_full_replaces_but_keeps_id_and_sorts() {
        let incoming = material(json!({
            "id": "Alloy-IM-00002",
            "name": "Al2Cu",
            "data": [
                {"temperature": 300, "source": "DFT", "properties": {"structure": {"density": 4.2}}},
                {"temperature": 0, "source": "DFT", "properties": {"structure": {"density": 4.3}}}
            ]
        }));

        let (merged, stats) = MergeEngine.merge(&existing(), &incoming, UpdateMode::Full);
        assert!(stats.replaced);
        assert_eq!(merged.id.as_deref(), Some("Alloy-IM-00001"));
        assert!(merged.poscar.is_none());
        assert_eq!(merged.data_points()[0].temperature, Some(0.0));
    }
}
