// ==========================================
// 合金材料数据库 - 身份匹配与重复检测
// ==========================================
// 身份键: (lowercase(name), source, type, 规范化 composition)
// 职责: 同批次 / 跨批次重复检测 + 更新计划拆分
// 红线: 四项精确相等，不做模糊匹配
// ==========================================

use crate::domain::material::Material;
use crate::domain::report::{CrossMatch, DuplicatePair, PlannedUpdate, UpdatePlan};
use crate::importer::composition::normalize_composition;
use crate::importer::material_importer_trait::IdentityResolver;
use std::collections::HashMap;
use std::fmt;

// ==========================================
// IdentityKey - 身份键
// ==========================================
// 缺失字段按空字符串参与比较
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub name: String,
    pub source: String,
    pub material_type: String,
    pub composition: String,
}

impl IdentityKey {
    pub fn of(material: &Material) -> Self {
        Self {
            name: material.name.as_deref().unwrap_or("").to_lowercase(),
            source: material.source.clone().unwrap_or_default(),
            material_type: material.type_str().to_string(),
            composition: normalize_composition(material.composition.as_deref().unwrap_or("")),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.name, self.source, self.material_type, self.composition
        )
    }
}

/// 两条记录是否为同一物理材料（对称）
pub fn materials_match(a: &Material, b: &Material) -> bool {
    IdentityKey::of(a) == IdentityKey::of(b)
}

pub struct ConflictHandler;

impl ConflictHandler {
    /// 拆分更新计划: 命中已有记录 → updates；否则 → additions
    ///
    /// 同批次内重复的后续记录并入同一目标: 目标为新增记录时，
    /// existing_index 指向追加后的位置（existing.len() + 新增序号）。
    pub fn plan_update(&self, incoming: &[Material], existing: &[Material]) -> UpdatePlan {
        let mut index = build_index(existing);
        let mut plan = UpdatePlan::default();

        for material in incoming {
            let key = IdentityKey::of(material);
            match index.get(&key) {
                Some(&existing_index) => plan.updates.push(PlannedUpdate {
                    existing_index,
                    incoming: material.clone(),
                }),
                None => {
                    index.insert(key, existing.len() + plan.additions.len());
                    plan.additions.push(material.clone());
                }
            }
        }

        plan
    }
}

/// 身份键 → 首次出现下标
fn build_index(materials: &[Material]) -> HashMap<IdentityKey, usize> {
    let mut index = HashMap::new();
    for (i, material) in materials.iter().enumerate() {
        index.entry(IdentityKey::of(material)).or_insert(i);
    }
    index
}

impl IdentityResolver for ConflictHandler {
    /// 检测同批次重复
    ///
    /// # 返回
    /// - Vec<DuplicatePair>: 重复记录列表（不包括第一次出现）
    fn detect_duplicates(&self, materials: &[Material]) -> Vec<DuplicatePair> {
        let mut first_occurrence: HashMap<IdentityKey, usize> = HashMap::new();
        let mut duplicates = Vec::new();

        for (i, material) in materials.iter().enumerate() {
            let key = IdentityKey::of(material);
            match first_occurrence.get(&key) {
                Some(&first_index) => duplicates.push(DuplicatePair {
                    first_index,
                    duplicate_index: i,
                    key: key.to_string(),
                }),
                None => {
                    first_occurrence.insert(key, i);
                }
            }
        }

        duplicates
    }

    fn detect_cross_batch_duplicates(
        &self,
        incoming: &[Material],
        existing: &[Material],
    ) -> Vec<CrossMatch> {
        let index = build_index(existing);
        incoming
            .iter()
            .enumerate()
            .filter_map(|(incoming_index, material)| {
                index
                    .get(&IdentityKey::of(material))
                    .map(|&existing_index| CrossMatch {
                        incoming_index,
                        existing_index,
                        existing_id: existing[existing_index].id.clone(),
                    })
            })
            .collect()
    }

    fn find_match(&self, candidate: &Material, existing: &[Material]) -> Option<usize> {
        existing.iter().position(|m| materials_match(candidate, m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::material::{DataPoint, DataSeries};
    use crate::domain::types::MaterialType;

    fn material(name: &str, source: &str, composition: &str) -> Material {
        Material {
            name: Some(name.to_string()),
            source: Some(source.to_string()),
            material_type: Some(MaterialType::Intermetallic),
            composition: Some(composition.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_match_ignores_name_case_and_composition_whitespace() {
        let mut a = material("Al2Cu", "mp-1", "Al2Cu");
        a.data = Some(DataSeries::Points(vec![DataPoint::new(0.0, "DFT")]));
        let mut b = material("AL2CU", "mp-1", " al2 cu ");
        b.data = Some(DataSeries::Points(vec![DataPoint::new(300.0, "DPA-3")]));

        assert!(materials_match(&a, &b));
        assert!(materials_match(&b, &a));
    }

    #[test]
    fn test_source_and_type_are_exact() {
        let a = material("Al2Cu", "mp-1", "Al2Cu");
        let b = material("Al2Cu", "MP-1", "Al2Cu");
        assert!(!materials_match(&a, &b));

        let mut c = material("Al2Cu", "mp-1", "Al2Cu");
        c.material_type = Some(MaterialType::Amorphous);
        assert!(!materials_match(&a, &c));
    }

    #[test]
    fn test_find_match_returns_first() {
        let existing = vec![
            material("X", "s", "Ni"),
            material("Al2Cu", "mp-1", "Al2Cu"),
            material("al2cu", "mp-1", "Al2Cu"),
        ];
        let candidate = material("Al2Cu", "mp-1", "Al2Cu");

        assert_eq!(ConflictHandler.find_match(&candidate, &existing), Some(1));
        assert_eq!(
            ConflictHandler.find_match(&material("new", "s", "W"), &existing),
            None
        );
    }

    #[test]
    fn test_detect_duplicates_keeps_first() {
        let batch = vec![
            material("A", "s", "Al"),
            material("B", "s", "Ni"),
            material("a", "s", "al"),
        ];
        let duplicates = ConflictHandler.detect_duplicates(&batch);
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].first_index, 0);
        assert_eq!(duplicates[0].duplicate_index, 2);
    }

    #[test]
    fn test_cross_batch_and_plan() {
        let mut stored = material("A", "s", "Al");
        stored.id = Some("Alloy-IM-00001".into());
        let existing = vec![stored];
        let incoming = vec![material("A", "s", "Al"), material("B", "s", "Ni")];

        let matches = ConflictHandler.detect_cross_batch_duplicates(&incoming, &existing);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].existing_id.as_deref(), Some("Alloy-IM-00001"));

        let plan = ConflictHandler.plan_update(&incoming, &existing);
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].existing_index, 0);
        assert_eq!(plan.additions.len(), 1);
        assert_eq!(plan.additions[0].name.as_deref(), Some("B"));
    }

    #[test]
    fn test_plan_routes_batch_duplicate_to_addition() {
        let existing = vec![material("A", "s", "Al")];
        let incoming = vec![material("B", "s", "Ni"), material("b", "s", "NI")];

        let plan = ConflictHandler.plan_update(&incoming, &existing);
        assert_eq!(plan.additions.len(), 1);
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].existing_index, 1);
    }
}
