// ==========================================
// 合金材料数据库 - ID 分配
// ==========================================
// 格式: Alloy-<TypeCode>-<5 位数字>
// 规则: 每个类型代码从数据集中已有最大序号之后递增；序号不复用
// ==========================================

use crate::domain::material::Material;
use crate::domain::report::IdAssignSummary;
use crate::domain::types::{format_material_id, parse_material_id, TypeCode};
use std::collections::HashMap;
use tracing::debug;

/// 5 位序号上限
pub const MAX_ID_NUMBER: u32 = 99_999;

#[derive(Debug, Clone, Default)]
pub struct IdAssigner {
    /// 同时替换已有但不合规的 ID
    rewrite_nonconforming: bool,
}

impl IdAssigner {
    pub fn new(rewrite_nonconforming: bool) -> Self {
        Self {
            rewrite_nonconforming,
        }
    }

    /// 为缺少合规 ID 的记录分配 ID
    pub fn assign(&self, materials: &mut [Material]) -> IdAssignSummary {
        let mut next = next_numbers(materials);
        let mut summary = IdAssignSummary::default();

        for material in materials.iter_mut() {
            let current = material.id.as_deref().filter(|s| !s.trim().is_empty());
            let needs_id = match current {
                None => true,
                Some(id) => self.rewrite_nonconforming && parse_material_id(id).is_none(),
            };
            if !needs_id {
                continue;
            }

            let had_id = current.is_some();
            match allocate(&mut next, material) {
                Some(id) => {
                    debug!(material = %material.display_name(), old = ?material.id, new = %id, "分配 ID");
                    material.id = Some(id);
                    if had_id {
                        summary.rewritten += 1;
                    } else {
                        summary.assigned += 1;
                    }
                }
                None => summary.skipped += 1,
            }
        }

        summary
    }

    /// 为单条新记录分配 ID（序号接在 existing 之后），不改动 existing
    pub fn assign_one(&self, material: &mut Material, existing: &[Material]) -> bool {
        let mut next = next_numbers(existing);
        match allocate(&mut next, material) {
            Some(id) => {
                material.id = Some(id);
                true
            }
            None => false,
        }
    }
}

/// 每个类型代码的下一个可用序号
fn next_numbers(materials: &[Material]) -> HashMap<TypeCode, u32> {
    let mut next: HashMap<TypeCode, u32> = HashMap::new();
    for material in materials {
        if let Some((code, number)) = material.id.as_deref().and_then(parse_material_id) {
            let slot = next.entry(code).or_insert(1);
            *slot = (*slot).max(number + 1);
        }
    }
    next
}

/// 取号；类型非法或序号耗尽时返回 None
fn allocate(next: &mut HashMap<TypeCode, u32>, material: &Material) -> Option<String> {
    let code = material.material_type.as_ref().and_then(|t| t.type_code())?;
    let slot = next.entry(code).or_insert(1);
    if *slot > MAX_ID_NUMBER {
        return None;
    }
    let id = format_material_id(code, *slot);
    *slot += 1;
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::MaterialType;

    fn material(id: Option<&str>, material_type: &str) -> Material {
        Material {
            id: id.map(str::to_string),
            material_type: Some(MaterialType::from(material_type)),
            ..Default::default()
        }
    }

    #[test]
    fn test_assigns_after_highest_per_code() {
        let mut materials = vec![
            material(Some("Alloy-IM-00007"), "intermetallic"),
            material(None, "intermetallic"),
            material(Some("Alloy-IM-00003"), "intermetallic"),
            material(None, "element"),
            material(None, "intermetallic"),
        ];

        let summary = IdAssigner::default().assign(&mut materials);

        assert_eq!(summary.assigned, 3);
        assert_eq!(materials[1].id.as_deref(), Some("Alloy-IM-00008"));
        assert_eq!(materials[3].id.as_deref(), Some("Alloy-E-00001"));
        assert_eq!(materials[4].id.as_deref(), Some("Alloy-IM-00009"));
    }

    #[test]
    fn test_nonconforming_kept_unless_rewrite() {
        let mut materials = vec![material(Some("12"), "solid-solution")];
        let summary = IdAssigner::new(false).assign(&mut materials);
        assert_eq!(summary, IdAssignSummary::default());
        assert_eq!(materials[0].id.as_deref(), Some("12"));

        let summary = IdAssigner::new(true).assign(&mut materials);
        assert_eq!(summary.rewritten, 1);
        assert_eq!(materials[0].id.as_deref(), Some("Alloy-SS-00001"));
    }

    #[test]
    fn test_assign_one_leaves_existing_untouched() {
        let existing = vec![
            material(None, "element"),
            material(Some("Alloy-E-00004"), "element"),
        ];
        let mut incoming = material(None, "element");

        assert!(IdAssigner::default().assign_one(&mut incoming, &existing));
        assert_eq!(incoming.id.as_deref(), Some("Alloy-E-00005"));
        assert!(existing[0].id.is_none());
    }

    #[test]
    fn test_exhausted_numbers_skipped() {
        let mut materials = vec![
            material(Some("Alloy-AM-99999"), "amorphous"),
            material(None, "amorphous"),
        ];
        let summary = IdAssigner::default().assign(&mut materials);
        assert_eq!(summary.skipped, 1);
        assert!(materials[1].id.is_none());
    }

    #[test]
    fn test_invalid_type_skipped() {
        let mut materials = vec![material(None, "crystalline"), Material::default()];
        let summary = IdAssigner::default().assign(&mut materials);
        assert_eq!(summary.skipped, 2);
        assert!(materials[0].id.is_none());
    }
}
