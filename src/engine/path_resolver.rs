// ==========================================
// 合金材料数据库 - 结构文件路径推导
// ==========================================
// 职责: 按材料类型推导 POSCAR 逻辑路径（按 type 分派的策略表）
// 红线: 纯函数，不访问文件系统；存在性检查由注入的 PathExists 提供
// ==========================================
// 约定:
//   intermetallic  → <root>/intermetallic/<source>/<dataSource>/POSCAR
//   element        → <root>/element/<El>/<lattice>
//   solid-solution → <root>/solid-solution/<lattice>_Al<n>_Cu<n>_Nb<n>_Ni<n>_Ta<n>_W<n>_Zr<n>/<dataSource>/POSCAR
//   amorphous / interface → <root>/<type-dir>/<source>/<dataSource>/POSCAR
// ==========================================

use crate::domain::material::{DataPoint, Material};
use crate::domain::report::PathSummary;
use crate::domain::types::MaterialType;
use thiserror::Error;
use tracing::debug;

/// 固溶体目录名的元素顺序
pub const SOLID_SOLUTION_ELEMENTS: [&str; 7] = ["Al", "Cu", "Nb", "Ni", "Ta", "W", "Zr"];

/// 晶格类型
pub const LATTICES: [&str; 3] = ["bcc", "fcc", "hcp"];

/// 缺省数据来源目录
pub const DEFAULT_DATA_SOURCE_DIR: &str = "DFT";

/// 路径推导失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathResolveError {
    #[error("材料类型无法推导路径: {0}")]
    UnsupportedType(String),

    #[error("缺少材料来源 (source)")]
    MissingSource,

    #[error("无法从名称确定晶格类型: {0}")]
    MissingLattice(String),

    #[error("无法确定元素符号: {0}")]
    MissingElement(String),
}

// ==========================================
// PathExists - 存在性谓词（外部注入）
// ==========================================
pub trait PathExists {
    fn exists(&self, logical_path: &str) -> bool;
}

impl<F> PathExists for F
where
    F: Fn(&str) -> bool,
{
    fn exists(&self, logical_path: &str) -> bool {
        self(logical_path)
    }
}

// ==========================================
// PathResolver
// ==========================================
#[derive(Debug, Clone)]
pub struct PathResolver {
    data_root: String,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new("data")
    }
}

impl PathResolver {
    pub fn new(data_root: &str) -> Self {
        Self {
            data_root: data_root.trim_matches('/').to_string(),
        }
    }

    pub fn data_root(&self) -> &str {
        &self.data_root
    }

    /// 材料顶层 poscar（基准结构，数据来源取 DFT）
    pub fn resolve_material(&self, material: &Material) -> Result<String, PathResolveError> {
        self.resolve(material, DEFAULT_DATA_SOURCE_DIR)
    }

    /// 数据点 poscar（init 条目使用 init 目录）
    pub fn resolve_data_point(
        &self,
        material: &Material,
        point: &DataPoint,
    ) -> Result<String, PathResolveError> {
        let data_source = point
            .source
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_DATA_SOURCE_DIR);
        self.resolve(material, data_source)
    }

    fn resolve(&self, material: &Material, data_source: &str) -> Result<String, PathResolveError> {
        let material_type = material
            .material_type
            .as_ref()
            .ok_or_else(|| PathResolveError::UnsupportedType(String::new()))?;

        match material_type {
            MaterialType::Element => self.element_path(material),
            MaterialType::SolidSolution => self.solid_solution_path(material, data_source),
            MaterialType::Intermetallic | MaterialType::Amorphous | MaterialType::Interface => {
                self.source_keyed_path(material, material_type, data_source)
            }
            MaterialType::Other(raw) => Err(PathResolveError::UnsupportedType(raw.clone())),
        }
    }

    fn source_keyed_path(
        &self,
        material: &Material,
        material_type: &MaterialType,
        data_source: &str,
    ) -> Result<String, PathResolveError> {
        let type_dir = material_type
            .type_dir()
            .ok_or_else(|| PathResolveError::UnsupportedType(material_type.to_string()))?;
        let source = material
            .source
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(PathResolveError::MissingSource)?;
        Ok(self.join(&[type_dir, source, data_source, "POSCAR"]))
    }

    fn element_path(&self, material: &Material) -> Result<String, PathResolveError> {
        let name = material.name.as_deref().unwrap_or("");
        let lattice = lattice_suffix(name)
            .ok_or_else(|| PathResolveError::MissingLattice(name.to_string()))?;
        let element = element_symbol(material)
            .ok_or_else(|| PathResolveError::MissingElement(name.to_string()))?;
        Ok(self.join(&["element", &element, lattice]))
    }

    fn solid_solution_path(
        &self,
        material: &Material,
        data_source: &str,
    ) -> Result<String, PathResolveError> {
        let name = material.name.as_deref().unwrap_or("");
        let lattice = lattice_prefix(name)
            .ok_or_else(|| PathResolveError::MissingLattice(name.to_string()))?;
        let dir = solid_solution_dir(lattice, material);
        Ok(self.join(&["solid-solution", &dir, data_source, "POSCAR"]))
    }

    fn join(&self, segments: &[&str]) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(segments.len() + 1);
        if !self.data_root.is_empty() {
            parts.push(&self.data_root);
        }
        parts.extend_from_slice(segments);
        parts.join("/")
    }

    /// 旧版 intermetallic 路径（缺少数据来源目录）→ .../DFT/POSCAR
    ///
    /// 已含数据来源目录的路径返回 None。
    pub fn upgrade_legacy_path(&self, path: &str) -> Option<String> {
        let segments: Vec<&str> = path.split('/').collect();
        let type_idx = segments.iter().position(|s| *s == "intermetallic")?;
        let rest = &segments[type_idx + 1..];
        if rest.len() != 2 || rest[1] != "POSCAR" || rest[0].is_empty() {
            return None;
        }

        let mut upgraded: Vec<&str> = segments[..=type_idx].to_vec();
        upgraded.push(rest[0]);
        upgraded.push(DEFAULT_DATA_SOURCE_DIR);
        upgraded.push("POSCAR");
        Some(upgraded.join("/"))
    }
}

/// 固溶体目录名: <lattice>_Al<n>_Cu<n>_..._Zr<n>
pub fn solid_solution_dir(lattice: &str, material: &Material) -> String {
    let counts = material.atom_count.as_ref();
    let mut dir = lattice.to_string();
    for element in SOLID_SOLUTION_ELEMENTS {
        let n = counts.and_then(|c| c.get(element)).copied().unwrap_or(0);
        dir.push_str(&format!("_{}{}", element, n));
    }
    dir
}

/// 名称前缀中的晶格类型（"bcc_Zr24" → bcc）
pub fn lattice_prefix(name: &str) -> Option<&'static str> {
    let lower = name.to_ascii_lowercase();
    LATTICES.into_iter().find(|l| lower.starts_with(l))
}

/// 名称后缀中的晶格类型（"Al-fcc" → fcc）
pub fn lattice_suffix(name: &str) -> Option<&'static str> {
    let lower = name.to_ascii_lowercase();
    LATTICES
        .into_iter()
        .filter_map(|l| lower.find(&format!("-{}", l)).map(|pos| (pos, l)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, l)| l)
}

/// 元素符号: elements[0] → atomCount 首键 → 名称前缀
fn element_symbol(material: &Material) -> Option<String> {
    if let Some(first) = material.elements.as_ref().and_then(|e| e.first()) {
        return Some(first.clone());
    }
    if let Some(first) = material.atom_count.as_ref().and_then(|c| c.keys().next()) {
        return Some(first.clone());
    }
    material
        .name
        .as_deref()
        .and_then(|n| n.split('-').next())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ==========================================
// 路径维护任务
// ==========================================

fn accept(path: &str, exists: Option<&dyn PathExists>) -> bool {
    exists.map(|e| e.exists(path)).unwrap_or(true)
}

/// 补全缺失的顶层与数据点 poscar
///
/// 提供 exists 时仅写入确认存在的路径。
pub fn fill_missing_paths(
    resolver: &PathResolver,
    materials: &mut [Material],
    exists: Option<&dyn PathExists>,
) -> PathSummary {
    let mut summary = PathSummary::default();

    for material in materials.iter_mut() {
        if material.poscar.as_deref().map_or(true, str::is_empty) {
            match resolver.resolve_material(material) {
                Ok(path) if accept(&path, exists) => {
                    debug!(material = %material.display_name(), path = %path, "补全顶层 poscar");
                    material.poscar = Some(path);
                    summary.filled += 1;
                }
                _ => summary.unresolved += 1,
            }
        }

        let snapshot = material.clone();
        if let Some(points) = material.data_points_mut() {
            for point in points.iter_mut() {
                if point.poscar.as_deref().map_or(false, |p| !p.is_empty()) {
                    continue;
                }
                match resolver.resolve_data_point(&snapshot, point) {
                    Ok(path) if accept(&path, exists) => {
                        point.poscar = Some(path);
                        summary.filled += 1;
                    }
                    _ => summary.unresolved += 1,
                }
            }
        }
    }

    summary
}

/// 旧版 intermetallic 路径升级（顶层与数据点）
pub fn upgrade_legacy_paths(resolver: &PathResolver, materials: &mut [Material]) -> PathSummary {
    let mut summary = PathSummary::default();

    for material in materials.iter_mut() {
        if material.material_type != Some(MaterialType::Intermetallic) {
            continue;
        }
        if let Some(upgraded) = material
            .poscar
            .as_deref()
            .and_then(|p| resolver.upgrade_legacy_path(p))
        {
            material.poscar = Some(upgraded);
            summary.upgraded += 1;
        }
        if let Some(points) = material.data_points_mut() {
            for point in points.iter_mut() {
                if let Some(upgraded) = point
                    .poscar
                    .as_deref()
                    .and_then(|p| resolver.upgrade_legacy_path(p))
                {
                    point.poscar = Some(upgraded);
                    summary.upgraded += 1;
                }
            }
        }
    }

    summary
}

/// 删除指向不存在文件的顶层 poscar
pub fn clean_invalid_paths(materials: &mut [Material], exists: &dyn PathExists) -> PathSummary {
    let mut summary = PathSummary::default();

    for material in materials.iter_mut() {
        let invalid = material
            .poscar
            .as_deref()
            .map_or(false, |p| !exists.exists(p));
        if invalid {
            debug!(material = %material.display_name(), "移除无效 poscar");
            material.poscar = None;
            summary.removed += 1;
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::material::DataSeries;
    use std::collections::BTreeMap;

    fn material(name: &str, material_type: &str, source: &str, counts: &[(&str, u32)]) -> Material {
        let atom_count: BTreeMap<String, u32> =
            counts.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        Material {
            name: Some(name.to_string()),
            source: Some(source.to_string()),
            material_type: Some(MaterialType::from(material_type)),
            elements: Some(counts.iter().map(|(k, _)| k.to_string()).collect()),
            atom_count: Some(atom_count),
            ..Default::default()
        }
    }

    #[test]
    fn test_intermetallic_path() {
        let resolver = PathResolver::default();
        let m = material("Al2Cu", "intermetallic", "mp-985806", &[("Al", 2), ("Cu", 1)]);
        assert_eq!(
            resolver.resolve_material(&m).unwrap(),
            "data/intermetallic/mp-985806/DFT/POSCAR"
        );

        let point = DataPoint::new(300.0, "DPA-3");
        assert_eq!(
            resolver.resolve_data_point(&m, &point).unwrap(),
            "data/intermetallic/mp-985806/DPA-3/POSCAR"
        );
    }

    #[test]
    fn test_element_path_from_name_suffix() {
        let resolver = PathResolver::default();
        let m = material("Al-FCC", "element", "Al-fcc", &[("Al", 1)]);
        assert_eq!(resolver.resolve_material(&m).unwrap(), "data/element/Al/fcc");

        let no_lattice = material("Al", "element", "Al", &[("Al", 1)]);
        assert!(matches!(
            resolver.resolve_material(&no_lattice),
            Err(PathResolveError::MissingLattice(_))
        ));
    }

    #[test]
    fn test_solid_solution_dir_uses_fixed_order() {
        let resolver = PathResolver::new("/data/");
        let m = material("bcc_Zr24", "solid-solution", "x", &[("Zr", 24), ("Al", 2)]);
        assert_eq!(
            resolver.resolve_material(&m).unwrap(),
            "data/solid-solution/bcc_Al2_Cu0_Nb0_Ni0_Ta0_W0_Zr24/DFT/POSCAR"
        );
    }

    #[test]
    fn test_unsupported_type() {
        let resolver = PathResolver::default();
        let m = material("x", "crystalline", "x", &[]);
        assert!(matches!(
            resolver.resolve_material(&m),
            Err(PathResolveError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_upgrade_legacy_path() {
        let resolver = PathResolver::default();
        assert_eq!(
            resolver.upgrade_legacy_path("data/intermetallic/mp-1/POSCAR"),
            Some("data/intermetallic/mp-1/DFT/POSCAR".to_string())
        );
        assert_eq!(resolver.upgrade_legacy_path("data/intermetallic/mp-1/DFT/POSCAR"), None);
        assert_eq!(resolver.upgrade_legacy_path("data/intermetallic/mp-1/init/POSCAR"), None);
    }

    #[test]
    fn test_fill_missing_paths_with_predicate() {
        let resolver = PathResolver::default();
        let mut m = material("Al2Cu", "intermetallic", "mp-1", &[("Al", 2), ("Cu", 1)]);
        m.data = Some(DataSeries::Points(vec![
            DataPoint::new(0.0, "DFT"),
            DataPoint::new(300.0, "DPA-3"),
        ]));
        let mut materials = vec![m];

        let only_dft = |p: &str| p.contains("/DFT/");
        let summary = fill_missing_paths(&resolver, &mut materials, Some(&only_dft));

        assert_eq!(summary.filled, 2);
        assert_eq!(summary.unresolved, 1);
        assert!(materials[0].data_points()[1].poscar.is_none());
    }

    #[test]
    fn test_clean_invalid_paths() {
        let mut materials = vec![
            Material {
                poscar: Some("data/a/POSCAR".into()),
                ..Default::default()
            },
            Material {
                poscar: Some("data/b/POSCAR".into()),
                ..Default::default()
            },
        ];
        let exists = |p: &str| p == "data/a/POSCAR";
        let summary = clean_invalid_paths(&mut materials, &exists);

        assert_eq!(summary.removed, 1);
        assert!(materials[0].poscar.is_some());
        assert!(materials[1].poscar.is_none());
    }
}
