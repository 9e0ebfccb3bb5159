// ==========================================
// 合金材料数据库 - 表格导入器
// ==========================================
// 职责: 原始行分组（name + source）→ 每组一条 Material
// 红线: 组内保持行顺序；组间保持首次出现顺序
// ==========================================

use crate::domain::material::Material;
use crate::domain::report::IngestWarning;
use crate::importer::error::ImportResult;
use crate::importer::field_mapper::{FieldMapper, UNKNOWN_SOURCE};
use crate::importer::file_parser::{InputFormat, RawRow, TabularParser};
use crate::importer::material_importer_trait::FieldMapper as FieldMapperTrait;
use std::collections::HashMap;
use tracing::{debug, warn};

/// 表格导入结果
#[derive(Debug, Clone, Default)]
pub struct TabularOutput {
    pub total_rows: usize,
    pub materials: Vec<Material>,
    pub warnings: Vec<IngestWarning>,
}

pub struct TabularIngestor {
    mapper: FieldMapper,
}

impl TabularIngestor {
    pub fn new(mapper: FieldMapper) -> Self {
        Self { mapper }
    }

    /// 解析表格文本并转换
    pub fn ingest_text(&self, content: &str, format: InputFormat) -> ImportResult<TabularOutput> {
        let parser = match format {
            InputFormat::Tsv => TabularParser::tsv(),
            _ => TabularParser::csv(),
        };
        let rows = parser.parse_text(content)?;
        Ok(self.ingest_rows(&rows))
    }

    /// 原始行 → 材料记录
    pub fn ingest_rows(&self, rows: &[RawRow]) -> TabularOutput {
        let groups = group_rows(rows);
        debug!(rows = rows.len(), groups = groups.len(), "行分组完成");

        let mut warnings = Vec::new();
        let materials: Vec<Material> = groups
            .iter()
            .filter_map(|group| self.mapper.map_group(group, &mut warnings))
            .collect();

        for warning in &warnings {
            warn!(
                row_number = warning.row_number,
                column = warning.column.as_deref().unwrap_or(""),
                "{}",
                warning.message
            );
        }

        TabularOutput {
            total_rows: rows.len(),
            materials,
            warnings,
        }
    }
}

/// 分组键: name + (source 或 Unknown)
pub fn group_key(row: &RawRow) -> (String, String) {
    (
        row.get("name").unwrap_or("").to_string(),
        row.non_empty("source").unwrap_or(UNKNOWN_SOURCE).to_string(),
    )
}

/// 按 (name, source) 分组，保持首次出现顺序
pub fn group_rows(rows: &[RawRow]) -> Vec<Vec<RawRow>> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<Vec<RawRow>> = Vec::new();

    for row in rows {
        let key = group_key(row);
        match index.get(&key) {
            Some(&slot) => groups[slot].push(row.clone()),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![row.clone()]);
            }
        }
    }

    groups
}

// ==========================================
// CSV 模板
// ==========================================

/// 模板表头（扁平列约定）
pub const TEMPLATE_HEADER: &str = "name,source,type,composition,poscar,temperature,data_source,data_poscar,density,lattice_a,lattice_b,lattice_c,lattice_alpha,lattice_beta,lattice_gamma,point_group,rdf,specific_heat,mixing_enthalpy,diffusion_coefficient,thermal_expansion,youngs_modulus,bulk_modulus,shear_modulus,poissons_ratio,elastic_constants,stress_strain,vacancy_formation_energy,interstitial_formation_energy_dumbbell111,interstitial_formation_energy_dumbbell100,interstitial_formation_energy_crowdion111,interstitial_formation_energy_octahedral,interstitial_formation_energy_tetrahedral,stacking_fault_energy";

/// 生成 CSV 模板（含两个温度点示例）
pub fn csv_template() -> String {
    let rows = [
        "Al2Cu4,mp-0000,solid-solution,Al2Cu4,data/solid-solution/fcc_Al2_Cu4_Nb0_Ni0_Ta0_W0_Zr0/DFT/POSCAR,0,DFT,,2.85,3.52,3.52,3.52,90,90,90,Fm-3m,data/rdf/sample.dat,0.45,-0.25,1.2e-10,1.5e-5,200,160,80,0.3,\"[[230,135,135,0,0,0],[135,230,135,0,0,0],[135,135,230,0,0,0],[0,0,0,118,0,0],[0,0,0,0,118,0],[0,0,0,0,0,118]]\",data/stress-strain/sample.dat,1.2,3.5,3.8,4.2,,,0.05",
        "Al2Cu4,mp-0000,solid-solution,Al2Cu4,,300,DPA-3,,2.82,3.53,3.53,3.53,90,90,90,Fm-3m,,0.48,,,,,,,,,,,,,,,,",
    ];
    let mut template = String::from(TEMPLATE_HEADER);
    for row in rows {
        template.push('\n');
        template.push_str(row);
    }
    template.push('\n');
    template
}
