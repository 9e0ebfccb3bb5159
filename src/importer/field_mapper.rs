// ==========================================
// 合金材料数据库 - 字段映射器实现
// ==========================================
// 职责: 表格列 → 规范字段映射（一组行 → 一条 Material）
// 约定: 扁平列名（youngs_modulus 等）查映射表；
//       点号列名（structure.rdf）按路径展开
// ==========================================

use crate::domain::material::{
    insert_nested, number_value, sort_data_points, DataPoint, DataSeries, Material, Properties,
};
use crate::domain::report::IngestWarning;
use crate::domain::types::{MaterialType, PropertyCategory};
use crate::importer::composition::parse_composition;
use crate::importer::file_parser::RawRow;
use crate::importer::material_importer_trait::FieldMapper as FieldMapperTrait;
use crate::importer::value_parser::{is_null_cell, parse_number, parse_value, MalformedValue};
use serde_json::{Map, Value};

/// 材料级来源缺省值
pub const UNKNOWN_SOURCE: &str = "Unknown";
/// 数据点来源缺省值
pub const DEFAULT_DATA_SOURCE: &str = "DFT";
/// 间隙形成能分位点列前缀
pub const INTERSTITIAL_SITE_PREFIX: &str = "interstitial_formation_energy_";

// ==========================================
// 扁平列映射表
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Number,  // 数值（解析失败保留原文并告警）
    Text,    // 原样字符串（路径 / 点群）
    Elastic, // 6×6 矩阵或约化模量对象
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatColumn {
    pub column: &'static str,
    pub category: PropertyCategory,
    pub path: &'static [&'static str],
    pub kind: CellKind,
}

const fn flat(
    column: &'static str,
    category: PropertyCategory,
    path: &'static [&'static str],
    kind: CellKind,
) -> FlatColumn {
    FlatColumn {
        column,
        category,
        path,
        kind,
    }
}

use CellKind::{Elastic, Number, Text};
use PropertyCategory::{Defects, Mechanics, Structure, Thermodynamics};

pub const FLAT_COLUMNS: &[FlatColumn] = &[
    // ===== structure =====
    flat("density", Structure, &["density"], Number),
    flat("lattice_a", Structure, &["latticeParameters", "a"], Number),
    flat("lattice_b", Structure, &["latticeParameters", "b"], Number),
    flat("lattice_c", Structure, &["latticeParameters", "c"], Number),
    flat("lattice_alpha", Structure, &["latticeParameters", "alpha"], Number),
    flat("lattice_beta", Structure, &["latticeParameters", "beta"], Number),
    flat("lattice_gamma", Structure, &["latticeParameters", "gamma"], Number),
    flat("point_group", Structure, &["latticeParameters", "pointGroup"], Text),
    flat("rdf", Structure, &["rdf"], Text),
    // ===== thermodynamics =====
    flat("specific_heat", Thermodynamics, &["specificHeat"], Number),
    flat("mixing_enthalpy", Thermodynamics, &["mixingEnthalpy"], Number),
    flat("diffusion_coefficient", Thermodynamics, &["diffusionCoefficient"], Number),
    flat("thermal_expansion", Thermodynamics, &["thermalExpansion"], Number),
    // ===== mechanics =====
    flat("youngs_modulus", Mechanics, &["youngsModulus"], Number),
    flat("bulk_modulus", Mechanics, &["bulkModulus"], Number),
    flat("shear_modulus", Mechanics, &["shearModulus"], Number),
    flat("poissons_ratio", Mechanics, &["poissonsRatio"], Number),
    flat("elastic_constants", Mechanics, &["elasticConstants"], Elastic),
    flat("stress_strain", Mechanics, &["stressStrain"], Text),
    // ===== defects =====
    flat("vacancy_formation_energy", Defects, &["vacancyFormationEnergy"], Number),
    flat("interstitial_formation_energy", Defects, &["interstitialFormationEnergy"], Number),
    flat("stacking_fault_energy", Defects, &["stackingFaultEnergy"], Number),
];

/// 材料级 / 数据点级保留列（不进入 extra）
const RESERVED_COLUMNS: &[&str] = &[
    "id",
    "name",
    "source",
    "type",
    "composition",
    "poscar",
    "elements",
    "atomCount",
    "temperature",
    "data_source",
    "data_poscar",
];

pub fn lookup_flat_column(column: &str) -> Option<&'static FlatColumn> {
    FLAT_COLUMNS.iter().find(|c| c.column == column)
}

/// 列分类结果
#[derive(Debug, Clone, PartialEq)]
enum ColumnRoute<'a> {
    Reserved,
    Flat(&'static FlatColumn),
    InterstitialSite(&'a str),
    DottedProperty(Vec<&'a str>),
    DottedMaterial(Vec<&'a str>),
    Extra,
}

fn route_column(column: &str) -> ColumnRoute<'_> {
    if RESERVED_COLUMNS.contains(&column) {
        return ColumnRoute::Reserved;
    }
    if let Some(flat) = lookup_flat_column(column) {
        return ColumnRoute::Flat(flat);
    }
    if let Some(site) = column.strip_prefix(INTERSTITIAL_SITE_PREFIX) {
        if !site.is_empty() {
            return ColumnRoute::InterstitialSite(site);
        }
    }
    if column.contains('.') {
        let segments: Vec<&str> = column.split('.').filter(|s| !s.is_empty()).collect();
        if segments.len() >= 2 {
            return if PropertyCategory::from_key(segments[0]).is_some() {
                ColumnRoute::DottedProperty(segments)
            } else {
                ColumnRoute::DottedMaterial(segments)
            };
        }
    }
    ColumnRoute::Extra
}

// ==========================================
// FieldMapper 实现
// ==========================================
pub struct FieldMapper {
    primary_elements: Vec<String>,
}

impl FieldMapper {
    pub fn new(primary_elements: Vec<String>) -> Self {
        Self { primary_elements }
    }

    /// 单行 → 数据点（属性为空时仍返回，由调用方决定是否保留）
    fn map_data_point(&self, row: &RawRow, warnings: &mut Vec<IngestWarning>) -> DataPoint {
        let temperature = match row.get("temperature").map(parse_number) {
            Some(Ok(Some(t))) => t,
            Some(Err(err)) => {
                push_warning(warnings, row, "temperature", &err);
                0.0
            }
            _ => 0.0,
        };

        let source = row
            .non_empty("data_source")
            .or_else(|| row.non_empty("source"))
            .unwrap_or(DEFAULT_DATA_SOURCE);

        let mut point = DataPoint::new(temperature, source);
        if let Some(poscar) = row.non_empty("data_poscar") {
            point.poscar = Some(poscar.to_string());
        }

        let mut properties = Properties::new();
        let mut sites = Map::new();
        let mut generic_interstitial: Option<Value> = None;

        for (column, raw) in &row.cells {
            if is_null_cell(raw) {
                continue;
            }
            match route_column(column) {
                ColumnRoute::Flat(flat) => {
                    let value = self.convert_cell(flat.kind, column, raw, row, warnings);
                    if flat.column == "interstitial_formation_energy" {
                        generic_interstitial = Some(value);
                    } else {
                        properties.insert_field(flat.category.key(), flat.path, value);
                    }
                }
                ColumnRoute::InterstitialSite(site) => {
                    let value = self.convert_cell(Number, column, raw, row, warnings);
                    sites.insert(site.to_string(), value);
                }
                ColumnRoute::DottedProperty(segments) => {
                    let value = self.convert_cell_generic(column, raw, row, warnings);
                    properties.insert_field(segments[0], &segments[1..], value);
                }
                // 材料级列见 map_material_extras / map_row_extras
                _ => {}
            }
        }

        // 分位点优先；无分位点时使用标量列
        if !sites.is_empty() {
            properties.insert_field(
                Defects.key(),
                &["interstitialFormationEnergy"],
                Value::Object(sites),
            );
        } else if let Some(value) = generic_interstitial {
            properties.insert_field(Defects.key(), &["interstitialFormationEnergy"], value);
        }

        if !properties.is_empty() {
            point.properties = Some(properties);
        }
        point
    }

    fn convert_cell(
        &self,
        kind: CellKind,
        column: &str,
        raw: &str,
        row: &RawRow,
        warnings: &mut Vec<IngestWarning>,
    ) -> Value {
        match kind {
            CellKind::Text => Value::String(raw.trim().to_string()),
            CellKind::Number => match parse_number(raw) {
                Ok(Some(n)) => number_value(n),
                Ok(None) => Value::Null,
                Err(err) => {
                    push_warning(warnings, row, column, &err);
                    Value::String(err.raw)
                }
            },
            CellKind::Elastic => match parse_value(raw) {
                Ok(value) if is_elastic_matrix(&value) || value.is_object() => value,
                Ok(other) => {
                    let err = MalformedValue {
                        raw: raw.trim().to_string(),
                        reason: format!("弹性常数应为 6×6 矩阵或模量对象，实际为 {}", other),
                    };
                    push_warning(warnings, row, column, &err);
                    Value::String(err.raw)
                }
                Err(err) => {
                    push_warning(warnings, row, column, &err);
                    Value::String(err.raw)
                }
            },
        }
    }

    fn convert_cell_generic(
        &self,
        column: &str,
        raw: &str,
        row: &RawRow,
        warnings: &mut Vec<IngestWarning>,
    ) -> Value {
        match parse_value(raw) {
            Ok(value) => value,
            Err(err) => {
                push_warning(warnings, row, column, &err);
                Value::String(err.raw)
            }
        }
    }

    /// 首行中的非保留列 → 材料级 extra
    fn map_material_extras(
        &self,
        first: &RawRow,
        material: &mut Material,
        warnings: &mut Vec<IngestWarning>,
    ) {
        for (column, raw) in &first.cells {
            if is_null_cell(raw) {
                continue;
            }
            let Some(segments) = material_segments(column) else {
                continue;
            };
            let value = self.convert_cell_generic(column, raw, first, warnings);
            place_nested(&mut material.extra, &segments, value);
        }
    }

    /// 后续行的材料级列: 与首行相同则忽略；首行为空时补入材料；
    /// 取值不同则保存到该行数据点并告警
    fn map_row_extras(
        &self,
        row: &RawRow,
        material: &mut Material,
        point: &mut DataPoint,
        warnings: &mut Vec<IngestWarning>,
    ) {
        for (column, raw) in &row.cells {
            if is_null_cell(raw) {
                continue;
            }
            let Some(segments) = material_segments(column) else {
                continue;
            };
            let value = self.convert_cell_generic(column, raw, row, warnings);
            match lookup_nested(&material.extra, &segments).cloned() {
                Some(existing) if existing == value => {}
                None => place_nested(&mut material.extra, &segments, value),
                Some(existing) => {
                    warnings.push(IngestWarning {
                        row_number: row.row_number,
                        column: Some(column.clone()),
                        message: format!(
                            "列 '{}' 与首行取值不同（{} → {}），保存到该行数据点",
                            column, existing, value
                        ),
                    });
                    place_nested(&mut point.extra, &segments, value);
                }
            }
        }
    }
}

impl FieldMapperTrait for FieldMapper {
    fn map_group(&self, rows: &[RawRow], warnings: &mut Vec<IngestWarning>) -> Option<Material> {
        let first = rows.first()?;

        let composition = first.non_empty("composition").map(str::to_string);
        let parsed = parse_composition(composition.as_deref().unwrap_or(""));

        for element in &parsed.elements {
            if !self.primary_elements.iter().any(|p| p == element) {
                warnings.push(IngestWarning {
                    row_number: first.row_number,
                    column: Some("composition".to_string()),
                    message: format!(
                        "材料 '{}' 含非主元素: {}",
                        first.get("name").unwrap_or(""),
                        element
                    ),
                });
            }
        }

        let mut material = Material {
            id: first.non_empty("id").map(str::to_string),
            name: first.non_empty("name").map(str::to_string),
            source: Some(
                first
                    .non_empty("source")
                    .unwrap_or(UNKNOWN_SOURCE)
                    .to_string(),
            ),
            material_type: first.non_empty("type").map(MaterialType::from),
            elements: Some(parsed.elements),
            atom_count: Some(parsed.atom_count),
            composition,
            poscar: first.non_empty("poscar").map(str::to_string),
            ..Default::default()
        };

        self.map_material_extras(first, &mut material, warnings);

        let mut points: Vec<DataPoint> = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let mut point = self.map_data_point(row, warnings);
            if i > 0 {
                self.map_row_extras(row, &mut material, &mut point, warnings);
            }
            if point.has_properties() {
                points.push(point);
            } else if !point.extra.is_empty() {
                warnings.push(IngestWarning {
                    row_number: row.row_number,
                    column: None,
                    message: "该行没有属性值，行内独有的列值未保留".to_string(),
                });
            }
        }
        sort_data_points(&mut points);
        material.data = Some(DataSeries::Points(points));

        Some(material)
    }
}

/// 6×6 数值矩阵判定
pub fn is_elastic_matrix(value: &Value) -> bool {
    value.as_array().is_some_and(|rows| {
        rows.len() == 6
            && rows.iter().all(|row| {
                row.as_array()
                    .is_some_and(|cols| cols.len() == 6 && cols.iter().all(Value::is_number))
            })
    })
}

/// 材料级列（未知列 / 非属性点号列）在 extra 中的路径
fn material_segments(column: &str) -> Option<Vec<&str>> {
    match route_column(column) {
        ColumnRoute::DottedMaterial(segments) => Some(segments),
        ColumnRoute::Extra => Some(vec![column]),
        _ => None,
    }
}

fn place_nested(map: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let slot = map.entry(first.to_string()).or_insert(Value::Null);
    insert_nested(slot, rest, value);
}

fn lookup_nested<'a>(map: &'a Map<String, Value>, segments: &[&str]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    rest.iter()
        .try_fold(map.get(*first)?, |value, key| value.get(*key))
}

fn push_warning(
    warnings: &mut Vec<IngestWarning>,
    row: &RawRow,
    column: &str,
    err: &MalformedValue,
) {
    warnings.push(IngestWarning {
        row_number: row.row_number,
        column: Some(column.to_string()),
        message: err.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(number: usize, cells: &[(&str, &str)]) -> RawRow {
        RawRow {
            row_number: number,
            cells: cells
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn mapper() -> FieldMapper {
        FieldMapper::new(
            ["Al", "Ni", "Cu", "Zr", "Nb", "Ta", "W"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    #[test]
    fn test_flat_columns_map_to_nested_properties() {
        let rows = vec![row(
            2,
            &[
                ("name", "Al2Cu"),
                ("composition", "Al2Cu"),
                ("type", "intermetallic"),
                ("temperature", "300"),
                ("youngs_modulus", "120"),
                ("lattice_a", "6.06"),
                ("point_group", "I4/mcm"),
            ],
        )];

        let mut warnings = Vec::new();
        let material = mapper().map_group(&rows, &mut warnings).unwrap();
        let point = &material.data_points()[0];
        let props = point.properties.as_ref().unwrap();

        assert_eq!(point.temperature, Some(300.0));
        assert_eq!(point.source.as_deref(), Some("DFT"));
        assert_eq!(props.as_map()["mechanics"]["youngsModulus"], json!(120));
        assert_eq!(props.as_map()["structure"]["latticeParameters"]["a"], json!(6.06));
        assert_eq!(
            props.as_map()["structure"]["latticeParameters"]["pointGroup"],
            json!("I4/mcm")
        );
        assert_eq!(material.source.as_deref(), Some("Unknown"));
        assert_eq!(material.elements, Some(vec!["Al".into(), "Cu".into()]));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_interstitial_sites_take_precedence() {
        let rows = vec![row(
            2,
            &[
                ("name", "W-bcc"),
                ("composition", "W"),
                ("interstitial_formation_energy", "9.9"),
                ("interstitial_formation_energy_dumbbell111", "3.5"),
                ("interstitial_formation_energy_octahedral", "4.2"),
            ],
        )];

        let material = mapper().map_group(&rows, &mut Vec::new()).unwrap();
        let defects = &material.data_points()[0].properties.as_ref().unwrap().as_map()["defects"];
        assert_eq!(
            defects["interstitialFormationEnergy"],
            json!({"dumbbell111": 3.5, "octahedral": 4.2})
        );
    }

    #[test]
    fn test_rows_without_properties_are_dropped() {
        let rows = vec![
            row(2, &[("name", "X"), ("composition", "Ni"), ("temperature", "0"), ("density", "8.9")]),
            row(3, &[("name", "X"), ("composition", "Ni"), ("temperature", "300"), ("density", "")]),
        ];

        let material = mapper().map_group(&rows, &mut Vec::new()).unwrap();
        assert_eq!(material.data_points().len(), 1);
    }

    #[test]
    fn test_dotted_and_unknown_columns() {
        let rows = vec![row(
            2,
            &[
                ("name", "X"),
                ("composition", "Ni"),
                ("structure.latticeConstants", "[3.52, 3.52, 3.52]"),
                ("metadata.researcher", "Test User"),
                ("customField1", "custom value"),
            ],
        )];

        let material = mapper().map_group(&rows, &mut Vec::new()).unwrap();
        let props = material.data_points()[0].properties.as_ref().unwrap();
        assert_eq!(
            props.as_map()["structure"]["latticeConstants"],
            json!([3.52, 3.52, 3.52])
        );
        assert_eq!(material.extra["metadata"]["researcher"], json!("Test User"));
        assert_eq!(material.extra["customField1"], json!("custom value"));
    }

    #[test]
    fn test_malformed_number_kept_with_warning() {
        let rows = vec![row(
            7,
            &[("name", "X"), ("composition", "Ni"), ("density", "heavy")],
        )];

        let mut warnings = Vec::new();
        let material = mapper().map_group(&rows, &mut warnings).unwrap();
        let props = material.data_points()[0].properties.as_ref().unwrap();

        assert_eq!(props.as_map()["structure"]["density"], json!("heavy"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].row_number, 7);
        assert_eq!(warnings[0].column.as_deref(), Some("density"));
    }

    #[test]
    fn test_elastic_constants_matrix_and_non_primary_warning() {
        let matrix = "[[230,135,135,0,0,0],[135,230,135,0,0,0],[135,135,230,0,0,0],[0,0,0,118,0,0],[0,0,0,0,118,0],[0,0,0,0,0,118]]";
        let rows = vec![row(
            2,
            &[("name", "FeAl"), ("composition", "FeAl"), ("elastic_constants", matrix)],
        )];

        let mut warnings = Vec::new();
        let material = mapper().map_group(&rows, &mut warnings).unwrap();
        let mechanics = &material.data_points()[0].properties.as_ref().unwrap().as_map()["mechanics"];

        assert!(is_elastic_matrix(&mechanics["elasticConstants"]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("Fe"));
    }

    #[test]
    fn test_per_row_custom_columns_are_kept() {
        fn with(number: usize, temperature: &str, extra: &[(&str, &str)]) -> RawRow {
            let mut cells = vec![
                ("name", "Al2Cu"),
                ("composition", "Al2Cu"),
                ("type", "intermetallic"),
                ("youngs_modulus", "120"),
                ("temperature", temperature),
            ];
            cells.extend_from_slice(extra);
            row(number, &cells)
        }
        let rows = vec![
            with(2, "0", &[("batch", "A"), ("meta.operator", "")]),
            with(3, "300", &[("batch", "A"), ("meta.operator", "lee")]),
            with(4, "600", &[("batch", "B"), ("meta.operator", "lee")]),
        ];

        let mut warnings = Vec::new();
        let material = mapper().map_group(&rows, &mut warnings).unwrap();

        assert_eq!(material.extra["batch"], json!("A"));
        assert_eq!(material.extra["meta"]["operator"], json!("lee"));

        let points = material.data_points();
        assert!(points[0].extra.is_empty());
        assert!(points[1].extra.is_empty());
        assert_eq!(points[2].extra["batch"], json!("B"));

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].row_number, 4);
        assert_eq!(warnings[0].column.as_deref(), Some("batch"));
    }
}
