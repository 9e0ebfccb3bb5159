// ==========================================
// 合金材料数据库 - 材料领域模型
// ==========================================
// 职责: Material / DataPoint / Properties 规范结构
// 红线: 未知字段必须原样保留（extra / Properties 内部 Map）
// ==========================================

use crate::domain::types::{MaterialType, PropertyCategory};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// init 哨兵数据来源
pub const INIT_SOURCE: &str = "init";

// ==========================================
// Material - 材料记录
// ==========================================
// 字段全部可选: 瞬时非法状态由校验器报告，而非反序列化失败
// type / elements / atomCount 形状不符时原值存入 extra（同名键）
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Material {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub material_type: Option<MaterialType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub composition: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<String>>,

    #[serde(rename = "atomCount", skip_serializing_if = "Option::is_none")]
    pub atom_count: Option<BTreeMap<String, u32>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub poscar: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DataSeries>,

    // 未知字段（前向兼容）
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 有固定形状的材料字段（形状不符时原值留在 extra）
pub const TYPED_MATERIAL_FIELDS: [&str; 3] = ["type", "elements", "atomCount"];

/// 反序列化中间结构: 有形状要求的字段先按原值读入
#[derive(Deserialize)]
struct RawMaterial {
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    source: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(rename = "type", default)]
    material_type: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    composition: Option<String>,
    #[serde(default)]
    elements: Option<Value>,
    #[serde(rename = "atomCount", default)]
    atom_count: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    poscar: Option<String>,
    #[serde(default)]
    data: Option<DataSeries>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<RawMaterial> for Material {
    fn from(raw: RawMaterial) -> Self {
        let mut extra = raw.extra;
        let material_type = shaped_or_extra(&mut extra, "type", raw.material_type, |v| {
            v.as_str().map(MaterialType::from)
        });
        let elements = shaped_or_extra(&mut extra, "elements", raw.elements, string_list);
        let atom_count = shaped_or_extra(&mut extra, "atomCount", raw.atom_count, atom_count_map);

        Material {
            id: raw.id,
            source: raw.source,
            name: raw.name,
            material_type,
            composition: raw.composition,
            elements,
            atom_count,
            poscar: raw.poscar,
            data: raw.data,
            extra,
        }
    }
}

impl<'de> Deserialize<'de> for Material {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawMaterial::deserialize(deserializer).map(Material::from)
    }
}

// ==========================================
// DataSeries - data 字段
// ==========================================
// 对象数组逐点读入（单点字段非法不影响同组其他点）
// 非数组或含非对象元素时保留原值，由校验器报 critical
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataSeries {
    Points(Vec<DataPoint>),
    Malformed(Value),
}

impl Material {
    /// 数据点切片（data 缺失或非法时为空）
    pub fn data_points(&self) -> &[DataPoint] {
        match &self.data {
            Some(DataSeries::Points(points)) => points,
            _ => &[],
        }
    }

    /// 可变数据点列表（data 缺失或非法时为 None）
    pub fn data_points_mut(&mut self) -> Option<&mut Vec<DataPoint>> {
        match &mut self.data {
            Some(DataSeries::Points(points)) => Some(points),
            _ => None,
        }
    }

    /// 报告中使用的显示名称
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.source.clone())
            .or_else(|| self.id.clone())
            .unwrap_or_else(|| "(未命名)".to_string())
    }

    pub fn type_str(&self) -> &str {
        self.material_type.as_ref().map(|t| t.as_str()).unwrap_or("")
    }

    /// 形状不符、原值留在 extra 中的字段名
    pub fn malformed_fields(&self) -> Vec<&'static str> {
        shadowed_keys(&self.extra, &TYPED_MATERIAL_FIELDS)
    }

    /// 字段已有合法值时丢弃 extra 中的同名原值
    pub fn drop_shadowed_raw(&mut self) {
        let present = [
            ("type", self.material_type.is_some()),
            ("elements", self.elements.is_some()),
            ("atomCount", self.atom_count.is_some()),
        ];
        for (key, is_set) in present {
            if is_set {
                self.extra.remove(key);
            }
        }
        if let Some(points) = self.data_points_mut() {
            points.iter_mut().for_each(DataPoint::drop_shadowed_raw);
        }
    }

    /// 按 (temperature, source) 排序数据点，返回顺序是否变化
    pub fn sort_data(&mut self) -> bool {
        match self.data_points_mut() {
            Some(points) => sort_data_points(points),
            None => false,
        }
    }
}

// ==========================================
// DataPoint - 温度/来源数据点
// ==========================================
// temperature / properties 形状不符时原值存入 extra（同名键）
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DataPoint {
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_number"
    )]
    pub temperature: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub poscar: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 有固定形状的数据点字段
pub const TYPED_POINT_FIELDS: [&str; 2] = ["temperature", "properties"];

#[derive(Deserialize)]
struct RawDataPoint {
    #[serde(default)]
    temperature: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    source: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    poscar: Option<String>,
    #[serde(default)]
    properties: Option<Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<RawDataPoint> for DataPoint {
    fn from(raw: RawDataPoint) -> Self {
        let mut extra = raw.extra;
        let temperature = shaped_or_extra(&mut extra, "temperature", raw.temperature, number_of);
        let properties = shaped_or_extra(&mut extra, "properties", raw.properties, |v| {
            v.as_object().cloned().map(Properties::from_map)
        });

        DataPoint {
            temperature,
            source: raw.source,
            poscar: raw.poscar,
            properties,
            extra,
        }
    }
}

impl<'de> Deserialize<'de> for DataPoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawDataPoint::deserialize(deserializer).map(DataPoint::from)
    }
}

impl DataPoint {
    pub fn new(temperature: f64, source: &str) -> Self {
        Self {
            temperature: Some(temperature),
            source: Some(source.to_string()),
            ..Default::default()
        }
    }

    /// init 哨兵条目（仅 poscar）
    pub fn init(poscar: &str) -> Self {
        Self {
            source: Some(INIT_SOURCE.to_string()),
            poscar: Some(poscar.to_string()),
            ..Default::default()
        }
    }

    pub fn is_init(&self) -> bool {
        self.source.as_deref() == Some(INIT_SOURCE)
    }

    /// 是否与另一个数据点占据同一 (temperature, source) 位置
    pub fn same_slot(&self, other: &DataPoint) -> bool {
        self.temperature == other.temperature && self.source == other.source
    }

    pub fn malformed_fields(&self) -> Vec<&'static str> {
        shadowed_keys(&self.extra, &TYPED_POINT_FIELDS)
    }

    pub fn drop_shadowed_raw(&mut self) {
        if self.temperature.is_some() {
            self.extra.remove("temperature");
        }
        if self.properties.is_some() {
            self.extra.remove("properties");
        }
    }

    /// 是否有至少一个非空属性类别
    pub fn has_properties(&self) -> bool {
        self.properties
            .as_ref()
            .map(|p| p.has_content())
            .unwrap_or(false)
    }
}

/// 数据点排序比较: 温度升序（无温度在前），其次来源字典序
pub fn compare_data_points(a: &DataPoint, b: &DataPoint) -> Ordering {
    let by_temperature = match (a.temperature, b.temperature) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.total_cmp(&y),
    };
    by_temperature.then_with(|| a.source.cmp(&b.source))
}

/// 稳定排序数据点，返回顺序是否变化
pub fn sort_data_points(points: &mut [DataPoint]) -> bool {
    if is_sorted(points) {
        return false;
    }
    points.sort_by(compare_data_points);
    true
}

pub fn is_sorted(points: &[DataPoint]) -> bool {
    points
        .windows(2)
        .all(|w| compare_data_points(&w[0], &w[1]) != Ordering::Greater)
}

// ==========================================
// Properties - 属性类别集合
// ==========================================
// 已知类别: structure / thermodynamics / mechanics / defects
// 未知类别及类别内未知字段原样保留
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(Map<String, Value>);

impl Properties {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn category(&self, category: PropertyCategory) -> Option<&Map<String, Value>> {
        self.0.get(category.key()).and_then(Value::as_object)
    }

    /// 写入类别内的嵌套字段（path 为类别内路径，如 ["latticeParameters", "a"]）
    pub fn insert_field(&mut self, category: &str, path: &[&str], value: Value) {
        let slot = self
            .0
            .entry(category.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        insert_nested(slot, path, value);
    }

    /// 是否存在至少一个非空类别
    pub fn has_content(&self) -> bool {
        self.0.values().any(|v| !is_empty_category(v))
    }
}

fn is_empty_category(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        other => is_blank(other),
    }
}

/// 空值判定: null 或空字符串
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// 按路径写入嵌套对象，中间节点不是对象时被替换为对象
pub fn insert_nested(target: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *target = value;
        return;
    };

    let mut current = target;
    for key in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        current = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.to_string(), value);
    }
}

// ==========================================
// serde 辅助: 宽松字符串 / 数值
// ==========================================

/// 字符串字段宽松解析（数字等标量转为字符串）
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// 按期望形状转换字段值；形状不符时原值以同名键存入 extra
fn shaped_or_extra<T>(
    extra: &mut Map<String, Value>,
    key: &str,
    raw: Option<Value>,
    convert: impl FnOnce(&Value) -> Option<T>,
) -> Option<T> {
    let raw = raw.filter(|v| !v.is_null())?;
    let shaped = convert(&raw);
    if shaped.is_none() {
        extra.insert(key.to_string(), raw);
    }
    shaped
}

fn shadowed_keys(extra: &Map<String, Value>, keys: &[&'static str]) -> Vec<&'static str> {
    keys.iter()
        .copied()
        .filter(|key| extra.contains_key(*key))
        .collect()
}

/// 数值（接受数字字符串）
fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// 字符串数组
fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// 元素 → 非负整数原子数（接受 2.0 这类整数值浮点）
fn atom_count_map(value: &Value) -> Option<BTreeMap<String, u32>> {
    value
        .as_object()?
        .iter()
        .map(|(element, count)| atom_count_value(count).map(|n| (element.clone(), n)))
        .collect()
}

fn atom_count_value(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    let f = value.as_f64()?;
    (f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX)).then_some(f as u32)
}

/// 整数值按整数输出（300 而非 300.0）
fn serialize_number<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 => {
            serializer.serialize_i64(*v as i64)
        }
        Some(v) => serializer.serialize_f64(*v),
        None => serializer.serialize_none(),
    }
}

/// f64 → JSON 数值（整数值输出为整数）
pub fn number_value(v: f64) -> Value {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 {
        Value::from(v as i64)
    } else {
        serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_material_preserves_unknown_fields() {
        let raw = json!({
            "id": "Alloy-IM-00001",
            "name": "Al2Cu",
            "type": "intermetallic",
            "customField1": "custom value",
            "metadata": {"researcher": "Test User"},
            "data": [{
                "temperature": 0,
                "source": "DFT",
                "customDataField": "x",
                "properties": {"structure": {"density": 4.3, "customStructureField": 1}}
            }]
        });

        let material: Material = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(material.extra["customField1"], "custom value");
        assert_eq!(material.data_points()[0].extra["customDataField"], "x");

        let back = serde_json::to_value(&material).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_lenient_id_and_temperature() {
        let material: Material = serde_json::from_value(json!({
            "id": 12,
            "data": [{"temperature": "300", "source": "DFT"}]
        }))
        .unwrap();

        assert_eq!(material.id.as_deref(), Some("12"));
        assert_eq!(material.data_points()[0].temperature, Some(300.0));
    }

    #[test]
    fn test_non_array_data_kept_as_malformed() {
        let material: Material =
            serde_json::from_value(json!({"name": "x", "data": "oops"})).unwrap();
        assert!(matches!(material.data, Some(DataSeries::Malformed(_))));
        assert!(material.data_points().is_empty());
    }

    #[test]
    fn test_badly_shaped_fields_kept_raw() {
        let raw = json!({
            "name": "AlNi",
            "type": 3,
            "elements": "Al,Ni",
            "atomCount": {"Al": 2.5, "Ni": 1},
            "data": []
        });

        let material: Material = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(material.material_type, None);
        assert_eq!(material.elements, None);
        assert_eq!(material.atom_count, None);
        assert_eq!(material.malformed_fields(), vec!["type", "elements", "atomCount"]);

        let back = serde_json::to_value(&material).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_integral_float_atom_count_accepted() {
        let material: Material =
            serde_json::from_value(json!({"atomCount": {"Al": 2.0, "Cu": 1}})).unwrap();
        assert_eq!(material.atom_count.unwrap()["Al"], 2);
        assert!(material.extra.is_empty());
    }

    #[test]
    fn test_bad_point_keeps_sibling_points() {
        let material: Material = serde_json::from_value(json!({
            "name": "Al2Cu",
            "data": [
                {"temperature": 0, "source": "DFT", "properties": {"structure": {"density": 4.3}}},
                {"temperature": "300K", "source": "DFT", "properties": "n/a"}
            ]
        }))
        .unwrap();

        let points = material.data_points();
        assert_eq!(points.len(), 2);
        assert!(points[0].malformed_fields().is_empty());
        assert_eq!(points[1].temperature, None);
        assert_eq!(points[1].properties, None);
        assert_eq!(points[1].malformed_fields(), vec!["temperature", "properties"]);
        assert_eq!(points[1].extra["temperature"], "300K");
    }

    #[test]
    fn test_non_object_point_keeps_array_malformed() {
        let material: Material =
            serde_json::from_value(json!({"data": [{"source": "init"}, 42]})).unwrap();
        assert!(matches!(material.data, Some(DataSeries::Malformed(Value::Array(_)))));
    }

    #[test]
    fn test_drop_shadowed_raw() {
        let mut material: Material =
            serde_json::from_value(json!({"elements": "Al,Ni", "data": [{"temperature": "hot"}]}))
                .unwrap();
        material.elements = Some(vec!["Al".into(), "Ni".into()]);
        if let Some(points) = material.data_points_mut() {
            points[0].temperature = Some(300.0);
        }

        material.drop_shadowed_raw();
        assert!(material.malformed_fields().is_empty());
        assert!(material.data_points()[0].malformed_fields().is_empty());
    }

    #[test]
    fn test_integer_temperature_serializes_without_fraction() {
        let point = DataPoint::new(300.0, "DFT");
        let text = serde_json::to_string(&point).unwrap();
        assert!(text.contains("\"temperature\":300,"));
    }

    #[test]
    fn test_sort_data_points_by_temperature_then_source() {
        let mut points = vec![
            DataPoint::new(300.0, "DPA-3"),
            DataPoint::new(0.0, "DFT"),
            DataPoint::new(300.0, "DFT"),
            DataPoint::init("data/intermetallic/x/init/POSCAR"),
        ];

        assert!(sort_data_points(&mut points));
        assert!(points[0].is_init());
        assert_eq!(points[1].temperature, Some(0.0));
        assert_eq!(points[2].source.as_deref(), Some("DFT"));
        assert_eq!(points[3].source.as_deref(), Some("DPA-3"));
        assert!(is_sorted(&points));
        assert!(!sort_data_points(&mut points));
    }

    #[test]
    fn test_properties_insert_nested_field() {
        let mut props = Properties::new();
        props.insert_field("structure", &["latticeParameters", "a"], json!(3.52));
        props.insert_field("structure", &["density"], json!(7.85));

        let structure = props.category(PropertyCategory::Structure).unwrap();
        assert_eq!(structure["latticeParameters"]["a"], 3.52);
        assert_eq!(structure["density"], 7.85);
        assert!(props.has_content());
    }

    #[test]
    fn test_properties_empty_categories_have_no_content() {
        let props = Properties::from_map(
            json!({"structure": {}, "mechanics": null})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert!(!props.has_content());
    }
}
