// ==========================================
// 合金材料数据库 - 材料 API
// ==========================================
// 职责: 材料查询（过滤 / 分页）与管理员增删改
// 红线: 写操作需管理员令牌；写入前经校验器校验，存在 critical 违规则拒绝
// ==========================================

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::material::Material;
use crate::engine::id_assigner::IdAssigner;
use crate::importer::dq_validator::Validator;
use crate::importer::material_importer_trait::RecordValidator;
use crate::repository::MaterialRepository;

/// 默认每页条数
pub const DEFAULT_PER_PAGE: usize = 25;

// ==========================================
// MaterialQuery - 列表查询参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialQuery {
    pub q: Option<String>,                  // 全文检索（名称 / 元素 / 数据点内容）
    #[serde(rename = "type")]
    pub material_type: Option<String>,      // 类型精确匹配
    pub element: Option<String>,            // 含有该元素
    pub page: usize,                        // 从 1 开始
    pub per_page: usize,
}

impl Default for MaterialQuery {
    fn default() -> Self {
        Self {
            q: None,
            material_type: None,
            element: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// 分页结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialPage {
    pub items: Vec<Material>,
    pub total: usize, // 过滤后的总条数
    pub page: usize,
    pub per_page: usize,
}

// ==========================================
// MaterialApi - 材料 API
// ==========================================

/// 材料API
///
/// 职责：
/// 1. 材料列表查询（过滤 + 分页）与单条查询
/// 2. 管理员令牌校验
/// 3. 写入前的规则校验与 ID 分配
pub struct MaterialApi<R: MaterialRepository> {
    repo: R,
    admin_token: Option<String>,
    validator: Validator,
}

impl<R: MaterialRepository> MaterialApi<R> {
    /// 创建新的MaterialApi实例
    ///
    /// # 参数
    /// - repo: 材料数据仓储
    /// - admin_token: 管理员令牌（None 时拒绝一切写操作）
    pub fn new(repo: R, admin_token: Option<String>) -> Self {
        Self {
            repo,
            admin_token: admin_token.filter(|t| !t.is_empty()),
            validator: Validator::new(),
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询材料列表
    ///
    /// # 返回
    /// - Ok(MaterialPage): 当前页记录 + 过滤后总数
    /// - Err(ApiError::InvalidInput): page / per_page 为 0
    pub fn list(&self, query: &MaterialQuery) -> ApiResult<MaterialPage> {
        if query.page == 0 || query.per_page == 0 {
            return Err(ApiError::InvalidInput(
                "page 与 per_page 必须大于 0".to_string(),
            ));
        }

        let materials = self.repo.load_all()?;
        let filtered: Vec<Material> = materials
            .into_iter()
            .filter(|m| matches_query(m, query))
            .collect();

        let total = filtered.len();
        let items: Vec<Material> = filtered
            .into_iter()
            .skip((query.page - 1).saturating_mul(query.per_page))
            .take(query.per_page)
            .collect();

        debug!(total = total, page = query.page, returned = items.len(), "材料列表查询");
        Ok(MaterialPage {
            items,
            total,
            page: query.page,
            per_page: query.per_page,
        })
    }

    /// 按 ID 查询单条材料
    pub fn get(&self, id: &str) -> ApiResult<Material> {
        self.repo
            .load_all()?
            .into_iter()
            .find(|m| m.id.as_deref() == Some(id))
            .ok_or_else(|| ApiError::NotFound(format!("材料(id={})不存在", id)))
    }

    // ==========================================
    // 写接口（需管理员令牌）
    // ==========================================

    /// 新增材料（未携带 ID 时自动分配）
    pub fn create(&self, token: Option<&str>, material: Material) -> ApiResult<Material> {
        self.authorize(token)?;

        let mut materials = self.repo.load_all()?;
        let mut created = material;
        match created.id.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(id) => {
                if materials.iter().any(|m| m.id.as_deref() == Some(id)) {
                    return Err(ApiError::InvalidInput(format!("ID 已存在: {}", id)));
                }
            }
            None => {
                IdAssigner::default().assign_one(&mut created, &materials);
            }
        }
        created.sort_data();
        self.ensure_admissible(&created)?;

        materials.push(created.clone());
        self.repo.save_all(&materials)?;
        info!(id = ?created.id, name = %created.display_name(), "新增材料");
        Ok(created)
    }

    /// 替换已有材料（保留 ID）
    pub fn update(&self, token: Option<&str>, id: &str, material: Material) -> ApiResult<Material> {
        self.authorize(token)?;

        let mut updated = material;
        updated.id = Some(id.to_string());
        updated.sort_data();
        self.ensure_admissible(&updated)?;

        let mut materials = self.repo.load_all()?;
        let slot = materials
            .iter_mut()
            .find(|m| m.id.as_deref() == Some(id))
            .ok_or_else(|| ApiError::NotFound(format!("材料(id={})不存在", id)))?;
        *slot = updated.clone();

        self.repo.save_all(&materials)?;
        info!(id = %id, "更新材料");
        Ok(updated)
    }

    /// 删除材料，返回被删除的记录
    pub fn delete(&self, token: Option<&str>, id: &str) -> ApiResult<Material> {
        self.authorize(token)?;

        let mut materials = self.repo.load_all()?;
        let position = materials
            .iter()
            .position(|m| m.id.as_deref() == Some(id))
            .ok_or_else(|| ApiError::NotFound(format!("材料(id={})不存在", id)))?;
        let removed = materials.remove(position);

        self.repo.save_all(&materials)?;
        info!(id = %id, "删除材料");
        Ok(removed)
    }

    // ==========================================
    // 内部校验
    // ==========================================

    fn authorize(&self, token: Option<&str>) -> ApiResult<()> {
        match (&self.admin_token, token) {
            (None, _) => Err(ApiError::Unauthorized("未配置管理员令牌".to_string())),
            (Some(expected), Some(given)) if expected == given => Ok(()),
            _ => {
                warn!("管理员令牌校验失败");
                Err(ApiError::Unauthorized("管理员令牌无效".to_string()))
            }
        }
    }

    fn ensure_admissible(&self, material: &Material) -> ApiResult<()> {
        let violations = self.validator.validate(0, material);
        if violations.iter().any(|v| v.is_critical()) {
            return Err(ApiError::ValidationFailed { violations });
        }
        Ok(())
    }
}

/// 过滤条件匹配
fn matches_query(material: &Material, query: &MaterialQuery) -> bool {
    if let Some(wanted) = query.material_type.as_deref().filter(|s| !s.is_empty()) {
        if material.type_str() != wanted {
            return false;
        }
    }

    if let Some(element) = query.element.as_deref().filter(|s| !s.is_empty()) {
        let has = material
            .elements
            .as_ref()
            .map_or(false, |els| els.iter().any(|e| e.eq_ignore_ascii_case(element)));
        if !has {
            return false;
        }
    }

    if let Some(q) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let needle = q.to_lowercase();
        let in_name = material
            .name
            .as_deref()
            .map_or(false, |n| n.to_lowercase().contains(&needle));
        let in_elements = material
            .elements
            .as_ref()
            .map_or(false, |els| els.iter().any(|e| e.to_lowercase() == needle));
        let in_data = material
            .data
            .as_ref()
            .and_then(|d| serde_json::to_string(d).ok())
            .map_or(false, |text| text.to_lowercase().contains(&needle));
        if !(in_name || in_elements || in_data) {
            return false;
        }
    }

    true
}
