// ==========================================
// MaterialApi 集成测试
// ==========================================
// 测试目标: 配置驱动的令牌校验 + 查询 / 写入流程
// ==========================================


use alloy_catalog::api::{ApiError, MaterialApi, MaterialQuery};
use alloy_catalog::config::{ConfigManager, PipelineConfigReader};
use alloy_catalog::repository::{JsonFileRepository, MaterialRepository};
use serde_json::json;
use test_helpers::{create_test_workspace, data_point, intermetallic, test_config};

fn create_test_api(manager: &ConfigManager) -> MaterialApi<JsonFileRepository> {
    let repo = JsonFileRepository::new(manager.data_file());
    MaterialApi::new(repo, manager.admin_token())
}

#[test]
fn test_crud_round_trip_with_configured_token() {
    let (_dir, data_file) = create_test_workspace();
    let manager = ConfigManager::from_config(test_config(&data_file));
    let api = create_test_api(&manager);

    let created = api
        .create(
            Some("test-token"),
            intermetallic(
                "Al2Cu",
                "MP",
                vec![data_point(0.0, "DFT", "mechanics", "youngsModulus", json!(180))],
            ),
        )
        .unwrap();
    let id = created.id.clone().unwrap();
    assert_eq!(id, "Alloy-IM-00001");

    let page = api
        .list(&MaterialQuery {
            q: Some("al2cu".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.per_page, 25);

    api.delete(Some("test-token"), &id).unwrap();
    let stored = JsonFileRepository::new(&data_file).load_all().unwrap();
    assert!(stored.is_empty());
}

#[test]
fn test_env_token_overrides_config() {
    let (_dir, data_file) = create_test_workspace();
    let mut manager = ConfigManager::from_config(test_config(&data_file));
    manager.apply_env_overrides(|key| (key == "ADMIN_TOKEN").then(|| "from-env".to_string()));
    let api = create_test_api(&manager);

    let record = intermetallic("NiAl", "MP", vec![]);
    let stale = api.create(Some("test-token"), record.clone());
    assert!(matches!(stale, Err(ApiError::Unauthorized(_))));
    assert!(api.create(Some("from-env"), record).is_ok());
}
