// ============================================================================
// 组件注册表同步
// 保证扁平的 id → 组件实例映射与布局树一致：无悬空引用、无孤儿条目
// 所有函数返回新的注册表，不修改输入
// ============================================================================

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::layout::{collect_component_ids, ComponentInstance, ComponentRegistry, Section};
use crate::utils::error::{AppError, AppResult};

/// 补丁中不允许覆盖的保留字段（与布局节点的线上字段同名）
const RESERVED_KEYS: &[&str] = &["id", "type", "children"];

/// 一致性检查结果
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    /// 布局中引用但注册表中不存在的 id
    pub dangling: Vec<String>,
    /// 注册表中存在但布局中未引用的 id
    pub orphaned: Vec<String>,
    /// 布局中重复出现的节点 id
    pub duplicate_ids: Vec<String>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.dangling.is_empty() && self.orphaned.is_empty() && self.duplicate_ids.is_empty()
    }
}

/// 新建组件时登记注册表条目
pub fn register_new(registry: &ComponentRegistry, instance: ComponentInstance) -> ComponentRegistry {
    let mut updated = registry.clone();
    if let Some(previous) = updated.insert(instance) {
        log::warn!("注册表中已存在组件 {}，已被新实例覆盖", previous.id);
    }
    updated
}

/// 跨父节点/跨分区移动前，确认被移动子树中的每个组件 id 都已登记
///
/// 移动不改变注册表，因此新状态沿用的注册表必须完整覆盖被移动的 id，
/// 任何缺失都返回 ComponentNotFound，调用方据此跳过本次移动。
pub fn ensure_moved_registered(
    registry: &ComponentRegistry,
    moved_ids: &[String],
) -> AppResult<()> {
    let missing: Vec<&str> = moved_ids
        .iter()
        .filter(|id| !registry.contains(id))
        .map(String::as_str)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    log::warn!("被移动的组件未登记：{}", missing.join(", "));
    Err(AppError::ComponentNotFound(format!(
        "被移动的组件未登记：{}",
        missing.join(", ")
    )))
}

/// 删除子树后，移除布局中已不再被引用的组件条目
///
/// 仍被其他位置引用的 id 保留。返回新注册表和实际删除的 id。
pub fn remove_unreferenced(
    registry: &ComponentRegistry,
    removed_ids: &[String],
    remaining: &[Section],
) -> (ComponentRegistry, Vec<String>) {
    let still_referenced: HashSet<String> = collect_component_ids(remaining).into_iter().collect();
    let mut updated = registry.clone();
    let mut deleted = Vec::new();
    for id in removed_ids {
        if still_referenced.contains(id) {
            continue;
        }
        if updated.remove(id).is_some() {
            deleted.push(id.clone());
        }
    }
    (updated, deleted)
}

/// 去掉补丁中的保留字段
pub fn sanitize_patch(patch: &Map<String, Value>) -> Map<String, Value> {
    patch
        .iter()
        .filter(|(key, _)| {
            let reserved = RESERVED_KEYS.contains(&key.as_str());
            if reserved {
                log::warn!("忽略保留字段 {}", key);
            }
            !reserved
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// 浅合并属性补丁到指定组件，保留补丁未包含的字段
pub fn merge_props(
    registry: &ComponentRegistry,
    id: &str,
    patch: &Map<String, Value>,
) -> AppResult<ComponentRegistry> {
    let mut updated = registry.clone();
    let instance = updated
        .get_mut(id)
        .ok_or_else(|| AppError::ComponentNotFound(id.to_string()))?;
    for (key, value) in sanitize_patch(patch) {
        instance.props.insert(key, value);
    }
    Ok(updated)
}

/// 检查布局与注册表的一致性
pub fn check_consistency(sections: &[Section], registry: &ComponentRegistry) -> ConsistencyReport {
    let mut all_ids = Vec::new();
    for section in sections {
        for item in &section.layout {
            item.collect_all_ids(&mut all_ids);
        }
    }
    let mut seen = HashSet::new();
    let duplicate_ids: BTreeSet<String> = all_ids
        .into_iter()
        .filter(|id| !seen.insert(id.clone()))
        .collect();

    let referenced: BTreeSet<String> = collect_component_ids(sections).into_iter().collect();
    let registered: BTreeSet<String> = registry.ids().cloned().collect();

    ConsistencyReport {
        dangling: referenced.difference(&registered).cloned().collect(),
        orphaned: registered.difference(&referenced).cloned().collect(),
        duplicate_ids: duplicate_ids.into_iter().collect(),
    }
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::layout::LayoutItem;
    use serde_json::json;

    fn instance(id: &str) -> ComponentInstance {
        let mut props = Map::new();
        props.insert("label".to_string(), json!(format!("字段 {}", id)));
        ComponentInstance::new(id, "input", props)
    }

    fn sections_with(ids: &[&str]) -> Vec<Section> {
        let mut section = Section::new("s0", "");
        section.layout = vec![LayoutItem::row(
            "r0",
            vec![LayoutItem::column(
                "c0",
                ids.iter().map(|id| LayoutItem::component(*id, "input")).collect(),
            )],
        )];
        vec![section]
    }

    fn registry_with(ids: &[&str]) -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        for id in ids {
            registry.insert(instance(id));
        }
        registry
    }

    #[test]
    fn test_register_new_does_not_touch_input() {
        let registry = registry_with(&["a"]);
        let updated = register_new(&registry, instance("b"));
        assert_eq!(registry.len(), 1);
        assert_eq!(updated.len(), 2);
    }

    #[test]
    fn test_ensure_moved_registered() {
        let registry = registry_with(&["a", "b"]);
        assert!(ensure_moved_registered(&registry, &["a".to_string(), "b".to_string()]).is_ok());
        assert!(ensure_moved_registered(&registry, &[]).is_ok());

        let result = ensure_moved_registered(&registry, &["a".to_string(), "ghost".to_string()]);
        match result {
            Err(AppError::ComponentNotFound(message)) => assert!(message.contains("ghost")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_remove_unreferenced_keeps_referenced_ids() {
        let registry = registry_with(&["a", "b", "c"]);
        let remaining = sections_with(&["c"]);
        let (updated, deleted) = remove_unreferenced(
            &registry,
            &["a".to_string(), "b".to_string(), "c".to_string()],
            &remaining,
        );
        assert_eq!(deleted, vec!["a", "b"]);
        assert_eq!(updated.len(), 1);
        assert!(updated.contains("c"));
    }

    #[test]
    fn test_merge_props_is_shallow_and_preserves_fields() {
        let registry = registry_with(&["a"]);
        let mut patch = Map::new();
        patch.insert("required".to_string(), json!(true));
        patch.insert("type".to_string(), json!("select"));
        let updated = merge_props(&registry, "a", &patch).unwrap();
        let inst = updated.get("a").unwrap();
        assert_eq!(inst.props.get("label"), Some(&json!("字段 a")));
        assert_eq!(inst.props.get("required"), Some(&json!(true)));
        // 保留字段不允许通过补丁修改
        assert_eq!(inst.component_type, "input");
        assert!(!inst.props.contains_key("type"));
    }

    #[test]
    fn test_sanitize_patch_drops_wire_keys() {
        let patch = json!({ "id": "x", "type": "select", "children": "oops", "cardProps": {} });
        let sanitized = sanitize_patch(patch.as_object().unwrap());
        let keys: Vec<&str> = sanitized.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["cardProps"]);
    }

    #[test]
    fn test_merge_props_unknown_component() {
        let registry = registry_with(&["a"]);
        let result = merge_props(&registry, "zzz", &Map::new());
        assert!(matches!(result, Err(AppError::ComponentNotFound(_))));
    }

    #[test]
    fn test_check_consistency() {
        let sections = sections_with(&["a", "b"]);
        assert!(check_consistency(&sections, &registry_with(&["a", "b"])).is_consistent());

        let report = check_consistency(&sections, &registry_with(&["a", "x"]));
        assert_eq!(report.dangling, vec!["b"]);
        assert_eq!(report.orphaned, vec!["x"]);

        let dup = sections_with(&["a", "a"]);
        let report = check_consistency(&dup, &registry_with(&["a"]));
        assert_eq!(report.duplicate_ids, vec!["a"]);
    }
}
