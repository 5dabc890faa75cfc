// ============================================================================
// 表单结构导入/导出
// 导出格式：{ layout, components, metadata }；导入兼容旧版顶层字段 sections
// 导入校验分为错误（拒绝导入）和警告（允许导入，前端展示提示条）
// ============================================================================

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::models::layout::{ComponentRegistry, Section, Snapshot};
use crate::services::layout_tree::check_structure;
use crate::services::palette;
use crate::services::registry_sync::check_consistency;
use crate::utils::error::{AppError, AppResult};

/// 导出元数据
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMetadata {
    pub version: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<String>,
    /// 其他未识别的元数据字段原样保留
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 导出/导入的完整表单结构
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FormSchema {
    pub layout: Vec<Section>,
    pub components: ComponentRegistry,
    pub metadata: SchemaMetadata,
}

impl FormSchema {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sections: self.layout.clone(),
            components: self.components.clone(),
        }
    }
}

/// 导入校验结果
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ImportReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// 无错误时为解析出的表单结构（孤儿组件已剔除）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<FormSchema>,
}

impl ImportReport {
    pub fn is_accepted(&self) -> bool {
        self.errors.is_empty() && self.schema.is_some()
    }

    /// 取出表单结构；存在错误时返回 ImportError
    pub fn into_schema(self) -> AppResult<FormSchema> {
        if !self.errors.is_empty() {
            return Err(AppError::ImportError(self.errors.join("；")));
        }
        self.schema
            .ok_or_else(|| AppError::ImportError("没有可导入的内容".to_string()))
    }

    fn refuse(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self.schema = None;
        self
    }
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&Rfc3339).unwrap_or_default()
}

/// 导出当前状态
pub fn export_schema(snapshot: &Snapshot, title: &str, description: &str, version: &str) -> FormSchema {
    FormSchema {
        layout: snapshot.sections.clone(),
        components: snapshot.components.clone(),
        metadata: SchemaMetadata {
            version: version.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            exported_at: Some(now_rfc3339()),
            extra: Map::new(),
        },
    }
}

pub fn to_json_pretty(schema: &FormSchema) -> AppResult<String> {
    Ok(serde_json::to_string_pretty(schema)?)
}

/// 解析并校验导入的 JSON
///
/// `expected_version` 与 metadata.version 不一致时只给出警告。
pub fn import_schema(raw: &str, expected_version: &str) -> ImportReport {
    let report = ImportReport::default();

    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => return report.refuse(format!("不是合法的 JSON：{}", e)),
    };
    let Value::Object(mut root) = value else {
        return report.refuse("顶层必须是 JSON 对象");
    };
    let mut report = report;

    // 布局：优先 layout，兼容旧版 sections
    let layout_value = match (root.remove("layout"), root.remove("sections")) {
        (Some(layout), Some(_)) => {
            report
                .warnings
                .push("同时存在 layout 与 sections 字段，已忽略 sections".to_string());
            layout
        }
        (Some(layout), None) => layout,
        (None, Some(sections)) => {
            report
                .warnings
                .push("使用了旧版 sections 字段，建议重新导出".to_string());
            sections
        }
        (None, None) => return report.refuse("缺少 layout 字段"),
    };
    if !layout_value.is_array() {
        return report.refuse("layout 必须是数组");
    }
    let layout: Vec<Section> = match serde_json::from_value(layout_value) {
        Ok(layout) => layout,
        Err(e) => return report.refuse(format!("布局结构不合法：{}", e)),
    };

    let mut components: ComponentRegistry = match root.remove("components") {
        Some(value) => match serde_json::from_value(value) {
            Ok(components) => components,
            Err(e) => return report.refuse(format!("组件注册表不合法：{}", e)),
        },
        None => {
            report.warnings.push("缺少 components 字段".to_string());
            ComponentRegistry::new()
        }
    };
    let mismatched: Vec<String> = components
        .iter()
        .filter(|(key, instance)| **key != instance.id)
        .map(|(key, _)| key.clone())
        .collect();
    for key in &mismatched {
        report
            .errors
            .push(format!("组件注册表键 {} 与其 id 不一致", key));
    }

    let metadata = match root.remove("metadata") {
        Some(value) => match serde_json::from_value::<SchemaMetadata>(value) {
            Ok(metadata) => metadata,
            Err(e) => {
                report.warnings.push(format!("metadata 不合法，已使用默认值：{}", e));
                default_metadata(expected_version)
            }
        },
        None => {
            report.warnings.push("缺少 metadata 字段".to_string());
            default_metadata(expected_version)
        }
    };
    if metadata.version != expected_version {
        report.warnings.push(format!(
            "版本不一致：文件为 {}，当前为 {}",
            metadata.version, expected_version
        ));
    }

    let mut section_ids = HashSet::new();
    for section in &layout {
        if !section_ids.insert(section.id.as_str()) {
            report.errors.push(format!("分区 id 重复：{}", section.id));
        }
    }
    if layout.is_empty() {
        report.warnings.push("布局为空".to_string());
    }

    let structure = check_structure(&layout);
    for issue in &structure.misplaced {
        report.errors.push(format!("布局层级不合法：{}", issue));
    }
    for path in &structure.empty {
        report.warnings.push(format!("地址 {} 处的行或列为空", path));
    }

    let consistency = check_consistency(&layout, &components);
    for id in &consistency.duplicate_ids {
        report.errors.push(format!("节点 id 重复：{}", id));
    }
    for id in &consistency.dangling {
        report.errors.push(format!("布局引用了不存在的组件：{}", id));
    }
    for id in &consistency.orphaned {
        report
            .warnings
            .push(format!("组件 {} 未在布局中使用，已忽略", id));
        components.remove(id);
    }

    let unknown_types: BTreeSet<&str> = components
        .iter()
        .map(|(_, instance)| instance.component_type.as_str())
        .filter(|t| !palette::is_known_type(t))
        .collect();
    for t in unknown_types {
        report.warnings.push(format!("未知的组件类型：{}", t));
    }

    for warning in &report.warnings {
        log::warn!("导入警告：{}", warning);
    }
    if !report.errors.is_empty() {
        log::warn!("导入被拒绝：{} 个错误", report.errors.len());
        report.schema = None;
        return report;
    }

    report.schema = Some(FormSchema {
        layout,
        components,
        metadata,
    });
    report
}

fn default_metadata(version: &str) -> SchemaMetadata {
    SchemaMetadata {
        version: version.to_string(),
        title: String::new(),
        description: String::new(),
        exported_at: None,
        extra: Map::new(),
    }
}

/// 从文件读取并校验表单结构
pub fn read_schema_file(path: &Path, expected_version: &str) -> AppResult<ImportReport> {
    let raw = std::fs::read_to_string(path)?;
    Ok(import_schema(&raw, expected_version))
}

/// 将表单结构写入文件（格式化 JSON）
pub fn write_schema_file(path: &Path, schema: &FormSchema) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, to_json_pretty(schema)?)?;
    log::info!("已导出表单结构到 {}", path.display());
    Ok(())
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::layout::{ComponentInstance, LayoutItem};
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_snapshot() -> Snapshot {
        let mut section = Section::new("s0", "基本信息");
        section.layout = vec![LayoutItem::row(
            "r0",
            vec![LayoutItem::column(
                "c0",
                vec![LayoutItem::component("name", "input")],
            )],
        )];
        let mut components = ComponentRegistry::new();
        components.insert(ComponentInstance::new("name", "input", Map::new()));
        Snapshot {
            sections: vec![section],
            components,
        }
    }

    #[test]
    fn test_export_then_import_is_accepted() {
        let schema = export_schema(&sample_snapshot(), "客户登记", "", "1.0.0");
        assert!(schema.metadata.exported_at.is_some());
        let json = to_json_pretty(&schema).unwrap();

        let report = import_schema(&json, "1.0.0");
        assert!(report.is_accepted(), "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        let imported = report.into_schema().unwrap();
        assert_eq!(imported.snapshot(), sample_snapshot());
        assert_eq!(imported.metadata.title, "客户登记");
    }

    #[test]
    fn test_import_accepts_legacy_sections_key() {
        let snapshot = sample_snapshot();
        let raw = json!({
            "sections": snapshot.sections,
            "components": snapshot.components,
            "metadata": { "version": "1.0.0" }
        });
        let report = import_schema(&raw.to_string(), "1.0.0");
        assert!(report.is_accepted());
        assert!(report.warnings.iter().any(|w| w.contains("旧版 sections")));
    }

    #[test]
    fn test_import_rejects_invalid_json() {
        let report = import_schema("{ not json", "1.0.0");
        assert!(!report.is_accepted());
        assert!(report.errors[0].contains("不是合法的 JSON"));
        assert!(report.into_schema().is_err());
    }

    #[test]
    fn test_import_rejects_non_object_and_missing_layout() {
        assert!(!import_schema("[]", "1.0.0").is_accepted());
        let report = import_schema(r#"{ "components": {} }"#, "1.0.0");
        assert_eq!(report.errors, vec!["缺少 layout 字段"]);
        let report = import_schema(r#"{ "layout": {} }"#, "1.0.0");
        assert_eq!(report.errors, vec!["layout 必须是数组"]);
    }

    #[test]
    fn test_import_rejects_dangling_reference() {
        let snapshot = sample_snapshot();
        let raw = json!({
            "layout": snapshot.sections,
            "components": {},
            "metadata": { "version": "1.0.0" }
        });
        let report = import_schema(&raw.to_string(), "1.0.0");
        assert!(!report.is_accepted());
        assert!(report.errors.iter().any(|e| e.contains("name")));
    }

    #[test]
    fn test_import_drops_orphans_with_warning() {
        let mut snapshot = sample_snapshot();
        snapshot
            .components
            .insert(ComponentInstance::new("ghost", "widget", Map::new()));
        let raw = json!({
            "layout": snapshot.sections,
            "components": snapshot.components,
        });
        let report = import_schema(&raw.to_string(), "2.0.0");
        assert!(report.is_accepted());
        assert!(report.warnings.iter().any(|w| w.contains("ghost")));
        assert!(report.warnings.iter().any(|w| w.contains("metadata")));
        assert!(!report.warnings.iter().any(|w| w.contains("版本不一致")));
        let schema = report.into_schema().unwrap();
        assert!(!schema.components.contains("ghost"));
    }

    #[test]
    fn test_import_warns_on_version_mismatch_and_unknown_type() {
        let mut snapshot = sample_snapshot();
        snapshot.sections[0].layout[0] = LayoutItem::row(
            "r0",
            vec![LayoutItem::column(
                "c0",
                vec![LayoutItem::component("w", "fancyWidget")],
            )],
        );
        snapshot.components = ComponentRegistry::new();
        snapshot
            .components
            .insert(ComponentInstance::new("w", "fancyWidget", Map::new()));
        let raw = json!({
            "layout": snapshot.sections,
            "components": snapshot.components,
            "metadata": { "version": "0.9.0", "author": "admin" }
        });
        let report = import_schema(&raw.to_string(), "1.0.0");
        assert!(report.is_accepted());
        assert!(report.warnings.iter().any(|w| w.contains("版本不一致")));
        assert!(report.warnings.iter().any(|w| w.contains("fancyWidget")));
        let schema = report.into_schema().unwrap();
        assert_eq!(schema.metadata.extra.get("author"), Some(&json!("admin")));
    }

    #[test]
    fn test_import_rejects_duplicate_ids() {
        let mut snapshot = sample_snapshot();
        let row = snapshot.sections[0].layout[0].clone();
        snapshot.sections[0].layout.push(row);
        let raw = json!({
            "layout": snapshot.sections,
            "components": snapshot.components,
            "metadata": { "version": "1.0.0" }
        });
        let report = import_schema(&raw.to_string(), "1.0.0");
        assert!(!report.is_accepted());
        assert!(report.errors.iter().any(|e| e.contains("节点 id 重复")));
    }

    #[test]
    fn test_import_rejects_misplaced_nodes() {
        let raw = json!({
            "layout": [{
                "id": "s0",
                "title": "基本信息",
                "layout": [
                    { "id": "name", "type": "input" },
                    { "id": "c0", "type": "column", "children": [
                        { "id": "r0", "type": "row", "children": [] }
                    ] }
                ]
            }],
            "components": { "name": { "id": "name", "type": "input" } },
            "metadata": { "version": "1.0.0" }
        });
        let report = import_schema(&raw.to_string(), "1.0.0");
        assert!(!report.is_accepted());
        assert!(report.errors.iter().any(|e| e.contains("name")));
        assert!(report.errors.iter().any(|e| e.contains("c0")));
    }

    #[test]
    fn test_import_warns_on_empty_rows_and_columns() {
        let mut snapshot = sample_snapshot();
        snapshot.sections[0]
            .layout
            .push(LayoutItem::row("r1", vec![LayoutItem::column("c1", vec![])]));
        snapshot.sections.push(Section::new("s1", "其他"));
        snapshot.sections[1].layout = vec![LayoutItem::row("r2", vec![])];
        let raw = json!({
            "layout": snapshot.sections,
            "components": snapshot.components,
            "metadata": { "version": "1.0.0" }
        });
        let report = import_schema(&raw.to_string(), "1.0.0");
        assert!(report.is_accepted(), "{:?}", report.errors);
        assert!(report.warnings.iter().any(|w| w.contains("0-1-0")));
        assert!(report.warnings.iter().any(|w| w.contains("1-0")));
        assert_eq!(report.into_schema().unwrap().layout, snapshot.sections);
    }

    #[test]
    fn test_write_and_read_schema_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exports").join("form.json");
        let schema = export_schema(&sample_snapshot(), "导出测试", "说明", "1.0.0");
        write_schema_file(&path, &schema).unwrap();
        assert!(path.exists());

        let report = read_schema_file(&path, "1.0.0").unwrap();
        assert!(report.is_accepted());
        assert_eq!(report.into_schema().unwrap(), schema);
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = read_schema_file(&dir.path().join("missing.json"), "1.0.0");
        assert!(matches!(result, Err(AppError::IoError(_))));
    }
}
