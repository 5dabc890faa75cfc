// ============================================================================
// 表单设计器会话
// 持有当前布局、注册表、历史与设置；把拖拽事件转换为布局变更 + 注册表同步 + 历史提交
// ============================================================================
//
// 所有变更都基于最新提交的状态计算（拷贝后替换），不原地修改。
// 任何失败都转换为“跳过”或“拒绝”结果并记录警告，不会写入历史。

use std::path::Path;

use serde_json::{json, Map, Value};

use crate::models::dtos::{
    BuilderState, DraggedItem, DropEvent, DropOutcome, OutcomeStatus, PaletteItem,
};
use crate::models::layout::{ComponentInstance, ComponentRegistry, LayoutItem, Section, Snapshot};
use crate::models::path::LayoutPath;
use crate::models::settings::BuilderSettings;
use crate::services::history::HistoryStack;
use crate::services::id_gen::{get_id_generator, next_unique_id, IdGenerator};
use crate::services::layout_tree::{self, LayoutChange, MoveKind};
use crate::services::palette;
use crate::services::registry_sync;
use crate::services::schema_io::{self, FormSchema, ImportReport};
use crate::utils::error::{AppError, AppResult};

/// 一次变更计算出的新状态
struct Mutation {
    sections: Vec<Section>,
    components: ComponentRegistry,
    advisory: Option<String>,
    created_id: Option<String>,
}

impl Mutation {
    fn new(sections: Vec<Section>, components: ComponentRegistry) -> Self {
        Mutation {
            sections,
            components,
            advisory: None,
            created_id: None,
        }
    }
}

enum Step {
    Commit(Mutation),
    Unchanged(String),
}

/// 表单设计器会话
pub struct FormBuilder {
    sections: Vec<Section>,
    components: ComponentRegistry,
    history: HistoryStack,
    settings: BuilderSettings,
    ids: Box<dyn IdGenerator>,
}

impl FormBuilder {
    /// 以一个空分区开始的新会话
    pub fn new(settings: BuilderSettings) -> AppResult<Self> {
        let mut ids = get_id_generator("timestamp")?;
        let first = Section::new(ids.next_id("section"), "分区 1");
        let initial = Snapshot {
            sections: vec![first],
            components: ComponentRegistry::new(),
        };
        Self::with_id_generator(settings, initial, ids)
    }

    /// 指定初始状态和 id 生成策略
    pub fn with_id_generator(
        settings: BuilderSettings,
        initial: Snapshot,
        ids: Box<dyn IdGenerator>,
    ) -> AppResult<Self> {
        settings.validate()?;
        let history = HistoryStack::new(settings.history_capacity, initial.clone())?;
        Ok(FormBuilder {
            sections: initial.sections,
            components: initial.components,
            history,
            settings,
            ids,
        })
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    pub fn settings(&self) -> &BuilderSettings {
        &self.settings
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sections: self.sections.clone(),
            components: self.components.clone(),
        }
    }

    pub fn state(&self) -> BuilderState {
        BuilderState {
            sections: self.sections.clone(),
            components: self.components.clone(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            history_len: self.history.len(),
            history_index: self.history.index(),
        }
    }

    // ========================================================================
    // 拖拽放置
    // ========================================================================

    /// 处理一次拖拽放置：来自组件面板则新建组件，否则移动已有元素
    pub fn handle_drop(&mut self, event: &DropEvent) -> DropOutcome {
        let result = self.plan_drop(event);
        self.finish("拖拽放置", result)
    }

    fn plan_drop(&mut self, event: &DropEvent) -> AppResult<Step> {
        let zone = self.resolve_zone(
            &event.drop_zone.path,
            event.drop_zone.container_id.as_deref(),
        )?;
        let dragged = &event.dragged_item;

        if let Some(template) = palette_template(dragged) {
            return self.plan_insert(&zone, template);
        }

        let raw_path = dragged.path.as_deref().ok_or_else(|| {
            AppError::MissingItemPath(format!(
                "{}（{}）",
                dragged.id.as_deref().unwrap_or("未知 id"),
                dragged.item_type
            ))
        })?;
        let item_path = LayoutPath::parse(raw_path)?;
        let node = layout_tree::node_at(&self.sections, &item_path)?;
        if let Some(id) = dragged.id.as_deref() {
            if node.id() != id {
                return Err(AppError::AddressError(format!(
                    "地址 {} 处的元素是 {}，而非 {}",
                    item_path,
                    node.id(),
                    id
                )));
            }
        }
        let mut moved_ids = Vec::new();
        node.collect_component_ids(&mut moved_ids);

        let kind = layout_tree::classify_move(&item_path, &zone);
        let change = layout_tree::move_item(
            &self.sections,
            &item_path,
            &zone,
            self.ids.as_mut(),
            self.settings.column_warning_threshold,
        )?;

        match change {
            LayoutChange::Unchanged => Ok(Step::Unchanged("原位放置，布局未变化".to_string())),
            LayoutChange::Applied { sections, advisory } => {
                if kind != MoveKind::WithinParent {
                    registry_sync::ensure_moved_registered(&self.components, &moved_ids)?;
                }
                let components = self.components.clone();
                log::debug!("移动 {} → {}（{:?}），涉及 {} 个组件", item_path, zone, kind, moved_ids.len());
                let mut mutation = Mutation::new(sections, components);
                mutation.advisory = advisory;
                Ok(Step::Commit(mutation))
            }
        }
    }

    /// 解析放置区；携带容器 id 时以容器的当前位置为父地址
    fn resolve_zone(&self, raw: &str, container_id: Option<&str>) -> AppResult<LayoutPath> {
        let zone = LayoutPath::parse(raw)?;
        let Some(container_id) = container_id else {
            return Ok(zone);
        };
        let container_path = layout_tree::find_path(&self.sections, container_id)
            .ok_or_else(|| AppError::ComponentNotFound(format!("容器 {}", container_id)))?;
        if zone.parent().as_ref() == Some(&container_path) {
            return Ok(zone);
        }
        let index = zone
            .last()
            .ok_or_else(|| AppError::AddressError(format!("放置区地址 \"{}\" 为空", raw)))?;
        log::debug!("放置区 {} 按容器 {} 重新定位到 {}", zone, container_id, container_path);
        Ok(container_path.child(index))
    }

    fn plan_insert(&mut self, zone: &LayoutPath, template: PaletteItem) -> AppResult<Step> {
        let component_type = template.component_type;
        let mut props = palette::default_props(&component_type);
        for (key, value) in registry_sync::sanitize_patch(&template.props) {
            props.insert(key, value);
        }
        if let Some(label) = template.label {
            if !template.props.contains_key("label") {
                props.insert("label".to_string(), json!(label));
            }
        }

        let id = self.fresh_id(&component_type)?;
        let inline = palette::container_inline_props(&props);
        let node = if palette::is_container_type(&component_type) || !inline.is_empty() {
            LayoutItem::container(id.clone(), component_type.clone(), inline)
        } else {
            LayoutItem::component(id.clone(), component_type.clone())
        };

        let sections = layout_tree::insert_new(&self.sections, zone, node, self.ids.as_mut())?;
        let components = registry_sync::register_new(
            &self.components,
            ComponentInstance::new(id.clone(), component_type, props),
        );
        log::debug!("新建组件 {} 于 {}", id, zone);

        let mut mutation = Mutation::new(sections, components);
        mutation.created_id = Some(id);
        Ok(Step::Commit(mutation))
    }

    /// 生成在注册表和布局中都不存在的 id
    fn fresh_id(&mut self, prefix: &str) -> AppResult<String> {
        let components = &self.components;
        let sections = &self.sections;
        next_unique_id(self.ids.as_mut(), prefix, |id| {
            components.contains(id) || layout_tree::find_path(sections, id).is_some()
        })
    }

    // ========================================================================
    // 删除、属性更新
    // ========================================================================

    /// 删除元素（拖到回收区）
    ///
    /// 先尝试按容器 id 删除；失败时退回按地址删除；都没有地址时按 id 查找任意节点。
    pub fn remove_item(&mut self, item_id: Option<&str>, path: Option<&str>) -> DropOutcome {
        let result = self.plan_remove(item_id, path);
        self.finish("删除", result)
    }

    fn plan_remove(&self, item_id: Option<&str>, path: Option<&str>) -> AppResult<Step> {
        let (sections, removed) = match (item_id, path) {
            (Some(id), path) => match layout_tree::remove_container_by_id(&self.sections, id) {
                Ok(done) => done,
                Err(e) => {
                    log::debug!("按容器 id 删除 {} 失败（{}），改用地址删除", id, e);
                    let item_path = match path {
                        Some(raw) => LayoutPath::parse(raw)?,
                        None => layout_tree::find_path(&self.sections, id)
                            .ok_or_else(|| AppError::ComponentNotFound(id.to_string()))?,
                    };
                    let node = layout_tree::node_at(&self.sections, &item_path)?;
                    if node.id() != id {
                        return Err(AppError::AddressError(format!(
                            "地址 {} 处的元素是 {}，而非 {}",
                            item_path,
                            node.id(),
                            id
                        )));
                    }
                    layout_tree::remove_at(&self.sections, &item_path)?
                }
            },
            (None, Some(raw)) => layout_tree::remove_at(&self.sections, &LayoutPath::parse(raw)?)?,
            (None, None) => {
                return Err(AppError::MissingItemPath("删除操作既无 id 也无地址".to_string()));
            }
        };

        let mut removed_ids = Vec::new();
        removed.collect_component_ids(&mut removed_ids);
        let (components, deleted) =
            registry_sync::remove_unreferenced(&self.components, &removed_ids, &sections);
        log::info!("已删除 {}，同步移除 {} 个组件", removed.id(), deleted.len());
        Ok(Step::Commit(Mutation::new(sections, components)))
    }

    /// 合并组件属性；容器组件同时更新布局树中的内联配置
    pub fn update_component(&mut self, id: &str, patch: &Map<String, Value>) -> DropOutcome {
        let result = self.plan_update(id, patch);
        self.finish("属性更新", result)
    }

    fn plan_update(&self, id: &str, patch: &Map<String, Value>) -> AppResult<Step> {
        let patch = registry_sync::sanitize_patch(patch);
        let components = registry_sync::merge_props(&self.components, id, &patch)?;
        if components == self.components {
            return Ok(Step::Unchanged("属性无变化".to_string()));
        }
        let instance = components
            .get(id)
            .ok_or_else(|| AppError::ComponentNotFound(id.to_string()))?;

        let sections = if instance.has_container_config()
            || palette::is_container_type(&instance.component_type)
        {
            let (sections, count) = layout_tree::merge_inline_props(&self.sections, id, &patch);
            log::debug!("容器 {} 的配置同步到布局树 {} 处", id, count);
            sections
        } else {
            self.sections.clone()
        };
        Ok(Step::Commit(Mutation::new(sections, components)))
    }

    // ========================================================================
    // 分区
    // ========================================================================

    pub fn add_section(&mut self, title: &str, description: &str) -> DropOutcome {
        let result = self.fresh_id("section").map(|id| {
            let mut section = Section::new(id.clone(), title);
            section.description = description.to_string();
            let sections = layout_tree::add_section(&self.sections, section, None);
            let mut mutation = Mutation::new(sections, self.components.clone());
            mutation.created_id = Some(id);
            Step::Commit(mutation)
        });
        self.finish("新增分区", result)
    }

    pub fn update_section(
        &mut self,
        section_id: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> DropOutcome {
        let result = layout_tree::update_section(&self.sections, section_id, title, description)
            .map(|sections| {
                if sections == self.sections {
                    Step::Unchanged("分区无变化".to_string())
                } else {
                    Step::Commit(Mutation::new(sections, self.components.clone()))
                }
            });
        self.finish("更新分区", result)
    }

    pub fn move_section(&mut self, from: usize, to: usize) -> DropOutcome {
        let result = layout_tree::move_section(&self.sections, from, to).map(|change| match change {
            LayoutChange::Unchanged => Step::Unchanged("分区位置未变化".to_string()),
            LayoutChange::Applied { sections, .. } => {
                Step::Commit(Mutation::new(sections, self.components.clone()))
            }
        });
        self.finish("移动分区", result)
    }

    /// 删除分区及其中的全部组件
    pub fn remove_section(&mut self, section_id: &str) -> DropOutcome {
        let result = layout_tree::remove_section(&self.sections, section_id).map(|(sections, removed)| {
            let mut removed_ids = Vec::new();
            removed.collect_component_ids(&mut removed_ids);
            let (components, _) =
                registry_sync::remove_unreferenced(&self.components, &removed_ids, &sections);
            Step::Commit(Mutation::new(sections, components))
        });
        self.finish("删除分区", result)
    }

    // ========================================================================
    // 历史
    // ========================================================================

    pub fn undo(&mut self) -> DropOutcome {
        match self.history.undo().cloned() {
            Some(snapshot) => {
                self.restore(snapshot);
                self.outcome(OutcomeStatus::Applied, None, None, None)
            }
            None => self.outcome(
                OutcomeStatus::Skipped,
                None,
                Some("没有可撤销的操作".to_string()),
                None,
            ),
        }
    }

    pub fn redo(&mut self) -> DropOutcome {
        match self.history.redo().cloned() {
            Some(snapshot) => {
                self.restore(snapshot);
                self.outcome(OutcomeStatus::Applied, None, None, None)
            }
            None => self.outcome(
                OutcomeStatus::Skipped,
                None,
                Some("没有可重做的操作".to_string()),
                None,
            ),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.sections = snapshot.sections;
        self.components = snapshot.components;
    }

    // ========================================================================
    // 导入导出、设置
    // ========================================================================

    pub fn export_schema(&self, title: &str, description: &str) -> FormSchema {
        schema_io::export_schema(
            &self.snapshot(),
            title,
            description,
            &self.settings.schema_version,
        )
    }

    /// 导入表单结构；校验通过时替换当前状态并重置历史
    pub fn import_schema(&mut self, raw: &str) -> ImportReport {
        let report = schema_io::import_schema(raw, &self.settings.schema_version);
        self.accept_import(report)
    }

    fn accept_import(&mut self, report: ImportReport) -> ImportReport {
        if let (true, Some(schema)) = (report.is_accepted(), report.schema.as_ref()) {
            self.load_schema(schema);
            log::info!(
                "已导入表单：{} 个分区，{} 个组件",
                self.sections.len(),
                self.components.len()
            );
        }
        report
    }

    /// 导出到文件
    pub fn export_to_file(&self, path: &Path, title: &str, description: &str) -> AppResult<()> {
        schema_io::write_schema_file(path, &self.export_schema(title, description))
    }

    /// 从文件导入；文件无法读取时返回错误，内容校验结果见报告
    pub fn import_from_file(&mut self, path: &Path) -> AppResult<ImportReport> {
        let report = schema_io::read_schema_file(path, &self.settings.schema_version)?;
        Ok(self.accept_import(report))
    }

    pub fn load_schema(&mut self, schema: &FormSchema) {
        self.load_snapshot(schema.snapshot());
    }

    /// 替换当前状态并以其为起点重置历史
    pub fn load_snapshot(&mut self, snapshot: Snapshot) {
        self.history.reset(snapshot.clone());
        self.restore(snapshot);
    }

    /// 应用新设置；历史容量变化时以当前状态为起点重建历史
    pub fn apply_settings(&mut self, settings: BuilderSettings) -> AppResult<()> {
        settings.validate()?;
        if settings.history_capacity != self.history.capacity() {
            self.history = HistoryStack::new(settings.history_capacity, self.snapshot())?;
        }
        self.settings = settings;
        Ok(())
    }

    // ========================================================================
    // 结果处理
    // ========================================================================

    fn finish(&mut self, action: &str, result: AppResult<Step>) -> DropOutcome {
        match result {
            Ok(Step::Commit(mutation)) => {
                self.sections = mutation.sections;
                self.components = mutation.components;
                let snapshot = self.snapshot();
                self.history.commit(snapshot);
                if cfg!(debug_assertions) {
                    let report = registry_sync::check_consistency(&self.sections, &self.components);
                    if !report.is_consistent() {
                        log::warn!("{}后布局与注册表不一致：{:?}", action, report);
                    }
                }
                self.outcome(
                    OutcomeStatus::Applied,
                    mutation.advisory,
                    None,
                    mutation.created_id,
                )
            }
            Ok(Step::Unchanged(reason)) => {
                log::debug!("{}未产生变化：{}", action, reason);
                self.outcome(OutcomeStatus::Skipped, None, Some(reason), None)
            }
            Err(e) if e.is_rejection() => {
                log::warn!("{}被拒绝：{}", action, e);
                self.outcome(OutcomeStatus::Rejected, None, Some(e.to_string()), None)
            }
            Err(e) => {
                log::warn!("{}已跳过：{}", action, e);
                self.outcome(OutcomeStatus::Skipped, None, Some(e.to_string()), None)
            }
        }
    }

    fn outcome(
        &self,
        status: OutcomeStatus,
        advisory: Option<String>,
        reason: Option<String>,
        created_id: Option<String>,
    ) -> DropOutcome {
        DropOutcome {
            status,
            advisory,
            reason,
            created_id,
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        }
    }
}

/// 识别来自组件面板的拖拽源：携带模板，或既无 id 也无地址的已知组件类型
fn palette_template(dragged: &DraggedItem) -> Option<PaletteItem> {
    if let Some(template) = &dragged.component {
        return Some(template.clone());
    }
    if dragged.id.is_none() && dragged.path.is_none() && palette::is_known_type(&dragged.item_type) {
        return Some(PaletteItem {
            component_type: dragged.item_type.clone(),
            label: None,
            props: Map::new(),
        });
    }
    None
}

// ============================================================================
// 单元测试
// ============================================================================
