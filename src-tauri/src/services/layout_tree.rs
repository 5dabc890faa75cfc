// ============================================================================
// 布局树变更引擎
// 纯函数：输入当前分区列表与地址，返回新的分区列表，绝不原地修改输入
// ============================================================================
//
// 放置区地址约定：
// - `[s, i]`       分区 s 的第 i 个位置，期望放入行
// - `[s, r, i]`    第 r 行的第 i 个位置，期望放入列
// - 更深的地址     列或容器组件内部的位置，期望放入组件
//
// 放入的元素层级不足时自动包裹：组件放到分区层级 → 新建 行[列[组件]]，
// 放到行层级 → 新建 列[组件]；列放到分区层级 → 新建 行[列]。
// 跨父节点移动或删除后，只沿源位置向上清理因此变空的行、列，
// 其他位置已有的空行、空列以及被移动的子树本身保持原样。
// 包裹用的行、列 id 与现有节点冲突时重新生成。

use serde_json::{Map, Value};

use crate::models::layout::{ItemKind, LayoutItem, Section, COLUMN_TYPE, ROW_TYPE};
use crate::models::path::LayoutPath;
use crate::services::id_gen::{next_unique_id, IdGenerator};
use crate::utils::error::{AppError, AppResult};

/// 一次布局变更的结果
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutChange {
    /// 产生了新的布局
    Applied {
        sections: Vec<Section>,
        /// 非阻塞提示（如一行列数过多）
        advisory: Option<String>,
    },
    /// 结构未变化（如原位放置）
    Unchanged,
}

/// 放置区所在父节点的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    Section,
    Row,
    Column,
    Container,
}

/// 移动的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    WithinParent,
    AcrossParents,
    AcrossSections,
}

// ============================================================================
// 地址解析
// ============================================================================

fn out_of_range(path: &LayoutPath) -> AppError {
    AppError::AddressError(format!("地址 {} 超出范围", path))
}

fn missing_section(index: usize) -> AppError {
    AppError::AddressError(format!("分区 {} 不存在", index))
}

/// 获取地址指向的节点（地址至少两段）
pub fn node_at<'a>(sections: &'a [Section], path: &LayoutPath) -> AppResult<&'a LayoutItem> {
    let indices = path.indices();
    if indices.len() < 2 {
        return Err(AppError::AddressError(format!(
            "地址 \"{}\" 未指向布局节点",
            path
        )));
    }
    let section = sections
        .get(indices[0])
        .ok_or_else(|| missing_section(indices[0]))?;
    let mut current = section
        .layout
        .get(indices[1])
        .ok_or_else(|| out_of_range(path))?;
    for &i in &indices[2..] {
        current = current
            .children()
            .and_then(|children| children.get(i))
            .ok_or_else(|| out_of_range(path))?;
    }
    Ok(current)
}

/// 获取父地址对应的 children 列表（单段地址即分区的 layout）
fn children_at<'a>(sections: &'a [Section], parent: &LayoutPath) -> AppResult<&'a Vec<LayoutItem>> {
    match parent.indices() {
        [] => Err(AppError::AddressError("空地址".to_string())),
        [s] => Ok(&sections.get(*s).ok_or_else(|| missing_section(*s))?.layout),
        _ => node_at(sections, parent)?.children().ok_or_else(|| {
            AppError::AddressError(format!("节点 {} 不能包含子元素", parent))
        }),
    }
}

fn children_at_mut<'a>(
    sections: &'a mut [Section],
    parent: &LayoutPath,
) -> AppResult<&'a mut Vec<LayoutItem>> {
    let (first, rest) = parent
        .indices()
        .split_first()
        .ok_or_else(|| AppError::AddressError("空地址".to_string()))?;
    let section = sections
        .get_mut(*first)
        .ok_or_else(|| missing_section(*first))?;
    let mut children: &'a mut Vec<LayoutItem> = &mut section.layout;
    for &i in rest {
        let node = children.get_mut(i).ok_or_else(|| out_of_range(parent))?;
        children = node.children_mut().ok_or_else(|| {
            AppError::AddressError(format!("节点 {} 不能包含子元素", parent))
        })?;
    }
    Ok(children)
}

/// 判断放置区父节点的种类
pub fn parent_kind(sections: &[Section], parent: &LayoutPath) -> AppResult<ParentKind> {
    match parent.indices() {
        [] => Err(AppError::AddressError("空地址".to_string())),
        [s] => sections
            .get(*s)
            .map(|_| ParentKind::Section)
            .ok_or_else(|| missing_section(*s)),
        _ => match node_at(sections, parent)? {
            LayoutItem::Row { .. } => Ok(ParentKind::Row),
            LayoutItem::Column { .. } => Ok(ParentKind::Column),
            LayoutItem::Component {
                children: Some(_), ..
            } => Ok(ParentKind::Container),
            LayoutItem::Component { id, .. } => Err(AppError::AddressError(format!(
                "组件 {} 不能包含子元素",
                id
            ))),
        },
    }
}

/// 校验放置区地址：父节点存在且索引不超过当前子节点数
fn resolve_zone(sections: &[Section], zone: &LayoutPath) -> AppResult<(LayoutPath, usize)> {
    if zone.len() < 2 {
        return Err(AppError::AddressError(format!(
            "放置区地址 \"{}\" 至少需要两段",
            zone
        )));
    }
    let parent = zone.parent().ok_or_else(|| out_of_range(zone))?;
    let index = zone.last().ok_or_else(|| out_of_range(zone))?;
    let children = children_at(sections, &parent)?;
    if index > children.len() {
        return Err(out_of_range(zone));
    }
    Ok((parent, index))
}

/// 按 id 查找节点地址（深度优先，返回第一个匹配）
pub fn find_path(sections: &[Section], id: &str) -> Option<LayoutPath> {
    fn walk(items: &[LayoutItem], prefix: &LayoutPath, id: &str) -> Option<LayoutPath> {
        for (i, item) in items.iter().enumerate() {
            let path = prefix.child(i);
            if item.id() == id {
                return Some(path);
            }
            if let Some(children) = item.children() {
                if let Some(found) = walk(children, &path, id) {
                    return Some(found);
                }
            }
        }
        None
    }

    sections
        .iter()
        .enumerate()
        .find_map(|(s, section)| walk(&section.layout, &LayoutPath::new(vec![s]), id))
}

/// 网格结构检查结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureReport {
    /// 层级不合法的节点描述
    pub misplaced: Vec<String>,
    /// 不含子元素的行、列地址
    pub empty: Vec<LayoutPath>,
}

/// 检查网格层级：分区只放行，行只放列，列和容器组件只放组件
pub fn check_structure(sections: &[Section]) -> StructureReport {
    fn walk(items: &[LayoutItem], parent: ParentKind, prefix: &LayoutPath, report: &mut StructureReport) {
        let expected = match parent {
            ParentKind::Section => ItemKind::Row,
            ParentKind::Row => ItemKind::Column,
            ParentKind::Column | ParentKind::Container => ItemKind::Component,
        };
        for (i, item) in items.iter().enumerate() {
            let path = prefix.child(i);
            if item.kind() != expected {
                report.misplaced.push(format!(
                    "{}（{}）不能放入 {:?}，地址 {}",
                    item.id(),
                    item.type_name(),
                    parent,
                    path
                ));
                continue;
            }
            let (kind, children) = match item {
                LayoutItem::Row { children, .. } => (ParentKind::Row, children),
                LayoutItem::Column { children, .. } => (ParentKind::Column, children),
                LayoutItem::Component {
                    children: Some(children),
                    ..
                } => (ParentKind::Container, children),
                LayoutItem::Component { children: None, .. } => continue,
            };
            if children.is_empty() && kind != ParentKind::Container {
                report.empty.push(path.clone());
            }
            walk(children, kind, &path, report);
        }
    }

    let mut report = StructureReport::default();
    for (s, section) in sections.iter().enumerate() {
        walk(&section.layout, ParentKind::Section, &LayoutPath::new(vec![s]), &mut report);
    }
    report
}

/// 判断一次移动属于同父、跨父还是跨分区
pub fn classify_move(item_path: &LayoutPath, zone: &LayoutPath) -> MoveKind {
    if item_path.section_index() != zone.section_index() {
        MoveKind::AcrossSections
    } else if item_path.parent() == zone.parent() {
        MoveKind::WithinParent
    } else {
        MoveKind::AcrossParents
    }
}

// ============================================================================
// 结构辅助
// ============================================================================

/// 为包裹行、列生成 id：不与布局中已有节点及被包裹子树中的 id 重复
fn wrapper_id(
    sections: &[Section],
    inner: &LayoutItem,
    ids: &mut dyn IdGenerator,
    prefix: &str,
) -> AppResult<String> {
    let mut inner_ids = Vec::new();
    inner.collect_all_ids(&mut inner_ids);
    next_unique_id(ids, prefix, |id| {
        inner_ids.iter().any(|taken| taken == id) || find_path(sections, id).is_some()
    })
}

/// 按父节点种类包裹元素，层级不匹配时返回 InvalidPlacement
fn wrap_for_parent(
    sections: &[Section],
    kind: ParentKind,
    item: LayoutItem,
    ids: &mut dyn IdGenerator,
) -> AppResult<LayoutItem> {
    match (kind, item.kind()) {
        (ParentKind::Section, ItemKind::Row) => Ok(item),
        (ParentKind::Section, ItemKind::Column) => {
            let row_id = wrapper_id(sections, &item, ids, ROW_TYPE)?;
            Ok(LayoutItem::row(row_id, vec![item]))
        }
        (ParentKind::Section, ItemKind::Component) => {
            let column_id = wrapper_id(sections, &item, ids, COLUMN_TYPE)?;
            let column = LayoutItem::column(column_id, vec![item]);
            let row_id = wrapper_id(sections, &column, ids, ROW_TYPE)?;
            Ok(LayoutItem::row(row_id, vec![column]))
        }
        (ParentKind::Row, ItemKind::Column) => Ok(item),
        (ParentKind::Row, ItemKind::Component) => {
            let column_id = wrapper_id(sections, &item, ids, COLUMN_TYPE)?;
            Ok(LayoutItem::column(column_id, vec![item]))
        }
        (ParentKind::Column | ParentKind::Container, ItemKind::Component) => Ok(item),
        (parent, _) => Err(AppError::InvalidPlacement(format!(
            "{} 不能放入 {:?}",
            item.type_name(),
            parent
        ))),
    }
}

/// 校验元素能否放入该父节点（不生成 id）
fn check_placement(kind: ParentKind, item: &LayoutItem) -> AppResult<()> {
    let allowed = match item.kind() {
        ItemKind::Row => kind == ParentKind::Section,
        ItemKind::Column => matches!(kind, ParentKind::Section | ParentKind::Row),
        ItemKind::Component => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::InvalidPlacement(format!(
            "{} 不能放入 {:?}",
            item.type_name(),
            kind
        )))
    }
}

fn detach(sections: &mut [Section], path: &LayoutPath) -> AppResult<LayoutItem> {
    let parent = path.parent().ok_or_else(|| out_of_range(path))?;
    let index = path.last().ok_or_else(|| out_of_range(path))?;
    let children = children_at_mut(sections, &parent)?;
    if index >= children.len() {
        return Err(out_of_range(path));
    }
    Ok(children.remove(index))
}

fn insert_at(sections: &mut [Section], zone: &LayoutPath, item: LayoutItem) -> AppResult<()> {
    let parent = zone.parent().ok_or_else(|| out_of_range(zone))?;
    let index = zone.last().ok_or_else(|| out_of_range(zone))?;
    let children = children_at_mut(sections, &parent)?;
    if index > children.len() {
        return Err(out_of_range(zone));
    }
    children.insert(index, item);
    Ok(())
}

/// 自 `removed` 的父节点向上清理因删除而变空的行、列
///
/// 遇到非空节点、分区、容器组件或仍承载放置区的节点时停止。
/// 每清理一个节点都按其位置重算 `target`。
fn prune_emptied_ancestors(
    sections: &mut [Section],
    removed: &LayoutPath,
    mut target: Option<&mut LayoutPath>,
) {
    let mut current = removed.parent();
    while let Some(path) = current {
        if path.len() < 2 {
            break;
        }
        let hosts_target = target
            .as_deref()
            .and_then(|t| t.parent())
            .is_some_and(|parent| parent.starts_with(&path));
        if hosts_target {
            break;
        }
        let emptied = matches!(
            node_at(sections, &path),
            Ok(LayoutItem::Row { children, .. } | LayoutItem::Column { children, .. })
                if children.is_empty()
        );
        if !emptied || detach(sections, &path).is_err() {
            break;
        }
        if let Some(t) = target.as_deref_mut() {
            *t = t.rebase_after_removal(&path);
        }
        log::debug!("清理空节点 {}", path);
        current = path.parent();
    }
}

// ============================================================================
// 变更操作
// ============================================================================

/// 同父节点内重排：移除源索引处的元素并插入目标索引
///
/// 目标索引与源索引相同或紧随其后时视为原位放置，返回 Unchanged。
pub fn move_within_parent(
    sections: &[Section],
    item_path: &LayoutPath,
    zone: &LayoutPath,
) -> AppResult<LayoutChange> {
    let (parent, to) = resolve_zone(sections, zone)?;
    if item_path.parent().as_ref() != Some(&parent) {
        return Err(AppError::AddressError(format!(
            "{} 与 {} 不在同一父节点下",
            item_path, zone
        )));
    }
    let from = item_path.last().ok_or_else(|| out_of_range(item_path))?;
    if from >= children_at(sections, &parent)?.len() {
        return Err(out_of_range(item_path));
    }
    if to == from || to == from + 1 {
        return Ok(LayoutChange::Unchanged);
    }

    let mut updated = sections.to_vec();
    let children = children_at_mut(&mut updated, &parent)?;
    let item = children.remove(from);
    let target = if to > from { to - 1 } else { to };
    children.insert(target, item);

    Ok(LayoutChange::Applied {
        sections: updated,
        advisory: None,
    })
}

/// 跨父节点（含跨分区）移动：整棵子树原子移动
///
/// 先摘下子树并清理源位置上因此变空的行、列，再按移除结果重算放置区地址后插入。
/// 列被移入已有 `column_warning_threshold` 列及以上的行时给出提示，但不阻止移动。
pub fn move_to_parent(
    sections: &[Section],
    item_path: &LayoutPath,
    zone: &LayoutPath,
    ids: &mut dyn IdGenerator,
    column_warning_threshold: usize,
) -> AppResult<LayoutChange> {
    let item = node_at(sections, item_path)?;
    if item_path.is_ancestor_of(zone) {
        return Err(AppError::CycleRejected(format!(
            "{} 不能放入其自身的子节点 {}",
            item.id(),
            zone
        )));
    }
    let (parent, _) = resolve_zone(sections, zone)?;
    let kind = parent_kind(sections, &parent)?;
    check_placement(kind, item)?;

    let mut updated = sections.to_vec();
    let detached = detach(&mut updated, item_path)?;
    let mut target = zone.rebase_after_removal(item_path);
    prune_emptied_ancestors(&mut updated, item_path, Some(&mut target));

    let mut advisory = None;
    if kind == ParentKind::Row && detached.kind() == ItemKind::Column {
        let target_parent = target.parent().ok_or_else(|| out_of_range(&target))?;
        let existing = children_at(&updated, &target_parent)?.len();
        if existing >= column_warning_threshold {
            log::warn!("行 {} 已有 {} 列，继续拖入列", target_parent, existing);
            advisory = Some(format!(
                "当前行已有 {} 列，继续添加可能导致布局拥挤",
                existing
            ));
        }
    }

    let wrapped = wrap_for_parent(&updated, kind, detached, ids)?;
    insert_at(&mut updated, &target, wrapped)?;

    Ok(LayoutChange::Applied {
        sections: updated,
        advisory,
    })
}

/// 移动已有元素，按源地址与放置区地址分派到同父重排或跨父移动
pub fn move_item(
    sections: &[Section],
    item_path: &LayoutPath,
    zone: &LayoutPath,
    ids: &mut dyn IdGenerator,
    column_warning_threshold: usize,
) -> AppResult<LayoutChange> {
    if item_path.len() < 2 {
        return Err(AppError::AddressError(format!(
            "拖拽源地址 \"{}\" 未指向布局节点",
            item_path
        )));
    }
    if item_path.is_ancestor_of(zone) {
        return Err(AppError::CycleRejected(format!(
            "{} 不能放入其自身的子节点 {}",
            item_path, zone
        )));
    }
    match classify_move(item_path, zone) {
        MoveKind::WithinParent => move_within_parent(sections, item_path, zone),
        MoveKind::AcrossParents | MoveKind::AcrossSections => {
            move_to_parent(sections, item_path, zone, ids, column_warning_threshold)
        }
    }
}

/// 在放置区插入新元素（来自组件面板），按需包裹行/列
pub fn insert_new(
    sections: &[Section],
    zone: &LayoutPath,
    item: LayoutItem,
    ids: &mut dyn IdGenerator,
) -> AppResult<Vec<Section>> {
    let (parent, _) = resolve_zone(sections, zone)?;
    let kind = parent_kind(sections, &parent)?;
    let wrapped = wrap_for_parent(sections, kind, item, ids)?;

    let mut updated = sections.to_vec();
    insert_at(&mut updated, zone, wrapped)?;
    Ok(updated)
}

/// 按地址删除元素，返回新布局与被删除的子树
pub fn remove_at(
    sections: &[Section],
    path: &LayoutPath,
) -> AppResult<(Vec<Section>, LayoutItem)> {
    node_at(sections, path)?;
    let mut updated = sections.to_vec();
    let removed = detach(&mut updated, path)?;
    prune_emptied_ancestors(&mut updated, path, None);
    Ok((updated, removed))
}

/// 按 id 删除容器组件（容器内部的拖拽源不携带地址）
pub fn remove_container_by_id(
    sections: &[Section],
    id: &str,
) -> AppResult<(Vec<Section>, LayoutItem)> {
    let path = find_path(sections, id)
        .ok_or_else(|| AppError::ComponentNotFound(format!("布局中不存在容器 {}", id)))?;
    if !node_at(sections, &path)?.is_container() {
        return Err(AppError::ComponentNotFound(format!("{} 不是容器组件", id)));
    }
    remove_at(sections, &path)
}

/// 将属性补丁合并到布局树中所有 id 匹配的组件节点的内联属性
///
/// 返回新布局和被更新的节点数。
pub fn merge_inline_props(
    sections: &[Section],
    id: &str,
    patch: &Map<String, Value>,
) -> (Vec<Section>, usize) {
    fn walk(items: &mut [LayoutItem], id: &str, patch: &Map<String, Value>) -> usize {
        let mut count = 0;
        for item in items.iter_mut() {
            if let LayoutItem::Component {
                id: item_id, props, ..
            } = item
            {
                if item_id.as_str() == id {
                    for (key, value) in patch {
                        props.insert(key.clone(), value.clone());
                    }
                    count += 1;
                }
            }
            if let Some(children) = item.children_mut() {
                count += walk(children, id, patch);
            }
        }
        count
    }

    let mut updated = sections.to_vec();
    let count = updated
        .iter_mut()
        .map(|section| walk(&mut section.layout, id, patch))
        .sum();
    (updated, count)
}

// ============================================================================
// 分区操作
// ============================================================================

/// 插入分区；`index` 为空或越界时追加到末尾
pub fn add_section(sections: &[Section], section: Section, index: Option<usize>) -> Vec<Section> {
    let mut updated = sections.to_vec();
    let at = index.unwrap_or(updated.len()).min(updated.len());
    updated.insert(at, section);
    updated
}

/// 更新分区标题和描述（None 表示保持不变）
pub fn update_section(
    sections: &[Section],
    section_id: &str,
    title: Option<&str>,
    description: Option<&str>,
) -> AppResult<Vec<Section>> {
    let mut updated = sections.to_vec();
    let section = updated
        .iter_mut()
        .find(|s| s.id == section_id)
        .ok_or_else(|| AppError::SectionNotFound(section_id.to_string()))?;
    if let Some(title) = title {
        section.title = title.to_string();
    }
    if let Some(description) = description {
        section.description = description.to_string();
    }
    Ok(updated)
}

/// 调整分区顺序，`to` 为移动后的最终索引
pub fn move_section(sections: &[Section], from: usize, to: usize) -> AppResult<LayoutChange> {
    if from >= sections.len() {
        return Err(missing_section(from));
    }
    if to >= sections.len() {
        return Err(missing_section(to));
    }
    if from == to {
        return Ok(LayoutChange::Unchanged);
    }
    let mut updated = sections.to_vec();
    let section = updated.remove(from);
    updated.insert(to, section);
    Ok(LayoutChange::Applied {
        sections: updated,
        advisory: None,
    })
}

/// 删除分区，返回新布局与被删除的分区
pub fn remove_section(sections: &[Section], section_id: &str) -> AppResult<(Vec<Section>, Section)> {
    let index = sections
        .iter()
        .position(|s| s.id == section_id)
        .ok_or_else(|| AppError::SectionNotFound(section_id.to_string()))?;
    let mut updated = sections.to_vec();
    let removed = updated.remove(index);
    Ok((updated, removed))
}

// ============================================================================
// 单元测试
// ============================================================================
