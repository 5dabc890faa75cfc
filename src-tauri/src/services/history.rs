// ============================================================================
// 撤销/重做历史
// 线性历史：保存完整的 (分区, 注册表) 快照，超出容量时淘汰最旧的快照
// ============================================================================

use std::collections::VecDeque;

use crate::models::layout::Snapshot;
use crate::utils::error::{AppError, AppResult};

/// 有界线性历史栈
///
/// 不变量：`entries[index]` 始终等于当前显示的状态。
#[derive(Debug, Clone)]
pub struct HistoryStack {
    entries: VecDeque<Snapshot>,
    index: usize,
    capacity: usize,
}

impl HistoryStack {
    /// 以初始状态创建历史，容量至少为 1
    pub fn new(capacity: usize, initial: Snapshot) -> AppResult<Self> {
        if capacity == 0 {
            return Err(AppError::ValidationError("历史容量必须大于 0".to_string()));
        }
        let mut entries = VecDeque::with_capacity(capacity);
        entries.push_back(initial);
        Ok(HistoryStack {
            entries,
            index: 0,
            capacity,
        })
    }

    /// 提交新状态：丢弃游标之后的重做分支，追加快照并前移游标
    ///
    /// 超出容量时淘汰最旧的快照，游标停在末尾而不是继续增长。
    pub fn commit(&mut self, snapshot: Snapshot) {
        self.entries.truncate(self.index + 1);
        self.entries.push_back(snapshot);
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.index = self.entries.len() - 1;
        log::debug!(
            "历史提交：游标 {}，共 {} 条",
            self.index,
            self.entries.len()
        );
    }

    /// 撤销：游标后退一步并返回对应快照；已在最早状态时返回 None
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index)
    }

    /// 重做：游标前进一步并返回对应快照；已在最新状态时返回 None
    pub fn redo(&mut self) -> Option<&Snapshot> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.entries.get(self.index)
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// 当前状态
    pub fn current(&self) -> &Snapshot {
        &self.entries[self.index]
    }

    /// 清空历史并以新状态重新开始（如导入表单后）
    pub fn reset(&mut self, snapshot: Snapshot) {
        self.entries.clear();
        self.entries.push_back(snapshot);
        self.index = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ============================================================================
// 单元测试
// ============================================================================
