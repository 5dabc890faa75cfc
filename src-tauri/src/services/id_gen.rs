// ============================================================================
// 组件 id 生成策略
// ============================================================================
//
// 使用策略模式：运行时使用时间戳 + 计数器，测试与脚本使用顺序 id。
// 通过 get_id_generator 工厂函数按名称获取。

use time::OffsetDateTime;

use crate::utils::error::{AppError, AppResult};

/// 生成不冲突 id 的最大重试次数
pub const MAX_ID_ATTEMPTS: usize = 16;

/// id 生成策略 trait
pub trait IdGenerator: Send {
    /// 以 `prefix`（通常为组件类型、"row"、"column"）为前缀生成新 id
    fn next_id(&mut self, prefix: &str) -> String;
}

/// 时间戳 id：`<prefix>_<毫秒 base36>_<计数器 base36>`
#[derive(Debug, Default)]
pub struct TimestampIdGenerator {
    counter: u64,
}

impl TimestampIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for TimestampIdGenerator {
    fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        format!(
            "{}_{}_{}",
            prefix,
            to_base36(millis.max(0) as u128),
            to_base36(self.counter as u128)
        )
    }
}

/// 顺序 id：`<prefix>_<n>`，结果可预测
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: u64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next += 1;
        format!("{}_{}", prefix, self.next)
    }
}

fn to_base36(mut value: u128) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

/// 反复生成 id，直到 `taken` 判定未被占用
pub fn next_unique_id(
    ids: &mut dyn IdGenerator,
    prefix: &str,
    taken: impl Fn(&str) -> bool,
) -> AppResult<String> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let id = ids.next_id(prefix);
        if !taken(&id) {
            return Ok(id);
        }
        log::debug!("id {} 已被占用，重新生成", id);
    }
    Err(AppError::ValidationError(format!(
        "无法为 {} 生成唯一 id",
        prefix
    )))
}

/// 根据名称获取 id 生成策略
pub fn get_id_generator(kind: &str) -> AppResult<Box<dyn IdGenerator>> {
    match kind {
        "timestamp" => Ok(Box::new(TimestampIdGenerator::new())),
        "sequential" => Ok(Box::new(SequentialIdGenerator::new())),
        _ => Err(AppError::ValidationError(format!("未知的 id 生成策略：{}", kind))),
    }
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_ids() {
        let mut gen = SequentialIdGenerator::new();
        assert_eq!(gen.next_id("input"), "input_1");
        assert_eq!(gen.next_id("row"), "row_2");
    }

    #[test]
    fn test_timestamp_ids_are_unique() {
        let mut gen = TimestampIdGenerator::new();
        let ids: HashSet<String> = (0..500).map(|_| gen.next_id("select")).collect();
        assert_eq!(ids.len(), 500);
        assert!(ids.iter().all(|id| id.starts_with("select_")));
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_next_unique_id_skips_taken_ids() {
        let mut gen = SequentialIdGenerator::new();
        let taken = ["row_1", "row_2"];
        let id = next_unique_id(&mut gen, "row", |id| taken.contains(&id)).unwrap();
        assert_eq!(id, "row_3");

        let result = next_unique_id(&mut gen, "row", |_| true);
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn test_get_id_generator() {
        assert!(get_id_generator("timestamp").is_ok());
        let mut gen = get_id_generator("sequential").unwrap();
        assert_eq!(gen.next_id("x"), "x_1");
        assert!(get_id_generator("uuid").is_err());
    }
}
