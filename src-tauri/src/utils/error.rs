// ============================================================================
// 统一错误类型定义
// 使用 thiserror 派生宏，所有 services 层函数统一返回 AppResult
// ============================================================================

use thiserror::Error;

/// 应用统一错误枚举
///
/// 覆盖布局树变更、注册表同步、导入导出与设置存储的所有错误类型。
/// 通过 `impl From<AppError> for String` 保持与 Tauri command 的兼容性
/// （Tauri command 要求返回 `Result<T, String>`）。
#[derive(Debug, Error)]
pub enum AppError {
    /// 地址无法解析（格式错误、索引越界、分区不存在）
    #[error("地址解析失败：{0}")]
    AddressError(String),

    /// 非组件面板的拖拽源缺少 path
    #[error("拖拽源缺少路径：{0}")]
    MissingItemPath(String),

    /// 将容器拖入其自身的子孙节点
    #[error("不能将元素拖入其自身内部：{0}")]
    CycleRejected(String),

    /// 目标位置不接受该类型的元素（如将行放入列）
    #[error("不允许的放置位置：{0}")]
    InvalidPlacement(String),

    /// 注册表中不存在指定组件
    #[error("组件不存在：{0}")]
    ComponentNotFound(String),

    /// 分区不存在
    #[error("分区不存在：{0}")]
    SectionNotFound(String),

    /// 参数验证失败（如历史容量为 0）
    #[error("验证失败：{0}")]
    ValidationError(String),

    /// 导入的表单结构存在错误
    #[error("导入失败：{0}")]
    ImportError(String),

    /// 设置存储操作错误
    #[error("{0}")]
    DatabaseError(String),

    /// JSON 序列化/反序列化错误
    #[error("JSON 解析失败：{0}")]
    JsonError(#[from] serde_json::Error),

    /// 文件系统 IO 错误
    #[error("IO 错误：{0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    /// 是否属于“拒绝类”错误：需要前端以提示框告知用户，而非静默跳过
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AppError::CycleRejected(_) | AppError::InvalidPlacement(_)
        )
    }
}

/// 便捷类型别名，统一项目内的 Result 签名
pub type AppResult<T> = Result<T, AppError>;

/// 将 AppError 转换为 String，保持与 Tauri command 返回类型的兼容性
impl From<AppError> for String {
    fn from(err: AppError) -> Self {
        err.to_string()
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::DatabaseError(format!("设置存储操作失败：{}", err))
    }
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_converts_to_string() {
        let msg: String = AppError::AddressError("0-9".to_string()).into();
        assert_eq!(msg, "地址解析失败：0-9");
    }

    #[test]
    fn test_rejection_classification() {
        assert!(AppError::CycleRejected("a".to_string()).is_rejection());
        assert!(AppError::InvalidPlacement("b".to_string()).is_rejection());
        assert!(!AppError::AddressError("c".to_string()).is_rejection());
        assert!(!AppError::MissingItemPath("d".to_string()).is_rejection());
    }

    #[test]
    fn test_json_error_from_conversion() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let app_err: AppError = err.into();
        assert!(app_err.to_string().starts_with("JSON 解析失败"));
    }
}
