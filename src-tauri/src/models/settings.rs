// ============================================================================
// 表单设计器设置
// 以键值形式保存在 SQLite settings 表中（见 database.rs）
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, AppResult};

/// 默认历史容量
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;
/// 默认“一行列数过多”提示阈值
pub const DEFAULT_COLUMN_WARNING_THRESHOLD: usize = 3;
/// 当前导出格式版本
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0.0";

/// settings 表中的键名
pub const KEY_HISTORY_CAPACITY: &str = "history_capacity";
pub const KEY_COLUMN_WARNING_THRESHOLD: &str = "column_warning_threshold";
pub const KEY_SCHEMA_VERSION: &str = "schema_version";

/// 表单设计器设置
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BuilderSettings {
    /// 撤销/重做历史保留的最大快照数
    pub history_capacity: usize,
    /// 行内已有列数达到该值时，再拖入列会给出提示
    pub column_warning_threshold: usize,
    /// 导出时写入 metadata.version 的版本号
    pub schema_version: String,
}

impl Default for BuilderSettings {
    fn default() -> Self {
        BuilderSettings {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            column_warning_threshold: DEFAULT_COLUMN_WARNING_THRESHOLD,
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
        }
    }
}

impl BuilderSettings {
    /// 校验设置取值
    pub fn validate(&self) -> AppResult<()> {
        if self.history_capacity == 0 {
            return Err(AppError::ValidationError(
                "历史容量必须大于 0".to_string(),
            ));
        }
        if self.column_warning_threshold == 0 {
            return Err(AppError::ValidationError(
                "列数提示阈值必须大于 0".to_string(),
            ));
        }
        if self.schema_version.trim().is_empty() {
            return Err(AppError::ValidationError("版本号不能为空".to_string()));
        }
        Ok(())
    }

    /// 按键名应用单个设置项（字符串值），未知键名返回验证错误
    pub fn apply(&mut self, key: &str, value: &str) -> AppResult<()> {
        match key {
            KEY_HISTORY_CAPACITY => {
                self.history_capacity = parse_positive(key, value)?;
            }
            KEY_COLUMN_WARNING_THRESHOLD => {
                self.column_warning_threshold = parse_positive(key, value)?;
            }
            KEY_SCHEMA_VERSION => {
                if value.trim().is_empty() {
                    return Err(AppError::ValidationError("版本号不能为空".to_string()));
                }
                self.schema_version = value.trim().to_string();
            }
            _ => {
                return Err(AppError::ValidationError(format!("未知的设置项：{}", key)));
            }
        }
        Ok(())
    }
}

fn parse_positive(key: &str, value: &str) -> AppResult<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(AppError::ValidationError(format!(
            "设置项 {} 需要正整数，实际为 \"{}\"",
            key, value
        ))),
    }
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = BuilderSettings::default();
        assert_eq!(settings.history_capacity, 50);
        assert_eq!(settings.column_warning_threshold, 3);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: BuilderSettings =
            serde_json::from_str(r#"{ "historyCapacity": 10 }"#).unwrap();
        assert_eq!(settings.history_capacity, 10);
        assert_eq!(settings.column_warning_threshold, 3);
        assert_eq!(settings.schema_version, "1.0.0");
    }

    #[test]
    fn test_apply_known_keys() {
        let mut settings = BuilderSettings::default();
        settings.apply(KEY_HISTORY_CAPACITY, "20").unwrap();
        settings.apply(KEY_COLUMN_WARNING_THRESHOLD, " 4 ").unwrap();
        settings.apply(KEY_SCHEMA_VERSION, "2.0.0").unwrap();
        assert_eq!(settings.history_capacity, 20);
        assert_eq!(settings.column_warning_threshold, 4);
        assert_eq!(settings.schema_version, "2.0.0");
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut settings = BuilderSettings::default();
        assert!(settings.apply(KEY_HISTORY_CAPACITY, "0").is_err());
        assert!(settings.apply(KEY_HISTORY_CAPACITY, "abc").is_err());
        assert!(settings.apply("theme", "dark").is_err());
        assert_eq!(settings, BuilderSettings::default());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let settings = BuilderSettings {
            history_capacity: 0,
            ..Default::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("历史容量必须大于 0"));
    }
}
