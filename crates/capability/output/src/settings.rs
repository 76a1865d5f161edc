//! 输出调度配置（来自 OutputRecord.config）
//!
//! ```json
//! {
//!   "alarm1": { "field": "cpm.value", "comparator": "moreeq", "level": 100 },
//!   "alarm2": { "field": "_unused" },
//!   "alrmbool": "or",
//!   "alrmfrequency": 60,
//!   "frequency": 0
//! }
//! ```
//!
//! 间隔单位为秒，接受数字或数字字符串；缺省或 0 表示关闭对应的触发方式。

use crate::error::OutputError;
use serde::Deserialize;
use serde_json::Value;

/// 告警比较方式；无法识别的取值永不触发。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Less,
    MoreEq,
    Eq,
    #[default]
    #[serde(other)]
    Unknown,
}

/// 两个告警条件的组合方式；其他取值永不触发。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmBoolOp {
    And,
    Or,
    #[default]
    #[serde(other)]
    None,
}

/// 单个告警条件
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AlarmCondition {
    /// 记录字段路径，如 `cpm.value`；空串或 `_unused` 表示不使用
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub comparator: Comparator,
    #[serde(default)]
    pub level: Value,
}

impl AlarmCondition {
    pub fn new(field: impl Into<String>, comparator: Comparator, level: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            comparator,
            level: level.into(),
        }
    }

    pub fn is_unused(&self) -> bool {
        self.field.is_empty() || self.field == "_unused"
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSettings {
    pub alarm1: AlarmCondition,
    pub alarm2: AlarmCondition,
    pub alarm_bool: AlarmBoolOp,
    /// 告警重复触发的最小间隔；0 关闭告警发送
    pub alarm_interval_ms: u64,
    /// 定时发送间隔；0 关闭定时发送
    pub regular_interval_ms: u64,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    alarm1: Option<AlarmCondition>,
    alarm2: Option<AlarmCondition>,
    alrmbool: Option<AlarmBoolOp>,
    alrmfrequency: Value,
    frequency: Value,
}

impl OutputSettings {
    pub fn from_config(config: &Value) -> Result<Self, OutputError> {
        let raw = match config {
            Value::Null => RawSettings::default(),
            Value::Object(_) => RawSettings::deserialize(config)
                .map_err(|err| OutputError::Config(err.to_string()))?,
            other => {
                return Err(OutputError::Config(format!(
                    "output config must be an object, got {}",
                    other
                )));
            }
        };
        Ok(Self {
            alarm1: raw.alarm1.unwrap_or_default(),
            alarm2: raw.alarm2.unwrap_or_default(),
            alarm_bool: raw.alrmbool.unwrap_or_default(),
            alarm_interval_ms: interval_ms("alrmfrequency", &raw.alrmfrequency)?,
            regular_interval_ms: interval_ms("frequency", &raw.frequency)?,
        })
    }
}

fn interval_ms(key: &str, value: &Value) -> Result<u64, OutputError> {
    let seconds = match value {
        Value::Null => return Ok(0),
        Value::Number(number) => number.as_f64(),
        Value::String(text) if text.trim().is_empty() => return Ok(0),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match seconds {
        Some(seconds) if seconds.is_finite() && seconds >= 0.0 => {
            Ok((seconds * 1000.0).round() as u64)
        }
        _ => Err(OutputError::Config(format!("invalid {}: {}", key, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_settings() {
        let settings = OutputSettings::from_config(&json!({
            "alarm1": { "field": "cpm.value", "comparator": "moreeq", "level": 100 },
            "alarm2": { "field": "_unused", "comparator": "less", "level": "" },
            "alrmbool": "or",
            "alrmfrequency": 60,
            "frequency": "2.5",
            "topic": "ignored/by/settings"
        }))
        .unwrap();
        assert_eq!(settings.alarm1.comparator, Comparator::MoreEq);
        assert_eq!(settings.alarm1.level, json!(100));
        assert!(settings.alarm2.is_unused());
        assert_eq!(settings.alarm_bool, AlarmBoolOp::Or);
        assert_eq!(settings.alarm_interval_ms, 60_000);
        assert_eq!(settings.regular_interval_ms, 2_500);
    }

    #[test]
    fn test_missing_fields_disable_everything() {
        let settings = OutputSettings::from_config(&json!({})).unwrap();
        assert!(settings.alarm1.is_unused());
        assert_eq!(settings.alarm_bool, AlarmBoolOp::None);
        assert_eq!(settings.alarm_interval_ms, 0);
        assert_eq!(settings.regular_interval_ms, 0);
        assert_eq!(OutputSettings::from_config(&Value::Null).unwrap(), settings);
    }

    #[test]
    fn test_unknown_operators_parse() {
        let settings = OutputSettings::from_config(&json!({
            "alarm1": { "field": "cpm.value", "comparator": "between", "level": 1 },
            "alrmbool": "xor"
        }))
        .unwrap();
        assert_eq!(settings.alarm1.comparator, Comparator::Unknown);
        assert_eq!(settings.alarm_bool, AlarmBoolOp::None);
    }

    #[test]
    fn test_invalid_interval_is_rejected() {
        for bad in [json!({ "frequency": "often" }), json!({ "alrmfrequency": -1 }), json!([1])] {
            assert!(matches!(
                OutputSettings::from_config(&bad),
                Err(OutputError::Config(_))
            ));
        }
    }

    #[test]
    fn test_config_kept_as_raw_text_is_rejected() {
        let result = OutputSettings::from_config(&json!("{topic: lab"));
        assert!(matches!(result, Err(OutputError::Config(message)) if message.contains("must be an object")));
    }
}
