//! 告警条件判定
//!
//! 比较规则：字段值与阈值都能按前缀解析为数字时按数值比较（布尔值视为 1/0），
//! 两者都是非数字字符串时按字典序比较。数字与字符串混合时，字符串按整体转数字：
//! 空串或纯空白视为 0，其余无法比较，条件不触发。

use crate::plugin::OutputPlugin;
use crate::settings::{AlarmBoolOp, AlarmCondition, Comparator, OutputSettings};
use domain::Record;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Number(f64),
    Text(String),
}

/// 判定单个条件；条件未使用或字段缺失时为 false。
pub fn check_condition(
    condition: &AlarmCondition,
    plugin: &dyn OutputPlugin,
    record: &Record,
) -> bool {
    if condition.is_unused() {
        return false;
    }
    let Some(value) = plugin.resolve_mapping(&condition.field, record) else {
        return false;
    };
    let (Some(field), Some(level)) = (operand(&value), operand(&condition.level)) else {
        return false;
    };
    compare(condition.comparator, &field, &level)
}

/// 按 `alrmbool` 组合两个条件（不含频率限制）。
pub fn alarm_triggered(settings: &OutputSettings, plugin: &dyn OutputPlugin, record: &Record) -> bool {
    let first = check_condition(&settings.alarm1, plugin, record);
    let second = check_condition(&settings.alarm2, plugin, record);
    match settings.alarm_bool {
        AlarmBoolOp::And => first && second,
        AlarmBoolOp::Or => first || second,
        AlarmBoolOp::None => false,
    }
}

fn operand(value: &Value) -> Option<Operand> {
    match value {
        Value::Number(number) => number.as_f64().map(Operand::Number),
        Value::Bool(flag) => Some(Operand::Number(if *flag { 1.0 } else { 0.0 })),
        Value::String(text) => Some(match leading_number(text) {
            Some(number) => Operand::Number(number),
            None => Operand::Text(text.clone()),
        }),
        _ => None,
    }
}

fn compare(comparator: Comparator, field: &Operand, level: &Operand) -> bool {
    match (field, level) {
        (Operand::Number(field), Operand::Number(level)) => match comparator {
            Comparator::Less => field < level,
            Comparator::MoreEq => field >= level,
            Comparator::Eq => field == level,
            Comparator::Unknown => false,
        },
        (Operand::Text(field), Operand::Text(level)) => match comparator {
            Comparator::Less => field < level,
            Comparator::MoreEq => field >= level,
            Comparator::Eq => field == level,
            Comparator::Unknown => false,
        },
        (Operand::Number(field), Operand::Text(level)) => match blank_as_zero(level) {
            Some(level) => compare(comparator, &Operand::Number(*field), &Operand::Number(level)),
            None => false,
        },
        (Operand::Text(field), Operand::Number(level)) => match blank_as_zero(field) {
            Some(field) => compare(comparator, &Operand::Number(field), &Operand::Number(*level)),
            None => false,
        },
    }
}

// 无数字前缀的字符串整体转数字时，只有空白串得到有效值
fn blank_as_zero(text: &str) -> Option<f64> {
    text.trim().is_empty().then_some(0.0)
}

/// 取字符串最长的浮点数前缀（忽略前导空白），如 `"12.5cpm"` → 12.5。
pub fn leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    if text[end..].starts_with("Infinity") {
        let sign = if bytes.first() == Some(&b'-') { -1.0 } else { 1.0 };
        return Some(sign * f64::INFINITY);
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    text[..end].parse().ok()
}
