//! # PostgreSQL 存储实现
//!
//! 依赖以下表：
//!
//! - `instruments`：仪器表（instrument_id, name, instrument_type, port_config）
//! - `outputs`：输出配置表（output_id, instrument_id, enabled, output_type, config, created_at）
//!
//! `port_config` 与 `config` 为 JSON 文本列，读取时用 serde_json 解析。
//! 单行 JSON 损坏不会让整个列表失败：原文以字符串形式交给上层，由配置解析
//! 在该仪器/输出上报错。
//! 表结构由部署方维护，本模块只做参数化查询。

pub mod instrument;
pub mod output;

pub use instrument::*;
pub use output::*;

use serde_json::Value;
use tracing::warn;

/// 解析 JSON 文本列；空值为 `Null`，无法解析时保留原文字符串。
pub(crate) fn parse_json_column(column: &str, row_id: &str, text: Option<String>) -> Value {
    let Some(text) = text else {
        return Value::Null;
    };
    if text.trim().is_empty() {
        return Value::Null;
    }
    match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(err) => {
            warn!(
                target: "relay.storage",
                column = %column,
                row_id = %row_id,
                error = %err,
                "json_column_invalid"
            );
            Value::String(text)
        }
    }
}
