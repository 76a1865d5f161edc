//! 仪器文本协议解码
//!
//! 每行一帧，冒号分隔，首字段决定帧类型：
//!
//! ```text
//! CPM:<n>:<value>:<V|X>[:<value2>:<V|X>]    计数率
//! COUNTS:<n>:<c1>[:<c2>]:<uptime>          累计计数
//! HZ1:<i1>:..:<i2>:..:<ram>:..:<win1>:..:<win2>   诊断输出
//! USB Geiger ...                            版本横幅
//! ```
//!
//! 无法识别的帧静默丢弃；已识别但格式错误的帧记录日志后丢弃，不会中断数据流。

use crate::error::ProtocolError;
use domain::Record;
use relay_telemetry::{record_frame_decoded, record_frame_dropped, record_frame_unrecognized};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// 设备上电/查询时输出的横幅前缀
pub const DEVICE_BANNER: &str = "USB Geiger";

/// 解码一行原始数据；无法识别或格式错误时返回 None。
pub fn decode(line: &str) -> Option<Record> {
    if line.len() < 2 {
        return None;
    }
    match decode_frame(line) {
        Ok(Some(record)) => {
            record_frame_decoded();
            Some(record)
        }
        Ok(None) => {
            record_frame_unrecognized();
            debug!(target: "relay.protocol", line = %strip_line_ending(line), "frame_unrecognized");
            None
        }
        Err(err) => {
            record_frame_dropped();
            warn!(
                target: "relay.protocol",
                line = %strip_line_ending(line),
                error = %err,
                "frame_dropped"
            );
            None
        }
    }
}

/// 解码一帧，区分「无法识别」（`Ok(None)`）与「格式错误」（`Err`）。
pub fn decode_frame(line: &str) -> Result<Option<Record>, ProtocolError> {
    let data = strip_line_ending(line);
    let fields: Vec<&str> = data.split(':').collect();
    let record = match fields[0] {
        "CPM" => decode_cpm(&fields)?,
        _ if data.starts_with(DEVICE_BANNER) => Record::with_field("version", data),
        "COUNTS" => decode_counts(&fields)?,
        "HZ1" => decode_diagnostics(&fields),
        _ => return Ok(None),
    };
    Ok(Some(record))
}

fn decode_cpm(fields: &[&str]) -> Result<Record, ProtocolError> {
    let inputs = input_count(fields)?;
    let mut record = Record::new();
    record.insert("cpm", channel(fields.get(2), fields.get(3)));
    if inputs == 2 {
        record.insert("cpm2", channel(fields.get(4), fields.get(5)));
    }
    Ok(record)
}

fn decode_counts(fields: &[&str]) -> Result<Record, ProtocolError> {
    let inputs = input_count(fields)?;
    let mut counts = Map::new();
    insert_int(&mut counts, "input1", fields.get(2));
    if inputs == 2 {
        insert_int(&mut counts, "input2", fields.get(3));
        insert_int(&mut counts, "uptime", fields.get(4));
    } else {
        insert_int(&mut counts, "uptime", fields.get(3));
    }
    Ok(Record::with_field("counts", counts))
}

// 诊断帧的数值位于奇数位，偶数位是标签，原样保留文本。
fn decode_diagnostics(fields: &[&str]) -> Record {
    let mut hz = Map::new();
    insert_text(&mut hz, "I1", fields.get(1));
    insert_text(&mut hz, "I2", fields.get(3));
    let mut record = Record::with_field("HZ", hz);
    for (key, index) in [("RAM", 5), ("WIN1", 7), ("WIN2", 9)] {
        if let Some(value) = fields.get(index) {
            record.insert(key, *value);
        }
    }
    record
}

fn channel(value: Option<&&str>, flag: Option<&&str>) -> Map<String, Value> {
    let mut channel = Map::new();
    insert_int(&mut channel, "value", value);
    match flag.copied() {
        Some("V") => {
            channel.insert("valid".to_string(), Value::Bool(true));
        }
        Some("X") => {
            channel.insert("valid".to_string(), Value::Bool(false));
        }
        _ => {}
    }
    channel
}

// 输入数量只有解析为 2 时才切换到双输入布局，其余取值都按单输入处理。
fn input_count(fields: &[&str]) -> Result<i64, ProtocolError> {
    let raw = fields
        .get(1)
        .ok_or_else(|| ProtocolError::DataParse(format!("{}: missing input count", fields[0])))?;
    Ok(parse_int(raw).unwrap_or(1))
}

fn insert_int(map: &mut Map<String, Value>, key: &str, raw: Option<&&str>) {
    if let Some(value) = raw.and_then(|raw| parse_int(raw)) {
        map.insert(key.to_string(), Value::from(value));
    }
}

fn insert_text(map: &mut Map<String, Value>, key: &str, raw: Option<&&str>) {
    if let Some(raw) = raw {
        map.insert(key.to_string(), Value::String((*raw).to_string()));
    }
}

/// 宽松整数解析：忽略前导空白，取最长的 `[+-]?digits` 前缀。
fn parse_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    trimmed[..end].parse().ok()
}

fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}
