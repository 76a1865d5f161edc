//! 存储数据模型

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 仪器记录
///
/// `port_config` 为端口配置 JSON，如 `{"type": "serial", "path": "/dev/ttyUSB0"}`，
/// 由协议层解析。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    pub instrument_id: String,
    pub name: String,
    #[serde(default = "default_instrument_type")]
    pub instrument_type: String,
    pub port_config: Value,
}

fn default_instrument_type() -> String {
    "usb_geiger".to_string()
}

/// 输出配置记录
///
/// `config` 包含告警条件、发送间隔、字段映射以及输出类型自己的参数：
///
/// ```json
/// {
///   "alarm1": { "field": "cpm.value", "comparator": "moreeq", "level": 100 },
///   "alarm2": { "field": "_unused" },
///   "alrmbool": "or",
///   "alrmfrequency": 60,
///   "frequency": 0,
///   "topic": "lab/geiger"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub output_id: String,
    pub instrument_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub output_type: String,
    #[serde(default)]
    pub config: Value,
}

fn default_enabled() -> bool {
    true
}
