//! 传输配置与端口状态

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};

/// 端口状态变化
///
/// `port_open == false` 且带 `error` 表示传输自行失败（非主动关闭）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortStatus {
    pub port_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PortStatus {
    pub fn opened() -> Self {
        Self {
            port_open: true,
            error: None,
        }
    }

    pub fn closed() -> Self {
        Self {
            port_open: false,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            port_open: false,
            error: Some(error.into()),
        }
    }
}

/// 仪器端口配置（instrument.port_config）
///
/// ```json
/// { "type": "serial", "path": "/dev/ttyUSB0" }
/// { "type": "tcp", "host": "192.168.1.50", "port": 4001 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PortConfig {
    Serial(SerialPortConfig),
    Tcp(TcpPortConfig),
}

impl PortConfig {
    /// 从 JSON 配置字符串解析
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(json).map_err(|e| ProtocolError::ConfigParse(e.to_string()))
    }

    /// 从已解析的 JSON 文档转换（存储层的 port_config）
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ProtocolError> {
        Self::deserialize(value).map_err(|e| ProtocolError::ConfigParse(e.to_string()))
    }

    /// 用于日志的端口描述
    pub fn describe(&self) -> String {
        match self {
            Self::Serial(config) => format!("serial:{}@{}", config.path, config.baud_rate),
            Self::Tcp(config) => format!("tcp:{}:{}", config.host, config.port),
        }
    }
}

/// 串口配置（默认 115200 8N1，无流控）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialPortConfig {
    /// 设备路径，如 /dev/ttyUSB0 或 COM3
    pub path: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default)]
    pub parity: SerialParity,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub flow_control: bool,
}

impl SerialPortConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: SerialParity::default(),
            stop_bits: default_stop_bits(),
            flow_control: false,
        }
    }
}

/// 串口校验位
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerialParity {
    #[default]
    None,
    Odd,
    Even,
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

/// TCP 透传配置（串口服务器 / ser2net）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpPortConfig {
    /// 服务器主机地址
    pub host: String,
    /// 服务器端口
    pub port: u16,
    /// 连接超时（毫秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}
