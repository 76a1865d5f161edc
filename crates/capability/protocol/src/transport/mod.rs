//! 传输层抽象
//!
//! 传输对象创建后处于空闲状态，调用方先挂接 `data`/`status` 监听，再调用
//! `open()` 开始 I/O，保证第一条状态事件不会丢失。

mod memory;
mod serial;
mod stream;
mod tcp;

pub use memory::{MemoryConnector, MemoryTransport};
pub use serial::SerialTransport;
pub use tcp::TcpTransport;

use crate::error::ProtocolError;
use crate::types::{PortConfig, PortStatus};
use domain::Subscribers;
use std::sync::Arc;

/// 传输事件：按行数据 + 端口状态变化。
#[derive(Default)]
pub struct TransportEvents {
    pub data: Subscribers<String>,
    pub status: Subscribers<PortStatus>,
}

impl TransportEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前挂接的监听数量（data + status）。
    pub fn listener_count(&self) -> usize {
        self.data.len() + self.status.len()
    }
}

/// 行式传输
pub trait Transport: Send + Sync {
    /// 开始 I/O；结果通过 status 事件报告。
    fn open(&self);

    /// 写入原始字节。
    fn write(&self, bytes: &[u8]) -> Result<(), ProtocolError>;

    /// 请求关闭；关闭完成后发出 `{port_open: false}`。
    fn close(&self);

    fn events(&self) -> &TransportEvents;

    fn listener_count(&self) -> usize {
        self.events().listener_count()
    }
}

/// 传输工厂：按端口配置构造空闲传输。
pub trait TransportConnector: Send + Sync {
    fn connect(&self, config: &PortConfig) -> Result<Arc<dyn Transport>, ProtocolError>;
}

/// 默认工厂：串口 / TCP。
#[derive(Debug, Default, Clone, Copy)]
pub struct PortConnector;

impl TransportConnector for PortConnector {
    fn connect(&self, config: &PortConfig) -> Result<Arc<dyn Transport>, ProtocolError> {
        let transport: Arc<dyn Transport> = match config {
            PortConfig::Serial(serial) => Arc::new(SerialTransport::new(serial.clone())),
            PortConfig::Tcp(tcp) => Arc::new(TcpTransport::new(tcp.clone())),
        };
        Ok(transport)
    }
}
