//! # 仪器协议能力模块
//!
//! - **解码**：按行把计数器文本帧解析为 [`domain::Record`]
//! - **传输**：串口 / TCP 透传 / 内存，统一为 [`Transport`] 接口
//!
//! ## 数据流
//!
//! ```text
//! PortConfig ──► TransportConnector ──► Transport
//!                                         │ data (按行)
//!                                         ▼
//!                                      decode() ──► Record
//! ```
//!
//! ## 端口配置
//!
//! ```json
//! { "type": "serial", "path": "/dev/ttyUSB0", "baud_rate": 115200 }
//! { "type": "tcp", "host": "192.168.1.50", "port": 4001 }
//! ```

mod decode;
mod error;
pub mod transport;
mod types;

pub use decode::{DEVICE_BANNER, decode, decode_frame};
pub use error::ProtocolError;
pub use transport::{
    MemoryConnector, MemoryTransport, PortConnector, SerialTransport, TcpTransport, Transport,
    TransportConnector, TransportEvents,
};
pub use types::{PortConfig, PortStatus, SerialParity, SerialPortConfig, TcpPortConfig};
