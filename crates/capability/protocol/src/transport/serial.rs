//! 串口传输

use super::stream::{LinkControl, pump_lines};
use super::{Transport, TransportEvents};
use crate::error::ProtocolError;
use crate::types::{PortStatus, SerialParity, SerialPortConfig};
use std::sync::Arc;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{error, info, warn};

/// 串口传输：`open()` 后在后台任务中打开设备并按行读取。
pub struct SerialTransport {
    config: SerialPortConfig,
    events: Arc<TransportEvents>,
    link: LinkControl,
}

impl SerialTransport {
    pub fn new(config: SerialPortConfig) -> Self {
        Self {
            config,
            events: Arc::new(TransportEvents::new()),
            link: LinkControl::default(),
        }
    }
}

impl Transport for SerialTransport {
    fn open(&self) {
        let Some(channels) = self.link.start() else {
            warn!(target: "relay.protocol", path = %self.config.path, "serial_port_already_open");
            return;
        };
        let config = self.config.clone();
        let events = Arc::clone(&self.events);
        tokio::spawn(async move {
            info!(
                target: "relay.protocol",
                path = %config.path,
                baud_rate = config.baud_rate,
                "serial_port_opening"
            );
            match open_serial(&config) {
                Ok(stream) => pump_lines(stream, &events, channels, &config.path).await,
                Err(err) => {
                    error!(target: "relay.protocol", path = %config.path, error = %err, "serial_port_open_failed");
                    events.status.emit(&PortStatus::failed(err.to_string()));
                }
            }
        });
    }

    fn write(&self, bytes: &[u8]) -> Result<(), ProtocolError> {
        self.link.write(bytes)
    }

    fn close(&self) {
        if !self.link.close() {
            warn!(target: "relay.protocol", path = %self.config.path, "serial_port_not_open");
        }
    }

    fn events(&self) -> &TransportEvents {
        &self.events
    }
}

fn open_serial(config: &SerialPortConfig) -> Result<SerialStream, ProtocolError> {
    let data_bits = match config.data_bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        8 => DataBits::Eight,
        other => {
            return Err(ProtocolError::ConfigParse(format!(
                "unsupported data bits: {}",
                other
            )));
        }
    };
    let stop_bits = match config.stop_bits {
        1 => StopBits::One,
        2 => StopBits::Two,
        other => {
            return Err(ProtocolError::ConfigParse(format!(
                "unsupported stop bits: {}",
                other
            )));
        }
    };
    let parity = match config.parity {
        SerialParity::None => Parity::None,
        SerialParity::Odd => Parity::Odd,
        SerialParity::Even => Parity::Even,
    };
    let flow_control = if config.flow_control {
        FlowControl::Hardware
    } else {
        FlowControl::None
    };

    let stream = tokio_serial::new(config.path.as_str(), config.baud_rate)
        .data_bits(data_bits)
        .parity(parity)
        .stop_bits(stop_bits)
        .flow_control(flow_control)
        .open_native_async()?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_unsupported_framing() {
        let mut config = SerialPortConfig::new("/dev/null");
        config.data_bits = 9;
        assert!(matches!(open_serial(&config), Err(ProtocolError::ConfigParse(_))));

        let mut config = SerialPortConfig::new("/dev/null");
        config.stop_bits = 3;
        assert!(matches!(open_serial(&config), Err(ProtocolError::ConfigParse(_))));
    }

    #[test]
    fn test_write_before_open_fails() {
        let transport = SerialTransport::new(SerialPortConfig::new("/dev/ttyUSB9"));
        assert!(matches!(transport.write(b"x"), Err(ProtocolError::NotOpen)));
    }
}
