//! TCP 透传传输
//!
//! 连接串口服务器（ser2net 等），按行收发与串口一致。

use super::stream::{LinkControl, pump_lines};
use super::{Transport, TransportEvents};
use crate::error::ProtocolError;
use crate::types::{PortStatus, TcpPortConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{error, info, warn};

pub struct TcpTransport {
    config: TcpPortConfig,
    events: Arc<TransportEvents>,
    link: LinkControl,
}

impl TcpTransport {
    pub fn new(config: TcpPortConfig) -> Self {
        Self {
            config,
            events: Arc::new(TransportEvents::new()),
            link: LinkControl::default(),
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }
}

impl Transport for TcpTransport {
    fn open(&self) {
        let addr = self.addr();
        let Some(channels) = self.link.start() else {
            warn!(target: "relay.protocol", addr = %addr, "tcp_port_already_open");
            return;
        };
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let events = Arc::clone(&self.events);
        tokio::spawn(async move {
            info!(target: "relay.protocol", addr = %addr, "tcp_port_connecting");
            match connect(&addr, connect_timeout).await {
                Ok(stream) => {
                    info!(target: "relay.protocol", addr = %addr, "tcp_port_connected");
                    pump_lines(stream, &events, channels, &addr).await;
                }
                Err(err) => {
                    error!(target: "relay.protocol", addr = %addr, error = %err, "tcp_port_connect_failed");
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
            warn!(target: "relay.protocol", addr = %self.addr(), "tcp_port_not_open");
        }
    }

    fn events(&self) -> &TransportEvents {
        &self.events
    }
}

async fn connect(addr: &str, connect_timeout: Duration) -> Result<TcpStream, ProtocolError> {
    match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(err)) => Err(ProtocolError::Connection(err.to_string())),
        Err(_) => Err(ProtocolError::Connection(format!(
            "connect to {} timed out",
            addr
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_tcp_lines_and_writes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let transport = TcpTransport::new(TcpPortConfig {
            host: "127.0.0.1".to_string(),
            port,
            connect_timeout_ms: 1000,
        });

        let (line_tx, mut line_rx) = mpsc::unbounded_channel();
        transport.events().data.subscribe(move |line: &String| {
            let _ = line_tx.send(line.clone());
        });
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let (status_tx, mut status_rx) = mpsc::unbounded_channel();
        let sink = Arc::clone(&statuses);
        transport.events().status.subscribe(move |status: &PortStatus| {
            sink.lock().unwrap().push(status.clone());
            let _ = status_tx.send(());
        });

        transport.open();
        let (mut peer, _) = listener.accept().await.unwrap();
        status_rx.recv().await.unwrap();
        assert_eq!(statuses.lock().unwrap()[0], PortStatus::opened());

        peer.write_all(b"CPM:1:42:V\r\n").await.unwrap();
        assert_eq!(line_rx.recv().await.unwrap(), "CPM:1:42:V\r\n");

        transport.write(b"<getcpm>").unwrap();
        let mut reader = BufReader::new(&mut peer);
        let mut received = Vec::new();
        reader.read_until(b'>', &mut received).await.unwrap();
        assert_eq!(received, b"<getcpm>");

        transport.close();
        status_rx.recv().await.unwrap();
        assert_eq!(statuses.lock().unwrap()[1], PortStatus::closed());
    }

    #[tokio::test]
    async fn test_connect_refused_reports_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = TcpTransport::new(TcpPortConfig {
            host: "127.0.0.1".to_string(),
            port,
            connect_timeout_ms: 1000,
        });
        let (status_tx, mut status_rx) = mpsc::unbounded_channel();
        transport.events().status.subscribe(move |status: &PortStatus| {
            let _ = status_tx.send(status.clone());
        });

        transport.open();
        let status = status_rx.recv().await.unwrap();
        assert!(!status.port_open);
        assert!(status.error.is_some());
    }
}
