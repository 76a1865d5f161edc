//! 串口与 TCP 共用的按行读写循环

use super::TransportEvents;
use crate::error::ProtocolError;
use crate::types::PortStatus;
use relay_telemetry::record_line_received;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// 读写循环的输入通道
pub(crate) struct LinkChannels {
    writes: mpsc::UnboundedReceiver<Vec<u8>>,
    shutdown: oneshot::Receiver<()>,
}

struct LinkHandle {
    writes: mpsc::UnboundedSender<Vec<u8>>,
    shutdown: Option<oneshot::Sender<()>>,
}

/// 传输对象持有的控制端：写队列 + 关闭信号。
#[derive(Default)]
pub(crate) struct LinkControl {
    handle: Mutex<Option<LinkHandle>>,
}

impl LinkControl {
    /// 创建通道；已启动过则返回 None。
    pub(crate) fn start(&self) -> Option<LinkChannels> {
        let mut guard = self.lock();
        if guard.is_some() {
            return None;
        }
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *guard = Some(LinkHandle {
            writes: write_tx,
            shutdown: Some(shutdown_tx),
        });
        Some(LinkChannels {
            writes: write_rx,
            shutdown: shutdown_rx,
        })
    }

    pub(crate) fn write(&self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let guard = self.lock();
        let handle = guard.as_ref().ok_or(ProtocolError::NotOpen)?;
        handle
            .writes
            .send(bytes.to_vec())
            .map_err(|_| ProtocolError::ChannelClosed)
    }

    /// 发出关闭信号；没有活动链路时返回 false。
    pub(crate) fn close(&self) -> bool {
        let Some(mut handle) = self.lock().take() else {
            return false;
        };
        if let Some(shutdown) = handle.shutdown.take() {
            let _ = shutdown.send(());
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, Option<LinkHandle>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 运行读写循环直到关闭或出错，期间所有事件通过 `events` 发出。
pub(crate) async fn pump_lines<S>(
    stream: S,
    events: &TransportEvents,
    channels: LinkChannels,
    label: &str,
) where
    S: AsyncRead + AsyncWrite,
{
    let LinkChannels {
        mut writes,
        mut shutdown,
    } = channels;
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    events.status.emit(&PortStatus::opened());

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!(target: "relay.protocol", port = %label, "port_close_requested");
                events.status.emit(&PortStatus::closed());
                return;
            }
            Some(bytes) = writes.recv() => {
                let written = async {
                    writer.write_all(&bytes).await?;
                    writer.flush().await
                }
                .await;
                if let Err(err) = written {
                    warn!(target: "relay.protocol", port = %label, error = %err, "port_write_failed");
                    events.status.emit(&PortStatus::failed(err.to_string()));
                    return;
                }
            }
            read = reader.read_until(b'\n', &mut buf) => {
                match read {
                    Ok(0) => {
                        warn!(target: "relay.protocol", port = %label, "port_closed_by_peer");
                        events.status.emit(&PortStatus::failed("connection closed"));
                        return;
                    }
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf).into_owned();
                        buf.clear();
                        record_line_received();
                        events.data.emit(&line);
                    }
                    Err(err) => {
                        warn!(target: "relay.protocol", port = %label, error = %err, "port_read_failed");
                        events.status.emit(&PortStatus::failed(err.to_string()));
                        return;
                    }
                }
            }
        }
    }
}
