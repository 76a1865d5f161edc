//! 内存传输，用于会话与分发链路的测试和演示。
//!
//! 与真实传输不同，状态事件在 `open()`/`close()` 调用内同步发出。

use super::{Transport, TransportConnector, TransportEvents};
use crate::error::ProtocolError;
use crate::types::{PortConfig, PortStatus};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct MemoryState {
    open: bool,
    writes: Vec<Vec<u8>>,
}

#[derive(Default)]
pub struct MemoryTransport {
    events: TransportEvents,
    state: Mutex<MemoryState>,
    open_error: Option<String>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 打开时立即失败的传输
    pub fn failing(error: impl Into<String>) -> Self {
        Self {
            open_error: Some(error.into()),
            ..Self::default()
        }
    }

    /// 模拟设备输出一行；端口未打开时丢弃，返回收到该行的监听数量。
    pub fn inject_line(&self, line: &str) -> usize {
        if !self.is_open() {
            return 0;
        }
        self.events.data.emit(&line.to_string())
    }

    /// 模拟传输自行断开（拔线等）。
    pub fn fail(&self, error: impl Into<String>) {
        self.lock().open = false;
        self.events.status.emit(&PortStatus::failed(error));
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// 已写入的原始字节
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// 已写入的内容（按 UTF-8 解码）
    pub fn written_text(&self) -> Vec<String> {
        self.lock()
            .writes
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MemoryTransport {
    fn open(&self) {
        if let Some(error) = &self.open_error {
            self.events.status.emit(&PortStatus::failed(error.clone()));
            return;
        }
        self.lock().open = true;
        self.events.status.emit(&PortStatus::opened());
    }

    fn write(&self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let mut state = self.lock();
        if !state.open {
            return Err(ProtocolError::NotOpen);
        }
        state.writes.push(bytes.to_vec());
        Ok(())
    }

    fn close(&self) {
        let was_open = std::mem::replace(&mut self.lock().open, false);
        if was_open {
            self.events.status.emit(&PortStatus::closed());
        }
    }

    fn events(&self) -> &TransportEvents {
        &self.events
    }
}

/// 内存传输工厂，保留每次创建的传输供测试驱动。
#[derive(Default)]
pub struct MemoryConnector {
    created: Mutex<Vec<Arc<MemoryTransport>>>,
    open_error: Mutex<Option<String>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后创建的传输在打开时失败
    pub fn fail_opens_with(&self, error: impl Into<String>) {
        *self.open_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error.into());
    }

    /// 最近创建的传输
    pub fn last(&self) -> Option<Arc<MemoryTransport>> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn created_count(&self) -> usize {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl TransportConnector for MemoryConnector {
    fn connect(&self, _config: &PortConfig) -> Result<Arc<dyn Transport>, ProtocolError> {
        let open_error = self
            .open_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let transport = Arc::new(match open_error {
            Some(error) => MemoryTransport::failing(error),
            None => MemoryTransport::new(),
        });
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&transport));
        Ok(transport)
    }
}
