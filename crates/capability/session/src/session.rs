//! 端口会话
//!
//! 状态迁移：
//!
//! ```text
//! Closed ──open()──► Opening ──{port_open:true}──► Open
//!    ▲                  │                            │
//!    │             {port_open:false}            close()
//!    │                  ▼                            ▼
//!    └──────────────── Closed ◄──{port_open:false}── Closing
//! ```
//!
//! 会话未打开且没有待完成的关闭时，传输上不挂接任何监听。

use crate::error::SessionError;
use domain::{Record, RecordHandler, RecordSource, Subscribers, SubscriptionId};
use relay_protocol::{PortConfig, PortStatus, Transport, TransportConnector, decode};
use relay_storage::InstrumentStore;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

/// 设备不支持标签查询时的本地应答
pub const TAG_COMMAND: &str = "TAG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortState {
    Closed,
    Opening,
    Open,
    Closing,
}

impl PortState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Closing => "closing",
        }
    }
}

struct SessionLink {
    state: PortState,
    close_requested: bool,
    // 每次 open() 递增，用于识别旧传输迟到的事件
    generation: u64,
    transport: Option<Arc<dyn Transport>>,
    data_sub: Option<SubscriptionId>,
    status_sub: Option<SubscriptionId>,
}

/// 单台仪器的端口会话
pub struct PortSession {
    instrument_id: String,
    instruments: Arc<dyn InstrumentStore>,
    connector: Arc<dyn TransportConnector>,
    records: Subscribers<Record>,
    status: Subscribers<PortStatus>,
    link: Mutex<SessionLink>,
    me: Weak<PortSession>,
}

impl PortSession {
    pub fn new(
        instrument_id: impl Into<String>,
        instruments: Arc<dyn InstrumentStore>,
        connector: Arc<dyn TransportConnector>,
    ) -> Arc<Self> {
        let instrument_id = instrument_id.into();
        Arc::new_cyclic(|me| Self {
            instrument_id,
            instruments,
            connector,
            records: Subscribers::new(),
            status: Subscribers::new(),
            link: Mutex::new(SessionLink {
                state: PortState::Closed,
                close_requested: false,
                generation: 0,
                transport: None,
                data_sub: None,
                status_sub: None,
            }),
            me: me.clone(),
        })
    }

    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    pub fn state(&self) -> PortState {
        self.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == PortState::Open
    }

    /// 该仪器持续输出数据，无需轮询
    pub fn is_streaming(&self) -> bool {
        true
    }

    /// 打开端口
    ///
    /// 仅在 `Closed` 状态下允许；查找仪器、解析端口配置、创建传输并挂接监听后
    /// 才启动传输 I/O。返回时端口通常仍处于 `Opening`，真正打开由状态事件驱动。
    pub async fn open(&self) -> Result<(), SessionError> {
        let generation = {
            let mut link = self.lock();
            if link.state != PortState::Closed {
                return Err(SessionError::AlreadyOpen(self.instrument_id.clone()));
            }
            link.state = PortState::Opening;
            link.close_requested = false;
            link.generation += 1;
            link.generation
        };

        let transport = match self.connect().await {
            Ok(transport) => transport,
            Err(err) => {
                let mut link = self.lock();
                if link.generation == generation {
                    link.state = PortState::Closed;
                }
                warn!(
                    target: "relay.session",
                    instrument_id = %self.instrument_id,
                    error = %err,
                    "session_open_failed"
                );
                return Err(err);
            }
        };

        {
            let mut link = self.lock();
            if link.generation != generation || link.state != PortState::Opening {
                return Err(SessionError::OpenCancelled(self.instrument_id.clone()));
            }
            let data_session = self.me.clone();
            let data_sub = transport.events().data.subscribe(move |line: &String| {
                if let Some(session) = data_session.upgrade() {
                    session.on_line(line);
                }
            });
            let status_session = self.me.clone();
            let status_sub = transport.events().status.subscribe(move |status: &PortStatus| {
                if let Some(session) = status_session.upgrade() {
                    session.on_status(generation, status);
                }
            });
            link.transport = Some(Arc::clone(&transport));
            link.data_sub = Some(data_sub);
            link.status_sub = Some(status_sub);
        }

        transport.open();
        Ok(())
    }

    /// 关闭端口
    ///
    /// 已关闭时为空操作。数据监听立即摘除，状态监听在传输确认关闭后自行摘除。
    pub fn close(&self) {
        let (transport, data_sub) = {
            let mut link = self.lock();
            match link.state {
                PortState::Closed | PortState::Closing => {
                    debug!(target: "relay.session", instrument_id = %self.instrument_id, "session_close_ignored");
                    return;
                }
                PortState::Opening if link.transport.is_none() => {
                    // 仍在查找/创建传输，open() 会发现代数变化并放弃
                    link.generation += 1;
                    link.state = PortState::Closed;
                    return;
                }
                _ => {}
            }
            link.close_requested = true;
            link.state = PortState::Closing;
            (link.transport.clone(), link.data_sub.take())
        };

        info!(target: "relay.session", instrument_id = %self.instrument_id, "session_closing");
        if let Some(transport) = transport {
            if let Some(id) = data_sub {
                transport.events().data.unsubscribe(id);
            }
            transport.close();
        }
    }

    /// 订阅解码后的记录
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Record) + Send + Sync + 'static,
    {
        self.records.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.records.unsubscribe(id)
    }

    /// 订阅端口状态变化
    pub fn subscribe_status<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&PortStatus) + Send + Sync + 'static,
    {
        self.status.subscribe(handler)
    }

    pub fn unsubscribe_status(&self, id: SubscriptionId) -> bool {
        self.status.unsubscribe(id)
    }

    pub fn record_subscriber_count(&self) -> usize {
        self.records.len()
    }

    /// 原始命令通道：写入 `command + "\n"`。
    ///
    /// `TAG` 在本地应答 `{devicetag: "Not supported"}`，不经过传输。
    pub fn send(&self, command: &str) -> Result<(), SessionError> {
        if command == TAG_COMMAND {
            self.records
                .emit(&Record::with_field("devicetag", "Not supported"));
            return Ok(());
        }
        let transport = {
            let link = self.lock();
            match (&link.state, &link.transport) {
                (PortState::Open, Some(transport)) => Arc::clone(transport),
                _ => return Err(SessionError::NotOpen(self.instrument_id.clone())),
            }
        };
        debug!(target: "relay.session", instrument_id = %self.instrument_id, command = %command, "session_command");
        transport.write(format!("{}\n", command).as_bytes())?;
        Ok(())
    }

    /// 设备没有唯一序列号，发出固定占位值。
    pub fn send_unique_id(&self) {
        self.records
            .emit(&Record::with_field("uniqueID", "00000000 (n.a.)"));
    }

    async fn connect(&self) -> Result<Arc<dyn Transport>, SessionError> {
        let instrument = self
            .instruments
            .find_instrument(&self.instrument_id)
            .await?
            .ok_or_else(|| SessionError::InstrumentNotFound(self.instrument_id.clone()))?;
        let port_config = PortConfig::from_value(&instrument.port_config)?;
        info!(
            target: "relay.session",
            instrument_id = %self.instrument_id,
            port = %port_config.describe(),
            "session_opening"
        );
        Ok(self.connector.connect(&port_config)?)
    }

    fn on_line(&self, line: &str) {
        if let Some(record) = decode(line) {
            self.records.emit(&record);
        }
    }

    fn on_status(&self, generation: u64, status: &PortStatus) {
        let mut link = self.lock();
        if link.generation != generation {
            return;
        }

        if status.port_open {
            if link.state == PortState::Opening {
                link.state = PortState::Open;
            }
            drop(link);
            info!(target: "relay.session", instrument_id = %self.instrument_id, "session_open");
            self.status.emit(status);
            return;
        }

        let requested = std::mem::take(&mut link.close_requested);
        let transport = link.transport.take();
        let data_sub = link.data_sub.take();
        let status_sub = link.status_sub.take();
        link.state = PortState::Closed;
        drop(link);

        if let Some(transport) = transport {
            if let Some(id) = data_sub {
                transport.events().data.unsubscribe(id);
            }
            if let Some(id) = status_sub {
                transport.events().status.unsubscribe(id);
            }
        }

        match (requested, &status.error) {
            (true, _) => {
                info!(target: "relay.session", instrument_id = %self.instrument_id, "session_closed");
            }
            (false, Some(error)) => {
                warn!(
                    target: "relay.session",
                    instrument_id = %self.instrument_id,
                    error = %error,
                    "session_port_failed"
                );
            }
            (false, None) => {
                warn!(target: "relay.session", instrument_id = %self.instrument_id, "session_port_closed_unexpectedly");
            }
        }
        self.status.emit(status);
    }

    fn lock(&self) -> MutexGuard<'_, SessionLink> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordSource for PortSession {
    fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    fn subscribe_records(&self, handler: RecordHandler) -> SubscriptionId {
        self.records.subscribe_arc(handler)
    }

    fn unsubscribe_records(&self, id: SubscriptionId) -> bool {
        self.records.unsubscribe(id)
    }
}
