//! 会话注册表：每台仪器最多一个会话实例。

use crate::session::PortSession;
use relay_protocol::TransportConnector;
use relay_storage::InstrumentStore;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

pub struct SessionRegistry {
    instruments: Arc<dyn InstrumentStore>,
    connector: Arc<dyn TransportConnector>,
    sessions: RwLock<HashMap<String, Arc<PortSession>>>,
}

impl SessionRegistry {
    pub fn new(
        instruments: Arc<dyn InstrumentStore>,
        connector: Arc<dyn TransportConnector>,
    ) -> Self {
        Self {
            instruments,
            connector,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// 返回已有会话，不存在时创建。
    pub fn session(&self, instrument_id: &str) -> Arc<PortSession> {
        if let Some(session) = self.get(instrument_id) {
            return session;
        }
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sessions.entry(instrument_id.to_string()).or_insert_with(|| {
            PortSession::new(
                instrument_id,
                Arc::clone(&self.instruments),
                Arc::clone(&self.connector),
            )
        }))
    }

    pub fn get(&self, instrument_id: &str) -> Option<Arc<PortSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(instrument_id)
            .cloned()
    }

    /// 全部会话，按仪器 id 排序
    pub fn sessions(&self) -> Vec<Arc<PortSession>> {
        let mut sessions: Vec<Arc<PortSession>> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.instrument_id().cmp(b.instrument_id()));
        sessions
    }

    pub fn close_all(&self) {
        for session in self.sessions() {
            session.close();
        }
    }
}
