//! 显式订阅接口：`subscribe(handler) -> SubscriptionId`，`unsubscribe(id)` 解除。

use crate::data::Record;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 事件回调。
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// 记录回调。
pub type RecordHandler = Handler<Record>;

/// 订阅标识，由 `Subscribers::subscribe` 分配。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// 订阅者列表。
///
/// `emit` 先复制回调快照再逐个调用，回调内部可以安全地取消自己的订阅。
pub struct Subscribers<T> {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(SubscriptionId, Handler<T>)>>,
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_arc(Arc::new(handler))
    }

    pub fn subscribe_arc(&self, handler: Handler<T>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, handler));
        id
    }

    /// 取消订阅；订阅不存在时返回 false。
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.lock();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// 通知所有订阅者，返回被调用的回调数量。
    pub fn emit(&self, value: &T) -> usize {
        let snapshot: Vec<Handler<T>> = self
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in &snapshot {
            handler(value);
        }
        snapshot.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Handler<T>)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 记录数据源（端口会话），输出分发通过它挂接/摘除回调。
pub trait RecordSource: Send + Sync {
    fn instrument_id(&self) -> &str;

    fn subscribe_records(&self, handler: RecordHandler) -> SubscriptionId;

    fn unsubscribe_records(&self, id: SubscriptionId) -> bool;
}
