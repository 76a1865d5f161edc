#![allow(dead_code)]

use async_trait::async_trait;
use domain::{Record, RecordHandler, RecordSource, Subscribers, SubscriptionId};
use relay_output::{OutputError, OutputPlugin, PluginRegistry};
use relay_storage::{InMemoryOutputStore, OutputRecord, OutputStore, StorageError};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub const T: i64 = 1_700_000_000_000;

/// 记录所有发送内容的插件状态
#[derive(Default)]
pub struct Recorder {
    pub sent: Mutex<Vec<(String, Record)>>,
    pub fail: AtomicBool,
    pub gate: Mutex<Option<Arc<Semaphore>>>,
}

impl Recorder {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// 之后的发送阻塞在信号量上，直到测试放行
    pub fn hold_sends(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

struct RecordingPlugin {
    output_id: String,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl OutputPlugin for RecordingPlugin {
    async fn send_data(&self, record: &Record) -> Result<(), OutputError> {
        let gate = self.recorder.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let permit = gate.acquire().await.map_err(|err| OutputError::Send(err.to_string()))?;
            permit.forget();
        }
        if self.recorder.fail.load(Ordering::SeqCst) {
            return Err(OutputError::Send("endpoint unavailable".to_string()));
        }
        self.recorder
            .sent
            .lock()
            .unwrap()
            .push((self.output_id.clone(), record.clone()));
        Ok(())
    }
}

pub fn registry(recorder: Arc<Recorder>) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register("fake", move |record: &OutputRecord| {
        let plugin: Arc<dyn OutputPlugin> = Arc::new(RecordingPlugin {
            output_id: record.output_id.clone(),
            recorder: recorder.clone(),
        });
        Ok(plugin)
    });
    registry
}

pub fn descriptor(output_id: &str, output_type: &str, config: Value) -> OutputRecord {
    OutputRecord {
        output_id: output_id.to_string(),
        instrument_id: "geiger-1".to_string(),
        enabled: true,
        output_type: output_type.to_string(),
        config,
    }
}

/// 直接推送记录的数据源
pub struct FakeSource {
    id: String,
    records: Subscribers<Record>,
}

impl FakeSource {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            records: Subscribers::new(),
        })
    }

    pub fn push(&self, record: &Record) -> usize {
        self.records.emit(record)
    }

    pub fn listener_count(&self) -> usize {
        self.records.len()
    }
}

impl RecordSource for FakeSource {
    fn instrument_id(&self) -> &str {
        &self.id
    }

    fn subscribe_records(&self, handler: RecordHandler) -> SubscriptionId {
        self.records.subscribe_arc(handler)
    }

    fn unsubscribe_records(&self, id: SubscriptionId) -> bool {
        self.records.unsubscribe(id)
    }
}

/// 可切换为失败的输出存储
#[derive(Default)]
pub struct FlakyOutputStore {
    pub inner: InMemoryOutputStore,
    pub fail: AtomicBool,
}

#[async_trait]
impl OutputStore for FlakyOutputStore {
    async fn list_enabled_outputs(
        &self,
        instrument_id: &str,
    ) -> Result<Vec<OutputRecord>, StorageError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::new("database unavailable"));
        }
        self.inner.list_enabled_outputs(instrument_id).await
    }

    async fn list_outputs(&self, instrument_id: &str) -> Result<Vec<OutputRecord>, StorageError> {
        self.inner.list_outputs(instrument_id).await
    }
}

/// 让已派发的发送任务执行完
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
