//! 输出管理器：按仪器维护输出绑定，并把每条记录分发到满足条件的输出。
//!
//! 每台仪器至多挂接一个分发回调；重新启用时整体替换绑定列表并先摘除旧回调。
//! 发送在独立任务中执行，完成时若绑定已被替换则忽略结果。

use crate::binding::{BindingSnapshot, OutputBinding};
use crate::error::OutputError;
use crate::plugin::PluginRegistry;
use crate::settings::OutputSettings;
use domain::{Clock, Record, RecordHandler, RecordSource, SubscriptionId};
use relay_storage::{OutputRecord, OutputStore};
use relay_telemetry::{
    record_alarm_fired, record_dispatch_without_outputs, record_output_triggered,
    record_send_failure, record_send_latency_ms, record_send_stale, record_send_success,
};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tracing::{debug, error, info, warn};

struct Attachment {
    source: Arc<dyn RecordSource>,
    subscription: SubscriptionId,
}

struct InstrumentOutputs {
    bindings: Arc<Vec<Arc<OutputBinding>>>,
    attachment: Option<Attachment>,
}

struct ManagerInner {
    store: Arc<dyn OutputStore>,
    plugins: PluginRegistry,
    clock: Arc<dyn Clock>,
    instruments: RwLock<HashMap<String, InstrumentOutputs>>,
}

#[derive(Clone)]
pub struct OutputManager {
    inner: Arc<ManagerInner>,
}

impl OutputManager {
    pub fn new(store: Arc<dyn OutputStore>, plugins: PluginRegistry, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                store,
                plugins,
                clock,
                instruments: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// 读取仪器已启用的输出并重建绑定，返回绑定数量。
    ///
    /// 无法创建插件或配置无效的输出会被跳过；存储错误直接返回，原有绑定保持不变。
    pub async fn enable_outputs(&self, source: Arc<dyn RecordSource>) -> Result<usize, OutputError> {
        let instrument_id = source.instrument_id().to_string();
        let descriptors = self.inner.store.list_enabled_outputs(&instrument_id).await?;
        let now_ms = self.inner.clock.now_ms();

        let bindings: Vec<Arc<OutputBinding>> = descriptors
            .iter()
            .filter_map(|descriptor| match self.build_binding(descriptor, now_ms) {
                Ok(binding) => Some(Arc::new(binding)),
                Err(err) => {
                    warn!(
                        target: "relay.output",
                        instrument_id = %instrument_id,
                        output_id = %descriptor.output_id,
                        output_type = %descriptor.output_type,
                        error = %err,
                        "output_skipped"
                    );
                    None
                }
            })
            .collect();
        let count = bindings.len();

        let mut instruments = self.inner.write();
        let previous = instruments.remove(&instrument_id);
        if let Some(Attachment {
            source: previous_source,
            subscription,
        }) = previous.and_then(|entry| entry.attachment)
        {
            debug!(target: "relay.output", instrument_id = %instrument_id, "output_callback_replaced");
            previous_source.unsubscribe_records(subscription);
        }

        if count > 0 {
            let manager = Arc::downgrade(&self.inner);
            let dispatch_id = instrument_id.clone();
            let handler: RecordHandler = Arc::new(move |record: &Record| {
                if let Some(manager) = manager.upgrade() {
                    manager.dispatch(&dispatch_id, record);
                }
            });
            let subscription = source.subscribe_records(handler);
            instruments.insert(
                instrument_id.clone(),
                InstrumentOutputs {
                    bindings: Arc::new(bindings),
                    attachment: Some(Attachment {
                        source,
                        subscription,
                    }),
                },
            );
        }
        drop(instruments);

        info!(
            target: "relay.output",
            instrument_id = %instrument_id,
            enabled = descriptors.len(),
            bound = count,
            "outputs_enabled"
        );
        Ok(count)
    }

    /// 摘除分发回调并丢弃绑定；未注册时为空操作。
    pub fn disable_outputs(&self, instrument_id: &str) {
        let removed = self.inner.write().remove(instrument_id);
        let Some(entry) = removed else {
            return;
        };
        if let Some(attachment) = entry.attachment {
            attachment
                .source
                .unsubscribe_records(attachment.subscription);
        }
        info!(target: "relay.output", instrument_id = %instrument_id, "outputs_disabled");
    }

    /// 对一条记录执行判定与发送
    pub fn dispatch(&self, instrument_id: &str, record: &Record) {
        self.inner.dispatch(instrument_id, record);
    }

    pub fn has_outputs(&self, instrument_id: &str) -> bool {
        self.inner.read().contains_key(instrument_id)
    }

    /// 当前绑定状态，按注册顺序
    pub fn active_outputs(&self, instrument_id: &str) -> Vec<BindingSnapshot> {
        self.inner
            .read()
            .get(instrument_id)
            .map(|entry| entry.bindings.iter().map(|binding| binding.snapshot()).collect())
            .unwrap_or_default()
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.inner.plugins
    }

    fn build_binding(
        &self,
        descriptor: &OutputRecord,
        now_ms: i64,
    ) -> Result<OutputBinding, OutputError> {
        let settings = OutputSettings::from_config(&descriptor.config)?;
        let plugin = self.inner.plugins.create(descriptor)?;
        Ok(OutputBinding::new(
            descriptor.output_id.clone(),
            descriptor.output_type.clone(),
            plugin,
            settings,
            now_ms,
        ))
    }
}

impl ManagerInner {
    fn dispatch(&self, instrument_id: &str, record: &Record) {
        let bindings = self
            .read()
            .get(instrument_id)
            .map(|entry| Arc::clone(&entry.bindings));
        let Some(bindings) = bindings.filter(|bindings| !bindings.is_empty()) else {
            record_dispatch_without_outputs();
            error!(target: "relay.output", instrument_id = %instrument_id, "dispatch_without_outputs");
            return;
        };

        let now_ms = self.clock.now_ms();
        let mut shared: Option<Arc<Record>> = None;
        for binding in bindings.iter() {
            let trigger = binding.evaluate(record, now_ms);
            if trigger.alarm {
                record_alarm_fired();
            }
            if !trigger.fires() {
                continue;
            }
            record_output_triggered();
            debug!(
                target: "relay.output",
                instrument_id = %instrument_id,
                output_id = %binding.output_id(),
                alarm = trigger.alarm,
                regular = trigger.regular,
                "output_triggered"
            );
            let record = Arc::clone(shared.get_or_insert_with(|| Arc::new(record.clone())));
            self.spawn_send(binding, record);
        }
    }

    fn spawn_send(&self, binding: &Arc<OutputBinding>, record: Arc<Record>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            record_send_failure();
            error!(target: "relay.output", output_id = %binding.output_id(), "output_send_without_runtime");
            return;
        };
        let weak: Weak<OutputBinding> = Arc::downgrade(binding);
        let plugin = Arc::clone(binding.plugin());
        let clock = Arc::clone(&self.clock);
        let output_id = binding.output_id().to_string();
        let started_ms = clock.now_ms();

        runtime.spawn(async move {
            let result = plugin.send_data(&record).await;
            let finished_ms = clock.now_ms();
            record_send_latency_ms((finished_ms - started_ms).max(0) as u64);
            match result {
                Ok(()) => match weak.upgrade() {
                    Some(binding) => {
                        binding.mark_sent(finished_ms);
                        record_send_success();
                        debug!(target: "relay.output", output_id = %output_id, "output_sent");
                    }
                    None => {
                        record_send_stale();
                        debug!(target: "relay.output", output_id = %output_id, "output_send_stale");
                    }
                },
                Err(err) => {
                    record_send_failure();
                    warn!(target: "relay.output", output_id = %output_id, error = %err, "output_send_failed");
                }
            }
        });
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, InstrumentOutputs>> {
        self.instruments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, InstrumentOutputs>> {
        self.instruments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
