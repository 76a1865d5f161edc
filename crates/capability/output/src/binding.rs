//! 单个输出的绑定：插件实例 + 调度配置 + 发送时间戳

use crate::alarm::alarm_triggered;
use crate::plugin::OutputPlugin;
use crate::settings::OutputSettings;
use domain::Record;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, Default)]
struct BindingState {
    last_send_at_ms: i64,
    last_alarm_at_ms: Option<i64>,
}

/// 一条记录在某个输出上的判定结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Trigger {
    pub alarm: bool,
    pub regular: bool,
}

impl Trigger {
    /// 告警与定时同时满足也只发送一次
    pub fn fires(&self) -> bool {
        self.alarm || self.regular
    }
}

pub struct OutputBinding {
    output_id: String,
    output_type: String,
    plugin: Arc<dyn OutputPlugin>,
    settings: OutputSettings,
    state: Mutex<BindingState>,
}

impl OutputBinding {
    /// `created_at_ms` 作为初始的上次发送时间。
    pub fn new(
        output_id: impl Into<String>,
        output_type: impl Into<String>,
        plugin: Arc<dyn OutputPlugin>,
        settings: OutputSettings,
        created_at_ms: i64,
    ) -> Self {
        Self {
            output_id: output_id.into(),
            output_type: output_type.into(),
            plugin,
            settings,
            state: Mutex::new(BindingState {
                last_send_at_ms: created_at_ms,
                last_alarm_at_ms: None,
            }),
        }
    }

    pub fn output_id(&self) -> &str {
        &self.output_id
    }

    pub fn plugin(&self) -> &Arc<dyn OutputPlugin> {
        &self.plugin
    }

    /// 判定告警门与定时门；告警门触发时记录告警时间。
    pub fn evaluate(&self, record: &Record, now_ms: i64) -> Trigger {
        let conditions_met = alarm_triggered(&self.settings, self.plugin.as_ref(), record);
        let mut state = self.lock();
        let alarm = conditions_met && self.alarm_due(&state, now_ms);
        if alarm {
            state.last_alarm_at_ms = Some(now_ms);
        }
        let regular = self.settings.regular_interval_ms > 0
            && now_ms - state.last_send_at_ms > self.settings.regular_interval_ms as i64;
        Trigger { alarm, regular }
    }

    /// 发送成功后更新上次发送时间
    pub fn mark_sent(&self, at_ms: i64) {
        self.lock().last_send_at_ms = at_ms;
    }

    pub fn last_send_at_ms(&self) -> i64 {
        self.lock().last_send_at_ms
    }

    pub fn last_alarm_at_ms(&self) -> Option<i64> {
        self.lock().last_alarm_at_ms
    }

    pub fn snapshot(&self) -> BindingSnapshot {
        let state = *self.lock();
        BindingSnapshot {
            output_id: self.output_id.clone(),
            output_type: self.output_type.clone(),
            last_send_at_ms: state.last_send_at_ms,
            last_alarm_at_ms: state.last_alarm_at_ms,
            alarm_interval_ms: self.settings.alarm_interval_ms,
            regular_interval_ms: self.settings.regular_interval_ms,
        }
    }

    fn alarm_due(&self, state: &BindingState, now_ms: i64) -> bool {
        let interval = self.settings.alarm_interval_ms;
        if interval == 0 {
            return false;
        }
        match state.last_alarm_at_ms {
            None => true,
            Some(last) => now_ms - last > interval as i64,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BindingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 对外展示的绑定状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSnapshot {
    pub output_id: String,
    pub output_type: String,
    pub last_send_at_ms: i64,
    pub last_alarm_at_ms: Option<i64>,
    pub alarm_interval_ms: u64,
    pub regular_interval_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OutputError;
    use async_trait::async_trait;
    use serde_json::json;

    struct Noop;

    #[async_trait]
    impl OutputPlugin for Noop {
        async fn send_data(&self, _record: &Record) -> Result<(), OutputError> {
            Ok(())
        }
    }

    const T: i64 = 1_700_000_000_000;

    fn binding(config: serde_json::Value) -> OutputBinding {
        let settings = OutputSettings::from_config(&config).unwrap();
        OutputBinding::new("out-1", "noop", Arc::new(Noop), settings, T)
    }

    fn high() -> Record {
        Record::with_field("cpm", json!({ "value": 150, "valid": true }))
    }

    #[test]
    fn test_zero_alarm_interval_never_fires() {
        let binding = binding(json!({
            "alarm1": { "field": "cpm.value", "comparator": "moreeq", "level": 100 },
            "alrmbool": "or",
            "alrmfrequency": 0
        }));
        for offset in [0, 1_000, 3_600_000] {
            assert!(!binding.evaluate(&high(), T + offset).fires());
        }
        assert_eq!(binding.last_alarm_at_ms(), None);
    }

    #[test]
    fn test_alarm_debounce_boundary() {
        let binding = binding(json!({
            "alarm1": { "field": "cpm.value", "comparator": "moreeq", "level": 100 },
            "alrmbool": "or",
            "alrmfrequency": 30
        }));
        assert!(binding.evaluate(&high(), T).alarm);
        assert!(!binding.evaluate(&high(), T + 30_000 - 1).alarm);
        assert!(!binding.evaluate(&high(), T + 30_000).alarm);
        assert_eq!(binding.last_alarm_at_ms(), Some(T));
        assert!(binding.evaluate(&high(), T + 30_000 + 1).alarm);
        assert_eq!(binding.last_alarm_at_ms(), Some(T + 30_001));
    }

    #[test]
    fn test_regular_gate_uses_last_send() {
        let binding = binding(json!({ "frequency": 10 }));
        assert!(!binding.evaluate(&high(), T + 10_000).regular);
        assert!(binding.evaluate(&high(), T + 10_001).regular);
        // 未确认发送成功前持续满足
        assert!(binding.evaluate(&high(), T + 10_002).regular);
        binding.mark_sent(T + 10_002);
        assert!(!binding.evaluate(&high(), T + 15_000).regular);
        assert_eq!(binding.last_send_at_ms(), T + 10_002);
    }

    #[test]
    fn test_alarm_and_regular_together() {
        let binding = binding(json!({
            "alarm1": { "field": "cpm.value", "comparator": "moreeq", "level": 100 },
            "alrmbool": "or",
            "alrmfrequency": 60,
            "frequency": 1
        }));
        let trigger = binding.evaluate(&high(), T + 5_000);
        assert_eq!(trigger, Trigger { alarm: true, regular: true });
        assert!(trigger.fires());
    }
}
