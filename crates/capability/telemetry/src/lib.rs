//! 追踪初始化、请求 ID 生成与进程级计数。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 计数快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub lines_received: u64,
    pub frames_decoded: u64,
    pub frames_unrecognized: u64,
    pub frames_dropped: u64,
    pub outputs_triggered: u64,
    pub alarms_fired: u64,
    pub send_success: u64,
    pub send_failure: u64,
    pub send_stale: u64,
    pub send_latency_ms_total: u64,
    pub send_latency_ms_count: u64,
    pub dispatch_without_outputs: u64,
}

/// 进程级计数器。
pub struct TelemetryMetrics {
    lines_received: AtomicU64,
    frames_decoded: AtomicU64,
    frames_unrecognized: AtomicU64,
    frames_dropped: AtomicU64,
    outputs_triggered: AtomicU64,
    alarms_fired: AtomicU64,
    send_success: AtomicU64,
    send_failure: AtomicU64,
    send_stale: AtomicU64,
    send_latency_ms_total: AtomicU64,
    send_latency_ms_count: AtomicU64,
    dispatch_without_outputs: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            lines_received: AtomicU64::new(0),
            frames_decoded: AtomicU64::new(0),
            frames_unrecognized: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            outputs_triggered: AtomicU64::new(0),
            alarms_fired: AtomicU64::new(0),
            send_success: AtomicU64::new(0),
            send_failure: AtomicU64::new(0),
            send_stale: AtomicU64::new(0),
            send_latency_ms_total: AtomicU64::new(0),
            send_latency_ms_count: AtomicU64::new(0),
            dispatch_without_outputs: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lines_received: self.lines_received.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_unrecognized: self.frames_unrecognized.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            outputs_triggered: self.outputs_triggered.load(Ordering::Relaxed),
            alarms_fired: self.alarms_fired.load(Ordering::Relaxed),
            send_success: self.send_success.load(Ordering::Relaxed),
            send_failure: self.send_failure.load(Ordering::Relaxed),
            send_stale: self.send_stale.load(Ordering::Relaxed),
            send_latency_ms_total: self.send_latency_ms_total.load(Ordering::Relaxed),
            send_latency_ms_count: self.send_latency_ms_count.load(Ordering::Relaxed),
            dispatch_without_outputs: self.dispatch_without_outputs.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录收到的原始行数。
pub fn record_line_received() {
    metrics().lines_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录解码成功的帧数。
pub fn record_frame_decoded() {
    metrics().frames_decoded.fetch_add(1, Ordering::Relaxed);
}

/// 记录无法识别（静默丢弃）的帧数。
pub fn record_frame_unrecognized() {
    metrics().frames_unrecognized.fetch_add(1, Ordering::Relaxed);
}

/// 记录解析失败丢弃的帧数。
pub fn record_frame_dropped() {
    metrics().frames_dropped.fetch_add(1, Ordering::Relaxed);
}

/// 记录触发输出的次数（告警或定时）。
pub fn record_output_triggered() {
    metrics().outputs_triggered.fetch_add(1, Ordering::Relaxed);
}

/// 记录告警触发次数（去抖之后）。
pub fn record_alarm_fired() {
    metrics().alarms_fired.fetch_add(1, Ordering::Relaxed);
}

/// 记录发送成功次数。
pub fn record_send_success() {
    metrics().send_success.fetch_add(1, Ordering::Relaxed);
}

/// 记录发送失败次数。
pub fn record_send_failure() {
    metrics().send_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录输出已被替换后才返回的发送结果。
pub fn record_send_stale() {
    metrics().send_stale.fetch_add(1, Ordering::Relaxed);
}

/// 记录发送耗时（毫秒）。
pub fn record_send_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .send_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .send_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录没有已绑定输出时的分发请求。
pub fn record_dispatch_without_outputs() {
    metrics()
        .dispatch_without_outputs
        .fetch_add(1, Ordering::Relaxed);
}
