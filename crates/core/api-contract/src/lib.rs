//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 仪器及其会话状态。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentStatusDto {
    pub instrument_id: String,
    pub name: String,
    pub instrument_type: String,
    /// closed / opening / open / closing
    pub state: String,
    pub streaming: bool,
    pub outputs: Vec<OutputStatusDto>,
}

/// 已绑定输出的运行状态。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputStatusDto {
    pub output_id: String,
    pub output_type: String,
    pub last_send_at_ms: i64,
    pub last_alarm_at_ms: Option<i64>,
    pub alarm_interval_ms: u64,
    pub regular_interval_ms: u64,
}

/// 原始命令请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    #[serde(alias = "cmd")]
    pub command: String,
}

/// 打开端口 / 重新加载输出的响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionActionResponse {
    pub instrument_id: String,
    pub state: String,
    /// 当前绑定的输出数量
    pub bound_outputs: usize,
}

/// Telemetry 指标快照。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
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
