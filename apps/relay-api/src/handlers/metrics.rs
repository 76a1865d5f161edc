//! Telemetry 指标快照。
//!
//! - GET /api/metrics

use api_contract::{ApiResponse, MetricsSnapshotDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use relay_telemetry::metrics;

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    (
        StatusCode::OK,
        Json(ApiResponse::success(MetricsSnapshotDto {
            lines_received: snapshot.lines_received,
            frames_decoded: snapshot.frames_decoded,
            frames_unrecognized: snapshot.frames_unrecognized,
            frames_dropped: snapshot.frames_dropped,
            outputs_triggered: snapshot.outputs_triggered,
            alarms_fired: snapshot.alarms_fired,
            send_success: snapshot.send_success,
            send_failure: snapshot.send_failure,
            send_stale: snapshot.send_stale,
            send_latency_ms_total: snapshot.send_latency_ms_total,
            send_latency_ms_count: snapshot.send_latency_ms_count,
            dispatch_without_outputs: snapshot.dispatch_without_outputs,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    #[tokio::test]
    async fn metrics_snapshot_is_wrapped() {
        let response = get_metrics().await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["success"], true);
        assert!(value["data"]["framesDecoded"].is_u64());
    }
}
