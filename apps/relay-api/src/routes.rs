//! 路由定义
//!
//! 集中管理所有 API 路由，将路径映射到对应的 handlers。
//! 路由包括：
//! - 健康检查：/health
//! - 指标快照：/api/metrics
//! - 仪器会话：/api/instruments/*

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    routing::{get, post},
};

/// 创建 API 路由
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/metrics", get(get_metrics))
        .route("/api/instruments", get(list_instruments))
        .route("/api/instruments/:instrument_id/open", post(open_instrument))
        .route("/api/instruments/:instrument_id/close", post(close_instrument))
        .route("/api/instruments/:instrument_id/command", post(send_command))
        .route("/api/instruments/:instrument_id/unique-id", post(send_unique_id))
        .route(
            "/api/instruments/:instrument_id/outputs/reload",
            post(reload_outputs),
        )
}
