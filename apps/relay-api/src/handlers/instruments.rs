//! 仪器会话 handlers
//!
//! - GET /api/instruments - 列出仪器、会话状态与已绑定输出
//! - POST /api/instruments/{id}/open - 打开端口并启用输出
//! - POST /api/instruments/{id}/close - 摘除输出并关闭端口
//! - POST /api/instruments/{id}/command - 原始命令通道
//! - POST /api/instruments/{id}/unique-id - 发出设备唯一 ID 记录
//! - POST /api/instruments/{id}/outputs/reload - 重新加载输出配置

use crate::AppState;
use crate::utils::{
    bad_request_error, binding_to_dto, not_found_error, output_error, session_error,
    storage_error,
};
use api_contract::{ApiResponse, CommandRequest, InstrumentStatusDto, SessionActionResponse};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use relay_session::{PortSession, PortState};
use relay_storage::InstrumentRecord;
use std::sync::Arc;
use tracing::info;

#[derive(serde::Deserialize)]
pub struct InstrumentPath {
    instrument_id: String,
}

/// 列出仪器
pub async fn list_instruments(State(state): State<AppState>) -> Response {
    let records = match state.instruments.list_instruments().await {
        Ok(records) => records,
        Err(err) => return storage_error(err),
    };
    let data: Vec<InstrumentStatusDto> = records
        .into_iter()
        .map(|record| {
            let session = state.sessions.get(&record.instrument_id);
            let outputs = state
                .outputs
                .active_outputs(&record.instrument_id)
                .into_iter()
                .map(binding_to_dto)
                .collect();
            InstrumentStatusDto {
                state: session
                    .as_ref()
                    .map(|session| session.state())
                    .unwrap_or(PortState::Closed)
                    .as_str()
                    .to_string(),
                streaming: session.is_none_or(|session| session.is_streaming()),
                instrument_id: record.instrument_id,
                name: record.name,
                instrument_type: record.instrument_type,
                outputs,
            }
        })
        .collect();
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// 打开端口
pub async fn open_instrument(
    State(state): State<AppState>,
    Path(path): Path<InstrumentPath>,
) -> Response {
    if let Err(response) = require_instrument(&state, &path.instrument_id).await {
        return response;
    }
    let session = state.sessions.session(&path.instrument_id);
    if let Err(err) = session.open().await {
        return session_error(err);
    }
    match state.enable_outputs(&session).await {
        Ok(bound) => {
            info!(target: "relay.api", instrument_id = %path.instrument_id, bound, "instrument_opened");
            action_response(&session, bound)
        }
        Err(err) => output_error(err),
    }
}

/// 关闭端口；未打开时为空操作
pub async fn close_instrument(
    State(state): State<AppState>,
    Path(path): Path<InstrumentPath>,
) -> Response {
    if let Err(response) = require_instrument(&state, &path.instrument_id).await {
        return response;
    }
    state.outputs.disable_outputs(&path.instrument_id);
    let session = state.sessions.session(&path.instrument_id);
    session.close();
    info!(target: "relay.api", instrument_id = %path.instrument_id, "instrument_closed");
    action_response(&session, 0)
}

/// 原始命令通道
pub async fn send_command(
    State(state): State<AppState>,
    Path(path): Path<InstrumentPath>,
    Json(req): Json<CommandRequest>,
) -> Response {
    let command = req.command.trim();
    if command.is_empty() {
        return bad_request_error("command is required");
    }
    if let Err(response) = require_instrument(&state, &path.instrument_id).await {
        return response;
    }
    let session = state.sessions.session(&path.instrument_id);
    match session.send(command) {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "instrumentId": path.instrument_id,
                "command": command,
            }))),
        )
            .into_response(),
        Err(err) => session_error(err),
    }
}

/// 发出设备唯一 ID 记录（设备不支持，固定占位值）
pub async fn send_unique_id(
    State(state): State<AppState>,
    Path(path): Path<InstrumentPath>,
) -> Response {
    if let Err(response) = require_instrument(&state, &path.instrument_id).await {
        return response;
    }
    let session = state.sessions.session(&path.instrument_id);
    session.send_unique_id();
    let bound = state.outputs.active_outputs(&path.instrument_id).len();
    action_response(&session, bound)
}

/// 重新读取输出配置并替换绑定
pub async fn reload_outputs(
    State(state): State<AppState>,
    Path(path): Path<InstrumentPath>,
) -> Response {
    if let Err(response) = require_instrument(&state, &path.instrument_id).await {
        return response;
    }
    let session = state.sessions.session(&path.instrument_id);
    match state.enable_outputs(&session).await {
        Ok(bound) => action_response(&session, bound),
        Err(err) => output_error(err),
    }
}

async fn require_instrument(
    state: &AppState,
    instrument_id: &str,
) -> Result<InstrumentRecord, Response> {
    match state.instruments.find_instrument(instrument_id).await {
        Ok(Some(record)) => Ok(record),
        Ok(None) => Err(not_found_error()),
        Err(err) => Err(storage_error(err)),
    }
}

fn action_response(session: &Arc<PortSession>, bound_outputs: usize) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse::success(SessionActionResponse {
            instrument_id: session.instrument_id().to_string(),
            state: session.state().as_str().to_string(),
            bound_outputs,
        })),
    )
        .into_response()
}
