//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：bad_request_error, not_found_error, conflict_error, storage_error,
//!   session_error, protocol_error, output_error
//! - DTO 转换：binding_to_dto
//!
//! 所有错误返回统一的 ApiResponse 格式，HTTP 状态码与错误码对应。

use api_contract::{ApiResponse, OutputStatusDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use relay_output::{BindingSnapshot, OutputError};
use relay_protocol::ProtocolError;
use relay_session::SessionError;
use relay_storage::StorageError;

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(code, message.into()))).into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, "INVALID.REQUEST", message)
}

/// 资源未找到错误响应
pub fn not_found_error() -> Response {
    error_response(StatusCode::NOT_FOUND, "RESOURCE.NOT_FOUND", "not found")
}

/// 状态冲突响应（端口已打开 / 未打开）
pub fn conflict_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::CONFLICT, "RESOURCE.CONFLICT", message)
}

/// 存储错误响应
pub fn storage_error(err: StorageError) -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL.ERROR",
        err.to_string(),
    )
}

/// 会话错误响应
pub fn session_error(err: SessionError) -> Response {
    let message = err.to_string();
    match err {
        SessionError::InstrumentNotFound(_) => not_found_error(),
        SessionError::AlreadyOpen(_)
        | SessionError::NotOpen(_)
        | SessionError::OpenCancelled(_) => conflict_error(message),
        SessionError::Protocol(err) => protocol_error(err),
        SessionError::Storage(err) => storage_error(err),
    }
}

/// 协议错误响应：配置问题归咎请求方，端口 I/O 问题归咎下游设备。
pub fn protocol_error(err: ProtocolError) -> Response {
    let message = err.to_string();
    match err {
        ProtocolError::ConfigParse(_) => bad_request_error(message),
        // 写入时端口已在底层关闭
        ProtocolError::NotOpen | ProtocolError::ChannelClosed => conflict_error(message),
        ProtocolError::Connection(_)
        | ProtocolError::Io(_)
        | ProtocolError::Serial(_)
        | ProtocolError::DataParse(_) => {
            error_response(StatusCode::BAD_GATEWAY, "PORT.IO_ERROR", message)
        }
    }
}

/// 输出错误响应
pub fn output_error(err: OutputError) -> Response {
    match err {
        OutputError::Storage(err) => storage_error(err),
        err => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL.ERROR",
            err.to_string(),
        ),
    }
}

/// BindingSnapshot 转 OutputStatusDto
pub fn binding_to_dto(snapshot: BindingSnapshot) -> OutputStatusDto {
    OutputStatusDto {
        output_id: snapshot.output_id,
        output_type: snapshot.output_type,
        last_send_at_ms: snapshot.last_send_at_ms,
        last_alarm_at_ms: snapshot.last_alarm_at_ms,
        alarm_interval_ms: snapshot.alarm_interval_ms,
        regular_interval_ms: snapshot.regular_interval_ms,
    }
}
