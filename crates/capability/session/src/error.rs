//! 会话错误类型定义

use relay_protocol::ProtocolError;
use relay_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// 会话不处于关闭状态
    #[error("session already open: {0}")]
    AlreadyOpen(String),

    #[error("session not open: {0}")]
    NotOpen(String),

    #[error("instrument not found: {0}")]
    InstrumentNotFound(String),

    /// 打开过程中被 close() 取消
    #[error("open cancelled: {0}")]
    OpenCancelled(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
