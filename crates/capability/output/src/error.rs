//! 输出错误类型定义

use relay_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// 输出配置无法解析
    #[error("config error: {0}")]
    Config(String),

    /// 没有注册该类型的插件
    #[error("unsupported output type: {0}")]
    UnsupportedType(String),

    /// 发送失败
    #[error("send error: {0}")]
    Send(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
