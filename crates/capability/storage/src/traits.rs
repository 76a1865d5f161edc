//! 存储接口 Trait 定义

use crate::error::StorageError;
use crate::models::{InstrumentRecord, OutputRecord};
use async_trait::async_trait;

/// 仪器存储接口
#[async_trait]
pub trait InstrumentStore: Send + Sync {
    async fn list_instruments(&self) -> Result<Vec<InstrumentRecord>, StorageError>;

    async fn find_instrument(
        &self,
        instrument_id: &str,
    ) -> Result<Option<InstrumentRecord>, StorageError>;
}

/// 输出配置存储接口
#[async_trait]
pub trait OutputStore: Send + Sync {
    /// 指定仪器已启用的输出，按创建顺序返回。
    async fn list_enabled_outputs(
        &self,
        instrument_id: &str,
    ) -> Result<Vec<OutputRecord>, StorageError>;

    /// 指定仪器的全部输出（含未启用）。
    async fn list_outputs(&self, instrument_id: &str) -> Result<Vec<OutputRecord>, StorageError>;
}
