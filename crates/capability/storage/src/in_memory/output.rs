//! 输出配置内存存储实现

use crate::error::StorageError;
use crate::models::OutputRecord;
use crate::traits::OutputStore;
use std::sync::RwLock;

/// 输出配置内存存储，按插入顺序保存。
pub struct InMemoryOutputStore {
    outputs: RwLock<Vec<OutputRecord>>,
}

impl InMemoryOutputStore {
    pub fn new() -> Self {
        Self {
            outputs: RwLock::new(Vec::new()),
        }
    }

    pub fn from_records(records: Vec<OutputRecord>) -> Result<Self, StorageError> {
        let store = Self::new();
        for record in records {
            store.insert_output(record)?;
        }
        Ok(store)
    }

    /// 追加输出配置；output_id 重复时报错。
    pub fn insert_output(&self, record: OutputRecord) -> Result<(), StorageError> {
        let mut outputs = self
            .outputs
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if outputs.iter().any(|item| item.output_id == record.output_id) {
            return Err(StorageError::new(format!(
                "output exists: {}",
                record.output_id
            )));
        }
        outputs.push(record);
        Ok(())
    }

    /// 启用/停用输出，返回是否找到该输出。
    pub fn set_enabled(&self, output_id: &str, enabled: bool) -> Result<bool, StorageError> {
        let mut outputs = self
            .outputs
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(item) = outputs.iter_mut().find(|item| item.output_id == output_id) else {
            return Ok(false);
        };
        item.enabled = enabled;
        Ok(true)
    }

    pub fn remove_output(&self, output_id: &str) -> Result<bool, StorageError> {
        let mut outputs = self
            .outputs
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let before = outputs.len();
        outputs.retain(|item| item.output_id != output_id);
        Ok(outputs.len() != before)
    }

    fn filtered(&self, filter: impl Fn(&OutputRecord) -> bool) -> Vec<OutputRecord> {
        self.outputs
            .read()
            .map(|outputs| outputs.iter().filter(|item| filter(item)).cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for InMemoryOutputStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl OutputStore for InMemoryOutputStore {
    async fn list_enabled_outputs(
        &self,
        instrument_id: &str,
    ) -> Result<Vec<OutputRecord>, StorageError> {
        Ok(self.filtered(|item| item.instrument_id == instrument_id && item.enabled))
    }

    async fn list_outputs(&self, instrument_id: &str) -> Result<Vec<OutputRecord>, StorageError> {
        Ok(self.filtered(|item| item.instrument_id == instrument_id))
    }
}
