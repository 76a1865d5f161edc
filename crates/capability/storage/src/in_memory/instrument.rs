//! 仪器内存存储实现

use crate::error::StorageError;
use crate::models::InstrumentRecord;
use crate::traits::InstrumentStore;
use std::collections::HashMap;
use std::sync::RwLock;

/// 仪器内存存储
///
/// 使用 RwLock + HashMap 提供线程安全的内存存储。
pub struct InMemoryInstrumentStore {
    instruments: RwLock<HashMap<String, InstrumentRecord>>,
}

impl InMemoryInstrumentStore {
    pub fn new() -> Self {
        Self {
            instruments: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_records(records: Vec<InstrumentRecord>) -> Result<Self, StorageError> {
        let store = Self::new();
        for record in records {
            store.insert_instrument(record)?;
        }
        Ok(store)
    }

    /// 写入仪器；id 重复时报错。
    pub fn insert_instrument(&self, record: InstrumentRecord) -> Result<(), StorageError> {
        let mut map = self
            .instruments
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&record.instrument_id) {
            return Err(StorageError::new(format!(
                "instrument exists: {}",
                record.instrument_id
            )));
        }
        map.insert(record.instrument_id.clone(), record);
        Ok(())
    }
}

impl Default for InMemoryInstrumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl InstrumentStore for InMemoryInstrumentStore {
    async fn list_instruments(&self) -> Result<Vec<InstrumentRecord>, StorageError> {
        let mut items: Vec<InstrumentRecord> = self
            .instruments
            .read()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default();
        items.sort_by(|a, b| a.instrument_id.cmp(&b.instrument_id));
        Ok(items)
    }

    async fn find_instrument(
        &self,
        instrument_id: &str,
    ) -> Result<Option<InstrumentRecord>, StorageError> {
        let item = self
            .instruments
            .read()
            .ok()
            .and_then(|map| map.get(instrument_id).cloned());
        Ok(item)
    }
}
