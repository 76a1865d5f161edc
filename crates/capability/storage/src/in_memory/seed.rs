//! JSON 种子文件
//!
//! ```json
//! {
//!   "instruments": [{ "instrument_id": "geiger-1", "name": "Lab", "port_config": { "type": "serial", "path": "/dev/ttyUSB0" } }],
//!   "outputs": [{ "output_id": "out-1", "instrument_id": "geiger-1", "output_type": "mqtt", "config": {} }]
//! }
//! ```

use super::{InMemoryInstrumentStore, InMemoryOutputStore};
use crate::error::StorageError;
use crate::models::{InstrumentRecord, OutputRecord};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub instruments: Vec<InstrumentRecord>,
    #[serde(default)]
    pub outputs: Vec<OutputRecord>,
}

impl SeedData {
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(json)?)
    }

    /// 构造内存存储
    pub fn into_stores(self) -> Result<(InMemoryInstrumentStore, InMemoryOutputStore), StorageError> {
        let instruments = InMemoryInstrumentStore::from_records(self.instruments)?;
        let outputs = InMemoryOutputStore::from_records(self.outputs)?;
        Ok((instruments, outputs))
    }
}

/// 读取种子文件
pub fn load_seed(path: impl AsRef<Path>) -> Result<SeedData, StorageError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|err| StorageError::new(format!("read {}: {}", path.display(), err)))?;
    SeedData::from_json(&content)
}
