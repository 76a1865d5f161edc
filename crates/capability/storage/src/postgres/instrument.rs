//! Postgres 仪器存储实现

use super::parse_json_column;
use crate::error::StorageError;
use crate::models::InstrumentRecord;
use crate::traits::InstrumentStore;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

pub struct PgInstrumentStore {
    pub pool: PgPool,
}

impl PgInstrumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

fn instrument_from_row(row: &PgRow) -> Result<InstrumentRecord, StorageError> {
    let instrument_id: String = row.try_get("instrument_id")?;
    let port_config = parse_json_column("port_config", &instrument_id, row.try_get("port_config")?);
    Ok(InstrumentRecord {
        instrument_id,
        name: row.try_get("name")?,
        instrument_type: row.try_get("instrument_type")?,
        port_config,
    })
}

#[async_trait::async_trait]
impl InstrumentStore for PgInstrumentStore {
    async fn list_instruments(&self) -> Result<Vec<InstrumentRecord>, StorageError> {
        let rows = sqlx::query(
            "select instrument_id, name, instrument_type, port_config \
             from instruments order by instrument_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(instrument_from_row).collect()
    }

    async fn find_instrument(
        &self,
        instrument_id: &str,
    ) -> Result<Option<InstrumentRecord>, StorageError> {
        let row = sqlx::query(
            "select instrument_id, name, instrument_type, port_config \
             from instruments where instrument_id = $1",
        )
        .bind(instrument_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(instrument_from_row(&row)?))
    }
}
