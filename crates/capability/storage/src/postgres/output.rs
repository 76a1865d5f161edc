//! Postgres 输出配置存储实现

use super::parse_json_column;
use crate::error::StorageError;
use crate::models::OutputRecord;
use crate::traits::OutputStore;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

pub struct PgOutputStore {
    pub pool: PgPool,
}

impl PgOutputStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

fn output_from_row(row: &PgRow) -> Result<OutputRecord, StorageError> {
    let output_id: String = row.try_get("output_id")?;
    let config = parse_json_column("config", &output_id, row.try_get("config")?);
    Ok(OutputRecord {
        output_id,
        instrument_id: row.try_get("instrument_id")?,
        enabled: row.try_get("enabled")?,
        output_type: row.try_get("output_type")?,
        config,
    })
}

#[async_trait::async_trait]
impl OutputStore for PgOutputStore {
    async fn list_enabled_outputs(
        &self,
        instrument_id: &str,
    ) -> Result<Vec<OutputRecord>, StorageError> {
        let rows = sqlx::query(
            "select output_id, instrument_id, enabled, output_type, config \
             from outputs where instrument_id = $1 and enabled = true \
             order by created_at, output_id",
        )
        .bind(instrument_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(output_from_row).collect()
    }

    async fn list_outputs(&self, instrument_id: &str) -> Result<Vec<OutputRecord>, StorageError> {
        let rows = sqlx::query(
            "select output_id, instrument_id, enabled, output_type, config \
             from outputs where instrument_id = $1 \
             order by created_at, output_id",
        )
        .bind(instrument_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(output_from_row).collect()
    }
}
