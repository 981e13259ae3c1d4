use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio_postgres::{ types::Type, Row };
use crate::db::{ DbPool, DbQueryError };
use crate::types::ledger::Validator;

/// Persistence primitives used by the indexer. Writes are conflict-safe, none of them carry business logic.
#[async_trait]
pub trait LedgerStore: Send + Sync {
  /// Insert-or-ignore by address.
  async fn upsert_validator(&self, address: &str) -> Result<(), DbQueryError>;
  /// Insert-or-ignore by block number.
  async fn insert_block_log(&self, block_number: u64, validator: &str, timestamp: NaiveDateTime) -> Result<(), DbQueryError>;
  async fn latest_block_log(&self) -> Result<Option<u64>, DbQueryError>;
  async fn block_count_for(&self, address: &str) -> Result<i64, DbQueryError>;
  async fn all_validators(&self) -> Result<Vec<Validator>, DbQueryError>;
  async fn update_validator_stats(
    &self,
    address: &str,
    total_blocks: i64,
    missed_blocks: i64,
    uptime_pct: f64
  ) -> Result<(), DbQueryError>;
}

pub const VALIDATOR_COLUMNS: &str = "address, total_blocks, missed_blocks, uptime_percentage, created_at";

pub fn validator_from_row(row: &Row) -> Validator {
  Validator {
    address: row.get(0),
    total_blocks: row.get(1),
    missed_blocks: row.get(2),
    uptime_percentage: row.get(3),
    created_at: row.get(4),
  }
}

fn to_bigint(n: u64) -> Result<i64, DbQueryError> {
  i64::try_from(n).map_err(|_| DbQueryError::new(format!("Block number {} does not fit in BIGINT", n)))
}

#[async_trait]
impl LedgerStore for DbPool {
  async fn upsert_validator(&self, address: &str) -> Result<(), DbQueryError> {
    let address = address.to_lowercase();
    self.query(
      "INSERT INTO validators(address) VALUES ($1) ON CONFLICT (address) DO NOTHING;",
      &[(&address, Type::VARCHAR)]
    ).await?;
    Ok(())
  }

  async fn insert_block_log(&self, block_number: u64, validator: &str, timestamp: NaiveDateTime) -> Result<(), DbQueryError> {
    let validator = validator.to_lowercase();
    let block_number = to_bigint(block_number)?;
    self.query(
      "INSERT INTO block_logs(block_number, validator, timestamp) VALUES ($1,$2,$3) ON CONFLICT (block_number) DO NOTHING;",
      &[
        (&block_number, Type::INT8),
        (&validator, Type::VARCHAR),
        (&timestamp, Type::TIMESTAMP),
      ]
    ).await?;
    Ok(())
  }

  async fn latest_block_log(&self) -> Result<Option<u64>, DbQueryError> {
    let rows = self.query("SELECT block_number FROM block_logs ORDER BY block_number DESC LIMIT 1;", &[]).await?;
    match rows.first() {
      Some(row) => {
        let n: i64 = row.get(0);
        u64::try_from(n).map(Some).map_err(|_| DbQueryError::new(format!("Negative block number {} in block_logs", n)))
      }
      None => Ok(None),
    }
  }

  async fn block_count_for(&self, address: &str) -> Result<i64, DbQueryError> {
    let address = address.to_lowercase();
    let rows = self.query(
      "SELECT COUNT(*) FROM block_logs WHERE validator = $1;",
      &[(&address, Type::VARCHAR)]
    ).await?;
    Ok(rows.first().map(|r| r.get::<usize, i64>(0)).unwrap_or(0))
  }

  async fn all_validators(&self) -> Result<Vec<Validator>, DbQueryError> {
    let rows = self.query(
      format!("SELECT {} FROM validators ORDER BY total_blocks DESC;", VALIDATOR_COLUMNS).as_str(),
      &[]
    ).await?;
    Ok(rows.iter().map(validator_from_row).collect())
  }

  async fn update_validator_stats(
    &self,
    address: &str,
    total_blocks: i64,
    missed_blocks: i64,
    uptime_pct: f64
  ) -> Result<(), DbQueryError> {
    let address = address.to_lowercase();
    self.query(
      "UPDATE validators SET total_blocks=$2, missed_blocks=$3, uptime_percentage=$4 WHERE address=$1;",
      &[
        (&address, Type::VARCHAR),
        (&total_blocks, Type::INT8),
        (&missed_blocks, Type::INT8),
        (&uptime_pct, Type::FLOAT8),
      ]
    ).await?;
    Ok(())
  }
}
