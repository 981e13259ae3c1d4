use chrono::NaiveDateTime;
use serde::{ Serialize, Deserialize };

/// A block as the indexer sees it: who produced it and when.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainBlock {
  pub producer: Option<String>,
  pub timestamp_secs: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Validator {
  pub address: String,
  pub total_blocks: i64,
  pub missed_blocks: i64,
  pub uptime_percentage: f64,
  pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkStats {
  pub total_validators: i64,
  pub avg_uptime: f64,
  pub total_blocks: i64,
  pub total_missed: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexerStatus {
  pub is_running: bool,
  pub last_processed_block: u64,
  pub initialized: bool,
}
