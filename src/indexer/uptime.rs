use log::info;
use crate::db::DbQueryError;
use crate::store::LedgerStore;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UptimeStats {
  pub total_blocks: i64,
  pub missed_blocks: i64,
  pub uptime_percentage: f64,
}

pub fn signed(v: u64) -> i64 {
  i64::try_from(v).unwrap_or(i64::MAX)
}

/// Size of the indexed window, never below 1. `index_start_block` may be negative.
pub fn total_indexed_blocks(last_processed_block: u64, index_start_block: i64) -> u64 {
  let window = signed(last_processed_block).saturating_sub(index_start_block).max(1);
  u64::try_from(window).unwrap_or(1)
}

/// Equal-share expectation: every validator is assumed to produce the same number of blocks.
pub fn expected_blocks_per_validator(total_indexed: u64, validator_count: usize) -> i64 {
  if validator_count == 0 {
    return 1;
  }
  let share = total_indexed / (validator_count as u64);
  i64::try_from(share).unwrap_or(i64::MAX).max(1)
}

pub fn round_2dp(v: f64) -> f64 {
  (v * 100.0).round() / 100.0
}

pub fn compute_stats(produced_blocks: i64, expected_blocks: i64) -> UptimeStats {
  let produced_blocks = produced_blocks.max(0);
  let expected_blocks = expected_blocks.max(1);
  let missed_blocks = (expected_blocks - produced_blocks).max(0);
  let uptime = ((produced_blocks as f64) / (expected_blocks as f64)) * 100.0;
  UptimeStats {
    total_blocks: produced_blocks,
    missed_blocks,
    uptime_percentage: round_2dp(uptime.min(100.0)),
  }
}

/// Full recomputation of every validator's stats from current block counts.
/// Returns the number of validators written, zero when none are known.
pub async fn recompute<S: LedgerStore + ?Sized>(
  store: &S,
  last_processed_block: u64,
  index_start_block: i64
) -> Result<usize, DbQueryError> {
  let validators = store.all_validators().await?;
  if validators.is_empty() {
    return Ok(0);
  }
  let total_indexed = total_indexed_blocks(last_processed_block, index_start_block);
  let expected = expected_blocks_per_validator(total_indexed, validators.len());
  for v in validators.iter() {
    let produced = store.block_count_for(&v.address).await?;
    let stats = compute_stats(produced, expected);
    store.update_validator_stats(&v.address, stats.total_blocks, stats.missed_blocks, stats.uptime_percentage).await?;
  }
  info!("Updated uptime stats for {} validators (indexed range: {} blocks)", validators.len(), total_indexed);
  Ok(validators.len())
}
