use chrono::DateTime;
use derive_more::derive::{ Display, Error };
use tokio::sync::Mutex;
use log::{ debug, error, info, warn };
use std::sync::atomic::{ AtomicBool, AtomicU64, Ordering };
use crate::{
  chain::{ ChainError, ChainReader },
  db::DbQueryError,
  indexer::uptime,
  store::LedgerStore,
  types::ledger::IndexerStatus,
};

pub const DEFAULT_BATCH_SIZE: u64 = 10;
pub const DEFAULT_LOOKBACK: u64 = 100;

#[derive(Debug, Display, Error)]
pub enum IndexerError {
  #[display("chain read failed: {_0}")] Chain(ChainError),
  #[display("store query failed: {_0}")] Store(DbQueryError),
}

impl From<ChainError> for IndexerError {
  fn from(e: ChainError) -> Self {
    IndexerError::Chain(e)
  }
}

impl From<DbQueryError> for IndexerError {
  fn from(e: DbQueryError) -> Self {
    IndexerError::Store(e)
  }
}

#[derive(Clone, Copy, Debug)]
pub struct IndexerParams {
  pub batch_size: u64,
  pub lookback: u64,
  pub skip_after_attempts: Option<u32>,
}

impl Default for IndexerParams {
  fn default() -> Self {
    IndexerParams { batch_size: DEFAULT_BATCH_SIZE, lookback: DEFAULT_LOOKBACK, skip_after_attempts: None }
  }
}

/// Why a batch ended before its last block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchStop {
  Skipped(u64),
  Failed(u64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleReport {
  /// Another cycle was in flight.
  Skipped,
  /// Chain head is not ahead of the checkpoint.
  Idle,
  Processed {
    from: u64,
    to: u64,
    indexed: u64,
    stopped: Option<BatchStop>,
  },
  Failed,
}

enum BlockOutcome {
  Indexed,
  Skipped,
}

#[derive(Default)]
struct Checkpoint {
  last_processed_block: u64,
  // Negative when resuming closer to genesis than `lookback`.
  index_start_block: i64,
  initialized: bool,
  // (block number, consecutive skips)
  skip_attempts: Option<(u64, u32)>,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
  fn set(flag: &'a AtomicBool) -> Self {
    flag.store(true, Ordering::SeqCst);
    RunningGuard(flag)
  }
}

impl Drop for RunningGuard<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::SeqCst);
  }
}

/// Walks the chain in bounded batches, attributes each block to its producer
/// and keeps validator uptime stats current. The checkpoint lives in memory
/// and is rebuilt from the block log on restart.
pub struct BlockIndexer<C, S> {
  chain: C,
  store: S,
  params: IndexerParams,
  checkpoint: Mutex<Checkpoint>,
  is_running: AtomicBool,
  last_block: AtomicU64,
  initialized: AtomicBool,
}

impl<C: ChainReader, S: LedgerStore> BlockIndexer<C, S> {
  pub fn init(chain: C, store: S, params: IndexerParams) -> BlockIndexer<C, S> {
    let params = IndexerParams { batch_size: params.batch_size.max(1), ..params };
    BlockIndexer {
      chain,
      store,
      params,
      checkpoint: Mutex::new(Checkpoint::default()),
      is_running: AtomicBool::new(false),
      last_block: AtomicU64::new(0),
      initialized: AtomicBool::new(false),
    }
  }

  /// Resumes from the highest logged block, or starts `lookback` blocks behind the head on a fresh store.
  pub async fn initialize(&self) -> Result<(), IndexerError> {
    let mut cp = self.checkpoint.lock().await;
    self.load_checkpoint(&mut cp).await
  }

  async fn load_checkpoint(&self, cp: &mut Checkpoint) -> Result<(), IndexerError> {
    match self.store.latest_block_log().await? {
      Some(latest) => {
        cp.last_processed_block = latest;
        cp.index_start_block = uptime::signed(latest).saturating_sub(uptime::signed(self.params.lookback));
        info!("Indexer resuming from block {}", latest);
      }
      None => {
        let head = self.chain.current_height().await?;
        cp.last_processed_block = head.saturating_sub(self.params.lookback);
        cp.index_start_block = uptime::signed(cp.last_processed_block);
        info!("Indexer starting fresh from block {}", cp.last_processed_block);
      }
    }
    cp.initialized = true;
    self.last_block.store(cp.last_processed_block, Ordering::SeqCst);
    self.initialized.store(true, Ordering::SeqCst);
    Ok(())
  }

  /// Runs one indexing cycle. Returns immediately if a cycle is already in flight.
  /// Never fails: errors are logged and the next call retries from the same checkpoint.
  pub async fn run_cycle(&self) -> CycleReport {
    let mut cp = match self.checkpoint.try_lock() {
      Ok(cp) => cp,
      Err(_) => {
        debug!("Indexer cycle already running, skipping");
        return CycleReport::Skipped;
      }
    };
    let _running = RunningGuard::set(&self.is_running);
    if !cp.initialized {
      if let Err(e) = self.load_checkpoint(&mut cp).await {
        error!("Indexer initialization failed: {}", e);
        return CycleReport::Failed;
      }
    }
    match self.index_batch(&mut cp).await {
      Ok(report) => report,
      Err(e) => {
        error!("Indexer cycle failed: {}", e);
        CycleReport::Failed
      }
    }
  }

  pub fn status(&self) -> IndexerStatus {
    IndexerStatus {
      is_running: self.is_running.load(Ordering::SeqCst),
      last_processed_block: self.last_block.load(Ordering::SeqCst),
      initialized: self.initialized.load(Ordering::SeqCst),
    }
  }

  async fn index_batch(&self, cp: &mut Checkpoint) -> Result<CycleReport, IndexerError> {
    let head = self.chain.current_height().await?;
    if head <= cp.last_processed_block {
      debug!("No new blocks to process");
      return Ok(CycleReport::Idle);
    }
    let start = cp.last_processed_block + 1;
    let end = head.min(start.saturating_add(self.params.batch_size - 1));
    info!("Indexing blocks {}-{} (latest: {})", start, end, head);

    let mut stopped = None;
    let mut indexed = 0;
    for num in start..=end {
      match self.process_block(num).await {
        Ok(BlockOutcome::Indexed) => {
          self.advance(cp, num);
          indexed += 1;
        }
        Ok(BlockOutcome::Skipped) => {
          if self.is_permanent_gap(cp, num) {
            warn!("Block {} skipped {} times in a row, moving past it", num, cp.skip_attempts.map(|s| s.1).unwrap_or(0));
            self.advance(cp, num);
            continue;
          }
          stopped = Some(BatchStop::Skipped(num));
          break;
        }
        Err(e) => {
          error!("Failed to process block {}: {}", num, e);
          stopped = Some(BatchStop::Failed(num));
          break;
        }
      }
    }

    uptime::recompute(&self.store, cp.last_processed_block, cp.index_start_block).await?;
    Ok(CycleReport::Processed { from: start, to: cp.last_processed_block, indexed, stopped })
  }

  async fn process_block(&self, num: u64) -> Result<BlockOutcome, IndexerError> {
    let block = match self.chain.block_at(num).await? {
      Some(b) => b,
      None => {
        warn!("Block {} not found, skipping", num);
        return Ok(BlockOutcome::Skipped);
      }
    };
    let producer = match block.producer {
      Some(p) => p.to_lowercase(),
      None => {
        warn!("Block {} has no miner field", num);
        return Ok(BlockOutcome::Skipped);
      }
    };
    let block_time = DateTime::from_timestamp(block.timestamp_secs, 0)
      .ok_or_else(|| ChainError::new(format!("Block {} has out of range timestamp {}", num, block.timestamp_secs)))?
      .naive_utc();
    self.store.upsert_validator(&producer).await?;
    self.store.insert_block_log(num, &producer, block_time).await?;
    debug!("Indexed block {} -> validator {}", num, producer);
    Ok(BlockOutcome::Indexed)
  }

  fn advance(&self, cp: &mut Checkpoint, num: u64) {
    if num > cp.last_processed_block {
      cp.last_processed_block = num;
      self.last_block.store(num, Ordering::SeqCst);
    }
    cp.skip_attempts = None;
  }

  fn is_permanent_gap(&self, cp: &mut Checkpoint, num: u64) -> bool {
    let attempts = match cp.skip_attempts {
      Some((n, count)) if n == num => count + 1,
      _ => 1,
    };
    cp.skip_attempts = Some((num, attempts));
    match self.params.skip_after_attempts {
      Some(limit) => attempts >= limit.max(1),
      None => false,
    }
  }
}
