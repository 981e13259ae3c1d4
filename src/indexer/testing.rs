//! In-memory chain and ledger used by the indexer tests.

use async_trait::async_trait;
use chrono::{ NaiveDateTime, Utc };
use tokio::sync::Notify;
use std::{
  collections::{ BTreeMap, HashMap, HashSet },
  ops::RangeInclusive,
  sync::{ atomic::{ AtomicBool, AtomicU64, AtomicUsize, Ordering }, Arc, Mutex },
};
use crate::{ chain::{ ChainError, ChainReader }, db::DbQueryError, store::LedgerStore, types::ledger::{ ChainBlock, Validator } };

#[derive(Clone, Default)]
pub struct FakeChain {
  inner: Arc<FakeChainInner>,
}

#[derive(Default)]
struct FakeChainInner {
  head: AtomicU64,
  blocks: Mutex<HashMap<u64, ChainBlock>>,
  failing: Mutex<HashSet<u64>>,
  unreachable: AtomicBool,
  paused: AtomicBool,
  gate: Notify,
  height_calls: AtomicUsize,
  block_calls: AtomicUsize,
}

impl FakeChain {
  pub fn with_head(head: u64) -> FakeChain {
    let chain = FakeChain::default();
    chain.set_head(head);
    chain
  }

  pub fn set_head(&self, head: u64) {
    self.inner.head.store(head, Ordering::SeqCst);
  }

  pub fn produce(&self, num: u64, producer: &str) {
    self.inner.blocks
      .lock()
      .unwrap()
      .insert(num, ChainBlock { producer: Some(producer.to_string()), timestamp_secs: 1_700_000_000 + (num as i64) * 2 });
  }

  pub fn produce_range(&self, nums: RangeInclusive<u64>, producer: &str) {
    for n in nums {
      self.produce(n, producer);
    }
  }

  pub fn produce_without_miner(&self, num: u64) {
    self.inner.blocks.lock().unwrap().insert(num, ChainBlock { producer: None, timestamp_secs: 1_700_000_000 });
  }

  pub fn fail_block(&self, num: u64) {
    self.inner.failing.lock().unwrap().insert(num);
  }

  pub fn set_unreachable(&self, unreachable: bool) {
    self.inner.unreachable.store(unreachable, Ordering::SeqCst);
  }

  /// Holds every `current_height` call until `resume`.
  pub fn pause(&self) {
    self.inner.paused.store(true, Ordering::SeqCst);
  }

  pub fn resume(&self) {
    self.inner.paused.store(false, Ordering::SeqCst);
    self.inner.gate.notify_one();
  }

  pub fn height_calls(&self) -> usize {
    self.inner.height_calls.load(Ordering::SeqCst)
  }

  pub fn block_calls(&self) -> usize {
    self.inner.block_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ChainReader for FakeChain {
  async fn current_height(&self) -> Result<u64, ChainError> {
    self.inner.height_calls.fetch_add(1, Ordering::SeqCst);
    if self.inner.paused.load(Ordering::SeqCst) {
      self.inner.gate.notified().await;
    }
    if self.inner.unreachable.load(Ordering::SeqCst) {
      return Err(ChainError::new("connection refused"));
    }
    Ok(self.inner.head.load(Ordering::SeqCst))
  }

  async fn block_at(&self, number: u64) -> Result<Option<ChainBlock>, ChainError> {
    self.inner.block_calls.fetch_add(1, Ordering::SeqCst);
    if self.inner.unreachable.load(Ordering::SeqCst) || self.inner.failing.lock().unwrap().contains(&number) {
      return Err(ChainError::new(format!("eth_getBlockByNumber {} timed out", number)));
    }
    Ok(self.inner.blocks.lock().unwrap().get(&number).cloned())
  }
}

#[derive(Clone, Default)]
pub struct FakeStore {
  inner: Arc<FakeStoreInner>,
}

#[derive(Default)]
struct FakeStoreInner {
  validators: Mutex<BTreeMap<String, Validator>>,
  logs: Mutex<BTreeMap<u64, (String, NaiveDateTime)>>,
  failing_inserts: Mutex<HashSet<u64>>,
  writes: AtomicUsize,
}

impl FakeStore {
  /// Inserts a log row and its validator without counting as a write.
  pub fn seed_log(&self, num: u64, validator: &str) {
    self.insert_validator(validator);
    self.inner.logs.lock().unwrap().insert(num, (validator.to_lowercase(), Utc::now().naive_utc()));
  }

  pub fn fail_insert_at(&self, num: u64) {
    self.inner.failing_inserts.lock().unwrap().insert(num);
  }

  pub fn has_log(&self, num: u64) -> bool {
    self.inner.logs.lock().unwrap().contains_key(&num)
  }

  pub fn log_len(&self) -> usize {
    self.inner.logs.lock().unwrap().len()
  }

  pub fn validator(&self, address: &str) -> Option<Validator> {
    self.inner.validators.lock().unwrap().get(&address.to_lowercase()).cloned()
  }

  pub fn validator_count(&self) -> usize {
    self.inner.validators.lock().unwrap().len()
  }

  pub fn validators_sorted(&self) -> Vec<Validator> {
    self.inner.validators.lock().unwrap().values().cloned().collect()
  }

  pub fn write_count(&self) -> usize {
    self.inner.writes.load(Ordering::SeqCst)
  }

  fn insert_validator(&self, address: &str) {
    self.inner.validators
      .lock()
      .unwrap()
      .entry(address.to_lowercase())
      .or_insert_with(|| Validator {
        address: address.to_lowercase(),
        total_blocks: 0,
        missed_blocks: 0,
        uptime_percentage: 0.0,
        created_at: Utc::now().naive_utc(),
      });
  }
}

#[async_trait]
impl LedgerStore for FakeStore {
  async fn upsert_validator(&self, address: &str) -> Result<(), DbQueryError> {
    self.inner.writes.fetch_add(1, Ordering::SeqCst);
    self.insert_validator(address);
    Ok(())
  }

  async fn insert_block_log(&self, block_number: u64, validator: &str, timestamp: NaiveDateTime) -> Result<(), DbQueryError> {
    self.inner.writes.fetch_add(1, Ordering::SeqCst);
    if self.inner.failing_inserts.lock().unwrap().contains(&block_number) {
      return Err(DbQueryError::new("deadlock detected"));
    }
    let validator = validator.to_lowercase();
    if !self.inner.validators.lock().unwrap().contains_key(&validator) {
      return Err(DbQueryError::new("violates foreign key constraint"));
    }
    self.inner.logs.lock().unwrap().entry(block_number).or_insert((validator, timestamp));
    Ok(())
  }

  async fn latest_block_log(&self) -> Result<Option<u64>, DbQueryError> {
    Ok(self.inner.logs.lock().unwrap().keys().next_back().copied())
  }

  async fn block_count_for(&self, address: &str) -> Result<i64, DbQueryError> {
    let address = address.to_lowercase();
    let count = self.inner.logs
      .lock()
      .unwrap()
      .values()
      .filter(|(v, _)| *v == address)
      .count();
    Ok(count as i64)
  }

  async fn all_validators(&self) -> Result<Vec<Validator>, DbQueryError> {
    let mut all = self.validators_sorted();
    all.sort_by(|a, b| b.total_blocks.cmp(&a.total_blocks));
    Ok(all)
  }

  async fn update_validator_stats(
    &self,
    address: &str,
    total_blocks: i64,
    missed_blocks: i64,
    uptime_pct: f64
  ) -> Result<(), DbQueryError> {
    self.inner.writes.fetch_add(1, Ordering::SeqCst);
    if let Some(v) = self.inner.validators.lock().unwrap().get_mut(&address.to_lowercase()) {
      v.total_blocks = total_blocks;
      v.missed_blocks = missed_blocks;
      v.uptime_percentage = uptime_pct;
    }
    Ok(())
  }
}
