use tokio::{ task::JoinHandle, time::{ interval, Duration, MissedTickBehavior } };
use log::{ debug, info };
use std::sync::Arc;
use crate::{
  chain::ChainReader,
  indexer::blocks::{ BlockIndexer, CycleReport },
  store::LedgerStore,
};

pub const DEFAULT_INTERVAL_SECS: u64 = 120;

/// Periodic trigger for the block indexer: one cycle right away, then one per interval.
#[derive(Clone)]
pub struct Indexer<C, S> {
  block_idxer: Arc<BlockIndexer<C, S>>,
  every: Duration,
}

impl<C, S> Indexer<C, S> where C: ChainReader + 'static, S: LedgerStore + 'static {
  pub fn init(block_idxer: Arc<BlockIndexer<C, S>>, interval_secs: u64) -> Indexer<C, S> {
    return Indexer { block_idxer, every: Duration::from_secs(interval_secs.max(1)) };
  }

  pub fn start(&self) -> JoinHandle<()> {
    let block_idxer = Arc::clone(&self.block_idxer);
    let every = self.every;

    tokio::spawn(async move {
      info!("Begin indexing blocks every {}s", every.as_secs());
      let mut ticker = interval(every);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
      loop {
        ticker.tick().await;
        match block_idxer.run_cycle().await {
          CycleReport::Processed { from, to, indexed, stopped } => {
            debug!("Cycle done: {} blocks indexed in [{}, {}], stopped early: {:?}", indexed, from, to, stopped);
          }
          CycleReport::Failed => debug!("Cycle failed, retrying next tick"),
          _ => (),
        }
      }
    })
  }
}
