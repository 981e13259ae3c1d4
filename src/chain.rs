use async_trait::async_trait;
use derive_more::derive::{ Display, Error };
use serde::de::DeserializeOwned;
use serde_json::{ json, Value };
use reqwest;
use log::debug;
use std::time::Duration;
use crate::types::{ eth::{ parse_quantity, to_quantity, JsonRpcReq, JsonRpcResp, RpcBlock }, ledger::ChainBlock };

#[derive(Debug, Display, Error)]
#[display("{msg}")]
pub struct ChainError {
  pub msg: String,
}

impl ChainError {
  pub fn new(msg: impl Into<String>) -> Self {
    ChainError { msg: msg.into() }
  }
}

/// Read-only view of the remote chain.
#[async_trait]
pub trait ChainReader: Send + Sync {
  async fn current_height(&self) -> Result<u64, ChainError>;

  /// `None` when no block exists at `number` yet (or it was pruned).
  async fn block_at(&self, number: u64) -> Result<Option<ChainBlock>, ChainError>;
}

#[derive(Clone)]
pub struct EthRpc {
  http_client: reqwest::Client,
  url: String,
}

impl EthRpc {
  pub fn init(url: &str, timeout_secs: u64) -> Result<EthRpc, ChainError> {
    let http_client = reqwest::Client
      ::builder()
      .timeout(Duration::from_secs(timeout_secs))
      .build()
      .map_err(|e| ChainError::new(format!("Failed to build rpc client: {}", e)))?;
    Ok(EthRpc { http_client, url: url.to_string() })
  }

  async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>, ChainError> {
    let req = JsonRpcReq { jsonrpc: "2.0", id: 1, method, params };
    let resp = self.http_client
      .post(self.url.as_str())
      .json(&req)
      .send().await
      .map_err(|e| ChainError::new(format!("{} request failed: {}", method, e)))?
      .error_for_status()
      .map_err(|e| ChainError::new(format!("{} returned error status: {}", method, e)))?
      .json::<JsonRpcResp>().await
      .map_err(|e| ChainError::new(format!("{} returned malformed response: {}", method, e)))?;
    if let Some(err) = resp.error {
      return Err(ChainError::new(format!("{} failed with code {}: {}", method, err.code, err.message)));
    }
    match resp.result {
      None | Some(Value::Null) => Ok(None),
      Some(v) =>
        serde_json
          ::from_value::<T>(v)
          .map(Some)
          .map_err(|e| ChainError::new(format!("{} result has unexpected shape: {}", method, e))),
    }
  }
}

/// Maps an RPC header to a `ChainBlock`. An empty `miner` counts as no producer.
pub fn to_chain_block(block: RpcBlock) -> Result<ChainBlock, ChainError> {
  let timestamp_secs = parse_quantity(&block.timestamp).ok_or_else(||
    ChainError::new(format!("Invalid block timestamp {}", block.timestamp))
  )?;
  let timestamp_secs = i64::try_from(timestamp_secs).map_err(|_|
    ChainError::new(format!("Block timestamp {} out of range", block.timestamp))
  )?;
  let producer = block.miner.filter(|m| !m.is_empty());
  Ok(ChainBlock { producer, timestamp_secs })
}

#[async_trait]
impl ChainReader for EthRpc {
  async fn current_height(&self) -> Result<u64, ChainError> {
    let height = self.call::<String>("eth_blockNumber", json!([])).await?;
    let height = height.ok_or_else(|| ChainError::new("eth_blockNumber returned null"))?;
    parse_quantity(&height).ok_or_else(|| ChainError::new(format!("Invalid block number {}", height)))
  }

  async fn block_at(&self, number: u64) -> Result<Option<ChainBlock>, ChainError> {
    let block = self.call::<RpcBlock>("eth_getBlockByNumber", json!([to_quantity(number), false])).await?;
    debug!("Fetched block {} (found: {})", number, block.is_some());
    match block {
      Some(b) => Ok(Some(to_chain_block(b)?)),
      None => Ok(None),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rpc_block(miner: Option<&str>, timestamp: &str) -> RpcBlock {
    RpcBlock { miner: miner.map(String::from), timestamp: String::from(timestamp) }
  }

  #[test]
  fn miner_becomes_producer() {
    let b = to_chain_block(rpc_block(Some("0xAbC0000000000000000000000000000000000001"), "0x10")).unwrap();
    assert_eq!(b.producer.as_deref(), Some("0xAbC0000000000000000000000000000000000001"));
    assert_eq!(b.timestamp_secs, 16);
  }

  #[test]
  fn empty_miner_is_no_producer() {
    assert_eq!(to_chain_block(rpc_block(Some(""), "0x10")).unwrap().producer, None);
    assert_eq!(to_chain_block(rpc_block(None, "0x10")).unwrap().producer, None);
  }

  #[test]
  fn bad_timestamp_is_an_error() {
    assert!(to_chain_block(rpc_block(Some("0x01"), "yesterday")).is_err());
  }

  #[test]
  fn timestamp_beyond_i64_is_an_error() {
    assert!(to_chain_block(rpc_block(Some("0x01"), "0xffffffffffffffff")).is_err());
    assert_eq!(to_chain_block(rpc_block(Some("0x01"), "0x7fffffffffffffff")).unwrap().timestamp_secs, i64::MAX);
  }
}
