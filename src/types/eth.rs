use serde::{ Serialize, Deserialize };
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct JsonRpcReq<'a> {
  pub jsonrpc: &'a str,
  pub id: u64,
  pub method: &'a str,
  pub params: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResp {
  pub id: Option<Value>,
  pub jsonrpc: String,
  pub result: Option<Value>,
  pub error: Option<JsonRpcErr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErr {
  pub code: i64,
  pub message: String,
}

/// Header fields of `eth_getBlockByNumber`. Everything else in the block is ignored.
#[derive(Clone, Debug, Deserialize)]
pub struct RpcBlock {
  pub miner: Option<String>,
  pub timestamp: String,
}

/// Parses a `0x`-prefixed hex quantity.
pub fn parse_quantity(q: &str) -> Option<u64> {
  let digits = q.strip_prefix("0x").or_else(|| q.strip_prefix("0X"))?;
  if digits.is_empty() {
    return None;
  }
  u64::from_str_radix(digits, 16).ok()
}

pub fn to_quantity(n: u64) -> String {
  format!("0x{:x}", n)
}
