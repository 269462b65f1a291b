//! Neo JSON-RPC client
//!
//! Purpose:
//!     `NeoNode` and `QuickSyncIndex` over a Neo 2 node's JSON-RPC:
//!     getblockcount, getblock (verbose), getapplicationlog and the
//!     event-tracker plugin's getswapblocks.
//!
//! Notes:
//!     - Parsing is split into pure functions so it can be tested on JSON
//!     - Only `transfer` notifications from executions that did not FAULT
//!       are reported from application logs

use super::node::NeoNode;
use super::types::{
    ApplicationLogEntry, NeoBlock, NeoTransaction, NeoTxKind, TxAttribute, TxOutput, UInt160,
    UInt256, Witness, ATTRIBUTE_DESCRIPTION,
};
use crate::crawler::QuickSyncIndex;
use crate::error::FetchError;
use alloy::primitives::{B256, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// "transfer" as pushed by NEP5 contracts
const TRANSFER_EVENT: &[u8] = b"transfer";

/// Node error code for heights it does not have
const UNKNOWN_BLOCK_CODE: i64 = -100;

#[derive(Clone, Debug)]
pub struct NeoRpcClient {
    http_client: reqwest::Client,
    rpc_url: String,
    request_id: Arc<AtomicU64>,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl NeoRpcClient {
    pub fn new(rpc_url: impl Into<String>) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Rpc(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            http_client,
            rpc_url: rpc_url.into(),
            request_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Raw call. `Ok(Err(..))` carries a JSON-RPC level error.
    async fn call(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Result<Value, JsonRpcError>, FetchError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.request_id.fetch_add(1, Ordering::SeqCst),
        };

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| FetchError::Rpc(format!("{}: {}", method, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Rpc(format!("{}: HTTP {}", method, status)));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(format!("{}: {}", method, e)))?;

        match (body.result, body.error) {
            (_, Some(error)) => Ok(Err(error)),
            (Some(result), None) => Ok(Ok(result)),
            (None, None) => Err(FetchError::Malformed(format!("{}: empty response", method))),
        }
    }

    async fn call_ok(&self, method: &str, params: Vec<Value>) -> Result<Value, FetchError> {
        self.call(method, params).await?.map_err(|e| {
            FetchError::Rpc(format!("{} failed ({}): {}", method, e.code, e.message))
        })
    }
}

#[async_trait]
impl NeoNode for NeoRpcClient {
    async fn block_count(&self) -> Result<u64, FetchError> {
        let value = self.call_ok("getblockcount", vec![]).await?;
        value
            .as_u64()
            .ok_or_else(|| FetchError::Malformed(format!("getblockcount returned {}", value)))
    }

    async fn block(&self, height: u64) -> Result<Option<NeoBlock>, FetchError> {
        match self.call("getblock", vec![json!(height), json!(1)]).await? {
            Ok(value) => parse_block(value).map(Some),
            Err(error) if error.code == UNKNOWN_BLOCK_CODE => {
                debug!("Neo node does not have block {} yet", height);
                Ok(None)
            }
            Err(error) => Err(FetchError::Rpc(format!(
                "getblock {} failed ({}): {}",
                height, error.code, error.message
            ))),
        }
    }

    async fn application_log(
        &self,
        hash: &UInt256,
    ) -> Result<Vec<ApplicationLogEntry>, FetchError> {
        let value = self
            .call_ok("getapplicationlog", vec![json!(hash.to_string())])
            .await?;
        parse_application_log(value)
    }
}

#[async_trait]
impl QuickSyncIndex for NeoRpcClient {
    async fn swap_blocks(
        &self,
        contract: &str,
        address: &str,
        from_height: u64,
    ) -> Result<BTreeMap<B256, u64>, FetchError> {
        let value = self
            .call_ok(
                "getswapblocks",
                vec![json!(contract), json!(address), json!(from_height.to_string())],
            )
            .await?;
        parse_swap_blocks(value)
    }
}

// ── Response parsing ──

#[derive(Debug, Deserialize)]
struct RpcBlock {
    hash: String,
    index: u64,
    #[serde(default)]
    tx: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcTransaction {
    txid: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    attributes: Vec<RpcAttribute>,
    #[serde(default)]
    vout: Vec<RpcOutput>,
    #[serde(default)]
    scripts: Vec<RpcWitness>,
    #[serde(default)]
    script: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcAttribute {
    usage: Value,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct RpcOutput {
    asset: String,
    value: Value,
    address: String,
}

#[derive(Debug, Deserialize)]
struct RpcWitness {
    invocation: String,
    verification: String,
}

#[derive(Debug, Deserialize)]
struct RpcApplicationLog {
    #[serde(default)]
    executions: Vec<RpcExecution>,
}

#[derive(Debug, Deserialize)]
struct RpcExecution {
    #[serde(default)]
    vmstate: String,
    #[serde(default)]
    notifications: Vec<RpcNotification>,
}

#[derive(Debug, Deserialize)]
struct RpcNotification {
    contract: String,
    state: RpcStackItem,
}

#[derive(Debug, Deserialize)]
struct RpcStackItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: Value,
}

fn malformed(what: impl std::fmt::Display) -> FetchError {
    FetchError::Malformed(what.to_string())
}

fn decode_hex(text: &str, field: &str) -> Result<Vec<u8>, FetchError> {
    let text = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(text).map_err(|e| malformed(format!("{} is not hex: {}", field, e)))
}

fn attribute_usage(usage: &Value) -> u8 {
    match usage {
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()).unwrap_or(0xff),
        Value::String(name) => match name.as_str() {
            "ContractHash" => 0x00,
            "Script" => 0x20,
            "Vote" => 0x30,
            "DescriptionUrl" => 0x81,
            "Description" => ATTRIBUTE_DESCRIPTION,
            "Remark" => 0xf0,
            _ => 0xff,
        },
        _ => 0xff,
    }
}

fn parse_transaction(tx: RpcTransaction) -> Result<NeoTransaction, FetchError> {
    let hash = UInt256::from_display_hex(&tx.txid)
        .ok_or_else(|| malformed(format!("bad txid {}", tx.txid)))?;

    let attributes = tx
        .attributes
        .iter()
        .map(|a| {
            Ok(TxAttribute {
                usage: attribute_usage(&a.usage),
                data: decode_hex(&a.data, "attribute data")?,
            })
        })
        .collect::<Result<Vec<_>, FetchError>>()?;

    let outputs = tx
        .vout
        .iter()
        .map(|o| {
            let value = match &o.value {
                Value::String(s) => Decimal::from_str(s),
                other => Decimal::from_str(&other.to_string()),
            }
            .map_err(|e| malformed(format!("output value {}: {}", o.value, e)))?;
            Ok(TxOutput {
                asset_id: UInt256::from_display_hex(&o.asset)
                    .ok_or_else(|| malformed(format!("bad asset id {}", o.asset)))?,
                value,
                script_hash: UInt160::from_address(&o.address)
                    .ok_or_else(|| malformed(format!("bad output address {}", o.address)))?,
            })
        })
        .collect::<Result<Vec<_>, FetchError>>()?;

    let witnesses = tx
        .scripts
        .iter()
        .map(|w| {
            Ok(Witness {
                invocation_script: decode_hex(&w.invocation, "invocation script")?,
                verification_script: decode_hex(&w.verification, "verification script")?,
            })
        })
        .collect::<Result<Vec<_>, FetchError>>()?;

    let script = tx
        .script
        .as_deref()
        .map(|s| decode_hex(s, "script"))
        .transpose()?;

    Ok(NeoTransaction {
        hash,
        kind: NeoTxKind::from_rpc_name(&tx.kind),
        witnesses,
        attributes,
        outputs,
        script,
    })
}

/// Parse a verbose `getblock` result
pub fn parse_block(value: Value) -> Result<NeoBlock, FetchError> {
    let block: RpcBlock = serde_json::from_value(value).map_err(malformed)?;
    let hash = UInt256::from_display_hex(&block.hash)
        .ok_or_else(|| malformed(format!("bad block hash {}", block.hash)))?;
    // one unreadable transaction must not stall the whole height
    let transactions = block
        .tx
        .into_iter()
        .filter_map(|raw| {
            match serde_json::from_value::<RpcTransaction>(raw)
                .map_err(malformed)
                .and_then(parse_transaction)
            {
                Ok(tx) => Some(tx),
                Err(e) => {
                    warn!("Neo block {}: skipping transaction: {}", block.index, e);
                    None
                }
            }
        })
        .collect();

    Ok(NeoBlock {
        height: block.index,
        hash,
        transactions,
    })
}

fn stack_bytes(item: &RpcStackItem) -> Option<Vec<u8>> {
    match item.kind.as_str() {
        "ByteArray" => hex::decode(item.value.as_str()?).ok(),
        _ => None,
    }
}

fn stack_amount(item: &RpcStackItem) -> Option<U256> {
    match item.kind.as_str() {
        "ByteArray" => U256::try_from_le_slice(&hex::decode(item.value.as_str()?).ok()?),
        "Integer" => match &item.value {
            Value::String(s) => U256::from_str_radix(s, 10).ok(),
            Value::Number(n) => n.as_u64().map(U256::from),
            _ => None,
        },
        _ => None,
    }
}

/// Parse a `getapplicationlog` result into transfer notifications
pub fn parse_application_log(value: Value) -> Result<Vec<ApplicationLogEntry>, FetchError> {
    let log: RpcApplicationLog = serde_json::from_value(value).map_err(malformed)?;
    let mut entries = Vec::new();

    for execution in log.executions.iter().filter(|e| !e.vmstate.contains("FAULT")) {
        for notification in &execution.notifications {
            if notification.state.kind != "Array" {
                continue;
            }
            let items: Vec<RpcStackItem> =
                serde_json::from_value(notification.state.value.clone()).map_err(malformed)?;
            let [event, from, to, amount] = items.as_slice() else {
                continue;
            };
            if stack_bytes(event).as_deref() != Some(TRANSFER_EVENT) {
                continue;
            }
            let amount = stack_amount(amount)
                .ok_or_else(|| malformed(format!("transfer amount {:?}", amount.value)))?;

            entries.push(ApplicationLogEntry {
                contract: notification.contract.clone(),
                source: stack_bytes(from).and_then(|b| UInt160::from_slice(&b)),
                target: stack_bytes(to).and_then(|b| UInt160::from_slice(&b)),
                amount,
            });
        }
    }
    Ok(entries)
}

/// Parse the quick-sync index result: `{ "<tx hash>": "<height>", ... }`
pub fn parse_swap_blocks(value: Value) -> Result<BTreeMap<B256, u64>, FetchError> {
    let object = value
        .as_object()
        .ok_or_else(|| malformed("getswapblocks did not return an object"))?;

    object
        .iter()
        .map(|(hash, height)| {
            let hash = UInt256::from_display_hex(hash)
                .ok_or_else(|| malformed(format!("bad swap hash {}", hash)))?
                .to_b256();
            let height = match height {
                Value::String(s) => s.parse::<u64>().ok(),
                Value::Number(n) => n.as_u64(),
                _ => None,
            }
            .ok_or_else(|| malformed(format!("bad swap height {}", height)))?;
            Ok((hash, height))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bridge_address() -> String {
        UInt160([0xaa; 20]).to_address()
    }

    #[test]
    fn test_parse_block() {
        let block = json!({
            "hash": "0x3d1e1b1b1e4b22c6a5d4a3cf0e5e52ab4ff4a3c3ae7c2d8b35f1fe62d1e2b0aa",
            "index": 4261050,
            "tx": [
                {
                    "txid": "0x0101010101010101010101010101010101010101010101010101010101010101",
                    "type": "MinerTransaction",
                    "vout": [],
                    "scripts": []
                },
                {
                    "txid": "0x0202020202020202020202020202020202020202020202020202020202020202",
                    "type": "ContractTransaction",
                    "attributes": [{ "usage": "Description", "data": "50616263" }],
                    "vout": [{
                        "n": 0,
                        "asset": "0x602c79718b16e442de58778e148d0b1084e3b2dffd5de6b7b16cee7969282de7",
                        "value": "12.5",
                        "address": bridge_address()
                    }],
                    "scripts": [{ "invocation": "40aa", "verification": "21ac" }]
                }
            ]
        });

        let block = parse_block(block).unwrap();
        assert_eq!(block.height, 4_261_050);
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0].kind, NeoTxKind::Other);

        let tx = &block.transactions[1];
        assert_eq!(tx.kind, NeoTxKind::Contract);
        assert_eq!(tx.attributes[0].usage, ATTRIBUTE_DESCRIPTION);
        assert_eq!(tx.attributes[0].data, b"Pabc".to_vec());
        assert_eq!(tx.outputs[0].value, dec!(12.5));
        assert_eq!(tx.outputs[0].script_hash, UInt160([0xaa; 20]));
        assert_eq!(tx.witnesses[0].verification_script, vec![0x21, 0xac]);
        assert!(tx.script.is_none());
    }

    #[test]
    fn test_parse_block_rejects_bad_hex() {
        let block = json!({
            "hash": "0xzz",
            "index": 1,
            "tx": []
        });
        assert!(matches!(parse_block(block), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn test_parse_block_skips_unreadable_transaction() {
        let block = json!({
            "hash": "0x3d1e1b1b1e4b22c6a5d4a3cf0e5e52ab4ff4a3c3ae7c2d8b35f1fe62d1e2b0aa",
            "index": 7,
            "tx": [
                { "txid": "0xnothex", "type": "ContractTransaction" },
                { "type": "ContractTransaction" },
                {
                    "txid": "0x0303030303030303030303030303030303030303030303030303030303030303",
                    "type": "ContractTransaction",
                    "vout": [{ "asset": "0x00", "value": "1", "address": bridge_address() }]
                },
                {
                    "txid": "0x0404040404040404040404040404040404040404040404040404040404040404",
                    "type": "InvocationTransaction",
                    "script": "00c1"
                }
            ]
        });

        let block = parse_block(block).unwrap();
        assert_eq!(block.height, 7);
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.transactions[0].kind, NeoTxKind::Invocation);
        assert_eq!(block.transactions[0].script, Some(vec![0x00, 0xc1]));
    }

    #[test]
    fn test_parse_application_log() {
        let from = hex::encode([0x05u8; 20]);
        let to = hex::encode([0xaau8; 20]);
        let log = json!({
            "txid": "0x0303030303030303030303030303030303030303030303030303030303030303",
            "executions": [
                {
                    "trigger": "Application",
                    "vmstate": "HALT, BREAK",
                    "notifications": [
                        {
                            "contract": "0xed07cffad18f1308db51920d99a2af60ac66a7b3",
                            "state": { "type": "Array", "value": [
                                { "type": "ByteArray", "value": "7472616e73666572" },
                                { "type": "ByteArray", "value": from },
                                { "type": "ByteArray", "value": to },
                                { "type": "ByteArray", "value": "00e1f505" }
                            ]}
                        },
                        {
                            "contract": "0xed07cffad18f1308db51920d99a2af60ac66a7b3",
                            "state": { "type": "Array", "value": [
                                { "type": "ByteArray", "value": "617070726f7665" },
                                { "type": "ByteArray", "value": from },
                                { "type": "ByteArray", "value": to },
                                { "type": "Integer", "value": "1" }
                            ]}
                        }
                    ]
                },
                {
                    "trigger": "Application",
                    "vmstate": "FAULT",
                    "notifications": [{
                        "contract": "0xed07cffad18f1308db51920d99a2af60ac66a7b3",
                        "state": { "type": "Array", "value": [
                            { "type": "ByteArray", "value": "7472616e73666572" },
                            { "type": "ByteArray", "value": from },
                            { "type": "ByteArray", "value": to },
                            { "type": "Integer", "value": "7" }
                        ]}
                    }]
                }
            ]
        });

        let entries = parse_application_log(log).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, U256::from(100_000_000u64));
        assert_eq!(entries[0].source, Some(UInt160([0x05; 20])));
        assert_eq!(entries[0].target, Some(UInt160([0xaa; 20])));
        assert_eq!(entries[0].contract, "0xed07cffad18f1308db51920d99a2af60ac66a7b3");
    }

    #[test]
    fn test_mint_has_no_source() {
        let log = json!({
            "executions": [{
                "vmstate": "HALT",
                "notifications": [{
                    "contract": "0xed07cffad18f1308db51920d99a2af60ac66a7b3",
                    "state": { "type": "Array", "value": [
                        { "type": "ByteArray", "value": "7472616e73666572" },
                        { "type": "ByteArray", "value": "" },
                        { "type": "ByteArray", "value": hex::encode([1u8; 20]) },
                        { "type": "Integer", "value": "42" }
                    ]}
                }]
            }]
        });
        let entries = parse_application_log(log).unwrap();
        assert_eq!(entries[0].source, None);
        assert_eq!(entries[0].amount, U256::from(42u64));
    }

    #[test]
    fn test_parse_swap_blocks() {
        let value = json!({
            "0x0000000000000000000000000000000000000000000000000000000000000abc": "4261100",
            "0x0000000000000000000000000000000000000000000000000000000000000def": 4261050
        });
        let index = parse_swap_blocks(value).unwrap();
        let heights: Vec<u64> = index.values().copied().collect();
        assert_eq!(index.len(), 2);
        assert!(heights.contains(&4_261_100));
        assert!(heights.contains(&4_261_050));

        assert!(parse_swap_blocks(json!([])).is_err());
        assert!(parse_swap_blocks(json!({ "0x01": "x" })).is_err());
    }

    #[test]
    fn test_client_keeps_url() {
        let client = NeoRpcClient::new("http://localhost:10332").unwrap();
        assert_eq!(client.rpc_url(), "http://localhost:10332");
    }
}
