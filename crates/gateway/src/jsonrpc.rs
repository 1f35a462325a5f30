use alloy_primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{GatewayError, RawLog, TxReceipt};

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
            id: Value::from(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
    #[serde(default)]
    pub id: Value,
}

impl JsonRpcResponse {
    /// Splits a response into its result or a typed error for `method`.
    /// A `null` result is a valid answer (e.g. a receipt that is not mined yet).
    pub fn into_result(self, method: &str) -> Result<Value, GatewayError> {
        if let Some(error) = self.error {
            return Err(GatewayError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

pub fn quantity(value: u64) -> String {
    format!("0x{value:x}")
}

pub fn parse_quantity(raw: &str, field: &str) -> Result<u64, String> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| format!("{field} `{raw}` is not a 0x-prefixed quantity"))?;
    if digits.is_empty() {
        return Err(format!("{field} `{raw}` has no digits"));
    }
    u64::from_str_radix(digits, 16).map_err(|error| format!("invalid {field} `{raw}`: {error}"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLog {
    address: Address,
    #[serde(default)]
    topics: Vec<B256>,
    #[serde(default)]
    data: Bytes,
    block_number: Option<String>,
    transaction_hash: Option<B256>,
    log_index: Option<String>,
}

impl WireLog {
    fn into_raw(self) -> Result<RawLog, String> {
        let block_number = self
            .block_number
            .as_deref()
            .map(|raw| parse_quantity(raw, "blockNumber"))
            .transpose()?
            .ok_or_else(|| "log is pending (no blockNumber)".to_string())?;
        let log_index = self
            .log_index
            .as_deref()
            .map(|raw| parse_quantity(raw, "logIndex"))
            .transpose()?;
        Ok(RawLog {
            address: self.address,
            topics: self.topics,
            data: self.data,
            block_number,
            transaction_hash: self.transaction_hash,
            log_index,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReceipt {
    transaction_hash: B256,
    block_number: Option<String>,
    status: Option<String>,
    #[serde(default)]
    logs: Vec<WireLog>,
}

#[derive(Debug, Deserialize)]
struct WireBlockHeader {
    timestamp: String,
}

pub fn parse_logs(value: Value, method: &str) -> Result<Vec<RawLog>, GatewayError> {
    let wire: Vec<WireLog> = serde_json::from_value(value).map_err(|error| malformed(method, error))?;
    wire.into_iter()
        .map(|log| log.into_raw().map_err(|error| malformed(method, error)))
        .collect()
}

pub fn parse_receipt(value: Value, method: &str) -> Result<Option<TxReceipt>, GatewayError> {
    if value.is_null() {
        return Ok(None);
    }
    let wire: WireReceipt =
        serde_json::from_value(value).map_err(|error| malformed(method, error))?;
    let Some(block_number) = wire.block_number.as_deref() else {
        return Ok(None);
    };
    let block_number = parse_quantity(block_number, "blockNumber").map_err(|error| malformed(method, error))?;
    let success = match wire.status.as_deref() {
        Some(raw) => parse_quantity(raw, "status").map_err(|error| malformed(method, error))? == 1,
        None => true,
    };
    let logs = wire
        .logs
        .into_iter()
        .map(|log| log.into_raw().map_err(|error| malformed(method, error)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(TxReceipt {
        transaction_hash: wire.transaction_hash,
        block_number,
        success,
        logs,
    }))
}

pub fn parse_block_timestamp(
    value: Value,
    block_number: u64,
    method: &str,
) -> Result<u64, GatewayError> {
    if value.is_null() {
        return Err(GatewayError::BlockNotFound(block_number));
    }
    let header: WireBlockHeader =
        serde_json::from_value(value).map_err(|error| malformed(method, error))?;
    parse_quantity(&header.timestamp, "timestamp").map_err(|error| malformed(method, error))
}

pub fn parse_quantity_value(value: &Value, method: &str) -> Result<u64, GatewayError> {
    let raw = value
        .as_str()
        .ok_or_else(|| malformed(method, format!("expected quantity string, got {value}")))?;
    parse_quantity(raw, "result").map_err(|error| malformed(method, error))
}

fn malformed(method: &str, error: impl std::fmt::Display) -> GatewayError {
    GatewayError::Malformed {
        method: method.to_string(),
        message: error.to_string(),
    }
}
