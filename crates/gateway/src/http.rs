use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes};
use serde_json::{Value, json};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::jsonrpc::{
    JsonRpcRequest, JsonRpcResponse, parse_block_timestamp, parse_logs, parse_quantity_value,
    parse_receipt, quantity,
};
use crate::{ChainClient, ChainFuture, GatewayError, LogFilter, RawLog, TxReceipt, TxRequest};

pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RPC_MAX_RETRIES: u32 = 1;
pub const DEFAULT_RPC_RETRY_BACKOFF_MS: u64 = 250;
const MAX_RPC_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// Retries apply to idempotent reads only. Submissions are never retried.
#[derive(Debug, Clone)]
pub struct RpcRetryConfig {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RpcRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_RPC_MAX_RETRIES,
            base_backoff: Duration::from_millis(DEFAULT_RPC_RETRY_BACKOFF_MS),
        }
    }
}

impl RpcRetryConfig {
    fn backoff(&self, attempt: u32) -> Duration {
        if self.base_backoff.is_zero() {
            return Duration::ZERO;
        }
        let factor = 1_u128 << attempt.min(20);
        let base_ms = self.base_backoff.as_millis();
        let backoff_ms = base_ms.saturating_mul(factor).min(5_000);
        Duration::from_millis(backoff_ms as u64)
    }
}

pub struct HttpChainClient {
    http: reqwest::Client,
    rpc_url: String,
    retry: RpcRetryConfig,
    next_id: AtomicU64,
}

impl HttpChainClient {
    pub fn new(
        rpc_url: impl Into<String>,
        timeout: Duration,
        retry: RpcRetryConfig,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| GatewayError::Transport {
                method: "client".to_string(),
                message: format!("failed to build HTTP client: {error}"),
            })?;
        Ok(Self {
            http,
            rpc_url: rpc_url.into(),
            retry,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call_with_retry(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let mut attempt = 0_u32;
        loop {
            match self.request(method, params.clone()).await {
                Ok(value) => return Ok(value),
                // a node-side error answer is deterministic; only transport failures are retried
                Err(error @ GatewayError::Rpc { .. }) => return Err(error),
                Err(error) => {
                    if attempt >= self.retry.max_retries {
                        return Err(error);
                    }
                    warn!(method, attempt, %error, "RPC read failed, retrying");
                    let backoff = self.retry.backoff(attempt);
                    if !backoff.is_zero() {
                        sleep(backoff).await;
                    }
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        debug!(method, id, "sending RPC request");

        let mut response = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|error| transport(method, error))?;
        let http_status = response.status();
        let content_length = response.content_length();
        let body = read_body_with_limit(
            &mut response,
            content_length,
            MAX_RPC_RESPONSE_BYTES,
            method,
        )
        .await?;

        if !http_status.is_success() {
            return Err(GatewayError::Transport {
                method: method.to_string(),
                message: format!(
                    "HTTP {http_status} with body {}",
                    String::from_utf8_lossy(&body)
                ),
            });
        }
        let parsed: JsonRpcResponse =
            serde_json::from_slice(&body).map_err(|error| GatewayError::Malformed {
                method: method.to_string(),
                message: format!("invalid JSON-RPC response: {error}"),
            })?;
        parsed.into_result(method)
    }

    pub async fn fetch_chain_id(&self) -> Result<u64, GatewayError> {
        let method = "eth_chainId";
        let value = self.call_with_retry(method, json!([])).await?;
        parse_quantity_value(&value, method)
    }

    pub async fn fetch_block_number(&self) -> Result<u64, GatewayError> {
        let method = "eth_blockNumber";
        let value = self.call_with_retry(method, json!([])).await?;
        parse_quantity_value(&value, method)
    }

    pub async fn fetch_block_timestamp(&self, block_number: u64) -> Result<u64, GatewayError> {
        let method = "eth_getBlockByNumber";
        let value = self
            .call_with_retry(method, json!([quantity(block_number), false]))
            .await?;
        parse_block_timestamp(value, block_number, method)
    }

    pub async fn fetch_logs(&self, filter: LogFilter) -> Result<Vec<RawLog>, GatewayError> {
        let method = "eth_getLogs";
        let value = self
            .call_with_retry(
                method,
                json!([{
                    "address": filter.addresses,
                    "fromBlock": quantity(filter.from_block),
                    "toBlock": quantity(filter.to_block),
                }]),
            )
            .await?;
        parse_logs(value, method)
    }

    pub async fn eth_call(&self, to: Address, data: Bytes) -> Result<Bytes, GatewayError> {
        let method = "eth_call";
        let value = self
            .call_with_retry(method, json!([{ "to": to, "data": data }, "latest"]))
            .await?;
        serde_json::from_value(value).map_err(|error| GatewayError::Malformed {
            method: method.to_string(),
            message: error.to_string(),
        })
    }

    pub async fn submit(&self, request: TxRequest) -> Result<B256, GatewayError> {
        let method = "eth_sendTransaction";
        let mut tx = json!({
            "to": request.to,
            "data": request.data,
        });
        if let Some(from) = request.from {
            tx["from"] = json!(from);
        }
        if let Some(value) = request.value {
            tx["value"] = json!(value);
        }
        let value = self.request(method, json!([tx])).await?;
        serde_json::from_value(value).map_err(|error| GatewayError::Malformed {
            method: method.to_string(),
            message: error.to_string(),
        })
    }

    pub async fn fetch_receipt(&self, hash: B256) -> Result<Option<TxReceipt>, GatewayError> {
        let method = "eth_getTransactionReceipt";
        let value = self.call_with_retry(method, json!([hash])).await?;
        parse_receipt(value, method)
    }
}

impl ChainClient for HttpChainClient {
    fn chain_id(&self) -> ChainFuture<'_, u64> {
        Box::pin(self.fetch_chain_id())
    }

    fn block_number(&self) -> ChainFuture<'_, u64> {
        Box::pin(self.fetch_block_number())
    }

    fn block_timestamp(&self, block_number: u64) -> ChainFuture<'_, u64> {
        Box::pin(self.fetch_block_timestamp(block_number))
    }

    fn get_logs(&self, filter: LogFilter) -> ChainFuture<'_, Vec<RawLog>> {
        Box::pin(self.fetch_logs(filter))
    }

    fn call(&self, to: Address, data: Bytes) -> ChainFuture<'_, Bytes> {
        Box::pin(self.eth_call(to, data))
    }

    fn send_transaction(&self, request: TxRequest) -> ChainFuture<'_, B256> {
        Box::pin(self.submit(request))
    }

    fn transaction_receipt(&self, hash: B256) -> ChainFuture<'_, Option<TxReceipt>> {
        Box::pin(self.fetch_receipt(hash))
    }
}

fn transport(method: &str, error: impl std::fmt::Display) -> GatewayError {
    GatewayError::Transport {
        method: method.to_string(),
        message: error.to_string(),
    }
}

async fn read_body_with_limit(
    response: &mut reqwest::Response,
    content_length: Option<u64>,
    max_bytes: usize,
    method: &str,
) -> Result<Vec<u8>, GatewayError> {
    if let Some(length) = content_length
        && length > max_bytes as u64
    {
        return Err(transport(
            method,
            format!("response too large: content-length={length} exceeds {max_bytes} bytes"),
        ));
    }
    let mut buffer = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|error| transport(method, format!("failed reading response chunk: {error}")))?
    {
        append_limited_chunk(&mut buffer, &chunk, max_bytes, method)?;
    }
    Ok(buffer)
}

fn append_limited_chunk(
    buffer: &mut Vec<u8>,
    chunk: &[u8],
    max_bytes: usize,
    method: &str,
) -> Result<(), GatewayError> {
    let new_len = buffer
        .len()
        .checked_add(chunk.len())
        .ok_or_else(|| transport(method, "response size overflow"))?;
    if new_len > max_bytes {
        return Err(transport(
            method,
            format!("response too large: {new_len} exceeds {max_bytes} bytes"),
        ));
    }
    buffer.extend_from_slice(chunk);
    Ok(())
}
