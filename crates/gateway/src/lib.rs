#![forbid(unsafe_code)]

//! Typed access to the FairSoil contracts over Ethereum JSON-RPC.
//!
//! [`ChainClient`] is the transport seam: [`HttpChainClient`] talks to a real
//! node, tests provide in-memory fakes. [`ContractGateway`] marshals contract
//! calls on top of any client and never interprets the results beyond decoding.

use std::future::Future;
use std::pin::Pin;

use alloy_primitives::{Address, B256, Bytes, U256};
use serde::Serialize;

pub mod abi;
mod contracts;
mod events;
mod http;
pub mod jsonrpc;

pub use contracts::{
    ContractAddresses, ContractGateway, ContractKind, MAX_COVENANTS_LISTED, MAX_TEMPLATES_LISTED,
    resource_id,
};
pub use events::{decode_log, decode_logs, event_signatures};
pub use http::{
    DEFAULT_RPC_MAX_RETRIES, DEFAULT_RPC_RETRY_BACKOFF_MS, DEFAULT_RPC_TIMEOUT_SECS,
    HttpChainClient, RpcRetryConfig,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("RPC {method} request failed: {message}")]
    Transport { method: String, message: String },
    #[error("RPC {method} returned error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },
    #[error("RPC {method} malformed response: {message}")]
    Malformed { method: String, message: String },
    #[error("block {0} was not found")]
    BlockNotFound(u64),
    #[error("{0} contract address is not configured")]
    NotConfigured(ContractKind),
    #[error("failed to decode {function} result: {message}")]
    Decode {
        function: &'static str,
        message: String,
    },
}

pub type ChainFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, GatewayError>> + Send + 'a>>;

/// Inclusive block range over a set of emitting contracts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub addresses: Vec<Address>,
    pub from_block: u64,
    pub to_block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
}

/// A write ready for submission. `function` is only used for logging and status display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxRequest {
    pub function: &'static str,
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
    pub value: Option<U256>,
}

impl TxRequest {
    pub fn new(function: &'static str, to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            function,
            from: None,
            to,
            data: data.into(),
            value: None,
        }
    }

    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub success: bool,
    pub logs: Vec<RawLog>,
}

pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> ChainFuture<'_, u64>;
    fn block_number(&self) -> ChainFuture<'_, u64>;
    fn block_timestamp(&self, block_number: u64) -> ChainFuture<'_, u64>;
    fn get_logs(&self, filter: LogFilter) -> ChainFuture<'_, Vec<RawLog>>;
    fn call(&self, to: Address, data: Bytes) -> ChainFuture<'_, Bytes>;
    fn send_transaction(&self, request: TxRequest) -> ChainFuture<'_, B256>;
    /// `None` until the transaction is mined.
    fn transaction_receipt(&self, hash: B256) -> ChainFuture<'_, Option<TxReceipt>>;
}
