use std::collections::BTreeMap;

use alloy_primitives::{Address, B256, I256, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailLink {
    pub label: String,
    pub url: String,
}

/// One display-ready on-chain event. Equality for dedup purposes is by `id` only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailItem {
    pub id: String,
    pub timestamp: u64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<TrailLink>,
    pub block_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub covenant_id: Option<u64>,
}

impl TrailItem {
    /// Lowercased `title body`, the haystack for free-text search.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.body.as_deref().unwrap_or_default()).to_lowercase()
    }
}

pub fn trail_item_id(transaction_hash: Option<&B256>, log_index: Option<u64>) -> String {
    let hash = transaction_hash
        .map(|hash| format!("{hash}"))
        .unwrap_or_else(|| "0x".to_string());
    format!("{hash}-{}", log_index.unwrap_or(0))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventArg {
    Uint(U256),
    Int(I256),
    Address(Address),
    Bool(bool),
    Text(String),
    Word(B256),
}

impl EventArg {
    pub fn as_u256(&self) -> Option<U256> {
        match self {
            Self::Uint(value) => Some(*value),
            Self::Bool(value) => Some(U256::from(u8::from(*value))),
            _ => None,
        }
    }

    pub fn as_i256(&self) -> Option<I256> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Uint(value) => I256::try_from(*value).ok(),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address(value) => Some(*value),
            _ => None,
        }
    }

    /// Strings come back as-is; 32-byte words render as 0x-hex.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(value) => Some(value.clone()),
            Self::Word(value) => Some(format!("{value}")),
            _ => None,
        }
    }
}

pub type EventArgs = BTreeMap<String, EventArg>;

/// An event log after ABI decoding. `event_name` is absent when the
/// first topic matched no known event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedLog {
    pub event_name: Option<String>,
    pub args: EventArgs,
    pub address: Address,
    pub block_number: u64,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
}

impl DecodedLog {
    pub fn new(event_name: impl Into<String>, block_number: u64) -> Self {
        Self {
            event_name: Some(event_name.into()),
            block_number,
            ..Self::default()
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: EventArg) -> Self {
        self.args.insert(name.into(), value);
        self
    }

    pub fn with_position(mut self, transaction_hash: B256, log_index: u64) -> Self {
        self.transaction_hash = Some(transaction_hash);
        self.log_index = Some(log_index);
        self
    }

    pub fn id(&self) -> String {
        trail_item_id(self.transaction_hash.as_ref(), self.log_index)
    }

    pub fn uint(&self, name: &str) -> U256 {
        self.args
            .get(name)
            .and_then(EventArg::as_u256)
            .unwrap_or_default()
    }

    pub fn int(&self, name: &str) -> I256 {
        self.args
            .get(name)
            .and_then(EventArg::as_i256)
            .unwrap_or(I256::ZERO)
    }

    pub fn address_arg(&self, name: &str) -> Option<Address> {
        self.args.get(name).and_then(EventArg::as_address)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.args.get(name).and_then(EventArg::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_falls_back_when_position_missing() {
        assert_eq!(trail_item_id(None, None), "0x-0");
        let hash = B256::repeat_byte(0x11);
        let id = trail_item_id(Some(&hash), Some(3));
        assert!(id.starts_with("0x1111"));
        assert!(id.ends_with("-3"));
        assert_eq!(id.len(), 66 + 2);
    }

    #[test]
    fn missing_args_default_to_zero() {
        let log = DecodedLog::new("CovenantCreated", 7)
            .with_arg("tokenBReward", EventArg::Uint(U256::from(5_u64)));
        assert_eq!(log.uint("tokenBReward"), U256::from(5_u64));
        assert_eq!(log.uint("integrityPoints"), U256::ZERO);
        assert_eq!(log.int("deltaA"), I256::ZERO);
        assert_eq!(log.address_arg("creator"), None);
        assert_eq!(log.text("reason"), None);
    }

    #[test]
    fn search_text_joins_title_and_body() {
        let item = TrailItem {
            id: "0x-0".to_string(),
            timestamp: 1,
            title: "Treasury Inflow".to_string(),
            body: Some("From 0xAbCd".to_string()),
            links: Vec::new(),
            block_number: 1,
            covenant_id: None,
        };
        assert_eq!(item.search_text(), "treasury inflow from 0xabcd");
    }
}
