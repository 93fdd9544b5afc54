// src/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A voucher (token) — immutable reference data, used for labels and
/// decimal scaling only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    pub voucher_address: String, // contract address, unique key
    pub voucher_name: String,
    pub symbol: String,
    pub decimals: u32,
}

/// One raw on-chain transfer event, as delivered by the upstream API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransfer {
    pub sender_address: String,
    pub recipient_address: String,
    pub contract_address: String,
    pub tx_value: u128,            // raw token units, unscaled
    pub date_block: DateTime<Utc>, // block timestamp
    pub success: bool,
}

/// Per-account usage of one voucher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherUsage {
    pub first_tx_date: DateTime<Utc>,
    pub tx_count: u64,
}

/// One account in the transfer network. `value` counts every transfer the
/// account took part in, sender or recipient side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountNode {
    pub address: String,
    pub value: u64,
    pub used_vouchers: HashMap<String, VoucherUsage>,
}

/// One aggregated link. Identity is (source, target, contract) — every
/// transfer matching that triple folds into the same link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedLink {
    pub source: String,
    pub target: String,
    pub contract_address: String,
    pub token_name: String,
    pub token_symbol: String,
    pub value: Decimal,            // sum of scaled transfer amounts
    pub tx_count: u64,
    pub date: DateTime<Utc>,       // most recent contributing transfer
    pub date_first: DateTime<Utc>, // first contributing transfer
}

impl AggregatedLink {
    /// Aggregation key for this link's identity
    pub fn key(&self) -> String {
        link_key(&self.source, &self.target, &self.contract_address)
    }
}

pub fn link_key(source: &str, target: &str, contract: &str) -> String {
    format!("{}-{}-{}", source, target, contract)
}

/// The aggregated graph handed from the aggregator to the display layers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<AccountNode>,
    pub links: Vec<AggregatedLink>,
}

/// A published field report — reference data shown alongside the graph,
/// never part of the graph math
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldReport {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    pub date: DateTime<Utc>,
}

/// A swap pool — reference data, same standing as field reports
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pool {
    pub address: String,
    pub name: String,
    #[serde(default)]
    pub symbol: Option<String>,
}
