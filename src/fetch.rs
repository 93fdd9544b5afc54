use crate::models::{FieldReport, Pool, RawTransfer, Voucher};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// The complete dataset served by the upstream dashboard API
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardData {
    pub vouchers: Vec<Voucher>,
    pub transactions: Vec<RawTransfer>,
    #[serde(default)]
    pub field_reports: Vec<FieldReport>,
    #[serde(default)]
    pub pools: Vec<Pool>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream returned HTTP {0}")]
    Status(StatusCode),
    #[error("request failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        source: reqwest::Error,
    },
    #[error("building HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("decoding upstream payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("reading upstream body: {0}")]
    Body(reqwest::Error),
}

const ATTEMPTS: u32 = 3;

/// Fetch the dashboard dataset with a timeout and a few retries
pub async fn fetch_dashboard_data(upstream_url: &str) -> Result<DashboardData, FetchError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(FetchError::Client)?;

    for attempt in 1..=ATTEMPTS {
        info!("📡 Fetching dashboard data → {}", upstream_url);

        match client.get(upstream_url).send().await {
            Ok(resp) => {
                if resp.status() != StatusCode::OK {
                    return Err(FetchError::Status(resp.status()));
                }
                let text = resp.text().await.map_err(FetchError::Body)?;
                let data: DashboardData = serde_json::from_str(&text)?;
                info!(
                    "📩 Upstream snapshot: {} vouchers, {} transfers, {} reports, {} pools",
                    data.vouchers.len(),
                    data.transactions.len(),
                    data.field_reports.len(),
                    data.pools.len()
                );
                return Ok(data);
            }
            Err(e) if attempt < ATTEMPTS => {
                warn!("Upstream fetch failed (attempt {}): {}. Retrying...", attempt, e);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            Err(e) => {
                return Err(FetchError::Exhausted {
                    attempts: ATTEMPTS,
                    source: e,
                })
            }
        }
    }

    unreachable!("retries exhausted without returning");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_decodes_with_missing_optional_sections() {
        let payload = r#"{
            "vouchers": [
                {"voucher_address": "0xX", "voucher_name": "X Voucher", "symbol": "X", "decimals": 6}
            ],
            "transactions": [
                {
                    "sender_address": "A",
                    "recipient_address": "B",
                    "contract_address": "0xX",
                    "tx_value": 1500000,
                    "date_block": "2024-03-01T12:00:00Z",
                    "success": true
                }
            ]
        }"#;

        let data: DashboardData = serde_json::from_str(payload).unwrap();
        assert_eq!(data.vouchers.len(), 1);
        assert_eq!(data.transactions.len(), 1);
        assert_eq!(data.transactions[0].tx_value, 1_500_000);
        assert!(data.field_reports.is_empty());
        assert!(data.pools.is_empty());
    }
}
