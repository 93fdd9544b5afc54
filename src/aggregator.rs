use crate::models::{
    link_key, AccountNode, AggregatedLink, GraphData, RawTransfer, Voucher, VoucherUsage,
};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Vouchers with no metadata are scaled like ERC20 defaults
const FALLBACK_DECIMALS: u32 = 18;

/// Fold a raw transfer batch into the deduplicated node/link graph.
///
/// One link per (sender, recipient, contract) triple; one node per account
/// seen on either side of a transfer. Input order does not matter. Failed
/// transfers and transfers missing an endpoint address are skipped.
pub fn aggregate(vouchers: &[Voucher], transfers: &[RawTransfer]) -> GraphData {
    let voucher_index: HashMap<&str, &Voucher> = vouchers
        .iter()
        .map(|v| (v.voucher_address.as_str(), v))
        .collect();

    let mut links: HashMap<String, AggregatedLink> = HashMap::new();
    let mut nodes: HashMap<String, AccountNode> = HashMap::new();

    for transfer in transfers {
        if !transfer.success {
            continue;
        }
        if transfer.sender_address.is_empty() || transfer.recipient_address.is_empty() {
            continue; // malformed record, drop it
        }

        let voucher = voucher_index.get(transfer.contract_address.as_str()).copied();
        let amount = scale_amount(transfer.tx_value, voucher.map_or(FALLBACK_DECIMALS, |v| v.decimals));

        let key = link_key(
            &transfer.sender_address,
            &transfer.recipient_address,
            &transfer.contract_address,
        );
        match links.get_mut(&key) {
            Some(link) => {
                link.value += amount;
                link.tx_count += 1;
                link.date = link.date.max(transfer.date_block);
                link.date_first = link.date_first.min(transfer.date_block);
            }
            None => {
                links.insert(
                    key,
                    AggregatedLink {
                        source: transfer.sender_address.clone(),
                        target: transfer.recipient_address.clone(),
                        contract_address: transfer.contract_address.clone(),
                        token_name: voucher
                            .map_or_else(|| "Unknown".to_string(), |v| v.voucher_name.clone()),
                        token_symbol: voucher
                            .map_or_else(|| "???".to_string(), |v| v.symbol.clone()),
                        value: amount,
                        tx_count: 1,
                        date: transfer.date_block,
                        date_first: transfer.date_block,
                    },
                );
            }
        }

        touch_account(
            &mut nodes,
            &transfer.sender_address,
            &transfer.contract_address,
            transfer.date_block,
        );
        touch_account(
            &mut nodes,
            &transfer.recipient_address,
            &transfer.contract_address,
            transfer.date_block,
        );
    }

    // Sorted output so the same batch always yields the same arrays,
    // whatever order the upstream returned the rows in
    let mut nodes: Vec<AccountNode> = nodes.into_values().collect();
    nodes.sort_by(|a, b| a.address.cmp(&b.address));
    let mut links: Vec<AggregatedLink> = links.into_values().collect();
    links.sort_by_key(|l| l.key());

    GraphData { nodes, links }
}

fn touch_account(
    nodes: &mut HashMap<String, AccountNode>,
    address: &str,
    contract: &str,
    date: DateTime<Utc>,
) {
    let node = nodes
        .entry(address.to_string())
        .or_insert_with(|| AccountNode {
            address: address.to_string(),
            value: 0,
            used_vouchers: HashMap::new(),
        });
    node.value += 1;

    match node.used_vouchers.get_mut(contract) {
        Some(usage) => {
            usage.tx_count += 1;
            usage.first_tx_date = usage.first_tx_date.min(date);
        }
        None => {
            node.used_vouchers.insert(
                contract.to_string(),
                VoucherUsage {
                    first_tx_date: date,
                    tx_count: 1,
                },
            );
        }
    }
}

/// Scale a raw integer token amount by the voucher's decimal precision
fn scale_amount(raw: u128, decimals: u32) -> Decimal {
    let divisor = Decimal::from_u128(10u128.pow(decimals.min(28)))
        .unwrap_or(Decimal::ONE);
    Decimal::from_u128(raw).unwrap_or(Decimal::ZERO) / divisor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn voucher(address: &str, symbol: &str, decimals: u32) -> Voucher {
        Voucher {
            voucher_address: address.to_string(),
            voucher_name: format!("{} Voucher", symbol),
            symbol: symbol.to_string(),
            decimals,
        }
    }

    fn transfer(sender: &str, recipient: &str, contract: &str, value: u128, secs: i64) -> RawTransfer {
        RawTransfer {
            sender_address: sender.to_string(),
            recipient_address: recipient.to_string(),
            contract_address: contract.to_string(),
            tx_value: value,
            date_block: Utc.timestamp_opt(secs, 0).unwrap(),
            success: true,
        }
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn empty_batch_yields_empty_graph() {
        let graph = aggregate(&[voucher("0xX", "X", 6)], &[]);
        assert!(graph.nodes.is_empty());
        assert!(graph.links.is_empty());
    }

    #[test]
    fn folds_matching_transfers_into_one_link() {
        // the worked scenario: two A→B transfers of X, one B→A transfer of Y
        let vouchers = vec![voucher("0xX", "X", 0), voucher("0xY", "Y", 0)];
        let transfers = vec![
            transfer("A", "B", "0xX", 10, 100),
            transfer("A", "B", "0xX", 5, 200),
            transfer("B", "A", "0xY", 1, 150),
        ];

        let graph = aggregate(&vouchers, &transfers);
        assert_eq!(graph.links.len(), 2);

        let ab = graph.links.iter().find(|l| l.contract_address == "0xX").unwrap();
        assert_eq!(ab.source, "A");
        assert_eq!(ab.target, "B");
        assert_eq!(ab.value, Decimal::from(15));
        assert_eq!(ab.tx_count, 2);
        assert_eq!(ab.date_first, ts(100));
        assert_eq!(ab.date, ts(200));

        let ba = graph.links.iter().find(|l| l.contract_address == "0xY").unwrap();
        assert_eq!(ba.value, Decimal::from(1));
        assert_eq!(ba.tx_count, 1);
        assert_eq!(ba.date_first, ts(150));
        assert_eq!(ba.date, ts(150));

        let a = graph.nodes.iter().find(|n| n.address == "A").unwrap();
        assert_eq!(a.value, 3);
        assert_eq!(a.used_vouchers["0xX"], VoucherUsage { first_tx_date: ts(100), tx_count: 2 });
        assert_eq!(a.used_vouchers["0xY"], VoucherUsage { first_tx_date: ts(150), tx_count: 1 });

        let b = graph.nodes.iter().find(|n| n.address == "B").unwrap();
        assert_eq!(b.value, 3);
    }

    #[test]
    fn result_is_independent_of_batch_order() {
        let vouchers = vec![voucher("0xX", "X", 2)];
        let transfers = vec![
            transfer("A", "B", "0xX", 1000, 300),
            transfer("A", "B", "0xX", 250, 100),
            transfer("C", "B", "0xX", 40, 200),
        ];
        let mut reversed = transfers.clone();
        reversed.reverse();

        let forward = aggregate(&vouchers, &transfers);
        let backward = aggregate(&vouchers, &reversed);

        assert_eq!(forward.links.len(), backward.links.len());
        for (f, b) in forward.links.iter().zip(backward.links.iter()) {
            assert_eq!(f.key(), b.key());
            assert_eq!(f.value, b.value);
            assert_eq!(f.tx_count, b.tx_count);
            assert_eq!(f.date, b.date);
            assert_eq!(f.date_first, b.date_first);
        }
        assert_eq!(forward.nodes.len(), backward.nodes.len());
    }

    #[test]
    fn scales_by_voucher_decimals() {
        let vouchers = vec![voucher("0xX", "X", 6)];
        let graph = aggregate(&vouchers, &[transfer("A", "B", "0xX", 1_500_000, 100)]);
        assert_eq!(graph.links[0].value, Decimal::new(15, 1)); // 1.5
    }

    #[test]
    fn unknown_voucher_defaults_to_18_decimals() {
        let graph = aggregate(&[], &[transfer("A", "B", "0xZ", 10u128.pow(18), 100)]);
        assert_eq!(graph.links[0].value, Decimal::from(1));
        assert_eq!(graph.links[0].token_symbol, "???");
    }

    #[test]
    fn skips_failed_and_malformed_transfers() {
        let mut failed = transfer("A", "B", "0xX", 10, 100);
        failed.success = false;
        let no_sender = transfer("", "B", "0xX", 10, 100);

        let graph = aggregate(&[], &[failed, no_sender, transfer("A", "B", "0xX", 7, 100)]);
        assert_eq!(graph.links.len(), 1);
        assert_eq!(graph.links[0].tx_count, 1);
        assert_eq!(graph.nodes.len(), 2);
    }
}
