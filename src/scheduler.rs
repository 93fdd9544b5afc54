use crate::models::AggregatedLink;
use crate::pulse::PulseTracker;
use crate::store::{SimBody, StableGraphStore};
use rand::Rng;
use std::collections::VecDeque;

/// Admission throughput knobs. The per-tick budget adapts to the backlog:
/// a huge queue drains in roughly `target_ticks_to_clear` ticks, a small
/// one never trickles slower than `min_links_per_tick`.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionConfig {
    pub target_ticks_to_clear: usize,
    pub min_links_per_tick: usize,
    pub max_links_per_tick: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            target_ticks_to_clear: 60,
            min_links_per_tick: 2,
            max_links_per_tick: 40,
        }
    }
}

/// What one admission tick did
#[derive(Debug, Default, Clone, Copy)]
pub struct TickOutcome {
    pub admitted_links: usize,
    pub admitted_nodes: usize,
    /// true once the queues are empty and the timer can park
    pub drained: bool,
}

/// One admission tick: admit up to a budget of eligible links in queue
/// order, pulling in exactly the queued nodes those links need. A link is
/// eligible only while both endpoints are displayed or queued, so a
/// displayed link can never dangle, even transiently. Never errors — under
/// load it just admits slower.
pub fn step(
    store: &mut StableGraphStore,
    cfg: &AdmissionConfig,
    pulse: &mut PulseTracker,
) -> TickOutcome {
    let mut outcome = TickOutcome::default();

    if store.pending_links.is_empty() {
        // leftover queued nodes support no remaining link; drop them
        // rather than admit floating singletons
        store.pending_nodes.clear();
        store.queued_nodes.clear();
        outcome.drained = true;
        return outcome;
    }

    let pending = store.pending_links.len();
    let desired = pending.div_ceil(cfg.target_ticks_to_clear.max(1));
    let budget = desired.clamp(cfg.min_links_per_tick.max(1), cfg.max_links_per_tick);

    let mut deferred: VecDeque<AggregatedLink> = VecDeque::new();
    while outcome.admitted_links < budget {
        let Some(link) = store.pending_links.pop_front() else {
            break;
        };
        if !endpoint_ready(store, &link.source) || !endpoint_ready(store, &link.target) {
            // skipped over, stays in relative order for the next tick
            deferred.push_back(link);
            continue;
        }
        outcome.admitted_nodes += admit_endpoints(store, &link, pulse);
        pulse.mark_link(&link.key());
        store.admit_link(link);
        outcome.admitted_links += 1;
    }
    while let Some(link) = deferred.pop_back() {
        store.pending_links.push_front(link);
    }

    if store.pending_links.is_empty() {
        store.pending_nodes.clear();
        store.queued_nodes.clear();
        outcome.drained = true;
    }
    outcome
}

fn endpoint_ready(store: &StableGraphStore, id: &str) -> bool {
    store.node_index.contains_key(id) || store.queued_nodes.contains(id)
}

/// Admit whichever of the link's endpoints are still queued. Returns how
/// many nodes were admitted.
fn admit_endpoints(
    store: &mut StableGraphStore,
    link: &AggregatedLink,
    pulse: &mut PulseTracker,
) -> usize {
    let mut admitted = 0;
    for endpoint in [link.source.as_str(), link.target.as_str()] {
        if store.node_index.contains_key(endpoint) {
            continue;
        }
        let Some(i) = store
            .pending_nodes
            .iter()
            .position(|n| n.address == endpoint)
        else {
            continue;
        };
        if let Some(account) = store.pending_nodes.remove(i) {
            let body = estimate_position(store, endpoint);
            store.admit_node(account, body);
            pulse.mark_node(endpoint);
            admitted += 1;
        }
    }
    admitted
}

/// Initial placement for a node the simulation has never seen: centroid of
/// its already-positioned neighbors in the full target link set, nudged by
/// a little jitter so coincident spawns separate. No positioned neighbor
/// means no estimate — the simulation places the node itself.
fn estimate_position(store: &StableGraphStore, id: &str) -> Option<SimBody> {
    let mut sum = (0.0, 0.0, 0.0);
    let mut count = 0.0;
    for link in &store.target_links {
        let other = if link.source == id {
            &link.target
        } else if link.target == id {
            &link.source
        } else {
            continue;
        };
        if let Some(body) = store.node(other).and_then(|n| n.body) {
            sum = (sum.0 + body.x, sum.1 + body.y, sum.2 + body.z);
            count += 1.0;
        }
    }
    if count == 0.0 {
        return None;
    }

    let mut rng = rand::thread_rng();
    let mut jitter = || rng.gen_range(-4.0..4.0);
    Some(SimBody {
        x: sum.0 / count + jitter(),
        y: sum.1 / count + jitter(),
        z: sum.2 / count + jitter(),
        vx: 0.0,
        vy: 0.0,
        vz: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountNode, GraphData};
    use crate::store::PositionUpdate;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::time::Duration;

    fn node(address: &str) -> AccountNode {
        AccountNode {
            address: address.to_string(),
            value: 1,
            used_vouchers: HashMap::new(),
        }
    }

    fn link(source: &str, target: &str) -> AggregatedLink {
        AggregatedLink {
            source: source.to_string(),
            target: target.to_string(),
            contract_address: "0xX".to_string(),
            token_name: "X Voucher".to_string(),
            token_symbol: "X".to_string(),
            value: Decimal::ONE,
            tx_count: 1,
            date: Utc.timestamp_opt(100, 0).unwrap(),
            date_first: Utc.timestamp_opt(100, 0).unwrap(),
        }
    }

    fn pulse() -> PulseTracker {
        PulseTracker::new(Duration::from_millis(1000))
    }

    /// A ring of `n` nodes with `n` links
    fn ring(n: usize) -> GraphData {
        let nodes: Vec<_> = (0..n).map(|i| node(&format!("N{}", i))).collect();
        let links: Vec<_> = (0..n)
            .map(|i| link(&format!("N{}", i), &format!("N{}", (i + 1) % n)))
            .collect();
        GraphData { nodes, links }
    }

    fn assert_no_dangling(store: &StableGraphStore) {
        for l in store.links() {
            assert!(store.node(&l.source).is_some(), "dangling source {}", l.source);
            assert!(store.node(&l.target).is_some(), "dangling target {}", l.target);
        }
    }

    #[test]
    fn queue_drains_monotonically_to_zero() {
        let mut store = StableGraphStore::new();
        let mut pulse = pulse();
        store.reconcile(ring(30), true);

        let cfg = AdmissionConfig {
            target_ticks_to_clear: 10,
            min_links_per_tick: 1,
            max_links_per_tick: 5,
        };

        let mut previous = store.pending_len();
        let mut ticks = 0;
        loop {
            let outcome = step(&mut store, &cfg, &mut pulse);
            assert!(store.pending_len() <= previous, "queue grew across a tick");
            assert_no_dangling(&store);
            previous = store.pending_len();
            ticks += 1;
            assert!(ticks < 1000, "queue never drained");
            if outcome.drained {
                break;
            }
        }

        assert_eq!(store.nodes().len(), 30);
        assert_eq!(store.links().len(), 30);
        assert_eq!(store.pending_len(), 0);
    }

    #[test]
    fn budget_is_clamped_between_min_and_max() {
        let cfg = AdmissionConfig {
            target_ticks_to_clear: 10,
            min_links_per_tick: 2,
            max_links_per_tick: 5,
        };
        let mut pulse = pulse();

        // tiny backlog still admits at the minimum rate
        let mut store = StableGraphStore::new();
        store.reconcile(ring(3), true);
        let outcome = step(&mut store, &cfg, &mut pulse);
        assert_eq!(outcome.admitted_links, 2);

        // huge backlog caps at the maximum
        let mut store = StableGraphStore::new();
        store.reconcile(ring(200), true);
        let outcome = step(&mut store, &cfg, &mut pulse);
        assert_eq!(outcome.admitted_links, 5);
    }

    #[test]
    fn only_nodes_needed_by_admitted_links_come_in() {
        let mut store = StableGraphStore::new();
        let mut pulse = pulse();
        store.reconcile(ring(30), true);
        let cfg = AdmissionConfig {
            target_ticks_to_clear: 30,
            min_links_per_tick: 1,
            max_links_per_tick: 1,
        };
        step(&mut store, &cfg, &mut pulse);
        // one ring link admitted → exactly its two endpoints displayed
        assert_eq!(store.links().len(), 1);
        assert_eq!(store.nodes().len(), 2);
    }

    #[test]
    fn admission_marks_pulses() {
        let mut store = StableGraphStore::new();
        let mut pulse = pulse();
        store.reconcile(ring(3), true);
        step(&mut store, &AdmissionConfig::default(), &mut pulse);

        let first = &store.links()[0];
        assert!(pulse.link_intensity(&first.key()) > 0.0);
        assert!(pulse.node_intensity(&first.source) > 0.0);
    }

    #[test]
    fn new_nodes_spawn_near_their_positioned_neighbors() {
        let mut store = StableGraphStore::new();
        let mut pulse = pulse();

        // A and B are displayed and placed; C joins via links to both
        store.reconcile(
            GraphData {
                nodes: vec![node("A"), node("B")],
                links: vec![link("A", "B")],
            },
            false,
        );
        store.apply_positions(&[
            PositionUpdate { id: "A".into(), x: 10.0, y: 0.0, z: 0.0, vx: 0.0, vy: 0.0, vz: 0.0 },
            PositionUpdate { id: "B".into(), x: -10.0, y: 6.0, z: 0.0, vx: 0.0, vy: 0.0, vz: 0.0 },
        ]);
        store.reconcile(
            GraphData {
                nodes: vec![node("A"), node("B"), node("C")],
                links: vec![link("A", "B"), link("A", "C"), link("B", "C")],
            },
            true,
        );

        while !step(&mut store, &AdmissionConfig::default(), &mut pulse).drained {}

        let body = store.node("C").unwrap().body.expect("estimated position");
        // centroid of (10,0,0) and (-10,6,0), within jitter bounds
        assert!((body.x - 0.0).abs() < 4.0 + 1e-9);
        assert!((body.y - 3.0).abs() < 4.0 + 1e-9);
        assert!((body.z - 0.0).abs() < 4.0 + 1e-9);
    }

    #[test]
    fn isolated_node_gets_no_estimated_position() {
        let mut store = StableGraphStore::new();
        let mut pulse = pulse();
        store.reconcile(ring(3), true);
        while !step(&mut store, &AdmissionConfig::default(), &mut pulse).drained {}
        // nothing had a body, so the estimate had no anchor
        assert!(store.nodes().iter().all(|n| n.body.is_none()));
    }

    #[test]
    fn invariant_holds_across_interleaved_reconciliations() {
        let mut store = StableGraphStore::new();
        let mut pulse = pulse();
        let cfg = AdmissionConfig {
            target_ticks_to_clear: 5,
            min_links_per_tick: 1,
            max_links_per_tick: 3,
        };

        // grow, shrink mid-drain, grow again with different membership
        let stages = [ring(12), ring(4), ring(20), ring(1), ring(16)];
        for (round, target) in stages.into_iter().enumerate() {
            store.reconcile(target, true);
            assert_no_dangling(&store);
            // interleave a partial drain, length varies per round
            for _ in 0..=round {
                step(&mut store, &cfg, &mut pulse);
                assert_no_dangling(&store);
            }
        }
        while !step(&mut store, &cfg, &mut pulse).drained {
            assert_no_dangling(&store);
        }
        assert_eq!(store.nodes().len(), 16);
        assert_eq!(store.links().len(), 16);
    }
}
