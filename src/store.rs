use crate::models::{AccountNode, AggregatedLink, GraphData};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Simulation-owned positional state of a displayed node. The force engine
/// is the only writer of these fields; the store just keeps them alive
/// across data refreshes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SimBody {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub vx: f64,
    #[serde(default)]
    pub vy: f64,
    #[serde(default)]
    pub vz: f64,
}

/// A displayed node: store-owned attributes next to the simulation-owned
/// body. `body` stays `None` until the simulation (or the neighbor
/// estimate) has placed the node.
#[derive(Debug, Clone)]
pub struct DisplayedNode {
    pub account: AccountNode,
    pub body: Option<SimBody>,
}

/// A position write-back from the simulation engine, positional fields only
#[derive(Debug, Clone, Deserialize)]
pub struct PositionUpdate {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub vx: f64,
    #[serde(default)]
    pub vy: f64,
    #[serde(default)]
    pub vz: f64,
}

/// What one reconciliation did, for logging
#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileSummary {
    pub removed_nodes: usize,
    pub removed_links: usize,
    pub queued_nodes: usize,
    pub queued_links: usize,
    pub admitted_nodes: usize,
    pub admitted_links: usize,
}

/// The stable, currently-rendered subset of the aggregated graph.
///
/// Every tracked identity is in exactly one of three states: absent,
/// queued (waiting in a pending deque) or displayed. Reconciliation moves
/// identities between states when the filtered target graph changes; the
/// admission scheduler drains the queues over time. Displayed links always
/// reference displayed or queued endpoints, and a displayed link's
/// endpoints are always displayed.
#[derive(Debug, Default)]
pub struct StableGraphStore {
    pub(crate) nodes: Vec<DisplayedNode>,
    pub(crate) node_index: HashMap<String, usize>,
    pub(crate) links: Vec<AggregatedLink>,
    pub(crate) link_index: HashMap<String, usize>,
    pub(crate) pending_nodes: VecDeque<AccountNode>,
    pub(crate) pending_links: VecDeque<AggregatedLink>,
    pub(crate) queued_nodes: HashSet<String>,
    pub(crate) queued_links: HashSet<String>,
    // full target link set, kept for neighbor-position estimation
    pub(crate) target_links: Vec<AggregatedLink>,
}

impl StableGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[DisplayedNode] {
        &self.nodes
    }

    pub fn links(&self) -> &[AggregatedLink] {
        &self.links
    }

    pub fn node(&self, id: &str) -> Option<&DisplayedNode> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_links.is_empty() || !self.pending_nodes.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending_links.len() + self.pending_nodes.len()
    }

    /// Resolve a link's endpoint ids to live bodies, for callers that need
    /// coordinates. `None` until both endpoints have been placed.
    #[allow(dead_code)]
    pub fn resolve_endpoints(&self, link: &AggregatedLink) -> Option<(SimBody, SimBody)> {
        let source = self.node(&link.source)?.body?;
        let target = self.node(&link.target)?.body?;
        Some((source, target))
    }

    /// Reconcile the displayed/queued state against a new filtered target.
    ///
    /// Displayed and queued items that left the target are dropped, target
    /// items we have never seen are queued (or admitted straight away when
    /// `animate` is off), and surviving displayed items refresh their
    /// store-owned attributes while keeping their simulation body
    /// untouched.
    pub fn reconcile(&mut self, target: GraphData, animate: bool) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        let target_node_ids: HashSet<&str> =
            target.nodes.iter().map(|n| n.address.as_str()).collect();
        let target_link_keys: HashSet<String> = target.links.iter().map(|l| l.key()).collect();

        // Drop displayed items that are no longer wanted
        let nodes_before = self.nodes.len();
        self.nodes
            .retain(|n| target_node_ids.contains(n.account.address.as_str()));
        summary.removed_nodes = nodes_before - self.nodes.len();

        let links_before = self.links.len();
        self.links.retain(|l| target_link_keys.contains(&l.key()));
        summary.removed_links = links_before - self.links.len();
        self.rebuild_indexes();

        // Purge the queues of anything that left the target. A queued link
        // whose endpoint was filtered out goes with it, so nothing queued
        // can ever become permanently ineligible.
        self.pending_nodes
            .retain(|n| target_node_ids.contains(n.address.as_str()));
        self.pending_links.retain(|l| {
            target_link_keys.contains(&l.key())
                && target_node_ids.contains(l.source.as_str())
                && target_node_ids.contains(l.target.as_str())
        });
        self.queued_nodes = self
            .pending_nodes
            .iter()
            .map(|n| n.address.clone())
            .collect();
        self.queued_links = self.pending_links.iter().map(|l| l.key()).collect();

        // Nodes first, links second, so immediate admission never creates
        // a dangling link even transiently
        for node in &target.nodes {
            if node.address.is_empty() {
                continue;
            }
            if let Some(&i) = self.node_index.get(&node.address) {
                // keep the body, refresh everything the store owns
                self.nodes[i].account = node.clone();
            } else if self.queued_nodes.contains(&node.address) {
                if let Some(queued) = self
                    .pending_nodes
                    .iter_mut()
                    .find(|n| n.address == node.address)
                {
                    *queued = node.clone();
                }
            } else if animate {
                self.queued_nodes.insert(node.address.clone());
                self.pending_nodes.push_back(node.clone());
                summary.queued_nodes += 1;
            } else {
                self.admit_node(node.clone(), None);
                summary.admitted_nodes += 1;
            }
        }

        for link in &target.links {
            if link.source.is_empty() || link.target.is_empty() {
                continue; // malformed identity, drop silently
            }
            // a link whose endpoint the target does not carry can never
            // become admissible; drop it here instead of letting it starve
            if !self.tracked(&link.source) || !self.tracked(&link.target) {
                continue;
            }
            let key = link.key();
            if let Some(&i) = self.link_index.get(&key) {
                self.links[i] = link.clone();
            } else if self.queued_links.contains(&key) {
                if let Some(queued) = self.pending_links.iter_mut().find(|l| l.key() == key) {
                    *queued = link.clone();
                }
            } else if animate {
                self.queued_links.insert(key);
                self.pending_links.push_back(link.clone());
                summary.queued_links += 1;
            } else {
                self.admit_link(link.clone());
                summary.admitted_links += 1;
            }
        }

        self.target_links = target.links;
        summary
    }

    /// Admit everything still queued, nodes before links. Used when the
    /// admission animation is switched off with a non-empty queue.
    pub fn flush_pending(&mut self) -> usize {
        let mut admitted = 0;
        while let Some(node) = self.pending_nodes.pop_front() {
            self.admit_node(node, None);
            admitted += 1;
        }
        while let Some(link) = self.pending_links.pop_front() {
            self.admit_link(link);
            admitted += 1;
        }
        self.queued_nodes.clear();
        self.queued_links.clear();
        admitted
    }

    /// Apply position write-backs from the simulation. Only displayed
    /// nodes are touched; unknown ids are ignored.
    pub fn apply_positions(&mut self, updates: &[PositionUpdate]) {
        for update in updates {
            if let Some(&i) = self.node_index.get(&update.id) {
                self.nodes[i].body = Some(SimBody {
                    x: update.x,
                    y: update.y,
                    z: update.z,
                    vx: update.vx,
                    vy: update.vy,
                    vz: update.vz,
                });
            }
        }
    }

    /// Displayed or queued — the two states a link endpoint may rely on
    fn tracked(&self, id: &str) -> bool {
        self.node_index.contains_key(id) || self.queued_nodes.contains(id)
    }

    pub(crate) fn admit_node(&mut self, account: AccountNode, body: Option<SimBody>) {
        self.queued_nodes.remove(&account.address);
        self.node_index
            .insert(account.address.clone(), self.nodes.len());
        self.nodes.push(DisplayedNode { account, body });
    }

    pub(crate) fn admit_link(&mut self, link: AggregatedLink) {
        self.queued_links.remove(&link.key());
        self.link_index.insert(link.key(), self.links.len());
        self.links.push(link);
    }

    fn rebuild_indexes(&mut self) {
        self.node_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.account.address.clone(), i))
            .collect();
        self.link_index = self
            .links
            .iter()
            .enumerate()
            .map(|(i, l)| (l.key(), i))
            .collect();
    }
}
