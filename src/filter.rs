use crate::models::GraphData;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Re-filter the aggregated graph to what is active as of `cursor`.
///
/// A link survives when it was last active on or before the cursor, falls
/// inside the recency window when one is set, and both of its endpoints
/// exist in the graph's node set. Nodes survive only as endpoints of a
/// surviving link, so the result never contains a dangling reference or a
/// floating node.
pub fn filter_window(
    graph: &GraphData,
    cursor: DateTime<Utc>,
    recent_window: Option<Duration>,
) -> GraphData {
    let known: HashSet<&str> = graph.nodes.iter().map(|n| n.address.as_str()).collect();
    let earliest = recent_window.map(|w| cursor - w);

    let links: Vec<_> = graph
        .links
        .iter()
        .filter(|l| l.date <= cursor)
        .filter(|l| earliest.map_or(true, |e| l.date >= e))
        .filter(|l| known.contains(l.source.as_str()) && known.contains(l.target.as_str()))
        .cloned()
        .collect();

    let active: HashSet<&str> = links
        .iter()
        .flat_map(|l| [l.source.as_str(), l.target.as_str()])
        .collect();

    let nodes = graph
        .nodes
        .iter()
        .filter(|n| active.contains(n.address.as_str()))
        .cloned()
        .collect();

    GraphData { nodes, links }
}
