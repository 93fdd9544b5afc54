use std::collections::HashMap;
use std::f64::consts::PI;
use std::time::{Duration, Instant};

/// Tracks "just admitted" timestamps for nodes and links and turns them
/// into a decaying highlight intensity for the renderer. Purely visual;
/// membership in the graph is decided elsewhere.
#[derive(Debug)]
pub struct PulseTracker {
    nodes: HashMap<String, Instant>,
    links: HashMap<String, Instant>,
    duration: Duration,
}

impl PulseTracker {
    pub fn new(duration: Duration) -> Self {
        Self {
            nodes: HashMap::new(),
            links: HashMap::new(),
            duration,
        }
    }

    pub fn mark_node(&mut self, id: &str) {
        self.mark_node_at(id, Instant::now());
    }

    pub fn mark_link(&mut self, key: &str) {
        self.mark_link_at(key, Instant::now());
    }

    pub fn node_intensity(&self, id: &str) -> f64 {
        self.intensity_at(self.nodes.get(id).copied(), Instant::now())
    }

    pub fn link_intensity(&self, key: &str) -> f64 {
        self.intensity_at(self.links.get(key).copied(), Instant::now())
    }

    /// Drop marks whose pulse has fully decayed.
    pub fn cleanup(&mut self) {
        let duration = self.duration;
        let now = Instant::now();
        self.nodes.retain(|_, marked| now.duration_since(*marked) < duration);
        self.links.retain(|_, marked| now.duration_since(*marked) < duration);
    }

    pub fn mark_node_at(&mut self, id: &str, when: Instant) {
        self.nodes.insert(id.to_string(), when);
    }

    pub fn mark_link_at(&mut self, key: &str, when: Instant) {
        self.links.insert(key.to_string(), when);
    }

    /// Damped oscillation over the pulse duration: starts at 1.0, rings
    /// one and a half times, dies out to 0.0. Always within [0, 1].
    fn intensity_at(&self, marked: Option<Instant>, now: Instant) -> f64 {
        let Some(marked) = marked else { return 0.0 };
        let elapsed = now.duration_since(marked);
        if elapsed >= self.duration {
            return 0.0;
        }
        let progress = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        (progress * 3.0 * PI).cos() * (1.0 - progress) * 0.5 + 0.5 * (1.0 - progress)
    }

    #[cfg(test)]
    fn node_intensity_at(&self, id: &str, now: Instant) -> f64 {
        self.intensity_at(self.nodes.get(id).copied(), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> PulseTracker {
        PulseTracker::new(Duration::from_millis(1000))
    }

    #[test]
    fn unmarked_ids_have_zero_intensity() {
        assert_eq!(tracker().node_intensity("nobody"), 0.0);
        assert_eq!(tracker().link_intensity("no-link"), 0.0);
    }

    #[test]
    fn fresh_mark_starts_at_full_intensity() {
        let mut t = tracker();
        let t0 = Instant::now();
        t.mark_node_at("A", t0);
        assert!((t.node_intensity_at("A", t0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn intensity_stays_within_unit_range_and_decays_to_zero() {
        let mut t = tracker();
        let t0 = Instant::now();
        t.mark_node_at("A", t0);

        for step in 0..=100 {
            let now = t0 + Duration::from_millis(step * 10);
            let intensity = t.node_intensity_at("A", now);
            assert!((0.0..=1.0).contains(&intensity), "out of range at step {}", step);
        }
        assert_eq!(t.node_intensity_at("A", t0 + Duration::from_millis(1000)), 0.0);
    }

    #[test]
    fn cleanup_purges_expired_marks_only() {
        let mut t = tracker();
        let stale = Instant::now() - Duration::from_secs(10);
        t.mark_node_at("old", stale);
        t.mark_node_at("new", Instant::now());
        t.mark_link_at("old-link", stale);

        t.cleanup();
        assert_eq!(t.nodes.len(), 1);
        assert!(t.nodes.contains_key("new"));
        assert!(t.links.is_empty());
    }
}
