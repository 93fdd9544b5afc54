use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Force-simulation tuning, applied verbatim by the rendering engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub charge_strength: f64,
    pub link_distance: f64,
    pub center_gravity: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            charge_strength: -30.0,
            link_distance: 30.0,
            center_gravity: 0.1,
        }
    }
}

/// Explicit debounce policy: hold the latest value until `delay` has
/// passed without another set, then release it once through `poll`.
/// Keeps UI slider drags from thrashing the simulation.
#[derive(Debug)]
pub struct Debounce<T> {
    pending: Option<(Instant, T)>,
    delay: Duration,
}

impl<T: Clone> Debounce<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            pending: None,
            delay,
        }
    }

    pub fn set(&mut self, value: T) {
        self.set_at(value, Instant::now());
    }

    /// Flush the pending value if its deadline has passed
    pub fn poll(&mut self) -> Option<T> {
        self.poll_at(Instant::now())
    }

    pub fn set_at(&mut self, value: T, now: Instant) {
        // every set re-arms the deadline
        self.pending = Some((now + self.delay, value));
    }

    pub fn poll_at(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((deadline, _)) if now >= *deadline => self.pending.take().map(|(_, v)| v),
            _ => None,
        }
    }
}
