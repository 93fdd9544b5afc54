use std::time::{Duration, Instant};

/// Single-slot TTL cache guarding the upstream fetch cadence. Holds the
/// last good value and reports it fresh until the TTL runs out.
#[derive(Debug)]
pub struct TtlCache<T> {
    slot: Option<(Instant, T)>,
    ttl: Duration,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { slot: None, ttl }
    }

    pub fn set(&mut self, value: T) {
        self.set_at(value, Instant::now());
    }

    /// The cached value, only while it is still fresh
    pub fn get(&self) -> Option<&T> {
        self.get_at(Instant::now())
    }

    pub fn set_at(&mut self, value: T, now: Instant) {
        self.slot = Some((now, value));
    }

    pub fn get_at(&self, now: Instant) -> Option<&T> {
        match &self.slot {
            Some((stored, value)) if now.duration_since(*stored) < self.ttl => Some(value),
            _ => None,
        }
    }
}
