use crate::models::AggregatedLink;
use chrono::{DateTime, Duration, Utc};

/// The animated "current date" of the dashboard.
///
/// The cursor lives inside the date range spanned by the aggregated links
/// (earliest first-occurrence to latest activity). While playing, `tick`
/// advances it by `speed_hours` per wall-clock second and stops by itself
/// at the range end.
#[derive(Debug, Clone)]
pub struct TimelineCursor {
    date: DateTime<Utc>,
    playing: bool,
    speed_hours: f64,
    range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl TimelineCursor {
    pub fn new(speed_hours: f64) -> Self {
        Self {
            date: Utc::now(),
            playing: false,
            speed_hours,
            range: None,
        }
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn playing(&self) -> bool {
        self.playing
    }

    pub fn speed_hours(&self) -> f64 {
        self.speed_hours
    }

    pub fn range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.range
    }

    /// Derive the range from a fresh link set and clamp the cursor into it.
    /// A cursor that never moved lands on the range end so the whole
    /// network is visible until the user scrubs or plays.
    pub fn set_range_from(&mut self, links: &[AggregatedLink], keep_cursor: bool) {
        let start = links.iter().map(|l| l.date_first).min();
        let end = links.iter().map(|l| l.date).max();
        self.range = match (start, end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        };
        if let Some((start, end)) = self.range {
            if keep_cursor {
                self.date = self.date.clamp(start, end);
            } else {
                self.date = end;
            }
        }
    }

    /// Start playback. At (or past) the range end the cursor rewinds to the
    /// range start first, so "play" on a finished timeline replays it.
    pub fn play(&mut self) {
        if let Some((start, end)) = self.range {
            if self.date >= end {
                self.date = start;
            }
        }
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Stop and rewind to the range start.
    pub fn reset(&mut self) {
        self.playing = false;
        if let Some((start, _)) = self.range {
            self.date = start;
        }
    }

    /// Manual scrub: clamp into range, stop playback. Returns the clamped
    /// date actually applied.
    pub fn set_date(&mut self, date: DateTime<Utc>) -> DateTime<Utc> {
        self.playing = false;
        self.date = match self.range {
            Some((start, end)) => date.clamp(start, end),
            None => date,
        };
        self.date
    }

    pub fn set_speed(&mut self, hours_per_second: f64) {
        self.speed_hours = hours_per_second.max(0.0);
    }

    /// One wall-clock second of playback. Returns true when the cursor
    /// moved (callers re-filter only on movement).
    pub fn tick(&mut self) -> bool {
        if !self.playing {
            return false;
        }
        let Some((_, end)) = self.range else {
            self.playing = false;
            return false;
        };

        let step = Duration::milliseconds((self.speed_hours * 3_600_000.0) as i64);
        let before = self.date;
        let next = before + step;
        if next >= end {
            self.date = end;
            self.playing = false; // auto-stop at the end of the data
        } else {
            self.date = next;
        }
        self.date != before
    }
}
