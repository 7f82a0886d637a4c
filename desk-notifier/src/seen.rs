use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

/// Items already notified, keyed by id and timestamp. Entries leave the set
/// once their timestamp falls out of the window, so it never outgrows the
/// number of items inside the window.
#[derive(Debug)]
pub struct SeenWindow {
    window: Duration,
    entries: HashSet<(String, DateTime<Utc>)>,
}

impl SeenWindow {
    pub fn new(window: std::time::Duration) -> Self {
        Self {
            window: Duration::from_std(window).unwrap_or(Duration::MAX),
            entries: HashSet::new(),
        }
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn within(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        timestamp >= self.cutoff(now)
    }

    pub fn evict(&mut self, now: DateTime<Utc>) {
        let cutoff = self.cutoff(now);
        self.entries.retain(|(_, ts)| *ts >= cutoff);
    }

    /// Returns `true` when the pair was not seen before.
    pub fn insert(&mut self, id: &str, timestamp: DateTime<Utc>) -> bool {
        self.entries.insert((id.to_string(), timestamp))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> SeenWindow {
        SeenWindow::new(std::time::Duration::from_secs(300))
    }

    #[test]
    fn same_pair_is_seen_once() {
        let mut seen = window();
        let ts = Utc::now();
        assert!(seen.insert("c1", ts));
        assert!(!seen.insert("c1", ts));
        assert!(seen.insert("c1", ts + Duration::seconds(1)));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn eviction_drops_entries_outside_the_window() {
        let mut seen = window();
        let now = Utc::now();
        seen.insert("old", now - Duration::seconds(301));
        seen.insert("fresh", now - Duration::seconds(10));

        seen.evict(now);
        assert_eq!(seen.len(), 1);
        assert!(!seen.insert("fresh", now - Duration::seconds(10)));
    }

    #[test]
    fn within_respects_the_boundary() {
        let seen = window();
        let now = Utc::now();
        assert!(seen.within(now - Duration::seconds(300), now));
        assert!(!seen.within(now - Duration::seconds(301), now));
        assert!(seen.within(now, now));
    }
}
