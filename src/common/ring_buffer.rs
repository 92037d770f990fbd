use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// Ordered record of call instants, pruned to a trailing window.
#[derive(Debug, Default)]
pub struct CallWindow {
    stamps: VecDeque<DateTime<Utc>>,
}

impl CallWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            stamps: VecDeque::with_capacity(capacity),
        }
    }

    /// Drops every stamp at or before `cutoff`.
    pub fn prune(&mut self, cutoff: DateTime<Utc>) {
        self.stamps.retain(|t| *t > cutoff);
    }

    pub fn record(&mut self, at: DateTime<Utc>) {
        self.stamps.push_back(at);
    }

    /// Number of stamps strictly after `cutoff`, without pruning.
    pub fn count_after(&self, cutoff: DateTime<Utc>) -> usize {
        self.stamps.iter().filter(|t| **t > cutoff).count()
    }

    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.stamps.iter().min().copied()
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_prune_keeps_only_stamps_after_cutoff() {
        let base = Utc::now();
        let mut window = CallWindow::new(4);
        window.record(base);
        window.record(base + TimeDelta::seconds(10));
        window.record(base + TimeDelta::seconds(20));

        window.prune(base + TimeDelta::seconds(10));

        assert_eq!(window.len(), 1);
        assert_eq!(window.oldest(), Some(base + TimeDelta::seconds(20)));
    }

    #[test]
    fn test_count_after_does_not_mutate() {
        let base = Utc::now();
        let mut window = CallWindow::new(2);
        window.record(base);
        window.record(base + TimeDelta::seconds(5));

        assert_eq!(window.count_after(base), 1);
        assert_eq!(window.len(), 2);
    }
}
