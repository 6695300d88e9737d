//! Bounded top-k/bottom-k tracking over a streaming pass.
//!
//! Two fixed-size sorted slot arrays; a new score that beats the worst kept
//! entry is inserted in place and the displaced last slot discarded. No full
//! sort of the stream ever happens. Empty slots stay `None`, which callers
//! must treat as "no data".

/// Keeps the `k` highest and `k` lowest scored items seen so far.
#[derive(Debug, Clone)]
pub struct ExtremesTracker<T> {
    highest: Vec<Option<(f64, T)>>,
    lowest: Vec<Option<(f64, T)>>,
}

impl<T: Clone> ExtremesTracker<T> {
    pub fn new(k: usize) -> Self {
        Self {
            highest: vec![None; k],
            lowest: vec![None; k],
        }
    }

    pub fn observe(&mut self, score: f64, item: T) {
        insert_sorted(&mut self.highest, score, item.clone(), |new, kept| new > kept);
        insert_sorted(&mut self.lowest, score, item, |new, kept| new < kept);
    }

    /// Kept highest entries, best first. `None` slots mean the stream held
    /// fewer items than `k`.
    pub fn highest(&self) -> &[Option<(f64, T)>] {
        &self.highest
    }

    /// Kept lowest entries, worst first.
    pub fn lowest(&self) -> &[Option<(f64, T)>] {
        &self.lowest
    }

    pub fn is_empty(&self) -> bool {
        self.highest.iter().all(Option::is_none)
    }

    /// Merges another tracker's kept entries into this one. Both stay
    /// bounded, so the union is too. Each side merges only into its own
    /// side: a short stream keeps the same record in both arrays, and
    /// re-observing it whole would insert it twice.
    pub fn merge(&mut self, other: &ExtremesTracker<T>) {
        for (score, item) in other.highest.iter().flatten() {
            insert_sorted(&mut self.highest, *score, item.clone(), |new, kept| new > kept);
        }
        for (score, item) in other.lowest.iter().flatten() {
            insert_sorted(&mut self.lowest, *score, item.clone(), |new, kept| new < kept);
        }
    }
}

fn insert_sorted<T>(
    slots: &mut [Option<(f64, T)>],
    score: f64,
    item: T,
    beats: impl Fn(f64, f64) -> bool,
) {
    let mut position = None;
    for (i, slot) in slots.iter().enumerate() {
        match slot {
            None => {
                position = Some(i);
                break;
            }
            Some((kept, _)) if beats(score, *kept) => {
                position = Some(i);
                break;
            }
            Some(_) => {}
        }
    }
    if let Some(i) = position {
        // shift the tail down one slot, dropping the last
        for j in (i + 1..slots.len()).rev() {
            slots[j] = slots[j - 1].take();
        }
        slots[i] = Some((score, item));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kept_scores<T: Clone>(slots: &[Option<(f64, T)>]) -> Vec<f64> {
        slots.iter().flatten().map(|(s, _)| *s).collect()
    }

    #[test]
    fn known_stream_yields_known_extremes() {
        let mut tracker = ExtremesTracker::new(3);
        for (i, score) in [0.2, 0.9, 0.5, 0.95, 0.1, 0.7].into_iter().enumerate() {
            tracker.observe(score, i);
        }
        assert_eq!(kept_scores(tracker.highest()), vec![0.95, 0.9, 0.7]);
        assert_eq!(kept_scores(tracker.lowest()), vec![0.1, 0.2, 0.5]);
    }

    #[test]
    fn arrival_order_does_not_matter() {
        let mut reversed = ExtremesTracker::new(3);
        for (i, score) in [0.7, 0.1, 0.95, 0.5, 0.9, 0.2].into_iter().enumerate() {
            reversed.observe(score, i);
        }
        assert_eq!(kept_scores(reversed.highest()), vec![0.95, 0.9, 0.7]);
        assert_eq!(kept_scores(reversed.lowest()), vec![0.1, 0.2, 0.5]);
    }

    #[test]
    fn empty_stream_leaves_null_slots() {
        let tracker: ExtremesTracker<&str> = ExtremesTracker::new(3);
        assert!(tracker.is_empty());
        assert!(tracker.highest().iter().all(Option::is_none));
        assert!(tracker.lowest().iter().all(Option::is_none));
    }

    #[test]
    fn short_stream_fills_from_the_front() {
        let mut tracker = ExtremesTracker::new(3);
        tracker.observe(0.4, "only");
        assert_eq!(kept_scores(tracker.highest()), vec![0.4]);
        assert!(tracker.highest()[1].is_none());
        assert!(!tracker.is_empty());
    }

    #[test]
    fn merge_of_short_streams_keeps_each_item_once() {
        // streams shorter than k keep every record in both arrays; the
        // merge must not count those records twice
        let mut good = ExtremesTracker::new(3);
        good.observe(0.9, "g");
        let mut bad = ExtremesTracker::new(3);
        bad.observe(0.5, "b2");
        bad.observe(0.3, "b1");

        good.merge(&bad);
        let lowest: Vec<(f64, &str)> = good.lowest().iter().flatten().copied().collect();
        assert_eq!(lowest, vec![(0.3, "b1"), (0.5, "b2"), (0.9, "g")]);
        let highest: Vec<(f64, &str)> = good.highest().iter().flatten().copied().collect();
        assert_eq!(highest, vec![(0.9, "g"), (0.5, "b2"), (0.3, "b1")]);
    }

    #[test]
    fn merge_stays_bounded() {
        let mut left = ExtremesTracker::new(3);
        let mut right = ExtremesTracker::new(3);
        for (i, score) in [0.2, 0.9, 0.5].into_iter().enumerate() {
            left.observe(score, i);
        }
        for (i, score) in [0.95, 0.1, 0.7].into_iter().enumerate() {
            right.observe(score, i + 3);
        }
        left.merge(&right);
        assert_eq!(kept_scores(left.highest()), vec![0.95, 0.9, 0.7]);
        assert_eq!(kept_scores(left.lowest()), vec![0.1, 0.2, 0.5]);
    }
}
