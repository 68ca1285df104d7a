//! Match arbitration: one winner per gesture.
//!
//! Every recognizer that armed during a gesture submits exactly one
//! [`MatchResult`] once its budget expires. Results collect in a bounded
//! priority queue; when the last engaged recognizer has reported, the
//! arbiter hands back the single highest-ranked result and clears itself for
//! the next gesture. Ranking is by similarity ratio, ties broken by
//! registration order.
//!
//! Whether the winner is worth acting on is the caller's decision: a winning
//! ratio of zero means nothing matched.

use std::{cmp::Ordering, collections::BinaryHeap};

use crate::{dispatch::Action, uri::PandoraUri};

/// One recognizer's report for one gesture.
#[derive(Clone, Debug)]
pub struct MatchResult {
    ratio: f64,
    action: Action,
    track: PandoraUri,
    sequence: usize,
}

impl MatchResult {
    #[must_use]
    pub fn new(ratio: f64, action: Action, track: PandoraUri, sequence: usize) -> Self {
        Self {
            ratio,
            action,
            track,
            sequence,
        }
    }

    #[must_use]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }

    #[must_use]
    pub fn track(&self) -> &PandoraUri {
        &self.track
    }

    /// Index of the recognizer that produced this result, in registration
    /// order.
    #[must_use]
    pub fn sequence(&self) -> usize {
        self.sequence
    }
}

impl PartialEq for MatchResult {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MatchResult {}

impl PartialOrd for MatchResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MatchResult {
    /// Orders by ratio; on equal ratios the earlier-registered recognizer
    /// ranks higher.
    fn cmp(&self, other: &Self) -> Ordering {
        self.ratio
            .total_cmp(&other.ratio)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Collects match results for the gesture in flight.
#[derive(Debug)]
pub struct Arbiter {
    results: BinaryHeap<MatchResult>,
    engaged: usize,
    capacity: usize,
}

impl Arbiter {
    /// Creates an arbiter for `capacity` registered recognizers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            results: BinaryHeap::with_capacity(capacity),
            engaged: 0,
            capacity,
        }
    }

    /// Whether no gesture is currently being collected.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.engaged == 0 && self.results.is_empty()
    }

    /// Records that a recognizer armed and will report for this gesture.
    pub fn sequence_armed(&mut self) {
        self.engaged += 1;
    }

    /// Records that a recognizer armed but can no longer produce a result.
    pub fn sequence_aborted(&mut self) -> Option<MatchResult> {
        self.engaged = self.engaged.saturating_sub(1);
        self.try_settle()
    }

    /// Accepts one result; returns the gesture's winner once every engaged
    /// recognizer has reported or the queue is full.
    pub fn submit(&mut self, result: MatchResult) -> Option<MatchResult> {
        self.results.push(result);
        self.engaged = self.engaged.saturating_sub(1);

        if self.results.len() >= self.capacity {
            return self.settle();
        }
        self.try_settle()
    }

    fn try_settle(&mut self) -> Option<MatchResult> {
        if self.engaged == 0 && !self.results.is_empty() {
            return self.settle();
        }
        None
    }

    fn settle(&mut self) -> Option<MatchResult> {
        let winner = self.results.pop();
        self.results.clear();
        winner
    }
}
