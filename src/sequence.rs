//! A single gesture recognizer.
//!
//! An [`EventSequence`] watches the event stream for one ordered pattern of
//! event names occurring on the same track within a bounded time window. The
//! first pattern event arms the recognizer; every event observed after that
//! is recorded until the time budget runs out; the recorded history is then
//! scored against the target pattern with [`crate::similarity::ratio`].
//!
//! A recognizer may additionally require a confirmation event (`wait_for`).
//! The confirmation sets a one-shot latch; a recognizer whose latch is still
//! closed when its budget expires reports a non-match, since the event that
//! would prove the gesture never arrived.
//!
//! Lifecycle: `idle` -> `monitoring` (first pattern event with a non-zero
//! time position on a non-ad track) -> `reporting` (budget expired, match
//! result taken) -> `idle` (reset by the arbiter once the gesture settles).

use std::time::Duration;

use crate::{
    arbiter::MatchResult,
    dispatch::Action,
    events::{EventName, Observed},
    similarity,
    uri::PandoraUri,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Monitoring,
    Reporting,
}

/// Recognizer for one ordered event pattern.
#[derive(Debug)]
pub struct EventSequence {
    action: Action,
    pattern: Vec<EventName>,
    wait_for: Option<EventName>,
    interval: Duration,
    strict: bool,

    state: State,
    events_seen: Vec<EventName>,
    target_track: Option<PandoraUri>,
    latch_released: bool,
    cycle: u64,
}

impl EventSequence {
    #[must_use]
    pub fn new(action: Action, pattern: Vec<EventName>, interval: Duration) -> Self {
        Self {
            action,
            pattern,
            wait_for: None,
            interval,
            strict: false,
            state: State::Idle,
            events_seen: Vec::new(),
            target_track: None,
            latch_released: true,
            cycle: 0,
        }
    }

    /// Requires `event` to arrive before the recognizer may report a match.
    #[must_use]
    pub fn wait_for(mut self, event: EventName) -> Self {
        self.wait_for = Some(event);
        self.latch_released = false;
        self
    }

    /// Only reports a match when the observed events equal the target
    /// pattern exactly.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The arming generation, used to tell live timer expiries from stale
    /// ones left over from a previous gesture.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == State::Monitoring
    }

    /// Events recorded since arming. Empty whenever the recognizer is idle.
    #[must_use]
    pub fn events_seen(&self) -> &[EventName] {
        &self.events_seen
    }

    /// Consumes one event.
    ///
    /// Returns `true` when this event armed the recognizer, in which case
    /// the caller must schedule a budget timer for the current cycle.
    pub fn notify(&mut self, observed: &Observed) -> bool {
        let mut armed = false;

        match self.state {
            State::Monitoring => self.events_seen.push(observed.name),
            State::Idle => {
                if self.pattern.first() == Some(&observed.name) && Self::can_arm(observed) {
                    self.arm(observed);
                    armed = true;
                }
            }
            // The result is already taken; late events belong to no gesture.
            State::Reporting => {}
        }

        if self.wait_for == Some(observed.name) {
            self.latch_released = true;
        }

        armed
    }

    /// A recognizer only arms once playback has actually progressed past the
    /// start of a real (non-advertisement) track.
    fn can_arm(observed: &Observed) -> bool {
        let progressed = observed.time_position.is_some_and(|position| position > 0);
        let track = observed.track.as_ref().is_some_and(|track| !track.is_ad());
        progressed && track
    }

    fn arm(&mut self, observed: &Observed) {
        self.state = State::Monitoring;
        self.target_track = observed.track.clone();
        self.events_seen.clear();
        self.latch_released = self.wait_for.is_none();
    }

    /// Ends monitoring and produces this recognizer's match result.
    ///
    /// Called when the budget timer for the current cycle expires. A closed
    /// wait-for latch means the confirming event never arrived, which makes
    /// the result a non-match regardless of what was seen.
    ///
    /// Returns `None` when the recognizer is not monitoring.
    pub fn take_result(&mut self, sequence: usize) -> Option<MatchResult> {
        if self.state != State::Monitoring {
            return None;
        }
        self.state = State::Reporting;

        let track = self.target_track.clone()?;
        let ratio = if self.latch_released { self.ratio() } else { 0.0 };
        Some(MatchResult::new(ratio, self.action, track, sequence))
    }

    /// Similarity between the events seen and the target pattern.
    ///
    /// The target includes the wait-for event when one is configured; it is
    /// part of what the gesture is expected to look like.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        let seen = joined(self.events_seen.iter().copied());
        let target = joined(self.pattern.iter().copied().chain(self.wait_for));

        let ratio = similarity::ratio(&target, &seen);
        if self.strict && ratio < 1.0 {
            return 0.0;
        }
        ratio
    }

    /// Returns to idle and invalidates any timer still in flight.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.events_seen.clear();
        self.target_track = None;
        self.latch_released = self.wait_for.is_none();
        self.cycle = self.cycle.wrapping_add(1);
    }
}

fn joined(names: impl Iterator<Item = EventName>) -> String {
    names
        .map(|name| name.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> PandoraUri {
        "pandora:track:ST1:TK1".parse().unwrap()
    }

    fn paused(position: u64) -> Observed {
        Observed::new(
            EventName::TrackPlaybackPaused,
            Some(track()),
            Some(position),
        )
    }

    fn resumed(position: u64) -> Observed {
        Observed::new(
            EventName::TrackPlaybackResumed,
            Some(track()),
            Some(position),
        )
    }

    fn sequence() -> EventSequence {
        EventSequence::new(
            Action::ThumbsUp,
            vec![
                EventName::TrackPlaybackPaused,
                EventName::TrackPlaybackResumed,
            ],
            Duration::from_millis(500),
        )
    }

    #[test]
    fn arms_on_first_pattern_event() {
        let mut sequence = sequence();
        assert!(sequence.notify(&paused(100)));
        assert!(sequence.is_running());
        assert!(sequence.events_seen().is_empty());
    }

    #[test]
    fn does_not_arm_at_track_start() {
        let mut sequence = sequence();
        assert!(!sequence.notify(&paused(0)));
        assert!(!sequence.is_running());
    }

    #[test]
    fn does_not_arm_on_ad_track() {
        let mut sequence = sequence();
        let ad: PandoraUri = "pandora:ad:ST1:AD1".parse().unwrap();
        let observed = Observed::new(EventName::TrackPlaybackPaused, Some(ad), Some(100));
        assert!(!sequence.notify(&observed));
        assert!(!sequence.is_running());
    }

    #[test]
    fn does_not_arm_without_a_track() {
        let mut sequence = sequence();
        let observed = Observed::new(EventName::TrackPlaybackPaused, None, Some(100));
        assert!(!sequence.notify(&observed));
        assert!(!sequence.is_running());
    }

    #[test]
    fn does_not_arm_twice() {
        let mut sequence = sequence();
        assert!(sequence.notify(&paused(100)));
        assert!(!sequence.notify(&paused(200)));
        assert_eq!(
            sequence.events_seen(),
            &[EventName::TrackPlaybackPaused],
            "the second pause is recorded, not re-armed"
        );
    }

    #[test]
    fn exact_match_scores_one() {
        let mut sequence = sequence();
        sequence.notify(&paused(100));
        sequence.notify(&paused(100));
        sequence.notify(&resumed(200));
        // Seen [paused, resumed] against target [paused, resumed].
        let result = sequence.take_result(0).unwrap();
        assert!((result.ratio() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn armed_with_nothing_seen_scores_zero() {
        let mut sequence = sequence();
        sequence.notify(&paused(100));
        let result = sequence.take_result(0).unwrap();
        assert_eq!(result.ratio(), 0.0);
    }

    #[test]
    fn strict_zeroes_partial_matches() {
        let mut sequence = EventSequence::new(
            Action::ThumbsUp,
            vec![
                EventName::TrackPlaybackPaused,
                EventName::TrackPlaybackResumed,
            ],
            Duration::from_millis(500),
        )
        .strict();
        sequence.notify(&paused(100));
        sequence.notify(&paused(100));
        assert_eq!(sequence.ratio(), 0.0);

        sequence.notify(&resumed(200));
        sequence.notify(&paused(300));
        assert_eq!(sequence.ratio(), 0.0, "extra events break a strict match");
    }

    #[test]
    fn closed_latch_reports_non_match() {
        let mut sequence = EventSequence::new(
            Action::ThumbsDown,
            vec![EventName::TrackPlaybackPaused, EventName::PreparingTrack],
            Duration::from_millis(500),
        )
        .wait_for(EventName::TrackChangedNext);

        sequence.notify(&paused(100));
        sequence.notify(&Observed::new(EventName::PreparingTrack, None, None));
        let result = sequence.take_result(0).unwrap();
        assert_eq!(result.ratio(), 0.0);
    }

    #[test]
    fn released_latch_reports_seen_ratio() {
        let mut sequence = EventSequence::new(
            Action::ThumbsDown,
            vec![EventName::TrackPlaybackPaused, EventName::PreparingTrack],
            Duration::from_millis(500),
        )
        .wait_for(EventName::TrackChangedNext);

        sequence.notify(&paused(100));
        sequence.notify(&Observed::new(EventName::PreparingTrack, None, None));
        sequence.notify(&Observed::new(EventName::TrackChangedNext, None, None));
        let result = sequence.take_result(0).unwrap();
        assert!(result.ratio() > 0.0);
    }

    #[test]
    fn reset_returns_to_an_empty_idle() {
        let mut sequence = sequence();
        sequence.notify(&paused(100));
        sequence.notify(&resumed(200));
        let cycle = sequence.cycle();

        sequence.reset();
        assert!(!sequence.is_running());
        assert!(sequence.events_seen().is_empty());
        assert_ne!(sequence.cycle(), cycle);
    }

    #[test]
    fn resetting_an_idle_sequence_is_harmless() {
        let mut sequence = sequence();
        sequence.reset();
        assert!(!sequence.is_running());
        assert!(sequence.events_seen().is_empty());
    }

    #[test]
    fn take_result_when_idle_is_none() {
        let mut sequence = sequence();
        assert!(sequence.take_result(0).is_none());
    }
}
