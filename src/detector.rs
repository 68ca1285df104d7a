//! Track-change direction detection.
//!
//! The player does not say whether the user skipped forward or backward; it
//! only emits `ended` followed by `started`. Direction has to be inferred
//! from the playback history: skipping backward makes the player re-queue
//! the track it just played, so the same URI shows up twice in a row at the
//! top of the history. Skipping forward queues a fresh track instead.
//!
//! The detector keeps at most one marker, the last `ended` event. When the
//! next `started` (or `resumed`) arrives it classifies the transition and
//! hands back a synthetic direction event for the recognizers to wait on.

use std::collections::VecDeque;

use crate::{events::EventName, uri::PandoraUri};

/// How many history entries to retain. Direction classification only ever
/// looks at the entries surrounding the most recent track end.
const HISTORY_LIMIT: usize = 32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// A classified track transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackChange {
    pub direction: Direction,
    pub old_uri: PandoraUri,
    pub new_uri: PandoraUri,
}

/// Playback history, most recent first.
///
/// Fed by the monitor from `track_playback_started` events; the detector
/// only reads it.
#[derive(Debug, Default)]
pub struct TrackHistory {
    entries: VecDeque<(u64, PandoraUri)>,
}

impl TrackHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `uri` started playing at `at`.
    pub fn record(&mut self, at: u64, uri: PandoraUri) {
        self.entries.push_front((at, uri));
        self.entries.truncate(HISTORY_LIMIT);
    }

    fn entries(&self) -> impl Iterator<Item = &(u64, PandoraUri)> {
        self.entries.iter()
    }

    fn entry(&self, index: usize) -> Option<&(u64, PandoraUri)> {
        self.entries.get(index)
    }
}

/// The last-ended marker. At most one is live at a time.
#[derive(Clone, Debug)]
struct Marker {
    uri: PandoraUri,
    at: u64,
}

/// Classifies raw start/end events into direction-tagged track changes.
#[derive(Debug, Default)]
pub struct TrackChangeDetector {
    marker: Option<Marker>,
}

impl TrackChangeDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one raw event through the detector.
    ///
    /// Returns a [`TrackChange`] when the event completes a transition, that
    /// is, a `started` or `resumed` arriving after an `ended` marker. The
    /// marker is consumed either way.
    pub fn observe(
        &mut self,
        name: EventName,
        track: Option<&PandoraUri>,
        at: u64,
        history: &TrackHistory,
    ) -> Option<TrackChange> {
        match name {
            EventName::TrackPlaybackEnded => {
                if let Some(track) = track {
                    self.marker = Some(Marker {
                        uri: track.clone(),
                        at,
                    });
                }
                None
            }
            EventName::TrackPlaybackStarted | EventName::TrackPlaybackResumed => {
                let marker = self.marker.take()?;
                let new_uri = track?.clone();
                let direction = Self::classify(&marker, history);
                Some(TrackChange {
                    direction,
                    old_uri: marker.uri,
                    new_uri,
                })
            }
            _ => None,
        }
    }

    /// Finds the most recent history entry from before the marker; when the
    /// entry queued after it carries the marker's own URI, the player
    /// re-queued the track and the user skipped backward.
    fn classify(marker: &Marker, history: &TrackHistory) -> Direction {
        let before_marker = history
            .entries()
            .position(|(at, _)| *at < marker.at)
            .filter(|index| *index > 0);

        match before_marker.and_then(|index| history.entry(index - 1)) {
            Some((_, uri)) if *uri == marker.uri => Direction::Previous,
            _ => Direction::Next,
        }
    }
}
