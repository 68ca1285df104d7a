//! Events flowing through the gesture monitor.
//!
//! Three kinds of events live here:
//! * [`PlaybackEvent`] - raw events received from the media player
//! * [`EventName`] - the closed set of names gesture patterns are written in
//! * [`MonitorEvent`] - events the monitor emits to its listeners
//!
//! Raw events arrive as tagged JSON objects, for example:
//!
//! ```json
//! {"event": "track_playback_paused", "uri": "pandora:track:ST1:TK1", "time_position": 1234}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{dispatch::Action, uri::PandoraUri};

/// A raw playback event as delivered by the media player.
///
/// Track URIs are carried verbatim; parsing and validation happen inside the
/// monitor so that a malformed URI degrades into a logged non-event instead
/// of a deserialization failure.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// A track has started playing. Carries a track URI and a time position
    /// of zero.
    TrackPlaybackStarted {
        uri: String,
        #[serde(default)]
        time_position: u64,
    },

    /// Playback was paused at the given position.
    TrackPlaybackPaused { uri: String, time_position: u64 },

    /// Playback resumed from the given position.
    TrackPlaybackResumed { uri: String, time_position: u64 },

    /// The current track finished or was skipped away from.
    TrackPlaybackEnded { uri: String },

    /// The player is fetching the next track. No payload.
    PreparingTrack,

    /// The tracklist changed. Informational; ignored by the monitor.
    TracklistChanged,
}

/// The closed set of event names gesture patterns can reference.
///
/// This includes the two synthetic direction events produced by the
/// track-change detector, which never arrive from the player directly.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventName {
    TrackPlaybackStarted,
    TrackPlaybackPaused,
    TrackPlaybackResumed,
    TrackPlaybackEnded,
    PreparingTrack,
    TrackChangedNext,
    TrackChangedPrevious,
}

impl EventName {
    /// The wire name, as used in patterns and similarity scoring.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::TrackPlaybackStarted => "track_playback_started",
            EventName::TrackPlaybackPaused => "track_playback_paused",
            EventName::TrackPlaybackResumed => "track_playback_resumed",
            EventName::TrackPlaybackEnded => "track_playback_ended",
            EventName::PreparingTrack => "preparing_track",
            EventName::TrackChangedNext => "track_changed_next",
            EventName::TrackChangedPrevious => "track_changed_previous",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized event as seen inside the monitor: the event name, the parsed
/// track (when one was present and valid), and the playback position.
///
/// Synthetic detector events and events with unparseable URIs carry no
/// track; they can still be appended to a running recognizer's history but
/// can never arm one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observed {
    pub name: EventName,
    pub track: Option<PandoraUri>,
    pub time_position: Option<u64>,
}

impl Observed {
    #[must_use]
    pub fn new(name: EventName, track: Option<PandoraUri>, time_position: Option<u64>) -> Self {
        Self {
            name,
            track,
            time_position,
        }
    }
}

/// Events emitted by the monitor to its subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// A gesture was recognized; `action` applies to `track_uri`.
    EventTriggered {
        track_uri: PandoraUri,
        action: Action,
    },

    /// Playback skipped forward to a new track.
    TrackChangedNext {
        old_uri: PandoraUri,
        new_uri: PandoraUri,
    },

    /// Playback skipped back; in consume mode the player re-queues the same
    /// track, so `old_uri` and `new_uri` usually coincide.
    TrackChangedPrevious {
        old_uri: PandoraUri,
        new_uri: PandoraUri,
    },

    /// The dispatcher finished the remote call for a recognized gesture,
    /// successfully or not.
    EventProcessed {
        track_uri: PandoraUri,
        action: Action,
    },
}
