//! The event monitor: the single entry point for raw playback events.
//!
//! The monitor is an actor. One task owns all recognizer state and consumes
//! a mailbox that serializes two kinds of messages: raw playback events and
//! budget-timer expiries. Timers are spawned sleeps that post back into the
//! mailbox, so no recognizer state is ever touched from another task.
//!
//! Per event, the monitor:
//! 1. drops everything happening on advertisement tracks,
//! 2. lets the track-change detector observe the raw event,
//! 3. fans the event out to every registered [`EventSequence`],
//! 4. re-enters any synthetic track-change event through the same path.
//!
//! When a recognizer arms, the monitor schedules a timeout for its time
//! budget. Timeout expiry takes the recognizer's match result and feeds the
//! [`Arbiter`]; once a gesture settles, the winning action is emitted to
//! subscribers and handed to the dispatcher, and every recognizer is reset.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::{
    arbiter::{Arbiter, MatchResult},
    config::Config,
    detector::{Direction, TrackChange, TrackChangeDetector, TrackHistory},
    dispatch::Dispatcher,
    events::{EventName, MonitorEvent, Observed, PlaybackEvent},
    gateway::Catalog,
    sequence::EventSequence,
    uri::PandoraUri,
};

/// Capacity of the outbound event channel. Slow subscribers start losing
/// events beyond this backlog.
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum Error {
    #[error("event monitor is not running")]
    NotRunning,
}

enum Message {
    Event(PlaybackEvent),
    Timeout { sequence: usize, cycle: u64 },
}

/// Handle to a running event monitor.
///
/// Dropping the handle shuts the monitor down once in-flight timers have
/// drained.
pub struct EventMonitor {
    mailbox: mpsc::UnboundedSender<Message>,
    events: broadcast::Sender<MonitorEvent>,
}

impl EventMonitor {
    /// Starts a monitor with the default recognizer set from `config`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<C>(config: &Config, catalog: C) -> Self
    where
        C: Catalog,
    {
        Self::with_sequences(catalog, default_sequences(config))
    }

    /// Starts a monitor with an explicit recognizer set.
    pub fn with_sequences<C>(catalog: C, sequences: Vec<EventSequence>) -> Self
    where
        C: Catalog,
    {
        let (mailbox, inbox) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let actor = Actor {
            arbiter: Arbiter::new(sequences.len()),
            sequences,
            detector: TrackChangeDetector::new(),
            history: TrackHistory::new(),
            clock: Clock::default(),
            mailbox: mailbox.downgrade(),
            events: events.clone(),
            dispatcher: Arc::new(Dispatcher::new(catalog, events.clone())),
        };
        tokio::spawn(actor.run(inbox));

        Self { mailbox, events }
    }

    /// Feeds one raw playback event into the monitor. Never blocks.
    pub fn on_event(&self, event: PlaybackEvent) -> Result<(), Error> {
        self.mailbox
            .send(Message::Event(event))
            .map_err(|_| Error::NotRunning)
    }

    /// Subscribes to the monitor's outbound events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }
}

/// The default recognizer set, in registration order.
///
/// All four patterns share their first event, so a single mid-track pause
/// arms every recognizer at once and the arbiter picks the pattern the rest
/// of the gesture resembles most.
#[must_use]
pub fn default_sequences(config: &Config) -> Vec<EventSequence> {
    let interval = config.interval();
    vec![
        EventSequence::new(
            config.on_pause_resume_click,
            vec![
                EventName::TrackPlaybackPaused,
                EventName::TrackPlaybackResumed,
            ],
            interval,
        ),
        EventSequence::new(
            config.on_pause_resume_pause_click,
            vec![
                EventName::TrackPlaybackPaused,
                EventName::TrackPlaybackResumed,
                EventName::TrackPlaybackPaused,
            ],
            interval,
        ),
        EventSequence::new(
            config.on_pause_previous_click,
            vec![EventName::TrackPlaybackPaused, EventName::PreparingTrack],
            interval,
        )
        .wait_for(EventName::TrackChangedPrevious),
        EventSequence::new(
            config.on_pause_next_click,
            vec![EventName::TrackPlaybackPaused, EventName::PreparingTrack],
            interval,
        )
        .wait_for(EventName::TrackChangedNext),
    ]
}

/// Strictly increasing event timestamps, in milliseconds since the epoch.
///
/// Back-to-back events can land within the same millisecond; the history
/// ordering the detector relies on needs every event to get its own tick.
#[derive(Debug, Default)]
struct Clock {
    last: u64,
}

impl Clock {
    fn tick(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        self.last = now.max(self.last.saturating_add(1));
        self.last
    }
}

struct Actor<C> {
    sequences: Vec<EventSequence>,
    detector: TrackChangeDetector,
    history: TrackHistory,
    arbiter: Arbiter,
    clock: Clock,
    mailbox: mpsc::WeakUnboundedSender<Message>,
    events: broadcast::Sender<MonitorEvent>,
    dispatcher: Arc<Dispatcher<C>>,
}

impl<C> Actor<C>
where
    C: Catalog,
{
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = inbox.recv().await {
            match message {
                Message::Event(event) => self.handle_event(event),
                Message::Timeout { sequence, cycle } => self.handle_timeout(sequence, cycle),
            }
        }
        debug!("event monitor stopped");
    }

    fn handle_event(&mut self, event: PlaybackEvent) {
        let (name, uri, time_position) = match event {
            PlaybackEvent::TrackPlaybackStarted { uri, time_position } => (
                EventName::TrackPlaybackStarted,
                Some(uri),
                Some(time_position),
            ),
            PlaybackEvent::TrackPlaybackPaused { uri, time_position } => (
                EventName::TrackPlaybackPaused,
                Some(uri),
                Some(time_position),
            ),
            PlaybackEvent::TrackPlaybackResumed { uri, time_position } => (
                EventName::TrackPlaybackResumed,
                Some(uri),
                Some(time_position),
            ),
            PlaybackEvent::TrackPlaybackEnded { uri } => {
                (EventName::TrackPlaybackEnded, Some(uri), None)
            }
            PlaybackEvent::PreparingTrack => (EventName::PreparingTrack, None, None),
            PlaybackEvent::TracklistChanged => {
                trace!("ignoring tracklist change");
                return;
            }
        };

        let track = uri.and_then(|raw| match raw.parse::<PandoraUri>() {
            Ok(track) => Some(track),
            Err(e) => {
                warn!("event carries a malformed track URI: {e}");
                None
            }
        });

        if track.as_ref().is_some_and(PandoraUri::is_ad) {
            debug!("dropping {name} on an advertisement track");
            return;
        }

        let at = self.clock.tick();
        if name == EventName::TrackPlaybackStarted {
            if let Some(ref track) = track {
                self.history.record(at, track.clone());
            }
        }

        // The detector observes raw events before the recognizers do.
        let change = self
            .detector
            .observe(name, track.as_ref(), at, &self.history);

        self.deliver(&Observed::new(name, track, time_position));

        // Synthetic direction events re-enter behind the raw event that
        // produced them.
        if let Some(change) = change {
            self.emit_change(&change);
            let name = match change.direction {
                Direction::Next => EventName::TrackChangedNext,
                Direction::Previous => EventName::TrackChangedPrevious,
            };
            self.deliver(&Observed::new(name, None, None));
        }
    }

    fn deliver(&mut self, observed: &Observed) {
        for index in 0..self.sequences.len() {
            if self.sequences[index].notify(observed) {
                trace!("sequence {index} armed on {}", observed.name);
                self.arbiter.sequence_armed();
                self.schedule_timeout(index);
            }
        }
    }

    fn schedule_timeout(&self, sequence: usize) {
        let interval = self.sequences[sequence].interval();
        let cycle = self.sequences[sequence].cycle();
        let Some(mailbox) = self.mailbox.upgrade() else {
            return;
        };

        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            // The monitor may have shut down in the meantime.
            let _ = mailbox.send(Message::Timeout { sequence, cycle });
        });
    }

    fn handle_timeout(&mut self, sequence: usize, cycle: u64) {
        let Some(recognizer) = self.sequences.get_mut(sequence) else {
            return;
        };
        if recognizer.cycle() != cycle {
            trace!("ignoring stale timeout for sequence {sequence}");
            return;
        }

        let settled = match recognizer.take_result(sequence) {
            Some(result) => {
                trace!(
                    "sequence {sequence} reports {} with ratio {:.3}",
                    result.action(),
                    result.ratio()
                );
                self.arbiter.submit(result)
            }
            None => {
                warn!("sequence {sequence} timed out without a result");
                self.arbiter.sequence_aborted()
            }
        };

        if let Some(winner) = settled {
            self.settle(&winner);
        }
    }

    fn settle(&mut self, winner: &MatchResult) {
        if winner.ratio() > 0.0 {
            info!(
                "gesture matched {} on {} (ratio {:.3})",
                winner.action(),
                winner.track(),
                winner.ratio()
            );
            let _ = self.events.send(MonitorEvent::EventTriggered {
                track_uri: winner.track().clone(),
                action: winner.action(),
            });

            let dispatcher = Arc::clone(&self.dispatcher);
            let action = winner.action();
            let track = winner.track().clone();
            tokio::spawn(async move {
                dispatcher.dispatch(action, track).await;
            });
        } else {
            debug!("gesture did not match any pattern");
        }

        for recognizer in &mut self.sequences {
            recognizer.reset();
        }
    }

    fn emit_change(&self, change: &TrackChange) {
        let event = match change.direction {
            Direction::Next => MonitorEvent::TrackChangedNext {
                old_uri: change.old_uri.clone(),
                new_uri: change.new_uri.clone(),
            },
            Direction::Previous => MonitorEvent::TrackChangedPrevious {
                old_uri: change.old_uri.clone(),
                new_uri: change.new_uri.clone(),
            },
        };
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Action;

    #[test]
    fn clock_ticks_are_strictly_increasing() {
        let mut clock = Clock::default();
        let mut last = clock.tick();
        for _ in 0..1000 {
            let next = clock.tick();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn default_sequences_follow_the_bindings() {
        let config = Config::default();
        let sequences = default_sequences(&config);
        assert_eq!(sequences.len(), 4);
        assert_eq!(
            sequences.iter().map(EventSequence::action).collect::<Vec<_>>(),
            [
                Action::ThumbsUp,
                Action::DeleteStation,
                Action::Sleep,
                Action::ThumbsDown,
            ]
        );
    }
}
