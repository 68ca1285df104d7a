//! Mapping recognized gestures onto remote catalog operations.
//!
//! A winning gesture resolves to an [`Action`] bound to the track the user
//! acted on. The [`Dispatcher`] translates that pair into exactly one call
//! on the catalog client and acknowledges completion with an
//! `event_processed` notification, whether the call succeeded or not: a
//! failed remote call consumes the gesture just the same.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::{
    events::MonitorEvent,
    gateway::{self, Catalog},
    uri::PandoraUri,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} has no token to act on")]
    MissingToken(PandoraUri),

    #[error("{0} has no station to act on")]
    MissingStation(PandoraUri),

    #[error("catalog call failed: {0}")]
    Catalog(#[from] gateway::Error),
}

#[derive(Error, Debug)]
#[error("unknown action: {0}")]
pub struct UnknownAction(String);

/// The closed set of semantic operations a gesture can be bound to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ThumbsUp,
    ThumbsDown,
    Sleep,
    AddArtistBookmark,
    AddSongBookmark,
    DeleteStation,
}

impl Action {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ThumbsUp => "thumbs_up",
            Action::ThumbsDown => "thumbs_down",
            Action::Sleep => "sleep",
            Action::AddArtistBookmark => "add_artist_bookmark",
            Action::AddSongBookmark => "add_song_bookmark",
            Action::DeleteStation => "delete_station",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thumbs_up" => Ok(Action::ThumbsUp),
            "thumbs_down" => Ok(Action::ThumbsDown),
            "sleep" => Ok(Action::Sleep),
            "add_artist_bookmark" => Ok(Action::AddArtistBookmark),
            "add_song_bookmark" => Ok(Action::AddSongBookmark),
            "delete_station" => Ok(Action::DeleteStation),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Invokes the remote operation a recognized gesture is bound to.
pub struct Dispatcher<C> {
    catalog: C,
    events: broadcast::Sender<MonitorEvent>,
}

impl<C> Dispatcher<C>
where
    C: Catalog,
{
    #[must_use]
    pub fn new(catalog: C, events: broadcast::Sender<MonitorEvent>) -> Self {
        Self { catalog, events }
    }

    /// Performs the remote call for `action` on `track`.
    ///
    /// Remote failures are logged and swallowed; `event_processed` is
    /// emitted in every case so queued player-side state updates may
    /// proceed.
    pub async fn dispatch(&self, action: Action, track: PandoraUri) {
        if let Err(e) = self.call(action, &track).await {
            warn!("dispatching {action} on {track} failed: {e}");
        } else {
            info!("dispatched {action} on {track}");
        }

        // Subscribers may have gone away; that is not our problem here.
        let _ = self.events.send(MonitorEvent::EventProcessed {
            track_uri: track,
            action,
        });
    }

    async fn call(&self, action: Action, track: &PandoraUri) -> Result<(), Error> {
        let token = track
            .token()
            .ok_or_else(|| Error::MissingToken(track.clone()))?;

        match action {
            Action::ThumbsUp => self.catalog.add_feedback(token, true).await?,
            Action::ThumbsDown => self.catalog.add_feedback(token, false).await?,
            Action::Sleep => self.catalog.sleep_song(token).await?,
            Action::AddArtistBookmark => self.catalog.add_artist_bookmark(token).await?,
            Action::AddSongBookmark => self.catalog.add_song_bookmark(token).await?,
            Action::DeleteStation => {
                let station = track
                    .station_id
                    .as_deref()
                    .ok_or_else(|| Error::MissingStation(track.clone()))?;
                self.catalog.delete_station(station).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures_util::future::BoxFuture;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Recorder {
        fn record(&self, call: String) -> BoxFuture<'_, gateway::Result<()>> {
            self.calls.lock().unwrap().push(call);
            Box::pin(async move {
                if self.fail {
                    Err(gateway::Error::Api {
                        code: 1001,
                        message: "down for maintenance".to_string(),
                    })
                } else {
                    Ok(())
                }
            })
        }
    }

    impl Catalog for Recorder {
        fn add_feedback<'a>(
            &'a self,
            track_token: &'a str,
            positive: bool,
        ) -> BoxFuture<'a, gateway::Result<()>> {
            self.record(format!("feedback:{track_token}:{positive}"))
        }

        fn sleep_song<'a>(&'a self, track_token: &'a str) -> BoxFuture<'a, gateway::Result<()>> {
            self.record(format!("sleep:{track_token}"))
        }

        fn add_artist_bookmark<'a>(
            &'a self,
            track_token: &'a str,
        ) -> BoxFuture<'a, gateway::Result<()>> {
            self.record(format!("artist_bookmark:{track_token}"))
        }

        fn add_song_bookmark<'a>(
            &'a self,
            track_token: &'a str,
        ) -> BoxFuture<'a, gateway::Result<()>> {
            self.record(format!("song_bookmark:{track_token}"))
        }

        fn delete_station<'a>(
            &'a self,
            station_token: &'a str,
        ) -> BoxFuture<'a, gateway::Result<()>> {
            self.record(format!("delete_station:{station_token}"))
        }
    }

    fn track() -> PandoraUri {
        "pandora:track:ST1:TK1".parse().unwrap()
    }

    #[tokio::test]
    async fn thumbs_up_sends_positive_feedback() {
        let (events, mut rx) = broadcast::channel(4);
        let dispatcher = Dispatcher::new(Recorder::default(), events);

        dispatcher.dispatch(Action::ThumbsUp, track()).await;
        assert_eq!(
            dispatcher.catalog.calls.lock().unwrap().as_slice(),
            ["feedback:TK1:true"]
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            MonitorEvent::EventProcessed {
                track_uri: track(),
                action: Action::ThumbsUp,
            }
        );
    }

    #[tokio::test]
    async fn delete_station_targets_the_station() {
        let (events, _rx) = broadcast::channel(4);
        let dispatcher = Dispatcher::new(Recorder::default(), events);

        dispatcher.dispatch(Action::DeleteStation, track()).await;
        assert_eq!(
            dispatcher.catalog.calls.lock().unwrap().as_slice(),
            ["delete_station:ST1"]
        );
    }

    #[tokio::test]
    async fn remote_failure_still_acknowledges() {
        let (events, mut rx) = broadcast::channel(4);
        let recorder = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let dispatcher = Dispatcher::new(recorder, events);

        dispatcher.dispatch(Action::Sleep, track()).await;
        assert!(matches!(
            rx.try_recv().unwrap(),
            MonitorEvent::EventProcessed { .. }
        ));
    }

    #[test]
    fn action_names_round_trip() {
        for action in [
            Action::ThumbsUp,
            Action::ThumbsDown,
            Action::Sleep,
            Action::AddArtistBookmark,
            Action::AddSongBookmark,
            Action::DeleteStation,
        ] {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
        assert!("explode".parse::<Action>().is_err());
    }
}
