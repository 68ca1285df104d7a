use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use url::Url;

use crate::config::{Config, Credentials};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("parsing URL failed: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("gateway fault {code}: {message}")]
    Api { code: i64, message: String },
}

/// The remote operations the gesture dispatcher needs from the catalog.
///
/// Kept as a trait so the dispatcher can be exercised against a test double
/// without a network.
pub trait Catalog: Send + Sync + 'static {
    fn add_feedback<'a>(&'a self, track_token: &'a str, positive: bool)
        -> BoxFuture<'a, Result<()>>;
    fn sleep_song<'a>(&'a self, track_token: &'a str) -> BoxFuture<'a, Result<()>>;
    fn add_artist_bookmark<'a>(&'a self, track_token: &'a str) -> BoxFuture<'a, Result<()>>;
    fn add_song_bookmark<'a>(&'a self, track_token: &'a str) -> BoxFuture<'a, Result<()>>;
    fn delete_station<'a>(&'a self, station_token: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// One station as returned by the station list call.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub station_token: String,
    pub station_name: String,
}

/// Response envelope of the JSON gateway.
///
/// Successful calls answer `{"stat": "ok", "result": ...}`; failures answer
/// `{"stat": "fail", "code": ..., "message": ...}`.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Envelope<T> {
    stat: String,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StationList {
    stations: Vec<Station>,
}

struct StationCache {
    fetched_at: Instant,
    stations: Vec<Station>,
}

/// Thin client for the Pandora JSON gateway.
pub struct Gateway {
    http_client: reqwest::Client,
    base: Url,
    credentials: Credentials,
    cache_ttl: Duration,
    station_cache: Mutex<Option<StationCache>>,
}

impl Gateway {
    /// The URL of the Pandora JSON gateway.
    const GATEWAY_URL: &'static str = "https://tuner.pandora.com/services/json/";

    /// Network timeout for gateway calls. Gestures are fire-and-forget, so
    /// a hanging call must not linger.
    const TIMEOUT: Duration = Duration::from_secs(10);

    const ADD_FEEDBACK: &'static str = "station.addFeedback";
    const SLEEP_SONG: &'static str = "user.sleepSong";
    const ADD_ARTIST_BOOKMARK: &'static str = "bookmark.addArtistBookmark";
    const ADD_SONG_BOOKMARK: &'static str = "bookmark.addSongBookmark";
    const DELETE_STATION: &'static str = "station.deleteStation";
    const GET_STATION_LIST: &'static str = "user.getStationList";

    /// Creates a new gateway client from the configuration.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self> {
        let user_agent = format!(
            "{}/{} (Rust)",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Self::TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            base: Url::parse(Self::GATEWAY_URL)?,
            credentials: config.credentials.clone(),
            cache_ttl: config.cache_ttl(),
            station_cache: Mutex::new(None),
        })
    }

    /// Performs one gateway call and unwraps the response envelope.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the HTTP request fails, the response is not a
    /// valid envelope, or the gateway reports a fault.
    async fn request<T>(&self, method: &str, body: serde_json::Value) -> Result<Option<T>>
    where
        T: std::fmt::Debug + for<'de> Deserialize<'de>,
    {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("method", method)
            .append_pair("partner_id", &self.credentials.partner_id)
            .append_pair("user_id", &self.credentials.user_id)
            .append_pair("auth_token", &self.credentials.auth_token);

        let response = self.http_client.post(url).json(&body).send().await?;
        let envelope = response.json::<Envelope<T>>().await?;
        trace!("{method}: stat {}", envelope.stat);

        if envelope.stat == "ok" {
            Ok(envelope.result)
        } else {
            Err(Error::Api {
                code: envelope.code.unwrap_or(-1),
                message: envelope
                    .message
                    .unwrap_or_else(|| "unspecified fault".to_string()),
            })
        }
    }

    /// A gateway call whose result payload does not matter.
    async fn perform(&self, method: &str, body: serde_json::Value) -> Result<()> {
        self.request::<serde_json::Value>(method, body)
            .await
            .map(|_| ())
    }

    /// The user's stations, memoized for the configured cache lifetime.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the list is stale and refreshing it fails.
    pub async fn station_list(&self) -> Result<Vec<Station>> {
        {
            let cache = self
                .station_cache
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(ref cached) = *cache {
                if cached.fetched_at.elapsed() < self.cache_ttl {
                    return Ok(cached.stations.clone());
                }
            }
        }

        let list: StationList = self
            .request(Self::GET_STATION_LIST, json!({}))
            .await?
            .ok_or_else(|| Error::Assertion("no station list received".to_string()))?;

        let mut cache = self
            .station_cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *cache = Some(StationCache {
            fetched_at: Instant::now(),
            stations: list.stations.clone(),
        });

        Ok(list.stations)
    }
}

impl Catalog for Gateway {
    fn add_feedback<'a>(
        &'a self,
        track_token: &'a str,
        positive: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.perform(
            Self::ADD_FEEDBACK,
            json!({ "trackToken": track_token, "isPositive": positive }),
        ))
    }

    fn sleep_song<'a>(&'a self, track_token: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.perform(Self::SLEEP_SONG, json!({ "trackToken": track_token })))
    }

    fn add_artist_bookmark<'a>(&'a self, track_token: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.perform(Self::ADD_ARTIST_BOOKMARK, json!({ "trackToken": track_token })))
    }

    fn add_song_bookmark<'a>(&'a self, track_token: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.perform(Self::ADD_SONG_BOOKMARK, json!({ "trackToken": track_token })))
    }

    fn delete_station<'a>(&'a self, station_token: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.perform(
            Self::DELETE_STATION,
            json!({ "stationToken": station_token }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_successful_envelope() {
        let envelope: Envelope<StationList> = serde_json::from_str(
            r#"{
                "stat": "ok",
                "result": {
                    "stations": [
                        {"stationToken": "ST1", "stationName": "Quickmix"}
                    ]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(envelope.stat, "ok");
        let list = envelope.result.unwrap();
        assert_eq!(
            list.stations,
            [Station {
                station_token: "ST1".to_string(),
                station_name: "Quickmix".to_string(),
            }]
        );
    }

    #[test]
    fn carries_fault_details() {
        let envelope: Envelope<serde_json::Value> = serde_json::from_str(
            r#"{"stat": "fail", "code": 1001, "message": "Invalid auth token"}"#,
        )
        .unwrap();
        assert_eq!(envelope.stat, "fail");
        assert_eq!(envelope.code, Some(1001));
        assert_eq!(envelope.message.as_deref(), Some("Invalid auth token"));
    }

    #[test]
    fn tolerates_missing_result() {
        let envelope: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"stat": "ok"}"#).unwrap();
        assert!(envelope.result.is_none());
    }
}
