//! Pandora URI grammar.
//!
//! Tracks, stations and advertisements are addressed with custom URIs of the
//! form `pandora:<type>:<station_id>:<token>[:extra...]`. The event monitor
//! needs two things from this grammar: the item type (to filter out gestures
//! on advertisement tracks) and the token (to address remote catalog calls).
//!
//! Tokens are stored percent-decoded and re-encoded on display, so a URI
//! round-trips through [`FromStr`] and [`fmt::Display`].

use std::{fmt, str::FromStr};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Characters that must be escaped inside a URI component: the component
/// delimiter and the escape character itself.
const COMPONENT: &AsciiSet = &CONTROLS.add(b':').add(b'%').add(b' ');

/// The URI scheme for all Pandora items.
const SCHEME: &str = "pandora";

pub type Result<T> = std::result::Result<T, ParseError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("not a pandora URI: {0}")]
    Scheme(String),

    #[error("missing item type: {0}")]
    MissingType(String),

    #[error("unknown item type: {0}")]
    UnknownType(String),

    #[error("invalid percent encoding in token: {0}")]
    TokenEncoding(String),
}

/// The closed set of item types that can appear in a Pandora URI.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemType {
    Station,
    Track,
    Ad,
    Genre,
    GenreStation,
    Search,
}

impl ItemType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Station => "station",
            ItemType::Track => "track",
            ItemType::Ad => "ad",
            ItemType::Genre => "genre",
            ItemType::GenreStation => "genre_station",
            ItemType::Search => "search",
        }
    }
}

impl FromStr for ItemType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "station" => Ok(ItemType::Station),
            "track" => Ok(ItemType::Track),
            "ad" => Ok(ItemType::Ad),
            "genre" => Ok(ItemType::Genre),
            "genre_station" => Ok(ItemType::GenreStation),
            "search" => Ok(ItemType::Search),
            other => Err(ParseError::UnknownType(other.to_string())),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed Pandora URI.
///
/// The station and token components are optional in the grammar; operations
/// that need them fail gracefully when they are absent.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PandoraUri {
    pub item_type: ItemType,
    pub station_id: Option<String>,
    pub token: Option<String>,
    extra: Vec<String>,
}

impl PandoraUri {
    #[must_use]
    pub fn new(item_type: ItemType, station_id: &str, token: &str) -> Self {
        Self {
            item_type,
            station_id: Some(station_id.to_string()),
            token: Some(token.to_string()),
            extra: Vec::new(),
        }
    }

    /// Whether this URI addresses an advertisement item.
    ///
    /// Gestures on advertisement tracks are ignored by the event monitor.
    #[must_use]
    pub fn is_ad(&self) -> bool {
        self.item_type == ItemType::Ad
    }

    /// The percent-decoded token component, if present.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl FromStr for PandoraUri {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(':');

        match parts.next() {
            Some(SCHEME) => {}
            _ => return Err(ParseError::Scheme(s.to_string())),
        }

        let item_type = parts
            .next()
            .filter(|part| !part.is_empty())
            .ok_or_else(|| ParseError::MissingType(s.to_string()))?
            .parse::<ItemType>()?;

        let station_id = parts.next().map(ToString::to_string);
        let token = parts
            .next()
            .map(|token| {
                percent_decode_str(token)
                    .decode_utf8()
                    .map(|decoded| decoded.to_string())
                    .map_err(|_| ParseError::TokenEncoding(token.to_string()))
            })
            .transpose()?;
        let extra = parts.map(ToString::to_string).collect();

        Ok(Self {
            item_type,
            station_id,
            token,
            extra,
        })
    }
}

impl fmt::Display for PandoraUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}:{}", self.item_type)?;
        if let Some(ref station_id) = self.station_id {
            write!(f, ":{station_id}")?;
        }
        if let Some(ref token) = self.token {
            write!(f, ":{}", utf8_percent_encode(token, COMPONENT))?;
        }
        for part in &self.extra {
            write!(f, ":{part}")?;
        }
        Ok(())
    }
}

impl Serialize for PandoraUri {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
