//! Headless Pandora double-click gesture companion.
//!
//! pandero watches a media player's playback-event stream, recognizes short
//! bursts of play-control actions ("double clicks") as semantic gestures,
//! and performs the bound remote operation on the Pandora catalog, e.g.
//! pause-then-resume meaning thumbs-up.
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod arbiter;
pub mod config;
pub mod detector;
pub mod dispatch;
pub mod events;
pub mod gateway;
pub mod monitor;
pub mod sequence;
pub mod similarity;
pub mod uri;
