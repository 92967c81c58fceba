//! London bus arrivals, nearby stops and favourites behind a small HTTP API.
//!
//! The interesting part is [`aggregator::aggregate`]: rank the bundled stops by
//! distance from a position, fetch live arrivals for each candidate
//! concurrently, and join them back in proximity order.

pub mod aggregator;
pub mod api;
pub mod arrivals;
pub mod catalog;
pub mod config;
pub mod distance;
pub mod error;
pub mod favourites;
pub mod geocode;
pub mod proximity;
pub mod search;
pub mod tfl;
