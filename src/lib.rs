//! Live activity relay: producers POST event logs, dashboards receive them
//! over a websocket and derive counters from the feed.

pub mod broadcast;
pub mod client;
pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod normalize;
pub mod projections;
pub mod server;
pub mod telemetry;
