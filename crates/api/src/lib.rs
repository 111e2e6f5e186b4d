//! Producer-facing HTTP API: publish user events, inspect dead letters and consumer stats.

pub mod app;
pub mod middleware;
