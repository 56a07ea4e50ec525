//! Client for queued sonification renders and the realtime anomaly event stream.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infra;
mod util;
