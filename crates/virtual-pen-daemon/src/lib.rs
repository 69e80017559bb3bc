//! Pipeline and session management for virtual-pen.
//!
//! A [`Pipeline`] owns at most one session at a time. A session opens the
//! virtual stylus, runs one transport loop (TCP listener or USB accessory)
//! and feeds every decoded record to the stylus until it is stopped or fails.

pub mod config;
pub mod error;
pub mod pipeline;
mod session;
pub mod setup;
pub mod state;
pub mod status;

pub use config::Config;
pub use error::DaemonError;
pub use pipeline::{EmulationFactory, Pipeline, PipelineConfig, SessionHandle};
pub use status::{ChannelSink, LogSink, StatusEvent, StatusSink};
