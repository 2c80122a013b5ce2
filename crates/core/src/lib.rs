//! Core utilities shared by every ringframe crate.
//!
//! This crate provides:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing ([`FrameClock`])
//! - Set-once pipeline configuration ([`PipelineConfig`])

mod clock;
mod config;
mod error;
mod logging;

pub use clock::{FPS_HISTORY_LEN, FrameClock};
pub use config::{
    DEFAULT_FRAMES_IN_FLIGHT, DEFAULT_MAX_DRAW_GROUPS, DEFAULT_WORKGROUP_SIZE, MAX_RING_SLOTS,
    PipelineConfig,
};
pub use error::{Error, Result};
pub use logging::init_logging;
