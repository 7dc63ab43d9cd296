//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the metadata core crates:
//! - Configuration ([`config::CoreConfig`])
//! - Logging and tracing setup
//! - Event bus for background operation and record-change notifications

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
