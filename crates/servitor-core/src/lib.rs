//! Core domain + application logic for the servitor calendar bot.
//!
//! Framework-agnostic: Telegram, Google and the HTTP callback endpoint live
//! behind ports (traits) implemented in adapter crates.

pub mod commands;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod ports;
pub mod session;
pub mod store;
pub mod token;

pub use errors::{Error, Result};
