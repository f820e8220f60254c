//! Core domain + application logic for the group guard bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the exchange
//! API live behind ports (traits) implemented in adapter crates; everything
//! here talks to SQLite and plain strings.

pub mod config;
pub mod domain;
pub mod errors;
pub mod filter;
pub mod logging;
pub mod maintenance;
pub mod messaging;
pub mod normalize;
pub mod ratelimit;
pub mod store;
pub mod validate;
pub mod whitelist;

pub use errors::{Error, Result};
