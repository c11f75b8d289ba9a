//! FragBot Library
//!
//! Inline query service for Fragment marketplace usernames, TON rates and
//! number floor prices

pub mod cache;
pub mod config;
pub mod error;
pub mod floor;
pub mod fragment;
pub mod query;
pub mod rates;
pub mod results;
pub mod router;
pub mod tonapi;
pub mod types;
