//! Data model shared by the Meraki wireless probe crates.
//!
//! [`config::AssetConfig`] is what the host hands to every check, and
//! [`types::StateResult`] is what every check hands back.

pub mod config;
pub mod types;
