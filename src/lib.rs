//! Conditional HTTP authentication filters for a Tower-based web client.
//!
//! - [`client`]: the filters, token sources, transport and [`client::WebClient`].
//! - [`config`]: layered TOML + environment configuration.
//! - [`path`]: where the config file lives.

pub mod client;
pub mod config;
pub mod path;
