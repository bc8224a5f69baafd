//! # weft-cli
//!
//! Command-line front end for the Weft query engine.
//!
//! The `weft` binary loads a JSON corpus into in-memory stores and exposes:
//! - `search`: hybrid search with an optional strategy, limit, and quality floor
//! - `suggest`: concept autocomplete
//! - `analyze`: query analysis as JSON
//! - `config`: show, get, set, init, and export engine configuration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod corpus;

pub use cli::{Cli, Command, ConfigAction};
pub use corpus::Corpus;
