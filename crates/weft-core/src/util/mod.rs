//! Utility modules shared across Weft crates.
//!
//! # Modules
//!
//! - [`text`]: Query normalization, tokenization, ID normalization, snippets

pub mod text;
