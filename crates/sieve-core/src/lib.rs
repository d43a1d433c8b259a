//! sieve-core
//!
//! Shared vocabulary for the sieve workspace: document and result types, the
//! error taxonomy, the embedding/store collaborator traits, configuration and
//! small vector helpers.

pub mod config;
pub mod error;
pub mod loader;
pub mod traits;
pub mod types;
pub mod vector;

pub use error::{Error, Result};
