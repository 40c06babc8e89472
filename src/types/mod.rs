//! Shared types for the wallet workers

pub mod error;

pub use error::{RelayError, Result};
