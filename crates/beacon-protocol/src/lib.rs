//! Beacon Protocol - Wire types shared between the backend and the status core
//!
//! This crate defines:
//! - The raw, topic-tagged envelope delivered on the multiplexed backend channel
//! - The decoded [`BackendEvent`] variant the event bridge routes on
//! - The well-known analysis error codes and their recovery hints

pub mod error_codes;
mod events;

pub use error_codes::recovery_hints;
pub use events::*;
