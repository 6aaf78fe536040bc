//! Backend event intake for the session status store
//!
//! - [`BackendBus`]: multiplexed broadcast channel carrying [`RawEvent`]s
//! - [`ActiveSession`]: live cell holding the session the UI has focused
//! - [`EventBridge`]: decodes backend events and applies them to the store

mod active;
mod bridge;
mod bus;

pub use active::ActiveSession;
pub use beacon_config::LegacyLoadingPolicy;
pub use beacon_protocol::{BackendEvent, RawEvent};
pub use bridge::EventBridge;
pub use bus::{BackendBus, DEFAULT_CHANNEL_CAPACITY};
