//! Beacon Core - the per-session status store
//!
//! [`SessionStatusStore`] holds one [`SessionStatusRecord`] per session id and
//! notifies observers scoped to that id synchronously on every mutation.

mod record;
mod store;

pub use record::{Progress, SessionError, SessionStatusRecord};
pub use store::{SessionStatusStore, StatusCallback, Subscription};
