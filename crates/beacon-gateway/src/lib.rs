//! Cancellation of running analyses.
//!
//! [`CancellationGateway`] checks that a session is actually loading, asks a
//! [`CancelConfirmer`], flags the session and forwards the request through a
//! [`CancellationRpc`]. It never ends loading itself; the backend confirms the
//! cancellation through the event bridge.

pub mod error;
pub mod gateway;
pub mod rpc;
pub mod testing;

pub use error::{CancelError, RpcError};
pub use gateway::{CancelOutcome, CancellationGateway};
pub use rpc::{AlwaysConfirm, CancelConfirmer, CancellationRpc};
