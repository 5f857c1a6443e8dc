//! Reactor - per-connection HTTP session engine
//!
//! Drives accepted connections through receive, dispatch and respond cycles
//! with pipelining, timeouts and strong/weak session handles.

pub mod config;
pub mod http;
pub mod router;
pub mod server;
pub mod session;

pub use router::Router;
pub use session::{Context, Session, SessionError, WeakContext};
