//! WebSocket / HTTP server implementation.

mod handler;
mod scheduler;
mod server;
mod signal;
pub mod state;

pub use scheduler::spawn_purge_scheduler;
pub use server::{DEFAULT_OUTBOUND_BUFFER, Server, ServerError, ServerOptions};
