//! Session lifecycle management for Bluffline.
//!
//! Each live game runs as an isolated Tokio task (actor model) that owns
//! its [`Game`](bluffline_engine::Game) and a one-second ticker. The
//! registry creates sessions on demand and routes events to them.
//!
//! # Key types
//!
//! - [`SessionRegistry`]: activate / dispatch / dispose, keyed by game id
//! - [`Provisioner`]: deals a new session's game outside the registry
//! - [`SessionHandle`]: send commands to a running session actor
//! - [`Backend`]: room, result and ban storage the host provides
//! - [`Gateway`]: delivery of outbound messages to connections

mod backend;
mod error;
mod registry;
mod session;

pub use backend::{Backend, Gateway, Rematch};
pub use error::{BackendError, RegistryError};
pub use registry::{DEFAULT_CHANNEL_SIZE, Provisioner, SessionRegistry};
pub use session::SessionHandle;
