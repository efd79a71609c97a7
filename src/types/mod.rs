//! Shared data structures for ring connectivity
//!
//! - `StripCoords`: one readout channel (real or virtual), keyed by detector id
//! - `Connection`: one strip's role in one trigger cone
//! - `Links`: the strip → connections table produced by a ring

mod connection;
mod strip;

pub use connection::*;
pub use strip::*;
