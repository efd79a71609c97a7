//! RPC trigger connectivity: rings of rolls to PAC cone inputs
//!
//! Builds, for every strip of the RPC detector, the list of pattern
//! comparator (PAC) cone inputs it feeds.
//!
//! ## Architecture
//!
//! - **Geometry**: roll descriptors (strip azimuths, ring membership) from a
//!   [`GeometrySource`], JSON files by default
//! - **Tables**: compiled-in roll/plane to tower and logical-plane mapping
//! - **Ring**: one [`RpcRing`] per (region, ring, hardware plane) with gap
//!   filling by virtual strips and cone construction
//! - **Builder**: pairs reference rings with the other rings and merges the
//!   result into a [`ConnectionTable`]

pub mod azimuth;
pub mod builder;
pub mod config;
pub mod geometry;
pub mod ring;
pub mod tables;
pub mod types;

pub use builder::{BuildError, BuildReport, ConnectionTable, ConnectionTableBuilder};
pub use config::{OverflowPolicy, RingConfig};
pub use geometry::{GeometryError, GeometrySource, JsonGeometry, RingKey, RollDescriptor};
pub use ring::{RingError, RpcRing};
pub use types::{Connection, Links, StripCoords};
