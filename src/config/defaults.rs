//! Default values for every tunable in `RingConfig`.

// ============================================================================
// Virtual strips
// ============================================================================

/// A gap is filled once it exceeds this many strip pitches.
///
/// Adjacent real strips are one pitch apart; 1.5 leaves room for the small
/// dead zone between neighbouring rolls without filling it.
pub const GAP_TOLERANCE: f64 = 1.5;

/// Smallest accepted gap tolerance. Below one pitch every strip pair is a gap.
pub const MIN_GAP_TOLERANCE: f64 = 1.0;

/// Bounds on a configured strip pitch (degrees).
pub const MIN_PITCH_DEG: f64 = 0.01;
pub const MAX_PITCH_DEG: f64 = 10.0;

/// Most virtual strips placed in a single gap. A full ring of the finest
/// real pitch holds well under this.
pub const MAX_VIRTUAL_PER_GAP: usize = 4096;

// ============================================================================
// Connections
// ============================================================================

/// Hardware plane that defines cone centres.
pub const REFERENCE_HW_PLANE: u8 = crate::tables::REF_HW_PLANE;

// ============================================================================
// Output
// ============================================================================

pub const PRETTY_JSON: bool = true;

/// Config file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "ring_config.toml";

/// Environment variable holding an explicit config path.
pub const CONFIG_ENV_VAR: &str = "RPC_RING_CONFIG";
