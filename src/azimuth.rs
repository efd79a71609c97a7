//! Wrap-aware azimuth ordering
//!
//! Every ordered index in a ring (rolls by centre, strips by azimuth) uses the
//! same seam rule: angles below [`PHI_SEAM_OFFSET`] sort as if they were past
//! 2π. The detector's mounting seam sits in that 0–5° window, so moving the
//! discontinuity there keeps every real roll boundary on one side of it.
//!
//! All angles are radians.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::f64::consts::TAU;

/// Angular offset of the ordering seam (5°).
pub const PHI_SEAM_OFFSET: f64 = 5.0 / 360.0 * TAU;

/// Shift an angle past 2π when it falls below the seam offset.
///
/// The input is normalised first, so `-0.01` and `TAU - 0.01` shift identically.
pub fn seam_shifted(phi: f64) -> f64 {
    let phi = normalize_phi(phi);
    if phi < PHI_SEAM_OFFSET {
        phi + TAU
    } else {
        phi
    }
}

/// Compare two azimuths under the seam rule.
///
/// This is a strict total order on normalised angles: `0.0` sorts after
/// `350°`, `4.9°` sorts after `359°`, and `5°` is the first angle of the ring.
pub fn phi_cmp(a: f64, b: f64) -> Ordering {
    seam_shifted(a).total_cmp(&seam_shifted(b))
}

/// Normalise into `[0, 2π)`.
pub fn normalize_phi(phi: f64) -> f64 {
    let r = phi.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if r >= TAU {
        0.0
    } else {
        r
    }
}

/// Counter-clockwise arc from `from` to `to`, in `[0, 2π)`.
pub fn forward_gap(from: f64, to: f64) -> f64 {
    normalize_phi(to - from)
}

/// Shortest angular distance between two azimuths, in `[0, π]`.
pub fn angular_distance(a: f64, b: f64) -> f64 {
    let d = forward_gap(a, b);
    d.min(TAU - d)
}

/// Midpoint of the counter-clockwise arc running from `first` to `last`.
pub fn arc_midpoint(first: f64, last: f64) -> f64 {
    normalize_phi(first + forward_gap(first, last) / 2.0)
}

/// True when `a` is the better match for `phi` than `b`: strictly closer, or
/// equally close and earlier in seam order.
pub fn nearer(phi: f64, a: f64, b: f64) -> bool {
    let (da, db) = (angular_distance(a, phi), angular_distance(b, phi));
    da < db || (da == db && phi_cmp(a, b).is_lt())
}

pub fn deg_to_rad(deg: f64) -> f64 {
    deg / 360.0 * TAU
}

pub fn rad_to_deg(rad: f64) -> f64 {
    rad / TAU * 360.0
}

// ============================================================================
// PhiKey
// ============================================================================

/// Azimuth used as an ordered-map key.
///
/// `Ord` delegates to [`phi_cmp`], so a `BTreeMap<PhiKey, _>` iterates from the
/// seam (5°) around to 2π and then through 0–5°. Two keys are equal only when
/// their normalised angles are bit-identical.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhiKey(f64);

impl PhiKey {
    pub fn new(phi: f64) -> Self {
        Self(normalize_phi(phi))
    }

    /// Normalised azimuth in `[0, 2π)`.
    pub fn phi(self) -> f64 {
        self.0
    }
}

impl PartialEq for PhiKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PhiKey {}

impl PartialOrd for PhiKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PhiKey {
    fn cmp(&self, other: &Self) -> Ordering {
        phi_cmp(self.0, other.0)
    }
}
