//! Detector geometry input
//!
//! The ring builder never talks to a geometry service directly. It consumes
//! `RollDescriptor`s through the narrow [`GeometrySource`] trait; the file-based
//! [`JsonGeometry`] is the implementation shipped with the crate.

mod json;

pub use json::JsonGeometry;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::azimuth::{forward_gap, normalize_phi};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("IO error reading geometry ({0}): {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Geometry parse error ({0}): {1}")]
    Parse(PathBuf, #[source] serde_json::Error),

    #[error("Roll {raw_id} is invalid: {reason}")]
    InvalidRoll { raw_id: u32, reason: String },
}

/// Anything able to hand out the full list of detector rolls.
pub trait GeometrySource {
    fn rolls(&self) -> Result<Vec<RollDescriptor>, GeometryError>;
}

impl GeometrySource for Vec<RollDescriptor> {
    fn rolls(&self) -> Result<Vec<RollDescriptor>, GeometryError> {
        Ok(self.clone())
    }
}

// ============================================================================
// Roll descriptor
// ============================================================================

/// One physical roll as reported by the geometry collaborator.
///
/// Angles are radians. `strip_phi[i]` is the azimuth of strip `i + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollDescriptor {
    pub raw_id: u32,
    /// 0 for barrel, ±1 for the endcaps
    pub region: i32,
    /// Wheel number in the barrel, ring number in the endcaps
    pub ring: i32,
    /// Hardware plane, 1..=6
    pub hw_plane: u8,
    /// Global eta-partition number; the sign selects the eta side
    pub roll: i32,
    pub phi: f64,
    pub phi_min: f64,
    pub phi_max: f64,
    pub strip_phi: Vec<f64>,
}

impl RollDescriptor {
    /// Roll whose `strip_count` strips are spread evenly over `[phi_min, phi_max]`
    /// (counter-clockwise, wrapping through 0 if needed). Strip centres sit half
    /// a pitch inside each edge.
    pub fn uniform(
        raw_id: u32,
        key: RingKey,
        roll: i32,
        phi_min: f64,
        phi_max: f64,
        strip_count: usize,
    ) -> Self {
        let span = forward_gap(phi_min, phi_max);
        let pitch = if strip_count == 0 {
            0.0
        } else {
            span / strip_count as f64
        };
        let strip_phi = (0..strip_count)
            .map(|i| normalize_phi(phi_min + pitch * (i as f64 + 0.5)))
            .collect();
        Self {
            raw_id,
            region: key.region,
            ring: key.ring,
            hw_plane: key.hw_plane,
            roll,
            phi: normalize_phi(phi_min + span / 2.0),
            phi_min: normalize_phi(phi_min),
            phi_max: normalize_phi(phi_max),
            strip_phi,
        }
    }

    pub fn strip_count(&self) -> usize {
        self.strip_phi.len()
    }

    pub fn ring_key(&self) -> RingKey {
        RingKey {
            region: self.region,
            ring: self.ring,
            hw_plane: self.hw_plane,
        }
    }

    /// `(strip_no, phi)` pairs, strip numbers starting at 1.
    pub fn strips(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.strip_phi
            .iter()
            .enumerate()
            .map(|(i, &phi)| (i as i32 + 1, phi))
    }

    /// Structural checks run before a roll enters a ring.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let invalid = |reason: String| GeometryError::InvalidRoll {
            raw_id: self.raw_id,
            reason,
        };
        if !(1..=6).contains(&self.hw_plane) {
            return Err(invalid(format!("hardware plane {} outside 1..=6", self.hw_plane)));
        }
        if !(-1..=1).contains(&self.region) {
            return Err(invalid(format!("region {} outside -1..=1", self.region)));
        }
        if let Some(bad) = self.strip_phi.iter().find(|p| !p.is_finite()) {
            return Err(invalid(format!("non-finite strip azimuth {bad}")));
        }
        if !self.phi.is_finite() {
            return Err(invalid("non-finite centre azimuth".to_string()));
        }
        Ok(())
    }
}

/// Identity shared by all rolls of one ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RingKey {
    pub region: i32,
    pub ring: i32,
    pub hw_plane: u8,
}

impl RingKey {
    pub fn new(region: i32, ring: i32, hw_plane: u8) -> Self {
        Self {
            region,
            ring,
            hw_plane,
        }
    }
}

impl std::fmt::Display for RingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "region {} ring {} plane {}",
            self.region, self.ring, self.hw_plane
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azimuth::deg_to_rad;

    #[test]
    fn test_uniform_roll_spreads_strips_inside_arc() {
        let key = RingKey::new(0, 1, 2);
        let roll = RollDescriptor::uniform(42, key, 3, deg_to_rad(10.0), deg_to_rad(40.0), 3);
        let phis: Vec<f64> = roll.strips().map(|(_, p)| p).collect();
        assert_eq!(roll.strip_count(), 3);
        assert!((phis[0] - deg_to_rad(15.0)).abs() < 1e-12);
        assert!((phis[2] - deg_to_rad(35.0)).abs() < 1e-12);
        assert!((roll.phi - deg_to_rad(25.0)).abs() < 1e-12);
        assert_eq!(roll.strips().next().map(|(n, _)| n), Some(1));
        assert_eq!(roll.ring_key(), key);
    }

    #[test]
    fn test_uniform_roll_wraps_through_zero() {
        let key = RingKey::new(0, 0, 1);
        let roll = RollDescriptor::uniform(1, key, 0, deg_to_rad(350.0), deg_to_rad(10.0), 4);
        let phis: Vec<f64> = roll.strips().map(|(_, p)| p).collect();
        assert!((phis[0] - deg_to_rad(352.5)).abs() < 1e-9);
        assert!((phis[3] - deg_to_rad(7.5)).abs() < 1e-9);
    }

    #[test]
    fn test_validate_rejects_bad_plane() {
        let mut roll = RollDescriptor::uniform(9, RingKey::new(0, 0, 1), 0, 0.1, 0.2, 2);
        assert!(roll.validate().is_ok());
        roll.hw_plane = 7;
        assert!(matches!(
            roll.validate(),
            Err(GeometryError::InvalidRoll { raw_id: 9, .. })
        ));
    }
}
