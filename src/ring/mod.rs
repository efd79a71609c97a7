//! Ring aggregator - all rolls of one (region, ring, hardware plane)
//!
//! A ring goes through a fixed sequence:
//!
//! 1. `add_roll()` for every roll of the ring (identity latched on the first)
//! 2. `classify_reference()` once the roll set is complete
//! 3. `synthesize_virtual_strips()` exactly once
//! 4. `make_ref_connections()` / `make_other_connections()` as often as needed
//! 5. `connections()` / `into_connections()` to read the links table
//!
//! Calls made out of that order fail with [`RingError::OutOfSequence`] and
//! leave the ring untouched.
//!
//! ## Usage
//!
//! ```ignore
//! let mut reference = RpcRing::new();
//! for roll in ref_rolls { reference.add_roll(roll)?; }
//! reference.classify_reference()?;
//! reference.synthesize_virtual_strips()?;
//!
//! let mut other = RpcRing::new();
//! for roll in other_rolls { other.add_roll(roll)?; }
//! other.classify_reference()?;
//! other.synthesize_virtual_strips()?;
//!
//! let records = reference.make_ref_connections(&mut other)?;
//! ```

mod connections;
mod virtual_strips;

pub use connections::RefCone;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::azimuth::{nearer, rad_to_deg, PhiKey};
use crate::config::{self, RingConfig};
use crate::geometry::{GeometryError, RingKey, RollDescriptor};
use crate::tables::{self, HwPlane, LogicalPlane, RollNumber, TableError};
use crate::types::{count_connections, Links, StripCoords};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum RingError {
    #[error("Roll {raw_id} belongs to {found}, ring is {expected}")]
    IdentityConflict {
        raw_id: u32,
        expected: RingKey,
        found: RingKey,
    },

    #[error("Roll {0} already added to this ring")]
    DuplicateRoll(u32),

    #[error("Roll {raw_id} strip {strip_no} collides with an existing strip azimuth")]
    PhiCollision { raw_id: u32, strip_no: i32 },

    #[error("Roll {0} centre azimuth collides with another roll of the ring")]
    RollPhiCollision(u32),

    #[error("Ring not yet initialized (no roll added)")]
    NotInitialized,

    #[error("Out-of-sequence call: {0}")]
    OutOfSequence(&'static str),

    #[error("Ring {0} is not a reference plane")]
    NotReferencePlane(RingKey),

    #[error("Cone {pac} tower {tower} {logplane}: {requested} positions requested, capacity {capacity}")]
    ConeOverCapacity {
        pac: u32,
        tower: i32,
        logplane: LogicalPlane,
        requested: u32,
        capacity: u32,
    },

    #[error("Invalid roll: {0}")]
    InvalidRoll(#[from] GeometryError),

    #[error("Hardware table lookup failed: {0}")]
    Table(#[from] TableError),
}

// ============================================================================
// Ring identity
// ============================================================================

/// Identity latched from the first roll added to a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RingIdentity {
    pub key: RingKey,
    /// Signed global roll number of the first roll
    pub glob_roll: i32,
    pub ring_id: i32,
}

/// Compact numeric id of a ring, unique per (region, ring, plane, roll).
pub fn ring_from_rolls_id(key: RingKey, glob_roll: i32) -> i32 {
    (key.region + 2) * 100_000 + (key.ring + 3) * 10_000 + i32::from(key.hw_plane) * 1_000 + glob_roll + 100
}

/// Diagnostic snapshot of a ring.
#[derive(Debug, Clone, Serialize)]
pub struct RingSummary {
    pub identity: Option<RingIdentity>,
    pub tower_min: Option<i32>,
    pub tower_max: Option<i32>,
    pub is_ref_plane: bool,
    pub rolls: usize,
    pub physical_strips: usize,
    pub virtual_strips: usize,
    pub strips_with_links: usize,
    pub connections: usize,
}

// ============================================================================
// RpcRing
// ============================================================================

/// All rolls sharing region, ring index and hardware plane, spanning 2π.
#[derive(Debug, Clone)]
pub struct RpcRing {
    config: RingConfig,
    identity: Option<RingIdentity>,
    towers: Option<(i32, i32)>,

    /// Rolls keyed by raw detector id
    rolls: BTreeMap<u32, RollDescriptor>,
    /// Raw ids in seam-shifted azimuth order of the roll centres
    rolls_by_phi: BTreeMap<PhiKey, u32>,
    /// Every strip (real and virtual) in seam-shifted azimuth order
    strips_by_phi: BTreeMap<PhiKey, StripCoords>,
    /// Frozen copy of `strips_by_phi` built by the synthesizer
    strip_order: Vec<(f64, StripCoords)>,

    links: Links,

    ref_classified: bool,
    is_ref_plane: bool,
    did_virtuals: bool,
    physical_strips: usize,
    virtual_strips: usize,

    /// Towers whose reference cones are already in `links`
    ref_towers_done: BTreeSet<i32>,
    /// Positions claimed per (tower, cone, logical plane)
    cone_claims: HashMap<(i32, u32, LogicalPlane), u32>,
}

impl Default for RpcRing {
    fn default() -> Self {
        Self::new()
    }
}

impl RpcRing {
    /// Empty ring using the global configuration (or defaults).
    pub fn new() -> Self {
        Self::with_config(config::current())
    }

    pub fn with_config(config: RingConfig) -> Self {
        Self {
            config,
            identity: None,
            towers: None,
            rolls: BTreeMap::new(),
            rolls_by_phi: BTreeMap::new(),
            strips_by_phi: BTreeMap::new(),
            strip_order: Vec::new(),
            links: Links::new(),
            ref_classified: false,
            is_ref_plane: false,
            did_virtuals: false,
            physical_strips: 0,
            virtual_strips: 0,
            ref_towers_done: BTreeSet::new(),
            cone_claims: HashMap::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Roll collector
    // ------------------------------------------------------------------------

    /// Add one roll to the ring.
    ///
    /// The first accepted roll fixes the ring identity. A roll from another
    /// (region, ring, plane), a repeated raw id, or a strip azimuth already
    /// present is refused and the ring is left unchanged.
    pub fn add_roll(&mut self, roll: RollDescriptor) -> Result<(), RingError> {
        if self.did_virtuals {
            return Err(RingError::OutOfSequence("add_roll after virtual strip synthesis"));
        }
        roll.validate()?;

        let key = roll.ring_key();
        if let Some(identity) = self.identity {
            if identity.key != key {
                warn!(raw_id = roll.raw_id, ring = %identity.key, roll_ring = %key, "Roll refused: identity conflict");
                return Err(RingError::IdentityConflict {
                    raw_id: roll.raw_id,
                    expected: identity.key,
                    found: key,
                });
            }
        }
        if self.rolls.contains_key(&roll.raw_id) {
            return Err(RingError::DuplicateRoll(roll.raw_id));
        }

        let roll_number = RollNumber::from_signed(roll.roll)?;
        let plane = HwPlane::new(roll.hw_plane)?;
        self.check_phi_collisions(&roll)?;

        // Everything below mutates; nothing past this point can fail.
        if self.identity.is_none() {
            let identity = RingIdentity {
                key,
                glob_roll: roll.roll,
                ring_id: ring_from_rolls_id(key, roll.roll),
            };
            debug!(ring = %key, ring_id = identity.ring_id, "Ring identity latched");
            self.identity = Some(identity);
        }

        let side = if roll.roll < 0 { -1 } else { 1 };
        for tower in tables::towers_for(roll_number, plane).into_iter().flatten() {
            let t = side * i32::from(tower);
            self.towers = Some(match self.towers {
                Some((lo, hi)) => (lo.min(t), hi.max(t)),
                None => (t, t),
            });
        }

        for (strip_no, phi) in roll.strips() {
            self.strips_by_phi
                .insert(PhiKey::new(phi), StripCoords::real(roll.raw_id, strip_no));
        }
        self.physical_strips += roll.strip_count();
        self.rolls_by_phi.insert(PhiKey::new(roll.phi), roll.raw_id);
        debug!(
            raw_id = roll.raw_id,
            strips = roll.strip_count(),
            phi_deg = rad_to_deg(roll.phi),
            "Roll added"
        );
        self.rolls.insert(roll.raw_id, roll);
        Ok(())
    }

    fn check_phi_collisions(&self, roll: &RollDescriptor) -> Result<(), RingError> {
        if self.rolls_by_phi.contains_key(&PhiKey::new(roll.phi)) {
            return Err(RingError::RollPhiCollision(roll.raw_id));
        }
        let mut seen = BTreeSet::new();
        for (strip_no, phi) in roll.strips() {
            let key = PhiKey::new(phi);
            if self.strips_by_phi.contains_key(&key) || !seen.insert(key) {
                return Err(RingError::PhiCollision {
                    raw_id: roll.raw_id,
                    strip_no,
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Reference-plane classification
    // ------------------------------------------------------------------------

    /// Decide whether this ring sits on the reference hardware plane.
    pub fn classify_reference(&mut self) -> Result<bool, RingError> {
        let identity = self.identity.ok_or(RingError::NotInitialized)?;
        if !self.ref_classified {
            self.is_ref_plane = identity.key.hw_plane == self.config.connections.reference_hw_plane;
            self.ref_classified = true;
            debug!(ring = %identity.key, is_ref = self.is_ref_plane, "Reference plane classified");
        }
        Ok(self.is_ref_plane)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// The links table built so far.
    pub fn connections(&self) -> &Links {
        &self.links
    }

    /// Consume the ring, returning its links table.
    pub fn into_connections(self) -> Links {
        self.links
    }

    pub fn min_tower(&self) -> Option<i32> {
        self.towers.map(|(lo, _)| lo)
    }

    pub fn max_tower(&self) -> Option<i32> {
        self.towers.map(|(_, hi)| hi)
    }

    pub fn covers_tower(&self, tower: i32) -> bool {
        self.towers.is_some_and(|(lo, hi)| (lo..=hi).contains(&tower))
    }

    pub fn ring_id(&self) -> Option<i32> {
        self.identity.map(|i| i.ring_id)
    }

    pub fn identity(&self) -> Option<RingIdentity> {
        self.identity
    }

    pub fn key(&self) -> Option<RingKey> {
        self.identity.map(|i| i.key)
    }

    pub fn is_ref_plane(&self) -> bool {
        self.is_ref_plane
    }

    /// True once at least one roll was accepted.
    pub fn has_data(&self) -> bool {
        self.identity.is_some()
    }

    pub fn did_virtuals(&self) -> bool {
        self.did_virtuals
    }

    pub fn physical_strip_count(&self) -> usize {
        self.physical_strips
    }

    pub fn virtual_strip_count(&self) -> usize {
        self.virtual_strips
    }

    pub fn roll(&self, raw_id: u32) -> Option<&RollDescriptor> {
        self.rolls.get(&raw_id)
    }

    /// Rolls in seam-shifted order of their centre azimuth.
    pub fn rolls_by_phi(&self) -> impl Iterator<Item = &RollDescriptor> + '_ {
        self.rolls_by_phi
            .values()
            .filter_map(move |raw_id| self.rolls.get(raw_id))
    }

    /// `(phi, strip)` pairs in seam-shifted azimuth order.
    pub fn strips_by_phi(&self) -> impl Iterator<Item = (f64, StripCoords)> + '_ {
        self.strips_by_phi.iter().map(|(k, s)| (k.phi(), *s))
    }

    /// Roll whose centre is angularly closest to `phi`.
    pub fn nearest_roll(&self, phi: f64) -> Option<&RollDescriptor> {
        let raw_id = nearest_in(&self.rolls_by_phi, phi)?;
        self.rolls.get(raw_id)
    }

    /// Strip (real or virtual) angularly closest to `phi`.
    pub fn nearest_strip(&self, phi: f64) -> Option<StripCoords> {
        nearest_in(&self.strips_by_phi, phi).copied()
    }

    /// Logical plane this ring feeds in `tower`, if any.
    pub fn logplane_for_tower(&self, tower: i32) -> Option<LogicalPlane> {
        let identity = self.identity?;
        if tower != 0 && (tower < 0) != (identity.glob_roll < 0) {
            return None;
        }
        let roll = RollNumber::from_signed(identity.glob_roll).ok()?;
        let plane = HwPlane::new(identity.key.hw_plane).ok()?;
        tables::logplane_in_tower(roll, plane, tower.unsigned_abs())
    }

    pub fn summary(&self) -> RingSummary {
        RingSummary {
            identity: self.identity,
            tower_min: self.min_tower(),
            tower_max: self.max_tower(),
            is_ref_plane: self.is_ref_plane,
            rolls: self.rolls.len(),
            physical_strips: self.physical_strips,
            virtual_strips: self.virtual_strips,
            strips_with_links: self.links.len(),
            connections: count_connections(&self.links),
        }
    }

    /// Dump the ring contents to the log.
    pub fn log_contents(&self) {
        let s = self.summary();
        info!(
            ring = ?s.identity.map(|i| i.key),
            towers = ?(s.tower_min, s.tower_max),
            is_ref = s.is_ref_plane,
            rolls = s.rolls,
            physical = s.physical_strips,
            virtual_strips = s.virtual_strips,
            connections = s.connections,
            "Ring contents"
        );
        for roll in self.rolls_by_phi() {
            debug!(
                raw_id = roll.raw_id,
                roll = roll.roll,
                phi_deg = rad_to_deg(roll.phi),
                strips = roll.strip_count(),
                "  roll"
            );
        }
    }
}

/// Value whose key is angularly nearest `phi`, looking across the seam.
fn nearest_in<V>(map: &BTreeMap<PhiKey, V>, phi: f64) -> Option<&V> {
    let at = PhiKey::new(phi);
    let above = map.range(at..).next().or_else(|| map.iter().next());
    let below = map.range(..at).next_back().or_else(|| map.iter().next_back());
    match (above, below) {
        (Some((ka, va)), Some((kb, vb))) => {
            if nearer(phi, ka.phi(), kb.phi()) {
                Some(va)
            } else {
                Some(vb)
            }
        }
        (Some((_, v)), None) | (None, Some((_, v))) => Some(v),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azimuth::deg_to_rad;

    fn ring_key() -> RingKey {
        RingKey::new(0, 1, 3)
    }

    fn roll(raw_id: u32, from_deg: f64, to_deg: f64, strips: usize) -> RollDescriptor {
        RollDescriptor::uniform(raw_id, ring_key(), 3, deg_to_rad(from_deg), deg_to_rad(to_deg), strips)
    }

    #[test]
    fn test_identity_latched_from_first_roll() {
        let mut ring = RpcRing::with_config(RingConfig::default());
        assert!(!ring.has_data());
        ring.add_roll(roll(10, 10.0, 40.0, 6)).expect("first roll");
        ring.add_roll(roll(11, 40.0, 70.0, 6)).expect("second roll");

        let identity = ring.identity().expect("identity");
        assert_eq!(identity.key, ring_key());
        assert_eq!(identity.glob_roll, 3);
        assert_eq!(ring.ring_id(), Some(ring_from_rolls_id(ring_key(), 3)));
        assert_eq!(ring.physical_strip_count(), 12);
    }

    #[test]
    fn test_conflicting_roll_leaves_ring_unchanged() {
        let mut ring = RpcRing::with_config(RingConfig::default());
        ring.add_roll(roll(10, 10.0, 40.0, 6)).expect("first roll");
        let before = ring.summary();

        let mut stranger = roll(20, 100.0, 130.0, 6);
        stranger.hw_plane = 4;
        let err = ring.add_roll(stranger).unwrap_err();
        assert!(matches!(err, RingError::IdentityConflict { raw_id: 20, .. }));

        let after = ring.summary();
        assert_eq!(after.rolls, before.rolls);
        assert_eq!(after.physical_strips, before.physical_strips);
        assert_eq!(ring.min_tower(), before.tower_min);
        assert!(ring.roll(20).is_none());
    }

    #[test]
    fn test_duplicate_raw_id_refused() {
        let mut ring = RpcRing::with_config(RingConfig::default());
        ring.add_roll(roll(10, 10.0, 40.0, 6)).expect("first roll");
        let err = ring.add_roll(roll(10, 50.0, 80.0, 6)).unwrap_err();
        assert!(matches!(err, RingError::DuplicateRoll(10)));
        assert_eq!(ring.physical_strip_count(), 6);
    }

    #[test]
    fn test_overlapping_strip_azimuth_refused() {
        let mut ring = RpcRing::with_config(RingConfig::default());
        ring.add_roll(roll(10, 10.0, 40.0, 6)).expect("first roll");
        // same arc and pitch, so every strip lands on an existing azimuth
        let err = ring.add_roll(roll(11, 10.0, 40.0, 6)).unwrap_err();
        assert!(matches!(err, RingError::PhiCollision { raw_id: 11, .. }));
        assert_eq!(ring.strips_by_phi().count(), 6);
    }

    #[test]
    fn test_roll_centre_collision_refused() {
        let mut ring = RpcRing::with_config(RingConfig::default());
        let first = roll(10, 10.0, 40.0, 6);
        // strips interleave without touching, centre shared with roll 10
        let mut second = roll(11, 20.0, 30.0, 4);
        second.phi = first.phi;
        ring.add_roll(first).expect("first roll");
        let err = ring.add_roll(second).unwrap_err();
        assert!(matches!(err, RingError::RollPhiCollision(11)));
        assert_eq!(ring.physical_strip_count(), 6);
    }

    #[test]
    fn test_tower_range_from_table() {
        // roll 3 on plane 3 feeds towers 2 and 3
        let mut ring = RpcRing::with_config(RingConfig::default());
        ring.add_roll(roll(10, 10.0, 40.0, 6)).expect("roll");
        assert_eq!(ring.min_tower(), Some(2));
        assert_eq!(ring.max_tower(), Some(3));
        assert!(ring.covers_tower(3));
        assert!(!ring.covers_tower(4));
    }

    #[test]
    fn test_negative_eta_side_gives_negative_towers() {
        let mut ring = RpcRing::with_config(RingConfig::default());
        let mut r = roll(10, 10.0, 40.0, 6);
        r.roll = -3;
        ring.add_roll(r).expect("roll");
        assert_eq!(ring.min_tower(), Some(-3));
        assert_eq!(ring.max_tower(), Some(-2));
        assert!(ring.logplane_for_tower(-3).is_some());
        assert!(ring.logplane_for_tower(3).is_none());
    }

    #[test]
    fn test_classification_requires_identity() {
        let mut ring = RpcRing::with_config(RingConfig::default());
        assert!(matches!(ring.classify_reference(), Err(RingError::NotInitialized)));

        let mut reference = RpcRing::with_config(RingConfig::default());
        reference
            .add_roll(RollDescriptor::uniform(1, RingKey::new(0, 1, 2), 3, 0.2, 0.4, 4))
            .expect("roll");
        assert!(reference.classify_reference().expect("classified"));
        assert!(reference.is_ref_plane());

        ring.add_roll(roll(10, 10.0, 40.0, 6)).expect("roll");
        assert!(!ring.classify_reference().expect("classified"));
    }

    #[test]
    fn test_rolls_iterate_in_seam_order() {
        let mut ring = RpcRing::with_config(RingConfig::default());
        ring.add_roll(roll(1, 358.0, 2.0, 2)).expect("seam roll");
        ring.add_roll(roll(2, 200.0, 240.0, 4)).expect("roll");
        ring.add_roll(roll(3, 6.0, 30.0, 4)).expect("roll");
        let order: Vec<u32> = ring.rolls_by_phi().map(|r| r.raw_id).collect();
        // centre of roll 1 is 0°, which sorts after everything else
        assert_eq!(order, vec![3, 2, 1]);
    }

    #[test]
    fn test_nearest_queries_wrap_across_zero() {
        let mut ring = RpcRing::with_config(RingConfig::default());
        ring.add_roll(roll(1, 350.0, 358.0, 4)).expect("roll");
        ring.add_roll(roll(2, 10.0, 18.0, 4)).expect("roll");
        let strip = ring.nearest_strip(deg_to_rad(0.5)).expect("strip");
        assert_eq!((strip.det_raw_id, strip.strip_no), (1, 4));
        assert_eq!(ring.nearest_roll(deg_to_rad(8.0)).map(|r| r.raw_id), Some(2));
        assert_eq!(ring.nearest_roll(deg_to_rad(359.0)).map(|r| r.raw_id), Some(1));
    }
}
