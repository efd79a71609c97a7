//! Connection table builder
//!
//! Drives every ring through its protocol and merges the results:
//!
//! 1. group rolls from a [`GeometrySource`] into rings (one ring per region,
//!    ring index, hardware plane and eta partition)
//! 2. classify and synthesize each ring (independent, run in parallel)
//! 3. pair every reference ring with each non-reference ring sharing a tower
//! 4. merge all links into one [`ConnectionTable`]

mod table;

pub use table::ConnectionTable;

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::RingConfig;
use crate::geometry::{GeometryError, GeometrySource, RingKey, RollDescriptor};
use crate::ring::{RingError, RpcRing};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Ring error: {0}")]
    Ring(#[from] RingError),

    #[error("IO error ({0}): {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rings are built per eta partition, so the signed roll joins the ring key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RingSlot {
    pub key: RingKey,
    pub roll: i32,
}

/// Counters reported after a build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub rings: usize,
    pub reference_rings: usize,
    pub refused_rolls: usize,
    pub physical_strips: usize,
    pub virtual_strips: usize,
    pub pairings: usize,
    pub strips_with_links: usize,
    pub connections: usize,
}

#[derive(Debug)]
pub struct ConnectionTableBuilder {
    config: RingConfig,
    rings: BTreeMap<RingSlot, RpcRing>,
    report: BuildReport,
}

impl ConnectionTableBuilder {
    pub fn new(config: RingConfig) -> Self {
        Self {
            config,
            rings: BTreeMap::new(),
            report: BuildReport::default(),
        }
    }

    /// Builder filled with every roll of `source`.
    pub fn from_source(source: &dyn GeometrySource, config: RingConfig) -> Result<Self, BuildError> {
        let mut builder = Self::new(config);
        builder.add_rolls(source.rolls()?);
        Ok(builder)
    }

    /// Route rolls to their rings. Refused rolls are logged and counted.
    pub fn add_rolls(&mut self, rolls: impl IntoIterator<Item = RollDescriptor>) {
        for roll in rolls {
            let slot = RingSlot {
                key: roll.ring_key(),
                roll: roll.roll,
            };
            let raw_id = roll.raw_id;
            let config = &self.config;
            let ring = self
                .rings
                .entry(slot)
                .or_insert_with(|| RpcRing::with_config(config.clone()));
            if let Err(e) = ring.add_roll(roll) {
                warn!(raw_id, error = %e, "Roll refused");
                self.report.refused_rolls += 1;
            }
        }
        // a ring whose only roll was refused carries no identity
        self.rings.retain(|_, ring| ring.has_data());
    }

    pub fn rings(&self) -> impl Iterator<Item = (&RingSlot, &RpcRing)> {
        self.rings.iter()
    }

    /// Classify and synthesize every ring. Rings are independent here.
    pub fn prepare(&mut self) -> Result<(), BuildError> {
        self.rings
            .par_iter_mut()
            .try_for_each(|(_, ring)| -> Result<(), RingError> {
                ring.classify_reference()?;
                ring.synthesize_virtual_strips()?;
                Ok(())
            })?;
        debug!(rings = self.rings.len(), "Rings prepared");
        Ok(())
    }

    /// Pair every reference ring with every other ring sharing a tower.
    pub fn connect(&mut self) -> Result<(), BuildError> {
        let (mut references, mut others): (BTreeMap<_, _>, BTreeMap<_, _>) =
            std::mem::take(&mut self.rings)
                .into_iter()
                .partition(|(_, ring)| ring.is_ref_plane());

        let mut result = Ok(());
        'pairs: for (ref_slot, reference) in references.iter_mut() {
            for (slot, other) in others.iter_mut() {
                if !shares_tower(reference, other) {
                    continue;
                }
                match reference.make_ref_connections(other) {
                    Ok(n) => {
                        self.report.pairings += 1;
                        debug!(reference = ?ref_slot, other = ?slot, records = n, "Rings paired");
                    }
                    Err(e) => {
                        result = Err(e.into());
                        break 'pairs;
                    }
                }
            }
        }

        self.rings.append(&mut references);
        self.rings.append(&mut others);
        result
    }

    /// Run the whole protocol and return the merged table.
    pub fn build(mut self) -> Result<(ConnectionTable, BuildReport), BuildError> {
        self.prepare()?;
        self.connect()?;

        let mut report = self.report;
        let mut table = ConnectionTable::new();
        for (_, ring) in self.rings {
            report.rings += 1;
            report.reference_rings += usize::from(ring.is_ref_plane());
            report.physical_strips += ring.physical_strip_count();
            report.virtual_strips += ring.virtual_strip_count();
            table.merge(ring.into_connections());
        }
        report.strips_with_links = table.strip_count();
        report.connections = table.connection_count();

        info!(
            rings = report.rings,
            reference_rings = report.reference_rings,
            pairings = report.pairings,
            connections = report.connections,
            "Connection table built"
        );
        Ok((table, report))
    }
}

fn shares_tower(a: &RpcRing, b: &RpcRing) -> bool {
    match (a.min_tower(), a.max_tower()) {
        (Some(lo), Some(hi)) => (lo..=hi).any(|t| b.covers_tower(t)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azimuth::deg_to_rad;

    fn ring_rolls(key: RingKey, roll: i32, first_id: u32, rolls: u32, strips: usize) -> Vec<RollDescriptor> {
        let span = 360.0 / rolls as f64;
        (0..rolls)
            .map(|i| {
                let from = 6.0 + span * i as f64;
                RollDescriptor::uniform(first_id + i, key, roll, deg_to_rad(from), deg_to_rad(from + span), strips)
            })
            .collect()
    }

    #[test]
    fn test_rolls_grouped_per_eta_partition() {
        let key = RingKey::new(0, 1, 3);
        let mut builder = ConnectionTableBuilder::new(RingConfig::default());
        builder.add_rolls(ring_rolls(key, 3, 100, 4, 10));
        builder.add_rolls(ring_rolls(key, 4, 200, 4, 10));
        assert_eq!(builder.rings().count(), 2);
    }

    #[test]
    fn test_build_pairs_reference_with_overlapping_rings() {
        let mut rolls = ring_rolls(RingKey::new(0, 1, 2), 3, 100, 3, 8);
        rolls.extend(ring_rolls(RingKey::new(0, 1, 6), 3, 200, 3, 8));
        // roll 12 on plane 3 feeds towers 11-12, no overlap with tower 3
        rolls.extend(ring_rolls(RingKey::new(1, 2, 3), 12, 300, 3, 8));

        let builder = ConnectionTableBuilder::from_source(&rolls, RingConfig::default()).expect("builder");
        let (table, report) = builder.build().expect("build");
        assert_eq!(report.rings, 3);
        assert_eq!(report.reference_rings, 1);
        assert_eq!(report.pairings, 1);
        assert_eq!(report.refused_rolls, 0);
        // 24 reference records + 3 cones × 24 strips on plane 6
        assert_eq!(table.connection_count(), 24 + 72);
        assert!(table.links().keys().all(|s| s.det_raw_id < 300));
    }

    #[test]
    fn test_refused_rolls_counted() {
        let key = RingKey::new(0, 1, 3);
        let mut rolls = ring_rolls(key, 3, 100, 4, 10);
        rolls.push(rolls[0].clone());
        let mut builder = ConnectionTableBuilder::new(RingConfig::default());
        builder.add_rolls(rolls);
        let (_, report) = builder.build().expect("build");
        assert_eq!(report.refused_rolls, 1);
        assert_eq!(report.rings, 1);
    }
}
