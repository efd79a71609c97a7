//! Connection builder
//!
//! The reference ring cuts its strips (seam order, virtual strips included)
//! into consecutive cones of `LOGPLANE_SIZE` strips per tower. Each cone's
//! centre is then projected onto the other rings, which pick the same number
//! of strips around their own strip nearest to that centre.

use tracing::{debug, warn};

use super::{RingError, RpcRing};
use crate::azimuth::{arc_midpoint, nearer, phi_cmp, rad_to_deg};
use crate::config::OverflowPolicy;
use crate::tables::{self, LogicalPlane};
use crate::types::{Connection, StripCoords};

/// One cone of the reference ring.
#[derive(Debug, Clone)]
pub struct RefCone {
    pub pac: u32,
    pub tower: i32,
    pub logplane: LogicalPlane,
    pub phi_center: f64,
    pub strips: Vec<StripCoords>,
}

impl RpcRing {
    /// Cones this reference ring defines, tower by tower.
    ///
    /// Synthesis pads a reference ring to whole cones, so a leftover only
    /// shows up when padding could not land; those strips belong to no cone.
    pub fn reference_cones(&self) -> Result<Vec<RefCone>, RingError> {
        let key = self.key().ok_or(RingError::NotInitialized)?;
        if !self.is_ref_plane {
            return Err(RingError::NotReferencePlane(key));
        }
        if !self.did_virtuals {
            return Err(RingError::OutOfSequence("reference cones before virtual strip synthesis"));
        }
        let Some((lo, hi)) = self.towers else {
            return Ok(Vec::new());
        };

        let mut cones = Vec::new();
        for tower in lo..=hi {
            let Some(logplane) = self.logplane_for_tower(tower) else {
                continue;
            };
            if self.config.connections.reference_hw_plane == tables::REF_HW_PLANE
                && tables::ref_logplane(tower.unsigned_abs()).ok() != Some(logplane)
            {
                warn!(ring = %key, tower, %logplane, "Reference roll maps off the reference logical plane");
            }
            let size = tables::logplane_size(tower.unsigned_abs(), logplane)? as usize;
            if size == 0 {
                continue;
            }
            let leftover = self.strip_order.len() % size;
            if leftover != 0 {
                warn!(ring = %key, tower, size, leftover, "Strip count is not a multiple of the cone size");
            }
            for (pac, group) in self.strip_order.chunks_exact(size).enumerate() {
                let (first, last) = (group[0].0, group[group.len() - 1].0);
                cones.push(RefCone {
                    pac: pac as u32,
                    tower,
                    logplane,
                    phi_center: arc_midpoint(first, last),
                    strips: group.iter().map(|(_, s)| *s).collect(),
                });
            }
        }
        Ok(cones)
    }

    /// Build the reference links of this ring and project every cone onto
    /// `other`. Returns the number of records appended to both rings.
    ///
    /// The reference links of a tower are recorded on the first call only, so
    /// pairing one reference ring with many other rings never duplicates them.
    /// Projections the other ring refuses (over capacity) are logged and skipped.
    pub fn make_ref_connections(&mut self, other: &mut RpcRing) -> Result<usize, RingError> {
        let cones = self.reference_cones()?;
        if !other.did_virtuals {
            return Err(RingError::OutOfSequence("counterpart ring has no virtual strips yet"));
        }

        let mut produced = 0;
        for cone in &cones {
            if other.covers_tower(cone.tower) {
                match other.make_other_connections(cone.phi_center, cone.tower, cone.pac) {
                    Ok(n) => produced += n,
                    Err(e) => {
                        warn!(pac = cone.pac, tower = cone.tower, error = %e, "Cone projection skipped");
                    }
                }
            }
        }

        for cone in &cones {
            if self.ref_towers_done.contains(&cone.tower) {
                continue;
            }
            for (pos, strip) in cone.strips.iter().enumerate() {
                self.links.entry(*strip).or_default().push(Connection {
                    pac: cone.pac,
                    tower: cone.tower,
                    logplane: cone.logplane.number(),
                    pos_in_cone: pos as u32,
                });
                produced += 1;
            }
            *self
                .cone_claims
                .entry((cone.tower, cone.pac, cone.logplane))
                .or_default() += cone.strips.len() as u32;
        }
        self.ref_towers_done.extend(cones.iter().map(|c| c.tower));

        debug!(
            ring = ?self.key(),
            other = ?other.key(),
            cones = cones.len(),
            produced,
            "Reference connections built"
        );
        Ok(produced)
    }

    /// Attach the strips of this ring nearest `phi_center` to cone `pac` of
    /// `tower`. Returns the number of records appended.
    ///
    /// Zero records (not an error) when the tower is outside the ring's range
    /// or the ring has no logical plane there.
    pub fn make_other_connections(
        &mut self,
        phi_center: f64,
        tower: i32,
        pac: u32,
    ) -> Result<usize, RingError> {
        if !self.did_virtuals {
            return Err(RingError::OutOfSequence("connections before virtual strip synthesis"));
        }
        if !self.covers_tower(tower) {
            debug!(tower, ring = ?self.key(), "Tower outside ring range");
            return Ok(0);
        }
        let Some(logplane) = self.logplane_for_tower(tower) else {
            return Ok(0);
        };
        let capacity = tables::logplane_size(tower.unsigned_abs(), logplane)?;
        let Some(center) = self.nearest_strip_index(phi_center) else {
            return Ok(0);
        };
        if capacity == 0 {
            return Ok(0);
        }

        let n = self.strip_order.len();
        let window = (capacity as usize).min(n);
        let claimed = self
            .cone_claims
            .get(&(tower, pac, logplane))
            .copied()
            .unwrap_or(0);
        let requested = claimed + window as u32;

        let take = if requested > capacity {
            match self.config.connections.overflow_policy {
                OverflowPolicy::Reject => {
                    return Err(RingError::ConeOverCapacity {
                        pac,
                        tower,
                        logplane,
                        requested,
                        capacity,
                    });
                }
                OverflowPolicy::Clamp => capacity.saturating_sub(claimed) as usize,
            }
        } else {
            window
        };

        let start = (center + n - window / 2) % n;
        for i in 0..take {
            let (_, strip) = self.strip_order[(start + i) % n];
            self.links.entry(strip).or_default().push(Connection {
                pac,
                tower,
                logplane: logplane.number(),
                pos_in_cone: claimed + i as u32,
            });
        }
        if take > 0 {
            *self.cone_claims.entry((tower, pac, logplane)).or_default() += take as u32;
        }

        debug!(
            pac,
            tower,
            %logplane,
            phi_deg = rad_to_deg(phi_center),
            records = take,
            "Cone projected"
        );
        Ok(take)
    }

    /// Index into `strip_order` of the strip angularly nearest `phi`.
    fn nearest_strip_index(&self, phi: f64) -> Option<usize> {
        let n = self.strip_order.len();
        if n == 0 {
            return None;
        }
        let above = self
            .strip_order
            .partition_point(|(p, _)| phi_cmp(*p, phi).is_lt())
            % n;
        let below = (above + n - 1) % n;
        Some(if nearer(phi, self.strip_order[above].0, self.strip_order[below].0) {
            above
        } else {
            below
        })
    }
}
