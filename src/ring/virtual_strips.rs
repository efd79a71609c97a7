//! Virtual strip synthesis
//!
//! Real rolls never tile the full 2π exactly: chambers are missing, rolls have
//! different strip counts, and there are dead zones at chamber edges. The PAC
//! addressing needs uniform coverage, so every azimuthal interval that no roll
//! covers and that is wider than `gap_tolerance` pitches is filled with evenly
//! spaced virtual strips. A reference ring is then padded up to a whole number
//! of cones.

use std::f64::consts::TAU;
use tracing::{debug, info, warn};

use super::{RingError, RpcRing};
use crate::azimuth::{angular_distance, deg_to_rad, forward_gap, normalize_phi, rad_to_deg, PhiKey};
use crate::config::defaults;
use crate::tables;
use crate::types::StripCoords;

/// One planned virtual strip.
#[derive(Debug, Clone, Copy)]
struct Fill {
    phi: f64,
    after_raw_id: u32,
}

impl RpcRing {
    /// Fill azimuthal gaps with virtual strips. Returns the number inserted.
    ///
    /// Classifies the ring first if that has not happened yet. Runs once per
    /// ring; a second call fails with `OutOfSequence` and leaves the strip
    /// index exactly as the first call produced it.
    pub fn synthesize_virtual_strips(&mut self) -> Result<usize, RingError> {
        if self.did_virtuals {
            return Err(RingError::OutOfSequence("virtual strips already synthesized"));
        }
        let key = self.key().ok_or(RingError::NotInitialized)?;
        let is_ref = self.classify_reference()?;
        let cone_size = if is_ref { self.reference_cone_size()? } else { None };

        let fills = match self.strip_pitch() {
            Some(pitch) => self.plan_fills(pitch),
            None => {
                warn!(ring = %key, "No strip pitch available, ring left without virtual strips");
                Vec::new()
            }
        };
        let mut inserted = self.insert_fills(fills);

        if let Some(size) = cone_size {
            let padding = self.plan_padding(size);
            if !padding.is_empty() {
                debug!(ring = %key, cone_size = size, padding = padding.len(), "Padding reference ring to whole cones");
            }
            inserted += self.insert_fills(padding);
        }

        self.strip_order = self.strips_by_phi.iter().map(|(k, s)| (k.phi(), *s)).collect();
        self.did_virtuals = true;
        info!(
            ring = %key,
            physical = self.physical_strips,
            virtual_strips = inserted,
            "Virtual strips synthesized"
        );
        Ok(inserted)
    }

    /// Strip pitch used for gap detection, in radians.
    ///
    /// The configured `pitch_deg` wins; otherwise the median spacing between
    /// neighbouring strips of the same roll.
    pub fn strip_pitch(&self) -> Option<f64> {
        if let Some(deg) = self.config.virtual_strips.pitch_deg {
            return Some(deg_to_rad(deg));
        }
        let mut spacings: Vec<f64> = self
            .rolls
            .values()
            .flat_map(|roll| {
                roll.strip_phi
                    .windows(2)
                    .map(|w| angular_distance(w[0], w[1]))
            })
            .filter(|d| *d > 0.0)
            .collect();
        if spacings.is_empty() {
            return None;
        }
        spacings.sort_by(f64::total_cmp);
        Some(spacings[spacings.len() / 2])
    }

    /// Walk the real strips in seam order (wrapping last → first) and plan
    /// virtual strips wherever the stretch between two strips that no roll
    /// arc covers exceeds the tolerance.
    fn plan_fills(&self, pitch: f64) -> Vec<Fill> {
        let tolerance = self.config.virtual_strips.gap_tolerance;
        let limit = tolerance * pitch;
        let strips = self.strip_snapshot();
        if strips.is_empty() {
            return Vec::new();
        }

        let mut fills = Vec::new();
        for (i, &(phi, strip)) in strips.iter().enumerate() {
            let (next_phi, next) = strips[(i + 1) % strips.len()];
            let gap = if strips.len() == 1 {
                TAU
            } else {
                forward_gap(phi, next_phi)
            };
            let uncovered = match (self.rolls.get(&strip.det_raw_id), self.rolls.get(&next.det_raw_id)) {
                (Some(prev), Some(following)) => uncovered_arc(phi, gap, prev.phi_max, following.phi_min),
                _ => gap,
            };
            if uncovered <= limit {
                continue;
            }

            let mut count = virtual_count(gap, pitch, tolerance);
            if count > defaults::MAX_VIRTUAL_PER_GAP {
                warn!(
                    gap_deg = rad_to_deg(gap),
                    wanted = count,
                    cap = defaults::MAX_VIRTUAL_PER_GAP,
                    "Virtual strip count capped"
                );
                count = defaults::MAX_VIRTUAL_PER_GAP;
            }
            debug!(
                from_deg = rad_to_deg(phi),
                gap_deg = rad_to_deg(gap),
                uncovered_deg = rad_to_deg(uncovered),
                count,
                "Filling azimuthal gap"
            );
            fills.extend(spread(phi, gap, count, strip.det_raw_id));
        }
        fills
    }

    /// Cone size every tower of this reference ring can cut the ring into
    /// (least common multiple of the per-tower sizes).
    fn reference_cone_size(&self) -> Result<Option<usize>, RingError> {
        let Some((lo, hi)) = self.towers else {
            return Ok(None);
        };
        let mut size: Option<usize> = None;
        for tower in lo..=hi {
            let Some(logplane) = self.logplane_for_tower(tower) else {
                continue;
            };
            let s = tables::logplane_size(tower.unsigned_abs(), logplane)? as usize;
            if s > 0 {
                size = Some(size.map_or(s, |acc| lcm(acc, s)));
            }
        }
        Ok(size)
    }

    /// Virtual strips that bring the strip count up to a multiple of
    /// `cone_size`, spread over the widest remaining gap.
    fn plan_padding(&self, cone_size: usize) -> Vec<Fill> {
        let strips = self.strip_snapshot();
        let missing = (cone_size - strips.len() % cone_size) % cone_size;
        if strips.is_empty() || missing == 0 {
            return Vec::new();
        }

        let mut widest = (0, 0.0);
        for (i, &(phi, _)) in strips.iter().enumerate() {
            let gap = if strips.len() == 1 {
                TAU
            } else {
                forward_gap(phi, strips[(i + 1) % strips.len()].0)
            };
            // first gap in seam order wins ties
            if gap > widest.1 {
                widest = (i, gap);
            }
        }
        let (phi, strip) = strips[widest.0];
        spread(phi, widest.1, missing, strip.det_raw_id).collect()
    }

    fn strip_snapshot(&self) -> Vec<(f64, StripCoords)> {
        self.strips_by_phi.iter().map(|(k, s)| (k.phi(), *s)).collect()
    }

    /// Insert planned strips with fresh negative numbers. Returns how many
    /// landed (an azimuth already taken is skipped).
    fn insert_fills(&mut self, fills: Vec<Fill>) -> usize {
        let mut inserted = 0;
        for fill in fills {
            let strip_no = -(self.virtual_strips as i32 + 1);
            let coords = StripCoords::virtual_strip(fill.after_raw_id, strip_no);
            if let std::collections::btree_map::Entry::Vacant(slot) =
                self.strips_by_phi.entry(PhiKey::new(fill.phi))
            {
                slot.insert(coords);
                self.virtual_strips += 1;
                inserted += 1;
            }
        }
        inserted
    }
}

/// `count` strips evenly spaced inside the arc of length `gap` after `from`.
fn spread(from: f64, gap: f64, count: usize, after_raw_id: u32) -> impl Iterator<Item = Fill> {
    let step = gap / (count + 1) as f64;
    (1..=count).map(move |k| Fill {
        phi: normalize_phi(from + step * k as f64),
        after_raw_id,
    })
}

/// Part of the arc `gap` after `from` lying between the end of the previous
/// roll (`prev_end`) and the start of the next one (`next_start`).
///
/// Edges just behind `from` count as sitting on it, edges beyond the far
/// strip as sitting on that strip. Overlapping arcs leave nothing uncovered.
fn uncovered_arc(from: f64, gap: f64, prev_end: f64, next_start: f64) -> f64 {
    let offset = |edge: f64| {
        let d = forward_gap(from, edge);
        if d <= gap {
            d
        } else if d < gap + (TAU - gap) / 2.0 {
            gap
        } else {
            0.0
        }
    };
    (offset(next_start) - offset(prev_end)).max(0.0)
}

/// Number of virtual strips for a gap so that no sub-gap exceeds
/// `tolerance × pitch` and the density stays near one per pitch.
fn virtual_count(gap: f64, pitch: f64, tolerance: f64) -> usize {
    let by_pitch = (gap / pitch).round();
    let by_limit = (gap / (tolerance * pitch)).ceil();
    (by_pitch.max(by_limit) as usize).saturating_sub(1)
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: usize, b: usize) -> usize {
    a / gcd(a, b) * b
}
