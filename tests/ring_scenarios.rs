//! Ring Scenario Tests
//!
//! Whole-ring behaviour through the public API: gap filling, cone grouping,
//! seam ordering and the call protocol.

use rpc_ring_links::azimuth::{angular_distance, deg_to_rad, rad_to_deg};
use rpc_ring_links::ring::{RingError, RpcRing};
use rpc_ring_links::{RingConfig, RingKey, RollDescriptor};

fn roll(raw_id: u32, key: RingKey, glob_roll: i32, from_deg: f64, to_deg: f64, strips: usize) -> RollDescriptor {
    RollDescriptor::uniform(raw_id, key, glob_roll, deg_to_rad(from_deg), deg_to_rad(to_deg), strips)
}

fn prepared(rolls: Vec<RollDescriptor>, config: RingConfig) -> RpcRing {
    let mut ring = RpcRing::with_config(config);
    for r in rolls {
        ring.add_roll(r).unwrap();
    }
    ring.classify_reference().unwrap();
    ring.synthesize_virtual_strips().unwrap();
    ring
}

// ============================================================================
// Virtual strips
// ============================================================================

#[test]
fn missing_chamber_is_filled_with_virtual_strips_only_in_the_gap() {
    let key = RingKey::new(0, 1, 3);
    // 10°-130° in three rolls, nothing 130°-240°, one roll 240°-10°
    let ring = prepared(
        vec![
            roll(1, key, 3, 10.0, 50.0, 40),
            roll(2, key, 3, 50.0, 90.0, 40),
            roll(3, key, 3, 90.0, 130.0, 40),
            roll(4, key, 3, 240.0, 10.0, 130),
        ],
        RingConfig::default(),
    );

    assert_eq!(ring.physical_strip_count(), 250);
    assert_eq!(ring.virtual_strip_count(), 110);

    for (phi, strip) in ring.strips_by_phi() {
        let deg = rad_to_deg(phi);
        if strip.is_virtual {
            assert!(deg > 130.0 && deg < 240.0, "virtual strip at {deg}°");
            // named after the last real strip before the gap
            assert_eq!(strip.det_raw_id, 3);
            assert!(strip.strip_no < 0);
        } else {
            assert!(!(130.0..240.0).contains(&deg), "real strip at {deg}°");
        }
    }
}

#[test]
fn gap_tolerance_controls_filling() {
    let key = RingKey::new(0, 1, 3);
    let rolls = || {
        vec![
            roll(1, key, 3, 10.0, 180.0, 170),
            // 3 pitches missing between the two rolls
            roll(2, key, 3, 183.0, 10.0, 187),
        ]
    };

    let default = prepared(rolls(), RingConfig::default());
    assert_eq!(default.virtual_strip_count(), 3);

    let mut loose = RingConfig::default();
    loose.virtual_strips.gap_tolerance = 5.0;
    let loose = prepared(rolls(), loose);
    assert_eq!(loose.virtual_strip_count(), 0);
}

#[test]
fn rolls_of_different_pitch_need_no_virtual_strips() {
    let key = RingKey::new(0, 1, 3);
    // full ring; the middle roll is three times coarser than the median pitch
    let ring = prepared(
        vec![
            roll(1, key, 3, 10.0, 130.0, 120),
            roll(2, key, 3, 130.0, 250.0, 40),
            roll(3, key, 3, 250.0, 10.0, 120),
        ],
        RingConfig::default(),
    );
    assert_eq!(ring.physical_strip_count(), 280);
    assert_eq!(ring.virtual_strip_count(), 0);
}

// ============================================================================
// Cones
// ============================================================================

#[test]
fn reference_cones_group_strips_nearest_their_centre() {
    // roll 3 on plane 2 -> tower 3, logical plane 3, 8 strips per cone
    let key = RingKey::new(0, 0, 2);
    let mut config = RingConfig::default();
    config.virtual_strips.gap_tolerance = 1000.0;
    let centres = [0.0, 10.0, 20.0];
    let rolls = centres
        .iter()
        .enumerate()
        .map(|(i, c)| roll(10 + i as u32, key, 3, c - 5.0, c + 5.0, 8))
        .collect();
    let mut reference = prepared(rolls, config);
    assert_eq!(reference.virtual_strip_count(), 0);

    let cones = reference.reference_cones().unwrap();
    assert_eq!(cones.len(), 3);
    // seam order starts at 5°, so the cone around 0° comes last
    for (cone, expected) in cones.iter().zip([10.0, 20.0, 0.0]) {
        assert!(angular_distance(cone.phi_center, deg_to_rad(expected)) < 1e-9);
    }

    let mut other = prepared(
        (0..3)
            .map(|i| roll(200 + i, RingKey::new(0, 0, 6), 3, 6.0 + 120.0 * f64::from(i), 126.0 + 120.0 * f64::from(i), 8))
            .collect(),
        RingConfig::default(),
    );
    reference.make_ref_connections(&mut other).unwrap();

    let mut pacs: Vec<u32> = reference
        .connections()
        .values()
        .flatten()
        .map(|c| c.pac)
        .collect();
    pacs.sort_unstable();
    pacs.dedup();
    assert_eq!(pacs, vec![0, 1, 2]);

    for (strip, conns) in reference.connections() {
        assert_eq!(conns.len(), 1);
        let pac = conns[0].pac as usize;
        let phi = reference
            .strips_by_phi()
            .find(|(_, s)| s == strip)
            .map(|(p, _)| p)
            .unwrap();
        let own = angular_distance(phi, cones[pac].phi_center);
        for (i, cone) in cones.iter().enumerate() {
            if i != pac {
                assert!(own < angular_distance(phi, cone.phi_center));
            }
        }
    }
}

#[test]
fn reference_cones_over_a_filled_gap() {
    // plane 2, roll 3: 8 strips per cone, 15° pitch, 6°-126° and 246°-6° present
    let key = RingKey::new(0, 0, 2);
    let mut reference = prepared(
        vec![roll(1, key, 3, 6.0, 126.0, 8), roll(2, key, 3, 246.0, 6.0, 8)],
        RingConfig::default(),
    );
    assert_eq!(reference.virtual_strip_count(), 8);

    let cones = reference.reference_cones().unwrap();
    assert_eq!(cones.len(), 3);
    for (cone, expected) in cones.iter().zip([66.0, 186.0, 306.0]) {
        assert!((rad_to_deg(cone.phi_center) - expected).abs() < 1e-6);
    }
    assert!(cones[0].strips.iter().all(|s| !s.is_virtual && s.det_raw_id == 1));
    assert!(cones[1].strips.iter().all(|s| s.is_virtual));
    assert!(cones[2].strips.iter().all(|s| !s.is_virtual && s.det_raw_id == 2));

    let mut other = prepared(
        (0..3)
            .map(|i| roll(200 + i, RingKey::new(0, 0, 6), 3, 6.0 + 120.0 * f64::from(i), 126.0 + 120.0 * f64::from(i), 8))
            .collect(),
        RingConfig::default(),
    );
    reference.make_ref_connections(&mut other).unwrap();
    assert_eq!(reference.connections().len(), 24);
    for (i, cone) in cones.iter().enumerate() {
        for (pos, strip) in cone.strips.iter().enumerate() {
            let conns = &reference.connections()[strip];
            assert_eq!(conns.len(), 1);
            assert_eq!((conns[0].pac as usize, conns[0].pos_in_cone as usize), (i, pos));
        }
    }
}

#[test]
fn reference_strips_off_the_cone_size_are_padded() {
    // 3 × 7 = 21 real strips, cones of 8
    let key = RingKey::new(0, 0, 2);
    let mut reference = prepared(
        (0..3)
            .map(|i| roll(10 + i, key, 3, 6.0 + 120.0 * f64::from(i), 126.0 + 120.0 * f64::from(i), 7))
            .collect(),
        RingConfig::default(),
    );
    assert_eq!(reference.physical_strip_count(), 21);
    assert_eq!(reference.virtual_strip_count(), 3);

    let cones = reference.reference_cones().unwrap();
    assert_eq!(cones.len(), 3);
    assert!(cones.iter().all(|c| c.strips.len() == 8));

    let mut other = prepared(
        (0..3)
            .map(|i| roll(200 + i, RingKey::new(0, 0, 6), 3, 6.0 + 120.0 * f64::from(i), 126.0 + 120.0 * f64::from(i), 8))
            .collect(),
        RingConfig::default(),
    );
    reference.make_ref_connections(&mut other).unwrap();

    let links: usize = reference.connections().values().map(Vec::len).sum();
    assert_eq!(links, 24);
    for (_, strip) in reference.strips_by_phi().filter(|(_, s)| !s.is_virtual) {
        assert_eq!(reference.connections()[&strip].len(), 1, "{strip:?} has no cone");
    }
}

#[test]
fn projected_cone_positions_are_unique_per_cone() {
    let mut reference = prepared(
        (0..3)
            .map(|i| roll(100 + i, RingKey::new(0, 0, 2), 3, 6.0 + 120.0 * f64::from(i), 126.0 + 120.0 * f64::from(i), 8))
            .collect(),
        RingConfig::default(),
    );
    // plane 3 feeds tower 3 on logical plane 5, 40 strips per cone
    let mut other = prepared(
        (0..4)
            .map(|i| roll(300 + i, RingKey::new(0, 0, 3), 3, 6.0 + 90.0 * f64::from(i), 96.0 + 90.0 * f64::from(i), 30))
            .collect(),
        RingConfig::default(),
    );
    reference.make_ref_connections(&mut other).unwrap();

    for pac in 0..3 {
        let mut positions: Vec<u32> = other
            .connections()
            .values()
            .flatten()
            .filter(|c| c.pac == pac)
            .map(|c| {
                assert_eq!((c.tower, c.logplane), (3, 5));
                c.pos_in_cone
            })
            .collect();
        positions.sort_unstable();
        assert_eq!(positions, (0..40).collect::<Vec<u32>>());
    }
}

// ============================================================================
// Ordering and protocol
// ============================================================================

#[test]
fn strips_just_past_zero_sort_last() {
    let key = RingKey::new(0, 1, 3);
    let mut ring = RpcRing::with_config(RingConfig::default());
    ring.add_roll(roll(1, key, 3, 350.0, 4.0, 14)).unwrap();
    let order: Vec<f64> = ring.strips_by_phi().map(|(p, _)| rad_to_deg(p)).collect();
    assert!((order[0] - 350.5).abs() < 1e-9);
    assert!((order[order.len() - 1] - 3.5).abs() < 1e-9);
}

#[test]
fn protocol_violations_leave_rings_untouched() {
    let key = RingKey::new(0, 1, 3);
    let mut ring = RpcRing::with_config(RingConfig::default());
    assert!(matches!(
        ring.make_other_connections(0.3, 3, 0),
        Err(RingError::OutOfSequence(_))
    ));

    ring.add_roll(roll(1, key, 3, 10.0, 130.0, 120)).unwrap();
    ring.synthesize_virtual_strips().unwrap();
    let strips = ring.strips_by_phi().count();

    assert!(matches!(
        ring.add_roll(roll(2, key, 3, 200.0, 220.0, 20)),
        Err(RingError::OutOfSequence(_))
    ));
    assert!(matches!(
        ring.synthesize_virtual_strips(),
        Err(RingError::OutOfSequence(_))
    ));
    assert_eq!(ring.strips_by_phi().count(), strips);
    assert!(ring.roll(2).is_none());
}
