//! Builder Integration Tests
//!
//! Geometry file in, connection table file out.

use std::path::Path;

use rpc_ring_links::azimuth::deg_to_rad;
use rpc_ring_links::{
    BuildError, ConnectionTable, ConnectionTableBuilder, GeometryError, GeometrySource,
    JsonGeometry, OverflowPolicy, RingConfig, RingKey, RollDescriptor,
};

/// `count` equal rolls covering the full circle from 6°.
fn full_ring(key: RingKey, glob_roll: i32, first_id: u32, count: u32, strips: usize) -> Vec<RollDescriptor> {
    let span = 360.0 / f64::from(count);
    (0..count)
        .map(|i| {
            let from = 6.0 + span * f64::from(i);
            RollDescriptor::uniform(first_id + i, key, glob_roll, deg_to_rad(from), deg_to_rad(from + span), strips)
        })
        .collect()
}

/// One barrel wheel sector: reference plane plus two others, both eta sides.
fn wheel() -> Vec<RollDescriptor> {
    let mut rolls = Vec::new();
    for (side, base) in [(1, 0), (-1, 10_000)] {
        rolls.extend(full_ring(RingKey::new(0, side, 2), 3 * side, base + 100, 3, 8));
        rolls.extend(full_ring(RingKey::new(0, side, 3), 3 * side, base + 300, 4, 30));
        rolls.extend(full_ring(RingKey::new(0, side, 6), 3 * side, base + 600, 3, 8));
    }
    rolls
}

fn write_geometry(dir: &Path, rolls: &[RollDescriptor]) -> std::path::PathBuf {
    let path = dir.join("rolls.json");
    std::fs::write(&path, serde_json::to_string(rolls).unwrap()).unwrap();
    path
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn geometry_file_to_table_file() {
    let dir = tempfile::tempdir().unwrap();
    let geometry = write_geometry(dir.path(), &wheel());

    let source = JsonGeometry::new(&geometry);
    let builder = ConnectionTableBuilder::from_source(&source, RingConfig::default()).unwrap();
    let (table, report) = builder.build().unwrap();

    assert_eq!(report.rings, 6);
    assert_eq!(report.reference_rings, 2);
    assert_eq!(report.pairings, 4);
    assert_eq!(report.refused_rolls, 0);
    assert_eq!(report.virtual_strips, 0);
    // per side: 24 reference + 3 cones × 40 on plane 3 + 3 cones × 24 on plane 6
    assert_eq!(report.connections, 2 * (24 + 120 + 72));

    let out = dir.path().join("links.json");
    table.write_json(&out, true).unwrap();
    let reloaded = ConnectionTable::from_json(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(reloaded, table);
}

#[test]
fn eta_sides_stay_apart() {
    let (table, _) = ConnectionTableBuilder::from_source(&wheel(), RingConfig::default())
        .unwrap()
        .build()
        .unwrap();

    for (strip, conns) in table.links() {
        let negative = strip.det_raw_id >= 10_000;
        for c in conns {
            assert_eq!(c.tower < 0, negative, "{strip} linked to tower {}", c.tower);
        }
    }
    assert_eq!(table.cone_inputs(3, 0).len(), table.cone_inputs(-3, 0).len());
    assert_eq!(table.cone_inputs(3, 0).len(), 8 + 40 + 24);
}

fn overlapping_references(policy: OverflowPolicy) -> ConnectionTable {
    // two reference rings feeding tower 3 project onto one plane-6 ring of
    // 24 strips, whose cones hold 40 positions
    let mut rolls = full_ring(RingKey::new(0, 1, 2), 3, 100, 3, 8);
    rolls.extend(full_ring(RingKey::new(0, 2, 2), 3, 200, 3, 8));
    rolls.extend(full_ring(RingKey::new(0, 1, 6), 3, 600, 3, 8));

    let mut config = RingConfig::default();
    config.connections.overflow_policy = policy;
    let (table, report) = ConnectionTableBuilder::from_source(&rolls, config)
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(report.pairings, 2);
    table
}

fn plane_6_positions(table: &ConnectionTable, pac: u32) -> Vec<u32> {
    let mut positions: Vec<u32> = table
        .cone_inputs(3, pac)
        .into_iter()
        .filter(|(s, _)| s.det_raw_id >= 600)
        .map(|(_, c)| c.pos_in_cone)
        .collect();
    positions.sort_unstable();
    positions
}

#[test]
fn rejected_overflow_keeps_first_projection_only() {
    let table = overlapping_references(OverflowPolicy::Reject);
    for pac in 0..3 {
        assert_eq!(plane_6_positions(&table, pac), (0..24).collect::<Vec<u32>>());
    }
}

#[test]
fn clamped_overflow_fills_cone_to_capacity() {
    let table = overlapping_references(OverflowPolicy::Clamp);
    for pac in 0..3 {
        assert_eq!(plane_6_positions(&table, pac), (0..40).collect::<Vec<u32>>());
    }
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn malformed_geometry_is_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "[{\"raw_id\": 1}]").unwrap();

    let err = ConnectionTableBuilder::from_source(&JsonGeometry::new(&path), RingConfig::default()).unwrap_err();
    match err {
        BuildError::Geometry(GeometryError::Parse(p, _)) => assert_eq!(p, path),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_geometry_file_is_io_error() {
    let source = JsonGeometry::new("/nonexistent/rolls.json");
    assert!(matches!(source.rolls(), Err(GeometryError::Io(..))));
}

#[test]
fn duplicate_rolls_are_refused_not_fatal() {
    let mut rolls = full_ring(RingKey::new(0, 1, 3), 3, 300, 4, 30);
    // same raw id twice in one ring
    rolls.push(rolls[1].clone());
    let (_, report) = ConnectionTableBuilder::from_source(&rolls, RingConfig::default())
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(report.refused_rolls, 1);
    assert_eq!(report.physical_strips, 120);
}
