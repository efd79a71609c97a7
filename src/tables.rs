//! Static hardware tables
//!
//! Three compile-time tables describe how the PAC trigger reads the detector:
//!
//! - tower assignment: which trigger towers a roll contributes to, per
//!   hardware plane, in up to three position categories
//! - logical-plane assignment: the logical plane the same (roll, plane,
//!   position) feeds in that tower
//! - logical-plane capacity: how many strips one cone reads on a logical
//!   plane of a tower
//!
//! The tables are fixed domain data. The raw arrays stay private; all lookups
//! go through the enumerated dimensions below so out-of-range indices are
//! rejected at construction instead of at array access.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest roll (eta partition) number.
pub const IROLL_MAX: usize = 17;
/// Number of position categories per (roll, plane).
pub const NPOS: usize = 3;
/// Number of hardware planes.
pub const NHPLANES: usize = 6;
/// Highest tower number.
pub const TOWER_MAX: usize = 16;
/// Number of logical planes.
pub const NLOGPLANES: usize = 6;

/// Hardware plane that defines cone centres.
pub const REF_HW_PLANE: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("Roll number {0} outside 0..=17")]
    RollOutOfRange(u32),

    #[error("Hardware plane {0} outside 1..=6")]
    PlaneOutOfRange(u8),

    #[error("Logical plane {0} outside 1..=6")]
    LogicalPlaneOutOfRange(u8),

    #[error("Tower {0} outside 0..=16")]
    TowerOutOfRange(u32),
}

// ============================================================================
// Enumerated dimensions
// ============================================================================

/// Eta-partition index of a roll, magnitude only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RollNumber(u8);

impl RollNumber {
    pub fn new(n: u32) -> Result<Self, TableError> {
        if n as usize > IROLL_MAX {
            return Err(TableError::RollOutOfRange(n));
        }
        Ok(Self(n as u8))
    }

    /// Magnitude of a signed global roll number (the sign carries the eta side).
    pub fn from_signed(roll: i32) -> Result<Self, TableError> {
        Self::new(roll.unsigned_abs())
    }

    pub fn get(self) -> u8 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HwPlane {
    P1,
    P2,
    P3,
    P4,
    P5,
    P6,
}

impl HwPlane {
    pub const ALL: [HwPlane; NHPLANES] = [
        HwPlane::P1,
        HwPlane::P2,
        HwPlane::P3,
        HwPlane::P4,
        HwPlane::P5,
        HwPlane::P6,
    ];

    /// Build from the 1-based hardware plane number.
    pub fn new(plane: u8) -> Result<Self, TableError> {
        match plane {
            1..=6 => Ok(Self::ALL[(plane - 1) as usize]),
            _ => Err(TableError::PlaneOutOfRange(plane)),
        }
    }

    /// 1-based hardware plane number.
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    fn index(self) -> usize {
        match self {
            HwPlane::P1 => 0,
            HwPlane::P2 => 1,
            HwPlane::P3 => 2,
            HwPlane::P4 => 3,
            HwPlane::P5 => 4,
            HwPlane::P6 => 5,
        }
    }
}

/// Which of the (up to three) towers of a roll an entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PosCategory {
    First,
    Second,
    Third,
}

impl PosCategory {
    pub const ALL: [PosCategory; NPOS] = [PosCategory::First, PosCategory::Second, PosCategory::Third];

    fn index(self) -> usize {
        match self {
            PosCategory::First => 0,
            PosCategory::Second => 1,
            PosCategory::Third => 2,
        }
    }
}

/// 1-based logical plane of the PAC logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalPlane(u8);

impl LogicalPlane {
    pub fn new(plane: u8) -> Result<Self, TableError> {
        if plane == 0 || plane as usize > NLOGPLANES {
            return Err(TableError::LogicalPlaneOutOfRange(plane));
        }
        Ok(Self(plane))
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for LogicalPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

// ============================================================================
// Raw tables
// ============================================================================

// [roll][hw plane - 1][position] -> tower, -1 = no contribution
#[rustfmt::skip]
const MRTOW: [[[i8; NPOS]; NHPLANES]; IROLL_MAX + 1] = [
    [[ 0,  1, -1], [ 0, -1, -1], [ 0, -1, -1], [ 0, -1, -1], [ 0,  1, -1], [ 0, -1, -1]], // roll 0
    [[ 0,  1,  2], [ 1, -1, -1], [ 0,  1, -1], [ 0,  1, -1], [ 1,  2, -1], [ 1, -1, -1]], // roll 1
    [[ 1,  2,  3], [ 2, -1, -1], [ 1,  2, -1], [ 1,  2, -1], [ 2,  3, -1], [ 2, -1, -1]], // roll 2
    [[ 2,  3,  4], [ 3, -1, -1], [ 2,  3, -1], [ 2,  3, -1], [ 3,  4, -1], [ 3, -1, -1]], // roll 3
    [[ 3,  4,  5], [ 4, -1, -1], [ 3,  4, -1], [ 3,  4, -1], [ 4,  5, -1], [ 4, -1, -1]], // roll 4
    [[ 4,  5,  6], [ 5, -1, -1], [ 4,  5, -1], [ 4,  5, -1], [ 5,  6, -1], [ 5, -1, -1]], // roll 5
    [[ 5,  6,  7], [ 6, -1, -1], [ 5,  6, -1], [ 5, -1, -1], [ 6,  7, -1], [ 6, -1, -1]], // roll 6
    [[ 6,  7,  8], [ 7, -1, -1], [ 6,  7, -1], [-1, -1, -1], [ 7,  8, -1], [ 7, -1, -1]], // roll 7
    [[ 7,  8,  9], [ 8, -1, -1], [ 7, -1, -1], [-1, -1, -1], [ 8, -1, -1], [ 8, -1, -1]], // roll 8
    [[ 8,  9, 10], [ 9, -1, -1], [ 9, -1, -1], [-1, -1, -1], [-1, -1, -1], [-1, -1, -1]], // roll 9
    [[ 9, 10, 11], [10, -1, -1], [ 9, 10, -1], [10, -1, -1], [-1, -1, -1], [-1, -1, -1]], // roll 10
    [[10, 11, 12], [11, -1, -1], [10, 11, -1], [10, 11, -1], [-1, -1, -1], [-1, -1, -1]], // roll 11
    [[11, 12, 13], [12, -1, -1], [11, 12, -1], [11, 12, -1], [-1, -1, -1], [-1, -1, -1]], // roll 12
    [[12, 13, 14], [13, -1, -1], [12, 13, -1], [12, 13, -1], [-1, -1, -1], [-1, -1, -1]], // roll 13
    [[13, 14, 15], [14, -1, -1], [13, 14, -1], [13, 14, -1], [-1, -1, -1], [-1, -1, -1]], // roll 14
    [[14, 15, 16], [15, -1, -1], [14, 15, -1], [14, 15, -1], [-1, -1, -1], [-1, -1, -1]], // roll 15
    [[15, 16, -1], [16, -1, -1], [15, 16, -1], [15, 16, -1], [-1, -1, -1], [-1, -1, -1]], // roll 16
    [[15, 16, -1], [16, -1, -1], [15, 16, -1], [15, 16, -1], [-1, -1, -1], [-1, -1, -1]], // roll 17
];

// [roll][hw plane - 1][position] -> logical plane, 0 = none
#[rustfmt::skip]
const MRLOGP: [[[u8; NPOS]; NHPLANES]; IROLL_MAX + 1] = [
    [[1, 1, 0], [3, 0, 0], [5, 0, 0], [6, 0, 0], [2, 2, 0], [4, 0, 0]], // roll 0
    [[1, 1, 1], [3, 0, 0], [5, 5, 0], [6, 6, 0], [2, 2, 0], [4, 0, 0]], // roll 1
    [[1, 1, 1], [3, 0, 0], [5, 5, 0], [6, 6, 0], [2, 2, 0], [4, 0, 0]], // roll 2
    [[1, 1, 1], [3, 0, 0], [5, 5, 0], [6, 6, 0], [2, 2, 0], [4, 0, 0]], // roll 3
    [[1, 1, 1], [3, 0, 0], [5, 5, 0], [6, 6, 0], [2, 2, 0], [4, 0, 0]], // roll 4
    [[1, 1, 1], [4, 0, 0], [5, 5, 0], [6, 6, 0], [2, 2, 0], [3, 0, 0]], // roll 5
    [[1, 1, 1], [4, 0, 0], [5, 5, 0], [6, 0, 0], [2, 2, 0], [3, 0, 0]], // roll 6
    [[1, 1, 1], [4, 0, 0], [5, 5, 0], [0, 0, 0], [2, 2, 0], [3, 0, 0]], // roll 7
    [[1, 1, 1], [4, 0, 0], [5, 0, 0], [0, 0, 0], [2, 0, 0], [3, 0, 0]], // roll 8
    [[1, 1, 1], [2, 0, 0], [3, 0, 0], [0, 0, 0], [0, 0, 0], [0, 0, 0]], // roll 9
    [[1, 1, 1], [2, 0, 0], [3, 3, 0], [4, 0, 0], [0, 0, 0], [0, 0, 0]], // roll 10
    [[1, 1, 1], [2, 0, 0], [3, 3, 0], [4, 4, 0], [0, 0, 0], [0, 0, 0]], // roll 11
    [[1, 1, 1], [2, 0, 0], [3, 3, 0], [4, 4, 0], [0, 0, 0], [0, 0, 0]], // roll 12
    [[1, 1, 1], [2, 0, 0], [3, 3, 0], [4, 4, 0], [0, 0, 0], [0, 0, 0]], // roll 13
    [[1, 1, 1], [2, 0, 0], [3, 3, 0], [4, 4, 0], [0, 0, 0], [0, 0, 0]], // roll 14
    [[1, 1, 1], [2, 0, 0], [3, 3, 0], [4, 4, 0], [0, 0, 0], [0, 0, 0]], // roll 15
    [[1, 1, 0], [2, 0, 0], [3, 3, 0], [4, 4, 0], [0, 0, 0], [0, 0, 0]], // roll 16
    [[1, 1, 0], [2, 0, 0], [3, 3, 0], [4, 4, 0], [0, 0, 0], [0, 0, 0]], // roll 17
];

// [tower][logical plane - 1] -> strips per cone
#[rustfmt::skip]
const LOGPLANE_SIZE: [[u32; NLOGPLANES]; TOWER_MAX + 1] = [
    //  L1  L2  L3  L4  L5  L6
    [72, 56,  8, 40, 40, 24], // tower 0
    [72, 56,  8, 40, 40, 24], // tower 1
    [72, 56,  8, 40, 40, 24], // tower 2
    [72, 56,  8, 40, 40, 24], // tower 3
    [72, 56,  8, 40, 40, 24], // tower 4
    [72, 56, 40,  8, 40, 24], // tower 5
    [56, 72, 40,  8, 24,  0], // tower 6
    [72, 56, 40,  8, 24,  0], // tower 7
    [72, 24, 40,  8,  0,  0], // tower 8
    [72,  8, 40,  0,  0,  0], // tower 9
    [72,  8, 40, 24,  0,  0], // tower 10
    [72,  8, 40, 24,  0,  0], // tower 11
    [72,  8, 40, 24,  0,  0], // tower 12
    [72,  8, 40, 24,  0,  0], // tower 13
    [72,  8, 40, 24,  0,  0], // tower 14
    [72,  8, 40, 24,  0,  0], // tower 15
    [72,  8, 40, 24,  0,  0], // tower 16
];

// ============================================================================
// Lookups
// ============================================================================

/// Tower fed by `(roll, plane)` in position `pos`, if any.
pub fn tower_for(roll: RollNumber, plane: HwPlane, pos: PosCategory) -> Option<u8> {
    let t = MRTOW[roll.index()][plane.index()][pos.index()];
    u8::try_from(t).ok()
}

/// All towers fed by `(roll, plane)`, indexed by position category.
pub fn towers_for(roll: RollNumber, plane: HwPlane) -> [Option<u8>; NPOS] {
    PosCategory::ALL.map(|pos| tower_for(roll, plane, pos))
}

/// Logical plane fed by `(roll, plane)` in position `pos`, if any.
pub fn logplane_for(roll: RollNumber, plane: HwPlane, pos: PosCategory) -> Option<LogicalPlane> {
    LogicalPlane::new(MRLOGP[roll.index()][plane.index()][pos.index()]).ok()
}

/// Logical plane that `(roll, plane)` maps onto in `tower` (tower magnitude).
pub fn logplane_in_tower(roll: RollNumber, plane: HwPlane, tower: u32) -> Option<LogicalPlane> {
    PosCategory::ALL
        .into_iter()
        .find(|&pos| tower_for(roll, plane, pos).map(u32::from) == Some(tower))
        .and_then(|pos| logplane_for(roll, plane, pos))
}

/// Strips one cone reads on `logplane` of `tower`. Zero means the plane is unused.
pub fn logplane_size(tower: u32, logplane: LogicalPlane) -> Result<u32, TableError> {
    if tower as usize > TOWER_MAX {
        return Err(TableError::TowerOutOfRange(tower));
    }
    Ok(LOGPLANE_SIZE[tower as usize][(logplane.number() - 1) as usize])
}

/// Logical plane the reference hardware plane feeds in `tower`.
pub fn ref_logplane(tower: u32) -> Result<LogicalPlane, TableError> {
    let l = match tower {
        0..=4 => 3,
        5..=8 => 4,
        9..=16 => 2,
        _ => return Err(TableError::TowerOutOfRange(tower)),
    };
    LogicalPlane::new(l)
}
