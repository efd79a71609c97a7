//! Strip coordinates

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One strip of a ring: the detector it sits on and its strip number.
///
/// Ordering (and equality) uses `(det_raw_id, strip_no)` only. The `is_virtual`
/// flag rides along for consumers but never distinguishes two keys.
/// Real strips are numbered from 1; virtual strips carry negative numbers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StripCoords {
    pub det_raw_id: u32,
    pub strip_no: i32,
    pub is_virtual: bool,
}

impl StripCoords {
    pub fn real(det_raw_id: u32, strip_no: i32) -> Self {
        Self {
            det_raw_id,
            strip_no,
            is_virtual: false,
        }
    }

    pub fn virtual_strip(det_raw_id: u32, strip_no: i32) -> Self {
        Self {
            det_raw_id,
            strip_no,
            is_virtual: true,
        }
    }
}

impl PartialEq for StripCoords {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for StripCoords {}

impl PartialOrd for StripCoords {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StripCoords {
    fn cmp(&self, other: &Self) -> Ordering {
        self.det_raw_id
            .cmp(&other.det_raw_id)
            .then_with(|| self.strip_no.cmp(&other.strip_no))
    }
}

impl std::fmt::Display for StripCoords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_virtual {
            write!(f, "{}:{}(v)", self.det_raw_id, self.strip_no)
        } else {
            write!(f, "{}:{}", self.det_raw_id, self.strip_no)
        }
    }
}
