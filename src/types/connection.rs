//! Trigger connection records

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::StripCoords;

/// How one strip participates in one cone at one tower and logical plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Cone (PAC) number
    pub pac: u32,
    /// Signed tower number, negative on the minus-eta side
    pub tower: i32,
    /// 1-based logical plane
    pub logplane: u8,
    /// Index of the strip inside the cone's input set on this logical plane
    pub pos_in_cone: u32,
}

/// Strip → ordered connection records. Insertion order within a strip is kept.
pub type Links = BTreeMap<StripCoords, Vec<Connection>>;

/// Total number of connection records in a links table.
pub fn count_connections(links: &Links) -> usize {
    links.values().map(Vec::len).sum()
}
