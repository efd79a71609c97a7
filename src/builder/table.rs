//! Merged connection table - the crate's output artifact

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::BuildError;
use crate::types::{count_connections, Connection, Links, StripCoords};

/// Strip → connection records for the whole detector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionTable {
    links: Links,
}

/// Serialized form of one table row. JSON maps need string keys, so the
/// table is written as a list of rows instead of a map.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableEntry {
    strip: StripCoords,
    connections: Vec<Connection>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a ring's links. Records for a strip already present are added
    /// after the existing ones.
    pub fn merge(&mut self, links: Links) {
        for (strip, conns) in links {
            self.links.entry(strip).or_default().extend(conns);
        }
    }

    pub fn links(&self) -> &Links {
        &self.links
    }

    pub fn get(&self, strip: &StripCoords) -> Option<&[Connection]> {
        self.links.get(strip).map(Vec::as_slice)
    }

    /// Number of strips with at least one record.
    pub fn strip_count(&self) -> usize {
        self.links.len()
    }

    pub fn connection_count(&self) -> usize {
        count_connections(&self.links)
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// All strips feeding cone `pac` of `tower`, with their record.
    pub fn cone_inputs(&self, tower: i32, pac: u32) -> Vec<(StripCoords, Connection)> {
        self.links
            .iter()
            .flat_map(|(strip, conns)| {
                conns
                    .iter()
                    .filter(move |c| c.tower == tower && c.pac == pac)
                    .map(move |c| (*strip, *c))
            })
            .collect()
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, BuildError> {
        let rows: Vec<TableEntry> = self
            .links
            .iter()
            .map(|(strip, conns)| TableEntry {
                strip: *strip,
                connections: conns.clone(),
            })
            .collect();
        let json = if pretty {
            serde_json::to_string_pretty(&rows)?
        } else {
            serde_json::to_string(&rows)?
        };
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self, BuildError> {
        let rows: Vec<TableEntry> = serde_json::from_str(json)?;
        let mut table = Self::new();
        for row in rows {
            table.links.entry(row.strip).or_default().extend(row.connections);
        }
        Ok(table)
    }

    pub fn write_json(&self, path: &Path, pretty: bool) -> Result<(), BuildError> {
        let json = self.to_json(pretty)?;
        std::fs::write(path, json).map_err(|e| BuildError::Io(path.to_path_buf(), e))?;
        info!(
            path = %path.display(),
            strips = self.strip_count(),
            connections = self.connection_count(),
            "Connection table written"
        );
        Ok(())
    }
}

impl From<Links> for ConnectionTable {
    fn from(links: Links) -> Self {
        Self { links }
    }
}
