//! JSON geometry dump reader

use std::path::{Path, PathBuf};
use tracing::info;

use super::{GeometryError, GeometrySource, RollDescriptor};

/// Geometry read from a JSON array of [`RollDescriptor`]s.
#[derive(Debug, Clone)]
pub struct JsonGeometry {
    path: PathBuf,
}

impl JsonGeometry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse descriptors from an in-memory JSON document.
    pub fn parse(contents: &str, origin: &Path) -> Result<Vec<RollDescriptor>, GeometryError> {
        let rolls: Vec<RollDescriptor> = serde_json::from_str(contents)
            .map_err(|e| GeometryError::Parse(origin.to_path_buf(), e))?;
        for roll in &rolls {
            roll.validate()?;
        }
        Ok(rolls)
    }
}

impl GeometrySource for JsonGeometry {
    fn rolls(&self) -> Result<Vec<RollDescriptor>, GeometryError> {
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| GeometryError::Io(self.path.clone(), e))?;
        let rolls = Self::parse(&contents, &self.path)?;
        info!(path = %self.path.display(), rolls = rolls.len(), "Loaded roll geometry");
        Ok(rolls)
    }
}
