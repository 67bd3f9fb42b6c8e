//! Engine configuration and its JSON form.

use crate::{FeatureParams, PyrLkParams, StabilizeIoError};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use trafficam_core::RansacParams;

/// Every knob of the stabilization engine.
///
/// Missing JSON fields fall back to their defaults, so `{}` is a valid config.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerParams {
    pub features: FeatureParams,
    pub flow: PyrLkParams,
    pub ransac: RansacParams,
}

impl StabilizerParams {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, StabilizeIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), StabilizeIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
