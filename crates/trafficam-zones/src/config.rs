//! Per-video zone configuration and the validated zone set built from it.

use crate::{Anchor, Detection, Polygon, PolygonError, ZoneMatch, ZoneMatches};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum ZoneIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneKind {
    Entry,
    Exit,
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneKind::Entry => f.write_str("entry"),
            ZoneKind::Exit => f.write_str("exit"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ZoneConfigError {
    #[error("{kind} zone {index} is invalid: {source}")]
    InvalidPolygon {
        kind: ZoneKind,
        index: usize,
        #[source]
        source: PolygonError,
    },
}

/// Entry and exit polygons drawn for one video, as stored on disk.
///
/// ```json
/// { "zones_in": [[[10, 10], [200, 10], [200, 80]]], "zones_out": [] }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    #[serde(default)]
    pub zones_in: Vec<Vec<[f32; 2]>>,
    #[serde(default)]
    pub zones_out: Vec<Vec<[f32; 2]>>,
}

impl ZoneConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ZoneIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ZoneIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// `<dir>/<video stem>_zones.json`.
    pub fn path_for_video(dir: impl AsRef<Path>, video: impl AsRef<Path>) -> PathBuf {
        let stem = video
            .as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        dir.as_ref().join(format!("{stem}_zones.json"))
    }
}

fn build_polygons(raw: &[Vec<[f32; 2]>], kind: ZoneKind) -> Result<Vec<Polygon>, ZoneConfigError> {
    raw.iter()
        .enumerate()
        .map(|(index, vertices)| {
            let pts = vertices.iter().map(|&[x, y]| Point2::new(x, y)).collect();
            Polygon::new(pts).map_err(|source| ZoneConfigError::InvalidPolygon {
                kind,
                index,
                source,
            })
        })
        .collect()
}

/// Validated entry and exit zones, identified by their index.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneSet {
    entry: Vec<Polygon>,
    exit: Vec<Polygon>,
    anchor: Anchor,
}

impl ZoneSet {
    pub fn new(entry: Vec<Polygon>, exit: Vec<Polygon>, anchor: Anchor) -> Self {
        if entry.len() != exit.len() {
            log::warn!(
                "{} entry zones but {} exit zones",
                entry.len(),
                exit.len()
            );
        }
        Self {
            entry,
            exit,
            anchor,
        }
    }

    pub fn from_config(config: &ZoneConfig, anchor: Anchor) -> Result<Self, ZoneConfigError> {
        let entry = build_polygons(&config.zones_in, ZoneKind::Entry)?;
        let exit = build_polygons(&config.zones_out, ZoneKind::Exit)?;
        Ok(Self::new(entry, exit, anchor))
    }

    pub fn entry_zones(&self) -> &[Polygon] {
        &self.entry
    }

    pub fn exit_zones(&self) -> &[Polygon] {
        &self.exit
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// Objects inside each zone, in detection order.
    pub fn match_detections(&self, detections: &[Detection]) -> ZoneMatches {
        let anchors: Vec<Point2<f32>> = detections
            .iter()
            .map(|d| d.bbox.anchor(self.anchor))
            .collect();
        let members = |zone: &Polygon| -> Vec<ZoneMatch> {
            detections
                .iter()
                .zip(&anchors)
                .filter(|(_, p)| zone.contains(**p))
                .map(|(d, _)| ZoneMatch {
                    object_id: d.object_id,
                    attributes: d.attributes(),
                })
                .collect()
        };
        ZoneMatches {
            entry: self.entry.iter().map(&members).collect(),
            exit: self.exit.iter().map(&members).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundingBox;

    fn config() -> ZoneConfig {
        serde_json::from_str(
            r#"{
                "zones_in": [[[0, 0], [100, 0], [100, 100], [0, 100]]],
                "zones_out": [[[200.5, 0], [300, 0], [300, 100], [200.5, 100]]]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn integer_and_float_vertices_parse() {
        let cfg = config();
        assert_eq!(cfg.zones_in[0][2], [100.0, 100.0]);
        assert_eq!(cfg.zones_out[0][0], [200.5, 0.0]);
    }

    #[test]
    fn invalid_polygon_is_reported_with_its_index() {
        let mut cfg = config();
        cfg.zones_out.push(vec![[0.0, 0.0], [1.0, 1.0]]);
        let err = ZoneSet::from_config(&cfg, Anchor::Center).unwrap_err();
        assert_eq!(
            err,
            ZoneConfigError::InvalidPolygon {
                kind: ZoneKind::Exit,
                index: 1,
                source: PolygonError::TooFewVertices { count: 2 },
            }
        );
    }

    #[test]
    fn matches_by_anchor_point() {
        let zones = ZoneSet::from_config(&config(), Anchor::Center).unwrap();
        let dets = vec![
            Detection::new(1, BoundingBox::new(10.0, 10.0, 30.0, 30.0)).with_label("car"),
            Detection::new(2, BoundingBox::new(210.0, 10.0, 230.0, 30.0)),
            // center falls between the zones
            Detection::new(3, BoundingBox::new(90.0, 10.0, 150.0, 30.0)),
            Detection::new(4, BoundingBox::new(50.0, 50.0, 60.0, 60.0)),
        ];
        let m = zones.match_detections(&dets);
        let ids = |v: &Vec<ZoneMatch>| v.iter().map(|z| z.object_id).collect::<Vec<_>>();
        assert_eq!(ids(&m.entry[0]), vec![1, 4]);
        assert_eq!(ids(&m.exit[0]), vec![2]);
        assert_eq!(m.entry[0][0].attributes.vehicle_type, "car");
    }

    #[test]
    fn path_uses_video_stem() {
        let p = ZoneConfig::path_for_video("/data/zones", "clips/R1_morning.mp4");
        assert_eq!(p, PathBuf::from("/data/zones/R1_morning_zones.json"));
    }

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = ZoneConfig::path_for_video(dir.path(), "clip.mp4");
        config().write_json(&path).unwrap();
        assert_eq!(ZoneConfig::load_json(&path).unwrap(), config());
    }
}
