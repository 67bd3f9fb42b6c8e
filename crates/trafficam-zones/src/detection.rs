use crate::{classify_vehicle_color, BoundingBox, ColorParams, VehicleColor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use trafficam_core::RgbImage;

/// Placeholder for attributes the detector did not provide.
pub const UNKNOWN: &str = "unknown";

/// One tracked object observed in one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Tracker-assigned id, stable across frames.
    pub object_id: u64,
    pub bbox: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<VehicleColor>,
}

impl Detection {
    pub fn new(object_id: u64, bbox: BoundingBox) -> Self {
        Self {
            object_id,
            bbox,
            class_label: None,
            color: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.class_label = Some(label.into());
        self
    }

    /// Classify the color of the box region of `frame` unless a color is
    /// already set. Boxes entirely outside the frame become `Unknown`.
    pub fn with_color_from(mut self, frame: &RgbImage, params: &ColorParams) -> Self {
        if self.color.is_none() {
            let b = &self.bbox;
            let color = frame
                .crop(b.x1, b.y1, b.x2, b.y2)
                .map_or(VehicleColor::Unknown, |roi| classify_vehicle_color(&roi, params));
            self.color = Some(color);
        }
        self
    }

    pub fn attributes(&self) -> VehicleAttributes {
        VehicleAttributes {
            vehicle_type: self
                .class_label
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string()),
            vehicle_color: self
                .color
                .map_or_else(|| UNKNOWN.to_string(), |c| c.as_str().to_string()),
        }
    }
}

/// Attributes carried into a crossing event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleAttributes {
    pub vehicle_type: String,
    pub vehicle_color: String,
}

impl Default for VehicleAttributes {
    fn default() -> Self {
        Self {
            vehicle_type: UNKNOWN.to_string(),
            vehicle_color: UNKNOWN.to_string(),
        }
    }
}

/// Last known label and color per object id.
///
/// Detectors drop labels on some frames; filling them back in keeps an
/// object's attributes stable for the whole time it is tracked.
#[derive(Clone, Debug, Default)]
pub struct AttributeMemory {
    labels: HashMap<u64, String>,
    colors: HashMap<u64, VehicleColor>,
}

impl AttributeMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember what each detection carries and fill in what it lacks.
    pub fn fill(&mut self, detections: &mut [Detection]) {
        for det in detections {
            match &det.class_label {
                Some(label) => {
                    self.labels.insert(det.object_id, label.clone());
                }
                None => det.class_label = self.labels.get(&det.object_id).cloned(),
            }
            match det.color {
                Some(VehicleColor::Unknown) | None => {
                    if let Some(&known) = self.colors.get(&det.object_id) {
                        det.color = Some(known);
                    }
                }
                Some(color) => {
                    self.colors.insert(det.object_id, color);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len().max(self.colors.len())
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.colors.is_empty()
    }
}

/// An object whose anchor point lies inside a zone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneMatch {
    pub object_id: u64,
    pub attributes: VehicleAttributes,
}

/// Per-zone membership for one frame, indexed by zone id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ZoneMatches {
    pub entry: Vec<Vec<ZoneMatch>>,
    pub exit: Vec<Vec<ZoneMatch>>,
}

impl ZoneMatches {
    pub fn is_empty(&self) -> bool {
        self.entry.iter().chain(&self.exit).all(Vec::is_empty)
    }
}
