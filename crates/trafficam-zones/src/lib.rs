//! Zone-crossing analytics for traffic video.
//!
//! Detections of tracked objects are matched against user-drawn entry and
//! exit polygons ([`ZoneSet`]); an [`EventTracker`] turns the per-frame zone
//! membership into [`CrossingEvent`]s with entry/exit times and dwell, and
//! keeps a [`CountIndex`] of which objects went from which entry to which exit.
//!
//! ```
//! use trafficam_zones::{
//!     Anchor, BoundingBox, ClipContext, Detection, EventTracker, ZoneConfig, ZoneSet,
//! };
//!
//! let config: ZoneConfig = serde_json::from_str(
//!     r#"{"zones_in": [[[0, 0], [50, 0], [50, 50], [0, 50]]],
//!         "zones_out": [[[100, 0], [150, 0], [150, 50], [100, 50]]]}"#,
//! )?;
//! let zones = ZoneSet::from_config(&config, Anchor::Center)?;
//! let mut tracker = EventTracker::new(30.0, ClipContext::default())?;
//!
//! for (frame, x) in [(0, 10.0), (30, 60.0), (60, 110.0)] {
//!     let dets = [Detection::new(1, BoundingBox::new(x, 10.0, x + 20.0, 30.0))];
//!     let matches = zones.match_detections(&dets);
//!     tracker.update(frame, &dets, &matches);
//! }
//! assert_eq!(tracker.events().len(), 1);
//! assert_eq!(tracker.events()[0].dwell, 2.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod color;
mod config;
mod counts;
mod detection;
mod event;
mod geometry;
mod tracker;

pub use color::{classify_vehicle_color, rgb_to_hsv, ColorParams, VehicleColor};
pub use config::{ZoneConfig, ZoneConfigError, ZoneIoError, ZoneKind, ZoneSet};
pub use counts::CountIndex;
pub use detection::{AttributeMemory, Detection, VehicleAttributes, ZoneMatch, ZoneMatches, UNKNOWN};
pub use event::{format_hms, ClipContext, CrossingEvent};
pub use geometry::{Anchor, BoundingBox, Polygon, PolygonError};
pub use tracker::{EventTracker, OpenRecord, TaggedDetection, TrackerError};
