//! Per-object entry→exit state machine.
//!
//! An object is opened the first time it is seen inside an entry zone and
//! closed, emitting a [`CrossingEvent`], the first time it is then seen
//! inside an exit zone. Exits without an open record are ignored, and open
//! records never expire.

use crate::{ClipContext, CountIndex, CrossingEvent, Detection, VehicleAttributes, ZoneMatch, ZoneMatches};
use std::collections::{BTreeMap, HashMap};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum TrackerError {
    #[error("frame rate must be finite and positive, got {fps}")]
    InvalidFps { fps: f64 },
}

/// An object that entered a zone and has not left through an exit yet.
#[derive(Clone, Debug, PartialEq)]
pub struct OpenRecord {
    pub entry_zone: usize,
    pub entry_time: f64,
    pub attributes: VehicleAttributes,
}

/// A detection annotated with the entry zone its object was first seen in.
#[derive(Clone, Debug, PartialEq)]
pub struct TaggedDetection {
    pub detection: Detection,
    pub entry_zone: usize,
}

pub struct EventTracker {
    fps: f64,
    context: ClipContext,
    open: BTreeMap<u64, OpenRecord>,
    first_entry_zone: HashMap<u64, usize>,
    events: Vec<CrossingEvent>,
    counts: CountIndex,
}

impl EventTracker {
    pub fn new(fps: f64, context: ClipContext) -> Result<Self, TrackerError> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(TrackerError::InvalidFps { fps });
        }
        Ok(Self {
            fps,
            context,
            open: BTreeMap::new(),
            first_entry_zone: HashMap::new(),
            events: Vec::new(),
            counts: CountIndex::new(),
        })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn context(&self) -> &ClipContext {
        &self.context
    }

    /// Apply one frame of zone observations and return the number of events
    /// it completed.
    ///
    /// `entry[z]` and `exit[z]` list the objects seen inside zone `z`. All
    /// entries are applied before any exit, so an object that is inside an
    /// entry and an exit zone in the same frame crosses with zero dwell.
    pub fn record_frame(&mut self, frame_time: u64, entry: &[Vec<ZoneMatch>], exit: &[Vec<ZoneMatch>]) -> usize {
        let seconds = frame_time as f64 / self.fps;

        for (zone, members) in entry.iter().enumerate() {
            for m in members {
                self.first_entry_zone.entry(m.object_id).or_insert(zone);
                self.open.entry(m.object_id).or_insert_with(|| {
                    log::trace!("object {} entered zone {zone} at {seconds:.3}s", m.object_id);
                    OpenRecord {
                        entry_zone: zone,
                        entry_time: seconds,
                        attributes: m.attributes.clone(),
                    }
                });
            }
        }

        let mut emitted = 0;
        for (zone, members) in exit.iter().enumerate() {
            for m in members {
                let Some(record) = self.open.remove(&m.object_id) else {
                    continue;
                };
                let event = CrossingEvent {
                    object_id: m.object_id,
                    rotunda: self.context.rotunda.clone(),
                    schedule: self.context.schedule.clone(),
                    day: self.context.day.clone(),
                    entry_zone: record.entry_zone,
                    exit_zone: zone,
                    entry_time: record.entry_time,
                    exit_time: seconds,
                    dwell: seconds - record.entry_time,
                    vehicle_type: record.attributes.vehicle_type,
                    vehicle_color: record.attributes.vehicle_color,
                };
                log::debug!(
                    "object {} crossed {} -> {} in {:.3}s",
                    event.object_id,
                    event.entry_zone,
                    event.exit_zone,
                    event.dwell
                );
                self.counts.insert(zone, event.entry_zone, event.object_id);
                self.events.push(event);
                emitted += 1;
            }
        }
        emitted
    }

    /// Record one frame and return its detections that belong to objects
    /// seen in an entry zone, tagged with that zone.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip(self, detections, matches), fields(detections = detections.len()))
    )]
    pub fn update(&mut self, frame_time: u64, detections: &[Detection], matches: &ZoneMatches) -> Vec<TaggedDetection> {
        self.record_frame(frame_time, &matches.entry, &matches.exit);
        detections
            .iter()
            .filter_map(|d| {
                let zone = *self.first_entry_zone.get(&d.object_id)?;
                Some(TaggedDetection {
                    detection: d.clone(),
                    entry_zone: zone,
                })
            })
            .collect()
    }

    pub fn events(&self) -> &[CrossingEvent] {
        &self.events
    }

    /// Drain the events emitted so far. Counts are kept.
    pub fn take_events(&mut self) -> Vec<CrossingEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn counts(&self) -> &CountIndex {
        &self.counts
    }

    /// Objects that entered but have not exited, keyed by object id.
    pub fn open_records(&self) -> &BTreeMap<u64, OpenRecord> {
        &self.open
    }

    /// Entry zone an object was first seen in, if any.
    pub fn entry_zone_of(&self, object_id: u64) -> Option<usize> {
        self.first_entry_zone.get(&object_id).copied()
    }
}
