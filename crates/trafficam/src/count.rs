//! Zone-crossing counting over a stream of tracked detections.
//!
//! The stream is JSON lines, one [`DetectionFrame`] per line:
//!
//! ```text
//! {"frame": 30, "detections": [{"object_id": 7, "bbox": {"x1": 40, "y1": 240, "x2": 60, "y2": 260}, "class_label": "car"}]}
//! ```

use crate::PipelineError;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use trafficam_zones::{
    AttributeMemory, ClipContext, CountIndex, CrossingEvent, Detection, EventTracker, ZoneSet,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Tracked detections of one video frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    /// Frame index in the source video; the time base for events.
    pub frame: u64,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Parse a JSON-lines detection stream lazily. Blank lines are skipped.
pub fn read_detection_frames<R: BufRead>(reader: R) -> impl Iterator<Item = Result<DetectionFrame, PipelineError>> {
    reader.lines().enumerate().filter_map(|(idx, line)| {
        let line = match line {
            Ok(line) => line,
            Err(e) => return Some(Err(PipelineError::Io(e))),
        };
        if line.trim().is_empty() {
            return None;
        }
        Some(
            serde_json::from_str(&line).map_err(|source| PipelineError::DetectionLine {
                line: idx + 1,
                source,
            }),
        )
    })
}

/// Open a JSON-lines detection file for streaming.
pub fn open_detection_stream(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<DetectionFrame, PipelineError>>, PipelineError> {
    let file = File::open(path)?;
    Ok(read_detection_frames(BufReader::new(file)))
}

/// Outcome of counting one clip.
#[derive(Clone, Debug, Serialize)]
pub struct CountReport {
    pub context: ClipContext,
    pub fps: f64,
    pub frame_stride: u64,
    pub frames_processed: usize,
    pub events: Vec<CrossingEvent>,
    pub counts: CountIndex,
    /// Objects that entered a zone but were never seen leaving.
    pub open_objects: Vec<u64>,
}

/// Run zone matching and the event tracker over a detection stream.
///
/// Only frames whose index is a multiple of `frame_stride` are processed;
/// event times still use the source frame index. Labels and colors a
/// detector drops on some frames are filled in from earlier frames.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(zones, frames, context))
)]
pub fn count_crossings<I>(
    zones: &ZoneSet,
    frames: I,
    fps: f64,
    context: ClipContext,
    frame_stride: u64,
) -> Result<CountReport, PipelineError>
where
    I: IntoIterator<Item = Result<DetectionFrame, PipelineError>>,
{
    if frame_stride == 0 {
        return Err(PipelineError::InvalidFrameStride);
    }
    let mut tracker = EventTracker::new(fps, context.clone())?;
    let mut memory = AttributeMemory::new();
    let mut frames_processed = 0;

    for frame in frames {
        let DetectionFrame {
            frame,
            mut detections,
        } = frame?;
        if frame % frame_stride != 0 {
            continue;
        }
        memory.fill(&mut detections);
        let matches = zones.match_detections(&detections);
        tracker.update(frame, &detections, &matches);
        frames_processed += 1;
    }

    let open_objects: Vec<u64> = tracker.open_records().keys().copied().collect();
    log::info!(
        "{} frames processed: {} crossings, {} objects still inside",
        frames_processed,
        tracker.events().len(),
        open_objects.len()
    );
    Ok(CountReport {
        context,
        fps,
        frame_stride,
        frames_processed,
        counts: tracker.counts().clone(),
        events: tracker.take_events(),
        open_objects,
    })
}
