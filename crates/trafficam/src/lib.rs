//! Traffic-camera clip processing.
//!
//! This crate provides:
//! - re-exports of the workspace crates (`core`, `stabilize`, `zones`)
//! - (feature `image`) helpers that stabilize a directory of frame images
//! - a detection-stream driver that turns per-frame tracked detections into
//!   zone-crossing events and counts
//! - (feature `cli`) the `trafficam` binary
//!
//! ## Quickstart
//!
//! ```no_run
//! use trafficam::stabilize::StabilizerParams;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let report = trafficam::frames::stabilize_frame_dir(
//!     "clip_frames",
//!     "clip_stable",
//!     &StabilizerParams::default(),
//! )?;
//! println!("{} frames, {} warped", report.frames, report.warped);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `trafficam::core`: image buffers, homography estimation, warping, logging.
//! - `trafficam::stabilize`: corner detection, optical flow, stabilization engine.
//! - `trafficam::zones`: zone geometry and config, vehicle attributes, event tracker.
//! - `trafficam::count`: detection stream parsing and crossing counting.
//! - `trafficam::frames` (feature `image`): `image`-crate adapters and frame directories.

pub use trafficam_core as core;
pub use trafficam_stabilize as stabilize;
pub use trafficam_zones as zones;

pub use trafficam_stabilize::{StabilizationReport, StabilizerParams};
pub use trafficam_zones::{ClipContext, CrossingEvent, ZoneConfig, ZoneSet};

pub mod count;
mod error;
#[cfg(feature = "image")]
pub mod frames;

pub use error::PipelineError;
