//! Video stabilization anchored to the first frame of a clip.
//!
//! Corners are detected once on the first frame, tracked through the clip
//! with sparse optical flow, and every later frame is warped back onto the
//! first frame's canvas through a robustly fitted homography. Frames whose
//! tracking or fit fails are passed through unchanged.
//!
//! ```no_run
//! use trafficam_core::RgbImage;
//! use trafficam_stabilize::{stabilize_sequence, StabilizeError, StabilizerParams};
//!
//! let frames: Vec<RgbImage> = Vec::new();
//! let mut out = Vec::new();
//! let report = stabilize_sequence(
//!     frames.into_iter().map(Ok::<_, StabilizeError>),
//!     &StabilizerParams::default(),
//!     |frame| {
//!         out.push(frame.image);
//!         Ok(())
//!     },
//! )?;
//! println!("{} frames, {} warped", report.frames, report.warped);
//! # Ok::<(), StabilizeError>(())
//! ```

mod engine;
mod error;
mod features;
mod flow;
mod params;
mod points;
mod report;
mod sequence;

pub use engine::{FrameOutcome, StabilizationEngine, StabilizedFrame, TrackingDegeneracy};
pub use error::{StabilizeError, StabilizeIoError};
pub use features::{good_features_to_track, FeatureParams};
pub use flow::{FlowResult, OpticalFlow, PyrLkParams, PyramidalLucasKanade};
pub use params::StabilizerParams;
pub use points::FeaturePointStore;
pub use report::StabilizationReport;
pub use sequence::stabilize_sequence;
