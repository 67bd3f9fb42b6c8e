use trafficam_stabilize::{StabilizeError, StabilizeIoError};
use trafficam_zones::{TrackerError, ZoneConfigError, ZoneIoError};

/// Errors produced by the end-to-end helpers.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("detection stream line {line}: {source}")]
    DetectionLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "image")]
    #[error(transparent)]
    Image(#[from] ::image::ImageError),

    #[error(transparent)]
    Frame(#[from] trafficam_core::ImageError),

    #[error(transparent)]
    Stabilize(#[from] StabilizeError),

    #[error(transparent)]
    StabilizeIo(#[from] StabilizeIoError),

    #[error(transparent)]
    ZoneConfig(#[from] ZoneConfigError),

    #[error(transparent)]
    ZoneIo(#[from] ZoneIoError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("frame stride must be at least 1")]
    InvalidFrameStride,
}
