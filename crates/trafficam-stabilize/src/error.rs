/// Fatal stabilization failures. Per-frame faults are reported through
/// [`crate::FrameOutcome`] instead.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StabilizeError {
    #[error("not enough feature points in the first frame (found {found}, need at least {required})")]
    InsufficientFeatures { found: usize, required: usize },
    #[error("first frame is empty ({width}x{height})")]
    EmptyFrame { width: usize, height: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum StabilizeIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
