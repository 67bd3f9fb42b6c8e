use crate::{FrameOutcome, TrackingDegeneracy};
use serde::{Deserialize, Serialize};

/// Per-clip summary of what the engine did with each frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilizationReport {
    /// Frames emitted, the reference frame included.
    pub frames: usize,
    pub warped: usize,
    pub pass_through: usize,
    pub no_flow_result: usize,
    pub status_count_mismatch: usize,
    pub too_few_survivors: usize,
    pub homography_failures: usize,
    /// Corners detected on the reference frame.
    pub initial_features: usize,
    /// Points still tracked after the last frame.
    pub remaining_points: usize,
}

impl StabilizationReport {
    pub(crate) fn new(initial_features: usize) -> Self {
        Self {
            initial_features,
            remaining_points: initial_features,
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, outcome: &FrameOutcome, remaining_points: usize) {
        self.frames += 1;
        self.remaining_points = remaining_points;
        match outcome {
            FrameOutcome::Reference => {}
            FrameOutcome::Warped { .. } => self.warped += 1,
            FrameOutcome::TrackingDegeneracy(reason) => {
                self.pass_through += 1;
                match reason {
                    TrackingDegeneracy::NoFlowResult => self.no_flow_result += 1,
                    TrackingDegeneracy::StatusCountMismatch { .. } => self.status_count_mismatch += 1,
                    TrackingDegeneracy::TooFewSurvivors { .. } => self.too_few_survivors += 1,
                }
            }
            FrameOutcome::HomographyEstimationFailure { .. } => {
                self.pass_through += 1;
                self.homography_failures += 1;
            }
        }
    }
}
