//! Frame-by-frame stabilization against the first frame of a clip.

use crate::{
    good_features_to_track, FeaturePointStore, OpticalFlow, PyramidalLucasKanade,
    StabilizationReport, StabilizeError, StabilizerParams,
};
use log::{debug, info, warn};
use trafficam_core::{
    estimate_homography_ransac, warp_perspective_rgb, GrayImage, GrayImageView, RgbImage,
    MIN_HOMOGRAPHY_POINTS,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Why optical flow produced nothing usable for a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingDegeneracy {
    /// The flow backend returned no result at all.
    NoFlowResult,
    /// The flow result is not index-aligned with the tracked points.
    StatusCountMismatch {
        tracked: usize,
        points: usize,
        status: usize,
    },
    /// Fewer than four points survived the status filter.
    TooFewSurvivors { survivors: usize },
}

/// What happened to a single frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The first frame, emitted unchanged.
    Reference,
    /// Warped onto the reference canvas.
    Warped { points: usize, inliers: usize },
    /// Emitted unmodified because tracking degenerated.
    TrackingDegeneracy(TrackingDegeneracy),
    /// Emitted unmodified because no homography could be fitted.
    HomographyEstimationFailure { points: usize },
}

impl FrameOutcome {
    /// True for frames that were emitted without a transform.
    pub fn is_pass_through(&self) -> bool {
        matches!(
            self,
            FrameOutcome::TrackingDegeneracy(_) | FrameOutcome::HomographyEstimationFailure { .. }
        )
    }
}

/// One output frame. Always has the reference frame's resolution.
#[derive(Clone, Debug)]
pub struct StabilizedFrame {
    pub image: RgbImage,
    pub outcome: FrameOutcome,
}

/// Stabilizes a clip frame by frame against its first frame.
///
/// Features are detected once, on the first frame, and tracked through the
/// clip; lost points are dropped and never re-detected. A frame whose
/// tracking or homography fit fails is passed through untouched.
pub struct StabilizationEngine<F = PyramidalLucasKanade> {
    params: StabilizerParams,
    flow: F,
    points: FeaturePointStore,
    width: usize,
    height: usize,
    previous_gray: GrayImage,
    report: StabilizationReport,
}

impl StabilizationEngine<PyramidalLucasKanade> {
    /// Detect features on `first_frame` and track them with pyramidal Lucas–Kanade.
    pub fn initialize(first_frame: &RgbImage, params: StabilizerParams) -> Result<Self, StabilizeError> {
        let flow = PyramidalLucasKanade::new(params.flow);
        Self::with_flow(first_frame, params, flow)
    }
}

impl<F: OpticalFlow> StabilizationEngine<F> {
    /// Like [`StabilizationEngine::initialize`] with a custom flow backend.
    pub fn with_flow(first_frame: &RgbImage, params: StabilizerParams, flow: F) -> Result<Self, StabilizeError> {
        if first_frame.is_empty() {
            return Err(StabilizeError::EmptyFrame {
                width: first_frame.width,
                height: first_frame.height,
            });
        }

        let gray = first_frame.to_gray();
        let detected = good_features_to_track(&gray.view(), &params.features);
        if detected.len() < MIN_HOMOGRAPHY_POINTS {
            warn!(
                "only {} feature points on the {}x{} reference frame",
                detected.len(),
                first_frame.width,
                first_frame.height
            );
            return Err(StabilizeError::InsufficientFeatures {
                found: detected.len(),
                required: MIN_HOMOGRAPHY_POINTS,
            });
        }
        info!(
            "tracking {} feature points on a {}x{} reference frame",
            detected.len(),
            first_frame.width,
            first_frame.height
        );

        Ok(Self {
            report: StabilizationReport::new(detected.len()),
            points: FeaturePointStore::new(detected),
            width: first_frame.width,
            height: first_frame.height,
            previous_gray: gray,
            params,
            flow,
        })
    }

    /// Output canvas size (the first frame's resolution).
    pub fn canvas_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn params(&self) -> &StabilizerParams {
        &self.params
    }

    pub fn points(&self) -> &FeaturePointStore {
        &self.points
    }

    pub fn report(&self) -> &StabilizationReport {
        &self.report
    }

    pub fn into_report(self) -> StabilizationReport {
        self.report
    }

    /// Emit the first frame itself as the clip's first output.
    pub fn reference_frame(&mut self, first_frame: &RgbImage) -> StabilizedFrame {
        self.finish(
            first_frame.fit_to_canvas(self.width, self.height),
            FrameOutcome::Reference,
        )
    }

    /// Stabilize `current` and remember its gray version for the next call.
    pub fn push_frame(&mut self, current: &RgbImage) -> StabilizedFrame {
        let gray = current.to_gray();
        let previous = std::mem::replace(&mut self.previous_gray, GrayImage::new(0, 0));
        let out = self.process_frame(&previous.view(), &gray.view(), current);
        self.previous_gray = gray;
        out
    }

    /// Track points from `previous_gray` into `current_gray` and warp `current`
    /// onto the reference canvas.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(points = self.points.len()))
    )]
    pub fn process_frame(
        &mut self,
        previous_gray: &GrayImageView<'_>,
        current_gray: &GrayImageView<'_>,
        current: &RgbImage,
    ) -> StabilizedFrame {
        let tracked = self.points.len();
        let Some(flow) = self
            .flow
            .track(previous_gray, current_gray, self.points.tracked())
        else {
            return self.pass_through(
                current,
                FrameOutcome::TrackingDegeneracy(TrackingDegeneracy::NoFlowResult),
            );
        };

        if !self.points.advance(&flow.points, &flow.status) {
            return self.pass_through(
                current,
                FrameOutcome::TrackingDegeneracy(TrackingDegeneracy::StatusCountMismatch {
                    tracked,
                    points: flow.points.len(),
                    status: flow.status.len(),
                }),
            );
        }

        let survivors = self.points.len();
        if survivors < MIN_HOMOGRAPHY_POINTS {
            return self.pass_through(
                current,
                FrameOutcome::TrackingDegeneracy(TrackingDegeneracy::TooFewSurvivors { survivors }),
            );
        }

        let fit = estimate_homography_ransac(
            self.points.tracked(),
            self.points.reference(),
            &self.params.ransac,
        );
        let warped = fit.and_then(|fit| {
            let inliers = fit.num_inliers();
            warp_perspective_rgb(current, fit.h, self.width, self.height).map(|img| (img, inliers))
        });
        match warped {
            Some((image, inliers)) => self.finish(
                image,
                FrameOutcome::Warped {
                    points: survivors,
                    inliers,
                },
            ),
            None => self.pass_through(
                current,
                FrameOutcome::HomographyEstimationFailure { points: survivors },
            ),
        }
    }

    fn pass_through(&mut self, current: &RgbImage, outcome: FrameOutcome) -> StabilizedFrame {
        debug!(
            "frame {} passed through ({:?}), {} points left",
            self.report.frames,
            outcome,
            self.points.len()
        );
        self.finish(current.fit_to_canvas(self.width, self.height), outcome)
    }

    fn finish(&mut self, image: RgbImage, outcome: FrameOutcome) -> StabilizedFrame {
        self.report.record(&outcome, self.points.len());
        StabilizedFrame { image, outcome }
    }
}
