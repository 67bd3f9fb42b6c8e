use crate::{StabilizationEngine, StabilizationReport, StabilizeError, StabilizedFrame, StabilizerParams};
use trafficam_core::RgbImage;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Stabilize a whole clip, handing every output frame to `sink` in order.
///
/// The first frame initializes the engine and is emitted as the reference
/// output, so the sink sees exactly as many frames as `frames` yields.
/// Initialization failures are returned before the sink is called. Errors
/// from the frame source or the sink stop the run.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
pub fn stabilize_sequence<I, S, E>(
    frames: I,
    params: &StabilizerParams,
    mut sink: S,
) -> Result<StabilizationReport, E>
where
    I: IntoIterator<Item = Result<RgbImage, E>>,
    S: FnMut(StabilizedFrame) -> Result<(), E>,
    E: From<StabilizeError>,
{
    let mut frames = frames.into_iter();
    let Some(first) = frames.next().transpose()? else {
        log::warn!("empty frame sequence, nothing to stabilize");
        return Ok(StabilizationReport::default());
    };

    let mut engine = StabilizationEngine::initialize(&first, params.clone())?;
    sink(engine.reference_frame(&first))?;
    drop(first);

    for frame in frames {
        let frame = frame?;
        sink(engine.push_frame(&frame))?;
    }

    let report = engine.into_report();
    log::info!(
        "stabilized {} frames: {} warped, {} passed through, {}/{} points left",
        report.frames,
        report.warped,
        report.pass_through,
        report.remaining_points,
        report.initial_features
    );
    Ok(report)
}
