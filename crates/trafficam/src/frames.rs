//! `image`-crate adapters and frame-directory stabilization.

use crate::PipelineError;
use std::{
    fs,
    path::{Path, PathBuf},
};
use trafficam_core::{ImageError, RgbImage};
use trafficam_stabilize::{stabilize_sequence, StabilizationReport, StabilizerParams};

#[cfg(feature = "tracing")]
use tracing::instrument;

const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Copy an `image::RgbImage` into the workspace frame type.
pub fn rgb_from_image(img: &::image::RgbImage) -> RgbImage {
    RgbImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().clone(),
    }
}

/// Copy a workspace frame into an `image::RgbImage`.
pub fn rgb_to_image(img: &RgbImage) -> Result<::image::RgbImage, ImageError> {
    let dims_err = ImageError::InvalidDimensions {
        width: img.width,
        height: img.height,
    };
    let width = u32::try_from(img.width).map_err(|_| dims_err.clone())?;
    let height = u32::try_from(img.height).map_err(|_| dims_err)?;
    let expected = img.width * img.height * 3;
    ::image::RgbImage::from_raw(width, height, img.data.clone()).ok_or(ImageError::InvalidBuffer {
        expected,
        got: img.data.len(),
    })
}

/// PNG and JPEG files directly inside `dir`, sorted by file name.
pub fn list_frame_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if is_frame && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn load_frame(path: impl AsRef<Path>) -> Result<RgbImage, PipelineError> {
    let img = ::image::open(path)?.to_rgb8();
    Ok(rgb_from_image(&img))
}

/// Stabilize the frames in `input_dir` and write them to `output_dir` as
/// PNGs named after the input file stems.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(input_dir, output_dir, params))
)]
pub fn stabilize_frame_dir(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    params: &StabilizerParams,
) -> Result<StabilizationReport, PipelineError> {
    let files = list_frame_files(&input_dir)?;
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;
    log::info!(
        "stabilizing {} frames from {}",
        files.len(),
        input_dir.as_ref().display()
    );

    let frames = files.iter().map(load_frame);
    let mut names = files.iter();
    stabilize_sequence(frames, params, |frame| {
        let stem = names
            .next()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let out = output_dir.join(format!("{stem}.png"));
        rgb_to_image(&frame.image)?.save(&out)?;
        log::debug!("{} -> {:?}", out.display(), frame.outcome);
        Ok(())
    })
}
