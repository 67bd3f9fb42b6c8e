//! Core types and utilities for traffic-camera processing.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any video decoder or concrete image library: frames are plain
//! row-major byte buffers and all transforms are `nalgebra` matrices.

mod homography;
mod image;
mod logger;
mod ransac;

pub use homography::{
    estimate_homography, homography_from_4pt, warp_perspective_gray, warp_perspective_rgb,
    Homography,
};
pub use image::{
    sample_bilinear, sample_bilinear_rgb, sample_bilinear_u8, GrayImage, GrayImageView, ImageError,
    RgbImage,
};
pub use ransac::{estimate_homography_ransac, RansacHomography, RansacParams};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;

/// Minimum number of point correspondences needed to fit a homography.
pub const MIN_HOMOGRAPHY_POINTS: usize = 4;
