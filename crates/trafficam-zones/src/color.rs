//! Dominant vehicle color from a bounding-box crop.
//!
//! Pixels are converted to 8-bit HSV (hue halved to `0..=180`, saturation and
//! value in `0..=255`) and counted against fixed per-color ranges.

use serde::{Deserialize, Serialize};
use std::fmt;
use trafficam_core::RgbImage;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Violet,
    Pink,
    White,
    Black,
    Gray,
    #[default]
    Unknown,
}

impl VehicleColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleColor::Red => "red",
            VehicleColor::Orange => "orange",
            VehicleColor::Yellow => "yellow",
            VehicleColor::Green => "green",
            VehicleColor::Blue => "blue",
            VehicleColor::Violet => "violet",
            VehicleColor::Pink => "pink",
            VehicleColor::White => "white",
            VehicleColor::Black => "black",
            VehicleColor::Gray => "gray",
            VehicleColor::Unknown => "unknown",
        }
    }
}

impl fmt::Display for VehicleColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorParams {
    /// Share of the crop the dominant color must exceed.
    pub min_fraction: f32,
}

impl Default for ColorParams {
    fn default() -> Self {
        Self { min_fraction: 0.15 }
    }
}

type HsvRange = ([u8; 3], [u8; 3]);

/// Inclusive HSV bounds per color, in tie-break order.
const COLOR_RANGES: [(VehicleColor, &[HsvRange]); 10] = [
    (
        VehicleColor::Red,
        &[([0, 100, 100], [10, 255, 255]), ([170, 100, 100], [180, 255, 255])],
    ),
    (VehicleColor::Orange, &[([11, 100, 100], [25, 255, 255])]),
    (VehicleColor::Yellow, &[([26, 100, 100], [35, 255, 255])]),
    (VehicleColor::Green, &[([36, 100, 100], [70, 255, 255])]),
    (VehicleColor::Blue, &[([100, 100, 100], [130, 255, 255])]),
    (VehicleColor::Violet, &[([131, 100, 100], [160, 255, 255])]),
    (VehicleColor::Pink, &[([161, 100, 100], [169, 255, 255])]),
    (VehicleColor::White, &[([0, 0, 200], [180, 30, 255])]),
    (VehicleColor::Black, &[([0, 0, 0], [180, 255, 30])]),
    (VehicleColor::Gray, &[([0, 0, 31], [180, 30, 199])]),
];

/// 8-bit HSV with hue in `0..=180`.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(|c| c as f32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;
    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };
    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }
    [
        (h / 2.0).round().clamp(0.0, 180.0) as u8,
        s.round().clamp(0.0, 255.0) as u8,
        v as u8,
    ]
}

fn in_range(hsv: [u8; 3], (lo, hi): &HsvRange) -> bool {
    (0..3).all(|c| hsv[c] >= lo[c] && hsv[c] <= hi[c])
}

/// Name the dominant color of `roi`, or `Unknown` when no color covers more
/// than `params.min_fraction` of it.
pub fn classify_vehicle_color(roi: &RgbImage, params: &ColorParams) -> VehicleColor {
    if roi.is_empty() {
        return VehicleColor::Unknown;
    }
    let mut counts = [0usize; COLOR_RANGES.len()];
    for px in roi.data.chunks_exact(3) {
        let hsv = rgb_to_hsv([px[0], px[1], px[2]]);
        for (k, (_, ranges)) in COLOR_RANGES.iter().enumerate() {
            if ranges.iter().any(|r| in_range(hsv, r)) {
                counts[k] += 1;
            }
        }
    }

    let total = (roi.width * roi.height) as f32;
    // first maximum wins
    let best = counts
        .iter()
        .enumerate()
        .fold(0, |best, (k, &c)| if c > counts[best] { k } else { best });
    if counts[best] as f32 > params.min_fraction * total {
        COLOR_RANGES[best].0
    } else {
        VehicleColor::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(rgb: [u8; 3]) -> RgbImage {
        let mut img = RgbImage::new(8, 8);
        for y in 0..8 {
            for x in 0..8 {
                img.put_pixel(x, y, rgb);
            }
        }
        img
    }

    #[test]
    fn hsv_matches_8bit_convention() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
        assert_eq!(rgb_to_hsv([128, 128, 128]), [0, 0, 128]);
    }

    #[test]
    fn solid_colors() {
        let p = ColorParams::default();
        assert_eq!(classify_vehicle_color(&solid([220, 20, 20]), &p), VehicleColor::Red);
        assert_eq!(classify_vehicle_color(&solid([230, 230, 20]), &p), VehicleColor::Yellow);
        assert_eq!(classify_vehicle_color(&solid([20, 40, 220]), &p), VehicleColor::Blue);
        assert_eq!(classify_vehicle_color(&solid([240, 240, 240]), &p), VehicleColor::White);
        assert_eq!(classify_vehicle_color(&solid([10, 10, 10]), &p), VehicleColor::Black);
        assert_eq!(classify_vehicle_color(&solid([120, 120, 125]), &p), VehicleColor::Gray);
    }

    #[test]
    fn in_between_hues_are_unknown() {
        // teal-ish hues fall between the green and blue ranges
        let p = ColorParams::default();
        assert_eq!(classify_vehicle_color(&solid([20, 200, 200]), &p), VehicleColor::Unknown);
        assert_eq!(classify_vehicle_color(&RgbImage::new(0, 0), &p), VehicleColor::Unknown);
    }

    #[test]
    fn dominant_share_must_exceed_threshold() {
        let mut img = solid([20, 200, 200]);
        // 9 of 64 pixels red: 14% is not enough
        for i in 0..9 {
            img.put_pixel(i % 8, i / 8, [220, 20, 20]);
        }
        let p = ColorParams::default();
        assert_eq!(classify_vehicle_color(&img, &p), VehicleColor::Unknown);
        img.put_pixel(1, 1, [220, 20, 20]);
        assert_eq!(classify_vehicle_color(&img, &p), VehicleColor::Red);
    }
}
