//! Sparse optical flow between consecutive gray frames.
//!
//! [`OpticalFlow`] is the seam the engine tracks points through;
//! [`PyramidalLucasKanade`] is the default, coarse-to-fine implementation.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use trafficam_core::GrayImageView;

/// Tracked positions with a per-point success flag, index-aligned with the input.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlowResult {
    pub points: Vec<Point2<f32>>,
    pub status: Vec<bool>,
}

impl FlowResult {
    pub fn num_tracked(&self) -> usize {
        self.status.iter().filter(|&&ok| ok).count()
    }
}

/// Tracks a sparse point set from one frame to the next.
pub trait OpticalFlow {
    /// Track `points` from `prev` into `next`.
    ///
    /// `None` signals a hard failure with no usable result at all.
    fn track(
        &self,
        prev: &GrayImageView<'_>,
        next: &GrayImageView<'_>,
        points: &[Point2<f32>],
    ) -> Option<FlowResult>;
}

/// Pyramidal Lucas–Kanade parameters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PyrLkParams {
    /// Side of the square integration window (odd).
    pub win_size: usize,
    /// Highest pyramid level; 0 tracks on the full-resolution frame only.
    pub max_level: usize,
    /// Iteration cap per pyramid level.
    pub max_iters: usize,
    /// Stop iterating once the update is shorter than this (pixels).
    pub epsilon: f32,
    /// Points whose normalized minimum eigenvalue falls below this are lost.
    pub min_eigen_threshold: f32,
}

impl Default for PyrLkParams {
    fn default() -> Self {
        Self {
            win_size: 21,
            max_level: 3,
            max_iters: 30,
            epsilon: 0.01,
            min_eigen_threshold: 1e-4,
        }
    }
}

/// Float plane with replicated borders, intensities scaled to `[0, 1]`.
#[derive(Clone, Debug)]
struct Plane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Plane {
    fn from_gray(src: &GrayImageView<'_>) -> Self {
        Self {
            width: src.width,
            height: src.height,
            data: src.data.iter().map(|&v| v as f32 / 255.0).collect(),
        }
    }

    #[inline]
    fn at(&self, x: isize, y: isize) -> f32 {
        let xc = x.clamp(0, self.width as isize - 1) as usize;
        let yc = y.clamp(0, self.height as isize - 1) as usize;
        self.data[yc * self.width + xc]
    }

    fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (xi, yi) = (x0 as isize, y0 as isize);
        let top = self.at(xi, yi) * (1.0 - fx) + self.at(xi + 1, yi) * fx;
        let bottom = self.at(xi, yi + 1) * (1.0 - fx) + self.at(xi + 1, yi + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Blur with a 5-tap binomial kernel and drop every other row and column.
    fn pyr_down(&self) -> Self {
        const K: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];
        let (w, h) = (self.width, self.height);
        let mut rows = vec![0.0f32; w * h];
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for (k, wk) in K.iter().enumerate() {
                    acc += wk * self.at(x as isize + k as isize - 2, y as isize);
                }
                rows[y * w + x] = acc;
            }
        }
        let blurred = Plane {
            width: w,
            height: h,
            data: rows,
        };

        let (ow, oh) = (w.div_ceil(2), h.div_ceil(2));
        let mut data = vec![0.0f32; ow * oh];
        for y in 0..oh {
            for x in 0..ow {
                let (sx, sy) = (2 * x as isize, 2 * y as isize);
                let mut acc = 0.0;
                for (k, wk) in K.iter().enumerate() {
                    acc += wk * blurred.at(sx, sy + k as isize - 2);
                }
                data[y * ow + x] = acc;
            }
        }
        Plane {
            width: ow,
            height: oh,
            data,
        }
    }

    /// Scharr derivatives.
    fn gradients(&self) -> (Plane, Plane) {
        let (w, h) = (self.width, self.height);
        let mut gx = vec![0.0f32; w * h];
        let mut gy = vec![0.0f32; w * h];
        for y in 0..h as isize {
            for x in 0..w as isize {
                let dx = 3.0 * (self.at(x + 1, y - 1) - self.at(x - 1, y - 1))
                    + 10.0 * (self.at(x + 1, y) - self.at(x - 1, y))
                    + 3.0 * (self.at(x + 1, y + 1) - self.at(x - 1, y + 1));
                let dy = 3.0 * (self.at(x - 1, y + 1) - self.at(x - 1, y - 1))
                    + 10.0 * (self.at(x, y + 1) - self.at(x, y - 1))
                    + 3.0 * (self.at(x + 1, y + 1) - self.at(x + 1, y - 1));
                let i = y as usize * w + x as usize;
                gx[i] = dx / 32.0;
                gy[i] = dy / 32.0;
            }
        }
        (
            Plane {
                width: w,
                height: h,
                data: gx,
            },
            Plane {
                width: w,
                height: h,
                data: gy,
            },
        )
    }
}

struct Level {
    image: Plane,
    gx: Plane,
    gy: Plane,
}

const MIN_LEVEL_SIDE: usize = 8;

fn build_pyramid(src: &GrayImageView<'_>, max_level: usize) -> Vec<Plane> {
    let mut levels = vec![Plane::from_gray(src)];
    while levels.len() <= max_level {
        let Some(last) = levels.last() else { break };
        if last.width.div_ceil(2) < MIN_LEVEL_SIDE || last.height.div_ceil(2) < MIN_LEVEL_SIDE {
            break;
        }
        let next = last.pyr_down();
        levels.push(next);
    }
    levels
}

/// Coarse-to-fine iterative Lucas–Kanade tracker.
#[derive(Clone, Debug, Default)]
pub struct PyramidalLucasKanade {
    params: PyrLkParams,
}

impl PyramidalLucasKanade {
    pub fn new(params: PyrLkParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PyrLkParams {
        &self.params
    }

    fn track_point(&self, prev: &[Level], next: &[Plane], pt: Point2<f32>) -> Option<Point2<f32>> {
        let half = (self.params.win_size.max(3) / 2) as isize;
        let area = ((2 * half + 1) * (2 * half + 1)) as f32;
        let eps2 = self.params.epsilon * self.params.epsilon;
        let mut guess = Vector2::<f32>::zeros();

        let mut patch = Vec::with_capacity(area as usize);
        for lvl in (0..prev.len()).rev() {
            let level = &prev[lvl];
            let target = &next[lvl];
            let scale = 1.0 / (1u32 << lvl) as f32;
            let p = Point2::new(pt.x * scale, pt.y * scale);
            let (w, h) = (level.image.width as f32, level.image.height as f32);

            patch.clear();
            let (mut a11, mut a12, mut a22) = (0.0f32, 0.0f32, 0.0f32);
            for dy in -half..=half {
                for dx in -half..=half {
                    let (x, y) = (p.x + dx as f32, p.y + dy as f32);
                    let ix = level.gx.sample(x, y);
                    let iy = level.gy.sample(x, y);
                    a11 += ix * ix;
                    a12 += ix * iy;
                    a22 += iy * iy;
                    patch.push((dx as f32, dy as f32, level.image.sample(x, y), ix, iy));
                }
            }

            let det = a11 * a22 - a12 * a12;
            let min_eig = (a11 + a22 - ((a11 - a22) * (a11 - a22) + 4.0 * a12 * a12).sqrt())
                / (2.0 * area);
            let degenerate =
                min_eig.is_nan() || min_eig < self.params.min_eigen_threshold || det.abs() < f32::EPSILON;

            let mut v = guess;
            if degenerate {
                // coarse levels just hand the guess down; only the finest level decides
                if lvl == 0 {
                    return None;
                }
            } else {
                for _ in 0..self.params.max_iters.max(1) {
                    let q = p + v;
                    let hw = half as f32;
                    if q.x < -hw || q.y < -hw || q.x >= w + hw || q.y >= h + hw {
                        if lvl == 0 {
                            return None;
                        }
                        break;
                    }
                    let (mut b1, mut b2) = (0.0f32, 0.0f32);
                    for &(dx, dy, i, ix, iy) in &patch {
                        let diff = i - target.sample(q.x + dx, q.y + dy);
                        b1 += diff * ix;
                        b2 += diff * iy;
                    }
                    let step = Vector2::new((a22 * b1 - a12 * b2) / det, (a11 * b2 - a12 * b1) / det);
                    if !step.x.is_finite() || !step.y.is_finite() {
                        return None;
                    }
                    v += step;
                    if step.norm_squared() < eps2 {
                        break;
                    }
                }
            }

            guess = if lvl > 0 { v * 2.0 } else { v };
        }

        let out = pt + guess;
        let (w, h) = (prev[0].image.width as f32, prev[0].image.height as f32);
        let inside = out.x >= 0.0 && out.y >= 0.0 && out.x <= w - 1.0 && out.y <= h - 1.0;
        inside.then_some(out)
    }
}

impl OpticalFlow for PyramidalLucasKanade {
    fn track(
        &self,
        prev: &GrayImageView<'_>,
        next: &GrayImageView<'_>,
        points: &[Point2<f32>],
    ) -> Option<FlowResult> {
        if points.is_empty()
            || prev.width == 0
            || prev.height == 0
            || prev.width != next.width
            || prev.height != next.height
            || prev.data.len() != prev.width * prev.height
            || next.data.len() != next.width * next.height
        {
            return None;
        }

        let prev_levels: Vec<Level> = build_pyramid(prev, self.params.max_level)
            .into_iter()
            .map(|image| {
                let (gx, gy) = image.gradients();
                Level { image, gx, gy }
            })
            .collect();
        let next_levels = build_pyramid(next, prev_levels.len() - 1);

        let mut result = FlowResult {
            points: Vec::with_capacity(points.len()),
            status: Vec::with_capacity(points.len()),
        };
        for &pt in points {
            match self.track_point(&prev_levels, &next_levels, pt) {
                Some(found) => {
                    result.points.push(found);
                    result.status.push(true);
                }
                None => {
                    result.points.push(pt);
                    result.status.push(false);
                }
            }
        }
        log::trace!(
            "lucas-kanade tracked {}/{} points over {} levels",
            result.num_tracked(),
            points.len(),
            prev_levels.len()
        );
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use trafficam_core::GrayImage;

    /// Smooth blob field; shifting it by (sx, sy) moves every feature by that amount.
    fn blobs(w: usize, h: usize, sx: f32, sy: f32) -> GrayImage {
        let centers = [(30.0, 25.0), (70.0, 40.0), (50.0, 70.0), (95.0, 80.0), (20.0, 85.0)];
        let mut img = GrayImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let mut v = 20.0f32;
                for (k, (cx, cy)) in centers.iter().enumerate() {
                    let dx = x as f32 - (cx + sx);
                    let dy = y as f32 - (cy + sy);
                    let sigma2 = 30.0 + 10.0 * k as f32;
                    v += 200.0 * (-(dx * dx + dy * dy) / (2.0 * sigma2)).exp();
                }
                img.data[y * w + x] = v.min(255.0) as u8;
            }
        }
        img
    }

    fn sample_points() -> Vec<Point2<f32>> {
        vec![
            Point2::new(26.0, 22.0),
            Point2::new(73.0, 37.0),
            Point2::new(47.0, 73.0),
            Point2::new(91.0, 84.0),
        ]
    }

    #[test]
    fn recovers_subpixel_translation() {
        let prev = blobs(120, 100, 0.0, 0.0);
        let next = blobs(120, 100, 2.5, -1.5);
        let lk = PyramidalLucasKanade::default();
        let res = lk.track(&prev.view(), &next.view(), &sample_points()).expect("flow");
        assert_eq!(res.points.len(), 4);
        assert!(res.status.iter().all(|&ok| ok));
        for (p, q) in sample_points().iter().zip(&res.points) {
            assert_abs_diff_eq!(q.x - p.x, 2.5, epsilon = 0.25);
            assert_abs_diff_eq!(q.y - p.y, -1.5, epsilon = 0.25);
        }
    }

    #[test]
    fn flat_region_is_lost() {
        let mut flat = GrayImage::new(64, 64);
        flat.data.fill(90);
        let lk = PyramidalLucasKanade::default();
        let res = lk
            .track(&flat.view(), &flat.view(), &[Point2::new(32.0, 32.0)])
            .expect("flow");
        assert_eq!(res.status, vec![false]);
        assert_eq!(res.points, vec![Point2::new(32.0, 32.0)]);
    }

    #[test]
    fn rejects_degenerate_inputs() {
        let a = GrayImage::new(32, 32);
        let b = GrayImage::new(16, 32);
        let lk = PyramidalLucasKanade::default();
        assert!(lk.track(&a.view(), &a.view(), &[]).is_none());
        assert!(lk
            .track(&a.view(), &b.view(), &[Point2::new(1.0, 1.0)])
            .is_none());
    }

    #[test]
    fn pyramid_stops_before_tiny_levels() {
        let img = GrayImage::new(40, 30);
        let levels = build_pyramid(&img.view(), 5);
        assert_eq!(levels.len(), 3);
        assert_eq!((levels[1].width, levels[1].height), (20, 15));
        assert_eq!((levels[2].width, levels[2].height), (10, 8));
    }
}
