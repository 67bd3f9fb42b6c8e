//! Robust homography fitting by random sample consensus.
//!
//! Minimal samples are drawn from a `StdRng` seeded with `RansacParams::seed`,
//! so a given input always produces the same model.

use crate::{estimate_homography, homography_from_4pt, Homography, MIN_HOMOGRAPHY_POINTS};
use nalgebra::Point2;
use rand::{rngs::StdRng, seq::index, SeedableRng};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Consensus-sampling parameters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Maximum reprojection distance (pixels) for a correspondence to count as an inlier.
    pub reproj_threshold: f32,
    /// Hard cap on sampling iterations.
    pub max_iters: usize,
    /// Desired probability of drawing at least one outlier-free sample.
    pub confidence: f64,
    /// Seed for the sample generator.
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            reproj_threshold: 5.0,
            max_iters: 2000,
            confidence: 0.995,
            seed: 0x5EED_0F_CAFE,
        }
    }
}

/// Result of a successful robust fit.
#[derive(Clone, Debug)]
pub struct RansacHomography {
    /// Transform mapping `src` points onto `dst` points.
    pub h: Homography,
    /// Per-correspondence inlier mask under the final model.
    pub inliers: Vec<bool>,
}

impl RansacHomography {
    pub fn num_inliers(&self) -> usize {
        self.inliers.iter().filter(|&&b| b).count()
    }
}

/// Four distinct indices in `0..n` (`n >= 4`).
fn sample4(rng: &mut StdRng, n: usize) -> [usize; 4] {
    let idx = index::sample(rng, n, MIN_HOMOGRAPHY_POINTS);
    [idx.index(0), idx.index(1), idx.index(2), idx.index(3)]
}

fn cross(o: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f64 {
    let (ax, ay) = ((a.x - o.x) as f64, (a.y - o.y) as f64);
    let (bx, by) = ((b.x - o.x) as f64, (b.y - o.y) as f64);
    ax * by - ay * bx
}

/// True when any three of the four points are (nearly) collinear.
fn is_degenerate(pts: &[Point2<f32>; 4]) -> bool {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLES
        .iter()
        .any(|t| cross(pts[t[0]], pts[t[1]], pts[t[2]]).abs() < 1e-6)
}

fn mark_inliers(
    h: &Homography,
    src: &[Point2<f32>],
    dst: &[Point2<f32>],
    threshold: f32,
    mask: &mut [bool],
) -> usize {
    let thr2 = threshold * threshold;
    let mut count = 0;
    for ((s, d), m) in src.iter().zip(dst).zip(mask.iter_mut()) {
        let err2 = h.transfer_error_sq(*s, *d);
        *m = err2.is_finite() && err2 < thr2;
        count += usize::from(*m);
    }
    count
}

fn required_iterations(inlier_ratio: f64, confidence: f64, cap: usize) -> usize {
    let p_good = inlier_ratio.powi(MIN_HOMOGRAPHY_POINTS as i32);
    if p_good >= 1.0 - f64::EPSILON {
        return 1;
    }
    if p_good <= f64::EPSILON {
        return cap;
    }
    let k = (1.0 - confidence).ln() / (1.0 - p_good).ln();
    if !k.is_finite() {
        return cap;
    }
    (k.ceil() as usize).clamp(1, cap)
}

/// Estimate H such that `dst ~ H * src`, tolerating outlier correspondences.
///
/// Returns `None` when fewer than four correspondences are given, the slices
/// differ in length, or no sample yields a model with at least four inliers.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(src, dst, params), fields(points = src.len()))
)]
pub fn estimate_homography_ransac(
    src: &[Point2<f32>],
    dst: &[Point2<f32>],
    params: &RansacParams,
) -> Option<RansacHomography> {
    let n = src.len();
    if n != dst.len() || n < MIN_HOMOGRAPHY_POINTS {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut mask = vec![false; n];
    let mut best: Option<(Homography, Vec<bool>, usize)> = None;
    let mut budget = params.max_iters.max(1);
    let mut iter = 0;

    while iter < budget {
        iter += 1;

        let idx = if n == MIN_HOMOGRAPHY_POINTS {
            [0, 1, 2, 3]
        } else {
            sample4(&mut rng, n)
        };
        let s = idx.map(|i| src[i]);
        let d = idx.map(|i| dst[i]);
        if is_degenerate(&s) || is_degenerate(&d) {
            if n == MIN_HOMOGRAPHY_POINTS {
                break;
            }
            continue;
        }
        let Some(h) = homography_from_4pt(&s, &d) else {
            continue;
        };

        let count = mark_inliers(&h, src, dst, params.reproj_threshold, &mut mask);
        if best.as_ref().map_or(true, |b| count > b.2) {
            best = Some((h, mask.clone(), count));
            budget = required_iterations(count as f64 / n as f64, params.confidence, budget);
        }

        if n == MIN_HOMOGRAPHY_POINTS {
            break;
        }
    }

    let (h, inliers, count) = best?;
    if count < MIN_HOMOGRAPHY_POINTS {
        return None;
    }

    // Refit on the consensus set; keep the minimal model if the refit is worse.
    let (in_src, in_dst): (Vec<_>, Vec<_>) = src
        .iter()
        .zip(dst)
        .zip(&inliers)
        .filter(|(_, keep)| **keep)
        .map(|((s, d), _)| (*s, *d))
        .unzip();

    if let Some(refined) = estimate_homography(&in_src, &in_dst) {
        let refined_count = mark_inliers(&refined, src, dst, params.reproj_threshold, &mut mask);
        if refined_count >= count {
            return Some(RansacHomography {
                h: refined,
                inliers: mask,
            });
        }
    }

    Some(RansacHomography { h, inliers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix3;

    fn ground_truth() -> Homography {
        Homography::new(Matrix3::new(
            0.98, 0.03, 6.0, //
            -0.02, 1.01, -4.0, //
            0.00002, -0.00001, 1.0,
        ))
    }

    fn grid_points() -> Vec<Point2<f32>> {
        (0..6)
            .flat_map(|j| (0..8).map(move |i| Point2::new(20.0 + i as f32 * 37.0, 15.0 + j as f32 * 29.0)))
            .collect()
    }

    #[test]
    fn recovers_transform_despite_outliers() {
        let src = grid_points();
        let gt = ground_truth();
        let mut dst: Vec<Point2<f32>> = src.iter().map(|&p| gt.apply(p)).collect();
        // corrupt every 5th correspondence
        for (k, p) in dst.iter_mut().enumerate() {
            if k % 5 == 0 {
                p.x += 60.0 + k as f32;
                p.y -= 45.0;
            }
        }

        let fit = estimate_homography_ransac(&src, &dst, &RansacParams::default()).expect("fit");
        assert_eq!(fit.num_inliers(), src.len() - src.len().div_ceil(5));
        for (k, inlier) in fit.inliers.iter().enumerate() {
            assert_eq!(*inlier, k % 5 != 0, "inlier flag mismatch at {k}");
        }
        let query = Point2::new(150.0_f32, 100.0);
        let expected = gt.apply(query);
        let got = fit.h.apply(query);
        assert_relative_eq!(got.x, expected.x, epsilon = 1e-2);
        assert_relative_eq!(got.y, expected.y, epsilon = 1e-2);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let src = grid_points();
        let dst: Vec<Point2<f32>> = src
            .iter()
            .enumerate()
            .map(|(k, &p)| {
                let q = ground_truth().apply(p);
                if k % 3 == 0 {
                    Point2::new(q.x + 25.0, q.y + 25.0)
                } else {
                    q
                }
            })
            .collect();
        let a = estimate_homography_ransac(&src, &dst, &RansacParams::default()).unwrap();
        let b = estimate_homography_ransac(&src, &dst, &RansacParams::default()).unwrap();
        assert_eq!(a.h, b.h);
        assert_eq!(a.inliers, b.inliers);
    }

    #[test]
    fn too_few_points_fail() {
        let src = [Point2::new(0.0_f32, 0.0); 3];
        assert!(estimate_homography_ransac(&src, &src, &RansacParams::default()).is_none());
    }

    #[test]
    fn collinear_points_fail() {
        let src: Vec<Point2<f32>> = (0..10).map(|i| Point2::new(i as f32 * 10.0, 5.0)).collect();
        assert!(estimate_homography_ransac(&src, &src, &RansacParams::default()).is_none());
    }

    #[test]
    fn exact_four_points_fit() {
        let src = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(100.0, 80.0),
            Point2::new(0.0, 80.0),
        ];
        let dst = src.map(|p| Point2::new(p.x + 3.0, p.y - 2.0));
        let fit = estimate_homography_ransac(&src, &dst, &RansacParams::default()).expect("fit");
        assert_eq!(fit.num_inliers(), 4);
        let q = fit.h.apply(Point2::new(50.0, 40.0));
        assert_relative_eq!(q.x, 53.0, epsilon = 1e-3);
        assert_relative_eq!(q.y, 38.0, epsilon = 1e-3);
    }

    #[test]
    fn params_fill_missing_fields_with_defaults() {
        let params: RansacParams = serde_json::from_str(r#"{"reproj_threshold": 3.0}"#).unwrap();
        assert_eq!(params.reproj_threshold, 3.0);
        assert_eq!(params.max_iters, RansacParams::default().max_iters);
        assert_eq!(params.seed, RansacParams::default().seed);
    }
}
