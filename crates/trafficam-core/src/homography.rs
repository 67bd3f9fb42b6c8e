//! Planar homographies: estimation from point pairs and frame warping.

use crate::{sample_bilinear_rgb, sample_bilinear_u8, GrayImage, GrayImageView, RgbImage};
use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector2, Vector3};
use std::f64::consts::SQRT_2;

/// 3x3 projective transform acting on pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    /// Pure translation by `(dx, dy)`.
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self::new(Matrix3::new(1.0, 0.0, dx, 0.0, 1.0, dy, 0.0, 0.0, 1.0))
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        Point2::new((v.x / v.z) as f32, (v.y / v.z) as f32)
    }

    /// Squared distance between `H * src` and `dst`.
    #[inline]
    pub fn transfer_error_sq(&self, src: Point2<f32>, dst: Point2<f32>) -> f32 {
        (self.apply(src) - dst).norm_squared()
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    pub fn is_finite(&self) -> bool {
        self.h.iter().all(|v| v.is_finite())
    }
}

/// Points shifted to their centroid and scaled to a mean radius of sqrt(2),
/// together with the similarity `t` that does it.
struct Normalized {
    points: Vec<Vector2<f64>>,
    t: Matrix3<f64>,
}

impl Normalized {
    fn new(pts: &[Point2<f32>]) -> Self {
        let n = pts.len().max(1) as f64;
        let coords = || pts.iter().map(|p| p.coords.cast::<f64>());
        let centroid = coords().fold(Vector2::zeros(), |acc, c| acc + c) / n;
        let mean_radius = coords().map(|c| (c - centroid).norm()).sum::<f64>() / n;
        let s = if mean_radius > 1e-12 {
            SQRT_2 / mean_radius
        } else {
            1.0
        };
        Self {
            points: coords().map(|c| (c - centroid) * s).collect(),
            t: Matrix3::new(
                s, 0.0, -s * centroid.x, //
                0.0, s, -s * centroid.y, //
                0.0, 0.0, 1.0,
            ),
        }
    }
}

/// Undo both normalizations, `H = Td^-1 * Hn * Ts`, and scale so `h33 = 1`.
fn denormalize(hn: Matrix3<f64>, src: &Normalized, dst: &Normalized) -> Option<Homography> {
    let h = dst.t.try_inverse()? * hn * src.t;
    let w = h[(2, 2)];
    if w.abs() < 1e-12 {
        return None;
    }
    let out = Homography::new(h / w);
    out.is_finite().then_some(out)
}

/// Estimate H with `dst ~ H * src` by normalized DLT (least squares).
///
/// Exactly four pairs go through [`homography_from_4pt`]. Returns `None` for
/// fewer than four pairs, mismatched lengths or a degenerate configuration.
pub fn estimate_homography(src: &[Point2<f32>], dst: &[Point2<f32>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }
    if let (Ok(s), Ok(d)) = (<&[_; 4]>::try_from(src), <&[_; 4]>::try_from(dst)) {
        return homography_from_4pt(s, d);
    }

    let s = Normalized::new(src);
    let d = Normalized::new(dst);
    let rows = s.points.iter().zip(&d.points).flat_map(|(p, q)| {
        let (x, y, u, v) = (p.x, p.y, q.x, q.y);
        [
            [-x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u],
            [0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v],
        ]
    });
    let a = DMatrix::from_row_iterator(2 * src.len(), 9, rows.flatten());

    // A h = 0: h is the right singular vector of the smallest singular value.
    // With at least five pairs A has >= 10 rows, so V^T is a full 9x9.
    let svd = a.svd(false, true);
    let vt = svd.v_t?;
    let (smallest, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let h: Vec<f64> = vt.row(smallest).iter().copied().collect();
    denormalize(Matrix3::from_row_slice(&h), &s, &d)
}

/// Exact homography through four point pairs, solved with `h33 = 1`.
///
/// Returns `None` when the pairs are degenerate (e.g. three collinear points).
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let s = Normalized::new(src);
    let d = Normalized::new(dst);

    // x h11 + y h12 + h13 - u x h31 - u y h32 = u, and likewise for v.
    let mut rows = [[0.0; 8]; 8];
    let mut rhs = [0.0; 8];
    for (k, (p, q)) in s.points.iter().zip(&d.points).enumerate() {
        let (x, y, u, v) = (p.x, p.y, q.x, q.y);
        rows[2 * k] = [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y];
        rows[2 * k + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y];
        rhs[2 * k] = u;
        rhs[2 * k + 1] = v;
    }
    let a = SMatrix::<f64, 8, 8>::from_row_iterator(rows.iter().flatten().copied());
    let sol = a.lu().solve(&SVector::<f64, 8>::from(rhs))?;

    let hn = Matrix3::new(
        sol[0], sol[1], sol[2], //
        sol[3], sol[4], sol[5], //
        sol[6], sol[7], 1.0,
    );
    denormalize(hn, &s, &d)
}

/// Visit every pixel of an `out_w x out_h` canvas with its source position
/// under the inverse of `h_dst_from_src`. Non-finite positions are skipped.
fn for_each_source_pixel(
    h_dst_from_src: Homography,
    out_w: usize,
    out_h: usize,
    mut visit: impl FnMut(usize, usize, Point2<f32>),
) -> Option<()> {
    let h_src_from_dst = h_dst_from_src.inverse()?;
    for y in 0..out_h {
        for x in 0..out_w {
            let ps = h_src_from_dst.apply(Point2::new(x as f32, y as f32));
            if ps.x.is_finite() && ps.y.is_finite() {
                visit(x, y, ps);
            }
        }
    }
    Some(())
}

/// Warp `src` through `h_dst_from_src` onto an `out_w x out_h` canvas.
///
/// Destination pixels sample the source bilinearly; anything mapping outside
/// the source is black. `None` when the transform is not invertible.
pub fn warp_perspective_gray(
    src: &GrayImageView<'_>,
    h_dst_from_src: Homography,
    out_w: usize,
    out_h: usize,
) -> Option<GrayImage> {
    let mut out = GrayImage::new(out_w, out_h);
    for_each_source_pixel(h_dst_from_src, out_w, out_h, |x, y, ps| {
        out.data[y * out_w + x] = sample_bilinear_u8(src, ps.x, ps.y);
    })?;
    Some(out)
}

/// RGB counterpart of [`warp_perspective_gray`].
pub fn warp_perspective_rgb(
    src: &RgbImage,
    h_dst_from_src: Homography,
    out_w: usize,
    out_h: usize,
) -> Option<RgbImage> {
    let mut out = RgbImage::new(out_w, out_h);
    for_each_source_pixel(h_dst_from_src, out_w, out_h, |x, y, ps| {
        out.put_pixel(x, y, sample_bilinear_rgb(src, ps.x, ps.y));
    })?;
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perspective() -> Homography {
        Homography::new(Matrix3::new(
            0.97, 0.04, 6.5, //
            -0.03, 1.02, -4.0, //
            0.0002, -0.0001, 1.0,
        ))
    }

    fn sample_points() -> [Point2<f32>; 4] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(310.0, 12.0),
            Point2::new(45.0, 230.0),
            Point2::new(600.0, 420.0),
        ]
    }

    #[test]
    fn inverse_maps_points_back() {
        let h = perspective();
        let inv = h.inverse().unwrap();
        for p in sample_points() {
            assert!((inv.apply(h.apply(p)) - p).norm() < 1e-3);
        }
    }

    #[test]
    fn four_pairs_are_solved_exactly() {
        let gt = perspective();
        let src = [
            Point2::new(10.0, 10.0),
            Point2::new(630.0, 15.0),
            Point2::new(620.0, 470.0),
            Point2::new(5.0, 460.0),
        ];
        let dst = src.map(|p| gt.apply(p));
        let h = homography_from_4pt(&src, &dst).unwrap();
        for p in sample_points() {
            assert!((h.apply(p) - gt.apply(p)).norm() < 1e-3);
        }
    }

    #[test]
    fn least_squares_fit_on_many_pairs() {
        let gt = perspective();
        let src: Vec<Point2<f32>> = (0..20)
            .map(|k| Point2::new((k % 5) as f32 * 150.0, (k / 5) as f32 * 140.0))
            .collect();
        let dst: Vec<Point2<f32>> = src.iter().map(|&p| gt.apply(p)).collect();
        let h = estimate_homography(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            assert!(h.transfer_error_sq(*s, *d) < 1e-4);
        }
    }

    #[test]
    fn invalid_inputs_fail() {
        let four = [Point2::new(0.0, 0.0); 4];
        assert!(estimate_homography(&four, &four[..3]).is_none());
        assert!(estimate_homography(&four[..3], &four[..3]).is_none());
    }

    #[test]
    fn transfer_error_of_a_translation() {
        let h = Homography::translation(3.0, -4.0);
        assert_eq!(h.transfer_error_sq(Point2::new(1.0, 1.0), Point2::new(4.0, -3.0)), 0.0);
        assert_eq!(h.transfer_error_sq(Point2::new(0.0, 0.0), Point2::new(0.0, 0.0)), 25.0);
    }

    #[test]
    fn identity_warp_copies_frame() {
        let mut src = RgbImage::new(7, 5);
        for y in 0..5 {
            for x in 0..7 {
                src.put_pixel(x, y, [(x * 30) as u8, (y * 40) as u8, 200]);
            }
        }
        let out = warp_perspective_rgb(&src, Homography::identity(), 7, 5).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn translated_warp_leaves_uncovered_pixels_black() {
        let mut src = GrayImage::new(6, 4);
        src.data[6 + 1] = 200;
        let out = warp_perspective_gray(&src.view(), Homography::translation(2.0, 1.0), 6, 4).unwrap();
        assert_eq!(out.data[2 * 6 + 3], 200);
        assert_eq!(out.data.iter().filter(|&&v| v != 0).count(), 1);
    }

    #[test]
    fn singular_transform_cannot_warp() {
        let src = GrayImage::new(4, 4);
        assert!(warp_perspective_gray(&src.view(), Homography::new(Matrix3::zeros()), 4, 4).is_none());
    }

    #[test]
    fn pixels_near_the_horizon_warp_to_black() {
        // inverse sends x = 50 on the canvas close to the line at infinity
        let h_src_from_dst = Homography::new(Matrix3::new(
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            1.0, 0.0, -49.99999999,
        ));
        let h = h_src_from_dst.inverse().unwrap();
        let mut src = RgbImage::new(100, 10);
        src.data.fill(255);
        let out = warp_perspective_rgb(&src, h, 100, 10).unwrap();
        assert_eq!((out.width, out.height), (100, 10));
        assert_eq!(out.pixel(50, 0), [0, 0, 0]);
    }
}

