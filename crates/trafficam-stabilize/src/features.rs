//! Shi–Tomasi corner selection for the reference frame.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use trafficam_core::GrayImageView;

/// Corner selection parameters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureParams {
    /// Upper bound on the number of returned corners.
    pub max_features: usize,
    /// Fraction of the strongest response a corner must reach.
    pub quality_level: f32,
    /// Minimum Euclidean distance between two returned corners, in pixels.
    pub min_distance: f32,
    /// Side of the window the structure tensor is summed over.
    pub block_size: usize,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            max_features: 200,
            quality_level: 0.01,
            min_distance: 15.0,
            block_size: 3,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    x: usize,
    y: usize,
    response: f32,
}

fn sobel(src: &GrayImageView<'_>) -> (Vec<f32>, Vec<f32>) {
    let (w, h) = (src.width, src.height);
    let px = |x: usize, y: usize| src.data[y * w + x] as f32;
    let mut gx = vec![0.0f32; w * h];
    let mut gy = vec![0.0f32; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let dx = (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x - 1, y) + px(x - 1, y + 1));
            let dy = (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x, y - 1) + px(x + 1, y - 1));
            gx[y * w + x] = dx;
            gy[y * w + x] = dy;
        }
    }
    (gx, gy)
}

/// Smaller eigenvalue of the gradient structure tensor at every pixel.
fn min_eigen_response(src: &GrayImageView<'_>, block_size: usize) -> Vec<f32> {
    let (w, h) = (src.width, src.height);
    let (gx, gy) = sobel(src);
    let r = (block_size.max(1) / 2) as isize;
    let mut out = vec![0.0f32; w * h];

    for y in 0..h {
        for x in 0..w {
            let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
            for dy in -r..=r {
                let yy = y as isize + dy;
                if yy < 0 || yy >= h as isize {
                    continue;
                }
                for dx in -r..=r {
                    let xx = x as isize + dx;
                    if xx < 0 || xx >= w as isize {
                        continue;
                    }
                    let i = yy as usize * w + xx as usize;
                    a += gx[i] * gx[i];
                    b += gx[i] * gy[i];
                    c += gy[i] * gy[i];
                }
            }
            let half_trace = 0.5 * (a + c);
            let disc = (0.25 * (a - c) * (a - c) + b * b).sqrt();
            out[y * w + x] = (half_trace - disc).max(0.0);
        }
    }
    out
}

fn is_local_max(resp: &[f32], w: usize, x: usize, y: usize) -> bool {
    let v = resp[y * w + x];
    for yy in y - 1..=y + 1 {
        for xx in x - 1..=x + 1 {
            if resp[yy * w + xx] > v {
                return false;
            }
        }
    }
    true
}

/// Accepts points that keep a minimum distance to everything accepted so far.
///
/// Accepted points are bucketed into square cells of side `min_distance`, so
/// only the 3x3 block of cells around a candidate has to be checked. Cells are
/// at least one pixel wide, which bounds the grid by the image area.
struct SpacingGrid {
    cell: f32,
    min_d2: f32,
    cols: usize,
    rows: usize,
    cells: Vec<Vec<Point2<f32>>>,
}

impl SpacingGrid {
    fn new(width: usize, height: usize, min_distance: f32) -> Self {
        let cell = min_distance.max(1.0);
        let cols = ((width as f32 / cell).ceil() as usize).max(1);
        let rows = ((height as f32 / cell).ceil() as usize).max(1);
        Self {
            cell,
            min_d2: min_distance * min_distance,
            cols,
            rows,
            cells: vec![Vec::new(); cols * rows],
        }
    }

    fn cell_of(&self, p: Point2<f32>) -> (usize, usize) {
        let cx = ((p.x / self.cell) as usize).min(self.cols - 1);
        let cy = ((p.y / self.cell) as usize).min(self.rows - 1);
        (cx, cy)
    }

    fn try_insert(&mut self, p: Point2<f32>) -> bool {
        let (cx, cy) = self.cell_of(p);
        for ny in cy.saturating_sub(1)..=(cy + 1).min(self.rows - 1) {
            for nx in cx.saturating_sub(1)..=(cx + 1).min(self.cols - 1) {
                let too_close = self.cells[ny * self.cols + nx]
                    .iter()
                    .any(|q| (p - *q).norm_squared() < self.min_d2);
                if too_close {
                    return false;
                }
            }
        }
        self.cells[cy * self.cols + cx].push(p);
        true
    }
}

/// Pick up to `params.max_features` strong, well separated corners.
///
/// Returned points are ordered by decreasing corner response; equal
/// responses keep raster order, so the output is deterministic.
pub fn good_features_to_track(src: &GrayImageView<'_>, params: &FeatureParams) -> Vec<Point2<f32>> {
    let (w, h) = (src.width, src.height);
    if w < 3 || h < 3 || src.data.len() != w * h || params.max_features == 0 {
        return Vec::new();
    }

    let resp = min_eigen_response(src, params.block_size);
    let max_resp = resp.iter().copied().fold(0.0f32, f32::max);
    if max_resp <= 0.0 {
        return Vec::new();
    }
    let threshold = params.quality_level.max(0.0) * max_resp;

    let mut candidates = Vec::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let response = resp[y * w + x];
            if response > 0.0 && response >= threshold && is_local_max(&resp, w, x, y) {
                candidates.push(Candidate { x, y, response });
            }
        }
    }
    // stable: ties stay in raster order
    candidates.sort_by(|a, b| b.response.total_cmp(&a.response));

    let mut out = Vec::with_capacity(params.max_features.min(candidates.len()));
    if params.min_distance <= 0.0 {
        out.extend(
            candidates
                .iter()
                .take(params.max_features)
                .map(|c| Point2::new(c.x as f32, c.y as f32)),
        );
        return out;
    }

    let mut grid = SpacingGrid::new(w, h, params.min_distance);
    for c in &candidates {
        let p = Point2::new(c.x as f32, c.y as f32);
        if grid.try_insert(p) {
            out.push(p);
            if out.len() == params.max_features {
                break;
            }
        }
    }
    out
}
