//! Zone polygons, detection boxes and the anchor point tested against zones.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Why a vertex list cannot form a zone.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonError {
    #[error("a zone needs at least 3 vertices, got {count}")]
    TooFewVertices { count: usize },
    #[error("vertex {vertex} has a non-finite coordinate")]
    NonFiniteVertex { vertex: usize },
}

/// Simple closed polygon; the last vertex connects back to the first.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    vertices: Vec<Point2<f32>>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point2<f32>>) -> Result<Self, PolygonError> {
        if vertices.len() < 3 {
            return Err(PolygonError::TooFewVertices {
                count: vertices.len(),
            });
        }
        if let Some(vertex) = vertices
            .iter()
            .position(|v| !v.x.is_finite() || !v.y.is_finite())
        {
            return Err(PolygonError::NonFiniteVertex { vertex });
        }
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[Point2<f32>] {
        &self.vertices
    }

    fn edges(&self) -> impl Iterator<Item = (Point2<f32>, Point2<f32>)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Even-odd containment test. Points on an edge or vertex count as inside.
    pub fn contains(&self, p: Point2<f32>) -> bool {
        if self.edges().any(|(a, b)| on_segment(p, a, b)) {
            return true;
        }
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let t = (p.y - a.y) / (b.y - a.y);
                let x_cross = a.x + t * (b.x - a.x);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

fn on_segment(p: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> bool {
    const EPS: f64 = 1e-6;
    let (px, py) = (p.x as f64, p.y as f64);
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (bx, by) = (b.x as f64, b.y as f64);
    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    let len = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt().max(1.0);
    if cross.abs() > EPS * len {
        return false;
    }
    px >= ax.min(bx) - EPS && px <= ax.max(bx) + EPS && py >= ay.min(by) - EPS && py <= ay.max(by) + EPS
}

/// Axis-aligned detection box in pixel coordinates, `(x1, y1)` top-left.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// The point of this box that stands in for the whole object.
    pub fn anchor(&self, anchor: Anchor) -> Point2<f32> {
        let cx = 0.5 * (self.x1 + self.x2);
        let cy = 0.5 * (self.y1 + self.y2);
        match anchor {
            Anchor::Center => Point2::new(cx, cy),
            Anchor::TopLeft => Point2::new(self.x1, self.y1),
            Anchor::TopCenter => Point2::new(cx, self.y1),
            Anchor::TopRight => Point2::new(self.x2, self.y1),
            Anchor::CenterLeft => Point2::new(self.x1, cy),
            Anchor::CenterRight => Point2::new(self.x2, cy),
            Anchor::BottomLeft => Point2::new(self.x1, self.y2),
            Anchor::BottomCenter => Point2::new(cx, self.y2),
            Anchor::BottomRight => Point2::new(self.x2, self.y2),
        }
    }
}

/// Which point of a detection box is tested for zone membership.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    #[default]
    Center,
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}
