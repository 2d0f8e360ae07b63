//! The (retention time, m/z) footprint of a trace.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::MassTrace;

fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// A convex polygon over (retention time, m/z) with its vertices in counter-clockwise order
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConvexHull {
    vertices: Vec<(f64, f64)>,
}

impl ConvexHull {
    /// Compute the hull of `points` with the monotone chain algorithm. Collinear
    /// points along an edge are dropped.
    pub fn from_points(mut points: Vec<(f64, f64)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        points.dedup();
        if points.len() < 3 {
            return Self { vertices: points };
        }

        let mut lower: Vec<(f64, f64)> = Vec::with_capacity(points.len());
        for p in points.iter().copied() {
            while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0
            {
                lower.pop();
            }
            lower.push(p);
        }

        let mut upper: Vec<(f64, f64)> = Vec::with_capacity(points.len());
        for p in points.iter().rev().copied() {
            while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0
            {
                upper.pop();
            }
            upper.push(p);
        }

        lower.pop();
        upper.pop();
        lower.extend(upper);
        Self { vertices: lower }
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// The `((min_rt, min_mz), (max_rt, max_mz))` corners enclosing the hull
    pub fn bounding_box(&self) -> Option<((f64, f64), (f64, f64))> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().fold((first, first), |(lo, hi), v| {
            ((lo.0.min(v.0), lo.1.min(v.1)), (hi.0.max(v.0), hi.1.max(v.1)))
        }))
    }

    /// Test whether `(rt, mz)` lies inside or on the boundary of the hull
    pub fn contains(&self, rt: f64, mz: f64) -> bool {
        let p = (rt, mz);
        match self.vertices.len() {
            0 => false,
            1 => self.vertices[0] == p,
            2 => {
                let (a, b) = (self.vertices[0], self.vertices[1]);
                cross(a, b, p) == 0.0
                    && p.0 >= a.0.min(b.0)
                    && p.0 <= a.0.max(b.0)
                    && p.1 >= a.1.min(b.1)
                    && p.1 <= a.1.max(b.1)
            }
            n => (0..n).all(|i| cross(self.vertices[i], self.vertices[(i + 1) % n], p) >= 0.0),
        }
    }
}

impl MassTrace {
    /// The convex hull of every peak's (retention time, m/z) coordinate
    pub fn convex_hull(&self) -> ConvexHull {
        ConvexHull::from_points(self.iter().map(|p| (p.retention_time, p.mz)).collect())
    }
}
