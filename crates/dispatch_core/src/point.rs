//! Planar coordinates shared by the spatial index, the road network and the
//! wire contract.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Largest accepted coordinate magnitude. Squared distances and summed route
/// lengths between such points stay finite.
pub const MAX_COORDINATE: f64 = 1e150;

/// Immutable 2D coordinate. Serialises as `{"x": .., "y": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Split axis of a k-d tree level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    /// Axis used at `depth`: X on even levels, Y on odd ones.
    pub fn for_depth(depth: usize) -> Self {
        if depth % 2 == 0 {
            Axis::X
        } else {
            Axis::Y
        }
    }

    pub fn next(self) -> Self {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }
}

/// Hashable identity of a point, built from the coordinate bit patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct PointKey(pub(crate) u64, pub(crate) u64);

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Build a point, rejecting NaN, infinite and out-of-range coordinates.
    pub fn try_new(x: f64, y: f64) -> Result<Self, DispatchError> {
        let point = Self { x, y };
        point.ensure_valid("point")?;
        Ok(point)
    }

    /// Finite and within [`MAX_COORDINATE`] on both axes.
    pub fn is_valid(&self) -> bool {
        [self.x, self.y]
            .iter()
            .all(|c| c.is_finite() && c.abs() <= MAX_COORDINATE)
    }

    /// Validate a caller-supplied point. `field` names it in the error message.
    pub fn ensure_valid(&self, field: &str) -> Result<(), DispatchError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(DispatchError::InvalidInput(format!(
                "{field} must have finite coordinates within ±{MAX_COORDINATE:e}, got ({}, {})",
                self.x, self.y
            )))
        }
    }

    pub fn coord(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    pub fn distance_squared(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Straight-line (Euclidean) distance.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub(crate) fn key(&self) -> PointKey {
        // -0.0 and 0.0 compare equal, so they must hash equal too.
        let normalise = |v: f64| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
        PointKey(normalise(self.x), normalise(self.y))
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned rectangle, used to clip the road network returned for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Smallest rectangle containing every point, or `None` for an empty input.
    pub fn around<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = Bounds {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
        };
        for p in points {
            bounds.min_x = bounds.min_x.min(p.x);
            bounds.max_x = bounds.max_x.max(p.x);
            bounds.min_y = bounds.min_y.min(p.y);
            bounds.max_y = bounds.max_y.max(p.y);
        }
        Some(bounds)
    }

    /// Grow each axis by half its range, but at least by `margin`.
    pub fn expanded(&self, margin: f64) -> Self {
        let expand_x = ((self.max_x - self.min_x) / 2.0).max(margin);
        let expand_y = ((self.max_y - self.min_y) / 2.0).max(margin);
        Bounds {
            min_x: self.min_x - expand_x,
            max_x: self.max_x + expand_x,
            min_y: self.min_y - expand_y,
            max_y: self.max_y + expand_y,
        }
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}
