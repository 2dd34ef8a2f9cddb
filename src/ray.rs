#![warn(missing_docs)]
//! Paraxial ray vectors and drawable ray segments.
//!
//! A [`Ray`] is the column vector `[height, angle]` used by the transfer-matrix (ABCD) formalism. Rays are
//! plain values: every optical operation returns a new [`Ray`] instead of modifying its input.
use nalgebra::{Matrix2, Vector2};
use serde_derive::{Deserialize, Serialize};
use std::fmt::Display;

/// A paraxial ray described by its radial height and its slope with respect to the optical axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Ray {
    vector: Vector2<f64>,
}
impl Ray {
    /// Creates a new [`Ray`] from its height and angle.
    #[must_use]
    pub fn new(height: f64, angle: f64) -> Self {
        Self {
            vector: Vector2::new(height, angle),
        }
    }
    /// Returns the radial displacement of this [`Ray`] from the optical axis.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.vector[0]
    }
    /// Returns the slope of this [`Ray`] with respect to the optical axis (paraxial angle).
    #[must_use]
    pub fn angle(&self) -> f64 {
        self.vector[1]
    }
    /// Returns the underlying column vector `[height, angle]`.
    #[must_use]
    pub const fn as_vector(&self) -> &Vector2<f64> {
        &self.vector
    }
    /// Returns the ray obtained by applying the given transfer matrix to this [`Ray`].
    #[must_use]
    pub fn transformed(&self, transfer: &Matrix2<f64>) -> Self {
        Self {
            vector: transfer * self.vector,
        }
    }
    /// Returns `true` if height and angle are both finite numbers.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.vector.iter().all(|v| v.is_finite())
    }
}
impl From<Vector2<f64>> for Ray {
    fn from(vector: Vector2<f64>) -> Self {
        Self { vector }
    }
}
impl From<[f64; 2]> for Ray {
    fn from(values: [f64; 2]) -> Self {
        Self::new(values[0], values[1])
    }
}
impl From<Ray> for [f64; 2] {
    fn from(ray: Ray) -> Self {
        [ray.height(), ray.angle()]
    }
}
impl Display for Ray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.height(), self.angle())
    }
}

/// A straight piece of a ray path given by two `(axial position, height)` points.
///
/// Segments are produced while tracing a ray through a lens and are meant to be drawn as line plots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RaySegment {
    start: (f64, f64),
    end: (f64, f64),
}
impl RaySegment {
    /// Creates a new [`RaySegment`] between two `(axial position, height)` points.
    #[must_use]
    pub const fn new(start: (f64, f64), end: (f64, f64)) -> Self {
        Self { start, end }
    }
    /// Returns the start point of this [`RaySegment`].
    #[must_use]
    pub const fn start(&self) -> (f64, f64) {
        self.start
    }
    /// Returns the end point of this [`RaySegment`].
    #[must_use]
    pub const fn end(&self) -> (f64, f64) {
        self.end
    }
    /// Returns both points in drawing order.
    #[must_use]
    pub const fn points(&self) -> [(f64, f64); 2] {
        [self.start, self.end]
    }
}
