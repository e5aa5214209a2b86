//! # Core Data Structures
//!
//! This module defines the geometric value types used throughout the library:
//!
//! - **Vector2D**: 2D position/velocity/direction vector with arithmetic operations
//! - **Line**: directed line acting as a half-plane constraint in velocity space
//!
//! plus the stateless geometry helpers every other module builds on.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

#[cfg_attr(feature = "python", pyo3::pyclass(get_all, set_all))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2D {
    pub x: f64,
    pub y: f64,
}

impl Vector2D {
    pub const ZERO: Vector2D = Vector2D { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Vector2D { x, y }
    }

    pub fn dot(&self, other: &Vector2D) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Squared length.
    pub fn abs_sq(&self) -> f64 {
        self.dot(self)
    }

    pub fn magnitude(&self) -> f64 {
        self.abs_sq().sqrt()
    }

    /// Unit vector in the same direction, or the zero vector for a zero input.
    pub fn normalize(&self) -> Vector2D {
        let mag = self.magnitude();
        if mag > 0.0 {
            Vector2D {
                x: self.x / mag,
                y: self.y / mag,
            }
        } else {
            Vector2D::ZERO
        }
    }

    /// Counter-clockwise perpendicular.
    pub fn perpendicular(&self) -> Vector2D {
        Vector2D {
            x: -self.y,
            y: self.x,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Display for Vector2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vector2D({:.2}, {:.2})", self.x, self.y)
    }
}

impl Add for Vector2D {
    type Output = Vector2D;

    fn add(self, other: Vector2D) -> Vector2D {
        Vector2D {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl AddAssign for Vector2D {
    fn add_assign(&mut self, other: Vector2D) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vector2D {
    type Output = Vector2D;

    fn sub(self, other: Vector2D) -> Vector2D {
        Vector2D {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl Mul<f64> for Vector2D {
    type Output = Vector2D;

    fn mul(self, scalar: f64) -> Vector2D {
        Vector2D {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

impl Neg for Vector2D {
    type Output = Vector2D;

    fn neg(self) -> Vector2D {
        Vector2D {
            x: -self.x,
            y: -self.y,
        }
    }
}

/// A directed line in velocity space. The half-plane to the right of
/// `direction` (anchored at `point`) is infeasible, so a velocity `v`
/// satisfies the line iff `det(direction, point - v) <= 0`.
#[cfg_attr(feature = "python", pyo3::pyclass(get_all))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Line {
    /// A point on the line.
    pub point: Vector2D,
    /// Unit direction of the line.
    pub direction: Vector2D,
}

impl Line {
    pub fn new(point: Vector2D, direction: Vector2D) -> Self {
        Line { point, direction }
    }

    /// Signed distance by which `velocity` lies inside the infeasible side.
    /// Positive means the constraint is violated.
    pub fn violation(&self, velocity: Vector2D) -> f64 {
        det(self.direction, self.point - velocity)
    }

    pub fn is_finite(&self) -> bool {
        self.point.is_finite() && self.direction.is_finite()
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line(point={}, direction={})", self.point, self.direction)
    }
}

pub fn sqr(value: f64) -> f64 {
    value * value
}

pub fn abs_sq(v: Vector2D) -> f64 {
    v.abs_sq()
}

/// 2D cross product.
pub fn det(v1: Vector2D, v2: Vector2D) -> f64 {
    v1.x * v2.y - v1.y * v2.x
}

/// Positive when `c` lies to the left of the directed line `a -> b`.
pub fn left_of(a: Vector2D, b: Vector2D, c: Vector2D) -> f64 {
    det(a - c, b - a)
}

/// Squared distance from `c` to the segment `a b`.
pub fn dist_sq_point_line_segment(a: Vector2D, b: Vector2D, c: Vector2D) -> f64 {
    let segment = b - a;
    let length_sq = segment.abs_sq();
    if length_sq <= 0.0 {
        return (c - a).abs_sq();
    }

    let r = (c - a).dot(&segment) / length_sq;

    if r < 0.0 {
        (c - a).abs_sq()
    } else if r > 1.0 {
        (c - b).abs_sq()
    } else {
        (c - (a + segment * r)).abs_sq()
    }
}
