//! Axis-aligned world bounds for spatial cells.
//!
//! A [`WorldBounds`] is the geometric primitive the rest of FleetForge
//! partitions: cells own a `WorldBounds`, splits bisect one, merges union
//! two. The X axis is always present; Y and Z are independently optional so
//! a world can be modeled as 1D, 2D, or 3D without a sentinel value standing
//! in for "no such axis".
//!
//! Containment is half-open per axis: a point with coordinate exactly equal
//! to an axis's `max` belongs to the neighbor whose `min` is that same
//! value, never to both. This keeps adjacency tests exact (no epsilon
//! comparisons) and keeps a freshly split pair of cells from ever double-
//! counting a player sitting on the shared edge.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// One axis of a [`WorldBounds`]: `min < max`, enforced at construction.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisBounds {
    pub min: f64,
    pub max: f64,
}

impl AxisBounds {
    /// Builds an axis, rejecting non-finite or non-increasing bounds.
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(BoundsError::NotFinite { min, max });
        }
        if !(min < max) {
            return Err(BoundsError::MinNotLessThanMax { min, max });
        }
        Ok(Self { min, max })
    }

    #[must_use]
    pub fn len(&self) -> f64 {
        self.max - self.min
    }

    #[must_use]
    pub fn mid(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    /// Half-open containment: `[min, max)`.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value < self.max
    }

    /// Splits this axis in two at its midpoint. The left half keeps `min`,
    /// the right half keeps `max`; both share the midpoint as their touching
    /// edge, with the right half owning it under the half-open convention.
    #[must_use]
    pub fn bisect(&self) -> (Self, Self) {
        let mid = self.mid();
        (
            Self { min: self.min, max: mid },
            Self { min: mid, max: self.max },
        )
    }

    /// The smallest axis containing both inputs. Used by merge.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BoundsError {
    #[error("axis bounds must be finite, got min={min}, max={max}")]
    NotFinite { min: f64, max: f64 },
    #[error("axis min ({min}) must be less than max ({max})")]
    MinNotLessThanMax { min: f64, max: f64 },
}

/// Which axis of a [`WorldBounds`] a query or adjacency check refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Display for Axis {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        };
        f.write_str(s)
    }
}

/// An axis-aligned region of the world. `x` is mandatory; `y` and `z` are
/// each independently present or absent, modeling 1D/2D/3D cells uniformly.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub x: AxisBounds,
    pub y: Option<AxisBounds>,
    pub z: Option<AxisBounds>,
}

/// A player position. Positions are always 2D regardless of the owning
/// cell's dimensionality — a 3D cell's Z axis bounds its shape, not player
/// movement.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl WorldBounds {
    /// A 1D bounds with only an X axis.
    pub fn new_1d(x: AxisBounds) -> Self {
        Self { x, y: None, z: None }
    }

    /// A 2D bounds with X and Y axes.
    pub fn new_2d(x: AxisBounds, y: AxisBounds) -> Self {
        Self { x, y: Some(y), z: None }
    }

    /// A 3D bounds with X, Y, and Z axes.
    pub fn new_3d(x: AxisBounds, y: AxisBounds, z: AxisBounds) -> Self {
        Self { x, y: Some(y), z: Some(z) }
    }

    /// The product of each present axis's length; absent axes contribute a
    /// factor of 1, so a 1D cell's "area" is simply its X length.
    #[must_use]
    pub fn area(&self) -> f64 {
        let mut area = self.x.len();
        if let Some(y) = &self.y {
            area *= y.len();
        }
        if let Some(z) = &self.z {
            area *= z.len();
        }
        area
    }

    /// Half-open containment on X and (if present) Y. Z, if present, never
    /// constrains a player position since [`Position`] has no Z component.
    #[must_use]
    pub fn contains_point(&self, pos: Position) -> bool {
        if !self.x.contains(pos.x) {
            return false;
        }
        if let Some(y) = &self.y {
            if !y.contains(pos.y) {
                return false;
            }
        }
        true
    }

    /// Bisects along X, preserving Y and Z untouched. This is the sole split
    /// axis FleetForge uses; area is conserved exactly (`child1 + child2 ==
    /// parent`, modulo floating-point rounding) and the shared edge is exact
    /// (`child1.x.max == child2.x.min`).
    #[must_use]
    pub fn split_x(&self) -> (Self, Self) {
        let (left, right) = self.x.bisect();
        (
            Self { x: left, y: self.y, z: self.z },
            Self { x: right, y: self.y, z: self.z },
        )
    }

    /// If `self` and `other` are adjacent on exactly one axis (sharing an
    /// exact edge coordinate, with every other axis identical — both
    /// present-and-equal or both absent), returns that axis. This is the
    /// sibling-adjacency test merge requires.
    #[must_use]
    pub fn shared_edge_axis(&self, other: &Self) -> Option<Axis> {
        let axes = [
            (Axis::X, Some(self.x), Some(other.x)),
            (Axis::Y, self.y, other.y),
            (Axis::Z, self.z, other.z),
        ];

        let mut touching_axis = None;

        for (axis, a, b) in axes {
            match (a, b) {
                (Some(a), Some(b)) => {
                    if a == b {
                        continue;
                    }
                    if a.max == b.min || b.max == a.min {
                        if touching_axis.is_some() {
                            // more than one axis differs: not a clean shared edge
                            return None;
                        }
                        touching_axis = Some(axis);
                    } else {
                        return None;
                    }
                }
                (None, None) => continue,
                _ => return None,
            }
        }

        touching_axis
    }

    /// The union of `self` and `other` along every axis, used to build the
    /// bounds of a merged cell. Callers are expected to have already
    /// verified adjacency via [`Self::shared_edge_axis`].
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            x: self.x.union(&other.x),
            y: match (self.y, other.y) {
                (Some(a), Some(b)) => Some(a.union(&b)),
                _ => None,
            },
            z: match (self.z, other.z) {
                (Some(a), Some(b)) => Some(a.union(&b)),
                _ => None,
            },
        }
    }
}

impl Display for WorldBounds {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "x=[{:.3}, {:.3})", self.x.min, self.x.max)?;
        if let Some(y) = &self.y {
            write!(f, " y=[{:.3}, {:.3})", y.min, y.max)?;
        }
        if let Some(z) = &self.z {
            write!(f, " z=[{:.3}, {:.3})", z.min, z.max)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    use super::*;

    fn axis(min: f64, max: f64) -> AxisBounds {
        AxisBounds::new(min, max).unwrap()
    }

    #[test]
    fn rejects_degenerate_axis() {
        assert!(AxisBounds::new(1.0, 1.0).is_err());
        assert!(AxisBounds::new(2.0, 1.0).is_err());
        assert!(AxisBounds::new(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn area_ignores_absent_axes() {
        let bounds = WorldBounds::new_1d(axis(0.0, 10.0));
        assert_relative_eq!(bounds.area(), 10.0);

        let bounds = WorldBounds::new_2d(axis(0.0, 10.0), axis(0.0, 5.0));
        assert_relative_eq!(bounds.area(), 50.0);

        let bounds = WorldBounds::new_3d(axis(0.0, 10.0), axis(0.0, 5.0), axis(0.0, 2.0));
        assert_relative_eq!(bounds.area(), 100.0);
    }

    #[test]
    fn split_x_conserves_area_and_has_exact_shared_edge() {
        let bounds = WorldBounds::new_2d(axis(-1000.0, 1000.0), axis(-500.0, 500.0));
        let (left, right) = bounds.split_x();

        assert_relative_eq!(left.area() + right.area(), bounds.area(), max_relative = 5e-3);
        assert_eq!(left.x.max, right.x.min);
        assert_eq!(left.y, bounds.y);
        assert_eq!(right.y, bounds.y);
    }

    #[test]
    fn split_x_point_on_midpoint_belongs_to_right_child() {
        let bounds = WorldBounds::new_1d(axis(0.0, 1000.0));
        let (left, right) = bounds.split_x();

        let mid = Position::new(500.0, 0.0);
        assert!(!left.contains_point(mid));
        assert!(right.contains_point(mid));
    }

    #[test]
    fn shared_edge_axis_detects_x_adjacency() {
        let a = WorldBounds::new_2d(axis(0.0, 500.0), axis(0.0, 1000.0));
        let b = WorldBounds::new_2d(axis(500.0, 1000.0), axis(0.0, 1000.0));
        assert_eq!(a.shared_edge_axis(&b), Some(Axis::X));
        assert_eq!(b.shared_edge_axis(&a), Some(Axis::X));
    }

    #[test]
    fn shared_edge_axis_rejects_non_adjacent_or_mismatched_axes() {
        let a = WorldBounds::new_2d(axis(0.0, 500.0), axis(0.0, 1000.0));
        let disjoint = WorldBounds::new_2d(axis(600.0, 1000.0), axis(0.0, 1000.0));
        assert_eq!(a.shared_edge_axis(&disjoint), None);

        let mismatched_y = WorldBounds::new_2d(axis(500.0, 1000.0), axis(0.0, 500.0));
        assert_eq!(a.shared_edge_axis(&mismatched_y), None);

        let dimension_mismatch = WorldBounds::new_1d(axis(500.0, 1000.0));
        assert_eq!(a.shared_edge_axis(&dimension_mismatch), None);
    }

    #[test]
    fn union_covers_both_inputs() {
        let a = WorldBounds::new_1d(axis(0.0, 500.0));
        let b = WorldBounds::new_1d(axis(500.0, 1000.0));
        let merged = a.union(&b);
        assert_relative_eq!(merged.area(), a.area() + b.area());
        assert_eq!(merged.x, axis(0.0, 1000.0));
    }

    proptest! {
        #[test]
        fn split_x_always_conserves_area(min in -1.0e6_f64..0.0, width in 1.0_f64..1.0e6) {
            let max = min + width;
            let bounds = WorldBounds::new_1d(axis(min, max));
            let (left, right) = bounds.split_x();
            let total = left.area() + right.area();
            let rel_err = ((total - bounds.area()) / bounds.area()).abs();
            prop_assert!(rel_err <= 5e-3);
        }

        #[test]
        fn split_x_children_partition_with_no_gap(min in -1.0e6_f64..0.0, width in 2.0_f64..1.0e6) {
            let max = min + width;
            let bounds = WorldBounds::new_1d(axis(min, max));
            let (left, right) = bounds.split_x();
            prop_assert_eq!(left.x.max, right.x.min);
            prop_assert_eq!(left.x.min, bounds.x.min);
            prop_assert_eq!(right.x.max, bounds.x.max);
        }
    }
}
