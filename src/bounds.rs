// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Axis-aligned bounding box algebra in 3D.
//!
//! `Bounds` is a pure, allocation-free value type: every operation produces a
//! new `Bounds` rather than mutating one in place. Floating-point semantics
//! are IEEE-754 single precision; callers must supply finite, non-negative
//! size bounds — no effort is made here to handle NaN or infinite inputs.

use glam::Vec3;

/// A 3D axis-aligned bounding box, stored as a center and a full size.
///
/// `min`/`max`/`extends` are derived on demand rather than stored, so a
/// `Bounds` is always internally consistent: there is no way to construct one
/// whose `min` and `max` disagree with its `center`/`size`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    /// Center of the box.
    pub center: Vec3,
    /// Full size along each axis (non-negative componentwise).
    pub size: Vec3,
}

impl Bounds {
    /// Construct a `Bounds` from a center and a full size.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if any component of `size` is negative. NaN
    /// and infinite inputs are not checked; behavior is undefined on them,
    /// per this crate's documented preconditions.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn new(center: Vec3, size: Vec3) -> Self {
        debug_assert!(
            size.x >= 0.0 && size.y >= 0.0 && size.z >= 0.0,
            "`size` must be non-negative componentwise (size = {size})"
        );
        Self { center, size }
    }

    /// Construct a `Bounds` from `min` and `max` corners.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `min` is not less than or equal to `max`
    /// componentwise.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        debug_assert!(
            min.x <= max.x && min.y <= max.y && min.z <= max.z,
            "`min` must be less than or equal to `max` componentwise (min = {min}, max = {max})"
        );
        Self::new((min + max) * 0.5, max - min)
    }

    /// Half of `size`.
    pub fn extends(self) -> Vec3 {
        self.size * 0.5
    }

    /// Lower corner, `center - extends`.
    pub fn min(self) -> Vec3 {
        self.center - self.extends()
    }

    /// Upper corner, `center + extends`.
    pub fn max(self) -> Vec3 {
        self.center + self.extends()
    }

    /// Smallest `Bounds` containing both `self` and `other`. Associative and
    /// commutative.
    pub fn union(self, other: Self) -> Self {
        Self::from_min_max(self.min().min(other.min()), self.max().max(other.max()))
    }

    /// True iff `self` contains `other` componentwise (`self.min <= other.min`
    /// and `other.max <= self.max`). Reflexive and transitive.
    pub fn contains(self, other: Self) -> bool {
        let (smin, smax) = (self.min(), self.max());
        let (omin, omax) = (other.min(), other.max());
        smin.x <= omin.x
            && smin.y <= omin.y
            && smin.z <= omin.z
            && omax.x <= smax.x
            && omax.y <= smax.y
            && omax.z <= smax.z
    }

    /// True unless some axis is strictly separated. Contact (equal
    /// boundaries) counts as overlap. Symmetric.
    pub fn overlaps(self, other: Self) -> bool {
        let (smin, smax) = (self.min(), self.max());
        let (omin, omax) = (other.min(), other.max());
        smin.x <= omax.x
            && omin.x <= smax.x
            && smin.y <= omax.y
            && omin.y <= smax.y
            && smin.z <= omax.z
            && omin.z <= smax.z
    }

    /// `2 * (sx*sy + sy*sz + sz*sx)`. The cost metric used for insertion
    /// descent.
    pub fn surface_area(self) -> f32 {
        let s = self.size;
        2.0 * (s.x * s.y + s.y * s.z + s.z * s.x)
    }

    /// Enlarge `self` around its own center by `factor` (1.0 is a no-op).
    /// Backs the optional loose-fit refit policy; never used by `bottom_up`,
    /// whose unions must stay exact.
    pub fn inflated(self, factor: f32) -> Self {
        if factor == 1.0 {
            self
        } else {
            Self::new(self.center, self.size * factor)
        }
    }
}
