// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Morton (Z-order) encoding used by [`crate::Bvh::bottom_up`] to order
//! leaves before the bulk pairwise merge.

use glam::Vec3;

/// Affine remap of a scalar from `[min, max]` to `[to_low, to_high]`.
fn map_scalar(v: f32, min: f32, max: f32, to_low: f32, to_high: f32) -> f32 {
    ((v - min) / (max - min)) * (to_high - to_low) + to_low
}

/// Affine remap of a point from the box `[from_min, from_max]` to
/// `[to_low, to_high]` componentwise. Used to normalize centroids into the
/// unit cube before [`morton3`] encodes them.
pub fn map_vector3(v: Vec3, from_min: Vec3, from_max: Vec3, to_low: f32, to_high: f32) -> Vec3 {
    Vec3::new(
        map_scalar(v.x, from_min.x, from_max.x, to_low, to_high),
        map_scalar(v.y, from_min.y, from_max.y, to_low, to_high),
        map_scalar(v.z, from_min.z, from_max.z, to_low, to_high),
    )
}

/// Insert two zero bits after each of the low 10 bits of `v`.
///
/// Standard bit-twiddling cascade: scales a 10-bit value out to span 30 bits
/// with two zero bits between every original bit, so three such expansions
/// can be interleaved with shifts of 0/1/2 to produce a Z-order key.
fn expand_bits(v: u32) -> u32 {
    let mut v = v & 0x0000_03ff;
    v = (v.wrapping_mul(0x0001_0001)) & 0xff00_00ff;
    v = (v.wrapping_mul(0x0000_0101)) & 0x0f00_f00f;
    v = (v.wrapping_mul(0x0000_0011)) & 0xc30c_30c3;
    v = (v.wrapping_mul(0x0000_0005)) & 0x4924_9249;
    v
}

/// Map a point in the unit cube `[0, 1]^3` to a 30-bit Morton (Z-order) key
/// by interleaving the top 10 bits of each coordinate.
///
/// Each coordinate is scaled by 1024 and clamped to `[0, 1023]` before
/// interleaving.
#[allow(
    clippy::cast_possible_truncation,
    reason = "scale clamps to [0, 1023] first, so the cast to u32 never truncates a meaningful bit."
)]
pub fn morton3(v: Vec3) -> u32 {
    let scale = |c: f32| (c * 1024.0).clamp(0.0, 1023.0) as u32;
    let x = expand_bits(scale(v.x));
    let y = expand_bits(scale(v.y));
    let z = expand_bits(scale(v.z));
    (x << 2) | (y << 1) | z
}
