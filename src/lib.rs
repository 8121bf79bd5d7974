// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A dynamic bounding volume hierarchy (BVH) for 3D spatial indexing.
//!
//! [`Bvh`] stores a mutable collection of axis-aligned bounding boxes,
//! each tagged with an opaque application identifier (`Item`), and
//! supports:
//!
//! - Incremental [`Bvh::insert`] via greedy surface-area-heuristic descent.
//! - O(1) [`Bvh::remove`] via an item → leaf index, with no refit required.
//! - [`Bvh::update`] (move), defined as remove then insert.
//! - Predicate-guided [`Bvh::traversal`] for ray casts, frustum culling and
//!   overlap queries — the BVH never interprets geometry itself, it only
//!   exposes bounds to a caller-supplied predicate.
//! - [`Bvh::bottom_up`]: a bulk rebuild that sorts leaves by the
//!   [`morton`] code of their centroid and pairwise-merges them into a
//!   fresh, tightly-fit tree.
//!
//! The tree does not rebalance itself on incremental edits (no rotations);
//! [`Bvh::bottom_up`] is the intended remedy for degraded tree quality after
//! a long run of adversarial insertions. The BVH is synchronous,
//! single-threaded, and holds no file-backed state.
//!
//! # Example
//!
//! ```rust
//! use bvh3d::{Bounds, Bvh};
//! use glam::Vec3;
//!
//! let mut bvh: Bvh<u32> = Bvh::new(16);
//! bvh.insert(1, Bounds::new(Vec3::ZERO, Vec3::ONE));
//! bvh.insert(2, Bounds::new(Vec3::new(10.0, 0.0, 0.0), Vec3::ONE));
//!
//! let mut hits = Vec::new();
//! bvh.traversal(|_| true, |item| hits.push(item));
//! assert_eq!(hits.len(), 2);
//!
//! assert!(bvh.remove(&1));
//! assert_eq!(bvh.len(), 1);
//! ```
//!
//! ### Float semantics
//!
//! This crate assumes finite, non-negative-size bounds. Debug builds assert
//! on malformed `Bounds`; there is no NaN/infinity handling.

// `std` is available under `cfg(test)` so unit tests can use `rand`'s
// thread-local RNG; production builds stay `no_std`.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod bounds;
mod bvh;
mod item_index;
mod morton;
mod node;
mod pool;

pub use bounds::Bounds;
pub use bvh::Bvh;
pub use morton::{map_vector3, morton3};
