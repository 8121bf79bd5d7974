// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Basic usage of bvh3d: insert, remove, traversal and a bottom-up rebuild.

use bvh3d::{Bounds, Bvh};
use glam::Vec3;

fn main() {
    let mut bvh: Bvh<u32> = Bvh::new(16);
    bvh.insert(1, Bounds::new(Vec3::ZERO, Vec3::ONE));
    bvh.insert(2, Bounds::new(Vec3::new(10.0, 0.0, 0.0), Vec3::ONE));
    bvh.insert(3, Bounds::new(Vec3::new(0.1, 0.0, 0.0), Vec3::ONE));

    let mut hits = Vec::new();
    bvh.traversal(|_| true, |item| hits.push(item));
    println!("all items: {hits:?}");

    bvh.update(2, Bounds::new(Vec3::new(20.0, 0.0, 0.0), Vec3::ONE));
    bvh.bottom_up();

    let mut near_origin = Vec::new();
    bvh.traversal(
        |b| b.overlaps(Bounds::new(Vec3::ZERO, Vec3::splat(5.0))),
        |item| near_origin.push(item),
    );
    println!("near origin: {near_origin:?}");

    bvh.remove(&1);
    println!("remaining: {}", bvh.len());
}
