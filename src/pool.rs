// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-capacity-per-generation node pool with a free-list, growing by
//! doubling.

use alloc::vec::Vec;

use crate::node::{Node, NodeIdx};

/// A growable arena of `Node<Item>` slots addressed by stable [`NodeIdx`]
/// indices.
///
/// Capacity doubles when the free-list is exhausted; existing indices are
/// never invalidated by growth, since growth only appends new slots.
#[derive(Clone, Debug)]
pub(crate) struct Pool<Item> {
    slots: Vec<Option<Node<Item>>>,
    free: Vec<NodeIdx>,
    capacity: usize,
}

impl<Item: Copy> Pool<Item> {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let slots = (0..capacity).map(|_| None).collect();
        let free = (0..capacity).rev().map(NodeIdx::new).collect();
        Self {
            slots,
            free,
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    fn grow(&mut self) {
        let old_capacity = self.capacity;
        let new_capacity = old_capacity * 2;
        self.slots.resize_with(new_capacity, || None);
        self.free
            .extend((old_capacity..new_capacity).rev().map(NodeIdx::new));
        self.capacity = new_capacity;
    }

    /// Allocate a slot holding `node`, growing the pool first if the
    /// free-list is empty.
    pub(crate) fn allocate(&mut self, node: Node<Item>) -> NodeIdx {
        if self.free.is_empty() {
            self.grow();
        }
        let idx = self.free.pop().expect("pool was just grown if empty");
        self.slots[idx.get()] = Some(node);
        idx
    }

    /// Return a slot to the free-list. The slot's contents become
    /// undefined until reallocated.
    pub(crate) fn free(&mut self, idx: NodeIdx) {
        self.slots[idx.get()] = None;
        self.free.push(idx);
    }

    pub(crate) fn get(&self, idx: NodeIdx) -> &Node<Item> {
        self.slots[idx.get()]
            .as_ref()
            .expect("NodeIdx must reference a currently allocated slot")
    }

    pub(crate) fn get_mut(&mut self, idx: NodeIdx) -> &mut Node<Item> {
        self.slots[idx.get()]
            .as_mut()
            .expect("NodeIdx must reference a currently allocated slot")
    }
}
