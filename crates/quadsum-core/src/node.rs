//! Quadtree nodes: the shared, atomically updated form used while building
//! and the plain snapshot handed back to the caller.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::arena::ArenaSlot;
use crate::atomic::AtomicF32;
use crate::{Point, PyramidCell};

/// Child link sentinel.
pub(crate) const NO_CHILD: u32 = u32::MAX;

/// Structural state of a quadtree node. Transitions are monotonic:
/// `Empty -> Leaf -> Internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum NodeKind {
    Empty = 0,
    Leaf = 1,
    Internal = 2,
}

impl NodeKind {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Leaf,
            2 => Self::Internal,
            _ => Self::Empty,
        }
    }
}

/// Test-and-test-and-set spin lock.
#[derive(Debug, Default)]
pub(crate) struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    #[inline]
    pub(crate) fn lock(&self) -> SpinGuard<'_> {
        if self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            self.lock_slow();
        }
        SpinGuard { lock: self }
    }

    #[cold]
    fn lock_slow(&self) {
        loop {
            while self.locked.load(Ordering::Relaxed) {
                std::hint::spin_loop();
            }
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

/// Releases the lock when dropped, including on early returns with an error.
pub(crate) struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

/// A node as it lives in the arena during a build.
///
/// `kind` and `children` are only written under `lock`. The aggregate is
/// written under the lock while the node is `Empty` or `Leaf` and with atomic
/// adds once it is `Internal`. Children are linked before `kind` is stored as
/// `Internal` with release ordering; readers load `kind` with acquire ordering
/// before following a link.
#[derive(Debug)]
pub(crate) struct QuadNode {
    lock: SpinLock,
    kind: AtomicU8,
    count: AtomicU32,
    sum_x: AtomicF32,
    sum_y: AtomicF32,
    sum_w: AtomicF32,
    children: [AtomicU32; 4],
}

impl Default for QuadNode {
    fn default() -> Self {
        Self {
            lock: SpinLock::default(),
            kind: AtomicU8::new(NodeKind::Empty as u8),
            count: AtomicU32::new(0),
            sum_x: AtomicF32::zero(),
            sum_y: AtomicF32::zero(),
            sum_w: AtomicF32::zero(),
            children: std::array::from_fn(|_| AtomicU32::new(NO_CHILD)),
        }
    }
}

impl ArenaSlot for QuadNode {
    fn reset(&self) {
        debug_assert!(!self.lock.is_locked());
        self.kind.store(NodeKind::Empty as u8, Ordering::Relaxed);
        self.store_value(PyramidCell::default());
        for child in &self.children {
            child.store(NO_CHILD, Ordering::Relaxed);
        }
    }
}

impl QuadNode {
    #[inline]
    pub(crate) fn lock(&self) -> SpinGuard<'_> {
        self.lock.lock()
    }

    #[inline]
    pub(crate) fn kind(&self) -> NodeKind {
        NodeKind::from_u8(self.kind.load(Ordering::Acquire))
    }

    /// Make a new state visible. Everything written before this call is
    /// visible to any thread that observes the new kind.
    #[inline]
    pub(crate) fn publish(&self, kind: NodeKind) {
        self.kind.store(kind as u8, Ordering::Release);
    }

    #[inline]
    pub(crate) fn child(&self, quadrant: usize) -> u32 {
        self.children[quadrant].load(Ordering::Relaxed)
    }

    /// Link four consecutive arena slots starting at `base` as children.
    pub(crate) fn link_children(&self, base: u32) {
        for (quadrant, child) in self.children.iter().enumerate() {
            child.store(base + quadrant as u32, Ordering::Relaxed);
        }
    }

    pub(crate) fn value(&self) -> PyramidCell {
        PyramidCell {
            sum_x: self.sum_x.load(Ordering::Relaxed),
            sum_y: self.sum_y.load(Ordering::Relaxed),
            sum_w: self.sum_w.load(Ordering::Relaxed),
            count: self.count.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn store_value(&self, value: PyramidCell) {
        self.sum_x.store(value.sum_x, Ordering::Relaxed);
        self.sum_y.store(value.sum_y, Ordering::Relaxed);
        self.sum_w.store(value.sum_w, Ordering::Relaxed);
        self.count.store(value.count, Ordering::Relaxed);
    }

    /// Component-wise atomic add of `point` into the aggregate.
    #[inline]
    pub(crate) fn accumulate(&self, point: &Point) {
        self.sum_x.fetch_add(point.x, Ordering::Relaxed);
        self.sum_y.fetch_add(point.y, Ordering::Relaxed);
        self.sum_w.fetch_add(point.w, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> NodeSnapshot {
        let value = self.value();
        NodeSnapshot {
            kind: self.kind(),
            count: value.count,
            sum_x: value.sum_x,
            sum_y: value.sum_y,
            sum_w: value.sum_w,
            children: std::array::from_fn(|q| {
                let child = self.child(q);
                (child != NO_CHILD).then_some(child)
            }),
        }
    }
}

/// Plain copy of a quadtree node, read out after the build completed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub kind: NodeKind,
    pub count: u32,
    pub sum_x: f32,
    pub sum_y: f32,
    pub sum_w: f32,
    /// Arena indices of the children in quadrant order, `None` when absent.
    pub children: [Option<u32>; 4],
}

impl NodeSnapshot {
    pub fn value(&self) -> PyramidCell {
        PyramidCell::new(self.sum_x, self.sum_y, self.sum_w, self.count)
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    pub fn is_internal(&self) -> bool {
        self.kind == NodeKind::Internal
    }
}

/// The finished quadtree: every node allocated during the build, root first.
#[derive(Debug, Clone, Serialize)]
pub struct NodePool {
    nodes: Vec<NodeSnapshot>,
    capacity: usize,
    max_depth: u32,
}

impl NodePool {
    pub(crate) fn new(nodes: Vec<NodeSnapshot>, capacity: usize, max_depth: u32) -> Self {
        Self {
            nodes,
            capacity,
            max_depth,
        }
    }

    /// The root node. Always present.
    pub fn root(&self) -> &NodeSnapshot {
        &self.nodes[0]
    }

    pub fn get(&self, index: u32) -> Option<&NodeSnapshot> {
        self.nodes.get(index as usize)
    }

    pub fn nodes(&self) -> &[NodeSnapshot] {
        &self.nodes
    }

    /// Number of nodes allocated during the build, root included.
    pub fn used_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Present children of `node`, with their quadrant.
    pub fn children<'a>(
        &'a self,
        node: &'a NodeSnapshot,
    ) -> impl Iterator<Item = (usize, &'a NodeSnapshot)> + 'a {
        node.children
            .iter()
            .enumerate()
            .filter_map(move |(q, &child)| child.and_then(|index| self.get(index)).map(|n| (q, n)))
    }

    /// Every `Leaf` node.
    pub fn leaves(&self) -> impl Iterator<Item = &NodeSnapshot> + '_ {
        self.nodes.iter().filter(|node| node.is_leaf())
    }

    /// Depth of the deepest non-empty node, root being depth 0.
    pub fn depth_reached(&self) -> u32 {
        let mut deepest = 0;
        let mut stack = vec![(0u32, 0u32)];
        while let Some((index, depth)) = stack.pop() {
            let Some(node) = self.get(index) else {
                continue;
            };
            if node.kind != NodeKind::Empty {
                deepest = deepest.max(depth);
            }
            stack.extend(node.children.iter().flatten().map(|&child| (child, depth + 1)));
        }
        deepest
    }
}
