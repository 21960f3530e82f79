//! Concurrent quadtree builder.
//!
//! Every point is inserted independently on the worker pool. The tree grows
//! only where points fall: an `Empty` node is claimed as a `Leaf`, and a `Leaf`
//! that receives a second point is split into four children taken from the
//! [`Arena`]. At the deepest allowed level leaves stop splitting and merge
//! further points instead.
//!
//! A node's lock is held only while it is claimed, merged into or split.
//! `Internal` nodes are final structurally, so points pass through them with
//! atomic adds and no locking.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::addressing::{descend, quadrant};
use crate::arena::Arena;
use crate::engine::{Engine, Workload};
use crate::node::{NodeKind, NodePool, QuadNode};
use crate::timing::{Phase, Timeline};
use crate::{BoundingBox, EngineConfig, Point, PyramidCell, Result, WorkerPool};

const ROOT: u32 = 0;

/// One build: the arena plus the parameters every insertion shares.
struct ConcurrentTree {
    arena: Arena<QuadNode>,
    bbox: BoundingBox,
    max_depth: u32,
}

impl ConcurrentTree {
    fn new(capacity: usize, bbox: BoundingBox, max_depth: u32) -> Self {
        Self {
            // Slot 0 is the root.
            arena: Arena::new(capacity, 1),
            bbox,
            max_depth,
        }
    }

    fn insert(&self, point: &Point) -> Result<()> {
        let mut index = ROOT;
        let mut bounds = self.bbox;
        let mut depth = 0;

        loop {
            let node = self.arena.get(index as usize);
            let mut accumulated = false;

            if node.kind() != NodeKind::Internal {
                let _guard = node.lock();
                match node.kind() {
                    NodeKind::Empty => {
                        node.store_value(PyramidCell::from_point(point));
                        node.publish(NodeKind::Leaf);
                        return Ok(());
                    }
                    NodeKind::Leaf if depth + 1 >= self.max_depth => {
                        node.accumulate(point);
                        return Ok(());
                    }
                    NodeKind::Leaf => {
                        self.split(node, &bounds)?;
                        node.accumulate(point);
                        node.publish(NodeKind::Internal);
                        accumulated = true;
                    }
                    // Split by another thread while we waited for the lock.
                    NodeKind::Internal => {}
                }
            }

            if !accumulated {
                node.accumulate(point);
            }
            let (q, child_bounds) = descend(&bounds, point);
            index = node.child(q);
            bounds = child_bounds;
            depth += 1;
        }
    }

    /// Give a locked `Leaf` four children and move its resident point into
    /// the matching one. The node keeps its aggregate, which now equals the
    /// sum of its children. The caller publishes it as `Internal`.
    fn split(&self, node: &QuadNode, bounds: &BoundingBox) -> Result<()> {
        let base = self.arena.allocate_four()?;
        let resident = node.value();
        // Leaves above the deepest level never hold more than one point.
        debug_assert_eq!(resident.count, 1);

        let child = self.arena.get(base + quadrant(bounds, resident.sum_x, resident.sum_y));
        child.store_value(resident);
        child.publish(NodeKind::Leaf);

        node.link_children(base as u32);
        Ok(())
    }

    fn read_out(&self) -> NodePool {
        let nodes = self.arena.allocated().iter().map(QuadNode::snapshot).collect();
        NodePool::new(nodes, self.arena.capacity(), self.max_depth)
    }
}

/// Builds a [`NodePool`] by concurrent insertion on a worker pool.
#[derive(Debug, Clone)]
pub struct QuadtreeBuilder {
    pool: Arc<WorkerPool>,
    config: EngineConfig,
}

impl QuadtreeBuilder {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self::with_pool(WorkerPool::from_config(config)?, config.clone()))
    }

    /// Share an existing pool.
    pub fn with_pool(pool: Arc<WorkerPool>, config: EngineConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Engine for QuadtreeBuilder {
    type Output = NodePool;

    fn name(&self) -> &'static str {
        "quadtree"
    }

    fn build(&self, workload: &Workload<'_>, timeline: &mut Timeline) -> Result<NodePool> {
        let depth = workload.max_depth();
        let capacity = self.config.arena_capacity(depth);

        let tree = self.pool.run_phase(timeline, Phase::Clear, || {
            ConcurrentTree::new(capacity, *workload.bbox(), depth)
        });

        self.pool
            .run_phase(timeline, Phase::Insert, || {
                workload
                    .points()
                    .par_iter()
                    .try_for_each(|point| tree.insert(point))
            })
            .map_err(|e| {
                warn!(depth, capacity, error = %e, "Quadtree build aborted");
                e
            })?;

        let nodes = timeline.record(Phase::Readout, || tree.read_out());
        info!(
            depth,
            capacity,
            used = nodes.used_count(),
            count = nodes.root().count,
            "Quadtree built"
        );
        Ok(nodes)
    }
}
