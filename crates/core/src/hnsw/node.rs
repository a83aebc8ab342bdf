//! Graph nodes and their per-layer connection lists.
//!
//! A [`GraphNode`] owns one [`ConnectionLayer`] per layer it occupies, all behind
//! a single `parking_lot::Mutex`. Every method takes that lock for the duration
//! of one read or one mutation and never calls out while holding it, so no code
//! path can hold two node locks at once.

use crate::config::{CONNECTION_GROWTH_STEP, MAX_CONNECTIONS_PER_LAYER};
use crate::error::{HnswError, OutOfCapacity};
use parking_lot::Mutex;
use std::collections::TryReserveError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// A directed edge to a neighbor, annotated with its distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub neighbor_id: u64,
    pub distance: u64,
}

/// Distance-sorted, capacity-bounded neighbor list for one layer of one node.
#[derive(Debug, Clone)]
pub struct ConnectionLayer {
    capacity: usize,
    connections: Vec<Connection>,
}

impl ConnectionLayer {
    /// Allocate an empty layer. The buffer starts at one growth step and is grown on demand.
    pub fn new(capacity: usize) -> Result<Self, TryReserveError> {
        let capacity = capacity.min(MAX_CONNECTIONS_PER_LAYER);
        let mut connections = Vec::new();
        connections.try_reserve_exact(CONNECTION_GROWTH_STEP.min(capacity))?;
        Ok(Self {
            capacity,
            connections,
        })
    }

    /// Insert or refresh an edge, keeping the list sorted and within capacity.
    ///
    /// When the layer is full the new edge displaces the current worst only if its
    /// rank is below `rank_limit`; otherwise it is dropped with [`OutOfCapacity`].
    pub fn add_connection(
        &mut self,
        layer: usize,
        target_id: u64,
        distance: u64,
        rank_limit: usize,
    ) -> Result<(), OutOfCapacity> {
        if let Some(pos) = self
            .connections
            .iter()
            .position(|c| c.neighbor_id == target_id)
        {
            if distance < self.connections[pos].distance {
                self.connections.remove(pos);
                let at = self.rank_of(distance);
                self.connections.insert(
                    at,
                    Connection {
                        neighbor_id: target_id,
                        distance,
                    },
                );
            }
            return Ok(());
        }

        let rank = self.rank_of(distance);
        if self.connections.len() >= self.capacity {
            if rank >= rank_limit.min(self.capacity) {
                return Err(OutOfCapacity { layer });
            }
            self.connections.pop();
        } else if self.connections.len() == self.connections.capacity() {
            let step = CONNECTION_GROWTH_STEP.min(self.capacity - self.connections.len());
            self.connections
                .try_reserve_exact(step)
                .map_err(|_| OutOfCapacity { layer })?;
        }

        self.connections.insert(
            rank,
            Connection {
                neighbor_id: target_id,
                distance,
            },
        );
        Ok(())
    }

    #[inline]
    fn rank_of(&self, distance: u64) -> usize {
        self.connections.partition_point(|c| c.distance <= distance)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn contains(&self, neighbor_id: u64) -> bool {
        self.connections.iter().any(|c| c.neighbor_id == neighbor_id)
    }

    pub fn as_slice(&self) -> &[Connection] {
        &self.connections
    }
}

/// A vector's position in the HNSW graph.
#[derive(Debug)]
pub struct GraphNode {
    vector_id: u64,
    layer_count: usize,
    created_at: Instant,
    access_count: AtomicU64,
    update_count: AtomicU64,
    deleted: AtomicBool,
    layers: Mutex<Vec<ConnectionLayer>>,
}

impl GraphNode {
    /// Allocate a node occupying layers `0..=level`.
    ///
    /// Layer 0 gets `m_max0` slots, every other layer `m`.
    pub fn new(vector_id: u64, level: usize, m: usize, m_max0: usize) -> Result<Self, HnswError> {
        let layer_count = level + 1;
        let mut layers = Vec::new();
        layers
            .try_reserve_exact(layer_count)
            .map_err(|_| HnswError::OutOfMemory("node layer table"))?;
        for layer in 0..layer_count {
            let capacity = if layer == 0 { m_max0 } else { m };
            let connections = ConnectionLayer::new(capacity)
                .map_err(|_| HnswError::OutOfMemory("connection layer"))?;
            layers.push(connections);
        }
        Ok(Self {
            vector_id,
            layer_count,
            created_at: Instant::now(),
            access_count: AtomicU64::new(0),
            update_count: AtomicU64::new(0),
            deleted: AtomicBool::new(false),
            layers: Mutex::new(layers),
        })
    }

    pub fn vector_id(&self) -> u64 {
        self.vector_id
    }

    /// Number of layers this node occupies (assigned level + 1).
    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    /// Highest layer this node occupies.
    pub fn level(&self) -> usize {
        self.layer_count - 1
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Number of times this node's neighbor lists have been read.
    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }

    /// Number of edges successfully added or refreshed on this node.
    pub fn update_count(&self) -> u64 {
        self.update_count.load(Ordering::Relaxed)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Tombstone the node. Returns `false` if it was already tombstoned.
    pub fn mark_deleted(&self) -> bool {
        !self.deleted.swap(true, Ordering::AcqRel)
    }

    /// Add an edge from this node at `layer`, under this node's lock only.
    pub fn add_connection(
        &self,
        layer: usize,
        target_id: u64,
        distance: u64,
        rank_limit: usize,
    ) -> Result<(), OutOfCapacity> {
        let mut layers = self.layers.lock();
        let connections = layers.get_mut(layer).ok_or(OutOfCapacity { layer })?;
        connections.add_connection(layer, target_id, distance, rank_limit)?;
        self.update_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Copy out the neighbor ids at `layer`. Empty if the node does not reach that layer.
    pub fn neighbors(&self, layer: usize) -> Vec<u64> {
        self.access_count.fetch_add(1, Ordering::Relaxed);
        let layers = self.layers.lock();
        layers
            .get(layer)
            .map(|l| l.as_slice().iter().map(|c| c.neighbor_id).collect())
            .unwrap_or_default()
    }

    /// Copy out the full edge list at `layer`.
    pub fn connections(&self, layer: usize) -> Vec<Connection> {
        let layers = self.layers.lock();
        layers
            .get(layer)
            .map(|l| l.as_slice().to_vec())
            .unwrap_or_default()
    }

    /// Check the per-layer invariants: count, capacity, order, uniqueness, no self loops.
    pub fn check_layers(&self) -> Result<(), String> {
        let layers = self.layers.lock();
        if layers.len() != self.layer_count {
            return Err(format!(
                "node {} has {} connection layers, expected {}",
                self.vector_id,
                layers.len(),
                self.layer_count
            ));
        }
        for (layer, connections) in layers.iter().enumerate() {
            let edges = connections.as_slice();
            if edges.len() > connections.capacity() {
                return Err(format!(
                    "node {} layer {} holds {} connections, capacity {}",
                    self.vector_id,
                    layer,
                    edges.len(),
                    connections.capacity()
                ));
            }
            if edges.windows(2).any(|w| w[0].distance > w[1].distance) {
                return Err(format!(
                    "node {} layer {} is not sorted by distance",
                    self.vector_id, layer
                ));
            }
            for (i, edge) in edges.iter().enumerate() {
                if edge.neighbor_id == self.vector_id {
                    return Err(format!("node {} layer {} links to itself", self.vector_id, layer));
                }
                if edges[..i].iter().any(|e| e.neighbor_id == edge.neighbor_id) {
                    return Err(format!(
                        "node {} layer {} repeats neighbor {}",
                        self.vector_id, layer, edge.neighbor_id
                    ));
                }
            }
        }
        Ok(())
    }
}
