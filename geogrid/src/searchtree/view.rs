/*
* Licensed to Elasticsearch B.V. under one or more contributor
* license agreements. See the NOTICE file distributed with
* this work for additional information regarding copyright
* ownership. Elasticsearch B.V. licenses this file to you under
* the Apache License, Version 2.0 (the "License"); you may
* not use this file except in compliance with the License.
* You may obtain a copy of the License at
*
*  http://www.apache.org/licenses/LICENSE-2.0
*
* Unless required by applicable law or agreed to in writing,
* software distributed under the License is distributed on an
* "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
* KIND, either express or implied.  See the License for the
* specific language governing permissions and limitations
* under the License.
*/

//! Borrowed views of flat k-d trees and the queries that run over them.
//!
//! Everything here works on plain slices so owned trees and trees read in place out of a
//! memory map answer queries with the same code. A forest is just a list of views; a
//! candidate remembers which view it came from.

use super::node::KdNode;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Deepest tree we accept from outside. Median splits on `u32` node counts stay far below.
pub(crate) const MAX_DEPTH: usize = 96;

/// A k-d tree as slices: nodes in pre-order, then per point slot its coordinates and
/// insertion sequence number.
#[derive(Copy, Clone, Debug)]
pub struct TreeView<'a, const D: usize> {
    pub(crate) nodes: &'a [KdNode],
    pub(crate) coords: &'a [[f64; D]],
    pub(crate) seqs: &'a [u64],
}

/// A point slot found by a query. Ordered by distance, then by insertion order.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Candidate {
    pub(crate) dist2: f64,
    pub(crate) seq: u64,
    pub(crate) tree: usize,
    pub(crate) slot: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Candidate) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Candidate) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Candidate) -> Ordering {
        self.dist2
            .total_cmp(&other.dist2)
            .then(self.seq.cmp(&other.seq))
    }
}

#[inline]
pub(crate) fn squared_distance<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    let mut total = 0.0;
    for i in 0..D {
        let d = a[i] - b[i];
        total += d * d;
    }
    total
}

impl<'a, const D: usize> TreeView<'a, D> {
    pub(crate) fn new(nodes: &'a [KdNode], coords: &'a [[f64; D]], seqs: &'a [u64]) -> Self {
        TreeView {
            nodes,
            coords,
            seqs,
        }
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    ///
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Coordinates held in `slot`.
    pub fn point(&self, slot: usize) -> &'a [f64; D] {
        &self.coords[slot]
    }

    /// Walks the whole structure and reports the first inconsistency. Trees that pass can be
    /// queried without going out of bounds or recursing forever.
    pub(crate) fn check(&self) -> Result<(), String> {
        if self.coords.len() != self.seqs.len() {
            return Err(format!(
                "{} coordinates but {} sequence numbers",
                self.coords.len(),
                self.seqs.len()
            ));
        }
        if self.nodes.is_empty() {
            return if self.coords.is_empty() {
                Ok(())
            } else {
                Err("points without nodes".to_string())
            };
        }
        let mut seen = 0usize;
        let mut stack: Vec<(usize, u64, u64, usize)> = vec![(0, 0, self.coords.len() as u64, 0)];
        while let Some((index, start, end, depth)) = stack.pop() {
            let node = self
                .nodes
                .get(index)
                .ok_or_else(|| format!("node {} is out of range", index))?;
            if node.start != start || node.end != end || start > end {
                return Err(format!(
                    "node {} covers [{}, {}), expected [{}, {})",
                    index, node.start, node.end, start, end
                ));
            }
            if depth > MAX_DEPTH {
                return Err(format!("node {} is deeper than {}", index, MAX_DEPTH));
            }
            seen += 1;
            if node.is_leaf() {
                continue;
            }
            if node.axis as usize >= D {
                return Err(format!("node {} splits on axis {}", index, node.axis));
            }
            let left = index + 1;
            let right = node.right as usize;
            if right <= left {
                return Err(format!("node {} has right child {}", index, right));
            }
            let left_end = self
                .nodes
                .get(left)
                .ok_or_else(|| format!("node {} has no left child", index))?
                .end;
            if left_end > end {
                return Err(format!("node {} has an oversized left child", index));
            }
            stack.push((right, left_end, end, depth + 1));
            stack.push((left, start, left_end, depth + 1));
        }
        if seen != self.nodes.len() {
            return Err(format!(
                "{} of {} nodes are reachable from the root",
                seen,
                self.nodes.len()
            ));
        }
        Ok(())
    }

    fn candidate(&self, query: &[f64; D], tree: usize, slot: usize) -> Candidate {
        Candidate {
            dist2: squared_distance(&self.coords[slot], query),
            seq: self.seqs[slot],
            tree,
            slot,
        }
    }

    #[inline]
    fn children(&self, index: usize, query: &[f64; D]) -> (usize, usize, f64) {
        let node = &self.nodes[index];
        let diff = query[node.axis as usize] - node.split;
        if diff < 0.0 {
            (index + 1, node.right as usize, diff * diff)
        } else {
            (node.right as usize, index + 1, diff * diff)
        }
    }

    fn nearest_from(
        &self,
        index: usize,
        query: &[f64; D],
        tree: usize,
        best: &mut Option<Candidate>,
    ) {
        let node = &self.nodes[index];
        if node.is_leaf() {
            for slot in node.start as usize..node.end as usize {
                let c = self.candidate(query, tree, slot);
                if best.map_or(true, |b| c < b) {
                    *best = Some(c);
                }
            }
            return;
        }
        let (near, far, plane) = self.children(index, query);
        self.nearest_from(near, query, tree, best);
        // Equal distances still have to be looked at, an older point may sit on the plane.
        if best.map_or(true, |b| plane <= b.dist2) {
            self.nearest_from(far, query, tree, best);
        }
    }

    fn k_nearest_from(
        &self,
        index: usize,
        query: &[f64; D],
        tree: usize,
        k: usize,
        heap: &mut BinaryHeap<Candidate>,
    ) {
        let node = &self.nodes[index];
        if node.is_leaf() {
            for slot in node.start as usize..node.end as usize {
                let c = self.candidate(query, tree, slot);
                if heap.len() < k {
                    heap.push(c);
                } else if heap.peek().map_or(false, |worst| c < *worst) {
                    heap.pop();
                    heap.push(c);
                }
            }
            return;
        }
        let (near, far, plane) = self.children(index, query);
        self.k_nearest_from(near, query, tree, k, heap);
        if heap.len() < k || heap.peek().map_or(true, |worst| plane <= worst.dist2) {
            self.k_nearest_from(far, query, tree, k, heap);
        }
    }

    fn within_from(
        &self,
        index: usize,
        query: &[f64; D],
        tree: usize,
        radius2: f64,
        found: &mut Vec<Candidate>,
    ) {
        let node = &self.nodes[index];
        if node.is_leaf() {
            for slot in node.start as usize..node.end as usize {
                let c = self.candidate(query, tree, slot);
                if c.dist2 <= radius2 {
                    found.push(c);
                }
            }
            return;
        }
        let (near, far, plane) = self.children(index, query);
        self.within_from(near, query, tree, radius2, found);
        if plane <= radius2 {
            self.within_from(far, query, tree, radius2, found);
        }
    }
}

/// Views of every tree in a forest. Forests stay logarithmic in size, so this rarely spills.
pub(crate) type Forest<'a, const D: usize> = SmallVec<[TreeView<'a, D>; 16]>;

/// The closest slot over all views, ties going to the lowest sequence number.
pub(crate) fn nearest<const D: usize>(forest: &[TreeView<D>], query: &[f64; D]) -> Option<Candidate> {
    let mut best = None;
    for (tree, view) in forest.iter().enumerate() {
        if !view.nodes.is_empty() {
            view.nearest_from(0, query, tree, &mut best);
        }
    }
    best
}

/// The `k` closest slots, sorted.
pub(crate) fn k_nearest<const D: usize>(
    forest: &[TreeView<D>],
    query: &[f64; D],
    k: usize,
) -> Vec<Candidate> {
    if k == 0 {
        return Vec::new();
    }
    let mut heap = BinaryHeap::with_capacity(k + 1);
    for (tree, view) in forest.iter().enumerate() {
        if !view.nodes.is_empty() {
            view.k_nearest_from(0, query, tree, k, &mut heap);
        }
    }
    heap.into_sorted_vec()
}

/// Every slot within `radius` of the query, sorted.
pub(crate) fn within<const D: usize>(
    forest: &[TreeView<D>],
    query: &[f64; D],
    radius: f64,
) -> Vec<Candidate> {
    let mut found = Vec::new();
    if radius.is_nan() || radius < 0.0 {
        return found;
    }
    let radius2 = radius * radius;
    for (tree, view) in forest.iter().enumerate() {
        if !view.nodes.is_empty() {
            view.within_from(0, query, tree, radius2, &mut found);
        }
    }
    found.sort_unstable();
    found
}
