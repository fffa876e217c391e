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

//! The search tree itself: a forest of static k-d trees kept in the logarithmic method.
//!
//! Bulk builds produce a single tree. Each insert makes a one point tree and then merges
//! it with every tree at the tail of the forest that is no larger, rebuilding the merged
//! points in one go. Tree sizes at least double going towards the front, so there are at
//! most `log2(n) + 1` trees and an insert costs amortised `O(log² n)`.

use super::node::{KdNode, Payload};
use super::view::{self, Candidate, Forest, TreeView};
use crate::errors::{GeogridError, GeogridResult};
use rayon::prelude::*;
use std::mem;

/// Points per leaf when nothing else is asked for.
pub const DEFAULT_LEAF_SIZE: usize = 16;

/// A query answer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Neighbour<const D: usize, P: Payload = usize> {
    /// Where the stored point is
    pub point: [f64; D],
    /// What was stored with it
    pub payload: P,
    /// Euclidean distance from the query
    pub distance: f64,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct Item<const D: usize, P> {
    pub(crate) point: [f64; D],
    pub(crate) payload: P,
    pub(crate) seq: u64,
}

/// One static k-d tree. The four vectors are parallel over point slots except `nodes`.
#[derive(Clone, Debug)]
pub(crate) struct StaticTree<const D: usize, P> {
    pub(crate) nodes: Vec<KdNode>,
    pub(crate) coords: Vec<[f64; D]>,
    pub(crate) payloads: Vec<P>,
    pub(crate) seqs: Vec<u64>,
}

impl<const D: usize, P> Default for StaticTree<D, P> {
    fn default() -> Self {
        StaticTree {
            nodes: Vec::new(),
            coords: Vec::new(),
            payloads: Vec::new(),
            seqs: Vec::new(),
        }
    }
}

impl<const D: usize, P: Payload> StaticTree<D, P> {
    pub(crate) fn build(mut items: Vec<Item<D, P>>, leaf_size: usize) -> Self {
        let mut nodes = Vec::with_capacity(2 * items.len() / leaf_size.max(1) + 1);
        if !items.is_empty() {
            split(&mut items, 0, leaf_size.max(1), &mut nodes);
        }
        let mut coords = Vec::with_capacity(items.len());
        let mut payloads = Vec::with_capacity(items.len());
        let mut seqs = Vec::with_capacity(items.len());
        for item in items {
            coords.push(item.point);
            payloads.push(item.payload);
            seqs.push(item.seq);
        }
        StaticTree {
            nodes,
            coords,
            payloads,
            seqs,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.coords.len()
    }

    pub(crate) fn view(&self) -> TreeView<'_, D> {
        TreeView::new(&self.nodes, &self.coords, &self.seqs)
    }

    pub(crate) fn footprint(&self) -> usize {
        self.nodes.capacity() * mem::size_of::<KdNode>()
            + self.coords.capacity() * mem::size_of::<[f64; D]>()
            + self.payloads.capacity() * mem::size_of::<P>()
            + self.seqs.capacity() * mem::size_of::<u64>()
    }

    pub(crate) fn into_items(self) -> impl Iterator<Item = Item<D, P>> {
        self.coords
            .into_iter()
            .zip(self.payloads)
            .zip(self.seqs)
            .map(|((point, payload), seq)| Item {
                point,
                payload,
                seq,
            })
    }

    pub(crate) fn items(&self) -> impl Iterator<Item = Item<D, P>> + '_ {
        self.coords
            .iter()
            .zip(self.payloads.iter())
            .zip(self.seqs.iter())
            .map(|((point, payload), seq)| Item {
                point: *point,
                payload: *payload,
                seq: *seq,
            })
    }
}

/// Recursive median split of `items[..]`, whose first slot is `offset`. Everything left of
/// the median is `<=` the split value on the chosen axis, everything right of it `>=`.
fn split<const D: usize, P>(
    items: &mut [Item<D, P>],
    offset: usize,
    leaf_size: usize,
    nodes: &mut Vec<KdNode>,
) {
    if items.len() <= leaf_size {
        nodes.push(KdNode::leaf(offset, offset + items.len()));
        return;
    }
    let axis = widest_axis(items);
    let mid = items.len() / 2;
    items.select_nth_unstable_by(mid, |a, b| {
        a.point[axis]
            .total_cmp(&b.point[axis])
            .then(a.seq.cmp(&b.seq))
    });
    let index = nodes.len();
    nodes.push(KdNode {
        split: items[mid].point[axis],
        start: offset as u64,
        end: (offset + items.len()) as u64,
        right: 0,
        axis: axis as u32,
    });
    let (left, right) = items.split_at_mut(mid);
    split(left, offset, leaf_size, nodes);
    nodes[index].right = nodes.len() as u32;
    split(right, offset + mid, leaf_size, nodes);
}

fn widest_axis<const D: usize, P>(items: &[Item<D, P>]) -> usize {
    let mut lo = [f64::INFINITY; D];
    let mut hi = [f64::NEG_INFINITY; D];
    for item in items {
        for d in 0..D {
            lo[d] = lo[d].min(item.point[d]);
            hi[d] = hi[d].max(item.point[d]);
        }
    }
    let mut axis = 0;
    let mut widest = f64::NEG_INFINITY;
    for d in 0..D {
        if hi[d] - lo[d] > widest {
            widest = hi[d] - lo[d];
            axis = d;
        }
    }
    axis
}

/// Exact nearest-neighbour index over `D` dimensional points under the Euclidean metric.
///
/// Points come in as anything that converts into `[f64; D]`, so `Point2`, `Point3` and plain
/// arrays all work. Each point is stored with a [`Payload`], the grid index by default.
/// When several points are equally close the one inserted first wins.
///
/// ```
/// use geogrid::SphericalTree;
/// let mut tree = SphericalTree::new();
/// tree.insert(([0.0, 0.0, 0.0], 0));
/// tree.insert(([1.0, 0.0, 0.0], 1));
/// assert_eq!(tree.nearest_neighbour([0.9, 0.0, 0.0]).unwrap().payload, 1);
/// ```
#[derive(Clone, Debug)]
pub struct SearchTree<const D: usize, P: Payload = usize> {
    trees: Vec<StaticTree<D, P>>,
    leaf_size: usize,
    next_seq: u64,
}

/// Trees over `(lon, lat)` or other plane coordinates.
pub type PlanarTree = SearchTree<2>;
/// Trees over points of a sphere or ellipsoid embedded in 3D.
pub type SphericalTree = SearchTree<3>;

impl<const D: usize, P: Payload> Default for SearchTree<D, P> {
    fn default() -> Self {
        SearchTree::with_leaf_size(DEFAULT_LEAF_SIZE)
    }
}

impl<const D: usize, P: Payload> SearchTree<D, P> {
    /// An empty tree with the default leaf size.
    pub fn new() -> Self {
        SearchTree::default()
    }

    /// An empty tree. A leaf size of zero is treated as one.
    pub fn with_leaf_size(leaf_size: usize) -> Self {
        SearchTree {
            trees: Vec::new(),
            leaf_size: leaf_size.max(1),
            next_seq: 0,
        }
    }

    /// Builds a tree straight from points, in the order given.
    pub fn from_points<Q, I>(points: I) -> Self
    where
        Q: Into<[f64; D]>,
        I: IntoIterator<Item = (Q, P)>,
    {
        let mut tree = SearchTree::new();
        tree.build(points);
        tree
    }

    pub(crate) fn from_parts(tree: StaticTree<D, P>, leaf_size: usize, next_seq: u64) -> Self {
        let trees = if tree.len() == 0 { Vec::new() } else { vec![tree] };
        SearchTree {
            trees,
            leaf_size: leaf_size.max(1),
            next_seq,
        }
    }

    /// Replaces the contents with `points`, bulk loaded into a single tree. Insertion order
    /// is the iteration order.
    pub fn build<Q, I>(&mut self, points: I)
    where
        Q: Into<[f64; D]>,
        I: IntoIterator<Item = (Q, P)>,
    {
        let items: Vec<Item<D, P>> = points
            .into_iter()
            .enumerate()
            .map(|(seq, (point, payload))| Item {
                point: point.into(),
                payload,
                seq: seq as u64,
            })
            .collect();
        self.next_seq = items.len() as u64;
        self.trees.clear();
        if !items.is_empty() {
            self.trees.push(StaticTree::build(items, self.leaf_size));
        }
    }

    /// Adds one point.
    pub fn insert<Q: Into<[f64; D]>>(&mut self, (point, payload): (Q, P)) {
        let mut items = vec![Item {
            point: point.into(),
            payload,
            seq: self.next_seq,
        }];
        self.next_seq += 1;
        while self.trees.last().map_or(false, |t| t.len() <= items.len()) {
            if let Some(smaller) = self.trees.pop() {
                items.extend(smaller.into_items());
            }
        }
        self.trees.push(StaticTree::build(items, self.leaf_size));
    }

    /// Rebuilds the forest as a single tree. Queries get a little faster, inserts start over.
    pub fn compact(&mut self) {
        if self.trees.len() > 1 {
            let items: Vec<Item<D, P>> = self
                .trees
                .drain(..)
                .flat_map(StaticTree::into_items)
                .collect();
            self.trees.push(StaticTree::build(items, self.leaf_size));
        }
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.trees.iter().map(StaticTree::len).sum()
    }

    ///
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    ///
    pub fn leaf_size(&self) -> usize {
        self.leaf_size
    }

    /// Number of static trees in the forest
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Sequence number the next insert gets.
    pub(crate) fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Approximate bytes held, counting allocated capacity.
    pub fn footprint(&self) -> usize {
        mem::size_of::<Self>()
            + self.trees.capacity() * mem::size_of::<StaticTree<D, P>>()
            + self.trees.iter().map(StaticTree::footprint).sum::<usize>()
    }

    /// Every stored point and payload. Points of one static tree come out together, so the
    /// order is neither insertion nor spatial order.
    pub fn iter(&self) -> impl Iterator<Item = ([f64; D], P)> + '_ {
        self.trees.iter().flat_map(|t| {
            t.coords
                .iter()
                .copied()
                .zip(t.payloads.iter().copied())
        })
    }

    fn forest(&self) -> Forest<'_, D> {
        self.trees.iter().map(StaticTree::view).collect()
    }

    fn neighbour(&self, c: Candidate) -> Neighbour<D, P> {
        let tree = &self.trees[c.tree];
        Neighbour {
            point: tree.coords[c.slot],
            payload: tree.payloads[c.slot],
            distance: c.dist2.sqrt(),
        }
    }

    /// The closest stored point.
    pub fn nearest_neighbour<Q: Into<[f64; D]>>(&self, point: Q) -> GeogridResult<Neighbour<D, P>> {
        let query = point.into();
        view::nearest(&self.forest(), &query)
            .map(|c| self.neighbour(c))
            .ok_or(GeogridError::EmptyIndex)
    }

    /// The `k` closest stored points, closest first. Fewer if the tree is smaller than `k`.
    pub fn k_nearest_neighbours<Q: Into<[f64; D]>>(
        &self,
        point: Q,
        k: usize,
    ) -> GeogridResult<Vec<Neighbour<D, P>>> {
        if self.is_empty() {
            return Err(GeogridError::EmptyIndex);
        }
        let query = point.into();
        Ok(view::k_nearest(&self.forest(), &query, k)
            .into_iter()
            .map(|c| self.neighbour(c))
            .collect())
    }

    /// All stored points no further than `radius`, closest first.
    pub fn find_in_sphere<Q: Into<[f64; D]>>(&self, point: Q, radius: f64) -> Vec<Neighbour<D, P>> {
        let query = point.into();
        view::within(&self.forest(), &query, radius)
            .into_iter()
            .map(|c| self.neighbour(c))
            .collect()
    }

    /// [`SearchTree::nearest_neighbour`] for many queries, answered in parallel.
    pub fn nearest_neighbours<Q>(&self, points: &[Q]) -> GeogridResult<Vec<Neighbour<D, P>>>
    where
        Q: Into<[f64; D]> + Copy + Sync,
    {
        if self.is_empty() {
            return Err(GeogridError::EmptyIndex);
        }
        points
            .par_iter()
            .map(|p| self.nearest_neighbour(*p))
            .collect()
    }

    /// The forest flattened into one tree, for writing out. Borrows when there is nothing to
    /// merge.
    pub(crate) fn merged(&self) -> std::borrow::Cow<'_, StaticTree<D, P>> {
        use std::borrow::Cow;
        match self.trees.len() {
            0 => Cow::Owned(StaticTree::default()),
            1 => Cow::Borrowed(&self.trees[0]),
            _ => {
                let items: Vec<Item<D, P>> = self.trees.iter().flat_map(StaticTree::items).collect();
                Cow::Owned(StaticTree::build(items, self.leaf_size))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcloud::{Point2, Point3};

    #[test]
    fn single_point_then_insert() {
        let mut tree = SphericalTree::new();
        tree.insert((Point3::new(0.0, 0.0, 0.0), 0));
        assert_eq!(tree.nearest_neighbour([0.1, 0.0, 0.0]).unwrap().payload, 0);
        assert_eq!(tree.nearest_neighbour([0.9, 0.0, 0.0]).unwrap().payload, 0);

        tree.insert((Point3::new(1.0, 0.0, 0.0), 1));
        assert_eq!(tree.nearest_neighbour([0.9, 0.0, 0.0]).unwrap().payload, 1);
        assert_eq!(tree.nearest_neighbour([0.1, 0.0, 0.0]).unwrap().payload, 0);
        let n = tree.nearest_neighbour([0.9, 0.0, 0.0]).unwrap();
        assert_approx_eq!(n.distance, 0.1);
        assert_eq!(n.point, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn empty_tree_queries() {
        let tree = PlanarTree::new();
        assert!(matches!(
            tree.nearest_neighbour([0.0, 0.0]),
            Err(GeogridError::EmptyIndex)
        ));
        assert!(tree.k_nearest_neighbours([0.0, 0.0], 3).is_err());
        assert!(tree.find_in_sphere([0.0, 0.0], 1.0).is_empty());
        assert!(tree.nearest_neighbours(&[[0.0, 0.0]]).is_err());
    }

    #[test]
    fn forest_stays_logarithmic() {
        let mut tree = SearchTree::<2, u32>::with_leaf_size(2);
        for i in 0..1000u32 {
            tree.insert(([i as f64, (i % 7) as f64], i));
            assert!(tree.tree_count() <= 11);
        }
        assert_eq!(tree.len(), 1000);
        // 1000 = 0b1111101000, one tree per set bit
        assert_eq!(tree.tree_count(), 6);
        tree.compact();
        assert_eq!(tree.tree_count(), 1);
        assert_eq!(tree.len(), 1000);
        for i in (0..1000u32).step_by(37) {
            let n = tree.nearest_neighbour([i as f64, (i % 7) as f64]).unwrap();
            assert_eq!(n.payload, i);
            assert_eq!(n.distance, 0.0);
        }
    }

    #[test]
    fn build_replaces_contents() {
        let mut tree = PlanarTree::new();
        tree.insert((Point2::new(5.0, 5.0), 99));
        tree.build(vec![(Point2::new(0.0, 0.0), 0), (Point2::new(1.0, 1.0), 1)]);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.nearest_neighbour([5.0, 5.0]).unwrap().payload, 1);
        let mut payloads: Vec<usize> = tree.iter().map(|(_, p)| p).collect();
        payloads.sort_unstable();
        assert_eq!(payloads, vec![0, 1]);
    }

    #[test]
    fn duplicates_resolve_to_first_inserted() {
        let mut tree = PlanarTree::with_leaf_size(1);
        tree.build((0..50).map(|i| ([1.0, 1.0], i)));
        for i in 50..80 {
            tree.insert(([1.0, 1.0], i));
        }
        assert_eq!(tree.nearest_neighbour([1.0, 1.0]).unwrap().payload, 0);
        let three: Vec<usize> = tree
            .k_nearest_neighbours([0.0, 0.0], 3)
            .unwrap()
            .iter()
            .map(|n| n.payload)
            .collect();
        assert_eq!(three, vec![0, 1, 2]);
    }

    #[test]
    fn sphere_and_knn_are_sorted() {
        let tree = PlanarTree::from_points((0..10).map(|i| ([i as f64, 0.0], i)));
        let found = tree.find_in_sphere([4.2, 0.0], 1.5);
        assert_eq!(
            found.iter().map(|n| n.payload).collect::<Vec<_>>(),
            vec![4, 5, 3]
        );
        let knn = tree.k_nearest_neighbours([9.6, 0.0], 20).unwrap();
        assert_eq!(knn.len(), 10);
        assert_eq!(knn[0].payload, 9);
        assert!(knn.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(tree.k_nearest_neighbours([0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn parallel_queries_match_serial() {
        let tree = PlanarTree::from_points((0..100).map(|i| ([(i % 10) as f64, (i / 10) as f64], i)));
        let queries: Vec<[f64; 2]> = (0..40).map(|i| [i as f64 * 0.23, i as f64 * 0.19]).collect();
        let parallel = tree.nearest_neighbours(&queries).unwrap();
        for (q, n) in queries.iter().zip(parallel) {
            assert_eq!(tree.nearest_neighbour(*q).unwrap(), n);
        }
    }

    #[test]
    fn merged_keeps_everything() {
        let mut tree = SearchTree::<3, i64>::with_leaf_size(4);
        for i in 0..37i64 {
            tree.insert(([i as f64, 0.0, -i as f64], -i));
        }
        let merged = tree.merged();
        assert_eq!(merged.len(), 37);
        assert_eq!(merged.view().check(), Ok(()));
        assert!(tree.footprint() > 37 * 3 * 8);
    }
}
