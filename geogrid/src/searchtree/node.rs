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

//! Flat k-d tree nodes and the payload trait.

use std::fmt::Debug;

/// One node of a flat k-d tree. Nodes are stored in pre-order, so the left child of an
/// internal node is the next node and only the right child's index is kept. The layout is
/// fixed (32 bytes, 8 aligned) because serialised trees are read in place.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct KdNode {
    /// Coordinate of the median point along `axis`. Unused for leaves.
    pub split: f64,
    /// First point slot covered
    pub start: u64,
    /// One past the last point slot covered
    pub end: u64,
    /// Index of the right child, zero for leaves since the root is never a child.
    pub right: u32,
    /// Dimension the node splits on
    pub axis: u32,
}

impl KdNode {
    /// A leaf over `[start, end)`.
    pub fn leaf(start: usize, end: usize) -> KdNode {
        KdNode {
            split: 0.0,
            start: start as u64,
            end: end as u64,
            right: 0,
            axis: 0,
        }
    }

    ///
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.right == 0
    }

    /// Number of points under this node.
    #[inline]
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    ///
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Values stored next to each point. They travel through the binary format as 64 bits.
pub trait Payload: Copy + Debug + PartialEq + Send + Sync + 'static {
    /// Bits written to disk
    fn to_bits(self) -> u64;
    /// Inverse of [`Payload::to_bits`]
    fn from_bits(bits: u64) -> Self;
}

impl Payload for usize {
    fn to_bits(self) -> u64 {
        self as u64
    }
    fn from_bits(bits: u64) -> Self {
        bits as usize
    }
}

impl Payload for u64 {
    fn to_bits(self) -> u64 {
        self
    }
    fn from_bits(bits: u64) -> Self {
        bits
    }
}

impl Payload for u32 {
    fn to_bits(self) -> u64 {
        self as u64
    }
    fn from_bits(bits: u64) -> Self {
        bits as u32
    }
}

impl Payload for i64 {
    fn to_bits(self) -> u64 {
        self as u64
    }
    fn from_bits(bits: u64) -> Self {
        bits as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn node_layout_is_fixed() {
        assert_eq!(mem::size_of::<KdNode>(), 32);
        assert_eq!(mem::align_of::<KdNode>(), 8);
    }

    #[test]
    fn payload_bits() {
        assert_eq!(i64::from_bits((-3i64).to_bits()), -3);
        assert_eq!(u32::from_bits(7u32.to_bits()), 7);
        assert_eq!(usize::from_bits(usize::MAX.to_bits()), usize::MAX);
    }

    #[test]
    fn leaves() {
        let n = KdNode::leaf(4, 9);
        assert!(n.is_leaf());
        assert_eq!(n.len(), 5);
    }
}
