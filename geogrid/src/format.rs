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

//! The binary layout search trees are cached in.
//!
//! ```text
//! offset  size  field
//!      0     8  magic, "GEOGRIDT"
//!      8     4  format version
//!     12     4  dimension
//!     16     8  byte order marker, 0x0102030405060708 as written
//!     24     8  node count
//!     32     8  point count
//!     40     8  leaf size
//!     48     8  next insertion sequence number
//!     56     8  total length in bytes
//!     64        nodes, 32 bytes each
//!               coordinates, 8 bytes times dimension per point
//!               payloads, 8 bytes per point
//!               sequence numbers, 8 bytes per point
//! ```
//!
//! All values are native endian. Every section is a multiple of 8 bytes long, so a blob that
//! starts on an 8 byte boundary can be read in place, which is what memory-mapped trees do.

use crate::errors::{GeogridError, GeogridResult};
use crate::searchtree::{KdNode, Payload, SearchTree, StaticTree, TreeView};
use log::warn;
use std::mem;
use std::ops::Range;
use std::slice;

/// First bytes of every serialised tree
pub const MAGIC: [u8; 8] = *b"GEOGRIDT";
/// Bumped whenever the layout changes. Part of every cache fingerprint.
pub const FORMAT_VERSION: u32 = 1;
/// Bytes before the first section
pub const HEADER_LEN: usize = 64;
const BYTE_ORDER_MARK: u64 = 0x0102_0304_0506_0708;
const NODE_LEN: usize = 32;

/// The fixed part of a serialised tree.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Header {
    ///
    pub version: u32,
    ///
    pub dimension: u32,
    ///
    pub node_count: u64,
    ///
    pub point_count: u64,
    ///
    pub leaf_size: u64,
    ///
    pub next_seq: u64,
    ///
    pub total_len: u64,
}

/// Where each section of a validated blob lives.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Layout {
    pub(crate) header: Header,
    nodes: Range<usize>,
    coords: Range<usize>,
    payloads: Range<usize>,
    seqs: Range<usize>,
}

/// Slices of a blob read in place.
pub(crate) struct Sections<'a, const D: usize> {
    pub(crate) view: TreeView<'a, D>,
    pub(crate) payloads: &'a [u64],
}

fn rejected(message: String) -> GeogridError {
    warn!("rejecting serialised search tree: {}", message);
    GeogridError::format(message)
}

#[inline]
fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_ne_bytes(b)
}

#[inline]
fn u64_at(bytes: &[u8], offset: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_ne_bytes(b)
}

#[inline]
fn f64_at(bytes: &[u8], offset: usize) -> f64 {
    f64::from_bits(u64_at(bytes, offset))
}

/// Reads and checks the header of `bytes`.
pub fn read_header(bytes: &[u8]) -> GeogridResult<Header> {
    if bytes.len() < HEADER_LEN {
        return Err(rejected(format!(
            "{} bytes is too short for a header",
            bytes.len()
        )));
    }
    if bytes[0..8] != MAGIC {
        return Err(rejected("bad magic".to_string()));
    }
    let marker = u64_at(bytes, 16);
    if marker != BYTE_ORDER_MARK {
        return Err(rejected(if marker == BYTE_ORDER_MARK.swap_bytes() {
            "written with the other byte order".to_string()
        } else {
            format!("bad byte order marker {:#x}", marker)
        }));
    }
    let header = Header {
        version: u32_at(bytes, 8),
        dimension: u32_at(bytes, 12),
        node_count: u64_at(bytes, 24),
        point_count: u64_at(bytes, 32),
        leaf_size: u64_at(bytes, 40),
        next_seq: u64_at(bytes, 48),
        total_len: u64_at(bytes, 56),
    };
    if header.version != FORMAT_VERSION {
        return Err(rejected(format!(
            "format version {}, expected {}",
            header.version, FORMAT_VERSION
        )));
    }
    Ok(header)
}

/// Checks the header against `D` and the length of `bytes`, and works out the sections.
pub(crate) fn layout<const D: usize>(bytes: &[u8]) -> GeogridResult<Layout> {
    let header = read_header(bytes)?;
    if header.dimension as usize != D {
        return Err(rejected(format!(
            "a {} dimensional tree, expected {}",
            header.dimension, D
        )));
    }
    let too_big = || rejected("section sizes overflow".to_string());
    let nodes = header.node_count as usize;
    let points = header.point_count as usize;
    let nodes_len = nodes.checked_mul(NODE_LEN).ok_or_else(too_big)?;
    let coords_len = points.checked_mul(8 * D).ok_or_else(too_big)?;
    let column_len = points.checked_mul(8).ok_or_else(too_big)?;
    let node_start = HEADER_LEN;
    let coord_start = node_start.checked_add(nodes_len).ok_or_else(too_big)?;
    let payload_start = coord_start.checked_add(coords_len).ok_or_else(too_big)?;
    let seq_start = payload_start.checked_add(column_len).ok_or_else(too_big)?;
    let end = seq_start.checked_add(column_len).ok_or_else(too_big)?;
    if header.total_len != end as u64 || bytes.len() != end {
        return Err(rejected(format!(
            "{} bytes present, header says {} and the counts need {}",
            bytes.len(),
            header.total_len,
            end
        )));
    }
    Ok(Layout {
        header,
        nodes: node_start..coord_start,
        coords: coord_start..payload_start,
        payloads: payload_start..seq_start,
        seqs: seq_start..end,
    })
}

/// Reinterprets the sections of `bytes` in place. Does not walk the tree, see
/// [`TreeView::check`].
pub(crate) fn sections<'a, const D: usize>(
    bytes: &'a [u8],
    layout: &Layout,
) -> GeogridResult<Sections<'a, D>> {
    if bytes.as_ptr() as usize % mem::align_of::<u64>() != 0 {
        return Err(rejected("blob is not 8 byte aligned".to_string()));
    }
    if bytes.len() != layout.seqs.end {
        return Err(rejected("blob does not match its layout".to_string()));
    }
    let points = layout.header.point_count as usize;
    // All sections start at multiples of 8 from an 8 aligned base and lie inside `bytes`.
    // KdNode, [f64; D] and u64 are plain old data, so any bit pattern is a valid value.
    let (nodes, coords, payloads, seqs) = unsafe {
        (
            slice::from_raw_parts(
                bytes[layout.nodes.clone()].as_ptr() as *const KdNode,
                layout.header.node_count as usize,
            ),
            slice::from_raw_parts(
                bytes[layout.coords.clone()].as_ptr() as *const [f64; D],
                points,
            ),
            slice::from_raw_parts(bytes[layout.payloads.clone()].as_ptr() as *const u64, points),
            slice::from_raw_parts(bytes[layout.seqs.clone()].as_ptr() as *const u64, points),
        )
    };
    Ok(Sections {
        view: TreeView::new(nodes, coords, seqs),
        payloads,
    })
}

/// Full validation of a blob that is about to be read in place: header, lengths, alignment
/// and the structure of the tree.
pub(crate) fn validate<const D: usize>(bytes: &[u8]) -> GeogridResult<Layout> {
    let layout = layout::<D>(bytes)?;
    let parts = sections::<D>(bytes, &layout)?;
    parts.view.check().map_err(rejected)?;
    Ok(layout)
}

/// Serialises a tree. A forest is merged into one tree on the way out.
pub fn encode<const D: usize, P: Payload>(tree: &SearchTree<D, P>) -> Vec<u8> {
    let merged = tree.merged();
    let points = merged.coords.len();
    let total = HEADER_LEN + merged.nodes.len() * NODE_LEN + points * 8 * (D + 2);
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_ne_bytes());
    out.extend_from_slice(&(D as u32).to_ne_bytes());
    out.extend_from_slice(&BYTE_ORDER_MARK.to_ne_bytes());
    out.extend_from_slice(&(merged.nodes.len() as u64).to_ne_bytes());
    out.extend_from_slice(&(points as u64).to_ne_bytes());
    out.extend_from_slice(&(tree.leaf_size() as u64).to_ne_bytes());
    out.extend_from_slice(&tree.next_seq().to_ne_bytes());
    out.extend_from_slice(&(total as u64).to_ne_bytes());
    for node in &merged.nodes {
        out.extend_from_slice(&node.split.to_ne_bytes());
        out.extend_from_slice(&node.start.to_ne_bytes());
        out.extend_from_slice(&node.end.to_ne_bytes());
        out.extend_from_slice(&node.right.to_ne_bytes());
        out.extend_from_slice(&node.axis.to_ne_bytes());
    }
    for point in &merged.coords {
        for x in point.iter() {
            out.extend_from_slice(&x.to_ne_bytes());
        }
    }
    for payload in &merged.payloads {
        out.extend_from_slice(&payload.to_bits().to_ne_bytes());
    }
    for seq in &merged.seqs {
        out.extend_from_slice(&seq.to_ne_bytes());
    }
    debug_assert_eq!(out.len(), total);
    out
}

/// Reads a serialised tree into an owned one. Works on blobs at any alignment.
pub fn decode<const D: usize, P: Payload>(bytes: &[u8]) -> GeogridResult<SearchTree<D, P>> {
    let layout = layout::<D>(bytes)?;
    let nodes = bytes[layout.nodes.clone()]
        .chunks_exact(NODE_LEN)
        .map(|b| KdNode {
            split: f64_at(b, 0),
            start: u64_at(b, 8),
            end: u64_at(b, 16),
            right: u32_at(b, 24),
            axis: u32_at(b, 28),
        })
        .collect();
    let coords = bytes[layout.coords.clone()]
        .chunks_exact(8 * D)
        .map(|b| {
            let mut point = [0.0; D];
            for (d, x) in point.iter_mut().enumerate() {
                *x = f64_at(b, 8 * d);
            }
            point
        })
        .collect();
    let payloads = bytes[layout.payloads.clone()]
        .chunks_exact(8)
        .map(|b| P::from_bits(u64_at(b, 0)))
        .collect();
    let seqs = bytes[layout.seqs.clone()]
        .chunks_exact(8)
        .map(|b| u64_at(b, 0))
        .collect();
    let tree = StaticTree {
        nodes,
        coords,
        payloads,
        seqs,
    };
    tree.view().check().map_err(rejected)?;
    Ok(SearchTree::from_parts(
        tree,
        layout.header.leaf_size as usize,
        layout.header.next_seq,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searchtree::PlanarTree;

    fn sample() -> PlanarTree {
        let mut tree = PlanarTree::with_leaf_size(2);
        for i in 0..25 {
            tree.insert(([(i * 7 % 25) as f64, (i % 4) as f64], i));
        }
        tree
    }

    /// Copies into u64 storage so the in-place path sees an aligned blob.
    fn aligned(bytes: &[u8]) -> Vec<u64> {
        bytes
            .chunks_exact(8)
            .map(|b| u64_at(b, 0))
            .collect()
    }

    fn as_bytes(words: &[u64]) -> &[u8] {
        unsafe { slice::from_raw_parts(words.as_ptr() as *const u8, words.len() * 8) }
    }

    #[test]
    fn header_fields() {
        let tree = sample();
        let bytes = encode(&tree);
        let header = read_header(&bytes).unwrap();
        assert_eq!(header.dimension, 2);
        assert_eq!(header.point_count, 25);
        assert_eq!(header.leaf_size, 2);
        assert_eq!(header.next_seq, 25);
        assert_eq!(header.total_len as usize, bytes.len());
        assert_eq!(bytes.len() % 8, 0);
    }

    #[test]
    fn decoded_tree_answers_like_the_original() {
        let tree = sample();
        let back: PlanarTree = decode(&encode(&tree)).unwrap();
        assert_eq!(back.len(), 25);
        assert_eq!(back.tree_count(), 1);
        for q in [[3.3, 1.2], [24.0, 0.0], [-5.0, 9.0]].iter() {
            assert_eq!(
                tree.nearest_neighbour(*q).unwrap(),
                back.nearest_neighbour(*q).unwrap()
            );
        }
    }

    #[test]
    fn in_place_sections_validate() {
        let words = aligned(&encode(&sample()));
        let bytes = as_bytes(&words);
        let layout = validate::<2>(bytes).unwrap();
        let parts = sections::<2>(bytes, &layout).unwrap();
        assert_eq!(parts.view.len(), 25);
        assert_eq!(parts.payloads.len(), 25);
        assert!(validate::<3>(bytes).unwrap_err().is_format_error());
    }

    #[test]
    fn corrupt_blobs_are_rejected() {
        let bytes = encode(&sample());
        assert!(decode::<2, usize>(&bytes[..40]).is_err());
        assert!(decode::<2, usize>(&bytes[..bytes.len() - 8]).is_err());

        let mut bad = bytes.clone();
        bad[0] = b'X';
        assert!(decode::<2, usize>(&bad).unwrap_err().is_format_error());

        let mut bad = bytes.clone();
        bad[8..12].copy_from_slice(&(FORMAT_VERSION + 1).to_ne_bytes());
        assert!(decode::<2, usize>(&bad).is_err());

        let mut bad = bytes.clone();
        bad[16..24].copy_from_slice(&BYTE_ORDER_MARK.swap_bytes().to_ne_bytes());
        assert!(decode::<2, usize>(&bad).is_err());

        // point the root's right child back at itself
        let mut bad = bytes;
        bad[HEADER_LEN + 24..HEADER_LEN + 28].copy_from_slice(&0u32.to_ne_bytes());
        assert!(decode::<2, usize>(&bad).is_err());
    }

    #[test]
    fn empty_tree_round_trips() {
        let bytes = encode(&PlanarTree::new());
        assert_eq!(bytes.len(), HEADER_LEN);
        let back: PlanarTree = decode(&bytes).unwrap();
        assert!(back.is_empty());
    }
}
