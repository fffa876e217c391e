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

#![allow(dead_code)]
#![warn(missing_docs)]
#![doc(test(attr(allow(unused_variables), deny(warnings))))]

//! # Geogrid
//! Exact nearest-neighbour search over the points of geospatial grids, and the caches that
//! let a search structure be built once and reused across runs.
//!
//! ## Search trees
//! A [`SearchTree`] is a forest of static k-d trees over 2D or 3D points, each stored with a
//! payload (the grid index by default). Bulk builds give one tree; inserts follow the
//! logarithmic method, merging equal sized trees, so the forest never has more than
//! `log2(n) + 1` members. Ties between equally close points go to the one inserted first.
//!
//! Grids are indexed through a [`SearchTreeBuilder`], which picks the embedding: the plane of
//! `(lon, lat)`, a sphere, or an ellipsoid. The 3D embeddings search by chord length, which
//! orders points the same way as distance along the surface.
//!
//! ## Caches
//! [`MemoryCache`], [`DiskCache`] and [`MappedCache`] all register with a
//! [`CacheRegistry`], which can total their footprints and purge them. Trees are stored under
//! a [`Fingerprint`] of the grid description and tree parameters. A [`utils::TreeCache`]
//! strings the layers together: memory, then disk, then build.
//!
//! Serialised trees use a flat, 8 byte aligned layout (see [`format`]) that a memory map can
//! answer queries from without decoding.

#[cfg(test)]
#[macro_use]
extern crate assert_approx_eq;

pub mod errors;
pub use errors::{GeogridError, GeogridResult};

mod searchtree;
pub use searchtree::{
    Embedding, GridTree, KdNode, Neighbour, Payload, PlanarTree, SearchTree, SearchTreeBuilder,
    SphericalTree, TreeView, DEFAULT_LEAF_SIZE,
};

pub mod cache;
pub use cache::{
    CacheKind, CacheRegistry, CachedArtifact, DiskCache, Fingerprint, MappedBytes, MappedCache,
    MappedSearchTree, MemoryCache, RegisteredCache,
};

pub mod format;
pub mod utils;

pub use gridcloud::{Grid, GridSpec, LatLon, Point2, Point3};
