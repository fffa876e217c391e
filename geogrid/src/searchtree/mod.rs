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

//! Exact nearest-neighbour search over 2D and 3D points.
//!
//! A [`SearchTree`] is a forest of flat k-d trees. Each static tree is stored as a pre-order
//! array of [`KdNode`]s next to parallel arrays of coordinates, payloads and insertion
//! sequence numbers. Queries only ever see those arrays through a [`TreeView`], which is
//! also what a memory-mapped tree hands out.

mod node;
pub use node::{KdNode, Payload};

mod view;
pub(crate) use view::{k_nearest, nearest, within, Candidate, Forest};
pub use view::TreeView;

mod tree;
pub(crate) use tree::StaticTree;
pub use tree::{Neighbour, PlanarTree, SearchTree, SphericalTree, DEFAULT_LEAF_SIZE};

mod builders;
pub use builders::{Embedding, GridTree, SearchTreeBuilder};
