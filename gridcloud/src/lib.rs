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
//! # Grid Cloud
//! Point sequences over the sphere: the grid layouts, lazy traversal of their points, and
//! the coordinate projections applied on the way out.
//!
//! A [`Grid`] is a finite, ordered list of points. Regular, reduced (Gaussian, octahedral,
//! reduced lat/lon) and HEALPix grids keep their row structure; unstructured grids are just
//! the list. Grids are built from a [`GridSpec`], which can be read from yaml, and walked
//! with a [`Scanner`]. An [`IteratorComposer`] chains a scanner with [`Projection`]s into a
//! lazy, exactly sized iterator.

#![allow(dead_code)]
#![warn(missing_docs)]
#![allow(clippy::cast_ptr_alignment)]

#[cfg(test)]
#[macro_use]
extern crate assert_approx_eq;

pub mod errors;
pub use errors::{ConfigError, GridError, GridResult, ParsingError};

mod points;
pub use points::*;

mod bbox;
pub use bbox::BoundingBox;

pub mod grids;
pub use grids::{
    gaussian_latitudes, Grid, GridType, HealpixGrid, LinearSpacing, ReducedGrid, RegularGrid,
    Row, UnstructuredGrid,
};

mod scanner;
pub use scanner::{GridScanner, Scanner};

pub mod projection;
pub use projection::{AffineRemap, Projection, ProjectionSpec, Rotation, Rounding};

mod iterator;
pub use iterator::{ComposedIterator, IteratorComposer};

mod spec;
pub use spec::{GridSpec, Increments, RotationSpec};

pub mod loaders;
pub mod memmap;

#[doc(inline)]
pub use core_geogrid::{PixelOrdering, Reorder};
