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

//! Lazily composed point streams: a scanner followed by zero or more projections.
//!
//! ```
//! use gridcloud::*;
//! let grid: Grid = RegularGrid::new(BoundingBox::global(), 8, 4).unwrap().into();
//! let points: Vec<LatLon> = IteratorComposer::new(grid.scanner())
//!     .then(AffineRemap::translation(-180.0, 0.0))
//!     .build()
//!     .collect();
//! assert_eq!(points.len(), 32);
//! ```

use crate::errors::GridResult;
use crate::points::LatLon;
use crate::projection::{Projection, ProjectionSpec};
use crate::scanner::Scanner;

/// Collects a scanner and the projections to run on each point, in order.
pub struct IteratorComposer<'a> {
    scanner: Box<dyn Scanner + 'a>,
    projections: Vec<Box<dyn Projection>>,
}

impl<'a> IteratorComposer<'a> {
    ///
    pub fn new<S: Scanner + 'a>(scanner: S) -> IteratorComposer<'a> {
        IteratorComposer {
            scanner: Box::new(scanner),
            projections: Vec::new(),
        }
    }

    /// Appends a projection, applied after the ones already added.
    pub fn then<P: Projection + 'static>(mut self, projection: P) -> Self {
        self.projections.push(Box::new(projection));
        self
    }

    /// Appends an already boxed projection.
    pub fn then_boxed(mut self, projection: Box<dyn Projection>) -> Self {
        self.projections.push(projection);
        self
    }

    /// Appends the projection each spec describes.
    pub fn then_specs(mut self, specs: &[ProjectionSpec]) -> GridResult<Self> {
        for spec in specs {
            self.projections.push(spec.build()?);
        }
        Ok(self)
    }

    ///
    pub fn build(self) -> ComposedIterator<'a> {
        ComposedIterator {
            scanner: self.scanner,
            projections: self.projections,
        }
    }
}

/// The composed stream. Forward only; build a new one to start over.
pub struct ComposedIterator<'a> {
    scanner: Box<dyn Scanner + 'a>,
    projections: Vec<Box<dyn Projection>>,
}

impl<'a> ComposedIterator<'a> {
    /// Names of the projections, in application order
    pub fn projection_names(&self) -> Vec<&'static str> {
        self.projections.iter().map(|p| p.name()).collect()
    }

    /// Points already produced
    pub fn position(&self) -> usize {
        self.scanner.position()
    }
}

impl<'a> Iterator for ComposedIterator<'a> {
    type Item = LatLon;

    fn next(&mut self) -> Option<LatLon> {
        if self.scanner.is_done() {
            return None;
        }
        let p = self.scanner.advance();
        Some(self.projections.iter().fold(p, |p, proj| proj.project(p)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.scanner.size() - self.scanner.position();
        (left, Some(left))
    }
}

impl<'a> ExactSizeIterator for ComposedIterator<'a> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BoundingBox;
    use crate::grids::*;
    use crate::projection::*;

    #[test]
    fn projections_apply_in_order() {
        let grid: Grid = UnstructuredGrid::new(vec![LatLon::new(1.0, 2.0)]).into();
        let mut it = IteratorComposer::new(grid.scanner())
            .then(AffineRemap::new([[2.0, 0.0, 0.0], [0.0, 1.0, 0.0]]))
            .then(AffineRemap::translation(1.0, 0.0))
            .build();
        assert_eq!(it.projection_names(), vec!["affine", "affine"]);
        let p = it.next().unwrap();
        assert_approx_eq!(p.lon, 5.0);
        assert_approx_eq!(p.lat, 1.0);
        assert!(it.next().is_none());
    }

    #[test]
    fn rotated_stream_is_lazy_and_sized() {
        let grid: Grid = RegularGrid::new(BoundingBox::global(), 8, 4).unwrap().into();
        let mut it = IteratorComposer::new(grid.scanner())
            .then(Rotation::new(-40.0, 10.0, 0.0))
            .build();
        assert_eq!(it.len(), 32);
        it.next();
        assert_eq!(it.position(), 1);
        assert_eq!(it.len(), 31);
        assert_eq!(it.count(), 31);
    }

    #[test]
    fn specs_compose() {
        let grid: Grid = UnstructuredGrid::new(vec![LatLon::new(0.0, 0.0)]).into();
        let p: Vec<LatLon> = IteratorComposer::new(grid.scanner())
            .then_specs(&[ProjectionSpec::rotation(-40.0, 10.0, 0.0), ProjectionSpec::rounding(6)])
            .unwrap()
            .build()
            .collect();
        assert_eq!(p, vec![LatLon::new(50.0, 10.0)]);
    }
}
