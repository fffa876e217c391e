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

//! Forward-only traversal of a point sequence.

use crate::grids::{Grid, Row};
use crate::points::LatLon;
use core_geogrid::PixelOrdering;

/// A cursor over a finite point sequence. There is no rewind, make a new scanner instead.
pub trait Scanner {
    /// Total number of points
    fn size(&self) -> usize;
    /// Number of points already produced
    fn position(&self) -> usize;
    /// Produces the next point.
    ///
    /// # Panics
    /// If the scanner is done.
    fn advance(&mut self) -> LatLon;
    ///
    fn is_done(&self) -> bool {
        self.position() >= self.size()
    }
}

/// Walks a grid in its own point order. Row-structured layouts are walked row by row
/// without index arithmetic; nested HEALPix goes through the ordering transform.
#[derive(Clone, Debug)]
pub struct GridScanner<'a> {
    grid: &'a Grid,
    size: usize,
    position: usize,
    row: usize,
    col: usize,
}

impl<'a> GridScanner<'a> {
    ///
    pub fn new(grid: &'a Grid) -> GridScanner<'a> {
        GridScanner {
            grid,
            size: grid.size(),
            position: 0,
            row: 0,
            col: 0,
        }
    }

    /// The grid being walked
    pub fn grid(&self) -> &'a Grid {
        self.grid
    }

    #[inline]
    fn walk_rows(&mut self, rows: &[Row]) -> LatLon {
        while self.col >= rows[self.row].count {
            self.row += 1;
            self.col = 0;
        }
        let row = &rows[self.row];
        let p = LatLon::new(row.latitude, row.longitude(self.col));
        self.col += 1;
        p
    }
}

impl<'a> Scanner for GridScanner<'a> {
    fn size(&self) -> usize {
        self.size
    }

    fn position(&self) -> usize {
        self.position
    }

    fn advance(&mut self) -> LatLon {
        assert!(
            self.position < self.size,
            "scanner advanced past the end ({} points)",
            self.size
        );
        let grid = self.grid;
        let p = match grid {
            Grid::Regular(g) => {
                let p = LatLon::new(
                    g.lat_spacing().value(self.row),
                    g.lon_spacing().value(self.col),
                );
                self.col += 1;
                if self.col == g.ni() {
                    self.col = 0;
                    self.row += 1;
                }
                p
            }
            Grid::Reduced(g) => self.walk_rows(g.rows()),
            Grid::Healpix(g) => match g.ordering() {
                PixelOrdering::Ring => self.walk_rows(g.rings().rows()),
                PixelOrdering::Nest => g.point(self.position),
            },
            Grid::Unstructured(g) => g.point(self.position),
        };
        self.position += 1;
        p
    }
}

impl<'a> Iterator for GridScanner<'a> {
    type Item = LatLon;

    fn next(&mut self) -> Option<LatLon> {
        if self.is_done() {
            None
        } else {
            Some(self.advance())
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.size - self.position;
        (left, Some(left))
    }
}

impl<'a> ExactSizeIterator for GridScanner<'a> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BoundingBox;
    use crate::grids::*;

    #[test]
    fn walk_matches_random_access() {
        let grids: Vec<Grid> = vec![
            RegularGrid::new(BoundingBox::global(), 8, 4).unwrap().into(),
            ReducedGrid::new(vec![45.0, 0.0, -45.0], vec![2, 0, 3]).unwrap().into(),
            HealpixGrid::new(2, PixelOrdering::Ring).unwrap().into(),
            HealpixGrid::new(2, PixelOrdering::Nest).unwrap().into(),
        ];
        for grid in grids.iter() {
            let walked: Vec<LatLon> = grid.scanner().collect();
            assert_eq!(walked.len(), grid.size());
            for (i, p) in walked.iter().enumerate() {
                assert_eq!(*p, grid.point(i));
            }
        }
    }

    #[test]
    fn exact_size() {
        let grid: Grid = RegularGrid::new(BoundingBox::global(), 8, 4).unwrap().into();
        let mut s = grid.scanner();
        assert_eq!(s.len(), 32);
        s.advance();
        assert_eq!(s.len(), 31);
        assert_eq!(s.position(), 1);
    }

    #[test]
    #[should_panic(expected = "past the end")]
    fn advance_past_the_end() {
        let grid: Grid = UnstructuredGrid::new(vec![LatLon::new(0.0, 0.0)]).into();
        let mut s = grid.scanner();
        s.advance();
        assert!(s.is_done());
        s.advance();
    }
}
