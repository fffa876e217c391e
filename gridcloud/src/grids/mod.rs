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

//! # Grids
//! Every grid is an ordered, finite list of points. Structured grids are stored as rows of
//! constant latitude, north to south, and their points are numbered row by row. The
//! unstructured grid is just the list.
//!
//! Cropping keeps the row structure when it survives: the points of a regular or reduced
//! grid inside a box usually still form one run per row. When some row would split in
//! two, the crop falls back to an unstructured grid holding the same points in the same
//! order.

use crate::bbox::BoundingBox;
use crate::errors::*;
use crate::points::{LatLon, POINT_EPSILON};
use crate::scanner::GridScanner;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

mod gaussian;
mod healpix;
mod reduced;
mod regular;
mod unstructured;

pub use gaussian::gaussian_latitudes;
pub use healpix::HealpixGrid;
pub use reduced::{ReducedGrid, Row};
pub use regular::RegularGrid;
pub use unstructured::UnstructuredGrid;

/// `count` values starting at `first`, `step` apart.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearSpacing {
    /// First value
    pub first: f64,
    /// Difference between neighbours, may be negative
    pub step: f64,
    /// Number of values
    pub count: usize,
}

impl LinearSpacing {
    ///
    pub fn new(first: f64, step: f64, count: usize) -> LinearSpacing {
        LinearSpacing { first, step, count }
    }

    /// The `i`-th value.
    #[inline]
    pub fn value(&self, i: usize) -> f64 {
        assert!(
            i < self.count,
            "spacing index {} out of range ({} values)",
            i,
            self.count
        );
        self.first + i as f64 * self.step
    }

    /// All values
    pub fn values(&self) -> Vec<f64> {
        (0..self.count).map(|i| self.value(i)).collect()
    }

    ///
    pub fn last(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.value(self.count - 1))
        }
    }
}

/// The grid layouts we know about.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridType {
    /// Regular latitude/longitude
    #[serde(rename = "regular_ll")]
    RegularLatLon,
    /// Classic reduced Gaussian, explicit `pl`
    #[serde(rename = "reduced_gg")]
    ReducedGaussian,
    /// Octahedral reduced Gaussian
    #[serde(rename = "octahedral")]
    Octahedral,
    /// Reduced latitude/longitude
    #[serde(rename = "reduced_ll")]
    ReducedLatLon,
    /// Reduced rows given by hand
    #[serde(rename = "reduced")]
    Reduced,
    /// HEALPix, ring or nested
    #[serde(rename = "healpix")]
    Healpix,
    /// A plain list of points
    #[serde(rename = "unstructured")]
    Unstructured,
}

impl GridType {
    /// The name used in grid descriptions
    pub fn name(&self) -> &'static str {
        match self {
            GridType::RegularLatLon => "regular_ll",
            GridType::ReducedGaussian => "reduced_gg",
            GridType::Octahedral => "octahedral",
            GridType::ReducedLatLon => "reduced_ll",
            GridType::Reduced => "reduced",
            GridType::Healpix => "healpix",
            GridType::Unstructured => "unstructured",
        }
    }
}

impl fmt::Display for GridType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for GridType {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "regular_ll" | "regular" => Ok(GridType::RegularLatLon),
            "reduced_gg" => Ok(GridType::ReducedGaussian),
            "octahedral" | "octahedral_gg" => Ok(GridType::Octahedral),
            "reduced_ll" => Ok(GridType::ReducedLatLon),
            "reduced" => Ok(GridType::Reduced),
            "healpix" => Ok(GridType::Healpix),
            "unstructured" => Ok(GridType::Unstructured),
            _ => {
                warn!("unsupported grid type '{}'", s);
                Err(ConfigError::UnsupportedGridType(s.to_string()))
            }
        }
    }
}

/// A grid of any layout.
#[derive(Clone, Debug)]
pub enum Grid {
    /// Regular latitude/longitude
    Regular(RegularGrid),
    /// Rows with their own point counts
    Reduced(ReducedGrid),
    /// HEALPix in either ordering
    Healpix(HealpixGrid),
    /// No row structure
    Unstructured(UnstructuredGrid),
}

impl Grid {
    /// Number of points
    pub fn size(&self) -> usize {
        match self {
            Grid::Regular(g) => g.size(),
            Grid::Reduced(g) => g.size(),
            Grid::Healpix(g) => g.size(),
            Grid::Unstructured(g) => g.size(),
        }
    }

    ///
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of rows.
    ///
    /// # Panics
    /// On unstructured grids.
    pub fn nj(&self) -> usize {
        match self {
            Grid::Regular(g) => g.nj(),
            Grid::Reduced(g) => g.nj(),
            Grid::Healpix(g) => g.rings().nj(),
            Grid::Unstructured(_) => unimplemented!("nj() on an unstructured grid"),
        }
    }

    /// Number of points on row `j`.
    ///
    /// # Panics
    /// On unstructured grids.
    pub fn ni(&self, j: usize) -> usize {
        match self {
            Grid::Regular(g) => {
                assert!(j < g.nj(), "row {} out of range ({} rows)", j, g.nj());
                g.ni()
            }
            Grid::Reduced(g) => g.ni(j),
            Grid::Healpix(g) => g.rings().ni(j),
            Grid::Unstructured(_) => unimplemented!("ni() on an unstructured grid"),
        }
    }

    /// Row latitudes, north to south.
    ///
    /// # Panics
    /// On unstructured grids.
    pub fn latitudes(&self) -> Vec<f64> {
        match self {
            Grid::Regular(g) => g.latitudes(),
            Grid::Reduced(g) => g.latitudes(),
            Grid::Healpix(g) => g.rings().latitudes(),
            Grid::Unstructured(_) => unimplemented!("latitudes() on an unstructured grid"),
        }
    }

    /// Longitudes of row `j`, west to east.
    ///
    /// # Panics
    /// On unstructured grids.
    pub fn longitudes(&self, j: usize) -> Vec<f64> {
        match self {
            Grid::Regular(g) => {
                assert!(j < g.nj(), "row {} out of range ({} rows)", j, g.nj());
                g.longitudes()
            }
            Grid::Reduced(g) => g.longitudes(j),
            Grid::Healpix(g) => g.rings().longitudes(j),
            Grid::Unstructured(_) => unimplemented!("longitudes() on an unstructured grid"),
        }
    }

    /// The area covered
    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            Grid::Regular(g) => g.bounding_box(),
            Grid::Reduced(g) => g.bounding_box(),
            Grid::Healpix(_) => BoundingBox::global(),
            Grid::Unstructured(g) => g.bounding_box(),
        }
    }

    /// The points of this grid inside `bbox`. Rows keep their north to south order, but
    /// within a row the longitudes are wrapped into `[west, west + 360)` of `bbox` and run
    /// east from its west edge, so a crop across the seam starts at `bbox.west()`. Nested
    /// HEALPix and unstructured grids keep their own order.
    pub fn cropped(&self, bbox: &BoundingBox) -> GridResult<Grid> {
        let cropped = match self {
            Grid::Regular(g) => g.cropped(bbox)?,
            Grid::Reduced(g) => g.cropped(bbox)?,
            Grid::Healpix(g) => g.cropped(bbox)?,
            Grid::Unstructured(g) => Grid::Unstructured(g.cropped(bbox)),
        };
        debug!(
            "cropped a {} grid of {} points to {} points",
            self.grid_type(),
            self.size(),
            cropped.size()
        );
        Ok(cropped)
    }

    /// Random access to point `index`, in iteration order.
    pub fn point(&self, index: usize) -> LatLon {
        match self {
            Grid::Regular(g) => g.point(index),
            Grid::Reduced(g) => g.point(index),
            Grid::Healpix(g) => g.point(index),
            Grid::Unstructured(g) => g.point(index),
        }
    }

    /// Lazy iterator over the points.
    pub fn points(&self) -> GridScanner<'_> {
        GridScanner::new(self)
    }

    /// A fresh scanner positioned at the first point.
    pub fn scanner(&self) -> GridScanner<'_> {
        GridScanner::new(self)
    }

    ///
    pub fn grid_type(&self) -> GridType {
        match self {
            Grid::Regular(_) => GridType::RegularLatLon,
            Grid::Reduced(g) => g.kind(),
            Grid::Healpix(_) => GridType::Healpix,
            Grid::Unstructured(_) => GridType::Unstructured,
        }
    }
}

impl From<RegularGrid> for Grid {
    fn from(g: RegularGrid) -> Grid {
        Grid::Regular(g)
    }
}

impl From<ReducedGrid> for Grid {
    fn from(g: ReducedGrid) -> Grid {
        Grid::Reduced(g)
    }
}

impl From<HealpixGrid> for Grid {
    fn from(g: HealpixGrid) -> Grid {
        Grid::Healpix(g)
    }
}

impl From<UnstructuredGrid> for Grid {
    fn from(g: UnstructuredGrid) -> Grid {
        Grid::Unstructured(g)
    }
}

/// The longitudes from `lons` inside `bbox`, wrapped into the box and sorted. The flag is
/// true when they are evenly spaced by `step`, so they still form one row.
pub(crate) fn kept_run<I: Iterator<Item = f64>>(
    lons: I,
    step: f64,
    bbox: &BoundingBox,
) -> (Vec<f64>, bool) {
    let mut kept: Vec<f64> = lons
        .filter(|l| bbox.contains_lon(*l))
        .map(|l| bbox.wrap_lon(l))
        .collect();
    kept.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let tolerance = 1e-6_f64.max(step.abs() * 1e-9);
    let contiguous = kept
        .windows(2)
        .all(|w| ((w[1] - w[0]) - step).abs() <= tolerance);
    (kept, contiguous)
}

/// True if `lat` is inside the latitude band of `bbox`.
#[inline]
pub(crate) fn in_band(lat: f64, bbox: &BoundingBox) -> bool {
    lat <= bbox.north() + POINT_EPSILON && lat >= bbox.south() - POINT_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spacing_values() {
        let s = LinearSpacing::new(90.0, -45.0, 5);
        assert_eq!(s.values(), vec![90.0, 45.0, 0.0, -45.0, -90.0]);
        assert_eq!(s.last(), Some(-90.0));
        assert_eq!(LinearSpacing::new(0.0, 1.0, 0).last(), None);
    }

    #[test]
    fn grid_type_names() {
        for t in [
            GridType::RegularLatLon,
            GridType::ReducedGaussian,
            GridType::Octahedral,
            GridType::ReducedLatLon,
            GridType::Reduced,
            GridType::Healpix,
            GridType::Unstructured,
        ]
        .iter()
        {
            assert_eq!(t.name().parse::<GridType>(), Ok(*t));
        }
        assert_eq!(
            "lambert".parse::<GridType>(),
            Err(ConfigError::UnsupportedGridType("lambert".to_string()))
        );
    }

    #[test]
    fn runs_across_the_seam() {
        let bbox = BoundingBox::new(10.0, -50.0, -10.0, 50.0).unwrap();
        let lons = (0..8).map(|i| i as f64 * 45.0);
        let (kept, contiguous) = kept_run(lons, 45.0, &bbox);
        assert_eq!(kept, vec![-45.0, 0.0, 45.0]);
        assert!(contiguous);
    }

    #[test]
    #[should_panic(expected = "not implemented")]
    fn unstructured_has_no_rows() {
        let grid = Grid::from(UnstructuredGrid::new(vec![LatLon::new(0.0, 0.0)]));
        grid.ni(0);
    }
}
