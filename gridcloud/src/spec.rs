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

//! Serialisable grid descriptions.
//!
//! A [`GridSpec`] names a layout and the parameters that layout needs. Which fields are
//! required depends on `grid_type`:
//!
//! | grid_type | needs |
//! |---|---|
//! | `regular_ll` | `ni` and `nj`, or `increments` |
//! | `reduced_gg` | `n`, `pl` |
//! | `octahedral` | `n` |
//! | `reduced_ll` | `pl` |
//! | `reduced` | `pl`, `latitudes` |
//! | `healpix` | `nside`, optional `ordering` (ring by default) |
//! | `unstructured` | `points` |
//!
//! An optional `bbox` crops every layout except `regular_ll`, where it is the grid's area.

use crate::bbox::BoundingBox;
use crate::errors::*;
use crate::grids::*;
use crate::iterator::{ComposedIterator, IteratorComposer};
use crate::points::LatLon;
use crate::projection::{Projection, ProjectionSpec, Rotation, Rounding};
use core_geogrid::PixelOrdering;
use serde::{Deserialize, Serialize};

/// Rotated pole parameters
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RotationSpec {
    ///
    pub south_pole_lat: f64,
    ///
    pub south_pole_lon: f64,
    ///
    #[serde(default)]
    pub angle: f64,
}

/// Grid increments in degrees
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Increments {
    ///
    pub west_east: f64,
    ///
    pub south_north: f64,
}

/// A grid description. See the module docs for which fields each `grid_type` reads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    ///
    pub grid_type: GridType,
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ni: Option<usize>,
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nj: Option<usize>,
    /// Gaussian number, latitudes between pole and equator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<usize>,
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nside: Option<i64>,
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering: Option<PixelOrdering>,
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<RotationSpec>,
    /// Decimals kept on output coordinates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increments: Option<Increments>,
    /// Points per row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pl: Option<Vec<usize>>,
    /// Row latitudes for hand-made reduced grids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitudes: Option<Vec<f64>>,
    /// Points of an unstructured grid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<LatLon>>,
    /// Extra projections, run after the rotation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projections: Vec<ProjectionSpec>,
}

impl GridSpec {
    /// A description with only the layout set.
    pub fn new(grid_type: GridType) -> GridSpec {
        GridSpec {
            grid_type,
            ni: None,
            nj: None,
            n: None,
            nside: None,
            ordering: None,
            bbox: None,
            rotation: None,
            precision: None,
            increments: None,
            pl: None,
            latitudes: None,
            points: None,
            projections: Vec::new(),
        }
    }

    /// `ni` by `nj` regular lat/lon
    pub fn regular(ni: usize, nj: usize) -> GridSpec {
        GridSpec {
            ni: Some(ni),
            nj: Some(nj),
            ..GridSpec::new(GridType::RegularLatLon)
        }
    }

    /// Regular lat/lon by increments
    pub fn regular_increments(west_east: f64, south_north: f64) -> GridSpec {
        GridSpec {
            increments: Some(Increments {
                west_east,
                south_north,
            }),
            ..GridSpec::new(GridType::RegularLatLon)
        }
    }

    /// Classic reduced Gaussian
    pub fn reduced_gg(n: usize, pl: Vec<usize>) -> GridSpec {
        GridSpec {
            n: Some(n),
            pl: Some(pl),
            ..GridSpec::new(GridType::ReducedGaussian)
        }
    }

    /// Octahedral reduced Gaussian
    pub fn octahedral(n: usize) -> GridSpec {
        GridSpec {
            n: Some(n),
            ..GridSpec::new(GridType::Octahedral)
        }
    }

    /// Reduced lat/lon
    pub fn reduced_ll(pl: Vec<usize>) -> GridSpec {
        GridSpec {
            pl: Some(pl),
            ..GridSpec::new(GridType::ReducedLatLon)
        }
    }

    /// HEALPix
    pub fn healpix(nside: i64, ordering: PixelOrdering) -> GridSpec {
        GridSpec {
            nside: Some(nside),
            ordering: Some(ordering),
            ..GridSpec::new(GridType::Healpix)
        }
    }

    /// A list of points
    pub fn unstructured(points: Vec<LatLon>) -> GridSpec {
        GridSpec {
            points: Some(points),
            ..GridSpec::new(GridType::Unstructured)
        }
    }

    /// Sets the area
    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// Sets a rotated pole
    pub fn with_rotation(mut self, south_pole_lat: f64, south_pole_lon: f64, angle: f64) -> Self {
        self.rotation = Some(RotationSpec {
            south_pole_lat,
            south_pole_lon,
            angle,
        });
        self
    }

    /// Sets the output precision
    pub fn with_precision(mut self, decimals: u32) -> Self {
        self.precision = Some(decimals);
        self
    }

    /// Appends a projection
    pub fn with_projection(mut self, projection: ProjectionSpec) -> Self {
        self.projections.push(projection);
        self
    }

    /// The JSON form. Field order is fixed by the struct, so equal specs give equal text.
    pub fn to_json(&self) -> GridResult<String> {
        serde_json::to_string(self).map_err(|_| {
            GridError::ParsingError(ParsingError::RegularParsingError(
                "unable to serialise grid spec",
            ))
        })
    }

    /// Reads the JSON form back.
    pub fn from_json(json: &str) -> GridResult<GridSpec> {
        serde_json::from_str(json).map_err(|_| {
            GridError::ParsingError(ParsingError::RegularParsingError(
                "unable to parse grid spec json",
            ))
        })
    }

    fn checked_bbox(&self) -> GridResult<Option<BoundingBox>> {
        match &self.bbox {
            Some(b) => Ok(Some(BoundingBox::new(
                b.north(),
                b.west(),
                b.south(),
                b.east(),
            )?)),
            None => Ok(None),
        }
    }

    /// The projections every point goes through: rotation, then the listed projections,
    /// then rounding to `precision`.
    pub fn projections(&self) -> GridResult<Vec<Box<dyn Projection>>> {
        let mut projections: Vec<Box<dyn Projection>> = Vec::new();
        if let Some(r) = &self.rotation {
            projections.push(Box::new(Rotation::new(
                r.south_pole_lat,
                r.south_pole_lon,
                r.angle,
            )));
        }
        for p in &self.projections {
            projections.push(p.build()?);
        }
        if let Some(decimals) = self.precision {
            projections.push(Box::new(Rounding::new(decimals)));
        }
        Ok(projections)
    }

    /// The points of `grid`, which should be built from this spec, through
    /// [`GridSpec::projections`].
    pub fn iter<'a>(&self, grid: &'a Grid) -> GridResult<ComposedIterator<'a>> {
        Ok(self
            .projections()?
            .into_iter()
            .fold(IteratorComposer::new(grid.scanner()), |c, p| c.then_boxed(p))
            .build())
    }
}

fn required<T: Clone>(value: &Option<T>, name: &'static str) -> GridResult<T> {
    value
        .clone()
        .ok_or(GridError::ConfigError(ConfigError::MissingParameter(name)))
}

impl Grid {
    /// Lays out the grid a spec describes.
    pub fn from_spec(spec: &GridSpec) -> GridResult<Grid> {
        let bbox = spec.checked_bbox()?;
        let grid: Grid = match spec.grid_type {
            GridType::RegularLatLon => {
                let area = bbox.unwrap_or_else(BoundingBox::global);
                let grid = match spec.increments {
                    Some(inc) => RegularGrid::from_increments(area, inc.west_east, inc.south_north)?,
                    None => RegularGrid::new(area, required(&spec.ni, "ni")?, required(&spec.nj, "nj")?)?,
                };
                return Ok(grid.into());
            }
            GridType::ReducedGaussian => {
                ReducedGrid::classic_gaussian(required(&spec.n, "n")?, required(&spec.pl, "pl")?)?.into()
            }
            GridType::Octahedral => ReducedGrid::octahedral(required(&spec.n, "n")?)?.into(),
            GridType::ReducedLatLon => ReducedGrid::reduced_ll(required(&spec.pl, "pl")?)?.into(),
            GridType::Reduced => ReducedGrid::new(
                required(&spec.latitudes, "latitudes")?,
                required(&spec.pl, "pl")?,
            )?
            .into(),
            GridType::Healpix => HealpixGrid::new(
                required(&spec.nside, "nside")?,
                spec.ordering.unwrap_or(PixelOrdering::Ring),
            )?
            .into(),
            GridType::Unstructured => {
                UnstructuredGrid::new(required(&spec.points, "points")?).into()
            }
        };
        match bbox {
            Some(b) if !b.is_global() => grid.cropped(&b),
            _ => Ok(grid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_from_spec() {
        let grid = Grid::from_spec(&GridSpec::regular(8, 4)).unwrap();
        assert_eq!(grid.size(), 32);
        assert_eq!(grid.grid_type(), GridType::RegularLatLon);
        let grid = Grid::from_spec(&GridSpec::regular_increments(1.0, 1.0)).unwrap();
        assert_eq!(grid.size(), 360 * 181);
    }

    #[test]
    fn missing_parameters_are_named() {
        let mut spec = GridSpec::regular(8, 4);
        spec.nj = None;
        match Grid::from_spec(&spec) {
            Err(GridError::ConfigError(ConfigError::MissingParameter(p))) => assert_eq!(p, "nj"),
            other => panic!("expected a missing parameter, got {:?}", other),
        }
        assert!(Grid::from_spec(&GridSpec::new(GridType::Healpix))
            .unwrap_err()
            .is_config_error());
    }

    #[test]
    fn bbox_crops_other_layouts() {
        let bbox = BoundingBox::new(90.0, 0.0, 0.0, 90.0).unwrap();
        let full = Grid::from_spec(&GridSpec::octahedral(16)).unwrap();
        let cropped = Grid::from_spec(&GridSpec::octahedral(16).with_bbox(bbox)).unwrap();
        assert!(cropped.size() < full.size());
        assert!(cropped.points().all(|p| bbox.contains(&p)));
    }

    #[test]
    fn malformed_bbox_is_caught() {
        let mut spec = GridSpec::octahedral(4);
        spec.bbox = Some(serde_json::from_str(r#"{"north":0,"west":0,"south":10,"east":20}"#).unwrap());
        assert!(Grid::from_spec(&spec).unwrap_err().is_config_error());
    }

    #[test]
    fn json_round_trip_is_stable() {
        let spec = GridSpec::healpix(8, PixelOrdering::Nest)
            .with_rotation(-40.0, 10.0, 0.0)
            .with_precision(4);
        let json = spec.to_json().unwrap();
        assert_eq!(GridSpec::from_json(&json).unwrap(), spec);
        assert_eq!(spec.clone().to_json().unwrap(), json);
        assert!(json.contains(r#""grid_type":"healpix""#));
        assert!(json.contains(r#""ordering":"nest""#));
    }

    #[test]
    fn iter_applies_rotation_then_precision() {
        let spec = GridSpec::unstructured(vec![LatLon::new(0.0, 0.0)])
            .with_rotation(-40.0, 10.0, 0.0)
            .with_precision(3);
        let grid = Grid::from_spec(&spec).unwrap();
        let points: Vec<LatLon> = spec.iter(&grid).unwrap().collect();
        assert_eq!(points[0].lat, 50.0);
        assert_eq!(points[0].lon, 10.0);
    }
}
