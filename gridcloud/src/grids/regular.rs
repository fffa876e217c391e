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

use super::*;

/// Regular latitude/longitude grid. Both axes are linear spacings, latitudes run north to
/// south and every row has the same longitudes.
#[derive(Clone, Debug, PartialEq)]
pub struct RegularGrid {
    bbox: BoundingBox,
    lon: LinearSpacing,
    lat: LinearSpacing,
}

impl RegularGrid {
    /// `ni` longitudes by `nj` latitudes spanning `bbox`. On a west-east periodic box the
    /// east edge is the west edge again and is not repeated.
    pub fn new(bbox: BoundingBox, ni: usize, nj: usize) -> GridResult<RegularGrid> {
        if ni == 0 || nj == 0 {
            return Err(GridError::invalid(format!(
                "a regular grid needs ni and nj above zero, got {} x {}",
                ni, nj
            )));
        }
        let lon_step = if bbox.is_periodic_west_east() {
            360.0 / ni as f64
        } else if ni == 1 {
            0.0
        } else {
            bbox.width() / (ni - 1) as f64
        };
        let lat_step = if nj == 1 {
            0.0
        } else {
            -bbox.height() / (nj - 1) as f64
        };
        Ok(RegularGrid {
            bbox,
            lon: LinearSpacing::new(bbox.west(), lon_step, ni),
            lat: LinearSpacing::new(bbox.north(), lat_step, nj),
        })
    }

    /// A grid with the given increments, anchored at the north-west corner of `bbox`.
    pub fn from_increments(
        bbox: BoundingBox,
        west_east_increment: f64,
        south_north_increment: f64,
    ) -> GridResult<RegularGrid> {
        if !(west_east_increment > 0.0 && south_north_increment > 0.0) {
            return Err(GridError::invalid(format!(
                "increments must be positive, got {} and {}",
                west_east_increment, south_north_increment
            )));
        }
        let ni = if bbox.is_periodic_west_east() {
            let n = 360.0 / west_east_increment;
            if (n - n.round()).abs() > 1e-6 {
                return Err(GridError::invalid(format!(
                    "west-east increment {} does not divide the globe",
                    west_east_increment
                )));
            }
            n.round() as usize
        } else {
            (bbox.width() / west_east_increment + 1e-9).floor() as usize + 1
        };
        let nj = (bbox.height() / south_north_increment + 1e-9).floor() as usize + 1;
        Ok(RegularGrid {
            bbox,
            lon: LinearSpacing::new(bbox.west(), west_east_increment, ni),
            lat: LinearSpacing::new(bbox.north(), -south_north_increment, nj),
        })
    }

    /// Points per row
    pub fn ni(&self) -> usize {
        self.lon.count
    }

    /// Number of rows
    pub fn nj(&self) -> usize {
        self.lat.count
    }

    ///
    pub fn size(&self) -> usize {
        self.lon.count * self.lat.count
    }

    ///
    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    /// The longitude rule
    pub fn lon_spacing(&self) -> LinearSpacing {
        self.lon
    }

    /// The latitude rule
    pub fn lat_spacing(&self) -> LinearSpacing {
        self.lat
    }

    ///
    pub fn latitudes(&self) -> Vec<f64> {
        self.lat.values()
    }

    ///
    pub fn longitudes(&self) -> Vec<f64> {
        self.lon.values()
    }

    /// Point `index`, row major.
    pub fn point(&self, index: usize) -> LatLon {
        assert!(
            index < self.size(),
            "point {} out of range ({} points)",
            index,
            self.size()
        );
        let ni = self.lon.count;
        LatLon::new(self.lat.value(index / ni), self.lon.value(index % ni))
    }

    pub(crate) fn cropped(&self, bbox: &BoundingBox) -> GridResult<Grid> {
        let region = self.bbox.intersection(bbox).unwrap_or(*bbox);
        let rows: Vec<f64> = self
            .lat
            .values()
            .into_iter()
            .filter(|lat| in_band(*lat, bbox))
            .collect();
        let (lons, contiguous) = kept_run(self.lon.values().into_iter(), self.lon.step, bbox);

        if rows.is_empty() || lons.is_empty() {
            return Ok(Grid::Regular(RegularGrid {
                bbox: region,
                lon: LinearSpacing::new(region.west(), self.lon.step, 0),
                lat: LinearSpacing::new(region.north(), self.lat.step, 0),
            }));
        }
        if contiguous {
            Ok(Grid::Regular(RegularGrid {
                bbox: region,
                lon: LinearSpacing::new(lons[0], self.lon.step, lons.len()),
                lat: LinearSpacing::new(rows[0], self.lat.step, rows.len()),
            }))
        } else {
            debug!("crop splits the rows of a regular grid, keeping an unstructured list");
            let points = rows
                .iter()
                .flat_map(|lat| lons.iter().map(move |lon| LatLon::new(*lat, *lon)))
                .collect();
            Ok(Grid::Unstructured(UnstructuredGrid::new(points)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_grid_does_not_repeat_the_seam() {
        let g = RegularGrid::new(BoundingBox::global(), 8, 5).unwrap();
        assert_eq!(g.size(), 40);
        let lons = g.longitudes();
        assert_approx_eq!(lons[7], 315.0);
        assert_eq!(g.latitudes(), vec![90.0, 45.0, 0.0, -45.0, -90.0]);
    }

    #[test]
    fn regional_grid_hits_both_edges() {
        let bbox = BoundingBox::new(10.0, -10.0, -10.0, 10.0).unwrap();
        let g = RegularGrid::new(bbox, 5, 3).unwrap();
        assert_eq!(g.longitudes(), vec![-10.0, -5.0, 0.0, 5.0, 10.0]);
        assert_eq!(g.latitudes(), vec![10.0, 0.0, -10.0]);
    }

    #[test]
    fn increments() {
        let g = RegularGrid::from_increments(BoundingBox::global(), 1.5, 1.5).unwrap();
        assert_eq!(g.ni(), 240);
        assert_eq!(g.nj(), 121);
        assert!(RegularGrid::from_increments(BoundingBox::global(), 7.0, 1.0)
            .unwrap_err()
            .is_config_error());
        let bbox = BoundingBox::new(50.0, 0.0, 40.0, 10.0).unwrap();
        let g = RegularGrid::from_increments(bbox, 0.25, 0.5).unwrap();
        assert_eq!(g.ni(), 41);
        assert_eq!(g.nj(), 21);
    }

    #[test]
    fn zero_counts_are_rejected() {
        assert!(RegularGrid::new(BoundingBox::global(), 0, 4).is_err());
    }

    #[test]
    fn row_major_points() {
        let g = RegularGrid::new(BoundingBox::global(), 4, 3).unwrap();
        assert_eq!(g.point(5), LatLon::new(0.0, 90.0));
    }

    #[test]
    fn crop_keeps_a_regular_grid() {
        let g = RegularGrid::new(BoundingBox::global(), 8, 5).unwrap();
        let bbox = BoundingBox::new(50.0, -50.0, -10.0, 50.0).unwrap();
        match g.cropped(&bbox).unwrap() {
            Grid::Regular(c) => {
                assert_eq!(c.longitudes(), vec![-45.0, 0.0, 45.0]);
                assert_eq!(c.latitudes(), vec![45.0, 0.0]);
                assert_eq!(c.size(), 6);
            }
            other => panic!("expected a regular grid, got {:?}", other),
        }
    }

    #[test]
    fn crop_outside_is_empty() {
        let bbox = BoundingBox::new(10.0, 0.0, -10.0, 40.0).unwrap();
        let g = RegularGrid::new(bbox, 5, 5).unwrap();
        let far = BoundingBox::new(10.0, 100.0, -10.0, 120.0).unwrap();
        assert_eq!(g.cropped(&far).unwrap().size(), 0);
    }
}
