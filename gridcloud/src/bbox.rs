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

//! Latitude/longitude boxes. The east edge is kept in `[west, west + 360]`, so a box is
//! always the arc going east from `west`.

use crate::errors::*;
use crate::points::{LatLon, POINT_EPSILON};
use serde::{Deserialize, Serialize};

/// An area bounded by two parallels and two meridians.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    north: f64,
    west: f64,
    south: f64,
    east: f64,
}

impl Default for BoundingBox {
    fn default() -> BoundingBox {
        BoundingBox::global()
    }
}

impl BoundingBox {
    /// Checks the edges and moves `east` into `[west, west + 360]`.
    pub fn new(north: f64, west: f64, south: f64, east: f64) -> GridResult<BoundingBox> {
        let malformed = |m: String| GridError::ConfigError(ConfigError::MalformedBoundingBox(m));
        if !(north.is_finite() && west.is_finite() && south.is_finite() && east.is_finite()) {
            return Err(malformed(format!(
                "non-finite edge in [{}, {}, {}, {}]",
                north, west, south, east
            )));
        }
        if south < -90.0 || north > 90.0 {
            return Err(malformed(format!(
                "latitudes {} and {} outside [-90, 90]",
                south, north
            )));
        }
        if south > north {
            return Err(malformed(format!(
                "south {} is north of north {}",
                south, north
            )));
        }
        let width = east - west;
        let width = if width >= 360.0 {
            360.0
        } else if width >= 0.0 {
            width
        } else {
            width.rem_euclid(360.0)
        };
        Ok(BoundingBox {
            north,
            west,
            south,
            east: west + width,
        })
    }

    /// The whole sphere, `[90, 0, -90, 360]`.
    pub fn global() -> BoundingBox {
        BoundingBox {
            north: 90.0,
            west: 0.0,
            south: -90.0,
            east: 360.0,
        }
    }

    ///
    pub fn north(&self) -> f64 {
        self.north
    }

    ///
    pub fn west(&self) -> f64 {
        self.west
    }

    ///
    pub fn south(&self) -> f64 {
        self.south
    }

    ///
    pub fn east(&self) -> f64 {
        self.east
    }

    /// Degrees of longitude covered
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Degrees of latitude covered
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// True if the box wraps all the way around.
    pub fn is_periodic_west_east(&self) -> bool {
        self.width() >= 360.0 - POINT_EPSILON
    }

    /// True if both poles are inside.
    pub fn is_global(&self) -> bool {
        self.is_periodic_west_east()
            && self.north >= 90.0 - POINT_EPSILON
            && self.south <= -90.0 + POINT_EPSILON
    }

    /// Membership test, longitudes taken modulo 360.
    pub fn contains(&self, p: &LatLon) -> bool {
        if p.lat > self.north + POINT_EPSILON || p.lat < self.south - POINT_EPSILON {
            return false;
        }
        self.contains_lon(p.lon)
    }

    /// Longitude half of [`BoundingBox::contains`].
    pub fn contains_lon(&self, lon: f64) -> bool {
        if self.is_periodic_west_east() {
            return true;
        }
        let offset = (lon - self.west).rem_euclid(360.0);
        offset <= self.width() + POINT_EPSILON || 360.0 - offset <= POINT_EPSILON
    }

    /// `lon` moved into `[west, west + 360)`, values just west of the seam count as on it.
    pub fn wrap_lon(&self, lon: f64) -> f64 {
        let offset = (lon - self.west).rem_euclid(360.0);
        if 360.0 - offset <= POINT_EPSILON {
            self.west
        } else {
            self.west + offset
        }
    }

    /// The overlap of two boxes, `None` if they are disjoint. When the longitude overlap
    /// falls into two pieces the western one, seen from `self.west`, is kept.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let north = self.north.min(other.north);
        let south = self.south.max(other.south);
        if south > north {
            return None;
        }
        let (west, east) = if other.is_periodic_west_east() {
            (self.west, self.east)
        } else if self.is_periodic_west_east() {
            (other.west, other.east)
        } else {
            let ow = self.west + (other.west - self.west).rem_euclid(360.0);
            let candidates = [
                (self.west.max(ow - 360.0), self.east.min(ow - 360.0 + other.width())),
                (self.west.max(ow), self.east.min(ow + other.width())),
            ];
            *candidates
                .iter()
                .find(|(w, e)| *w <= *e + POINT_EPSILON)?
        };
        Some(BoundingBox {
            north,
            west,
            south,
            east: east.max(west),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed() {
        assert!(BoundingBox::new(10.0, 0.0, 20.0, 10.0)
            .unwrap_err()
            .is_config_error());
        assert!(BoundingBox::new(91.0, 0.0, 0.0, 10.0).is_err());
        assert!(BoundingBox::new(10.0, f64::NAN, 0.0, 10.0).is_err());
    }

    #[test]
    fn east_is_normalised() {
        let b = BoundingBox::new(10.0, 350.0, -10.0, 10.0).unwrap();
        assert_approx_eq!(b.east(), 370.0);
        assert_approx_eq!(b.width(), 20.0);
        let b = BoundingBox::new(10.0, -180.0, -10.0, 540.0).unwrap();
        assert!(b.is_periodic_west_east());
    }

    #[test]
    fn contains_across_the_seam() {
        let b = BoundingBox::new(10.0, 350.0, -10.0, 10.0).unwrap();
        assert!(b.contains(&LatLon::new(0.0, 5.0)));
        assert!(b.contains(&LatLon::new(0.0, -5.0)));
        assert!(b.contains(&LatLon::new(0.0, 355.0)));
        assert!(!b.contains(&LatLon::new(0.0, 20.0)));
        assert!(!b.contains(&LatLon::new(11.0, 0.0)));
        assert!(BoundingBox::global().contains(&LatLon::new(-90.0, 77.0)));
    }

    #[test]
    fn intersections() {
        let a = BoundingBox::new(50.0, 0.0, 0.0, 90.0).unwrap();
        let b = BoundingBox::new(60.0, 45.0, 20.0, 180.0).unwrap();
        let c = a.intersection(&b).unwrap();
        assert_approx_eq!(c.north(), 50.0);
        assert_approx_eq!(c.south(), 20.0);
        assert_approx_eq!(c.west(), 45.0);
        assert_approx_eq!(c.east(), 90.0);

        let seam = BoundingBox::new(10.0, -20.0, -10.0, 20.0).unwrap();
        let c = a.intersection(&seam).unwrap();
        assert_approx_eq!(c.west(), 0.0);
        assert_approx_eq!(c.east(), 20.0);

        let far = BoundingBox::new(10.0, 180.0, -10.0, 200.0).unwrap();
        assert!(a.intersection(&far).is_none());
        let south = BoundingBox::new(-10.0, 0.0, -20.0, 90.0).unwrap();
        assert!(a.intersection(&south).is_none());
        assert_eq!(a.intersection(&BoundingBox::global()), Some(a));
    }
}
