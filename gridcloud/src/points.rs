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

//! Point types. All of them are `Copy` and compare approximately.

use serde::{Deserialize, Serialize};

/// Tolerance used by the `PartialEq` impls below.
pub const POINT_EPSILON: f64 = 1e-9;

/// Mean earth radius in metres, the default sphere for 3D embeddings.
pub const EARTH_RADIUS: f64 = 6_371_229.0;

/// Geographic coordinates in degrees.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct LatLon {
    /// Latitude, positive north
    pub lat: f64,
    /// Longitude, positive east. Not normalised.
    pub lon: f64,
}

impl LatLon {
    ///
    pub fn new(lat: f64, lon: f64) -> LatLon {
        LatLon { lat, lon }
    }

    /// Longitude moved into `[minimum, minimum + 360)`.
    pub fn normalised_lon(&self, minimum: f64) -> f64 {
        minimum + (self.lon - minimum).rem_euclid(360.0)
    }

    /// True at either pole, where every longitude names the same point.
    pub fn is_pole(&self, eps: f64) -> bool {
        (90.0 - self.lat.abs()) <= eps
    }

    /// Latitudes within `eps`, longitudes within `eps` modulo 360.
    pub fn approx_eq(&self, other: &LatLon, eps: f64) -> bool {
        if (self.lat - other.lat).abs() > eps {
            return false;
        }
        if self.is_pole(eps) && other.is_pole(eps) {
            return true;
        }
        let d = (self.lon - other.lon).rem_euclid(360.0);
        d.min(360.0 - d) <= eps
    }

    /// Planar embedding, `x = lon`, `y = lat`.
    pub fn to_point2(&self) -> Point2 {
        Point2 {
            x: self.lon,
            y: self.lat,
        }
    }

    /// Cartesian coordinates on a sphere of the given radius.
    pub fn to_point3(&self, radius: f64) -> Point3 {
        let (slat, clat) = self.lat.to_radians().sin_cos();
        let (slon, clon) = self.lon.to_radians().sin_cos();
        Point3 {
            x: radius * clat * clon,
            y: radius * clat * slon,
            z: radius * slat,
        }
    }

    /// Cartesian coordinates on an ellipsoid of revolution with semi-major axis `a` and
    /// semi-minor axis `b`, at zero height. Latitude is geodetic.
    pub fn to_point3_ellipsoid(&self, a: f64, b: f64) -> Point3 {
        let (slat, clat) = self.lat.to_radians().sin_cos();
        let (slon, clon) = self.lon.to_radians().sin_cos();
        let n = a * a / (a * a * clat * clat + b * b * slat * slat).sqrt();
        Point3 {
            x: n * clat * clon,
            y: n * clat * slon,
            z: (b * b) / (a * a) * n * slat,
        }
    }
}

impl PartialEq for LatLon {
    fn eq(&self, other: &LatLon) -> bool {
        self.approx_eq(other, POINT_EPSILON)
    }
}

/// A point in the plane.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct Point2 {
    ///
    pub x: f64,
    ///
    pub y: f64,
}

impl Point2 {
    ///
    pub fn new(x: f64, y: f64) -> Point2 {
        Point2 { x, y }
    }

    /// Euclidean distance
    pub fn distance(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    ///
    pub fn approx_eq(&self, other: &Point2, eps: f64) -> bool {
        (self.x - other.x).abs() <= eps && (self.y - other.y).abs() <= eps
    }
}

impl PartialEq for Point2 {
    fn eq(&self, other: &Point2) -> bool {
        self.approx_eq(other, POINT_EPSILON)
    }
}

impl From<[f64; 2]> for Point2 {
    fn from(c: [f64; 2]) -> Point2 {
        Point2 { x: c[0], y: c[1] }
    }
}

impl From<Point2> for [f64; 2] {
    fn from(p: Point2) -> [f64; 2] {
        [p.x, p.y]
    }
}

/// A point in space, usually an earth-centred cartesian embedding of a [`LatLon`].
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct Point3 {
    ///
    pub x: f64,
    ///
    pub y: f64,
    ///
    pub z: f64,
}

impl Point3 {
    ///
    pub fn new(x: f64, y: f64, z: f64) -> Point3 {
        Point3 { x, y, z }
    }

    /// Euclidean (chord) distance
    pub fn distance(&self, other: &Point3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    ///
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Spherical latitude and longitude of the direction of this point.
    pub fn to_latlon(&self) -> LatLon {
        LatLon {
            lat: self.z.atan2(self.x.hypot(self.y)).to_degrees(),
            lon: self.y.atan2(self.x).to_degrees(),
        }
    }

    ///
    pub fn approx_eq(&self, other: &Point3, eps: f64) -> bool {
        (self.x - other.x).abs() <= eps
            && (self.y - other.y).abs() <= eps
            && (self.z - other.z).abs() <= eps
    }
}

impl PartialEq for Point3 {
    fn eq(&self, other: &Point3) -> bool {
        self.approx_eq(other, POINT_EPSILON)
    }
}

impl From<[f64; 3]> for Point3 {
    fn from(c: [f64; 3]) -> Point3 {
        Point3 {
            x: c[0],
            y: c[1],
            z: c[2],
        }
    }
}

impl From<Point3> for [f64; 3] {
    fn from(p: Point3) -> [f64; 3] {
        [p.x, p.y, p.z]
    }
}

/// Any of the above.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Point {
    /// Geographic
    LatLon(LatLon),
    /// Planar
    Planar(Point2),
    /// Spatial
    Spatial(Point3),
}

impl From<LatLon> for Point {
    fn from(p: LatLon) -> Point {
        Point::LatLon(p)
    }
}

impl From<Point2> for Point {
    fn from(p: Point2) -> Point {
        Point::Planar(p)
    }
}

impl From<Point3> for Point {
    fn from(p: Point3) -> Point {
        Point::Spatial(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longitudes_compare_modulo_360() {
        assert_eq!(LatLon::new(10.0, -170.0), LatLon::new(10.0, 190.0));
        assert_eq!(LatLon::new(0.0, 359.9999999999), LatLon::new(0.0, 0.0));
        assert_ne!(LatLon::new(0.0, 1.0), LatLon::new(0.0, 2.0));
    }

    #[test]
    fn poles_ignore_longitude() {
        assert_eq!(LatLon::new(90.0, 0.0), LatLon::new(90.0, 123.0));
        assert_ne!(LatLon::new(90.0, 0.0), LatLon::new(-90.0, 0.0));
    }

    #[test]
    fn sphere_round_trip() {
        let p = LatLon::new(45.0, -120.0);
        let q = p.to_point3(1.0);
        assert_approx_eq!(q.norm(), 1.0);
        assert!(q.to_latlon().approx_eq(&p, 1e-9));
    }

    #[test]
    fn ellipsoid_axes() {
        let a = 6_378_137.0;
        let b = 6_356_752.314_245;
        let equator = LatLon::new(0.0, 0.0).to_point3_ellipsoid(a, b);
        assert_approx_eq!(equator.x, a, 1e-6);
        let pole = LatLon::new(90.0, 0.0).to_point3_ellipsoid(a, b);
        assert_approx_eq!(pole.z, b, 1e-6);
        assert_approx_eq!(pole.x, 0.0, 1e-6);
    }

    #[test]
    fn planar_embedding() {
        let p = LatLon::new(12.0, 34.0).to_point2();
        assert_eq!(p, Point2::new(34.0, 12.0));
        assert_approx_eq!(p.distance(&Point2::new(37.0, 16.0)), 5.0);
    }
}
