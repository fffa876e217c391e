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

//! Coordinate transforms applied point by point while iterating.

use crate::errors::*;
use crate::points::{LatLon, Point3};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A pointwise map on geographic coordinates.
pub trait Projection: Debug + Send + Sync {
    /// Maps one point
    fn project(&self, p: LatLon) -> LatLon;
    /// Short name, as used in [`ProjectionSpec::kind`]
    fn name(&self) -> &'static str;
}

type Matrix3 = [[f64; 3]; 3];

fn mul(m: &Matrix3, v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

fn mul_transposed(m: &Matrix3, v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[1][0] * v[1] + m[2][0] * v[2],
        m[0][1] * v[0] + m[1][1] * v[1] + m[2][1] * v[2],
        m[0][2] * v[0] + m[1][2] * v[1] + m[2][2] * v[2],
    ]
}

/// Rotated-pole coordinates. The grid's south pole sits at
/// `(south_pole_lat, south_pole_lon)` and rotated longitudes are turned by `angle` first.
///
/// [`Projection::project`] takes rotated coordinates to geographic ones.
#[derive(Clone, Debug, PartialEq)]
pub struct Rotation {
    south_pole_lat: f64,
    south_pole_lon: f64,
    angle: f64,
    // Rz(south_pole_lon) * Ry(-(90 + south_pole_lat))
    matrix: Matrix3,
}

impl Rotation {
    ///
    pub fn new(south_pole_lat: f64, south_pole_lon: f64, angle: f64) -> Rotation {
        let (sl, cl) = south_pole_lon.to_radians().sin_cos();
        let (st, ct) = (-(90.0 + south_pole_lat)).to_radians().sin_cos();
        let rz = [[cl, -sl, 0.0], [sl, cl, 0.0], [0.0, 0.0, 1.0]];
        let ry = [[ct, 0.0, st], [0.0, 1.0, 0.0], [-st, 0.0, ct]];
        let mut matrix = [[0.0; 3]; 3];
        for (i, row) in matrix.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| rz[i][k] * ry[k][j]).sum();
            }
        }
        Rotation {
            south_pole_lat,
            south_pole_lon,
            angle,
            matrix,
        }
    }

    ///
    pub fn south_pole(&self) -> LatLon {
        LatLon::new(self.south_pole_lat, self.south_pole_lon)
    }

    ///
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Rotated to geographic.
    pub fn unrotate(&self, p: LatLon) -> LatLon {
        let turned = LatLon::new(p.lat, p.lon + self.angle);
        let v = mul(&self.matrix, turned.to_point3(1.0).into());
        Point3::from(v).to_latlon()
    }

    /// Geographic to rotated.
    pub fn rotate(&self, p: LatLon) -> LatLon {
        let v = mul_transposed(&self.matrix, p.to_point3(1.0).into());
        let r = Point3::from(v).to_latlon();
        LatLon::new(r.lat, r.lon - self.angle)
    }
}

impl Projection for Rotation {
    fn project(&self, p: LatLon) -> LatLon {
        self.unrotate(p)
    }

    fn name(&self) -> &'static str {
        "rotation"
    }
}

/// `(lon, lat) -> M * (lon, lat, 1)` for a 2 x 3 matrix `M`.
#[derive(Clone, Debug, PartialEq)]
pub struct AffineRemap {
    matrix: [[f64; 3]; 2],
}

impl AffineRemap {
    ///
    pub fn new(matrix: [[f64; 3]; 2]) -> AffineRemap {
        AffineRemap { matrix }
    }

    ///
    pub fn identity() -> AffineRemap {
        AffineRemap::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
    }

    /// Shift by `dlon`, `dlat`.
    pub fn translation(dlon: f64, dlat: f64) -> AffineRemap {
        AffineRemap::new([[1.0, 0.0, dlon], [0.0, 1.0, dlat]])
    }
}

impl Projection for AffineRemap {
    fn project(&self, p: LatLon) -> LatLon {
        let m = &self.matrix;
        LatLon::new(
            m[1][0] * p.lon + m[1][1] * p.lat + m[1][2],
            m[0][0] * p.lon + m[0][1] * p.lat + m[0][2],
        )
    }

    fn name(&self) -> &'static str {
        "affine"
    }
}

/// Rounds both coordinates to a number of decimals.
#[derive(Clone, Debug, PartialEq)]
pub struct Rounding {
    scale: f64,
}

impl Rounding {
    ///
    pub fn new(decimals: u32) -> Rounding {
        Rounding {
            scale: 10f64.powi(decimals as i32),
        }
    }
}

impl Projection for Rounding {
    fn project(&self, p: LatLon) -> LatLon {
        LatLon::new(
            (p.lat * self.scale).round() / self.scale,
            (p.lon * self.scale).round() / self.scale,
        )
    }

    fn name(&self) -> &'static str {
        "rounding"
    }
}

/// Serialisable description of a projection. Which fields are read depends on `kind`:
/// `rotation` uses the south pole and `angle`, `affine` uses `matrix`, `rounding` uses
/// `decimals`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSpec {
    ///
    pub kind: String,
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub south_pole_lat: Option<f64>,
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub south_pole_lon: Option<f64>,
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[[f64; 3]; 2]>,
    ///
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

impl ProjectionSpec {
    /// A rotated pole
    pub fn rotation(south_pole_lat: f64, south_pole_lon: f64, angle: f64) -> ProjectionSpec {
        ProjectionSpec {
            kind: "rotation".to_string(),
            south_pole_lat: Some(south_pole_lat),
            south_pole_lon: Some(south_pole_lon),
            angle: Some(angle),
            ..Default::default()
        }
    }

    /// An affine remap
    pub fn affine(matrix: [[f64; 3]; 2]) -> ProjectionSpec {
        ProjectionSpec {
            kind: "affine".to_string(),
            matrix: Some(matrix),
            ..Default::default()
        }
    }

    /// Rounding to `decimals`
    pub fn rounding(decimals: u32) -> ProjectionSpec {
        ProjectionSpec {
            kind: "rounding".to_string(),
            decimals: Some(decimals),
            ..Default::default()
        }
    }

    /// Builds the projection this describes.
    pub fn build(&self) -> GridResult<Box<dyn Projection>> {
        match self.kind.as_str() {
            "rotation" => match (self.south_pole_lat, self.south_pole_lon) {
                (Some(lat), Some(lon)) => Ok(Box::new(Rotation::new(
                    lat,
                    lon,
                    self.angle.unwrap_or(0.0),
                ))),
                (None, _) => Err(ConfigError::MissingParameter("south_pole_lat").into()),
                (_, None) => Err(ConfigError::MissingParameter("south_pole_lon").into()),
            },
            "affine" => match self.matrix {
                Some(m) => Ok(Box::new(AffineRemap::new(m))),
                None => Err(ConfigError::MissingParameter("matrix").into()),
            },
            "rounding" => match self.decimals {
                Some(d) => Ok(Box::new(Rounding::new(d))),
                None => Err(ConfigError::MissingParameter("decimals").into()),
            },
            other => Err(ConfigError::UnsupportedProjection(other.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_south_pole_is_identity() {
        let r = Rotation::new(-90.0, 0.0, 0.0);
        for p in [LatLon::new(10.0, 20.0), LatLon::new(-45.0, -170.0)].iter() {
            assert!(r.unrotate(*p).approx_eq(p, 1e-9));
            assert!(r.rotate(*p).approx_eq(p, 1e-9));
        }
    }

    #[test]
    fn rotated_origin() {
        let r = Rotation::new(-40.0, 10.0, 0.0);
        let g = r.unrotate(LatLon::new(0.0, 0.0));
        assert_approx_eq!(g.lat, 50.0, 1e-9);
        assert_approx_eq!(g.lon, 10.0, 1e-9);
        // the rotated north pole is the antipode of the south pole
        let n = r.unrotate(LatLon::new(90.0, 0.0));
        assert_approx_eq!(n.lat, 40.0, 1e-9);
    }

    #[test]
    fn rotate_inverts_unrotate() {
        let r = Rotation::new(-30.0, 45.0, 15.0);
        let p = LatLon::new(12.5, -33.0);
        assert!(r.rotate(r.unrotate(p)).approx_eq(&p, 1e-9));
        assert_eq!(r.name(), "rotation");
    }

    #[test]
    fn affine_and_rounding() {
        let a = AffineRemap::translation(360.0, 0.0);
        let p = a.project(LatLon::new(10.0, -20.0));
        assert_approx_eq!(p.lon, 340.0);
        assert_approx_eq!(p.lat, 10.0);
        assert_eq!(AffineRemap::identity().project(p).lon, 340.0);

        let r = Rounding::new(2).project(LatLon::new(1.23456, -7.891));
        assert_approx_eq!(r.lat, 1.23);
        assert_approx_eq!(r.lon, -7.89);
    }

    #[test]
    fn specs_build() {
        assert_eq!(ProjectionSpec::rotation(-40.0, 10.0, 0.0).build().unwrap().name(), "rotation");
        assert_eq!(ProjectionSpec::rounding(3).build().unwrap().name(), "rounding");
        let unknown = ProjectionSpec {
            kind: "mercator".to_string(),
            ..Default::default()
        };
        match unknown.build() {
            Err(GridError::ConfigError(ConfigError::UnsupportedProjection(k))) => {
                assert_eq!(k, "mercator")
            }
            other => panic!("expected an unsupported projection, got {:?}", other.map(|p| p.name())),
        }
        let missing = ProjectionSpec {
            kind: "affine".to_string(),
            ..Default::default()
        };
        assert!(missing.build().unwrap_err().is_config_error());
    }
}
