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

/// A grid that is only a list of points.
#[derive(Clone, Debug, PartialEq)]
pub struct UnstructuredGrid {
    points: Vec<LatLon>,
}

impl UnstructuredGrid {
    ///
    pub fn new(points: Vec<LatLon>) -> UnstructuredGrid {
        UnstructuredGrid { points }
    }

    ///
    pub fn size(&self) -> usize {
        self.points.len()
    }

    ///
    pub fn points(&self) -> &[LatLon] {
        &self.points
    }

    ///
    pub fn point(&self, index: usize) -> LatLon {
        self.points[index]
    }

    /// Smallest box holding every point. The longitude range is the span of the raw
    /// longitudes, global when the list is empty.
    pub fn bounding_box(&self) -> BoundingBox {
        if self.points.is_empty() {
            return BoundingBox::global();
        }
        let mut north = f64::MIN;
        let mut south = f64::MAX;
        let mut west = f64::MAX;
        let mut east = f64::MIN;
        for p in &self.points {
            north = north.max(p.lat);
            south = south.min(p.lat);
            west = west.min(p.lon);
            east = east.max(p.lon);
        }
        BoundingBox::new(north, west, south, east).unwrap_or_else(|_| BoundingBox::global())
    }

    pub(crate) fn cropped(&self, bbox: &BoundingBox) -> UnstructuredGrid {
        UnstructuredGrid {
            points: self
                .points
                .iter()
                .filter(|p| bbox.contains(p))
                .copied()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_and_crop() {
        let g = UnstructuredGrid::new(vec![
            LatLon::new(10.0, 5.0),
            LatLon::new(-20.0, 40.0),
            LatLon::new(30.0, -10.0),
        ]);
        let b = g.bounding_box();
        assert_eq!(b.north(), 30.0);
        assert_eq!(b.south(), -20.0);
        assert_eq!(b.west(), -10.0);
        assert_eq!(b.east(), 40.0);

        let crop = g.cropped(&BoundingBox::new(20.0, 0.0, -30.0, 50.0).unwrap());
        assert_eq!(crop.size(), 2);
        assert_eq!(crop.point(1), LatLon::new(-20.0, 40.0));
    }
}
