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
use core_geogrid::{Healpix, PixelOrdering};

/// A HEALPix grid. The geometry is always held as rings; in nested order point `k` is the
/// ring point `nest_to_ring(k)`.
#[derive(Clone, Debug)]
pub struct HealpixGrid {
    healpix: Healpix,
    ordering: PixelOrdering,
    rings: ReducedGrid,
}

impl HealpixGrid {
    ///
    pub fn new(nside: i64, ordering: PixelOrdering) -> GridResult<HealpixGrid> {
        Ok(HealpixGrid {
            healpix: Healpix::new(nside)?,
            ordering,
            rings: ReducedGrid::healpix(nside)?,
        })
    }

    ///
    pub fn nside(&self) -> u32 {
        self.healpix.nside()
    }

    ///
    pub fn ordering(&self) -> PixelOrdering {
        self.ordering
    }

    /// The same pixels numbered the other way.
    pub fn with_ordering(&self, ordering: PixelOrdering) -> HealpixGrid {
        HealpixGrid {
            ordering,
            ..self.clone()
        }
    }

    ///
    pub fn healpix(&self) -> &Healpix {
        &self.healpix
    }

    /// The ring layout, whatever the ordering
    pub fn rings(&self) -> &ReducedGrid {
        &self.rings
    }

    /// `12 * nside^2`
    pub fn size(&self) -> usize {
        self.rings.size()
    }

    /// Ring-ordered index of point `index`.
    #[inline]
    pub fn ring_index(&self, index: usize) -> usize {
        match self.ordering {
            PixelOrdering::Ring => index,
            PixelOrdering::Nest => self.healpix.nest_to_ring(index),
        }
    }

    ///
    pub fn point(&self, index: usize) -> LatLon {
        self.rings.point(self.ring_index(index))
    }

    /// Ring order crops like any reduced grid. Nested order keeps its numbering, so the
    /// kept pixels come back as a list in nested order.
    pub(crate) fn cropped(&self, bbox: &BoundingBox) -> GridResult<Grid> {
        match self.ordering {
            PixelOrdering::Ring => self.rings.cropped(bbox),
            PixelOrdering::Nest => {
                let points = (0..self.size())
                    .map(|k| self.point(k))
                    .filter(|p| bbox.contains(p))
                    .collect();
                Ok(Grid::Unstructured(UnstructuredGrid::new(points)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_twelve_nside_squared() {
        for nside in [1i64, 2, 4, 16].iter() {
            let g = HealpixGrid::new(*nside, PixelOrdering::Ring).unwrap();
            assert_eq!(g.size(), 12 * (*nside as usize).pow(2));
        }
    }

    #[test]
    fn nested_points_are_ring_points() {
        let ring = HealpixGrid::new(4, PixelOrdering::Ring).unwrap();
        let nest = ring.with_ordering(PixelOrdering::Nest);
        for k in 0..nest.size() {
            let r = ring.healpix().nest_to_ring(k);
            assert_eq!(nest.point(k), ring.point(r));
        }
    }

    #[test]
    fn nested_crop_stays_nested() {
        let nest = HealpixGrid::new(4, PixelOrdering::Nest).unwrap();
        let bbox = BoundingBox::new(90.0, 0.0, 0.0, 90.0).unwrap();
        let crop = nest.cropped(&bbox).unwrap();
        assert!(crop.size() > 0);
        let expected: Vec<LatLon> = (0..nest.size())
            .map(|k| nest.point(k))
            .filter(|p| bbox.contains(p))
            .collect();
        assert_eq!(crop.points().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn bad_nside() {
        let err = HealpixGrid::new(6, PixelOrdering::Nest).unwrap_err();
        assert!(err.is_config_error());
    }
}
