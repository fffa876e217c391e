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
use core_geogrid::Healpix;
use std::sync::OnceLock;

/// One row of a reduced grid: `pl` points evenly spread around the full circle at
/// `latitude`, of which the indices `[first, first + count)` are kept. Index `k` sits at
/// longitude `offset + k * 360 / pl`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    ///
    pub latitude: f64,
    /// Points on the full circle
    pub pl: usize,
    /// First kept index
    pub first: usize,
    /// Number of kept points
    pub count: usize,
    /// Longitude of index 0
    pub offset: f64,
}

impl Row {
    /// A row keeping the whole circle.
    pub fn full(latitude: f64, pl: usize, offset: f64) -> Row {
        Row {
            latitude,
            pl,
            first: 0,
            count: pl,
            offset,
        }
    }

    /// Longitude increment
    pub fn step(&self) -> f64 {
        360.0 / self.pl as f64
    }

    /// Longitude of the `c`-th kept point.
    #[inline]
    pub fn longitude(&self, c: usize) -> f64 {
        self.offset + (self.first + c) as f64 * self.step()
    }

    ///
    pub fn longitudes(&self) -> Vec<f64> {
        (0..self.count).map(|c| self.longitude(c)).collect()
    }
}

/// Rows of constant latitude with their own point counts, north to south.
///
/// Point numbering goes through a prefix sum over the row counts. It is built on first use
/// and checked against the rows when it is built and on [`ReducedGrid::recount`].
#[derive(Clone, Debug)]
pub struct ReducedGrid {
    kind: GridType,
    bbox: BoundingBox,
    rows: Vec<Row>,
    accumulator: OnceLock<Vec<usize>>,
}

impl ReducedGrid {
    /// Full rows at `latitudes` with `pl[j]` points each, the first one on longitude 0.
    pub fn new(latitudes: Vec<f64>, pl: Vec<usize>) -> GridResult<ReducedGrid> {
        Self::from_latitudes(GridType::Reduced, latitudes, pl)
    }

    /// Classic reduced Gaussian grid with `n` latitudes per hemisphere and an explicit `pl`.
    pub fn classic_gaussian(n: usize, pl: Vec<usize>) -> GridResult<ReducedGrid> {
        if n == 0 {
            return Err(GridError::invalid("a Gaussian grid needs n above zero"));
        }
        if pl.len() != 2 * n {
            return Err(GridError::invalid(format!(
                "pl has {} entries, a Gaussian grid of n = {} needs {}",
                pl.len(),
                n,
                2 * n
            )));
        }
        Self::from_latitudes(GridType::ReducedGaussian, gaussian_latitudes(n), pl)
    }

    /// Octahedral reduced Gaussian grid, `20 + 4 (i - 1)` points on the `i`-th latitude from
    /// either pole.
    pub fn octahedral(n: usize) -> GridResult<ReducedGrid> {
        if n == 0 {
            return Err(GridError::invalid("an octahedral grid needs n above zero"));
        }
        let north: Vec<usize> = (0..n).map(|i| 20 + 4 * i).collect();
        let mut pl = north.clone();
        pl.extend(north.iter().rev());
        Self::from_latitudes(GridType::Octahedral, gaussian_latitudes(n), pl)
    }

    /// Reduced latitude/longitude grid, rows evenly spaced from pole to pole.
    pub fn reduced_ll(pl: Vec<usize>) -> GridResult<ReducedGrid> {
        if pl.len() < 2 {
            return Err(GridError::invalid(format!(
                "a reduced_ll grid needs at least two rows, got {}",
                pl.len()
            )));
        }
        let step = 180.0 / (pl.len() - 1) as f64;
        let latitudes = (0..pl.len()).map(|j| 90.0 - j as f64 * step).collect();
        Self::from_latitudes(GridType::ReducedLatLon, latitudes, pl)
    }

    /// HEALPix rings in ring order. Rings whose pixels are shifted start half a step east.
    pub fn healpix(nside: i64) -> GridResult<ReducedGrid> {
        let healpix = Healpix::new(nside)?;
        let n = nside as f64;
        let nrings = healpix.nrings();
        let rows = (1..=nrings)
            .map(|ring| {
                let info = healpix.ring_info(ring);
                let i = ring as f64;
                let z = if ring < nside as usize {
                    1.0 - i * i / (3.0 * n * n)
                } else if ring <= 3 * nside as usize {
                    4.0 / 3.0 - 2.0 * i / (3.0 * n)
                } else {
                    let k = (4 * nside as usize - ring) as f64;
                    k * k / (3.0 * n * n) - 1.0
                };
                let offset = if info.shifted {
                    180.0 / info.size as f64
                } else {
                    0.0
                };
                Row::full(z.asin().to_degrees(), info.size, offset)
            })
            .collect();
        Self::from_rows(GridType::Healpix, BoundingBox::global(), rows)
    }

    fn from_latitudes(kind: GridType, latitudes: Vec<f64>, pl: Vec<usize>) -> GridResult<ReducedGrid> {
        if latitudes.len() != pl.len() {
            return Err(GridError::invalid(format!(
                "{} latitudes but {} pl entries",
                latitudes.len(),
                pl.len()
            )));
        }
        let rows = latitudes
            .into_iter()
            .zip(pl)
            .map(|(lat, pl)| Row::full(lat, pl, 0.0))
            .collect();
        Self::from_rows(kind, BoundingBox::global(), rows)
    }

    /// Takes rows as they are, after checking them.
    pub fn from_rows(kind: GridType, bbox: BoundingBox, rows: Vec<Row>) -> GridResult<ReducedGrid> {
        for (j, row) in rows.iter().enumerate() {
            if !(row.latitude >= -90.0 && row.latitude <= 90.0) {
                return Err(GridError::invalid(format!(
                    "row {} has latitude {}",
                    j, row.latitude
                )));
            }
            if row.count > row.pl || (row.count > 0 && !row.offset.is_finite()) {
                return Err(GridError::invalid(format!(
                    "row {} keeps {} of {} points",
                    j, row.count, row.pl
                )));
            }
        }
        Ok(ReducedGrid {
            kind,
            bbox,
            rows,
            accumulator: OnceLock::new(),
        })
    }

    /// The layout this grid was built as
    pub fn kind(&self) -> GridType {
        self.kind
    }

    ///
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    ///
    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    /// Number of rows
    pub fn nj(&self) -> usize {
        self.rows.len()
    }

    /// Points on row `j`
    pub fn ni(&self, j: usize) -> usize {
        self.row(j).count
    }

    ///
    pub fn latitudes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.latitude).collect()
    }

    ///
    pub fn longitudes(&self, j: usize) -> Vec<f64> {
        self.row(j).longitudes()
    }

    fn row(&self, j: usize) -> &Row {
        assert!(
            j < self.rows.len(),
            "row {} out of range ({} rows)",
            j,
            self.rows.len()
        );
        &self.rows[j]
    }

    fn structural_size(&self) -> usize {
        self.rows.iter().map(|r| r.count).sum()
    }

    /// Prefix sums of the row counts, `nj + 1` entries starting at 0.
    pub fn accumulator(&self) -> &[usize] {
        self.accumulator.get_or_init(|| {
            let mut acc = Vec::with_capacity(self.rows.len() + 1);
            let mut total = 0;
            acc.push(total);
            for row in &self.rows {
                total += row.count;
                acc.push(total);
            }
            assert!(
                acc.windows(2).all(|w| w[0] <= w[1]),
                "row accumulator is not monotonic"
            );
            assert_eq!(
                total,
                self.structural_size(),
                "row accumulator disagrees with the rows"
            );
            acc
        })
    }

    /// Number of points, read off the accumulator.
    pub fn size(&self) -> usize {
        self.accumulator()[self.rows.len()]
    }

    /// Recomputes the size from the rows and checks it against the accumulator, if one has
    /// been built.
    pub fn recount(&self) -> usize {
        let total = self.structural_size();
        if let Some(acc) = self.accumulator.get() {
            assert_eq!(
                acc[self.rows.len()],
                total,
                "row accumulator is out of date"
            );
        }
        total
    }

    /// Index of the first point of row `j`.
    pub fn row_start(&self, j: usize) -> usize {
        self.accumulator()[j]
    }

    /// Row and position in the row of point `index`.
    pub fn locate(&self, index: usize) -> (usize, usize) {
        let acc = self.accumulator();
        assert!(
            index < acc[self.rows.len()],
            "point {} out of range ({} points)",
            index,
            acc[self.rows.len()]
        );
        let row = acc.partition_point(|start| *start <= index) - 1;
        (row, index - acc[row])
    }

    /// Point `index`, row by row.
    pub fn point(&self, index: usize) -> LatLon {
        let (j, c) = self.locate(index);
        let row = &self.rows[j];
        LatLon::new(row.latitude, row.longitude(c))
    }

    pub(crate) fn cropped(&self, bbox: &BoundingBox) -> GridResult<Grid> {
        let region = self.bbox.intersection(bbox).unwrap_or(*bbox);
        let mut rows = Vec::new();
        let mut scattered = false;
        for row in self.rows.iter().filter(|r| in_band(r.latitude, bbox)) {
            let (lons, contiguous) = kept_run(row.longitudes().into_iter(), row.step(), bbox);
            if lons.is_empty() {
                continue;
            }
            scattered |= !contiguous;
            rows.push((row, lons));
        }
        if scattered {
            debug!("crop splits a row of a {} grid, keeping an unstructured list", self.kind());
            let points = rows
                .iter()
                .flat_map(|(row, lons)| lons.iter().map(move |lon| LatLon::new(row.latitude, *lon)))
                .collect();
            return Ok(Grid::Unstructured(UnstructuredGrid::new(points)));
        }
        let rows = rows
            .into_iter()
            .map(|(row, lons)| Row {
                latitude: row.latitude,
                pl: row.pl,
                first: 0,
                count: lons.len(),
                offset: lons[0],
            })
            .collect();
        Ok(Grid::Reduced(Self::from_rows(self.kind, region, rows)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octahedral_counts() {
        let g = ReducedGrid::octahedral(4).unwrap();
        assert_eq!(g.nj(), 8);
        assert_eq!(
            g.rows().iter().map(|r| r.pl).collect::<Vec<_>>(),
            vec![20, 24, 28, 32, 32, 28, 24, 20]
        );
        assert_eq!(g.size(), 2 * (20 + 24 + 28 + 32));
        // O1280 has 6_599_680 points
        assert_eq!(ReducedGrid::octahedral(1280).unwrap().size(), 6_599_680);
    }

    #[test]
    fn accumulator_matches_size() {
        let g = ReducedGrid::new(vec![60.0, 0.0, -60.0], vec![3, 0, 5]).unwrap();
        let acc = g.accumulator().to_vec();
        assert_eq!(acc, vec![0, 3, 3, 8]);
        assert_eq!(*acc.last().unwrap(), g.size());
        assert_eq!(g.recount(), 8);
        assert_eq!(g.locate(3), (2, 0));
        assert_eq!(g.row_start(2), 3);
    }

    #[test]
    fn mismatched_tables_are_rejected() {
        assert!(ReducedGrid::new(vec![0.0], vec![1, 2]).is_err());
        assert!(ReducedGrid::classic_gaussian(2, vec![4, 4, 4]).is_err());
        assert!(ReducedGrid::reduced_ll(vec![4]).is_err());
    }

    #[test]
    fn reduced_ll_rows() {
        let g = ReducedGrid::reduced_ll(vec![1, 4, 1]).unwrap();
        assert_eq!(g.latitudes(), vec![90.0, 0.0, -90.0]);
        assert_eq!(g.longitudes(1), vec![0.0, 90.0, 180.0, 270.0]);
        assert_eq!(g.size(), 6);
    }

    #[test]
    fn healpix_rings() {
        let g = ReducedGrid::healpix(2).unwrap();
        assert_eq!(g.nj(), 7);
        assert_eq!(g.size(), 48);
        let lats = g.latitudes();
        assert_approx_eq!(lats[3], 0.0);
        assert_approx_eq!(lats[0], -lats[6]);
        assert!(lats.windows(2).all(|w| w[0] > w[1]));
        // polar ring, shifted by half of 360 / 4
        assert_approx_eq!(g.longitudes(0)[0], 45.0);
        // face centres sit on the equator, so at nside 2 the equatorial ring is shifted
        assert_approx_eq!(g.longitudes(3)[0], 22.5);
        assert_approx_eq!(g.longitudes(2)[0], 0.0);
        assert!(ReducedGrid::healpix(3).unwrap_err().is_config_error());
    }

    #[test]
    fn crop_keeps_runs() {
        let g = ReducedGrid::octahedral(8).unwrap();
        let bbox = BoundingBox::new(45.0, -30.0, 0.0, 30.0).unwrap();
        match g.cropped(&bbox).unwrap() {
            Grid::Reduced(c) => {
                assert!(c.size() > 0);
                for j in 0..c.nj() {
                    for lon in c.longitudes(j) {
                        assert!(bbox.contains(&LatLon::new(c.rows()[j].latitude, lon)));
                    }
                }
                assert_eq!(c.kind(), GridType::Octahedral);
            }
            other => panic!("expected a reduced grid, got {:?}", other),
        }
    }

    #[test]
    #[should_panic]
    fn locate_past_the_end() {
        let g = ReducedGrid::reduced_ll(vec![1, 4, 1]).unwrap();
        g.locate(6);
    }
}
