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

use crate::bbox::BoundingBox;
use crate::errors::*;
use crate::grids::GridType;
use crate::points::LatLon;
use crate::projection::ProjectionSpec;
use crate::spec::{GridSpec, Increments, RotationSpec};
use core_geogrid::PixelOrdering;
use log::{debug, info};
use std::fs;
use std::path::Path;
use yaml_rust::{Yaml, YamlLoader};

/// Reads a grid description from a yaml file on disk. Minimal example below.
/// ```yaml
/// ---
/// grid_type: healpix
/// nside: 32
/// ordering: nested
/// bbox: [60, -10, 30, 40]
/// rotation:
///   south_pole_lat: -40
///   south_pole_lon: 10
/// precision: 6
/// ```
pub fn grid_spec_from_yaml<P: AsRef<Path>>(path: P) -> GridResult<GridSpec> {
    info!("loading grid description from {}", path.as_ref().display());
    let config = fs::read_to_string(&path)?;
    grid_spec_from_yaml_str(&config, &path.as_ref().to_string_lossy())
}

/// Same as [`grid_spec_from_yaml`] on text already in memory. `file_name` only shows up
/// in errors.
pub fn grid_spec_from_yaml_str(config: &str, file_name: &str) -> GridResult<GridSpec> {
    let docs = YamlLoader::load_from_str(config).map_err(|_| malformed(file_name, "document"))?;
    let doc = docs.get(0).ok_or_else(|| missing(file_name, "document"))?;
    grid_spec_from_yaml_doc(doc, file_name)
}

/// Reads a grid description out of an already parsed yaml node, such as a `grid:` section
/// of a larger file.
pub fn grid_spec_from_yaml_doc(doc: &Yaml, file_name: &str) -> GridResult<GridSpec> {
    let grid_type: GridType = doc["grid_type"]
        .as_str()
        .ok_or_else(|| missing_or_malformed(doc, file_name, "grid_type"))?
        .parse()?;

    let mut spec = GridSpec::new(grid_type);
    spec.ni = read_usize(doc, file_name, "ni")?;
    spec.nj = read_usize(doc, file_name, "nj")?;
    spec.n = read_usize(doc, file_name, "n")?;
    spec.nside = read_i64(doc, file_name, "nside")?;
    spec.ordering = match &doc["ordering"] {
        Yaml::BadValue | Yaml::Null => None,
        Yaml::String(s) => Some(s.parse::<PixelOrdering>()?),
        _ => return Err(malformed(file_name, "ordering")),
    };
    spec.precision = read_usize(doc, file_name, "precision")?.map(|p| p as u32);
    spec.pl = read_list(doc, file_name, "pl", |y| y.as_i64().filter(|i| *i >= 0).map(|i| i as usize))?;
    spec.latitudes = read_list(doc, file_name, "latitudes", as_f64)?;
    spec.bbox = read_bbox(doc, file_name)?;
    spec.increments = read_increments(doc, file_name)?;
    spec.rotation = read_rotation(doc, file_name)?;
    spec.points = read_list(doc, file_name, "points", |y| {
        let pair = y.as_vec()?;
        if pair.len() != 2 {
            return None;
        }
        Some(LatLon::new(as_f64(&pair[0])?, as_f64(&pair[1])?))
    })?;
    spec.projections = match &doc["projections"] {
        Yaml::BadValue | Yaml::Null => Vec::new(),
        Yaml::Array(items) => items
            .iter()
            .map(|item| read_projection(item, file_name))
            .collect::<GridResult<Vec<ProjectionSpec>>>()?,
        _ => return Err(malformed(file_name, "projections")),
    };
    debug!("read a {} grid description from {}", spec.grid_type, file_name);
    Ok(spec)
}

fn malformed(file_name: &str, field: &str) -> GridError {
    GridError::ParsingError(ParsingError::MalformedYamlError {
        file_name: file_name.to_string(),
        field: field.to_string(),
    })
}

fn missing(file_name: &str, field: &str) -> GridError {
    GridError::ParsingError(ParsingError::MissingYamlError {
        file_name: file_name.to_string(),
        field: field.to_string(),
    })
}

fn missing_or_malformed(doc: &Yaml, file_name: &str, field: &str) -> GridError {
    if doc[field].is_badvalue() {
        missing(file_name, field)
    } else {
        malformed(file_name, field)
    }
}

fn as_f64(y: &Yaml) -> Option<f64> {
    match y {
        Yaml::Integer(i) => Some(*i as f64),
        Yaml::Real(_) => y.as_f64(),
        _ => None,
    }
}

fn read_usize(doc: &Yaml, file_name: &str, field: &str) -> GridResult<Option<usize>> {
    match &doc[field] {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::Integer(i) if *i >= 0 => Ok(Some(*i as usize)),
        _ => Err(malformed(file_name, field)),
    }
}

fn read_i64(doc: &Yaml, file_name: &str, field: &str) -> GridResult<Option<i64>> {
    match &doc[field] {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::Integer(i) => Ok(Some(*i)),
        _ => Err(malformed(file_name, field)),
    }
}

fn read_f64(doc: &Yaml, file_name: &str, field: &str) -> GridResult<Option<f64>> {
    match &doc[field] {
        Yaml::BadValue | Yaml::Null => Ok(None),
        y => as_f64(y).map(Some).ok_or_else(|| malformed(file_name, field)),
    }
}

fn read_list<T, F: Fn(&Yaml) -> Option<T>>(
    doc: &Yaml,
    file_name: &str,
    field: &str,
    item: F,
) -> GridResult<Option<Vec<T>>> {
    match &doc[field] {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::Array(items) => items
            .iter()
            .map(|y| item(y).ok_or_else(|| malformed(file_name, field)))
            .collect::<GridResult<Vec<T>>>()
            .map(Some),
        _ => Err(malformed(file_name, field)),
    }
}

/// `bbox` is either `[north, west, south, east]` or a map with those keys.
fn read_bbox(doc: &Yaml, file_name: &str) -> GridResult<Option<BoundingBox>> {
    let edges = match &doc["bbox"] {
        Yaml::BadValue | Yaml::Null => return Ok(None),
        Yaml::Array(items) if items.len() == 4 => {
            let mut edges = [0.0; 4];
            for (edge, y) in edges.iter_mut().zip(items) {
                *edge = as_f64(y).ok_or_else(|| malformed(file_name, "bbox"))?;
            }
            edges
        }
        b @ Yaml::Hash(_) => {
            let mut edges = [0.0; 4];
            for (edge, key) in edges.iter_mut().zip(["north", "west", "south", "east"].iter()) {
                *edge = read_f64(b, file_name, key)?
                    .ok_or_else(|| missing(file_name, &format!("bbox.{}", key)))?;
            }
            edges
        }
        _ => return Err(malformed(file_name, "bbox")),
    };
    Ok(Some(BoundingBox::new(edges[0], edges[1], edges[2], edges[3])?))
}

/// `increments` is either `[west_east, south_north]` or a map with those keys.
fn read_increments(doc: &Yaml, file_name: &str) -> GridResult<Option<Increments>> {
    let node = &doc["increments"];
    let (we, sn) = match node {
        Yaml::BadValue | Yaml::Null => return Ok(None),
        Yaml::Array(items) if items.len() == 2 => (as_f64(&items[0]), as_f64(&items[1])),
        Yaml::Hash(_) => (as_f64(&node["west_east"]), as_f64(&node["south_north"])),
        _ => (None, None),
    };
    match (we, sn) {
        (Some(west_east), Some(south_north)) => Ok(Some(Increments {
            west_east,
            south_north,
        })),
        _ => Err(malformed(file_name, "increments")),
    }
}

fn read_rotation(doc: &Yaml, file_name: &str) -> GridResult<Option<RotationSpec>> {
    let node = &doc["rotation"];
    match node {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::Hash(_) => Ok(Some(RotationSpec {
            south_pole_lat: read_f64(node, file_name, "south_pole_lat")?
                .ok_or_else(|| missing(file_name, "rotation.south_pole_lat"))?,
            south_pole_lon: read_f64(node, file_name, "south_pole_lon")?
                .ok_or_else(|| missing(file_name, "rotation.south_pole_lon"))?,
            angle: read_f64(node, file_name, "angle")?.unwrap_or(0.0),
        })),
        _ => Err(malformed(file_name, "rotation")),
    }
}

fn read_projection(node: &Yaml, file_name: &str) -> GridResult<ProjectionSpec> {
    let kind = node["kind"]
        .as_str()
        .ok_or_else(|| missing_or_malformed(node, file_name, "projections.kind"))?;
    let matrix = match &node["matrix"] {
        Yaml::BadValue | Yaml::Null => None,
        Yaml::Array(rows) if rows.len() == 2 => {
            let mut m = [[0.0; 3]; 2];
            for (out, row) in m.iter_mut().zip(rows) {
                let row = row
                    .as_vec()
                    .filter(|r| r.len() == 3)
                    .ok_or_else(|| malformed(file_name, "projections.matrix"))?;
                for (cell, y) in out.iter_mut().zip(row) {
                    *cell = as_f64(y).ok_or_else(|| malformed(file_name, "projections.matrix"))?;
                }
            }
            Some(m)
        }
        _ => return Err(malformed(file_name, "projections.matrix")),
    };
    Ok(ProjectionSpec {
        kind: kind.to_string(),
        south_pole_lat: read_f64(node, file_name, "south_pole_lat")?,
        south_pole_lon: read_f64(node, file_name, "south_pole_lon")?,
        angle: read_f64(node, file_name, "angle")?,
        matrix,
        decimals: read_usize(node, file_name, "decimals")?.map(|d| d as u32),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grids::Grid;
    use std::io::Write;
    use tempdir::TempDir;

    #[test]
    fn healpix_file() {
        let dir = TempDir::new("grid_yaml").unwrap();
        let path = dir.path().join("grid.yml");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(
            f,
            "---\ngrid_type: healpix\nnside: 4\nordering: nested\nrotation:\n  south_pole_lat: -40\n  south_pole_lon: 10.0\nprecision: 6"
        )
        .unwrap();
        let spec = grid_spec_from_yaml(&path).unwrap();
        assert_eq!(spec.grid_type, GridType::Healpix);
        assert_eq!(spec.nside, Some(4));
        assert_eq!(spec.ordering, Some(PixelOrdering::Nest));
        assert_eq!(spec.rotation.unwrap().south_pole_lat, -40.0);
        assert_eq!(spec.precision, Some(6));
        assert_eq!(Grid::from_spec(&spec).unwrap().size(), 192);
    }

    #[test]
    fn regular_with_bbox_and_increments() {
        let spec = grid_spec_from_yaml_str(
            "grid_type: regular_ll\nbbox: [60, -10, 30, 40]\nincrements: {west_east: 0.5, south_north: 0.5}",
            "inline",
        )
        .unwrap();
        let grid = Grid::from_spec(&spec).unwrap();
        assert_eq!(grid.size(), 101 * 61);
    }

    #[test]
    fn reduced_and_unstructured() {
        let spec = grid_spec_from_yaml_str("grid_type: reduced_ll\npl: [1, 4, 1]", "inline").unwrap();
        assert_eq!(spec.pl, Some(vec![1, 4, 1]));
        let spec = grid_spec_from_yaml_str(
            "grid_type: unstructured\npoints: [[0, 0], [10.5, 20]]\nprojections:\n  - kind: affine\n    matrix: [[1, 0, 360], [0, 1, 0]]",
            "inline",
        )
        .unwrap();
        assert_eq!(spec.points.as_ref().unwrap()[1], LatLon::new(10.5, 20.0));
        assert_eq!(spec.projections[0].matrix.unwrap()[0][2], 360.0);
    }

    #[test]
    fn errors_name_the_field() {
        match grid_spec_from_yaml_str("nside: 4", "a.yml") {
            Err(GridError::ParsingError(ParsingError::MissingYamlError { file_name, field })) => {
                assert_eq!(file_name, "a.yml");
                assert_eq!(field, "grid_type");
            }
            other => panic!("expected a missing field, got {:?}", other),
        }
        match grid_spec_from_yaml_str("grid_type: healpix\nnside: four", "b.yml") {
            Err(GridError::ParsingError(ParsingError::MalformedYamlError { field, .. })) => {
                assert_eq!(field, "nside")
            }
            other => panic!("expected a malformed field, got {:?}", other),
        }
        assert!(grid_spec_from_yaml_str("grid_type: lambert", "c.yml")
            .unwrap_err()
            .is_config_error());
        assert!(grid_spec_from_yaml("/no/such/grid.yml").unwrap_err().is_io_error());
    }
}
