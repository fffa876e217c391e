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

//! The errors that can occur when a grid is specified, loaded or iterated
use core_geogrid::OrderingError;
use std::error::Error;
use std::fmt;
use std::io;

///
pub type GridResult<T> = Result<T, GridError>;

/// Error type for grids
#[derive(Debug)]
pub enum GridError {
    /// The grid description does not describe a valid grid
    ConfigError(ConfigError),
    /// Parsing error when loading a YAML grid description
    ParsingError(ParsingError),
    /// IO error when opening files
    IoError(io::Error),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GridError::ConfigError(e) => write!(f, "{}", e),
            GridError::ParsingError(e) => write!(f, "{}", e),
            GridError::IoError(e) => write!(f, "{}", e),
        }
    }
}

impl Error for GridError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GridError::ConfigError(e) => Some(e),
            GridError::ParsingError(e) => Some(e),
            GridError::IoError(e) => Some(e),
        }
    }
}

impl GridError {
    /// True if the grid description itself is wrong
    pub fn is_config_error(&self) -> bool {
        matches!(self, GridError::ConfigError(_))
    }

    /// True if the filesystem failed us
    pub fn is_io_error(&self) -> bool {
        matches!(self, GridError::IoError(_))
    }

    pub(crate) fn invalid(message: impl Into<String>) -> GridError {
        GridError::ConfigError(ConfigError::InvalidGridParameters(message.into()))
    }
}

impl From<io::Error> for GridError {
    fn from(err: io::Error) -> Self {
        GridError::IoError(err)
    }
}

impl From<ConfigError> for GridError {
    fn from(err: ConfigError) -> Self {
        GridError::ConfigError(err)
    }
}

impl From<ParsingError> for GridError {
    fn from(err: ParsingError) -> Self {
        GridError::ParsingError(err)
    }
}

impl From<OrderingError> for GridError {
    fn from(err: OrderingError) -> Self {
        match err {
            OrderingError::UnknownOrdering(_) => {
                GridError::ConfigError(ConfigError::InvalidGridParameters(err.to_string()))
            }
            err => GridError::ConfigError(ConfigError::InvalidNside(err)),
        }
    }
}

impl From<GridError> for io::Error {
    fn from(err: GridError) -> Self {
        match err {
            GridError::IoError(e) => e,
            e => io::Error::new(io::ErrorKind::Other, Box::new(e)),
        }
    }
}

/// Ways a grid description can be wrong.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// HEALPix resolution rejected by the ordering layer
    InvalidNside(OrderingError),
    /// A bounding box with its edges out of order or out of range
    MalformedBoundingBox(String),
    /// A `grid_type` we do not know how to lay out
    UnsupportedGridType(String),
    /// A projection kind we do not know how to build
    UnsupportedProjection(String),
    /// Counts, increments or row tables that do not fit together
    InvalidGridParameters(String),
    /// A field the grid type needs was not given
    MissingParameter(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::InvalidNside(e) => write!(f, "invalid nside: {}", e),
            ConfigError::MalformedBoundingBox(m) => write!(f, "malformed bounding box: {}", m),
            ConfigError::UnsupportedGridType(t) => write!(f, "unsupported grid type '{}'", t),
            ConfigError::UnsupportedProjection(p) => write!(f, "unsupported projection '{}'", p),
            ConfigError::InvalidGridParameters(m) => write!(f, "invalid grid parameters: {}", m),
            ConfigError::MissingParameter(p) => write!(f, "missing grid parameter '{}'", p),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::InvalidNside(e) => Some(e),
            _ => None,
        }
    }
}

/// A parsing error occored while reading a grid description
#[derive(Debug)]
pub enum ParsingError {
    /// Yaml was messed up
    MalformedYamlError {
        /// The file that was messed up
        file_name: String,
        /// The value that was messed up
        field: String,
    },
    /// A needed field was missing from the file.
    MissingYamlError {
        /// The file
        file_name: String,
        /// The missing field
        field: String,
    },
    /// Something else happened parsing a string
    RegularParsingError(&'static str),
}

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParsingError::MalformedYamlError { file_name, field } => {
                write!(f, "malformed field '{}' in {}", field, file_name)
            }
            ParsingError::MissingYamlError { file_name, field } => {
                write!(f, "missing field '{}' in {}", field, file_name)
            }
            ParsingError::RegularParsingError(m) => write!(f, "{}", m),
        }
    }
}

impl Error for ParsingError {}
