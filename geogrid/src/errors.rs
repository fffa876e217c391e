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

//! The errors that can occur when a search tree is built, cached, mapped or queried.
//! Grid description problems float up from `gridcloud` untouched.

use gridcloud::errors::{GridError, ParsingError};
use std::error::Error;
use std::fmt;
use std::io;

/// Helper type for a call that could go wrong.
pub type GeogridResult<T> = Result<T, GeogridError>;

/// Error type for the search and cache layers.
#[derive(Debug)]
pub enum GeogridError {
    /// The grid could not be described, laid out or iterated
    GridError(GridError),
    /// IO error when reading or writing cache entries
    IoError(io::Error),
    /// Asked a question of a tree with no points in it
    EmptyIndex,
    /// A serialised tree failed validation
    FormatError {
        /// What was wrong with it
        message: String,
    },
    /// Parsing error when loading a yaml tree description
    ParsingError(ParsingError),
}

impl GeogridError {
    pub(crate) fn format(message: impl Into<String>) -> GeogridError {
        GeogridError::FormatError {
            message: message.into(),
        }
    }

    /// True for rejected cache blobs
    pub fn is_format_error(&self) -> bool {
        matches!(self, GeogridError::FormatError { .. })
    }

    /// True if the filesystem failed us, directly or while a grid was loading
    pub fn is_io_error(&self) -> bool {
        match self {
            GeogridError::IoError(_) => true,
            GeogridError::GridError(e) => e.is_io_error(),
            _ => false,
        }
    }
}

impl fmt::Display for GeogridError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GeogridError::GridError(e) => write!(f, "{}", e),
            GeogridError::IoError(e) => write!(f, "{}", e),
            GeogridError::EmptyIndex => write!(f, "the search tree is empty"),
            GeogridError::FormatError { message } => {
                write!(f, "invalid serialised search tree: {}", message)
            }
            GeogridError::ParsingError(e) => write!(f, "{}", e),
        }
    }
}

impl Error for GeogridError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GeogridError::GridError(e) => Some(e),
            GeogridError::IoError(e) => Some(e),
            GeogridError::ParsingError(e) => Some(e),
            GeogridError::EmptyIndex => None,
            GeogridError::FormatError { .. } => None,
        }
    }
}

impl From<GridError> for GeogridError {
    fn from(err: GridError) -> Self {
        GeogridError::GridError(err)
    }
}

impl From<io::Error> for GeogridError {
    fn from(err: io::Error) -> Self {
        GeogridError::IoError(err)
    }
}

impl From<ParsingError> for GeogridError {
    fn from(err: ParsingError) -> Self {
        GeogridError::ParsingError(err)
    }
}

impl From<walkdir::Error> for GeogridError {
    fn from(err: walkdir::Error) -> Self {
        GeogridError::IoError(err.into())
    }
}

impl From<GeogridError> for io::Error {
    fn from(err: GeogridError) -> Self {
        match err {
            GeogridError::IoError(e) => e,
            e => io::Error::new(io::ErrorKind::Other, Box::new(e)),
        }
    }
}
