//! Bit-level pixel numbering for the HEALPix equal-area grid.
//!
//! A HEALPix grid of resolution `nside` has `12 * nside^2` pixels, numbered either by
//! iso-latitude rings ("ring") or by a quad-tree inside each of the 12 base faces ("nest").
//! Inside a face the nested number of pixel `(ix, iy)` is the bit interleave of `ix` and `iy`,
//! `iy` taking the odd bits. Nside is bounded by `2^13` so every index fits in 32 bits.
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

mod healpix;
pub use healpix::{Healpix, Reorder, RingInfo};

/// Largest supported resolution. `12 * (2^13)^2` still fits in an `i32`.
pub const MAX_NSIDE: u32 = 1 << 13;

const SPREAD_MASKS: [u64; 5] = [
    0x0000_FFFF_0000_FFFF,
    0x00FF_00FF_00FF_00FF,
    0x0F0F_0F0F_0F0F_0F0F,
    0x3333_3333_3333_3333,
    0x5555_5555_5555_5555,
];

/// Spreads the low 32 bits of `v` onto the even bits of the result.
#[inline]
pub fn spread_bits(v: u64) -> u64 {
    let mut x = v & 0xFFFF_FFFF;
    x = (x | (x << 16)) & SPREAD_MASKS[0];
    x = (x | (x << 8)) & SPREAD_MASKS[1];
    x = (x | (x << 4)) & SPREAD_MASKS[2];
    x = (x | (x << 2)) & SPREAD_MASKS[3];
    x = (x | (x << 1)) & SPREAD_MASKS[4];
    x
}

/// Inverse of [`spread_bits`], gathers the even bits of `v`.
#[inline]
pub fn compress_bits(v: u64) -> u64 {
    let mut x = v & SPREAD_MASKS[4];
    x = (x | (x >> 1)) & SPREAD_MASKS[3];
    x = (x | (x >> 2)) & SPREAD_MASKS[2];
    x = (x | (x >> 4)) & SPREAD_MASKS[1];
    x = (x | (x >> 8)) & SPREAD_MASKS[0];
    x = (x | (x >> 16)) & 0x0000_0000_FFFF_FFFF;
    x
}

/// The two pixel numbering conventions
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelOrdering {
    /// Pixels numbered by rings of constant latitude, west to east inside a ring.
    Ring,
    /// Pixels numbered by recursive quad-tree subdivision of the base faces.
    Nest,
}

impl fmt::Display for PixelOrdering {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PixelOrdering::Ring => write!(f, "ring"),
            PixelOrdering::Nest => write!(f, "nested"),
        }
    }
}

impl std::str::FromStr for PixelOrdering {
    type Err = OrderingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ring" => Ok(PixelOrdering::Ring),
            "nest" | "nested" => Ok(PixelOrdering::Nest),
            _ => Err(OrderingError::UnknownOrdering(s.to_string())),
        }
    }
}

/// Errors raised while setting up a reordering. These are configuration errors, a bad
/// pixel index is a logic fault and panics instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderingError {
    /// Nside was zero or negative
    NonPositiveNside(i64),
    /// Nside was above [`MAX_NSIDE`]
    NsideTooLarge(i64),
    /// The nested scheme only exists for powers of two
    NsideNotPowerOfTwo(i64),
    /// An ordering name that is neither ring nor nest
    UnknownOrdering(String),
}

impl fmt::Display for OrderingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderingError::NonPositiveNside(n) => write!(f, "nside must be positive, got {}", n),
            OrderingError::NsideTooLarge(n) => {
                write!(f, "nside {} is larger than the supported {}", n, MAX_NSIDE)
            }
            OrderingError::NsideNotPowerOfTwo(n) => {
                write!(f, "nside {} is not a power of two", n)
            }
            OrderingError::UnknownOrdering(s) => write!(f, "unknown pixel ordering '{}'", s),
        }
    }
}

impl Error for OrderingError {}
