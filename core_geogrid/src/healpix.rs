//! Ring <-> nest conversion. The pixel space splits into a north polar cap (the first
//! `ncap` ring pixels), an equatorial belt where every ring has `4 * nside` pixels, and the
//! mirrored south cap. Both directions go through the face coordinates `(ix, iy, face)`.

use super::*;

/// Ring number (in units of nside) of the southern vertex of each base face.
const JRLL: [i64; 12] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
/// Longitude (in units of pi/4) of the southern vertex of each base face.
const JPLL: [i64; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

#[inline]
fn isqrt(v: i64) -> i64 {
    let mut r = (v as f64).sqrt() as i64;
    while r * r > v {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= v {
        r += 1;
    }
    r
}

/// Where a ring starts in ring order, how many pixels it has and whether its first pixel is
/// shifted half a pixel east of longitude zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RingInfo {
    /// Ring-ordered index of the first pixel
    pub start: usize,
    /// Number of pixels on the ring
    pub size: usize,
    /// First pixel centre sits half a step east of 0
    pub shifted: bool,
}

/// The resolution dependent constants of a HEALPix grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Healpix {
    nside: i64,
    order: u32,
    npface: i64,
    ncap: i64,
    npix: i64,
}

impl Healpix {
    /// Validates `nside` and precomputes the band thresholds.
    pub fn new(nside: i64) -> Result<Healpix, OrderingError> {
        if nside <= 0 {
            return Err(OrderingError::NonPositiveNside(nside));
        }
        if nside > MAX_NSIDE as i64 {
            return Err(OrderingError::NsideTooLarge(nside));
        }
        if nside & (nside - 1) != 0 {
            return Err(OrderingError::NsideNotPowerOfTwo(nside));
        }
        let order = nside.trailing_zeros();
        let npface = nside * nside;
        Ok(Healpix {
            nside,
            order,
            npface,
            ncap: 2 * nside * (nside - 1),
            npix: 12 * npface,
        })
    }

    /// The resolution
    pub fn nside(&self) -> u32 {
        self.nside as u32
    }

    /// `log2(nside)`
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Total pixel count, `12 * nside^2`
    pub fn npix(&self) -> usize {
        self.npix as usize
    }

    /// Number of pixels in the north polar cap, `2 * nside * (nside - 1)`
    pub fn ncap(&self) -> usize {
        self.ncap as usize
    }

    /// Number of iso-latitude rings, `4 * nside - 1`
    pub fn nrings(&self) -> usize {
        (4 * self.nside - 1) as usize
    }

    /// Layout of ring `ring`, counted from 1 at the north pole.
    pub fn ring_info(&self, ring: usize) -> RingInfo {
        assert!(
            ring >= 1 && ring <= self.nrings(),
            "ring {} out of range [1, {}] for nside {}",
            ring,
            self.nrings(),
            self.nside
        );
        let (start, size, shifted) = self.ring_info_raw(ring as i64);
        RingInfo {
            start: start as usize,
            size: size as usize,
            shifted,
        }
    }

    /// Pixel count of ring `ring` (1-based)
    pub fn ring_size(&self, ring: usize) -> usize {
        self.ring_info(ring).size
    }

    /// Ring-ordered index of the first pixel of ring `ring` (1-based)
    pub fn ring_start(&self, ring: usize) -> usize {
        self.ring_info(ring).start
    }

    fn ring_info_raw(&self, ring: i64) -> (i64, i64, bool) {
        let nside = self.nside;
        if ring < nside {
            (2 * ring * (ring - 1), 4 * ring, true)
        } else if ring < 3 * nside {
            let size = 4 * nside;
            (
                self.ncap + (ring - nside) * size,
                size,
                ((ring - nside) & 1) == 0,
            )
        } else {
            let nr = 4 * nside - ring;
            (self.npix - 2 * nr * (nr + 1), 4 * nr, true)
        }
    }

    /// Ring-ordered index to nest-ordered index.
    ///
    /// # Panics
    /// If `pix >= npix()`.
    pub fn ring_to_nest(&self, pix: usize) -> usize {
        self.check_index(pix, PixelOrdering::Ring);
        let (ix, iy, face) = self.ring_to_xyf(pix as i64);
        self.xyf_to_nest(ix, iy, face) as usize
    }

    /// Nest-ordered index to ring-ordered index.
    ///
    /// # Panics
    /// If `pix >= npix()`.
    pub fn nest_to_ring(&self, pix: usize) -> usize {
        self.check_index(pix, PixelOrdering::Nest);
        let (ix, iy, face) = self.nest_to_xyf(pix as i64);
        self.xyf_to_ring(ix, iy, face) as usize
    }

    #[inline]
    fn check_index(&self, pix: usize, ordering: PixelOrdering) {
        assert!(
            (pix as i64) < self.npix,
            "{} index {} out of range for nside {} ({} pixels)",
            ordering,
            pix,
            self.nside,
            self.npix
        );
    }

    fn ring_to_xyf(&self, pix: i64) -> (i64, i64, usize) {
        let nside = self.nside;
        let nl2 = 2 * nside;
        let iring;
        let iphi;
        let kshift;
        let nr;
        let face;

        if pix < self.ncap {
            // north cap, rings are triangular numbers of pixels
            let ring = (1 + isqrt(1 + 2 * pix)) >> 1;
            iphi = (pix + 1) - 2 * ring * (ring - 1);
            kshift = 0;
            nr = ring;
            iring = ring;
            face = ((iphi - 1) / nr) as usize;
        } else if pix < self.npix - self.ncap {
            let ip = pix - self.ncap;
            let tmp = ip >> (self.order + 2);
            iring = tmp + nside;
            iphi = ip - tmp * 4 * nside + 1;
            kshift = (iring + nside) & 1;
            nr = nside;
            let ire = tmp + 1;
            let irm = nl2 + 1 - tmp;
            let ifm = (iphi - (ire >> 1) + nside - 1) >> self.order;
            let ifp = (iphi - (irm >> 1) + nside - 1) >> self.order;
            face = if ifp == ifm {
                (ifp | 4) as usize
            } else if ifp < ifm {
                ifp as usize
            } else {
                (ifm + 8) as usize
            };
        } else {
            let ip = self.npix - pix;
            let ring = (1 + isqrt(2 * ip - 1)) >> 1;
            iphi = 4 * ring + 1 - (ip - 2 * ring * (ring - 1));
            kshift = 0;
            nr = ring;
            iring = 2 * nl2 - ring;
            face = (8 + (iphi - 1) / nr) as usize;
        }

        let irt = iring - ((2 + (face as i64 >> 2)) * nside) + 1;
        let mut ipt = 2 * iphi - JPLL[face] * nr - kshift - 1;
        if ipt >= nl2 {
            ipt -= 8 * nside;
        }
        ((ipt - irt) >> 1, (-ipt - irt) >> 1, face)
    }

    fn xyf_to_ring(&self, ix: i64, iy: i64, face: usize) -> i64 {
        let nl4 = 4 * self.nside;
        let jr = JRLL[face] * self.nside - ix - iy - 1;
        let (start, size, shifted) = self.ring_info_raw(jr);
        let nr = size >> 2;
        let kshift = 1 - shifted as i64;
        let mut jp = (JPLL[face] * nr + ix - iy + 1 + kshift) / 2;
        if jp > nl4 {
            jp -= nl4;
        }
        if jp < 1 {
            jp += nl4;
        }
        start + jp - 1
    }

    #[inline]
    fn nest_to_xyf(&self, pix: i64) -> (i64, i64, usize) {
        let face = (pix >> (2 * self.order)) as usize;
        let local = (pix & (self.npface - 1)) as u64;
        (
            compress_bits(local) as i64,
            compress_bits(local >> 1) as i64,
            face,
        )
    }

    #[inline]
    fn xyf_to_nest(&self, ix: i64, iy: i64, face: usize) -> i64 {
        ((face as i64) << (2 * self.order))
            + spread_bits(ix as u64) as i64
            + ((spread_bits(iy as u64) as i64) << 1)
    }
}

/// A directed reordering between two conventions at a fixed resolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Reorder {
    healpix: Healpix,
    from: PixelOrdering,
    to: PixelOrdering,
}

impl Reorder {
    /// Maps indices given in `from` order to indices in `to` order.
    pub fn new(nside: i64, from: PixelOrdering, to: PixelOrdering) -> Result<Reorder, OrderingError> {
        Ok(Reorder {
            healpix: Healpix::new(nside)?,
            from,
            to,
        })
    }

    /// Ordering of the indices passed to [`Reorder::apply`]
    pub fn from_ordering(&self) -> PixelOrdering {
        self.from
    }

    /// Ordering of the indices returned by [`Reorder::apply`]
    pub fn to_ordering(&self) -> PixelOrdering {
        self.to
    }

    /// The underlying grid constants
    pub fn healpix(&self) -> &Healpix {
        &self.healpix
    }

    /// The reordering going the other way
    pub fn inverse(&self) -> Reorder {
        Reorder {
            healpix: self.healpix,
            from: self.to,
            to: self.from,
        }
    }

    /// Index in `to` order of the pixel at index `pix` in `from` order.
    pub fn apply(&self, pix: usize) -> usize {
        match (self.from, self.to) {
            (PixelOrdering::Ring, PixelOrdering::Nest) => self.healpix.ring_to_nest(pix),
            (PixelOrdering::Nest, PixelOrdering::Ring) => self.healpix.nest_to_ring(pix),
            (ordering, _) => {
                self.healpix.check_index(pix, ordering);
                pix
            }
        }
    }

    /// The whole map, `permutation()[i] == apply(i)`.
    pub fn permutation(&self) -> Vec<usize> {
        (0..self.healpix.npix()).map(|i| self.apply(i)).collect()
    }

    /// Moves values laid out in `from` order into `to` order.
    pub fn reorder_values<T: Clone>(&self, values: &[T]) -> Vec<T> {
        assert_eq!(
            values.len(),
            self.healpix.npix(),
            "expected one value per pixel"
        );
        let mut out: Vec<Option<T>> = vec![None; values.len()];
        for (i, v) in values.iter().enumerate() {
            out[self.apply(i)] = Some(v.clone());
        }
        out.into_iter()
            .map(|v| v.expect("reordering is a bijection"))
            .collect()
    }
}
