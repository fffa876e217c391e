use core_geogrid::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[test]
fn exhaustive_round_trip_small_nside() {
    for order in 0..=6 {
        let healpix = Healpix::new(1 << order).unwrap();
        let mut seen = vec![false; healpix.npix()];
        for pix in 0..healpix.npix() {
            let nest = healpix.ring_to_nest(pix);
            assert!(!seen[nest], "nest index {} hit twice at order {}", nest, order);
            seen[nest] = true;
            assert_eq!(healpix.nest_to_ring(nest), pix);
        }
    }
}

#[test]
fn sampled_round_trip_large_nside() {
    let mut rng = SmallRng::seed_from_u64(0x5eed);
    for order in 7..=13 {
        let healpix = Healpix::new(1 << order).unwrap();
        let npix = healpix.npix();
        // both ends of the pixel range, plus the band boundaries
        let mut samples = vec![0, npix - 1, healpix.ncap() - 1, healpix.ncap(), npix - healpix.ncap()];
        samples.extend((0..2000).map(|_| rng.gen_range(0..npix)));
        for pix in samples {
            assert_eq!(healpix.nest_to_ring(healpix.ring_to_nest(pix)), pix);
            assert_eq!(healpix.ring_to_nest(healpix.nest_to_ring(pix)), pix);
        }
    }
}

#[test]
fn nested_children_share_a_ring_neighbourhood() {
    // the four nested children of a parent all sit on two adjacent rings
    let parent = Healpix::new(8).unwrap();
    let child = Healpix::new(16).unwrap();
    let ring_of = |h: &Healpix, pix: usize| -> usize {
        (1..=h.nrings())
            .find(|r| {
                let info = h.ring_info(*r);
                pix >= info.start && pix < info.start + info.size
            })
            .unwrap()
    };
    for p in 0..parent.npix() {
        let rings: Vec<usize> = (0..4)
            .map(|c| ring_of(&child, child.nest_to_ring(4 * p + c)))
            .collect();
        let lo = *rings.iter().min().unwrap();
        let hi = *rings.iter().max().unwrap();
        assert!(hi - lo <= 2, "children of {} spread over rings {:?}", p, rings);
    }
}
