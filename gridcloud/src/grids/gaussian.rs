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

use std::f64::consts::PI;

const MAX_ITERATIONS: usize = 100;

/// Evaluates the Legendre polynomial of degree `n` and its predecessor at `x`.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    for k in 2..=n {
        let k = k as f64;
        let p2 = ((2.0 * k - 1.0) * x * p1 - (k - 1.0) * p0) / k;
        p0 = p1;
        p1 = p2;
    }
    (p1, p0)
}

/// The `2n` latitudes of a Gaussian grid with `n` latitudes between pole and equator,
/// north to south, in degrees. These are the arcsines of the roots of the Legendre
/// polynomial of degree `2n`.
pub fn gaussian_latitudes(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let degree = 2 * n;
    let nf = degree as f64;
    let mut north = Vec::with_capacity(n);
    for i in 1..=n {
        let mut x = (PI * (i as f64 - 0.25) / (nf + 0.5)).cos();
        for _ in 0..MAX_ITERATIONS {
            let (p, p_prev) = legendre(degree, x);
            let dp = nf * (x * p - p_prev) / (x * x - 1.0);
            let dx = p / dp;
            x -= dx;
            if dx.abs() < 1e-15 {
                break;
            }
        }
        north.push(x.asin().to_degrees());
    }
    let mut lats = north.clone();
    lats.extend(north.iter().rev().map(|l| -l));
    lats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_degrees() {
        let lats = gaussian_latitudes(1);
        assert_eq!(lats.len(), 2);
        assert_approx_eq!(lats[0], (1.0f64 / 3.0f64.sqrt()).asin().to_degrees(), 1e-12);
        assert_approx_eq!(lats[1], -lats[0]);

        let lats = gaussian_latitudes(2);
        assert_approx_eq!(lats[0], 0.861_136_311_594_052_6f64.asin().to_degrees(), 1e-10);
        assert_approx_eq!(lats[1], 0.339_981_043_584_856_3f64.asin().to_degrees(), 1e-10);
    }

    #[test]
    fn strictly_decreasing_and_symmetric() {
        let lats = gaussian_latitudes(80);
        assert_eq!(lats.len(), 160);
        assert!(lats.windows(2).all(|w| w[0] > w[1]));
        for (a, b) in lats.iter().zip(lats.iter().rev()) {
            assert_approx_eq!(*a, -*b);
        }
        assert!(lats[0] < 90.0);
    }
}
