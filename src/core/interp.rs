//! One-dimensional interpolation backends used by the resampler.

use crate::error::{DatasetError, Result};

pub trait Interpolator {
    /// Evaluates the interpolant through `(xs, ys)` at every point of `query`.
    ///
    /// `xs` must be strictly increasing and every query must lie inside
    /// `[xs[0], xs[n - 1]]`.
    fn interpolate(&self, xs: &[f64], ys: &[f32], query: &[f64]) -> Result<Vec<f32>>;

    /// Samples the interpolant through `(i, ys[i])` at `count` evenly spaced
    /// points from `0` to `ys.len() - 1`, both ends included.
    fn resample_uniform(&self, ys: &[f32], count: usize) -> Result<Vec<f32>> {
        let xs: Vec<f64> = (0..ys.len()).map(|i| i as f64).collect();
        let query = linspace(0.0, ys.len().saturating_sub(1) as f64, count);
        self.interpolate(&xs, ys, &query)
    }
}

/// Cubic spline with not-a-knot end conditions.
#[derive(Clone, Copy, Debug, Default)]
pub struct CubicSpline;

pub const MIN_CUBIC_POINTS: usize = 4;

impl Interpolator for CubicSpline {
    fn interpolate(&self, xs: &[f64], ys: &[f32], query: &[f64]) -> Result<Vec<f32>> {
        let n = xs.len();
        if n != ys.len() {
            return Err(DatasetError::invalid(format!(
                "xs/ys length mismatch: {} vs {}",
                n,
                ys.len()
            )));
        }
        if n < MIN_CUBIC_POINTS {
            return Err(DatasetError::invalid(format!(
                "cubic interpolation needs at least {MIN_CUBIC_POINTS} points, got {n}"
            )));
        }

        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        if h.iter().any(|&d| d.is_nan() || d <= 0.0) {
            return Err(DatasetError::invalid("xs must be strictly increasing"));
        }

        let m = second_derivatives(&h, ys);

        let x0 = xs[0];
        let xn = xs[n - 1];
        let tol = (xn - x0).abs() * 1e-12;

        let mut out = Vec::with_capacity(query.len());
        let mut seg = 0usize;
        for &q in query {
            if q < x0 - tol || q > xn + tol {
                return Err(DatasetError::invalid(format!(
                    "query {q} outside interpolation range [{x0}, {xn}]"
                )));
            }
            let q = q.clamp(x0, xn);

            // Queries are usually sorted, so walk forward and only fall back to
            // a binary search when they are not.
            if !(xs[seg] <= q && q <= xs[seg + 1]) {
                if seg + 2 < n && xs[seg + 1] <= q && q <= xs[seg + 2] {
                    seg += 1;
                } else {
                    seg = xs.partition_point(|&x| x <= q).clamp(1, n - 1) - 1;
                }
            }

            let hi = h[seg];
            let a = xs[seg + 1] - q;
            let b = q - xs[seg];
            let y0 = ys[seg] as f64;
            let y1 = ys[seg + 1] as f64;
            let v = m[seg] * a * a * a / (6.0 * hi)
                + m[seg + 1] * b * b * b / (6.0 * hi)
                + (y0 / hi - m[seg] * hi / 6.0) * a
                + (y1 / hi - m[seg + 1] * hi / 6.0) * b;
            out.push(v as f32);
        }
        Ok(out)
    }

    /// Unit-spaced knots: no abscissae, query points generated on the fly and
    /// only the second derivatives kept in memory.
    fn resample_uniform(&self, ys: &[f32], count: usize) -> Result<Vec<f32>> {
        let n = ys.len();
        if n < MIN_CUBIC_POINTS {
            return Err(DatasetError::invalid(format!(
                "cubic interpolation needs at least {MIN_CUBIC_POINTS} points, got {n}"
            )));
        }

        let m = uniform_second_derivatives(ys);
        let last = (n - 1) as f64;
        let step = if count > 1 {
            last / (count - 1) as f64
        } else {
            0.0
        };

        let mut out = Vec::with_capacity(count);
        for j in 0..count {
            let q = if count > 1 && j + 1 == count {
                last
            } else {
                j as f64 * step
            };
            let seg = (q as usize).min(n - 2);
            let b = q - seg as f64;
            let a = 1.0 - b;
            let y0 = ys[seg] as f64;
            let y1 = ys[seg + 1] as f64;
            let v = (m[seg] * a * a * a + m[seg + 1] * b * b * b) / 6.0
                + (y0 - m[seg] / 6.0) * a
                + (y1 - m[seg + 1] / 6.0) * b;
            out.push(v as f32);
        }
        Ok(out)
    }
}

/// `count` evenly spaced points from `start` to `end`, both ends exact.
pub(crate) fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            let mut v: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
            v[count - 1] = end;
            v
        }
    }
}

/// Second derivatives for knots at `0, 1, .., n - 1`.
///
/// With unit spacing the not-a-knot rows reduce to `6 M[1] = r[0]` and
/// `6 M[n-2] = r[last]`; the interior rows are `M[i-1] + 4 M[i] + M[i+1]`.
/// The forward sweep writes straight into the output.
fn uniform_second_derivatives(ys: &[f32]) -> Vec<f64> {
    let n = ys.len();
    let k = n - 2;
    let rhs = |r: usize| {
        let i = r + 1;
        6.0 * (ys[i + 1] as f64 - 2.0 * ys[i] as f64 + ys[i - 1] as f64)
    };
    let row = |r: usize| {
        if r == 0 || r == k - 1 {
            (0.0, 6.0, 0.0)
        } else {
            (1.0, 4.0, 1.0)
        }
    };

    let mut m = vec![0.0f64; n];
    let mut c = vec![0.0f64; k];
    let (_, diag, sup) = row(0);
    c[0] = sup / diag;
    m[1] = rhs(0) / diag;
    for r in 1..k {
        let (sub, diag, sup) = row(r);
        let denom = diag - sub * c[r - 1];
        c[r] = sup / denom;
        m[r + 1] = (rhs(r) - sub * m[r]) / denom;
    }
    for r in (0..k - 1).rev() {
        m[r + 1] -= c[r] * m[r + 2];
    }

    m[0] = 2.0 * m[1] - m[2];
    m[n - 1] = 2.0 * m[n - 2] - m[n - 3];
    m
}

/// Solves for the spline's second derivatives at every knot.
///
/// The not-a-knot conditions are folded into the first and last interior
/// rows, leaving a tridiagonal system over `M[1..n-1]` solved with the Thomas
/// algorithm.
fn second_derivatives(h: &[f64], ys: &[f32]) -> Vec<f64> {
    let n = ys.len();
    let k = n - 2;

    let slope = |i: usize| (ys[i + 1] as f64 - ys[i] as f64) / h[i];

    let mut sub = vec![0.0f64; k];
    let mut diag = vec![0.0f64; k];
    let mut sup = vec![0.0f64; k];
    let mut rhs = vec![0.0f64; k];

    for r in 0..k {
        let i = r + 1;
        sub[r] = h[i - 1];
        diag[r] = 2.0 * (h[i - 1] + h[i]);
        sup[r] = h[i];
        rhs[r] = 6.0 * (slope(i) - slope(i - 1));
    }

    // M0 = M1 - h0 (M2 - M1) / h1
    let (h0, h1) = (h[0], h[1]);
    diag[0] += h0 + h0 * h0 / h1;
    sup[0] -= h0 * h0 / h1;
    sub[0] = 0.0;

    // M[n-1] = M[n-2] + h[n-2] (M[n-2] - M[n-3]) / h[n-3]
    let (ha, hb) = (h[n - 3], h[n - 2]);
    let last = k - 1;
    diag[last] += hb + hb * hb / ha;
    sub[last] -= hb * hb / ha;
    sup[last] = 0.0;

    let interior = solve_tridiagonal(&sub, &diag, &sup, &rhs);

    let mut m = vec![0.0f64; n];
    m[1..n - 1].copy_from_slice(&interior);
    m[0] = m[1] - h0 * (m[2] - m[1]) / h1;
    m[n - 1] = m[n - 2] + hb * (m[n - 2] - m[n - 3]) / ha;
    m
}

fn solve_tridiagonal(sub: &[f64], diag: &[f64], sup: &[f64], rhs: &[f64]) -> Vec<f64> {
    let k = diag.len();
    let mut c = vec![0.0f64; k];
    let mut d = vec![0.0f64; k];

    c[0] = sup[0] / diag[0];
    d[0] = rhs[0] / diag[0];
    for i in 1..k {
        let denom = diag[i] - sub[i] * c[i - 1];
        c[i] = if i + 1 < k { sup[i] / denom } else { 0.0 };
        d[i] = (rhs[i] - sub[i] * d[i - 1]) / denom;
    }

    let mut x = vec![0.0f64; k];
    x[k - 1] = d[k - 1];
    for i in (0..k - 1).rev() {
        x[i] = d[i] - c[i] * x[i + 1];
    }
    x
}
