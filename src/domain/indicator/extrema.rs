//! Cubic-fit shape indicators.
//!
//! Both indicators sample a base indicator at `i, i-lag, ..., i-(samples-1)*lag`
//! and fit f(t) = a0 + a1 t + a2 t^2 + a3 t^3 by least squares, where
//! t = samples-1-k for the k-th sample (so the evaluation point sits at
//! t = samples-1). The fit runs in f64; only the result is converted back.
//!
//! Local-extrema codes at the evaluation point:
//!
//! | code | shape                                   |
//! |------|-----------------------------------------|
//! | -1   | not enough history                      |
//! | 0    | rising, decelerating, far from the top  |
//! | 1    | rising into a local maximum             |
//! | 2    | just past a local maximum               |
//! | 3    | falling                                 |
//! | 4    | falling into a local minimum            |
//! | 5    | just past a local minimum               |
//! | 6    | rising, accelerating                    |

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::indicator::Indicator;
use crate::domain::series::TimeSeries;

pub const INVALID: i64 = -1;

/// Cubic coefficients this small relative to the largest one are fit noise.
const CUBIC_TOLERANCE: f64 = 1e-9;

/// Least-squares cubic in the reparameterised sample variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cubic {
    /// a0, a1, a2, a3
    pub coeffs: [f64; 4],
}

impl Cubic {
    /// Fit `samples` points produced by `sample(t)` for t = 0..samples.
    ///
    /// Returns `None` when fewer than four points are given or the normal
    /// equations are singular.
    pub fn fit(samples: usize, mut sample: impl FnMut(usize) -> f64) -> Option<Self> {
        if samples < 4 {
            return None;
        }

        // power sums S_p = sum t^p for p in 0..=6, moments B_r = sum y t^r for r in 0..=3
        let mut power_sums = [0.0f64; 7];
        let mut moments = [0.0f64; 4];
        for t in 0..samples {
            let tf = t as f64;
            let y = sample(t);
            let mut p = 1.0;
            for (n, sum) in power_sums.iter_mut().enumerate() {
                *sum += p;
                if n < 4 {
                    moments[n] += y * p;
                }
                p *= tf;
            }
        }

        let mut matrix = [[0.0f64; 5]; 4];
        for (r, row) in matrix.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().take(4).enumerate() {
                *cell = power_sums[r + c];
            }
            row[4] = moments[r];
        }

        solve(matrix).map(|coeffs| Self { coeffs })
    }

    pub fn value(&self, t: f64) -> f64 {
        let [a0, a1, a2, a3] = self.coeffs;
        a0 + t * (a1 + t * (a2 + t * a3))
    }

    /// f'(t)
    pub fn slope(&self, t: f64) -> f64 {
        let [_, a1, a2, a3] = self.coeffs;
        a1 + 2.0 * a2 * t + 3.0 * a3 * t * t
    }

    /// f''(t)
    pub fn curvature(&self, t: f64) -> f64 {
        let [_, _, a2, a3] = self.coeffs;
        2.0 * a2 + 6.0 * a3 * t
    }

    /// a3, or zero when it is negligible against the other coefficients.
    pub fn cubic_term(&self) -> f64 {
        let scale = self.coeffs.iter().fold(0.0f64, |acc, a| acc.max(a.abs()));
        let a3 = self.coeffs[3];
        if a3.abs() <= CUBIC_TOLERANCE * scale { 0.0 } else { a3 }
    }

    /// (local maximum, local minimum) when f' has two real roots.
    pub fn critical_points(&self) -> Option<(f64, f64)> {
        let [_, a1, a2, _] = self.coeffs;
        let a3 = self.cubic_term();
        let discriminant = a2 * a2 - 3.0 * a1 * a3;
        if a3 == 0.0 || discriminant <= 0.0 {
            return None;
        }
        let root = discriminant.sqrt();
        let r1 = (-a2 - root) / (3.0 * a3);
        let r2 = (-a2 + root) / (3.0 * a3);
        let (lo, hi) = if r1 < r2 { (r1, r2) } else { (r2, r1) };
        // f'' = 2a2 + 6a3 t grows with t when a3 > 0, so the maximum comes first.
        if a3 > 0.0 { Some((lo, hi)) } else { Some((hi, lo)) }
    }
}

/// Gaussian elimination with partial pivoting on an augmented 4x5 matrix.
fn solve(mut m: [[f64; 5]; 4]) -> Option<[f64; 4]> {
    for col in 0..4 {
        let pivot = (col..4).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot);
        for row in (col + 1)..4 {
            let factor = m[row][col] / m[col][col];
            for k in col..5 {
                m[row][k] -= factor * m[col][k];
            }
        }
    }

    let mut x = [0.0f64; 4];
    for row in (0..4).rev() {
        let mut acc = m[row][4];
        for k in (row + 1)..4 {
            acc -= m[row][k] * x[k];
        }
        x[row] = acc / m[row][row];
    }
    Some(x)
}

/// Fit the base indicator over the lagged sample window ending at `index`.
fn fit_window(
    base: &Indicator,
    series: &TimeSeries,
    index: usize,
    lag: usize,
    samples: usize,
) -> Option<Cubic> {
    let span = lag.checked_mul(samples.checked_sub(1)?)?;
    let oldest = index.checked_sub(span)?;
    Cubic::fit(samples, |t| {
        // t = samples-1-k  =>  sample index = i - k*lag = oldest + t*lag
        base.calculate(series, oldest + t * lag)
            .to_f64()
            .unwrap_or(0.0)
    })
}

/// Classify the fitted shape at t = samples-1.
pub fn classify(cubic: &Cubic, samples: usize) -> i64 {
    let t = (samples - 1) as f64;
    let slope = cubic.slope(t);
    let curvature = cubic.curvature(t);

    let Some((maximum, minimum)) = cubic.critical_points() else {
        return if cubic.cubic_term() > 0.0 { 6 } else { 3 };
    };

    // One sample step is `lag` candles, so "within lag" is one unit of t.
    if curvature < 0.0 {
        let near = (t - maximum).abs() <= 1.0;
        match (slope > 0.0, near) {
            (true, true) => 1,
            (true, false) => 0,
            (false, true) => 2,
            (false, false) => 3,
        }
    } else {
        let near = (t - minimum).abs() <= 1.0;
        match (slope > 0.0, near) {
            (false, true) => 4,
            (false, false) => 3,
            (true, true) => 5,
            (true, false) => 6,
        }
    }
}

pub fn local_extrema_at(
    base: &Indicator,
    series: &TimeSeries,
    index: usize,
    lag: usize,
    samples: usize,
) -> Decimal {
    let code = fit_window(base, series, index, lag, samples)
        .map(|cubic| classify(&cubic, samples))
        .unwrap_or(INVALID);
    Decimal::from(code)
}

/// 1 when the fitted curve changes sign over the last sample step, else 0.
pub fn zero_crossing_at(
    base: &Indicator,
    series: &TimeSeries,
    index: usize,
    lag: usize,
    samples: usize,
) -> Decimal {
    let Some(cubic) = fit_window(base, series, index, lag, samples) else {
        return Decimal::ZERO;
    };
    let t = (samples - 1) as f64;
    if cubic.value(t) * cubic.value(t - 1.0) < 0.0 {
        Decimal::ONE
    } else {
        Decimal::ZERO
    }
}
