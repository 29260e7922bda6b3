//! Weighted-least-squares fit of `p(t) = c0 + c1*t + c2*t^2`, used both for
//! a tracklet's linear velocity fit (degree 1, `c2` held at zero) and for a
//! track candidate's quadratic position/velocity/acceleration fit.
//!
//! Callers that want the fit anchored at a particular reference time (e.g.
//! "the union's earliest detection time") shift `times` to be relative to
//! that reference before calling; `c0` is always the fitted value at `t =
//! 0` of whatever time axis was passed in.

/// Unwraps a sequence of RA samples (degrees) onto a contiguous window
/// around the first sample: any sample more than 180 degrees from the
/// first is shifted by +-360 until it lands within 180 degrees of it. This
/// lets a linear/quadratic fit see a short, monotonic arc instead of a
/// discontinuity at the 0/360 wrap.
pub fn unwrap_ra(ra: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(ra.len());
    if let Some(&first) = ra.first() {
        out.push(first);
        for &r in &ra[1..] {
            let mut shifted = r;
            while shifted - first > 180.0 {
                shifted -= 360.0;
            }
            while shifted - first < -180.0 {
                shifted += 360.0;
            }
            out.push(shifted);
        }
    }
    out
}

/// Fits `p(t) = c0 + c1*t` (unweighted OLS) and returns the slope `c1`.
/// Used for a tracklet's velocity, which the data model treats as a pure
/// linear fit regardless of how many detections the tracklet carries.
/// Returns 0 for fewer than 2 points.
pub fn fit_velocity(times: &[f64], positions: &[f64]) -> f64 {
    debug_assert_eq!(times.len(), positions.len());
    let n = times.len();
    if n < 2 {
        return 0.0;
    }
    let (c0, c1, _c2) = fit_quadratic_degree(times, positions, 1);
    let _ = c0;
    c1
}

/// Fits `p(t) = c0 + c1*t + c2*t^2` (unweighted least squares) and returns
/// `(c0, c1, c2)`. `n < 1` returns zeros. `n == 1` returns `(positions[0],
/// 0, 0)`. `n == 2` falls back to a line (no information to fit a
/// quadratic). `n >= 3` fits the full quadratic via the 3x3 normal
/// equations.
pub fn fit_quadratic(times: &[f64], positions: &[f64]) -> (f64, f64, f64) {
    debug_assert_eq!(times.len(), positions.len());
    let n = times.len();
    match n {
        0 => (0.0, 0.0, 0.0),
        1 => (positions[0], 0.0, 0.0),
        2 => fit_quadratic_degree(times, positions, 1),
        _ => fit_quadratic_degree(times, positions, 2),
    }
}

/// Shared normal-equations solver for degree 1 or 2. Builds the `(degree+1)
/// x (degree+1)` Gram matrix of the monomial basis `[1, t, t^2]` and solves
/// by Gaussian elimination with partial pivoting; there is no linear
/// algebra crate in this workspace's dependency set sized for a throwaway
/// 2x2/3x3 solve, so it is hand-rolled, matching this codebase lineage's
/// habit of hand-rolling small numerical routines (see `cache.rs`'s LRU)
/// rather than reaching for a crate that solves a much bigger problem.
fn fit_quadratic_degree(times: &[f64], positions: &[f64], degree: usize) -> (f64, f64, f64) {
    let dim = degree + 1;
    let mut ata = vec![vec![0.0_f64; dim]; dim];
    let mut atb = vec![0.0_f64; dim];

    for (&t, &p) in times.iter().zip(positions) {
        let mut basis = [0.0_f64; 3];
        basis[0] = 1.0;
        if dim > 1 {
            basis[1] = t;
        }
        if dim > 2 {
            basis[2] = t * t;
        }
        for i in 0..dim {
            atb[i] += basis[i] * p;
            for j in 0..dim {
                ata[i][j] += basis[i] * basis[j];
            }
        }
    }

    let solved = solve_linear_system(&mut ata, &mut atb);
    let c0 = solved.first().copied().unwrap_or(0.0);
    let c1 = solved.get(1).copied().unwrap_or(0.0);
    let c2 = solved.get(2).copied().unwrap_or(0.0);
    (c0, c1, c2)
}

/// Solves `a * x = b` in place via Gaussian elimination with partial
/// pivoting. Returns zeros if the system is (numerically) singular, which
/// only happens for degenerate input such as every time identical.
fn solve_linear_system(a: &mut [Vec<f64>], b: &mut [f64]) -> Vec<f64> {
    let n = b.len();
    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_val = a[col][col].abs();
        for row in (col + 1)..n {
            if a[row][col].abs() > pivot_val {
                pivot_row = row;
                pivot_val = a[row][col].abs();
            }
        }
        if pivot_val < 1e-14 {
            return vec![0.0; n];
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in (row + 1)..n {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    x
}
