//! Angular-distance, degree normalization, and 1-D interval overlap with
//! angular wrap. The rest of the crate treats RA as living on the circle
//! `[0, 360)` and Dec as Euclidean on `[-90, 90]`; this module is the only
//! place that knows how to compare the two consistently.

/// Relative-absolute epsilon used by [`are_equal`].
pub const EPSILON: f64 = 1e-10;

/// Normalizes `x` into `[0, 360)`. Handles any finite `x`, including large
/// negative values and values many multiples of 360 away from the range.
pub fn normalize_deg(x: f64) -> f64 {
    let y = x % 360.0;
    if y < 0.0 {
        y + 360.0
    } else {
        y
    }
}

/// Great-circle distance in degrees between two sky positions, via the
/// standard spherical law of cosines (stable enough at the sub-degree
/// scales this linker operates at; a haversine formula would only matter
/// for antipodal points, which never arise for tracklets of the same
/// object).
pub fn angular_distance(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let (ra1, dec1, ra2, dec2) = (
        ra1.to_radians(),
        dec1.to_radians(),
        ra2.to_radians(),
        dec2.to_radians(),
    );
    let cos_d = dec1.sin() * dec2.sin() + dec1.cos() * dec2.cos() * (ra1 - ra2).cos();
    cos_d.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Whether the closed intervals `[a0, a1]` and `[b0, b1]` intersect.
pub fn intervals_overlap(a0: f64, a1: f64, b0: f64, b1: f64) -> bool {
    a0 <= b1 && b0 <= a1
}

/// Whether two RA intervals overlap modulo the `[0, 360)` wrap. Each
/// interval is first normalized to `[0, 360)`; if an interval's own bounds
/// wrap (its lower bound is numerically greater than its upper bound after
/// normalization) it is split into two sub-intervals around the wrap point.
pub fn angular_intervals_overlap(a0: f64, a1: f64, b0: f64, b1: f64) -> bool {
    let a = split_wrapped(a0, a1);
    let b = split_wrapped(b0, b1);
    a.iter()
        .any(|&(al, au)| b.iter().any(|&(bl, bu)| intervals_overlap(al, au, bl, bu)))
}

/// Splits a (possibly wrap-crossing) RA interval into one or two
/// non-wrapping sub-intervals covering the same points of the circle.
fn split_wrapped(lo: f64, hi: f64) -> [(f64, f64); 2] {
    let lo_n = normalize_deg(lo);
    let span = hi - lo;
    if span >= 360.0 {
        // Covers the whole circle.
        return [(0.0, 360.0), (0.0, 360.0)];
    }
    let hi_n = lo_n + span;
    if hi_n <= 360.0 {
        [(lo_n, hi_n), (lo_n, hi_n)]
    } else {
        [(lo_n, 360.0), (0.0, hi_n - 360.0)]
    }
}

/// Fixed relative-absolute epsilon comparison for scalars.
pub fn are_equal(a: f64, b: f64) -> bool {
    let diff = (a - b).abs();
    if diff <= EPSILON {
        return true;
    }
    diff <= EPSILON * a.abs().max(b.abs())
}
