//! Forward/backward projection of node bounds under bounded acceleration,
//! and the pair-of-nodes compatibility predicate built on top of it.
//!
//! A node's stored bounds (`TrackletTreeNode::upper`/`lower`) already carry
//! the positional/velocity error inflation from tree construction; this
//! module only projects those bounds through the acceleration envelope to
//! another image time and tests overlap.

use crate::cache::{Bounds, CacheKey, ProjectionCache};
use crate::geomath::{angular_intervals_overlap, intervals_overlap, normalize_deg};
use crate::tree::{Point4, TrackletTree, DEC, RA, V_DEC, V_RA};
use linktracklets_types::ImageId;

/// Acceleration bounds governing the motion model. Positional/velocity
/// error (`eps_p`/`eps_v`) is applied at tree-build time, not here.
#[derive(Debug, Copy, Clone)]
pub struct MotionConfig {
    pub accel_ra_max: f64,
    pub accel_dec_max: f64,
}

/// Projects a single axis's `(p_min, p_max, v_min, v_max)` forward by
/// `dt >= 0` under maximum acceleration magnitude `accel`. Strictly
/// widening: `p_max'/v_max'` only grow, `p_min'/v_min'` only shrink.
fn project_forward(p_min: f64, p_max: f64, v_min: f64, v_max: f64, accel: f64, dt: f64) -> (f64, f64, f64, f64) {
    debug_assert!(dt >= 0.0);
    let p_max_n = p_max + v_max * dt + 0.5 * accel * dt * dt;
    let v_max_n = v_max + accel * dt;
    let p_min_n = p_min + v_min * dt - 0.5 * accel * dt * dt;
    let v_min_n = v_min - accel * dt;
    (p_min_n, p_max_n, v_min_n, v_max_n)
}

/// Projects a single axis's `(p_min, p_max, v_min, v_max)` backward by
/// `dt < 0`: answers "what range could reach this region by `|dt|` from
/// now", which is the pre-image of [`project_forward`]. Also strictly
/// widening.
fn project_backward(p_min: f64, p_max: f64, v_min: f64, v_max: f64, accel: f64, dt: f64) -> (f64, f64, f64, f64) {
    debug_assert!(dt < 0.0);
    let abs_dt = dt.abs();
    let v_max_n = v_max + accel * abs_dt;
    let v_min_n = v_min - accel * abs_dt;
    let p_max_n = p_max + v_min * dt + accel * dt * dt;
    let p_min_n = p_min + v_max * dt - accel * dt * dt;
    (p_min_n, p_max_n, v_min_n, v_max_n)
}

/// Projects a node's 4-D bounds from `source_time` to `target_time`
/// (`dt = target_time - source_time`) under the given acceleration bounds.
pub fn project_bounds(upper: &Point4, lower: &Point4, dt: f64, config: &MotionConfig) -> (Point4, Point4) {
    let mut new_upper = *upper;
    let mut new_lower = *lower;

    let project = if dt >= 0.0 { project_forward } else { project_backward };

    let (dec_min, dec_max, vdec_min, vdec_max) =
        project(lower[DEC], upper[DEC], lower[V_DEC], upper[V_DEC], config.accel_dec_max, dt);
    new_lower[DEC] = dec_min;
    new_upper[DEC] = dec_max;
    new_lower[V_DEC] = vdec_min;
    new_upper[V_DEC] = vdec_max;

    let (ra_min, ra_max, vra_min, vra_max) =
        project(lower[RA], upper[RA], lower[V_RA], upper[V_RA], config.accel_ra_max, dt);
    new_lower[RA] = ra_min;
    new_upper[RA] = ra_max;
    new_lower[V_RA] = vra_min;
    new_upper[V_RA] = vra_max;

    (new_upper, new_lower)
}

/// Expands node `a`'s bounds to `target_image`'s time, consulting/filling
/// `cache` first.
pub fn expand_to(
    cache: &mut ProjectionCache,
    tree_a: &TrackletTree,
    node_a: u32,
    source_image: ImageId,
    source_time: f64,
    target_image: ImageId,
    target_time: f64,
    config: &MotionConfig,
) -> Bounds {
    let key = CacheKey { node_id: node_a, source_image, target_image };
    if let Some(bounds) = cache.lookup(key) {
        return bounds;
    }
    let node = tree_a.node(node_a);
    let dt = target_time - source_time;
    let (upper, lower) = project_bounds(node.upper(), node.lower(), dt, config);
    let bounds = Bounds { upper, lower };
    cache.insert(key, bounds);
    bounds
}

/// Tests whether the four independent axes of `a` (already projected to
/// `b`'s time) and `b` overlap: Dec and Dec-velocity as plain Euclidean
/// intervals, RA and RA-velocity with RA treated as wrapping the circle.
pub fn axes_overlap(a: &Bounds, b_upper: &Point4, b_lower: &Point4) -> bool {
    if !intervals_overlap(a.lower[DEC], a.upper[DEC], b_lower[DEC], b_upper[DEC]) {
        return false;
    }
    if !intervals_overlap(a.lower[V_DEC], a.upper[V_DEC], b_lower[V_DEC], b_upper[V_DEC]) {
        return false;
    }
    if !intervals_overlap(a.lower[V_RA], a.upper[V_RA], b_lower[V_RA], b_upper[V_RA]) {
        return false;
    }
    let a_ra_lo = normalize_deg(a.lower[RA]);
    let a_ra_hi = a_ra_lo + (a.upper[RA] - a.lower[RA]);
    let b_ra_lo = normalize_deg(b_lower[RA]);
    let b_ra_hi = b_ra_lo + (b_upper[RA] - b_lower[RA]);
    angular_intervals_overlap(a_ra_lo, a_ra_hi, b_ra_lo, b_ra_hi)
}

/// Full compatibility predicate: could any object governed by `config`
/// reside in node `a` at `time_a` (image `image_a`) and also in node `b`
/// at `time_b` (image `image_b`)?
#[allow(clippy::too_many_arguments)]
pub fn reachable(
    cache: &mut ProjectionCache,
    tree_a: &TrackletTree,
    node_a: u32,
    image_a: ImageId,
    time_a: f64,
    tree_b: &TrackletTree,
    node_b: u32,
    image_b: ImageId,
    time_b: f64,
    config: &MotionConfig,
) -> bool {
    let expanded = expand_to(cache, tree_a, node_a, image_a, time_a, image_b, time_b, config);
    let b = tree_b.node(node_b);
    axes_overlap(&expanded, b.upper(), b.lower())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_projection_is_widening() {
        let (p_min, p_max, v_min, v_max) = project_forward(10.0, 10.0, 0.1, 0.1, 0.01, 2.0);
        assert!(p_max >= 10.0);
        assert!(p_min <= 10.0);
        assert!(v_max >= 0.1);
        assert!(v_min <= 0.1);
    }

    #[test]
    fn backward_projection_is_widening() {
        let (p_min, p_max, v_min, v_max) = project_backward(10.0, 10.0, 0.1, 0.1, 0.01, -2.0);
        assert!(p_max >= 10.0);
        assert!(p_min <= 10.0);
        assert!(v_max >= 0.1);
        assert!(v_min <= 0.1);
    }

    #[test]
    fn forward_then_backward_roundtrip_contains_origin() {
        // Forward-project by dt, then backward-project by -dt: the result
        // must still contain the original range (monotonic widening, not
        // necessarily exact since both legs independently widen).
        let (p_min, p_max, v_min, v_max) = project_forward(10.0, 10.2, 0.1, 0.12, 0.01, 3.0);
        let (p_min2, p_max2, v_min2, v_max2) = project_backward(p_min, p_max, v_min, v_max, 0.01, -3.0);
        assert!(p_min2 <= 10.0);
        assert!(p_max2 >= 10.2);
        assert!(v_min2 <= 0.1);
        assert!(v_max2 >= 0.12);
    }

    #[test]
    fn zero_dt_projection_is_identity() {
        let (p_min, p_max, v_min, v_max) = project_forward(10.0, 10.2, 0.1, 0.12, 0.01, 0.0);
        assert_eq!((p_min, p_max, v_min, v_max), (10.0, 10.2, 0.1, 0.12));
    }

    fn single_leaf_tree(point: Point4) -> TrackletTree {
        TrackletTree::build(vec![(point, 0usize, None)], 0.002, 0.002, 4, [1.0; 4]).unwrap()
    }

    #[test]
    fn reachability_is_symmetric() {
        let config = MotionConfig { accel_ra_max: 2e-4, accel_dec_max: 2e-3 };
        let tree_a = single_leaf_tree([50.0, 50.0, 0.1, 0.1]);
        let tree_b = single_leaf_tree([50.11, 50.11, 0.1, 0.1]);

        let mut cache_fwd = ProjectionCache::new(16);
        let forward = reachable(
            &mut cache_fwd,
            &tree_a,
            tree_a.root(),
            ImageId(0),
            5300.0,
            &tree_b,
            tree_b.root(),
            ImageId(1),
            5301.0,
            &config,
        );

        let mut cache_bwd = ProjectionCache::new(16);
        let backward = reachable(
            &mut cache_bwd,
            &tree_b,
            tree_b.root(),
            ImageId(1),
            5301.0,
            &tree_a,
            tree_a.root(),
            ImageId(0),
            5300.0,
            &config,
        );

        assert_eq!(forward, backward);
        assert!(forward, "nearby same-velocity nodes one day apart should be reachable");
    }

    #[test]
    fn incompatible_on_position_only() {
        // Same velocity on both nodes (so the velocity axes overlap after
        // projection), but node b sits far enough away in RA that no
        // bounded-acceleration trajectory from a could reach it.
        let config = MotionConfig { accel_ra_max: 2e-4, accel_dec_max: 2e-4 };
        let tree_a = single_leaf_tree([50.0, 50.0, 0.1, 0.1]);
        let tree_b = single_leaf_tree([60.0, 50.1, 0.1, 0.1]);

        let mut cache = ProjectionCache::new(16);
        let result = reachable(&mut cache, &tree_a, tree_a.root(), ImageId(0), 5300.0, &tree_b, tree_b.root(), ImageId(1), 5301.0, &config);
        assert!(!result, "a node 10 degrees away in RA cannot be reached in one day under a tiny acceleration bound");
    }

    #[test]
    fn incompatible_on_velocity_only() {
        // Node b's position sits inside a's projected RA/Dec range, but its
        // velocity is wildly different, so the velocity axes can't overlap.
        let config = MotionConfig { accel_ra_max: 2e-4, accel_dec_max: 2e-4 };
        let tree_a = single_leaf_tree([50.0, 50.0, 0.1, 0.1]);
        let tree_b = single_leaf_tree([50.1, 50.1, 5.0, 0.1]);

        let mut cache = ProjectionCache::new(16);
        let result = reachable(&mut cache, &tree_a, tree_a.root(), ImageId(0), 5300.0, &tree_b, tree_b.root(), ImageId(1), 5301.0, &config);
        assert!(!result, "a node moving 50x faster in RA cannot share a, even though its position lies in a's reach");
    }
}
