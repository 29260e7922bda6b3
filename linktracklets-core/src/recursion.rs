//! The dual-endpoint recursive search: at each call, tests endpoint
//! reachability, filters and splits the support list, and either recurses
//! on a split endpoint or, at a leaf triple, hands off to [`crate::builder`].
//!
//! Includes the "iterations till split" optimization that reuses a
//! support list across a bounded number of recursion levels instead of
//! refiltering at every call.

use crate::builder::{build_tracks, TrackBuildConfig};
use crate::cache::ProjectionCache;
use crate::reachability::{reachable, MotionConfig};
use crate::store::TrackStore;
use crate::tree::TrackletTree;
use linktracklets_types::{Detection, ImageId, Tracklet};
use std::collections::HashSet;

/// One node within one image's tree, carrying enough context (image id,
/// image time) to project and cache against other images.
#[derive(Debug, Copy, Clone)]
pub struct NodeRef<'a> {
    pub image: ImageId,
    pub time: f64,
    pub tree: &'a TrackletTree,
    pub node: u32,
}

#[derive(Debug, Copy, Clone)]
pub struct RecursionConfig {
    pub motion: MotionConfig,
    pub min_support_tracklets: usize,
    /// `K`: the number of recursion levels that may reuse the previous
    /// support list without refiltering it. `0` refilters at every call,
    /// matching the reference behavior.
    pub iterations_till_split: u32,
}

/// Bundles everything a recursion call needs beyond the endpoint/support
/// triple, so the recursive signature stays readable.
pub struct LinkContext<'a> {
    pub cache: &'a mut ProjectionCache,
    pub detections: &'a [Detection],
    pub tracklets: &'a [Tracklet],
    pub config: &'a RecursionConfig,
    pub build_config: &'a TrackBuildConfig,
    pub store: &'a mut TrackStore,
    /// Wall-clock deadline for this pair's whole recursion tree. Checked at
    /// the top of every call, the closest analog this synchronous recursion
    /// has to "yield at the next support-filter step".
    pub deadline: Option<std::time::Instant>,
    /// Set once the deadline is observed exceeded; the caller (the driver)
    /// inspects this after `link` returns to decide whether to report the
    /// pair as timed out.
    pub timed_out: bool,
}

/// Runs one `(E1, E2, S)` search to completion, depositing every emitted
/// track into `ctx.store`. Returns `false` if the search was abandoned
/// early because `ctx.deadline` passed.
pub fn link<'a>(e1: NodeRef<'a>, e2: NodeRef<'a>, support: Vec<NodeRef<'a>>, ctx: &mut LinkContext) -> bool {
    recurse(e1, e2, support, 0, ctx);
    !ctx.timed_out
}

fn node_reachable(cache: &mut ProjectionCache, a: &NodeRef, b: &NodeRef, config: &RecursionConfig) -> bool {
    reachable(cache, a.tree, a.node, a.image, a.time, b.tree, b.node, b.image, b.time, &config.motion)
}

fn count_distinct_images(support: &[NodeRef]) -> usize {
    support.iter().map(|s| s.image).collect::<HashSet<_>>().len()
}

/// Step 2 of one recursion call: drop support nodes that fail reachability
/// against either endpoint, and descend any surviving non-leaf support node
/// into whichever of its children also pass.
fn filter_and_split<'a>(
    e1: &NodeRef<'a>,
    e2: &NodeRef<'a>,
    support: Vec<NodeRef<'a>>,
    cache: &mut ProjectionCache,
    config: &RecursionConfig,
) -> Vec<NodeRef<'a>> {
    let mut out = Vec::with_capacity(support.len());
    for s in support {
        if !(node_reachable(cache, e1, &s, config) && node_reachable(cache, e2, &s, config)) {
            continue;
        }
        let node = s.tree.node(s.node);
        if node.is_leaf() {
            out.push(s);
            continue;
        }
        if let Some((l, r)) = node.children() {
            for child in [l, r] {
                let child_ref = NodeRef { node: child, ..s };
                if node_reachable(cache, e1, &child_ref, config) && node_reachable(cache, e2, &child_ref, config) {
                    out.push(child_ref);
                }
            }
        }
    }
    out
}

fn recurse<'a>(e1: NodeRef<'a>, e2: NodeRef<'a>, support: Vec<NodeRef<'a>>, since_split: u32, ctx: &mut LinkContext) {
    if let Some(deadline) = ctx.deadline {
        if std::time::Instant::now() >= deadline {
            ctx.timed_out = true;
            return;
        }
    }

    if !node_reachable(ctx.cache, &e1, &e2, ctx.config) {
        return;
    }

    let e1_leaf = e1.tree.node(e1.node).is_leaf();
    let e2_leaf = e2.tree.node(e2.node).is_leaf();
    // Even when the optimization would otherwise skip this level's
    // filter-and-split, the base case must see a freshly filtered, all-leaf
    // support list before TrackBuilder runs.
    let must_refilter = since_split >= ctx.config.iterations_till_split || (e1_leaf && e2_leaf);

    let (support, distinct_images, next_since_split) = if must_refilter {
        let filtered = filter_and_split(&e1, &e2, support, ctx.cache, ctx.config);
        let distinct = count_distinct_images(&filtered);
        (filtered, distinct, 0)
    } else {
        let distinct = count_distinct_images(&support);
        (support, distinct, since_split + 1)
    };

    if distinct_images < ctx.config.min_support_tracklets {
        return;
    }

    let all_support_leaves = support.iter().all(|s| s.tree.node(s.node).is_leaf());

    if e1_leaf && e2_leaf && all_support_leaves {
        run_track_builder(e1, e2, &support, ctx);
        return;
    }

    if e1_leaf && e2_leaf {
        // Endpoints are settled; only the support list still needs to
        // descend to leaves. `must_refilter` was forced true above, so this
        // call already holds the freshly split support.
        recurse(e1, e2, support, next_since_split, ctx);
        return;
    }

    let w1 = e1.tree.node(e1.node).width();
    let w2 = e2.tree.node(e2.node).width();
    if w1 >= w2 {
        let (l, r) = e1.tree.node(e1.node).children().expect("non-leaf node must have children");
        for child in [l, r] {
            let child_ref = NodeRef { node: child, ..e1 };
            recurse(child_ref, e2, support.clone(), next_since_split, ctx);
        }
    } else {
        let (l, r) = e2.tree.node(e2.node).children().expect("non-leaf node must have children");
        for child in [l, r] {
            let child_ref = NodeRef { node: child, ..e2 };
            recurse(e1, child_ref, support.clone(), next_since_split, ctx);
        }
    }
}

fn run_track_builder(e1: NodeRef, e2: NodeRef, support: &[NodeRef], ctx: &mut LinkContext<'_>) {
    let endpoint_a = e1.tree.node(e1.node).leaf_points().expect("base case requires a leaf endpoint");
    let endpoint_b = e2.tree.node(e2.node).leaf_points().expect("base case requires a leaf endpoint");
    let support_slices: Vec<&[crate::tree::LeafEntry]> = support
        .iter()
        .map(|s| s.tree.node(s.node).leaf_points().expect("base case requires leaf support"))
        .collect();

    let tracks = build_tracks(ctx.detections, ctx.tracklets, endpoint_a, endpoint_b, &support_slices, ctx.build_config);
    for track in tracks {
        ctx.store.insert(track);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linktracklets_types::DetectionId;

    fn det(id: i64, mjd: f64, ra: f64, dec: f64) -> Detection {
        Detection::new(DetectionId(id), mjd, ra, dec)
    }

    fn single_point_tree(ra: f64, dec: f64, v_ra: f64, v_dec: f64, tracklet: usize, dt: f64) -> TrackletTree {
        TrackletTree::build(vec![([ra, dec, v_ra, v_dec], tracklet, Some(dt))], 0.002, 0.002, 4, [1.0; 4]).unwrap()
    }

    #[test]
    fn simple_linear_track_end_to_end() {
        let detections = vec![
            det(0, 5300.00, 50.000, 50.000),
            det(1, 5300.01, 50.001, 50.001),
            det(2, 5301.00, 50.100, 50.100),
            det(3, 5301.01, 50.101, 50.101),
            det(4, 5302.00, 50.200, 50.200),
            det(5, 5302.01, 50.201, 50.201),
        ];
        let tracklets =
            vec![Tracklet { detections: vec![0, 1], v_ra: 0.1, v_dec: 0.1 }, Tracklet { detections: vec![2, 3], v_ra: 0.1, v_dec: 0.1 }, Tracklet {
                detections: vec![4, 5],
                v_ra: 0.1,
                v_dec: 0.1,
            }];

        let tree0 = single_point_tree(50.000, 50.000, 0.1, 0.1, 0, 0.01);
        let tree1 = single_point_tree(50.100, 50.100, 0.1, 0.1, 1, 0.01);
        let tree2 = single_point_tree(50.200, 50.200, 0.1, 0.1, 2, 0.01);

        let e1 = NodeRef { image: ImageId(0), time: 5300.00, tree: &tree0, node: tree0.root() };
        let e2 = NodeRef { image: ImageId(2), time: 5302.00, tree: &tree2, node: tree2.root() };
        let support = vec![NodeRef { image: ImageId(1), time: 5301.00, tree: &tree1, node: tree1.root() }];

        let mut cache = ProjectionCache::new(64);
        let mut store = TrackStore::new();
        let recursion_config =
            RecursionConfig { motion: MotionConfig { accel_ra_max: 1e-2, accel_dec_max: 1e-2 }, min_support_tracklets: 1, iterations_till_split: 0 };
        let build_config = TrackBuildConfig {
            eps_p: 0.002,
            quad_err: 0.01,
            accel_ra_max: 1e-2,
            accel_dec_max: 1e-2,
            min_endpoint_separation: 1.0,
            min_support_tracklets: 1,
            min_detections_per_track: 4,
            min_unique_nights: 3,
        };

        let mut ctx = LinkContext {
            cache: &mut cache,
            detections: &detections,
            tracklets: &tracklets,
            config: &recursion_config,
            build_config: &build_config,
            store: &mut store,
            deadline: None,
            timed_out: false,
        };

        link(e1, e2, support, &mut ctx);

        assert_eq!(store.len(), 1);
        let track = store.iter().next().unwrap();
        assert_eq!(track.detection_count(), 6);
        assert_eq!(track.tracklet_count(), 3);
    }

    #[test]
    fn insufficient_support_yields_nothing() {
        let detections = vec![det(0, 5300.00, 50.000, 50.000), det(1, 5300.01, 50.001, 50.001), det(2, 5305.00, 50.500, 50.500), det(3, 5305.01, 50.501, 50.501)];
        let tracklets = vec![Tracklet { detections: vec![0, 1], v_ra: 0.1, v_dec: 0.1 }, Tracklet { detections: vec![2, 3], v_ra: 0.1, v_dec: 0.1 }];

        let tree0 = single_point_tree(50.000, 50.000, 0.1, 0.1, 0, 0.01);
        let tree1 = single_point_tree(50.500, 50.500, 0.1, 0.1, 1, 0.01);

        let e1 = NodeRef { image: ImageId(0), time: 5300.00, tree: &tree0, node: tree0.root() };
        let e2 = NodeRef { image: ImageId(1), time: 5305.00, tree: &tree1, node: tree1.root() };

        let mut cache = ProjectionCache::new(64);
        let mut store = TrackStore::new();
        let recursion_config =
            RecursionConfig { motion: MotionConfig { accel_ra_max: 1e-2, accel_dec_max: 1e-2 }, min_support_tracklets: 1, iterations_till_split: 0 };
        let build_config = TrackBuildConfig {
            eps_p: 0.002,
            quad_err: 0.01,
            accel_ra_max: 1e-2,
            accel_dec_max: 1e-2,
            min_endpoint_separation: 1.0,
            min_support_tracklets: 1,
            min_detections_per_track: 4,
            min_unique_nights: 2,
        };

        let mut ctx = LinkContext {
            cache: &mut cache,
            detections: &detections,
            tracklets: &tracklets,
            config: &recursion_config,
            build_config: &build_config,
            store: &mut store,
            deadline: None,
            timed_out: false,
        };

        link(e1, e2, Vec::new(), &mut ctx);

        assert!(store.is_empty(), "no support nodes means minSupportTracklets can never be satisfied");
    }
}
