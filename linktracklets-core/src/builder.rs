//! At a leaf triple (two endpoint leaves plus a list of support leaves),
//! fits a quadratic motion model, picks the best detection per image time
//! from the support leaves, and emits tracks meeting the minimum-support
//! and minimum-detection thresholds.

use crate::geomath::angular_distance;
use crate::quadfit::{fit_quadratic, unwrap_ra};
use crate::tree::LeafEntry;
use linktracklets_types::{Detection, DetectionIndex, Track, Tracklet, TrackletIndex};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Copy, Clone)]
pub struct TrackBuildConfig {
    pub eps_p: f64,
    pub quad_err: f64,
    pub accel_ra_max: f64,
    pub accel_dec_max: f64,
    pub min_endpoint_separation: f64,
    pub min_support_tracklets: usize,
    pub min_detections_per_track: usize,
    pub min_unique_nights: usize,
}

impl TrackBuildConfig {
    fn residual_bound(&self) -> f64 {
        self.quad_err + self.eps_p
    }
}

/// The fitted quadratic motion model for one candidate track: position at
/// `t0`, velocity, and acceleration on each axis.
struct QuadModel {
    t0: f64,
    ra0: f64,
    v_ra: f64,
    a_ra: f64,
    dec0: f64,
    v_dec: f64,
    a_dec: f64,
}

impl QuadModel {
    fn predict(&self, t: f64) -> (f64, f64) {
        // `a_ra`/`a_dec` are the raw `c2` coefficients of `p(t) = c0 + c1*t +
        // c2*t^2` (the fit's "acceleration" per its own definition), not a
        // literal second derivative, so no factor of 1/2 here.
        let dt = t - self.t0;
        let ra = self.ra0 + self.v_ra * dt + self.a_ra * dt * dt;
        let dec = self.dec0 + self.v_dec * dt + self.a_dec * dt * dt;
        (ra, dec)
    }
}

fn fit_union(detections: &[Detection], indices: &[DetectionIndex]) -> QuadModel {
    let mut sorted = indices.to_vec();
    sorted.sort_by(|&a, &b| detections[a].mjd.partial_cmp(&detections[b].mjd).unwrap());
    let t0 = detections[sorted[0]].mjd;

    let times: Vec<f64> = sorted.iter().map(|&i| detections[i].mjd - t0).collect();
    let ra_raw: Vec<f64> = sorted.iter().map(|&i| detections[i].ra).collect();
    let ra_unwrapped = unwrap_ra(&ra_raw);
    let dec: Vec<f64> = sorted.iter().map(|&i| detections[i].dec).collect();

    let (ra0, v_ra, a_ra) = fit_quadratic(&times, &ra_unwrapped);
    let (dec0, v_dec, a_dec) = fit_quadratic(&times, &dec);

    QuadModel { t0, ra0, v_ra, a_ra, dec0, v_dec, a_dec }
}

fn mjd_key(mjd: f64) -> u64 {
    mjd.to_bits()
}

fn nights_spanned(detections: &[Detection], indices: &BTreeSet<DetectionIndex>) -> usize {
    indices.iter().map(|&i| detections[i].night()).collect::<BTreeSet<_>>().len()
}

/// Tracklet indices contributed by the support leaves; one leaf's entries
/// may repeat a tracklet index (multiple points per tracklet never occurs
/// in this tree, each leaf entry is one tracklet) so the caller flattens
/// once before calling `build_tracks`.
pub fn build_tracks(
    detections: &[Detection],
    tracklets: &[Tracklet],
    endpoint_a: &[LeafEntry],
    endpoint_b: &[LeafEntry],
    support_leaves: &[&[LeafEntry]],
    config: &TrackBuildConfig,
) -> Vec<Track> {
    let mut out = Vec::new();
    let support_tracklets: Vec<TrackletIndex> =
        support_leaves.iter().flat_map(|leaf| leaf.iter().map(|e| e.tracklet)).collect();

    for a in endpoint_a {
        for b in endpoint_b {
            if a.tracklet == b.tracklet {
                continue;
            }
            if let Some(track) = try_build(detections, tracklets, a.tracklet, b.tracklet, &support_tracklets, config) {
                out.push(track);
            }
        }
    }
    out
}

fn try_build(
    detections: &[Detection],
    tracklets: &[Tracklet],
    ta: TrackletIndex,
    tb: TrackletIndex,
    support_tracklets: &[TrackletIndex],
    config: &TrackBuildConfig,
) -> Option<Track> {
    let mut seed_detections: BTreeSet<DetectionIndex> = BTreeSet::new();
    seed_detections.extend(tracklets[ta].detections.iter().copied());
    seed_detections.extend(tracklets[tb].detections.iter().copied());
    let seed_vec: Vec<DetectionIndex> = seed_detections.iter().copied().collect();

    let model = fit_union(detections, &seed_vec);

    if model.a_ra.abs() > config.accel_ra_max || model.a_dec.abs() > config.accel_dec_max {
        return None;
    }

    let bound = config.residual_bound();
    for &d in &seed_vec {
        let det = &detections[d];
        let (pred_ra, pred_dec) = model.predict(det.mjd);
        if angular_distance(pred_ra, pred_dec, det.ra, det.dec) > bound {
            return None;
        }
    }

    let min_t = seed_vec.iter().map(|&i| detections[i].mjd).fold(f64::INFINITY, f64::min);
    let max_t = seed_vec.iter().map(|&i| detections[i].mjd).fold(f64::NEG_INFINITY, f64::max);
    if max_t - min_t < config.min_endpoint_separation {
        return None;
    }

    let mut track_tracklets: BTreeSet<TrackletIndex> = BTreeSet::new();
    track_tracklets.insert(ta);
    track_tracklets.insert(tb);
    let mut track_detections = seed_detections.clone();
    let mut covered_images: std::collections::HashSet<u64> =
        seed_detections.iter().map(|&d| mjd_key(detections[d].mjd)).collect();

    augment(
        detections,
        tracklets,
        support_tracklets,
        &model,
        bound,
        &mut covered_images,
        &mut track_tracklets,
        &mut track_detections,
    );

    if track_tracklets.len() < config.min_support_tracklets + 2 {
        return None;
    }
    if track_detections.len() < config.min_detections_per_track {
        return None;
    }
    if nights_spanned(detections, &track_detections) < config.min_unique_nights {
        return None;
    }

    Some(Track::from_parts(track_tracklets, track_detections))
}

#[allow(clippy::too_many_arguments)]
fn augment(
    detections: &[Detection],
    tracklets: &[Tracklet],
    support_tracklets: &[TrackletIndex],
    model: &QuadModel,
    bound: f64,
    covered_images: &mut std::collections::HashSet<u64>,
    track_tracklets: &mut BTreeSet<TrackletIndex>,
    track_detections: &mut BTreeSet<DetectionIndex>,
) {
    // Pool every (detection, parent tracklet) pair from the support leaves,
    // score by residual, and keep the best-residual candidate per image
    // time; ties broken by detection id ascending, per the deterministic
    // ordering rule.
    let mut by_image: HashMap<u64, (f64, DetectionIndex, TrackletIndex)> = HashMap::new();

    for &tracklet_idx in support_tracklets {
        for &d in &tracklets[tracklet_idx].detections {
            let det = &detections[d];
            let (pred_ra, pred_dec) = model.predict(det.mjd);
            let residual = angular_distance(pred_ra, pred_dec, det.ra, det.dec);
            if residual > bound {
                continue;
            }
            let key = mjd_key(det.mjd);
            let candidate = (residual, d, tracklet_idx);
            by_image
                .entry(key)
                .and_modify(|best| {
                    if is_better(&candidate, best, detections) {
                        *best = candidate;
                    }
                })
                .or_insert(candidate);
        }
    }

    for (image_key, (_, d, tracklet_idx)) in by_image {
        if covered_images.contains(&image_key) {
            continue;
        }
        covered_images.insert(image_key);
        track_detections.insert(d);
        track_tracklets.insert(tracklet_idx);
    }
}

fn is_better(
    candidate: &(f64, DetectionIndex, TrackletIndex),
    current: &(f64, DetectionIndex, TrackletIndex),
    detections: &[Detection],
) -> bool {
    let (c_res, c_d, _) = candidate;
    let (b_res, b_d, _) = current;
    if c_res != b_res {
        return c_res < b_res;
    }
    detections[*c_d].id < detections[*b_d].id
}
