//! MITI-style detection/tracklet file readers and the track output writer.
//!
//! Detection lines are whitespace-delimited `id t_MJD ra_deg dec_deg mag
//! obscode objName length angle [etime]`; only the first four fields are
//! retained. Tracklet lines are whitespace-separated lists of detection
//! ids. Track output is one line per track, space-separated detection ids,
//! newline-terminated.

use linktracklets_types::{Detection, DetectionId, DetectionIndex, LinkError, LinkResult, Track, Tracklet};
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, Read, Write};

pub fn read_detections<R: Read>(reader: R) -> LinkResult<Vec<Detection>> {
    let mut out = Vec::new();
    let mut seen_ids = HashSet::new();

    for (lineno, line) in BufReader::new(reader).lines().enumerate() {
        let line = line.map_err(|e| LinkError::BadInput(format!("detections line {}: {}", lineno + 1, e)))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(LinkError::BadInput(format!("detections line {}: expected at least 4 fields, got {}", lineno + 1, fields.len())));
        }

        let id: i64 = parse_field(fields[0], "detection id", lineno + 1)?;
        let mjd: f64 = parse_field(fields[1], "t_MJD", lineno + 1)?;
        let ra: f64 = parse_field(fields[2], "ra_deg", lineno + 1)?;
        let dec: f64 = parse_field(fields[3], "dec_deg", lineno + 1)?;

        let detection_id = DetectionId(id);
        if !seen_ids.insert(detection_id) {
            return Err(LinkError::BadInput(format!("detections line {}: duplicate detection id {}", lineno + 1, id)));
        }
        out.push(Detection::new(detection_id, mjd, ra, dec));
    }
    Ok(out)
}

pub fn read_tracklets<R: Read>(reader: R, detections: &[Detection]) -> LinkResult<Vec<Tracklet>> {
    let index: HashMap<DetectionId, DetectionIndex> = detections.iter().enumerate().map(|(i, d)| (d.id, i)).collect();

    let mut out = Vec::new();
    for (lineno, line) in BufReader::new(reader).lines().enumerate() {
        let line = line.map_err(|e| LinkError::BadInput(format!("tracklets line {}: {}", lineno + 1, e)))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut members = Vec::new();
        let mut seen_ids = HashSet::new();
        for token in line.split_whitespace() {
            let id: i64 = parse_field(token, "detection id", lineno + 1)?;
            let detection_id = DetectionId(id);
            if !seen_ids.insert(detection_id) {
                return Err(LinkError::BadInput(format!("tracklets line {}: duplicate detection id {} in tracklet", lineno + 1, id)));
            }
            let idx = *index
                .get(&detection_id)
                .ok_or_else(|| LinkError::BadInput(format!("tracklets line {}: unknown detection id {}", lineno + 1, id)))?;
            members.push(idx);
        }

        if members.len() < 2 {
            return Err(LinkError::BadInput(format!("tracklets line {}: a tracklet must contain at least 2 detections", lineno + 1)));
        }
        out.push(Tracklet::new(members));
    }
    Ok(out)
}

pub fn write_tracks<W: Write>(mut writer: W, tracks: &[Track], detections: &[Detection]) -> LinkResult<()> {
    for track in tracks {
        let ids: Vec<String> = track.detections.iter().map(|&idx| detections[idx].id.to_string()).collect();
        writeln!(writer, "{}", ids.join(" ")).map_err(|e| LinkError::InternalInvariant(format!("failed writing track output: {}", e)))?;
    }
    Ok(())
}

fn parse_field<T: std::str::FromStr>(token: &str, name: &str, lineno: usize) -> LinkResult<T> {
    token.parse().map_err(|_| LinkError::BadInput(format!("line {}: bad {} {:?}", lineno, name, token)))
}
