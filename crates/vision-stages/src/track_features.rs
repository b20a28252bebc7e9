//! Corner tracking between consecutive frames
//!
//! FAST-9 corners are detected on the greyscale image and described by the
//! zero-mean, unit-norm intensity patch around them. Each corner is matched to
//! the closest unmatched corner of the previous frame within `max_distance`
//! pixels whose descriptor distance is at most `max_descriptor_distance`;
//! matched corners extend that track, the rest start new tracks. Tracks with
//! no match in the current frame end.

use crate::keys;
use crate::settings::{require, value_or};
use frame_pipeline_core::{
    ConfigTree, ConfigurableStage, Frame, Stage, StageError, StageOutcome, Tray,
};
use image::GrayImage;
use imageproc::corners::corners_fast9;
use serde::Serialize;
use tracing::debug;

/// A corner followed across consecutive frames
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub id: u64,
    /// Frame number the track was first seen on
    pub started_at: u64,
    /// Frames the track has been observed on
    pub hits: u64,
    /// Most recent positions, oldest first
    pub points: Vec<(f32, f32)>,
}

impl Track {
    pub fn latest(&self) -> Option<(f32, f32)> {
        self.points.last().copied()
    }

    /// True when the track was matched from an earlier frame
    pub fn is_continued(&self) -> bool {
        self.hits > 1
    }
}

#[derive(Debug, Clone)]
struct Feature {
    x: u32,
    y: u32,
    descriptor: Vec<f32>,
}

pub struct TrackFeaturesStage {
    name: String,
    fast_threshold: u8,
    max_features: usize,
    patch_radius: u32,
    max_distance: f32,
    max_descriptor_distance: f32,
    max_track_points: usize,
    tracks: Vec<Track>,
    /// Feature behind each entry of `tracks`
    features: Vec<Feature>,
    next_id: u64,
    frames_seen: u64,
}

impl ConfigurableStage for TrackFeaturesStage {
    fn from_settings(name: &str, settings: &ConfigTree) -> Result<Self, StageError> {
        let max_features = value_or(settings, name, "max_features", 200usize)?;
        let patch_radius = value_or(settings, name, "patch_radius", 3u32)?;
        let max_track_points = value_or(settings, name, "max_track_points", 32usize)?;
        if max_features == 0 || patch_radius == 0 || max_track_points == 0 {
            return Err(StageError::InvalidSettings(
                "max_features, patch_radius and max_track_points must be non-zero".into(),
            ));
        }

        Ok(Self {
            name: name.to_string(),
            fast_threshold: value_or(settings, name, "fast_threshold", 20u8)?,
            max_features,
            patch_radius,
            max_distance: value_or(settings, name, "max_distance", 16.0f32)?,
            max_descriptor_distance: value_or(settings, name, "max_descriptor_distance", 0.5f32)?,
            max_track_points,
            tracks: Vec::new(),
            features: Vec::new(),
            next_id: 0,
            frames_seen: 0,
        })
    }
}

impl TrackFeaturesStage {
    fn detect(&self, image: &GrayImage) -> Vec<Feature> {
        let (width, height) = image.dimensions();
        let r = self.patch_radius;

        let mut corners: Vec<_> = corners_fast9(image, self.fast_threshold)
            .into_iter()
            .filter(|c| c.x >= r && c.y >= r && c.x + r < width && c.y + r < height)
            .collect();
        corners.sort_by(|a, b| b.score.total_cmp(&a.score));
        corners.truncate(self.max_features);

        corners
            .into_iter()
            .map(|c| Feature {
                x: c.x,
                y: c.y,
                descriptor: patch_descriptor(image, c.x, c.y, r),
            })
            .collect()
    }
}

/// Zero-mean, unit-norm intensity patch; flat patches stay all-zero
fn patch_descriptor(image: &GrayImage, cx: u32, cy: u32, radius: u32) -> Vec<f32> {
    let mut patch = Vec::with_capacity(((2 * radius + 1) * (2 * radius + 1)) as usize);
    for y in cy - radius..=cy + radius {
        for x in cx - radius..=cx + radius {
            patch.push(f32::from(image.get_pixel(x, y).0[0]));
        }
    }

    let mean = patch.iter().sum::<f32>() / patch.len() as f32;
    patch.iter_mut().for_each(|v| *v -= mean);
    let norm = patch.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        patch.iter_mut().for_each(|v| *v /= norm);
    }
    patch
}

fn descriptor_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

impl Stage for TrackFeaturesStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, tray: &mut Tray) -> Result<StageOutcome, StageError> {
        let frame_number = tray
            .get_ref::<Frame>(keys::SOURCE)?
            .map_or(self.frames_seen, |frame| frame.number);
        let detected = self.detect(require::<GrayImage>(tray, keys::GREYSCALE)?);
        self.frames_seen += 1;

        let mut previous: Vec<Option<Track>> =
            std::mem::take(&mut self.tracks).into_iter().map(Some).collect();
        let previous_features = std::mem::take(&mut self.features);

        let mut tracks = Vec::with_capacity(detected.len());
        for feature in &detected {
            let best = previous_features
                .iter()
                .enumerate()
                .filter(|(i, _)| previous[*i].is_some())
                .filter(|(_, p)| {
                    let dx = p.x as f32 - feature.x as f32;
                    let dy = p.y as f32 - feature.y as f32;
                    dx.hypot(dy) <= self.max_distance
                })
                .map(|(i, p)| (i, descriptor_distance(&p.descriptor, &feature.descriptor)))
                .filter(|(_, d)| *d <= self.max_descriptor_distance)
                .min_by(|a, b| a.1.total_cmp(&b.1));

            let point = (feature.x as f32, feature.y as f32);
            let track = match best.and_then(|(i, _)| previous[i].take()) {
                Some(mut track) => {
                    track.hits += 1;
                    track.points.push(point);
                    if track.points.len() > self.max_track_points {
                        track.points.remove(0);
                    }
                    track
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    Track {
                        id,
                        started_at: frame_number,
                        hits: 1,
                        points: vec![point],
                    }
                }
            };
            tracks.push(track);
        }

        debug!(
            "Frame {}: {} features, {} continued tracks",
            frame_number,
            detected.len(),
            tracks.iter().filter(|t| t.is_continued()).count()
        );

        self.tracks = tracks;
        self.features = detected;
        tray.set(keys::TRACKS, self.tracks.clone())?;
        Ok(StageOutcome::Continue)
    }
}
