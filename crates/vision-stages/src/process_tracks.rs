//! Keyframe selection from track survival

use crate::keys;
use crate::settings::{require, value_or};
use crate::track_features::Track;
use frame_pipeline_core::{
    ConfigTree, ConfigurableStage, Frame, Stage, StageError, StageOutcome, Tray,
};
use std::collections::HashSet;
use tracing::{debug, info};

/// Marks a frame as a keyframe when fewer than `min_tracked_ratio` (default
/// 0.5) of the tracks alive at the previous keyframe survive. The first frame
/// is always a keyframe.
///
/// On a keyframe `keyframe` is set to `Some(number)`, the number is appended
/// to `keyframes` and the chain continues. Otherwise `keyframe` is set to
/// `None` and the rest of the chain is skipped.
pub struct ProcessTracksStage {
    name: String,
    min_tracked_ratio: f64,
    /// Track ids alive at the last keyframe, `None` before the first one
    reference: Option<HashSet<u64>>,
}

impl ConfigurableStage for ProcessTracksStage {
    fn from_settings(name: &str, settings: &ConfigTree) -> Result<Self, StageError> {
        let min_tracked_ratio = value_or(settings, name, "min_tracked_ratio", 0.5f64)?;
        if !(0.0..=1.0).contains(&min_tracked_ratio) {
            return Err(StageError::InvalidSettings(format!(
                "min_tracked_ratio must be within [0, 1], got {min_tracked_ratio}"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            min_tracked_ratio,
            reference: None,
        })
    }
}

impl ProcessTracksStage {
    fn is_keyframe(&self, alive: &HashSet<u64>) -> bool {
        let Some(reference) = &self.reference else {
            return true;
        };
        if reference.is_empty() {
            return !alive.is_empty();
        }

        let survived = reference.intersection(alive).count();
        (survived as f64 / reference.len() as f64) < self.min_tracked_ratio
    }
}

impl Stage for ProcessTracksStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, tray: &mut Tray) -> Result<StageOutcome, StageError> {
        let number = require::<Frame>(tray, keys::SOURCE)?.number;
        let alive: HashSet<u64> = require::<Vec<Track>>(tray, keys::TRACKS)?
            .iter()
            .map(|track| track.id)
            .collect();

        if !self.is_keyframe(&alive) {
            debug!("Frame {} is not a keyframe", number);
            tray.set(keys::KEYFRAME, None::<u64>)?;
            return Ok(StageOutcome::StopChain);
        }

        info!("Frame {} selected as keyframe ({} tracks)", number, alive.len());
        self.reference = Some(alive);
        tray.set(keys::KEYFRAME, Some(number))?;
        tray.append_history(keys::KEYFRAMES, number)?;
        Ok(StageOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_pipeline_core::run_stage;
    use image::DynamicImage;

    fn tracks(ids: &[u64]) -> Vec<Track> {
        ids.iter()
            .map(|&id| Track {
                id,
                started_at: 0,
                hits: 1,
                points: vec![(0.0, 0.0)],
            })
            .collect()
    }

    fn step(
        stage: &mut ProcessTracksStage,
        tray: &mut Tray,
        number: u64,
        ids: &[u64],
    ) -> StageOutcome {
        tray.set(keys::SOURCE, Frame::new(number, DynamicImage::new_luma8(1, 1)))
            .unwrap();
        tray.set(keys::TRACKS, tracks(ids)).unwrap();
        run_stage(stage, tray).unwrap()
    }

    fn default_stage() -> ProcessTracksStage {
        ProcessTracksStage::from_settings("ProcessTracksStage", &ConfigTree::new()).unwrap()
    }

    #[test]
    fn test_first_frame_is_keyframe() {
        let mut stage = default_stage();
        let mut tray = Tray::new();

        assert_eq!(step(&mut stage, &mut tray, 7, &[1, 2]), StageOutcome::Continue);
        assert_eq!(tray.get::<Option<u64>>(keys::KEYFRAME).unwrap(), Some(Some(7)));
    }

    #[test]
    fn test_keyframe_when_tracks_are_lost() {
        let mut stage = default_stage();
        let mut tray = Tray::new();

        step(&mut stage, &mut tray, 0, &[1, 2, 3, 4]);
        assert_eq!(step(&mut stage, &mut tray, 1, &[1, 2, 3, 9]), StageOutcome::StopChain);
        assert_eq!(tray.get::<Option<u64>>(keys::KEYFRAME).unwrap(), Some(None));

        // Two of four survive: still at the ratio
        assert_eq!(step(&mut stage, &mut tray, 2, &[1, 2, 9, 10]), StageOutcome::StopChain);
        assert_eq!(step(&mut stage, &mut tray, 3, &[1, 9, 10, 11]), StageOutcome::Continue);

        let keyframes: Vec<u64> = tray
            .history::<u64>(keys::KEYFRAMES)
            .unwrap()
            .unwrap()
            .iter()
            .copied()
            .collect();
        assert_eq!(keyframes, vec![0, 3]);
    }

    #[test]
    fn test_empty_reference_waits_for_tracks() {
        let mut stage = default_stage();
        let mut tray = Tray::new();

        step(&mut stage, &mut tray, 0, &[]);
        assert_eq!(step(&mut stage, &mut tray, 1, &[]), StageOutcome::StopChain);
        assert_eq!(step(&mut stage, &mut tray, 2, &[5]), StageOutcome::Continue);
    }

    #[test]
    fn test_missing_tracks_is_an_error() {
        let mut stage = default_stage();
        let mut tray = Tray::new();
        tray.set(keys::SOURCE, Frame::new(0, DynamicImage::new_luma8(1, 1)))
            .unwrap();

        assert!(matches!(
            run_stage(&mut stage, &mut tray),
            Err(StageError::MissingInput(key)) if key == keys::TRACKS
        ));
    }

    #[test]
    fn test_ratio_out_of_range_rejected() {
        let settings =
            ConfigTree::from_json_str(r#"{"ProcessTracksStage": {"min_tracked_ratio": 1.5}}"#)
                .unwrap();
        assert!(ProcessTracksStage::from_settings("ProcessTracksStage", &settings).is_err());
    }
}
