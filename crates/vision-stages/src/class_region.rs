//! Keyframe classification by histogram clustering

use crate::keys;
use crate::settings::{require, value_or};
use frame_pipeline_core::{
    ConfigTree, ConfigurableStage, Stage, StageError, StageOutcome, Tag, Tray,
};
use tracing::{debug, info};

/// Assigns every keyframe to a class by its `histogram` descriptor.
///
/// A keyframe joins the class whose prototype is nearest, provided it lies
/// within `cluster_radius` (default 0.25); otherwise it founds a new class.
/// The resulting [`Tag`] is appended to `tags` and stored under `latest_tag`.
/// Frames that are not keyframes pass through untouched.
pub struct ClassRegionStage {
    name: String,
    cluster_radius: f64,
    /// First tag of each class, indexed by class id
    prototypes: Vec<Tag>,
}

impl ConfigurableStage for ClassRegionStage {
    fn from_settings(name: &str, settings: &ConfigTree) -> Result<Self, StageError> {
        let cluster_radius = value_or(settings, name, "cluster_radius", 0.25f64)?;
        if !(cluster_radius.is_finite() && cluster_radius >= 0.0) {
            return Err(StageError::InvalidSettings(format!(
                "cluster_radius must be non-negative, got {cluster_radius}"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            cluster_radius,
            prototypes: Vec::new(),
        })
    }
}

impl ClassRegionStage {
    fn classify(&self, descriptor: &[f32]) -> Option<usize> {
        self.prototypes
            .iter()
            .filter(|prototype| prototype.contains(descriptor))
            .min_by(|a, b| a.distance_to(descriptor).total_cmp(&b.distance_to(descriptor)))
            .map(|prototype| prototype.frame_class)
    }

    pub fn class_count(&self) -> usize {
        self.prototypes.len()
    }
}

impl Stage for ClassRegionStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, tray: &mut Tray) -> Result<StageOutcome, StageError> {
        let Some(frame_number) = *require::<Option<u64>>(tray, keys::KEYFRAME)? else {
            return Ok(StageOutcome::Continue);
        };
        let descriptor = require::<Vec<f32>>(tray, keys::HISTOGRAM)?.clone();

        let tag = match self.classify(&descriptor) {
            Some(frame_class) => {
                debug!("Keyframe {} joins class {}", frame_number, frame_class);
                Tag {
                    frame_number,
                    frame_class,
                    descriptor,
                    cluster_radius: self.cluster_radius,
                }
            }
            None => {
                let tag = Tag {
                    frame_number,
                    frame_class: self.prototypes.len(),
                    descriptor,
                    cluster_radius: self.cluster_radius,
                };
                info!("Keyframe {} founds class {}", frame_number, tag.frame_class);
                self.prototypes.push(tag.clone());
                tag
            }
        };

        match tray.get_mut::<Vec<Tag>>(keys::TAGS)? {
            Some(tags) => tags.push(tag.clone()),
            None => tray.set(keys::TAGS, vec![tag.clone()])?,
        }
        tray.set(keys::LATEST_TAG, tag)?;
        Ok(StageOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_pipeline_core::run_stage;

    fn step(stage: &mut ClassRegionStage, tray: &mut Tray, keyframe: Option<u64>, hist: Vec<f32>) {
        tray.set(keys::KEYFRAME, keyframe).unwrap();
        tray.set(keys::HISTOGRAM, hist).unwrap();
        assert_eq!(run_stage(stage, tray).unwrap(), StageOutcome::Continue);
    }

    fn default_stage() -> ClassRegionStage {
        ClassRegionStage::from_settings("ClassRegionStage", &ConfigTree::new()).unwrap()
    }

    #[test]
    fn test_similar_keyframes_share_a_class() {
        let mut stage = default_stage();
        let mut tray = Tray::new();

        step(&mut stage, &mut tray, Some(0), vec![1.0, 0.0]);
        step(&mut stage, &mut tray, Some(5), vec![0.9, 0.1]);
        step(&mut stage, &mut tray, Some(9), vec![0.0, 1.0]);

        let tags = tray.get::<Vec<Tag>>(keys::TAGS).unwrap().unwrap();
        let classes: Vec<(u64, usize)> =
            tags.iter().map(|t| (t.frame_number, t.frame_class)).collect();
        assert_eq!(classes, vec![(0, 0), (5, 0), (9, 1)]);
        assert_eq!(stage.class_count(), 2);

        let latest = tray.get::<Tag>(keys::LATEST_TAG).unwrap().unwrap();
        assert_eq!(latest.frame_number, 9);
        assert_eq!(latest.cluster_radius, 0.25);
    }

    #[test]
    fn test_non_keyframes_are_ignored() {
        let mut stage = default_stage();
        let mut tray = Tray::new();

        step(&mut stage, &mut tray, None, vec![1.0]);
        assert!(!tray.contains(keys::TAGS));
        assert!(!tray.contains(keys::LATEST_TAG));
    }

    #[test]
    fn test_keyframe_without_histogram_fails() {
        let mut stage = default_stage();
        let mut tray = Tray::new();
        tray.set(keys::KEYFRAME, Some(3u64)).unwrap();

        assert!(matches!(
            run_stage(&mut stage, &mut tray),
            Err(StageError::MissingInput(key)) if key == keys::HISTOGRAM
        ));
    }
}
