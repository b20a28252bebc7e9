//! Intensity histogram of the greyscale image

use crate::keys;
use crate::settings::{require, value_or, ImageKeys};
use frame_pipeline_core::{
    ConfigTree, ConfigurableStage, Stage, StageError, StageOutcome, Tray,
};
use image::GrayImage;
use imageproc::stats::histogram;

/// Writes a `bins`-bin (default 32) histogram of `greyscale`, normalised to
/// sum to one, under `histogram` and appends it to the `histograms` history
pub struct ImageHistogramStage {
    name: String,
    keys: ImageKeys,
    bins: usize,
}

impl ConfigurableStage for ImageHistogramStage {
    fn from_settings(name: &str, settings: &ConfigTree) -> Result<Self, StageError> {
        let bins = value_or(settings, name, "bins", 32usize)?;
        if bins == 0 || bins > 256 {
            return Err(StageError::InvalidSettings(format!(
                "histogram bins must be within 1..=256, got {bins}"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            keys: ImageKeys::from_settings(settings, name, keys::GREYSCALE, keys::HISTOGRAM),
            bins,
        })
    }
}

/// Normalised histogram with `bins` equal-width bins over 0..=255
pub(crate) fn binned_histogram(image: &GrayImage, bins: usize) -> Vec<f32> {
    let counts = histogram(image).channels[0];
    let mut binned = vec![0u64; bins];
    for (intensity, count) in counts.iter().enumerate() {
        binned[intensity * bins / 256] += u64::from(*count);
    }

    let total: u64 = binned.iter().sum();
    if total == 0 {
        return vec![0.0; bins];
    }
    binned
        .into_iter()
        .map(|count| (count as f64 / total as f64) as f32)
        .collect()
}

impl Stage for ImageHistogramStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, tray: &mut Tray) -> Result<StageOutcome, StageError> {
        let image = require::<GrayImage>(tray, &self.keys.input)?;
        let descriptor = binned_histogram(image, self.bins);

        tray.append_history(keys::HISTOGRAMS, descriptor.clone())?;
        tray.set(self.keys.output.as_str(), descriptor)?;
        Ok(StageOutcome::Continue)
    }
}
