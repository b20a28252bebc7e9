//! In-place greyscale filters: gaussian smoothing and histogram equalisation

use crate::keys;
use crate::settings::{require, value_or, ImageKeys};
use frame_pipeline_core::{
    ConfigTree, ConfigurableStage, Stage, StageError, StageOutcome, Tray,
};
use image::GrayImage;
use imageproc::contrast::equalize_histogram;
use imageproc::filter::gaussian_blur_f32;

/// Gaussian blur of `greyscale` with standard deviation `sigma` (default 1.0)
pub struct SmoothImageStage {
    name: String,
    keys: ImageKeys,
    sigma: f32,
}

impl ConfigurableStage for SmoothImageStage {
    fn from_settings(name: &str, settings: &ConfigTree) -> Result<Self, StageError> {
        let sigma = value_or(settings, name, "sigma", 1.0f32)?;
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(StageError::InvalidSettings(format!(
                "sigma must be positive, got {sigma}"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            keys: ImageKeys::from_settings(settings, name, keys::GREYSCALE, keys::GREYSCALE),
            sigma,
        })
    }
}

impl Stage for SmoothImageStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, tray: &mut Tray) -> Result<StageOutcome, StageError> {
        let image = require::<GrayImage>(tray, &self.keys.input)?;
        let smoothed = gaussian_blur_f32(image, self.sigma);
        tray.set(self.keys.output.as_str(), smoothed)?;
        Ok(StageOutcome::Continue)
    }
}

/// Histogram equalisation of `greyscale`
pub struct ImageEqualisationStage {
    name: String,
    keys: ImageKeys,
}

impl ConfigurableStage for ImageEqualisationStage {
    fn from_settings(name: &str, settings: &ConfigTree) -> Result<Self, StageError> {
        Ok(Self {
            name: name.to_string(),
            keys: ImageKeys::from_settings(settings, name, keys::GREYSCALE, keys::GREYSCALE),
        })
    }
}

impl Stage for ImageEqualisationStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, tray: &mut Tray) -> Result<StageOutcome, StageError> {
        let image = require::<GrayImage>(tray, &self.keys.input)?;
        let equalised = equalize_histogram(image);
        tray.set(self.keys.output.as_str(), equalised)?;
        Ok(StageOutcome::Continue)
    }
}
