//! Sobel gradient magnitude

use crate::keys;
use crate::settings::{require, ImageKeys};
use frame_pipeline_core::{
    ConfigTree, ConfigurableStage, Stage, StageError, StageOutcome, Tray,
};
use image::GrayImage;
use imageproc::gradients::sobel_gradients;
use ndarray::Array2;

/// Writes the Sobel gradient magnitude of `greyscale` as `Array2<f32>` under `gradient`
pub struct GradientImageStage {
    name: String,
    keys: ImageKeys,
}

impl ConfigurableStage for GradientImageStage {
    fn from_settings(name: &str, settings: &ConfigTree) -> Result<Self, StageError> {
        Ok(Self {
            name: name.to_string(),
            keys: ImageKeys::from_settings(settings, name, keys::GREYSCALE, keys::GRADIENT),
        })
    }
}

impl Stage for GradientImageStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, tray: &mut Tray) -> Result<StageOutcome, StageError> {
        let image = require::<GrayImage>(tray, &self.keys.input)?;
        let gradients = sobel_gradients(image);
        let (width, height) = gradients.dimensions();

        let magnitude = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            f32::from(gradients.get_pixel(x as u32, y as u32).0[0])
        });
        tray.set(self.keys.output.as_str(), magnitude)?;
        Ok(StageOutcome::Continue)
    }
}
