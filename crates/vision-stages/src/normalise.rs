//! Min-max normalisation of the greyscale image into an f32 array

use crate::keys;
use crate::settings::{require, ImageKeys};
use frame_pipeline_core::{
    ConfigTree, ConfigurableStage, Stage, StageError, StageOutcome, Tray,
};
use image::GrayImage;
use ndarray::Array2;

/// Writes `greyscale` rescaled to [0, 1] as an `Array2<f32>` (rows x cols)
/// under `normalised`. A flat image normalises to zeros.
pub struct NormaliseImageStage {
    name: String,
    keys: ImageKeys,
}

impl ConfigurableStage for NormaliseImageStage {
    fn from_settings(name: &str, settings: &ConfigTree) -> Result<Self, StageError> {
        Ok(Self {
            name: name.to_string(),
            keys: ImageKeys::from_settings(settings, name, keys::GREYSCALE, keys::NORMALISED),
        })
    }
}

pub(crate) fn normalise(image: &GrayImage) -> Array2<f32> {
    let (width, height) = image.dimensions();
    let (min, max) = image
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    let range = f32::from(max.saturating_sub(min));

    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        if range == 0.0 {
            0.0
        } else {
            f32::from(image.get_pixel(x as u32, y as u32).0[0] - min) / range
        }
    })
}

impl Stage for NormaliseImageStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, tray: &mut Tray) -> Result<StageOutcome, StageError> {
        let image = require::<GrayImage>(tray, &self.keys.input)?;
        let normalised = normalise(image);
        tray.set(self.keys.output.as_str(), normalised)?;
        Ok(StageOutcome::Continue)
    }
}
