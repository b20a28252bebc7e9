//! Resize the working greyscale image

use crate::keys;
use crate::settings::{require, value_or, ImageKeys};
use frame_pipeline_core::{
    ConfigTree, ConfigurableStage, Stage, StageError, StageOutcome, Tray,
};
use image::imageops::{self, FilterType};
use image::GrayImage;

/// Resizes `greyscale` to `width` x `height` (defaults 320x240)
pub struct ResizeImageStage {
    name: String,
    keys: ImageKeys,
    width: u32,
    height: u32,
    filter: FilterType,
}

fn parse_filter(name: &str) -> Result<FilterType, StageError> {
    match name.to_ascii_lowercase().as_str() {
        "nearest" => Ok(FilterType::Nearest),
        "triangle" => Ok(FilterType::Triangle),
        "catmullrom" => Ok(FilterType::CatmullRom),
        "gaussian" => Ok(FilterType::Gaussian),
        "lanczos3" => Ok(FilterType::Lanczos3),
        other => Err(StageError::InvalidSettings(format!(
            "unknown resize filter {other:?}"
        ))),
    }
}

impl ConfigurableStage for ResizeImageStage {
    fn from_settings(name: &str, settings: &ConfigTree) -> Result<Self, StageError> {
        let width = value_or(settings, name, "width", 320u32)?;
        let height = value_or(settings, name, "height", 240u32)?;
        if width == 0 || height == 0 {
            return Err(StageError::InvalidSettings(format!(
                "resize dimensions must be non-zero, got {width}x{height}"
            )));
        }

        let filter = parse_filter(&value_or(settings, name, "filter", String::from("triangle"))?)?;

        Ok(Self {
            name: name.to_string(),
            keys: ImageKeys::from_settings(settings, name, keys::GREYSCALE, keys::GREYSCALE),
            width,
            height,
            filter,
        })
    }
}

impl Stage for ResizeImageStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, tray: &mut Tray) -> Result<StageOutcome, StageError> {
        let image = require::<GrayImage>(tray, &self.keys.input)?;
        if image.dimensions() == (self.width, self.height) && self.keys.input == self.keys.output {
            return Ok(StageOutcome::Continue);
        }

        let resized = imageops::resize(image, self.width, self.height, self.filter);
        tray.set(self.keys.output.as_str(), resized)?;
        Ok(StageOutcome::Continue)
    }
}
