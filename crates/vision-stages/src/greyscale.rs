//! Greyscale conversion of the published frame

use crate::keys;
use crate::settings::{require, ImageKeys};
use frame_pipeline_core::{
    ConfigTree, ConfigurableStage, Frame, Stage, StageError, StageOutcome, Tray,
};

/// Converts the frame under `source` into a `GrayImage` under `greyscale`
pub struct GreyscaleConvertStage {
    name: String,
    keys: ImageKeys,
}

impl ConfigurableStage for GreyscaleConvertStage {
    fn from_settings(name: &str, settings: &ConfigTree) -> Result<Self, StageError> {
        Ok(Self {
            name: name.to_string(),
            keys: ImageKeys::from_settings(settings, name, keys::SOURCE, keys::GREYSCALE),
        })
    }
}

impl Stage for GreyscaleConvertStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, tray: &mut Tray) -> Result<StageOutcome, StageError> {
        let frame = require::<Frame>(tray, &self.keys.input)?;
        frame.ensure_not_empty()?;

        let grey = frame.image.to_luma8();
        tray.set(self.keys.output.as_str(), grey)?;
        Ok(StageOutcome::Continue)
    }
}
