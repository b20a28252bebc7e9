//! Vision stages for the frame pipeline
//!
//! Every stage reads its inputs from the tray and writes its outputs back
//! under the keys in [`keys`]; the image stages accept `input_key` /
//! `output_key` overrides in their settings node. Register them all with
//! [`register_all_stages`].

pub mod class_region;
pub mod gradient;
pub mod greyscale;
pub mod histogram;
pub mod normalise;
pub mod process_tracks;
pub mod resize;
pub mod smooth;
pub mod track_features;
pub mod write_tags;

mod settings;

use frame_pipeline_core::StageRegistry;

pub use class_region::ClassRegionStage;
pub use gradient::GradientImageStage;
pub use greyscale::GreyscaleConvertStage;
pub use histogram::ImageHistogramStage;
pub use normalise::NormaliseImageStage;
pub use process_tracks::ProcessTracksStage;
pub use resize::ResizeImageStage;
pub use smooth::{ImageEqualisationStage, SmoothImageStage};
pub use track_features::{Track, TrackFeaturesStage};
pub use write_tags::WriteTagsStage;

/// Tray keys the stages agree on
pub mod keys {
    /// Frame published by the pipeline (`Frame`)
    pub const SOURCE: &str = "source";
    /// Working greyscale image (`GrayImage`)
    pub const GREYSCALE: &str = "greyscale";
    /// Min-max normalised intensities in [0, 1] (`Array2<f32>`)
    pub const NORMALISED: &str = "normalised";
    /// Sobel gradient magnitude (`Array2<f32>`)
    pub const GRADIENT: &str = "gradient";
    /// Normalised intensity histogram of the current frame (`Vec<f32>`)
    pub const HISTOGRAM: &str = "histogram";
    /// History of recent histograms (`Vec<f32>`)
    pub const HISTOGRAMS: &str = "histograms";
    /// Live feature tracks (`Vec<Track>`)
    pub const TRACKS: &str = "tracks";
    /// Frame number when the current frame is a keyframe (`Option<u64>`)
    pub const KEYFRAME: &str = "keyframe";
    /// History of keyframe numbers (`u64`)
    pub const KEYFRAMES: &str = "keyframes";
    /// Every tag created so far (`Vec<Tag>`)
    pub const TAGS: &str = "tags";
    /// Tag created on the most recent keyframe (`Tag`)
    pub const LATEST_TAG: &str = "latest_tag";
}

/// Register every stage type under the name used in topology documents
pub fn register_all_stages(registry: &mut StageRegistry) {
    registry.register_stage::<GreyscaleConvertStage>("GreyscaleConvertStage");
    registry.register_stage::<ResizeImageStage>("ResizeImageStage");
    registry.register_stage::<NormaliseImageStage>("NormaliseImageStage");
    registry.register_stage::<GradientImageStage>("GradientImageStage");
    registry.register_stage::<ImageHistogramStage>("ImageHistogramStage");
    registry.register_stage::<TrackFeaturesStage>("TrackFeaturesStage");
    registry.register_stage::<ProcessTracksStage>("ProcessTracksStage");
    registry.register_stage::<ImageEqualisationStage>("ImageEqualisationStage");
    registry.register_stage::<SmoothImageStage>("SmoothImageStage");
    registry.register_stage::<WriteTagsStage>("WriteTagsStage");
    registry.register_stage::<ClassRegionStage>("ClassRegionStage");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_stages() {
        let mut registry = StageRegistry::new();
        register_all_stages(&mut registry);

        assert_eq!(registry.len(), 11);
        for name in [
            "GreyscaleConvertStage",
            "ResizeImageStage",
            "NormaliseImageStage",
            "GradientImageStage",
            "ImageHistogramStage",
            "TrackFeaturesStage",
            "ProcessTracksStage",
            "ImageEqualisationStage",
            "SmoothImageStage",
            "WriteTagsStage",
            "ClassRegionStage",
        ] {
            assert!(registry.contains(name), "{name} not registered");
        }
    }
}
