/// Common types shared by the pipeline core and its stages
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Processing errors raised by concrete stages
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Empty frame: {width}x{height}")]
    EmptyFrame { width: u32, height: u32 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<image::ImageError> for ProcessingError {
    fn from(err: image::ImageError) -> Self {
        ProcessingError::ImageError(err.to_string())
    }
}

/// Result type for processing operations
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// A single decoded frame handed from the producer to the pipeline
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position of the frame in the producer's stream
    pub number: u64,
    pub image: DynamicImage,
}

impl Frame {
    pub fn new(number: u64, image: DynamicImage) -> Self {
        Self { number, image }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Fails when the frame has no pixels
    pub fn ensure_not_empty(&self) -> Result<()> {
        if self.width() == 0 || self.height() == 0 {
            return Err(ProcessingError::EmptyFrame {
                width: self.width(),
                height: self.height(),
            });
        }
        Ok(())
    }
}

/// Tags a region between keyframes with the descriptor cluster it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// Keyframe index the tag was created on
    pub frame_number: u64,
    /// Class (cluster) identifier
    pub frame_class: usize,
    /// Feature descriptor, opaque to the pipeline
    pub descriptor: Vec<f32>,
    /// Distance threshold for membership in the cluster
    pub cluster_radius: f64,
}

impl Tag {
    /// Euclidean distance between this tag's descriptor and another descriptor.
    /// Descriptors of different length are compared over their common prefix.
    #[must_use]
    pub fn distance_to(&self, descriptor: &[f32]) -> f64 {
        self.descriptor
            .iter()
            .zip(descriptor)
            .map(|(a, b)| {
                let d = f64::from(*a) - f64::from(*b);
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }

    #[must_use]
    pub fn contains(&self, descriptor: &[f32]) -> bool {
        self.distance_to(descriptor) <= self.cluster_radius
    }
}
