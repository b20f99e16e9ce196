use crate::Embedding;
use image::DynamicImage;

/// Outcome of running the extraction model on one image.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// Exactly one usable face, and its embedding.
    Detected(Embedding),
    /// The model ran but found no face.
    NotDetected,
    /// The model could not be run on this image.
    Failed(String),
}

/// Extracts a face embedding from a decoded image.
///
/// Implementations must never return a default or zero vector in place of
/// [`Extraction::NotDetected`], and must be safe for concurrent use.
pub trait FaceEmbedder: Send + Sync {
    fn extract(&self, image: &DynamicImage) -> Extraction;
}
