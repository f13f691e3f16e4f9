//! # Segmentation and Classification Seams
//!
//! Interfaces to the model collaborators of the avalanche annotation
//! service: the point-promptable segmentation backend, the spam screen,
//! and the avalanche-type classifier. The annotation engine and the HTTP
//! layer only ever talk to these traits, so a learned backend (ONNX,
//! remote inference service, ...) drops in without touching either.
//!
//! The crate also ships deterministic baseline implementations
//! ([`RegionGrowSegmenter`], [`BrightnessSpamClassifier`],
//! [`SnowlineAvalancheClassifier`]) so the service runs end-to-end
//! without model weights.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use segmentation::{PointPrompt, PointSegmenter, RegionGrowSegmenter};
//!
//! let mut segmenter = RegionGrowSegmenter::default();
//! let photo = image::open("avalanche.jpg")?.to_rgb8();
//!
//! segmenter.set_image(&photo)?;
//! let candidates = segmenter.segment(PointPrompt::foreground(320, 240), false)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod classify;
pub mod region_grow;

use image::{GrayImage, RgbImage};
use thiserror::Error;

// Re-exports for convenience
pub use classify::{
    AvalancheType, AvalancheTypeClassifier, BrightnessSpamClassifier, SnowlineAvalancheClassifier,
    SpamClassifier, SpamVerdict,
};
pub use region_grow::RegionGrowSegmenter;

#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error("No image set. Call set_image before prompting")]
    NoImageSet,

    #[error("Image has zero pixels")]
    EmptyImage,

    #[error("Invalid point label {0}, expected 0 (background) or 1 (foreground)")]
    InvalidLabel(u8),

    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("Backend failure: {0}")]
    Backend(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, SegmentationError>;

/// Foreground/background label attached to a click prompt.
///
/// On the wire labels travel as `0` (background) and `1` (foreground).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointLabel {
    Background,
    Foreground,
}

impl TryFrom<u8> for PointLabel {
    type Error = SegmentationError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Background),
            1 => Ok(Self::Foreground),
            other => Err(SegmentationError::InvalidLabel(other)),
        }
    }
}

impl From<PointLabel> for u8 {
    fn from(label: PointLabel) -> Self {
        match label {
            PointLabel::Background => 0,
            PointLabel::Foreground => 1,
        }
    }
}

/// A single user click in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointPrompt {
    pub x: u32,
    pub y: u32,
    pub label: PointLabel,
}

impl PointPrompt {
    pub fn new(x: u32, y: u32, label: PointLabel) -> Self {
        Self { x, y, label }
    }

    pub fn foreground(x: u32, y: u32) -> Self {
        Self::new(x, y, PointLabel::Foreground)
    }

    pub fn background(x: u32, y: u32) -> Self {
        Self::new(x, y, PointLabel::Background)
    }
}

/// One candidate mask produced for a prompt.
///
/// Masks are binary (`0` outside the region, `255` inside) and match the
/// dimensions of the image given to [`PointSegmenter::set_image`].
#[derive(Debug, Clone)]
pub struct CandidateMask {
    pub mask: GrayImage,
    /// Backend confidence/quality estimate; candidate lists are ordered
    /// best-first.
    pub score: f32,
}

/// Point-promptable segmentation backend.
///
/// `set_image` performs per-image setup (for learned backends: embedding
/// computation) once per uploaded image; `segment` is then called with one
/// new prompt at a time. An empty candidate list means the backend found
/// nothing worth selecting for that prompt.
pub trait PointSegmenter: Send {
    fn set_image(&mut self, image: &RgbImage) -> Result<()>;

    fn segment(&mut self, prompt: PointPrompt, multi_object: bool) -> Result<Vec<CandidateMask>>;
}
