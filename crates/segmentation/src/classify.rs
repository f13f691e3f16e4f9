use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{Result, SegmentationError};

/// Verdict of the spam screen. The upstream label space maps class id 0 to
/// spam and everything else to a relevant photograph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpamVerdict {
    Spam,
    Relevant,
}

impl SpamVerdict {
    pub fn is_spam(self) -> bool {
        matches!(self, Self::Spam)
    }
}

/// Avalanche release type reported to the client.
#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize,
    Display, EnumString, EnumIter, IntoStaticStr,
    PartialEq, Eq,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AvalancheType {
    Loose,
    Slab,
    Glide,
}

/// Screens an uploaded photograph for spam/irrelevance.
pub trait SpamClassifier: Send + Sync {
    fn predict(&self, image: &RgbImage) -> Result<SpamVerdict>;
}

/// Classifies the avalanche release type of a photograph.
pub trait AvalancheTypeClassifier: Send + Sync {
    fn predict(&self, image: &RgbImage) -> Result<AvalancheType>;
}

/// Mean-luma spam screen: avalanche photographs are snow scenes and skew
/// bright, so anything darker than `min_mean_luma` is flagged.
#[derive(Debug, Clone)]
pub struct BrightnessSpamClassifier {
    pub min_mean_luma: f32,
}

impl Default for BrightnessSpamClassifier {
    fn default() -> Self {
        Self { min_mean_luma: 90.0 }
    }
}

impl SpamClassifier for BrightnessSpamClassifier {
    fn predict(&self, image: &RgbImage) -> Result<SpamVerdict> {
        let mean = mean_luma(image)?;
        Ok(if mean < self.min_mean_luma {
            SpamVerdict::Spam
        } else {
            SpamVerdict::Relevant
        })
    }
}

/// Brightness-profile baseline for the release type: compares the mean luma
/// of the top, middle, and bottom horizontal thirds of the frame. The
/// brightest band decides: a bright crown area reads as a loose-snow
/// release, a bright mid-slope as a slab, a bright runout as a glide.
#[derive(Debug, Clone, Default)]
pub struct SnowlineAvalancheClassifier;

impl AvalancheTypeClassifier for SnowlineAvalancheClassifier {
    fn predict(&self, image: &RgbImage) -> Result<AvalancheType> {
        let (width, height) = image.dimensions();
        if width == 0 || height < 3 {
            return Err(SegmentationError::EmptyImage);
        }

        let band = height / 3;
        let top = band_luma(image, 0, band);
        let middle = band_luma(image, band, 2 * band);
        let bottom = band_luma(image, 2 * band, height);

        Ok(if top >= middle && top >= bottom {
            AvalancheType::Loose
        } else if middle >= bottom {
            AvalancheType::Slab
        } else {
            AvalancheType::Glide
        })
    }
}

fn mean_luma(image: &RgbImage) -> Result<f32> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(SegmentationError::EmptyImage);
    }
    let sum: f64 = image.pixels().map(|p| luma(p) as f64).sum();
    Ok((sum / (width as f64 * height as f64)) as f32)
}

fn band_luma(image: &RgbImage, from_row: u32, to_row: u32) -> f32 {
    let width = image.width();
    let mut sum = 0f64;
    let mut count = 0u64;
    for y in from_row..to_row {
        for x in 0..width {
            sum += luma(image.get_pixel(x, y)) as f64;
            count += 1;
        }
    }
    if count == 0 { 0.0 } else { (sum / count as f64) as f32 }
}

/// ITU-R BT.601 luma.
fn luma(pixel: &Rgb<u8>) -> f32 {
    0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32
}
