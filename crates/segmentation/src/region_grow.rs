use std::collections::VecDeque;

use image::{GrayImage, Luma, RgbImage};
use tracing::debug;

use crate::{CandidateMask, PointLabel, PointPrompt, PointSegmenter, Result, SegmentationError};

/// Tolerance multipliers tried in multi-object mode, tightest first.
const MULTI_OBJECT_SCALES: [f32; 3] = [0.5, 1.0, 2.0];

/// Seeded colour flood fill standing in for a learned point-promptable model.
///
/// A foreground prompt grows the 4-connected region of pixels whose colour
/// stays within `tolerance` (Euclidean RGB distance) of the clicked pixel.
/// A lone background prompt selects nothing and yields no candidates. In
/// multi-object mode several tolerances are tried and up to three distinct
/// regions are returned, scored by compactness.
#[derive(Debug, Clone)]
pub struct RegionGrowSegmenter {
    image: Option<RgbImage>,
    pub tolerance: f32,
}

impl Default for RegionGrowSegmenter {
    fn default() -> Self {
        Self {
            image: None,
            tolerance: 32.0,
        }
    }
}

impl RegionGrowSegmenter {
    pub fn new(tolerance: f32) -> Self {
        Self {
            image: None,
            tolerance,
        }
    }
}

impl PointSegmenter for RegionGrowSegmenter {
    fn set_image(&mut self, image: &RgbImage) -> Result<()> {
        if image.width() == 0 || image.height() == 0 {
            return Err(SegmentationError::EmptyImage);
        }
        self.image = Some(image.clone());
        Ok(())
    }

    fn segment(&mut self, prompt: PointPrompt, multi_object: bool) -> Result<Vec<CandidateMask>> {
        let image = self.image.as_ref().ok_or(SegmentationError::NoImageSet)?;
        let (width, height) = image.dimensions();
        if prompt.x >= width || prompt.y >= height {
            return Err(SegmentationError::InvalidPrompt(format!(
                "point ({}, {}) outside {}x{} image",
                prompt.x, prompt.y, width, height
            )));
        }

        // A background click on its own carries no object to select.
        if prompt.label == PointLabel::Background {
            return Ok(Vec::new());
        }

        let mut candidates: Vec<CandidateMask> = Vec::new();
        let mut seen_areas: Vec<u32> = Vec::new();

        let tolerances: &[f32] = if multi_object {
            &MULTI_OBJECT_SCALES
        } else {
            &[1.0]
        };

        for scale in tolerances {
            let grown = grow(image, prompt.x, prompt.y, self.tolerance * scale);
            // Identical areas from neighbouring tolerances are the same region.
            if seen_areas.contains(&grown.area) {
                continue;
            }
            seen_areas.push(grown.area);
            let score = grown.compactness();
            candidates.push(CandidateMask {
                mask: grown.mask,
                score,
            });
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(3);

        debug!(
            x = prompt.x,
            y = prompt.y,
            candidates = candidates.len(),
            "region growth finished"
        );
        Ok(candidates)
    }
}

struct GrownRegion {
    mask: GrayImage,
    area: u32,
    bbox: (u32, u32, u32, u32),
}

impl GrownRegion {
    /// Area over bounding-box area; blobby regions score higher than
    /// straggly ones.
    fn compactness(&self) -> f32 {
        let (min_x, min_y, max_x, max_y) = self.bbox;
        let bbox_area = (max_x - min_x + 1) * (max_y - min_y + 1);
        self.area as f32 / bbox_area as f32
    }
}

fn grow(image: &RgbImage, seed_x: u32, seed_y: u32, tolerance: f32) -> GrownRegion {
    let (width, height) = image.dimensions();
    let seed = *image.get_pixel(seed_x, seed_y);

    let mut mask = GrayImage::new(width, height);
    let mut queue = VecDeque::new();
    mask.put_pixel(seed_x, seed_y, Luma([255u8]));
    queue.push_back((seed_x, seed_y));

    let mut area = 1u32;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (seed_x, seed_y, seed_x, seed_y);

    while let Some((x, y)) = queue.pop_front() {
        for (nx, ny) in neighbours(x, y, width, height) {
            if mask.get_pixel(nx, ny)[0] > 0 {
                continue;
            }
            if colour_distance(image.get_pixel(nx, ny), &seed) > tolerance {
                continue;
            }
            mask.put_pixel(nx, ny, Luma([255u8]));
            queue.push_back((nx, ny));
            area += 1;
            min_x = min_x.min(nx);
            min_y = min_y.min(ny);
            max_x = max_x.max(nx);
            max_y = max_y.max(ny);
        }
    }

    GrownRegion {
        mask,
        area,
        bbox: (min_x, min_y, max_x, max_y),
    }
}

fn neighbours(x: u32, y: u32, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let mut out = [None; 4];
    if x > 0 {
        out[0] = Some((x - 1, y));
    }
    if x + 1 < width {
        out[1] = Some((x + 1, y));
    }
    if y > 0 {
        out[2] = Some((x, y - 1));
    }
    if y + 1 < height {
        out[3] = Some((x, y + 1));
    }
    out.into_iter().flatten()
}

fn colour_distance(a: &image::Rgb<u8>, b: &image::Rgb<u8>) -> f32 {
    let dr = a[0] as f32 - b[0] as f32;
    let dg = a[1] as f32 - b[1] as f32;
    let db = a[2] as f32 - b[2] as f32;
    (dr * dr + dg * dg + db * db).sqrt()
}
