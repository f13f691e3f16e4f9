use image::{GrayImage, RgbImage};
use segmentation::{PointPrompt, PointSegmenter};
use tracing::{debug, info};

use crate::error::{AnnotationError, Result};
use crate::overlay::render_display;

/// Annotation state for one uploaded image.
///
/// `original` is fixed at upload time, `current` is the working copy handed
/// to the segmentation backend, and `display` is always the pure fold of
/// `current` with the accumulated masks and points, never an independent
/// source of truth. `points` and `masks` are index-aligned: a point is only
/// recorded together with its accepted mask.
pub struct Session {
    epoch: u64,
    original: RgbImage,
    current: RgbImage,
    display: RgbImage,
    points: Vec<PointPrompt>,
    masks: Vec<GrayImage>,
}

impl Session {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn original(&self) -> &RgbImage {
        &self.original
    }

    pub fn points(&self) -> &[PointPrompt] {
        &self.points
    }

    pub fn masks(&self) -> &[GrayImage] {
        &self.masks
    }
}

/// Result of one click: the full composited display, and the newly accepted
/// mask on its own (absent when the backend selected nothing).
pub struct PointOutcome {
    pub display: RgbImage,
    pub mask: Option<GrayImage>,
}

/// The session-state annotation engine.
///
/// Owns the segmentation backend and at most one live [`Session`]. All
/// mutating operations keep the point/mask histories aligned and rebuild
/// the display by full replay, so undo restores earlier displays exactly.
pub struct AnnotationEngine {
    segmenter: Box<dyn PointSegmenter>,
    session: Option<Session>,
    epoch: u64,
}

impl AnnotationEngine {
    pub fn new(segmenter: Box<dyn PointSegmenter>) -> Self {
        Self {
            segmenter,
            session: None,
            epoch: 0,
        }
    }

    /// Install a freshly uploaded image, superseding any previous session.
    ///
    /// The backend is initialized first (for learned backends this is the
    /// expensive embedding computation, paid once per upload); if that
    /// fails the previous session stays intact and usable.
    pub fn reset(&mut self, image: RgbImage) -> Result<&RgbImage> {
        self.segmenter.set_image(&image)?;
        self.epoch += 1;
        info!(
            epoch = self.epoch,
            width = image.width(),
            height = image.height(),
            "session reset"
        );
        let session = self.session.insert(Session {
            epoch: self.epoch,
            current: image.clone(),
            display: image.clone(),
            original: image,
            points: Vec::new(),
            masks: Vec::new(),
        });
        Ok(&session.display)
    }

    /// Feed one new click to the backend and accept its best mask.
    ///
    /// State is only mutated after the backend call succeeds: on an empty
    /// candidate list (or any error) the histories and display are left
    /// untouched, so `points.len() == masks.len()` holds unconditionally.
    pub fn add_point(&mut self, prompt: PointPrompt, multi_object: bool) -> Result<PointOutcome> {
        let session = self.session.as_mut().ok_or(AnnotationError::NotReady)?;
        let (width, height) = session.current.dimensions();
        if prompt.x >= width || prompt.y >= height {
            return Err(AnnotationError::PointOutOfBounds {
                x: prompt.x,
                y: prompt.y,
                width,
                height,
            });
        }

        let candidates = self.segmenter.segment(prompt, multi_object)?;
        let Some(best) = candidates.into_iter().next() else {
            debug!(
                epoch = session.epoch,
                x = prompt.x,
                y = prompt.y,
                "backend produced no mask, prompt dropped"
            );
            return Ok(PointOutcome {
                display: session.display.clone(),
                mask: None,
            });
        };

        if best.mask.dimensions() != (width, height) {
            return Err(AnnotationError::MaskDimensionMismatch {
                width,
                height,
                mask_width: best.mask.width(),
                mask_height: best.mask.height(),
            });
        }

        session.points.push(prompt);
        session.masks.push(best.mask.clone());
        session.display = render_display(&session.current, &session.masks, &session.points)?;
        debug!(
            epoch = session.epoch,
            points = session.points.len(),
            score = best.score,
            "mask accepted"
        );

        Ok(PointOutcome {
            display: session.display.clone(),
            mask: Some(best.mask),
        })
    }

    /// Drop the most recent click and its mask, replaying the remaining
    /// history from the untouched base image. A no-op once the history is
    /// empty.
    pub fn undo(&mut self) -> Result<&RgbImage> {
        let session = self.session.as_mut().ok_or(AnnotationError::NotReady)?;
        if session.points.pop().is_some() {
            session.masks.pop();
            session.display = render_display(&session.current, &session.masks, &session.points)?;
            debug!(
                epoch = session.epoch,
                points = session.points.len(),
                "undid last point"
            );
        }
        Ok(&session.display)
    }

    /// Generation counter, bumped by every successful reset.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(AnnotationError::NotReady)
    }

    pub fn display(&self) -> Result<&RgbImage> {
        self.session().map(|session| &session.display)
    }
}
