//! # Session-State Annotation Engine
//!
//! Core of the avalanche annotation backend: per-session image state,
//! click-prompt history, accumulated segmentation masks, and the
//! composited display image returned to the client after every step.
//!
//! The engine keeps three image buffers per session (the untouched
//! original, the working copy fed to the segmentation backend, and the
//! display composite) plus the index-aligned point and mask histories.
//! The display is always recomputed as a pure fold over the base image
//! and the histories. Alpha blending is not invertible from the
//! composited buffer alone, so undo replays the remaining masks and
//! markers from scratch rather than subtracting from the display.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use annotation::AnnotationEngine;
//! use segmentation::{PointPrompt, RegionGrowSegmenter};
//!
//! # fn main() -> annotation::Result<()> {
//! let mut engine = AnnotationEngine::new(Box::new(RegionGrowSegmenter::default()));
//!
//! let photo = image::RgbImage::new(640, 480);
//! engine.reset(photo)?;
//!
//! let outcome = engine.add_point(PointPrompt::foreground(320, 240), false)?;
//! assert!(outcome.mask.is_some());
//!
//! engine.undo()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod overlay;
pub mod session;
pub mod store;

// Re-exports for convenience
pub use error::{AnnotationError, Result};
pub use overlay::{MARKER_COLOR, MASK_ALPHA, MASK_PALETTE, draw_marker, overlay, render_display};
pub use session::{AnnotationEngine, PointOutcome, Session};
pub use store::{SessionId, SessionStore};
