use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnotationError {
    #[error("No image uploaded yet")]
    NotReady,

    #[error("Point ({x}, {y}) outside {width}x{height} image")]
    PointOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("Mask dimensions {mask_width}x{mask_height} do not match image {width}x{height}")]
    MaskDimensionMismatch {
        width: u32,
        height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    #[error("Segmentation error: {0}")]
    Segmentation(#[from] segmentation::SegmentationError),
}

pub type Result<T> = std::result::Result<T, AnnotationError>;
