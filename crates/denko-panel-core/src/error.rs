//! Error types for the Denko Panel core library.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while validating input or building frames.
#[derive(Error, Debug)]
pub enum Error {
    /// Device address is empty after trimming.
    #[error("Device address is empty")]
    EmptyAddress,

    /// Text input is empty after trimming.
    #[error("Text is empty")]
    EmptyText,

    /// No images were selected.
    #[error("No images selected")]
    NoImages,

    /// Frame sequence is empty.
    #[error("No frames to send")]
    NoFrames,

    /// Frame sequence is longer than the device accepts.
    #[error("Too many frames: {count} (maximum {max})")]
    TooManyFrames { count: usize, max: usize },

    /// Preset identifier outside the device's slots.
    #[error("Invalid preset: {0} (must be 1-4)")]
    InvalidPreset(String),

    /// Color string could not be parsed.
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    /// Frame interval outside the supported range.
    #[error("Invalid interval: {0}ms (must be 200-10000)")]
    InvalidInterval(u32),

    /// Loop count outside the supported range.
    #[error("Invalid loop count: {0} (must be 1-20)")]
    InvalidLoopCount(u32),

    /// Link could not be parsed as a URL.
    #[error("Invalid link: {0}")]
    InvalidLink(String),

    /// Pixel buffer size does not match the dimensions.
    #[error("Bitmap size mismatch: expected {expected}, got {actual}")]
    BitmapSize { expected: usize, actual: usize },

    /// Bitmap has zero width or height.
    #[error("Bitmap has no pixels")]
    EmptyBitmap,

    /// Scaled or stacked bitmap would exceed the pixel limit.
    #[error("Bitmap too large (maximum {max} pixels)")]
    BitmapTooLarge { max: u64 },

    /// PNG encoding error.
    #[error("PNG encoding error: {0}")]
    Png(#[from] png::EncodingError),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Font could not be loaded.
    #[error("Font error: {0}")]
    Font(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a device transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection or protocol failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Device answered with a non-success status.
    #[error("Device returned {status} for {url}")]
    Status { status: u16, url: String },
}

/// Broad classification of a failed send, used for user-facing notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    Encoding,
    Cancelled,
    Transport,
    Busy,
}

/// Errors that end a send job.
#[derive(Error, Debug)]
pub enum SendError {
    /// Input rejected before any request was made.
    #[error("{0}")]
    Validation(#[source] Error),

    /// Another job is still sending.
    #[error("A send is already in progress")]
    Busy,

    /// Frame could not be encoded to PNG.
    #[error("Frame {index} could not be encoded: {source}")]
    Encoding {
        index: usize,
        acknowledged: usize,
        #[source]
        source: Error,
    },

    /// Cancelled by the user.
    #[error("Send cancelled after {acknowledged} frame(s)")]
    Cancelled { acknowledged: usize },

    /// Frame upload failed.
    #[error("Frame {index} upload failed: {source}")]
    Upload {
        index: usize,
        acknowledged: usize,
        #[source]
        source: TransportError,
    },

    /// Playback configuration request failed after all frames were sent.
    #[error("Preset configuration failed: {source}")]
    Finalize {
        acknowledged: usize,
        #[source]
        source: TransportError,
    },
}

impl SendError {
    /// Returns the failure classification.
    pub fn kind(&self) -> FailureKind {
        match self {
            SendError::Validation(_) => FailureKind::Validation,
            SendError::Busy => FailureKind::Busy,
            SendError::Encoding { .. } => FailureKind::Encoding,
            SendError::Cancelled { .. } => FailureKind::Cancelled,
            SendError::Upload { .. } | SendError::Finalize { .. } => FailureKind::Transport,
        }
    }

    /// Returns how many frames the device acknowledged before the job stopped.
    pub fn acknowledged(&self) -> usize {
        match self {
            SendError::Validation(_) | SendError::Busy => 0,
            SendError::Encoding { acknowledged, .. }
            | SendError::Cancelled { acknowledged }
            | SendError::Upload { acknowledged, .. }
            | SendError::Finalize { acknowledged, .. } => *acknowledged,
        }
    }
}

impl From<Error> for SendError {
    fn from(err: Error) -> Self {
        SendError::Validation(err)
    }
}
