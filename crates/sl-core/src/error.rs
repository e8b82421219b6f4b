use thiserror::Error;

pub type Result<T> = std::result::Result<T, MagnifyError>;

/// Failure taxonomy for a magnification session.
///
/// Canvas and backend variants are fatal at initialization.  Frame-level
/// variants cause the offending frame to be skipped (pass-through); the next
/// frame is attempted independently.
#[derive(Debug, Error)]
pub enum MagnifyError {
    #[error("canvas must be square with a power-of-two side, got {width}x{height}")]
    Canvas { width: usize, height: usize },
    #[error("frame is {got_height}x{got_width} but the session canvas is {canvas}x{canvas}")]
    FrameShape {
        got_width: usize,
        got_height: usize,
        canvas: usize,
    },
    #[error("compute backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("compute backend failed: {0}")]
    Backend(String),
}

pub fn backend(msg: impl Into<String>) -> MagnifyError {
    MagnifyError::Backend(msg.into())
}

pub fn unavailable(msg: impl Into<String>) -> MagnifyError {
    MagnifyError::BackendUnavailable(msg.into())
}
