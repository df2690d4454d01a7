/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame ended before a declared field or payload.
    #[error("truncated frame (needed {needed} bytes, {available} available)")]
    Truncated { needed: usize, available: usize },

    /// A declared length or field value is inconsistent with the layout.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// A sample exceeds the stream bound.
    #[error("sample too large ({size} bytes, max {max})")]
    SampleTooLarge { size: usize, max: usize },

    /// A fixed-size sample does not have the exact stream size.
    #[error("sample size mismatch ({size} bytes, expected {expected})")]
    SampleSizeMismatch { size: usize, expected: usize },

    /// A second stream was written into a simple (single stream) frame.
    #[error("simple channel frame already holds a stream")]
    SimpleChannelOverflow,
}

pub type Result<T> = std::result::Result<T, FrameError>;
