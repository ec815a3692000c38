use thiserror::Error;

use crate::source::SourceError;

/// Reasons a load attempt is refused before anything reaches the display.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("bounding box axis {axis} has non-positive length {length}")]
    NonPositiveAxis { axis: usize, length: f32 },

    #[error("voxel buffer dimension {axis} is {len}, must be greater than 1")]
    DegenerateDimension { axis: usize, len: usize },

    #[error("stride{which} is {stride}, must be at least {required}")]
    StrideTooSmall {
        which: u8,
        stride: usize,
        required: usize,
    },

    #[error("voxel buffer holds {len} bytes, addressing requires {required}")]
    BufferTooShort { len: usize, required: usize },

    #[error("frame count < 1, nothing to display")]
    NoFrames,

    #[error("plane request must zero exactly one basis vector, found {zeroed}")]
    NotAPlane { zeroed: usize },

    #[error("color table {kind} has {len} bytes, expected {expected}")]
    BadColorTable {
        kind: &'static str,
        len: usize,
        expected: usize,
    },
}

/// Frame timing problems. These degrade playback to a still image.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimingIssue {
    #[error("frame count {frame_count} does not match {times} frame times")]
    CountMismatch { frame_count: usize, times: usize },

    #[error("frame interval <= 0 ({first} -> {second}), only first frame will be displayed")]
    NonIncreasing { first: f64, second: f64 },

    #[error("frame rate {rate} outside {min}..={max}")]
    RateOutOfRange { rate: f64, min: f64, max: f64 },
}

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("load rejected: {0}")]
    LoadRejected(#[from] RejectReason),

    #[error("invalid frame timing: {0}")]
    FrameTimingInvalid(#[from] TimingIssue),

    #[error("secondary channel unavailable: {0}")]
    SecondaryChannelUnavailable(String),

    #[error("volume source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("compositing failed: {0}")]
    Composite(String),
}
