//! The boundary to whatever acquires and decodes volume data.
//!
//! Calls through these traits may block for a long time (decoding, resampling,
//! out-of-process backends), so the core only makes them on discrete
//! user-triggered events, never per pixel.

use thiserror::Error;

use crate::ecg::EcgSeries;
use crate::enums::ColorMapKind;
use crate::enums::ProbeType;
use crate::enums::StreamKind;
use crate::enums::TableFormat;
use crate::geometry::OrientedBox;
use crate::volume::RawFrame;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("index {index} out of bounds ({count} available)")]
    OutOfBounds { index: usize, count: usize },

    #[error("not supported by this source: {0}")]
    Unsupported(&'static str),

    #[error("not available: {0}")]
    NotAvailable(&'static str),

    #[error("{0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbeInfo {
    pub name: String,
    pub probe_type: ProbeType,
}

/// One channel of a multi-stream source, bound to the geometry and
/// resolution it was created with.
pub trait ImageStream {
    fn kind(&self) -> StreamKind;

    fn frame_count(&self) -> Result<usize, SourceError>;

    /// Capture time of every frame, in seconds.
    fn frame_times(&self) -> Result<Vec<f64>, SourceError>;

    fn frame(&self, index: usize) -> Result<RawFrame, SourceError>;
}

/// A loaded recording.
///
/// Geometry, primary frame retrieval, color maps and metadata are required.
/// ECG and multi-stream access are optional capabilities; the default
/// implementations report them as absent.
pub trait VolumeSource {
    fn bounding_box(&self) -> Result<OrientedBox, SourceError>;

    fn frame_count(&self) -> Result<usize, SourceError>;

    fn frame_times(&self) -> Result<Vec<f64>, SourceError>;

    /// Resample frame `index` of the primary channel onto `geometry`.
    ///
    /// Axes whose basis vector is zero come back with a dimension of 1.
    fn frame(
        &self,
        index: usize,
        geometry: &OrientedBox,
        max_resolution: [u16; 3],
    ) -> Result<RawFrame, SourceError>;

    fn color_map(&self, kind: ColorMapKind) -> Result<(Vec<u8>, TableFormat), SourceError>;

    fn ecg(&self) -> Result<EcgSeries, SourceError> {
        Err(SourceError::NotAvailable("ECG"))
    }

    fn stream_count(&self) -> Result<usize, SourceError> {
        Ok(0)
    }

    fn stream(
        &self,
        _index: usize,
        _geometry: &OrientedBox,
        _max_resolution: [u16; 3],
    ) -> Result<Box<dyn ImageStream>, SourceError> {
        Err(SourceError::Unsupported("multi-stream access"))
    }

    fn probe_info(&self) -> Result<ProbeInfo, SourceError>;

    fn sop_instance_uid(&self) -> Result<String, SourceError>;
}
