//! A viewing session: one loaded source and everything derived from it.
//!
//! Loading a new source builds the complete new state first and swaps it in
//! only on success, so a failed load leaves the previous session untouched.

use std::borrow::Cow;

use image::RgbImage;
use log::debug;
use log::info;
use log::warn;
use ndarray::Array2;

use crate::compositor::map_dual_channel;
use crate::compositor::map_single_channel;
use crate::config::SessionConfig;
use crate::ecg::EcgSeries;
use crate::enums::PlaneAxis;
use crate::error::ViewerError;
use crate::geometry::PlaneRequest;
use crate::source::ProbeInfo;
use crate::source::VolumeSource;
use crate::sync::EcgGate;
use crate::sync::FrameSelection;
use crate::sync::FrameTimeline;
use crate::sync::Playback;
use crate::volume::Sample;
use crate::volume::VoxelBuffer;
use crate::volume::extract_plane;
use crate::volume::flip_vertical;
use crate::volume_loader::FlowChannel;
use crate::volume_loader::LoadedVolume;
use crate::volume_loader::VolumeLoader;

/// Descriptive metadata of the loaded source.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub probe: ProbeInfo,
    pub sop_instance_uid: String,
    pub frame_count: usize,
    pub playback: Playback,
    pub has_flow: bool,
    pub has_ecg: bool,
}

/// One composited plane.
#[derive(Debug, Clone)]
pub struct PlaneImage {
    pub axis: PlaneAxis,
    pub image: RgbImage,
    /// Whether the flow overlay was composited into this plane
    pub flow: bool,
}

/// Result of one render pass over the three derived planes.
#[derive(Debug, Clone)]
pub struct PlaneSet {
    pub selection: FrameSelection,
    /// Reference frame time in seconds
    pub time: Option<f64>,
    /// XY, XZ and ZY, in that order
    pub planes: Vec<PlaneImage>,
}

/// A plane cut from a whole-volume frame at a voxel cursor.
#[derive(Debug, Clone)]
pub struct VolumeSlice {
    pub axis: PlaneAxis,
    /// Cursor index actually used, clamped to the volume
    pub index: usize,
    /// Real-world distance of the cursor from the box origin along the depth axis
    pub distance: f32,
    pub image: RgbImage,
}

struct SessionState {
    loaded: LoadedVolume,
    preloaded: Vec<VoxelBuffer>,
    ecg_gate: Option<EcgGate>,
    /// Reference frame currently displayed, `None` before the first render
    shown: Option<usize>,
}

impl SessionState {
    fn build(source: &dyn VolumeSource, config: &SessionConfig) -> Result<Self, ViewerError> {
        let loaded = VolumeLoader::load(source, config)?;
        let frame_count = loaded.sync.reference().usable_frames();
        let preloaded =
            VolumeLoader::preload_volume_frames(source, &loaded.bbox, config, frame_count)?;
        let ecg_gate = loaded
            .ecg
            .as_ref()
            .and_then(|ecg| EcgGate::new(frame_count, ecg.sample_count()));

        Ok(Self {
            loaded,
            preloaded,
            ecg_gate,
            shown: None,
        })
    }
}

pub struct Session {
    source: Box<dyn VolumeSource>,
    config: SessionConfig,
    state: SessionState,
}

impl Session {
    pub fn open(source: Box<dyn VolumeSource>, config: SessionConfig) -> Result<Self, ViewerError> {
        let state = SessionState::build(source.as_ref(), &config)?;
        Ok(Self {
            source,
            config,
            state,
        })
    }

    /// Switch to another source. On failure the current source and all state
    /// derived from it stay in place.
    pub fn replace_source(&mut self, source: Box<dyn VolumeSource>) -> Result<(), ViewerError> {
        let state = SessionState::build(source.as_ref(), &self.config)?;
        self.source = source;
        self.state = state;
        info!("switched source to {}", self.state.loaded.sop_instance_uid);
        Ok(())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn summary(&self) -> SessionSummary {
        let loaded = &self.state.loaded;
        SessionSummary {
            probe: loaded.probe.clone(),
            sop_instance_uid: loaded.sop_instance_uid.clone(),
            frame_count: loaded.sync.reference().frame_count(),
            playback: loaded.sync.reference().playback(),
            has_flow: loaded.flow.is_some(),
            has_ecg: loaded.ecg.is_some(),
        }
    }

    pub fn timeline(&self) -> &FrameTimeline {
        self.state.loaded.sync.reference()
    }

    pub fn planes(&self) -> &[PlaneRequest; 3] {
        &self.state.loaded.planes
    }

    pub fn ecg(&self) -> Option<&EcgSeries> {
        self.state.loaded.ecg.as_ref()
    }

    /// Reference frame shown by the last successful render.
    pub fn position(&self) -> usize {
        self.state.shown.unwrap_or(0)
    }

    pub fn preloaded_frames(&self) -> usize {
        self.state.preloaded.len()
    }

    /// Override the playback rate, within 1..=70 fps.
    pub fn set_frame_rate(&mut self, frame_rate: f64) -> Result<(), ViewerError> {
        self.state
            .loaded
            .sync
            .reference_mut()
            .set_frame_rate(frame_rate)
    }

    /// Resolve, extract and composite the three planes at a playback position.
    ///
    /// Nothing is committed unless every plane renders.
    pub fn render_planes(&mut self, position: usize) -> Result<PlaneSet, ViewerError> {
        let loaded = &self.state.loaded;
        let selection = loaded.sync.resolve(position);
        let flow_frame = loaded
            .flow
            .as_ref()
            .and_then(|flow| selection.secondary.get(flow.slot).copied().flatten());

        let mut planes = Vec::with_capacity(3);
        for (i, (axis, request)) in PlaneAxis::ALL.iter().zip(&loaded.planes).enumerate() {
            let raw = self
                .source
                .frame(selection.reference, &request.geometry, request.resolution)?;
            let tissue = Self::plane_samples::<u8>(VoxelBuffer::try_from(raw)?, *axis)?;

            let overlay = match (&loaded.flow, flow_frame) {
                (Some(flow), Some(frame)) => {
                    Self::composite_flow(flow, i, frame, *axis, &tissue, loaded)
                }
                _ => None,
            };
            let (image, flow) = match overlay {
                Some(image) => (image, true),
                None => (map_single_channel(&tissue, &loaded.tissue_table)?, false),
            };
            planes.push(PlaneImage {
                axis: *axis,
                image,
                flow,
            });
        }

        debug!(
            "rendered frame {} (flow frame {:?})",
            selection.reference, flow_frame
        );
        let time = loaded.sync.reference().time_of(selection.reference);
        self.state.shown = Some(selection.reference);
        Ok(PlaneSet {
            time,
            selection,
            planes,
        })
    }

    /// Drive playback from an ECG sample. Returns `None` when the sample maps
    /// to the frame already shown, or when there is no usable ECG.
    pub fn seek_ecg(&mut self, sample_index: usize) -> Result<Option<PlaneSet>, ViewerError> {
        let Some(gate) = self.state.ecg_gate else {
            return Ok(None);
        };
        match gate.advance(sample_index, self.state.shown) {
            Some(frame) => self.render_planes(frame).map(Some),
            None => Ok(None),
        }
    }

    /// ECG cursor of the current frame, as a fraction of the trace width.
    pub fn ecg_cursor(&self) -> Option<f64> {
        let ecg = self.state.loaded.ecg.as_ref()?;
        let time = self.timeline().time_of(self.position())?;
        Some(ecg.cursor_fraction(time))
    }

    /// Whole-volume frame `index`, from the preload cache when present.
    pub fn volume_frame(&self, index: usize) -> Result<Cow<'_, VoxelBuffer>, ViewerError> {
        let index = self.timeline().clamp(index);
        if let Some(buffer) = self.state.preloaded.get(index) {
            return Ok(Cow::Borrowed(buffer));
        }
        VolumeLoader::load_volume_frame(
            self.source.as_ref(),
            &self.state.loaded.bbox,
            self.config.volume_resolution,
            index,
        )
        .map(Cow::Owned)
    }

    /// Cut the tissue plane for `axis` at voxel `index` out of whole-volume
    /// frame `frame`.
    pub fn render_volume_slice(
        &self,
        frame: usize,
        axis: PlaneAxis,
        index: usize,
    ) -> Result<VolumeSlice, ViewerError> {
        let buffer = self.volume_frame(frame)?;
        let depth = axis.depth_axis();
        let index = index.min(buffer.dims()[depth] - 1);
        let extent = self.state.loaded.bbox.axis_lengths()[depth];

        let mut plane = extract_plane::<u8>(&buffer, axis, index)
            .ok_or_else(|| ViewerError::Composite("volume frame is not 8-bit tissue".into()))?;
        if axis.flips_vertically() {
            plane = flip_vertical(&plane);
        }

        Ok(VolumeSlice {
            axis,
            index,
            distance: buffer.position_along(depth, index, extent),
            image: map_single_channel(&plane, &self.state.loaded.tissue_table)?,
        })
    }

    /// Dense samples of a plane-request frame, oriented for display.
    ///
    /// Plane requests always zero the third basis vector, so the source returns
    /// a single slab and the samples are read as its XY plane.
    fn plane_samples<T: Sample>(buffer: VoxelBuffer, axis: PlaneAxis) -> Result<Array2<T>, ViewerError> {
        buffer.require_plane()?;
        let plane = extract_plane::<T>(&buffer, PlaneAxis::XY, 0).ok_or_else(|| {
            ViewerError::Composite(format!(
                "plane frame has format {:?}, expected {:?}",
                buffer.format(),
                T::FORMAT
            ))
        })?;
        Ok(if axis.flips_vertically() {
            flip_vertical(&plane)
        } else {
            plane
        })
    }

    /// Composite the flow overlay into one plane, or `None` if it cannot be
    /// shown. The tissue plane is always displayed regardless.
    fn composite_flow(
        flow: &FlowChannel,
        plane: usize,
        frame: usize,
        axis: PlaneAxis,
        tissue: &Array2<u8>,
        loaded: &LoadedVolume,
    ) -> Option<RgbImage> {
        let result = flow.streams[plane]
            .frame(frame)
            .map_err(ViewerError::from)
            .and_then(|raw| Ok(VoxelBuffer::try_from(raw)?))
            .and_then(|buffer| Self::plane_samples::<u16>(buffer, axis))
            .and_then(|samples| {
                map_dual_channel(
                    tissue,
                    &samples,
                    &loaded.tissue_table,
                    &flow.color,
                    &flow.arbitration,
                )
            });
        match result {
            Ok(image) => Some(image),
            Err(e) => {
                warn!("flow overlay skipped on {axis:?}: {e}");
                None
            }
        }
    }
}
