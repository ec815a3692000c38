use crate::color_map::ArbitrationTable;
use crate::color_map::ColorTable;
use crate::config::SessionConfig;
use crate::ecg::EcgSeries;
use crate::enums::ColorMapKind;
use crate::enums::StreamKind;
use crate::error::ViewerError;
use crate::geometry::OrientedBox;
use crate::geometry::PlaneRequest;
use crate::geometry::derive_planes;
use crate::source::ImageStream;
use crate::source::ProbeInfo;
use crate::source::VolumeSource;
use crate::sync::FrameSynchronizer;
use crate::sync::FrameTimeline;
use crate::volume::VoxelBuffer;

use log::debug;
use log::info;
use log::warn;

/// Color-flow overlay: one stream per derived plane plus its lookup tables.
pub struct FlowChannel {
    /// Streams in XY, XZ, ZY order
    pub streams: Vec<Box<dyn ImageStream>>,
    /// Slot of the flow frame times in the synchronizer
    pub slot: usize,
    pub color: ColorTable,
    pub arbitration: ArbitrationTable,
}

/// Everything derived from a source at load time.
pub struct LoadedVolume {
    pub bbox: OrientedBox,
    /// XY, XZ and ZY plane requests, in that order
    pub planes: [PlaneRequest; 3],
    pub sync: FrameSynchronizer,
    pub tissue_table: ColorTable,
    pub flow: Option<FlowChannel>,
    pub ecg: Option<EcgSeries>,
    pub probe: ProbeInfo,
    pub sop_instance_uid: String,
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Validate `source` and derive the display state for it
    ///
    /// # Arguments
    ///
    /// * `source` - The recording to load
    /// * `config` - Plane resolution and which overlays to enable
    ///
    /// # Errors
    ///
    /// Returns `LoadRejected` if the bounding box has a degenerate axis or the
    /// first frame of any plane violates the buffer invariants, and
    /// `SourceUnavailable` if the source fails. Missing ECG or flow data only
    /// disables that overlay.
    pub fn load(
        source: &dyn VolumeSource,
        config: &SessionConfig,
    ) -> Result<LoadedVolume, ViewerError> {
        let bbox = source.bounding_box()?;
        bbox.validate()?;

        let timeline = FrameTimeline::new(source.frame_count()?, source.frame_times()?)?;
        if let Some(issue) = timeline.issue() {
            warn!("{}", ViewerError::FrameTimingInvalid(issue.clone()));
        }

        let [width, height] = config.plane_resolution;
        let planes = derive_planes(&bbox, width, height)?;
        Self::probe_planes(source, &planes)?;

        let tissue_table = Self::tissue_table(source);
        let probe = source.probe_info()?;
        let sop_instance_uid = source.sop_instance_uid()?;

        let ecg = if config.enable_ecg {
            match source
                .ecg()
                .map_err(|e| ViewerError::SecondaryChannelUnavailable(e.to_string()))
                .and_then(EcgSeries::into_usable)
            {
                Ok(ecg) => Some(ecg),
                Err(e) => {
                    warn!("{e}");
                    None
                }
            }
        } else {
            None
        };

        let mut sync = FrameSynchronizer::new(timeline);
        let flow = if config.enable_flow {
            match Self::flow_channel(source, &planes, &mut sync) {
                Ok(flow) => flow,
                Err(e) => {
                    warn!("{e}");
                    None
                }
            }
        } else {
            None
        };

        info!(
            "loaded {} ({} {:?}): {} frames, flow {}, ECG {}",
            sop_instance_uid,
            probe.name,
            probe.probe_type,
            sync.reference().frame_count(),
            if flow.is_some() { "on" } else { "off" },
            if ecg.is_some() { "on" } else { "off" },
        );

        Ok(LoadedVolume {
            bbox,
            planes,
            sync,
            tissue_table,
            flow,
            ecg,
            probe,
            sop_instance_uid,
        })
    }

    /// Fetch frame `index` of the whole box, requiring `dims[i] > 1` on every axis
    pub fn load_volume_frame(
        source: &dyn VolumeSource,
        bbox: &OrientedBox,
        max_resolution: [u16; 3],
        index: usize,
    ) -> Result<VoxelBuffer, ViewerError> {
        let buffer = VoxelBuffer::try_from(source.frame(index, bbox, max_resolution)?)?;
        buffer.require_volumetric()?;
        Ok(buffer)
    }

    /// Fetch every whole-volume frame for scrubbing, if enabled and within the
    /// configured bound. Returns an empty list otherwise.
    pub fn preload_volume_frames(
        source: &dyn VolumeSource,
        bbox: &OrientedBox,
        config: &SessionConfig,
        frame_count: usize,
    ) -> Result<Vec<VoxelBuffer>, ViewerError> {
        if !config.preload_frames {
            return Ok(Vec::new());
        }
        if frame_count > config.max_preload_frames {
            warn!(
                "{frame_count} frames exceed the preload limit of {}, fetching on demand",
                config.max_preload_frames
            );
            return Ok(Vec::new());
        }

        let frames = (0..frame_count)
            .map(|i| Self::load_volume_frame(source, bbox, config.volume_resolution, i))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("preloaded {} volume frames", frames.len());
        Ok(frames)
    }

    fn probe_planes(source: &dyn VolumeSource, planes: &[PlaneRequest; 3]) -> Result<(), ViewerError> {
        for plane in planes {
            VoxelBuffer::try_from(source.frame(0, &plane.geometry, plane.resolution)?)?
                .require_plane()?;
        }
        Ok(())
    }

    fn tissue_table(source: &dyn VolumeSource) -> ColorTable {
        let table = source
            .color_map(ColorMapKind::TissueColor)
            .map_err(ViewerError::from)
            .and_then(|(bytes, format)| {
                Ok(ColorTable::from_bytes(ColorMapKind::TissueColor, &bytes, format)?)
            });
        match table {
            Ok(table) => table,
            Err(e) => {
                warn!("tissue map unavailable ({e}), using grayscale");
                ColorTable::grayscale()
            }
        }
    }

    fn flow_channel(
        source: &dyn VolumeSource,
        planes: &[PlaneRequest; 3],
        sync: &mut FrameSynchronizer,
    ) -> Result<Option<FlowChannel>, ViewerError> {
        let unavailable = |reason: String| ViewerError::SecondaryChannelUnavailable(reason);

        let stream_count = source.stream_count().map_err(|e| unavailable(e.to_string()))?;
        let mut flow_index = None;
        for index in 0..stream_count {
            let stream = source
                .stream(index, &planes[0].geometry, planes[0].resolution)
                .map_err(|e| unavailable(e.to_string()))?;
            if stream.kind() == StreamKind::BloodVelocity {
                flow_index = Some(index);
                break;
            }
        }
        let Some(index) = flow_index else {
            debug!("no blood velocity stream among {stream_count}");
            return Ok(None);
        };

        let streams = planes
            .iter()
            .map(|plane| source.stream(index, &plane.geometry, plane.resolution))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| unavailable(e.to_string()))?;

        let times = streams[0].frame_times().map_err(|e| unavailable(e.to_string()))?;
        let frame_count = streams[0].frame_count().map_err(|e| unavailable(e.to_string()))?;
        if frame_count == 0 || frame_count != times.len() {
            return Err(unavailable(format!(
                "flow stream has {frame_count} frames and {} frame times",
                times.len()
            )));
        }

        let (bytes, format) = source
            .color_map(ColorMapKind::FlowColor)
            .map_err(|e| unavailable(e.to_string()))?;
        let color = ColorTable::from_bytes(ColorMapKind::FlowColor, &bytes, format)
            .map_err(|e| unavailable(e.to_string()))?;

        let (bytes, format) = source
            .color_map(ColorMapKind::FlowArbitration)
            .map_err(|e| unavailable(e.to_string()))?;
        let arbitration =
            ArbitrationTable::from_bytes(&bytes, format).map_err(|e| unavailable(e.to_string()))?;

        let slot = sync.add_secondary(times);
        Ok(Some(FlowChannel {
            streams,
            slot,
            color,
            arbitration,
        }))
    }
}
