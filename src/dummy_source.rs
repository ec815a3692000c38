//! In-process synthetic recording for tests and demos.
//!
//! One second loop of checkerboard tissue starting at t = 10 s, a color-flow
//! stream with a velocity ramp along Y and a bandwidth ramp along X, and a
//! sine-wave ECG.

use std::f32::consts::PI;
use std::rc::Rc;

use glam::Mat3;
use glam::Vec3;
use rayon::prelude::*;

use crate::color_map::U8_TABLE_LEN;
use crate::color_map::U16_TABLE_LEN;
use crate::ecg::EcgSeries;
use crate::enums::ColorMapKind;
use crate::enums::ProbeType;
use crate::enums::SampleFormat;
use crate::enums::StreamKind;
use crate::enums::TableFormat;
use crate::geometry::OrientedBox;
use crate::source::ImageStream;
use crate::source::ProbeInfo;
use crate::source::SourceError;
use crate::source::VolumeSource;
use crate::volume::RawFrame;

/// Black outside the image volume
const OUTSIDE_VAL: u8 = 0;
/// Gray value for the plane closest to the probe
const PROBE_PLANE: u8 = 127;

const START_TIME: f64 = 10.0;
const LOOP_DURATION: f64 = 1.0;
const DEFAULT_FRAMES: usize = 25;
const ECG_SAMPLES: usize = 128;
/// Matches the lengths of dir1, dir2 & dir3 so checker squares stay square
const DIMS: [usize; 3] = [20, 15, 10];
/// Color-flow sector is shrunk about the center of the tissue box
const FLOW_SCALE: f32 = 0.8;

/// One stored frame, packed, positioned by `bbox`.
#[derive(Debug, Clone)]
struct StoredFrame {
    time: f64,
    format: SampleFormat,
    data: Vec<u8>,
}

#[derive(Debug)]
struct StoredVolume {
    bbox: OrientedBox,
    frames: Vec<StoredFrame>,
}

impl StoredVolume {
    fn frame_times(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.time).collect()
    }

    fn frame(&self, index: usize) -> Result<&StoredFrame, SourceError> {
        self.frames.get(index).ok_or(SourceError::OutOfBounds {
            index,
            count: self.frames.len(),
        })
    }

    /// Nearest-neighbour resampling of frame `index` onto `geometry`.
    fn resample(
        &self,
        index: usize,
        geometry: &OrientedBox,
        max_resolution: [u16; 3],
    ) -> Result<RawFrame, SourceError> {
        let frame = self.frame(index)?;
        let bps = frame.format.bytes_per_sample();
        let to_local = Mat3::from_cols(self.bbox.dir1, self.bbox.dir2, self.bbox.dir3).inverse();

        let out_dirs = geometry.dirs();
        let dims: [usize; 3] = std::array::from_fn(|i| {
            if out_dirs[i] == Vec3::ZERO {
                1
            } else {
                usize::from(max_resolution[i].max(1))
            }
        });

        let slab_bytes = dims[0] * dims[1] * bps;
        let mut data = vec![OUTSIDE_VAL; slab_bytes * dims[2]];
        data.par_chunks_mut(slab_bytes)
            .enumerate()
            .for_each(|(z, slab)| {
                let w = (z as f32 + 0.5) / dims[2] as f32;
                for (i, out) in slab.chunks_exact_mut(bps).enumerate() {
                    let u = ((i % dims[0]) as f32 + 0.5) / dims[0] as f32;
                    let v = ((i / dims[0]) as f32 + 0.5) / dims[1] as f32;
                    let world =
                        geometry.origin + out_dirs[0] * u + out_dirs[1] * v + out_dirs[2] * w;
                    if let Some(src) = self.voxel_at(to_local * (world - self.bbox.origin)) {
                        out.copy_from_slice(&frame.data[src * bps..(src + 1) * bps]);
                    }
                }
            });

        Ok(RawFrame {
            dims,
            stride0: dims[0] * bps,
            stride1: dims[0] * dims[1] * bps,
            format: frame.format,
            time: frame.time,
            data,
        })
    }

    /// Packed sample index for a point in unit box coordinates.
    fn voxel_at(&self, local: Vec3) -> Option<usize> {
        let local = local.to_array();
        let mut index = [0usize; 3];
        for axis in 0..3 {
            if !(0.0..1.0).contains(&local[axis]) {
                return None;
            }
            index[axis] = ((local[axis] * DIMS[axis] as f32) as usize).min(DIMS[axis] - 1);
        }
        Some(index[0] + index[1] * DIMS[0] + index[2] * DIMS[0] * DIMS[1])
    }
}

fn frame_time(frame: usize, frame_count: usize) -> f64 {
    frame as f64 * (LOOP_DURATION / frame_count as f64) + START_TIME
}

fn tissue_frames(frame_count: usize) -> Vec<StoredFrame> {
    let [d0, d1, d2] = DIMS;
    (0..frame_count)
        .map(|f| {
            let mut data = vec![0u8; d0 * d1 * d2];
            for z in 0..d2 {
                for y in 0..d1 {
                    for x in 0..d0 {
                        let even = |v: usize| (v / 2) % 2 == 0;
                        let on = even(f) ^ even(x) ^ even(y) ^ even(z);
                        data[x + y * d0 + z * d0 * d1] = if y == 0 {
                            PROBE_PLANE
                        } else if on {
                            255
                        } else {
                            0
                        };
                    }
                }
            }
            StoredFrame {
                time: frame_time(f, frame_count),
                format: SampleFormat::U8,
                data,
            }
        })
        .collect()
}

fn flow_frames(frame_count: usize) -> Vec<StoredFrame> {
    let [d0, d1, d2] = DIMS;
    let mut data = vec![0u8; 2 * d0 * d1 * d2];
    for z in 0..d2 {
        for y in 0..d1 {
            for x in 0..d0 {
                let i = 2 * (x + y * d0 + z * d0 * d1);
                // [+127, -128] along Y, [0, 255] along X
                let freq = (255.0 * (0.5 - y as f32 / d1 as f32)) as i8;
                let bw = (256.0 * (x as f32 / d0 as f32)) as u8;
                data[i] = freq as u8;
                data[i + 1] = bw;
            }
        }
    }
    (0..frame_count)
        .map(|f| StoredFrame {
            time: frame_time(f, frame_count),
            format: SampleFormat::Freq8Pow8,
            data: data.clone(),
        })
        .collect()
}

fn tissue_color_map() -> Vec<u8> {
    (0..U8_TABLE_LEN)
        .flat_map(|i| [i as u8, i as u8, i as u8, 0xFF])
        .collect()
}

/// Red for positive, blue for negative velocities, green at high bandwidth.
fn flow_color_map() -> Vec<u8> {
    let mut map = Vec::with_capacity(U16_TABLE_LEN * 4);
    for bw in 0..256usize {
        let green = if bw >= 192 { bw as u8 } else { 0 };
        for freq in 0..256usize {
            let (red, blue) = if green > 0 {
                (0, 0)
            } else if freq < 128 {
                (128 + freq as u8, 0)
            } else {
                (0, 128 + (255 - freq) as u8)
            };
            map.extend_from_slice(&[red, green, blue, 0xFF]);
        }
    }
    map
}

/// Show flow wherever the signed velocity magnitude is at least 16.
fn flow_arbitration_map() -> Vec<u8> {
    (0..U16_TABLE_LEN)
        .map(|i| {
            let freq = (i & 0xFF) as u8 as i8;
            if freq.unsigned_abs() >= 16 { 0xFF } else { 0x00 }
        })
        .collect()
}

fn sine_ecg() -> EcgSeries {
    let samples = (0..ECG_SAMPLES)
        .map(|i| (4.0 * i as f32 * PI / ECG_SAMPLES as f32).sin())
        .collect();
    EcgSeries {
        samples,
        delta_time: LOOP_DURATION / ECG_SAMPLES as f64,
        start_time: START_TIME,
        // trigger every half second
        trig_times: vec![START_TIME, START_TIME + LOOP_DURATION / 2.0, START_TIME + LOOP_DURATION],
    }
}

/// Synthetic two-stream recording (tissue + blood velocity).
pub struct DummySource {
    tissue: Rc<StoredVolume>,
    flow: Rc<StoredVolume>,
    ecg: Option<EcgSeries>,
    probe: ProbeInfo,
}

impl Default for DummySource {
    fn default() -> Self {
        Self::new()
    }
}

impl DummySource {
    pub fn new() -> Self {
        Self::with_frame_counts(DEFAULT_FRAMES, DEFAULT_FRAMES)
    }

    /// Tissue and flow streams with independent frame counts over the same loop.
    pub fn with_frame_counts(tissue_frames_count: usize, flow_frames_count: usize) -> Self {
        let bbox = OrientedBox::new(
            Vec3::new(-0.1, 0.0, -0.075),
            Vec3::new(0.20, 0.0, 0.0),  // width
            Vec3::new(0.0, 0.10, 0.0),  // depth
            Vec3::new(0.0, 0.0, 0.15),  // elevation
        );

        let mut flow_bbox = bbox;
        flow_bbox.origin += (bbox.dir1 + bbox.dir2 + bbox.dir3) * (0.5 * (1.0 - FLOW_SCALE));
        flow_bbox.dir1 *= FLOW_SCALE;
        flow_bbox.dir2 *= FLOW_SCALE;
        flow_bbox.dir3 *= FLOW_SCALE;

        Self {
            tissue: Rc::new(StoredVolume {
                bbox,
                frames: tissue_frames(tissue_frames_count),
            }),
            flow: Rc::new(StoredVolume {
                bbox: flow_bbox,
                frames: flow_frames(flow_frames_count),
            }),
            ecg: Some(sine_ecg()),
            probe: ProbeInfo {
                name: "4V".into(),
                probe_type: ProbeType::External,
            },
        }
    }

    pub fn without_ecg(mut self) -> Self {
        self.ecg = None;
        self
    }

    fn volume(&self, kind: StreamKind) -> &Rc<StoredVolume> {
        match kind {
            StreamKind::Tissue => &self.tissue,
            StreamKind::BloodVelocity => &self.flow,
        }
    }
}

const STREAM_KINDS: [StreamKind; 2] = [StreamKind::Tissue, StreamKind::BloodVelocity];

struct DummyStream {
    kind: StreamKind,
    volume: Rc<StoredVolume>,
    geometry: OrientedBox,
    max_resolution: [u16; 3],
}

impl ImageStream for DummyStream {
    fn kind(&self) -> StreamKind {
        self.kind
    }

    fn frame_count(&self) -> Result<usize, SourceError> {
        Ok(self.volume.frames.len())
    }

    fn frame_times(&self) -> Result<Vec<f64>, SourceError> {
        Ok(self.volume.frame_times())
    }

    fn frame(&self, index: usize) -> Result<RawFrame, SourceError> {
        self.volume.resample(index, &self.geometry, self.max_resolution)
    }
}

impl VolumeSource for DummySource {
    fn bounding_box(&self) -> Result<OrientedBox, SourceError> {
        Ok(self.tissue.bbox)
    }

    fn frame_count(&self) -> Result<usize, SourceError> {
        Ok(self.tissue.frames.len())
    }

    fn frame_times(&self) -> Result<Vec<f64>, SourceError> {
        Ok(self.tissue.frame_times())
    }

    fn frame(
        &self,
        index: usize,
        geometry: &OrientedBox,
        max_resolution: [u16; 3],
    ) -> Result<RawFrame, SourceError> {
        self.tissue.resample(index, geometry, max_resolution)
    }

    fn color_map(&self, kind: ColorMapKind) -> Result<(Vec<u8>, TableFormat), SourceError> {
        Ok(match kind {
            ColorMapKind::TissueColor => (tissue_color_map(), TableFormat::R8G8B8A8),
            ColorMapKind::FlowColor => (flow_color_map(), TableFormat::R8G8B8A8),
            ColorMapKind::FlowArbitration => (flow_arbitration_map(), TableFormat::U8),
        })
    }

    fn ecg(&self) -> Result<EcgSeries, SourceError> {
        self.ecg.clone().ok_or(SourceError::NotAvailable("ECG"))
    }

    fn stream_count(&self) -> Result<usize, SourceError> {
        Ok(STREAM_KINDS.len())
    }

    fn stream(
        &self,
        index: usize,
        geometry: &OrientedBox,
        max_resolution: [u16; 3],
    ) -> Result<Box<dyn ImageStream>, SourceError> {
        let kind = *STREAM_KINDS.get(index).ok_or(SourceError::OutOfBounds {
            index,
            count: STREAM_KINDS.len(),
        })?;
        Ok(Box::new(DummyStream {
            kind,
            volume: Rc::clone(self.volume(kind)),
            geometry: *geometry,
            max_resolution,
        }))
    }

    fn probe_info(&self) -> Result<ProbeInfo, SourceError> {
        Ok(self.probe.clone())
    }

    fn sop_instance_uid(&self) -> Result<String, SourceError> {
        Ok("DUMMY_UID".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::VoxelBuffer;

    #[test]
    fn test_full_box_resample_reproduces_checkerboard() {
        let source = DummySource::new();
        let bbox = source.bounding_box().unwrap();
        let raw = source.frame(0, &bbox, [20, 15, 10]).unwrap();
        assert_eq!(raw.dims, DIMS);
        assert_eq!(raw.data, source.tissue.frames[0].data);
        assert!(VoxelBuffer::try_from(raw).unwrap().require_volumetric().is_ok());
    }

    #[test]
    fn test_plane_resample_has_unit_depth() {
        let source = DummySource::new();
        let mut plane = source.bounding_box().unwrap();
        plane.origin += plane.dir3 * 0.5;
        plane.dir3 = Vec3::ZERO;
        let raw = source.frame(3, &plane, [32, 16, 1]).unwrap();
        assert_eq!(raw.dims, [32, 16, 1]);
        assert_eq!(raw.time, frame_time(3, DEFAULT_FRAMES));
    }

    #[test]
    fn test_points_outside_volume_are_black() {
        let source = DummySource::new();
        let mut far = source.bounding_box().unwrap();
        far.origin += Vec3::new(10.0, 10.0, 10.0);
        let raw = source.frame(0, &far, [4, 4, 4]).unwrap();
        assert!(raw.data.iter().all(|&v| v == OUTSIDE_VAL));
    }

    #[test]
    fn test_flow_stream_times_follow_own_frame_count() {
        let source = DummySource::with_frame_counts(25, 10);
        let bbox = source.bounding_box().unwrap();
        let stream = source.stream(1, &bbox, [8, 8, 8]).unwrap();
        assert_eq!(stream.kind(), StreamKind::BloodVelocity);
        assert_eq!(stream.frame_count().unwrap(), 10);
        assert_eq!(stream.frame(0).unwrap().format, SampleFormat::Freq8Pow8);
        assert!(source.stream(2, &bbox, [8, 8, 8]).is_err());
    }

    #[test]
    fn test_arbitration_uses_signed_velocity() {
        let arb = flow_arbitration_map();
        assert_eq!(arb[15], 0x00);
        assert_eq!(arb[16], 0xFF);
        assert_eq!(arb[255], 0x00); // -1
        assert_eq!(arb[240 + 256 * 7], 0xFF); // -16
    }
}
