use approx::assert_relative_eq;
use glam::Vec3;

use image3d_slicer::color_map::U16_TABLE_LEN;
use image3d_slicer::enums::{ColorMapKind, SampleFormat, StreamKind, TableFormat};
use image3d_slicer::error::RejectReason;
use image3d_slicer::geometry::OrientedBox;
use image3d_slicer::source::{ImageStream, ProbeInfo, SourceError};
use image3d_slicer::sync::Playback;
use image3d_slicer::volume::RawFrame;
use image3d_slicer::volume_loader::VolumeLoader;
use image3d_slicer::{DummySource, PlaneAxis, Session, SessionConfig, ViewerError, VolumeSource};

fn unit_box() -> OrientedBox {
    OrientedBox::new(Vec3::ZERO, Vec3::X * 0.1, Vec3::Y * 0.1, Vec3::Z * 0.1)
}

/// Output dims for a resampling request: 1 along zeroed axes.
fn request_dims(geometry: &OrientedBox, max_resolution: [u16; 3]) -> [usize; 3] {
    let dirs = geometry.dirs();
    std::array::from_fn(|i| {
        if dirs[i] == Vec3::ZERO {
            1
        } else {
            usize::from(max_resolution[i])
        }
    })
}

fn packed(dims: [usize; 3], format: SampleFormat, time: f64, data: Vec<u8>) -> RawFrame {
    let bps = format.bytes_per_sample();
    RawFrame {
        dims,
        stride0: dims[0] * bps,
        stride1: dims[0] * dims[1] * bps,
        format,
        time,
        data,
    }
}

#[derive(Clone)]
struct MockFlow {
    times: Vec<f64>,
    freq: u8,
    power: u8,
}

struct MockFlowStream {
    flow: MockFlow,
    dims: [usize; 3],
}

impl ImageStream for MockFlowStream {
    fn kind(&self) -> StreamKind {
        StreamKind::BloodVelocity
    }

    fn frame_count(&self) -> Result<usize, SourceError> {
        Ok(self.flow.times.len())
    }

    fn frame_times(&self) -> Result<Vec<f64>, SourceError> {
        Ok(self.flow.times.clone())
    }

    fn frame(&self, index: usize) -> Result<RawFrame, SourceError> {
        let time = *self.flow.times.get(index).ok_or(SourceError::OutOfBounds {
            index,
            count: self.flow.times.len(),
        })?;
        let count = self.dims.iter().product::<usize>();
        let data = [self.flow.freq, self.flow.power].repeat(count);
        Ok(packed(self.dims, SampleFormat::Freq8Pow8, time, data))
    }
}

/// Scripted source: constant tissue value (or a ramp along axis 1), optional
/// flow stream with constant samples.
struct MockSource {
    bbox: OrientedBox,
    frame_count: usize,
    times: Vec<f64>,
    fixed_dims: Option<[usize; 3]>,
    tissue: u8,
    ramp: bool,
    flow: Option<MockFlow>,
    broken: bool,
    uid: &'static str,
}

impl Default for MockSource {
    fn default() -> Self {
        Self {
            bbox: unit_box(),
            frame_count: 3,
            times: vec![0.0, 1.0, 2.0],
            fixed_dims: None,
            tissue: 100,
            ramp: false,
            flow: None,
            broken: false,
            uid: "MOCK",
        }
    }
}

impl VolumeSource for MockSource {
    fn bounding_box(&self) -> Result<OrientedBox, SourceError> {
        if self.broken {
            return Err(SourceError::Backend("activation failed".into()));
        }
        Ok(self.bbox)
    }

    fn frame_count(&self) -> Result<usize, SourceError> {
        Ok(self.frame_count)
    }

    fn frame_times(&self) -> Result<Vec<f64>, SourceError> {
        Ok(self.times.clone())
    }

    fn frame(
        &self,
        index: usize,
        geometry: &OrientedBox,
        max_resolution: [u16; 3],
    ) -> Result<RawFrame, SourceError> {
        let dims = self
            .fixed_dims
            .unwrap_or_else(|| request_dims(geometry, max_resolution));
        let mut data = vec![self.tissue; dims.iter().product()];
        if self.ramp {
            for (i, v) in data.iter_mut().enumerate() {
                *v = ((i / dims[0]) % dims[1]) as u8;
            }
        }
        let time = self.times.get(index).copied().unwrap_or_default();
        Ok(packed(dims, SampleFormat::U8, time, data))
    }

    fn color_map(&self, kind: ColorMapKind) -> Result<(Vec<u8>, TableFormat), SourceError> {
        Ok(match kind {
            ColorMapKind::TissueColor => (
                (0..=255u8).flat_map(|v| [v, v, v, 0xFF]).collect(),
                TableFormat::R8G8B8A8,
            ),
            // red = frequency byte, green = power byte
            ColorMapKind::FlowColor => (
                (0..U16_TABLE_LEN)
                    .flat_map(|i| [(i & 0xFF) as u8, (i >> 8) as u8, 7, 0xFF])
                    .collect(),
                TableFormat::R8G8B8A8,
            ),
            // threshold = frequency byte
            ColorMapKind::FlowArbitration => (
                (0..U16_TABLE_LEN).map(|i| (i & 0xFF) as u8).collect(),
                TableFormat::U8,
            ),
        })
    }

    fn stream_count(&self) -> Result<usize, SourceError> {
        Ok(usize::from(self.flow.is_some()))
    }

    fn stream(
        &self,
        index: usize,
        geometry: &OrientedBox,
        max_resolution: [u16; 3],
    ) -> Result<Box<dyn ImageStream>, SourceError> {
        let flow = self
            .flow
            .clone()
            .filter(|_| index == 0)
            .ok_or(SourceError::OutOfBounds { index, count: 1 })?;
        Ok(Box::new(MockFlowStream {
            flow,
            dims: request_dims(geometry, max_resolution),
        }))
    }

    fn probe_info(&self) -> Result<ProbeInfo, SourceError> {
        Ok(ProbeInfo {
            name: "mock".into(),
            ..ProbeInfo::default()
        })
    }

    fn sop_instance_uid(&self) -> Result<String, SourceError> {
        Ok(self.uid.into())
    }
}

fn small_config() -> SessionConfig {
    SessionConfig {
        plane_resolution: [16, 8],
        volume_resolution: [12, 10, 8],
        ..SessionConfig::default()
    }
}

#[test]
fn ten_equally_spaced_frames_play_at_ten_hertz() {
    let source = MockSource {
        frame_count: 10,
        times: (0..10).map(|i| i as f64 * 0.1).collect(),
        ..MockSource::default()
    };
    let session = Session::open(Box::new(source), small_config()).unwrap();
    let timeline = session.timeline();
    assert_relative_eq!(timeline.frame_rate().unwrap(), 10.0, epsilon = 1e-6);
    assert_relative_eq!(timeline.loop_duration().unwrap(), 1.0, epsilon = 0.1);
}

#[test]
fn degenerate_frame_dims_reject_the_load() {
    let source = MockSource {
        fixed_dims: Some([1, 5, 5]),
        ..MockSource::default()
    };
    assert!(matches!(
        VolumeLoader::load_volume_frame(&source, &unit_box(), [5, 5, 5], 0),
        Err(ViewerError::LoadRejected(RejectReason::DegenerateDimension { axis: 0, len: 1 }))
    ));
    assert!(matches!(
        Session::open(Box::new(source), small_config()),
        Err(ViewerError::LoadRejected(RejectReason::DegenerateDimension { axis: 0, .. }))
    ));
}

#[test]
fn zero_length_axis_rejects_the_load() {
    let mut bbox = unit_box();
    bbox.dir2 = Vec3::ZERO;
    let source = MockSource {
        bbox,
        ..MockSource::default()
    };
    assert!(matches!(
        Session::open(Box::new(source), small_config()),
        Err(ViewerError::LoadRejected(RejectReason::NonPositiveAxis { axis: 1, .. }))
    ));
}

#[test]
fn failed_reload_keeps_previous_state() {
    let mut session = Session::open(Box::new(DummySource::new()), small_config()).unwrap();
    session.render_planes(5).unwrap();

    let broken = MockSource {
        broken: true,
        ..MockSource::default()
    };
    assert!(matches!(
        session.replace_source(Box::new(broken)),
        Err(ViewerError::SourceUnavailable(_))
    ));

    let degenerate = MockSource {
        fixed_dims: Some([4, 1, 1]),
        ..MockSource::default()
    };
    assert!(session.replace_source(Box::new(degenerate)).is_err());

    let summary = session.summary();
    assert_eq!(summary.sop_instance_uid, "DUMMY_UID");
    assert_eq!(summary.frame_count, 25);
    assert_eq!(session.position(), 5);
    assert_eq!(session.render_planes(6).unwrap().selection.reference, 6);
}

#[test]
fn successful_reload_clears_previous_state() {
    let mut session = Session::open(Box::new(DummySource::new()), small_config()).unwrap();
    session.render_planes(5).unwrap();
    session.replace_source(Box::new(MockSource::default())).unwrap();

    let summary = session.summary();
    assert_eq!(summary.sop_instance_uid, "MOCK");
    assert!(!summary.has_flow);
    assert!(!summary.has_ecg);
    assert_eq!(session.position(), 0);
    assert!(session.seek_ecg(10).unwrap().is_none());
}

#[test]
fn flow_color_wins_only_above_tissue() {
    let strong = MockSource {
        flow: Some(MockFlow {
            times: vec![0.0, 1.0, 2.0],
            freq: 150,
            power: 3,
        }),
        ..MockSource::default()
    };
    let mut session = Session::open(Box::new(strong), small_config()).unwrap();
    let set = session.render_planes(0).unwrap();
    for plane in &set.planes {
        assert!(plane.flow);
        assert!(plane.image.pixels().all(|p| p.0 == [150, 3, 7]));
    }

    let weak = MockSource {
        flow: Some(MockFlow {
            times: vec![0.0, 1.0, 2.0],
            freq: 100,
            power: 3,
        }),
        ..MockSource::default()
    };
    let mut session = Session::open(Box::new(weak), small_config()).unwrap();
    let set = session.render_planes(0).unwrap();
    for plane in &set.planes {
        assert!(plane.image.pixels().all(|p| p.0 == [100, 100, 100]));
    }
}

#[test]
fn flow_frames_are_matched_by_time() {
    let source = MockSource {
        flow: Some(MockFlow {
            times: vec![0.1, 0.9, 2.5],
            freq: 150,
            power: 0,
        }),
        ..MockSource::default()
    };
    let mut session = Session::open(Box::new(source), small_config()).unwrap();
    assert_eq!(session.render_planes(1).unwrap().selection.secondary, vec![Some(1)]);
    assert_eq!(session.render_planes(2).unwrap().selection.secondary, vec![Some(2)]);
}

#[test]
fn empty_flow_stream_disables_overlay() {
    let source = MockSource {
        flow: Some(MockFlow {
            times: vec![],
            freq: 150,
            power: 0,
        }),
        ..MockSource::default()
    };
    let mut session = Session::open(Box::new(source), small_config()).unwrap();
    assert!(!session.summary().has_flow);
    assert!(session.render_planes(0).unwrap().planes.iter().all(|p| !p.flow));
}

#[test]
fn inconsistent_timing_shows_first_frame_only() {
    let source = MockSource {
        frame_count: 5,
        ..MockSource::default()
    };
    let mut session = Session::open(Box::new(source), small_config()).unwrap();
    assert_eq!(session.summary().playback, Playback::Still);
    assert_eq!(session.render_planes(4).unwrap().selection.reference, 0);
    assert!(session.set_frame_rate(30.0).is_ok());
    assert_eq!(session.timeline().playback(), Playback::Still);
}

#[test]
fn only_xy_plane_is_flipped() {
    let source = MockSource {
        ramp: true,
        ..MockSource::default()
    };
    let mut session = Session::open(Box::new(source), small_config()).unwrap();
    let set = session.render_planes(0).unwrap();

    let xy = &set.planes[0];
    assert_eq!(xy.axis, PlaneAxis::XY);
    assert_eq!(xy.image.get_pixel(0, 0).0, [7, 7, 7]);
    assert_eq!(xy.image.get_pixel(0, 7).0, [0, 0, 0]);

    let xz = &set.planes[1];
    assert_eq!(xz.image.get_pixel(0, 0).0, [0, 0, 0]);
    assert_eq!(xz.image.get_pixel(0, 7).0, [7, 7, 7]);
}

#[test]
fn dummy_source_end_to_end() {
    let config = SessionConfig {
        preload_frames: true,
        ..small_config()
    };
    let mut session = Session::open(Box::new(DummySource::new()), config).unwrap();
    let summary = session.summary();
    assert!(summary.has_flow);
    assert!(summary.has_ecg);
    assert_eq!(summary.probe.name, "4V");
    assert_eq!(session.preloaded_frames(), 25);

    let set = session.render_planes(0).unwrap();
    assert_relative_eq!(set.time.unwrap(), 10.0);
    assert!(set.planes.iter().all(|p| p.flow));
    assert_relative_eq!(session.ecg_cursor().unwrap(), 0.0);

    session.render_planes(24).unwrap();
    assert_relative_eq!(session.ecg_cursor().unwrap(), 0.96, epsilon = 1e-9);

    let slice = session.render_volume_slice(3, PlaneAxis::XZ, 0).unwrap();
    assert_eq!(slice.image.dimensions(), (12, 8));
    assert_relative_eq!(slice.distance, 0.0);
}

#[test]
fn frame_rate_override_is_bounded() {
    let mut session = Session::open(Box::new(DummySource::new()), small_config()).unwrap();
    assert_relative_eq!(session.timeline().frame_rate().unwrap(), 25.0, epsilon = 1e-6);
    session.set_frame_rate(50.0).unwrap();
    assert_relative_eq!(session.timeline().loop_duration().unwrap(), 0.5);
    assert!(matches!(
        session.set_frame_rate(120.0),
        Err(ViewerError::FrameTimingInvalid(_))
    ));
}
