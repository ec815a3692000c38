//! # image3d-slicer
//!
//! This crate turns a time-varying 3D recording into the three orthogonal
//! cross-sections a viewer displays: XY, XZ and ZY.
//!
//! Recordings are supplied through the [`VolumeSource`] trait. The session
//! derives three plane requests from the source's oriented bounding box,
//! fetches strided voxel buffers for them, extracts dense planes and maps
//! them to RGB with the source's color tables. A co-registered color-flow
//! stream is composited over the tissue image wherever its arbitration
//! threshold beats the tissue brightness. Streams with independent frame
//! times are matched by nearest frame time, and playback can be driven by
//! an ECG trace.
//!
//! The crate also supports:
//!  - Whole-volume fetches with a voxel cursor, optionally preloaded
//!  - A synthetic [`DummySource`] for tests and demos
//!  - JSON session configuration
//!
//! # Examples
//!
//! ## Rendering the planes of a frame
//!
//! ```no_run
//! # use image3d_slicer::{DummySource, Session, SessionConfig};
//! let mut session = Session::open(Box::new(DummySource::new()), SessionConfig::default())
//!     .expect("should have loaded the dummy source");
//! let set = session
//!     .render_planes(0)
//!     .expect("should have rendered the first frame");
//! set.planes[0].image.save("xy.png").expect("should have saved the image");
//! ```
//!
//! [`VolumeSource`]: crate::source::VolumeSource
//! [`DummySource`]: crate::dummy_source::DummySource

pub mod color_map;
pub mod compositor;
pub mod config;
pub mod dummy_source;
pub mod ecg;
pub mod enums;
pub mod error;
pub mod geometry;
pub mod session;
pub mod source;
pub mod sync;
pub mod volume;
pub mod volume_loader;

pub use config::SessionConfig;
pub use dummy_source::DummySource;
pub use enums::PlaneAxis;
pub use error::ViewerError;
pub use session::Session;
pub use source::VolumeSource;
