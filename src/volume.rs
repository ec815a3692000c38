use crate::enums::PlaneAxis;
use crate::enums::SampleFormat;
use crate::error::RejectReason;

use ndarray::Array2;
use ndarray::s;

/// Frame exactly as returned by a volume source, before any validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub dims: [usize; 3],
    pub stride0: usize,
    pub stride1: usize,
    pub format: SampleFormat,
    /// Capture time in seconds
    pub time: f64,
    pub data: Vec<u8>,
}

/// A validated, strided voxel buffer.
///
/// Axis 0 is fastest, axis 1 is reached through `stride0` and axis 2 through
/// `stride1`. Strides are in bytes. The stride and length invariants are
/// checked once in [`VoxelBuffer::new`], so extraction never goes out of
/// bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelBuffer {
    dims: [usize; 3],
    stride0: usize,
    stride1: usize,
    format: SampleFormat,
    time: f64,
    data: Vec<u8>,
}

impl VoxelBuffer {
    pub fn new(
        dims: [usize; 3],
        stride0: usize,
        stride1: usize,
        format: SampleFormat,
        time: f64,
        data: Vec<u8>,
    ) -> Result<Self, RejectReason> {
        if let Some(axis) = dims.iter().position(|&len| len == 0) {
            return Err(RejectReason::DegenerateDimension { axis, len: 0 });
        }

        let bps = format.bytes_per_sample();
        // overflowing sizes can never be backed by a real buffer
        let too_long = || RejectReason::BufferTooShort {
            len: data.len(),
            required: usize::MAX,
        };

        let row = dims[0].checked_mul(bps).ok_or_else(too_long)?;
        if stride0 < row {
            return Err(RejectReason::StrideTooSmall {
                which: 0,
                stride: stride0,
                required: row,
            });
        }
        let slab = row.checked_mul(dims[1]).ok_or_else(too_long)?;
        if stride1 < slab {
            return Err(RejectReason::StrideTooSmall {
                which: 1,
                stride: stride1,
                required: slab,
            });
        }

        // address of the last sample plus its width
        let required = (dims[1] - 1)
            .checked_mul(stride0)
            .zip((dims[2] - 1).checked_mul(stride1))
            .and_then(|(y, z)| y.checked_add(z))
            .and_then(|offset| offset.checked_add(row))
            .ok_or_else(too_long)?;
        if data.len() < required {
            return Err(RejectReason::BufferTooShort {
                len: data.len(),
                required,
            });
        }

        Ok(Self {
            dims,
            stride0,
            stride1,
            format,
            time,
            data,
        })
    }

    /// Buffer with tightly packed rows and slabs.
    pub fn packed(
        dims: [usize; 3],
        format: SampleFormat,
        time: f64,
        data: Vec<u8>,
    ) -> Result<Self, RejectReason> {
        let stride0 = dims[0] * format.bytes_per_sample();
        let stride1 = stride0 * dims[1];
        Self::new(dims, stride0, stride1, format, time, data)
    }

    /// Full-volume loads need at least two samples along every axis.
    pub fn require_volumetric(&self) -> Result<(), RejectReason> {
        match self.dims.iter().position(|&len| len <= 1) {
            Some(axis) => Err(RejectReason::DegenerateDimension {
                axis,
                len: self.dims[axis],
            }),
            None => Ok(()),
        }
    }

    /// Plane fetches need at least two samples along both in-plane axes.
    pub fn require_plane(&self) -> Result<(), RejectReason> {
        match self.dims[..2].iter().position(|&len| len <= 1) {
            Some(axis) => Err(RejectReason::DegenerateDimension {
                axis,
                len: self.dims[axis],
            }),
            None => Ok(()),
        }
    }

    /// Get the dimensions of the buffer (axis 0, axis 1, axis 2)
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn strides(&self) -> (usize, usize) {
        (self.stride0, self.stride1)
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Capture timestamp in seconds
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Real-world offset of voxel `index` along `axis` for an axis `extent` long.
    pub fn position_along(&self, axis: usize, index: usize, extent: f32) -> f32 {
        let len = self.dims[axis];
        if len <= 1 {
            return 0.0;
        }
        extent * index as f32 / (len - 1) as f32
    }

    fn is_valid_index(&self, index: usize, axis: PlaneAxis) -> bool {
        index < self.dims[axis.depth_axis()]
    }

    /// Width and height of the view extracted for `axis`.
    pub fn plane_dims(&self, axis: PlaneAxis) -> (usize, usize) {
        match axis {
            PlaneAxis::XY => (self.dims[0], self.dims[1]),
            PlaneAxis::XZ => (self.dims[0], self.dims[2]),
            PlaneAxis::ZY => (self.dims[1], self.dims[2]),
        }
    }
}

impl TryFrom<RawFrame> for VoxelBuffer {
    type Error = RejectReason;

    fn try_from(raw: RawFrame) -> Result<Self, Self::Error> {
        Self::new(
            raw.dims,
            raw.stride0,
            raw.stride1,
            raw.format,
            raw.time,
            raw.data,
        )
    }
}

/// Element type that can be decoded from a voxel buffer.
pub trait Sample: Copy + Default + Send + Sync + 'static {
    const FORMAT: SampleFormat;

    fn read(bytes: &[u8]) -> Self;
}

impl Sample for u8 {
    const FORMAT: SampleFormat = SampleFormat::U8;

    #[inline]
    fn read(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl Sample for u16 {
    const FORMAT: SampleFormat = SampleFormat::Freq8Pow8;

    /// Low byte frequency, high byte power
    #[inline]
    fn read(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
}

/// Extract a dense `(height, width)` plane at depth `index` along the axis
/// held constant by `axis`.
///
/// Returns `None` when the index is outside the buffer or the sample type
/// does not match the buffer format.
///
/// * `XY` (constant z): a single contiguous run starting at `z * stride1`
/// * `XZ` (constant y): one contiguous row per z at `z * stride1 + y * stride0`
/// * `ZY` (constant x): one sample at a time at `x + y * stride0 + z * stride1`
pub fn extract_plane<T: Sample>(
    buffer: &VoxelBuffer,
    axis: PlaneAxis,
    index: usize,
) -> Option<Array2<T>> {
    if buffer.format != T::FORMAT || !buffer.is_valid_index(index, axis) {
        return None;
    }

    let bps = buffer.format.bytes_per_sample();
    let [_, dim1, dim2] = buffer.dims;
    let (stride0, stride1) = (buffer.stride0, buffer.stride1);
    let data = &buffer.data;
    let (width, height) = buffer.plane_dims(axis);
    let row_bytes = width * bps;

    let samples: Vec<T> = match axis {
        PlaneAxis::XY => {
            let start = index * stride1;
            let run = &data[start..start + stride0 * (dim1 - 1) + row_bytes];
            if stride0 == row_bytes {
                run.chunks_exact(bps).map(T::read).collect()
            } else {
                run.chunks(stride0)
                    .flat_map(|row| row[..row_bytes].chunks_exact(bps).map(T::read))
                    .collect()
            }
        }
        PlaneAxis::XZ => (0..dim2)
            .flat_map(|z| {
                let start = z * stride1 + index * stride0;
                data[start..start + row_bytes].chunks_exact(bps).map(T::read)
            })
            .collect(),
        PlaneAxis::ZY => {
            let mut samples = Vec::with_capacity(dim1 * dim2);
            for z in 0..dim2 {
                for y in 0..dim1 {
                    let address = index * bps + y * stride0 + z * stride1;
                    samples.push(T::read(&data[address..address + bps]));
                }
            }
            samples
        }
    };

    Array2::from_shape_vec((height, width), samples).ok()
}

/// Mirror a plane along its slow (row) axis.
pub fn flip_vertical<T: Clone>(plane: &Array2<T>) -> Array2<T> {
    plane.slice(s![..;-1, ..]).to_owned()
}
