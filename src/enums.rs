/// The three orthogonal views derived from a bounding box, named after the
/// two in-plane axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneAxis {
    /// Constant depth along the 3rd axis ("Z-depth" plane)
    XY,
    /// Constant depth along the 2nd axis ("Y-depth" plane)
    XZ,
    /// Constant depth along the 1st axis ("X-depth" plane)
    ZY,
}

impl PlaneAxis {
    pub const ALL: [PlaneAxis; 3] = [PlaneAxis::XY, PlaneAxis::XZ, PlaneAxis::ZY];

    /// Index of the voxel-buffer axis held constant for this view.
    pub fn depth_axis(self) -> usize {
        match self {
            PlaneAxis::XY => 2,
            PlaneAxis::XZ => 1,
            PlaneAxis::ZY => 0,
        }
    }

    /// Whether the view is mirrored along its slow axis before display.
    ///
    /// Only the XY view is flipped so that "up" matches the real-world Y axis;
    /// the XZ and ZY views are presented as extracted.
    pub fn flips_vertically(self) -> bool {
        matches!(self, PlaneAxis::XY)
    }
}

/// Sample layout of a voxel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 8-bit scalar (tissue)
    U8,
    /// 16-bit packed color-flow sample: low byte frequency, high byte power/bandwidth
    Freq8Pow8,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::Freq8Pow8 => 2,
        }
    }
}

/// Format tag returned alongside a color map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// 4 bytes per entry, red, green, blue, alpha
    R8G8B8A8,
    /// 1 byte per entry
    U8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMapKind {
    TissueColor,
    FlowColor,
    FlowArbitration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Tissue,
    BloodVelocity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeType {
    #[default]
    External,
    Internal,
}
