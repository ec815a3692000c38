//! Fixed-format lookup tables handed out by a volume source.

use crate::enums::ColorMapKind;
use crate::enums::TableFormat;
use crate::error::RejectReason;

/// Entries in a table indexed by an 8-bit sample.
pub const U8_TABLE_LEN: usize = 256;
/// Entries in a table indexed by a 16-bit color-flow sample.
pub const U16_TABLE_LEN: usize = 256 * 256;

fn kind_name(kind: ColorMapKind) -> &'static str {
    match kind {
        ColorMapKind::TissueColor => "tissue",
        ColorMapKind::FlowColor => "flow",
        ColorMapKind::FlowArbitration => "arbitration",
    }
}

/// Packed RGBA lookup table. Only red, green and blue are ever read.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTable {
    entries: Vec<[u8; 4]>,
}

impl ColorTable {
    /// Decode a `(bytes, format)` pair returned by a source. Tissue maps hold
    /// 256 entries, flow maps 65536.
    pub fn from_bytes(
        kind: ColorMapKind,
        bytes: &[u8],
        format: TableFormat,
    ) -> Result<Self, RejectReason> {
        // tissue is indexed by an 8-bit sample, flow by the full 16-bit sample
        let entries_expected = if kind == ColorMapKind::TissueColor {
            U8_TABLE_LEN
        } else {
            U16_TABLE_LEN
        };
        let expected = entries_expected * 4;
        let bad = || RejectReason::BadColorTable {
            kind: kind_name(kind),
            len: bytes.len(),
            expected,
        };

        if format != TableFormat::R8G8B8A8 {
            return Err(bad());
        }
        let entries: &[[u8; 4]] = bytemuck::try_cast_slice(bytes).map_err(|_| bad())?;
        if entries.len() != entries_expected {
            return Err(bad());
        }

        Ok(Self {
            entries: entries.to_vec(),
        })
    }

    pub fn from_entries(entries: Vec<[u8; 4]>) -> Self {
        Self { entries }
    }

    /// Identity gray ramp, used when a source has no tissue map.
    pub fn grayscale() -> Self {
        let entries = (0..U8_TABLE_LEN)
            .map(|i| {
                let v = i as u8;
                [v, v, v, 0xFF]
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn rgb(&self, index: usize) -> [u8; 3] {
        let [r, g, b, _] = self.entries[index];
        [r, g, b]
    }
}

/// Per-sample priority threshold deciding between flow and tissue color.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrationTable {
    thresholds: Vec<u8>,
}

impl ArbitrationTable {
    pub fn from_bytes(bytes: &[u8], format: TableFormat) -> Result<Self, RejectReason> {
        if format != TableFormat::U8 || bytes.len() != U16_TABLE_LEN {
            return Err(RejectReason::BadColorTable {
                kind: kind_name(ColorMapKind::FlowArbitration),
                len: bytes.len(),
                expected: U16_TABLE_LEN,
            });
        }
        Ok(Self {
            thresholds: bytes.to_vec(),
        })
    }

    pub fn from_thresholds(thresholds: Vec<u8>) -> Self {
        Self { thresholds }
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    #[inline]
    pub fn threshold(&self, index: usize) -> u8 {
        self.thresholds[index]
    }
}
