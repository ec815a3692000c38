//! Color-lookup compositing of extracted planes into RGB images.

use crate::color_map::ArbitrationTable;
use crate::color_map::ColorTable;
use crate::color_map::U8_TABLE_LEN;
use crate::color_map::U16_TABLE_LEN;
use crate::error::ViewerError;

use image::RgbImage;
use ndarray::Array2;
use ndarray::Zip;

fn check_len(name: &str, len: usize, expected: usize) -> Result<(), ViewerError> {
    if len != expected {
        return Err(ViewerError::Composite(format!(
            "{name} table has {len} entries, expected {expected}"
        )));
    }
    Ok(())
}

fn to_image(pixels: Array2<[u8; 3]>) -> Result<RgbImage, ViewerError> {
    let (height, width) = pixels.dim();
    let raw: Vec<u8> = pixels.iter().flatten().copied().collect();
    RgbImage::from_raw(width as u32, height as u32, raw)
        .ok_or_else(|| ViewerError::Composite("pixel buffer size mismatch".into()))
}

/// Map every sample through `table`, discarding alpha.
pub fn map_single_channel(plane: &Array2<u8>, table: &ColorTable) -> Result<RgbImage, ViewerError> {
    check_len("tissue", table.len(), U8_TABLE_LEN)?;
    let pixels = Zip::from(plane).par_map_collect(|&v| table.rgb(v as usize));
    to_image(pixels)
}

/// Composite a tissue plane with a co-registered color-flow plane.
///
/// A pixel takes the flow color when the arbitration threshold of its flow
/// sample is greater than the tissue value, otherwise the tissue color. Both
/// flow tables are indexed by the full 16-bit flow sample.
pub fn map_dual_channel(
    tissue: &Array2<u8>,
    flow: &Array2<u16>,
    tissue_table: &ColorTable,
    flow_table: &ColorTable,
    arbitration: &ArbitrationTable,
) -> Result<RgbImage, ViewerError> {
    check_len("tissue", tissue_table.len(), U8_TABLE_LEN)?;
    check_len("flow", flow_table.len(), U16_TABLE_LEN)?;
    check_len("arbitration", arbitration.len(), U16_TABLE_LEN)?;
    if tissue.dim() != flow.dim() {
        return Err(ViewerError::Composite(format!(
            "tissue plane {:?} and flow plane {:?} differ in size",
            tissue.dim(),
            flow.dim()
        )));
    }

    let pixels = Zip::from(tissue).and(flow).par_map_collect(|&t, &f| {
        let f = f as usize;
        if arbitration.threshold(f) > t {
            flow_table.rgb(f)
        } else {
            tissue_table.rgb(t as usize)
        }
    });
    to_image(pixels)
}
