//! Bounding-box geometry and derivation of the three orthogonal plane requests.
//!
//! A volume is positioned in real-world coordinates (meters) by an
//! [`OrientedBox`]: an origin corner plus three basis vectors spanning a
//! parallelepiped. Plane requests are boxes with one basis vector zeroed,
//! positioned at the volumetric mid-point along the removed axis.

use glam::Vec3;

use crate::enums::PlaneAxis;
use crate::error::RejectReason;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrientedBox {
    pub origin: Vec3,
    pub dir1: Vec3,
    pub dir2: Vec3,
    pub dir3: Vec3,
}

impl OrientedBox {
    pub fn new(origin: Vec3, dir1: Vec3, dir2: Vec3, dir3: Vec3) -> Self {
        Self {
            origin,
            dir1,
            dir2,
            dir3,
        }
    }

    pub fn dirs(&self) -> [Vec3; 3] {
        [self.dir1, self.dir2, self.dir3]
    }

    /// Euclidean length of each basis vector.
    pub fn axis_lengths(&self) -> [f32; 3] {
        [self.dir1.length(), self.dir2.length(), self.dir3.length()]
    }

    /// Center of the parallelepiped.
    pub fn centroid(&self) -> Vec3 {
        self.origin + (self.dir1 + self.dir2 + self.dir3) * 0.5
    }

    /// Number of basis vectors equal to the zero vector.
    pub fn zeroed_axes(&self) -> usize {
        self.dirs().iter().filter(|d| **d == Vec3::ZERO).count()
    }

    /// Reject boxes that cannot be sliced: every axis must have positive length.
    pub fn validate(&self) -> Result<(), RejectReason> {
        for (axis, length) in self.axis_lengths().into_iter().enumerate() {
            if !(length > 0.0) {
                return Err(RejectReason::NonPositiveAxis { axis, length });
            }
        }
        Ok(())
    }

    /// On-screen size of each axis when the longest axis is drawn `max_extent`
    /// pixels long, preserving real-world aspect ratios.
    pub fn display_extents(&self, max_extent: f32) -> [f32; 3] {
        let lengths = self.axis_lengths();
        let longest = lengths.iter().copied().fold(0.0_f32, f32::max);
        if longest <= 0.0 {
            return [0.0; 3];
        }
        lengths.map(|len| max_extent * len / longest)
    }
}

/// Swap the 2nd and 3rd basis vectors when the 3rd is more vertical, so that
/// the 2nd axis is predominantly "Y".
pub fn disambiguate_axes(bbox: &OrientedBox) -> OrientedBox {
    let mut out = *bbox;
    if bbox.dir3.y.abs() > bbox.dir2.y.abs() {
        std::mem::swap(&mut out.dir2, &mut out.dir3);
    }
    out
}

/// Scale every basis vector up to the length of the longest one, moving the
/// origin so the box stays centered.
///
/// Zero-length vectors have no direction and are left untouched.
pub fn extend_to_isotropic(bbox: &OrientedBox) -> OrientedBox {
    let lengths = bbox.axis_lengths();
    let max_len = lengths.iter().copied().fold(0.0_f32, f32::max);

    let mut out = *bbox;
    for (dir, len) in [&mut out.dir1, &mut out.dir2, &mut out.dir3]
        .into_iter()
        .zip(lengths)
    {
        if len < max_len && len > 0.0 {
            let added = dir.normalize_or_zero() * (max_len - len);
            *dir += added;
            out.origin -= added * 0.5;
        }
    }
    out
}

/// A 2D plane embedded in 3D plus the pixel resolution to sample it at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneRequest {
    pub geometry: OrientedBox,
    /// Requested resolution per axis, 1 for the zeroed axis.
    pub resolution: [u16; 3],
}

impl PlaneRequest {
    /// Build a request from a plane geometry, checking that exactly one basis
    /// vector is zero.
    pub fn new(geometry: OrientedBox, width: u16, height: u16) -> Result<Self, RejectReason> {
        let zeroed = geometry.zeroed_axes();
        if zeroed != 1 {
            return Err(RejectReason::NotAPlane { zeroed });
        }

        let mut resolution = [width.max(1), height.max(1), 1];
        if geometry.dir1 == Vec3::ZERO {
            resolution = [1, width.max(1), height.max(1)];
        } else if geometry.dir2 == Vec3::ZERO {
            resolution = [width.max(1), 1, height.max(1)];
        }

        Ok(Self {
            geometry,
            resolution,
        })
    }

    pub fn width(&self) -> u16 {
        self.in_plane_resolution().0
    }

    pub fn height(&self) -> u16 {
        self.in_plane_resolution().1
    }

    fn in_plane_resolution(&self) -> (u16, u16) {
        let [a, b, c] = self.resolution;
        if self.geometry.dir1 == Vec3::ZERO {
            (b, c)
        } else if self.geometry.dir2 == Vec3::ZERO {
            (a, c)
        } else {
            (a, b)
        }
    }
}

/// Derive the plane geometry for `axis` from a prepared box.
///
/// The plane is placed half-way along the removed axis. The removed axis'
/// vector is taken from `bbox` before any slot is overwritten.
pub fn derive_plane_geometry(bbox: &OrientedBox, axis: PlaneAxis) -> OrientedBox {
    let mut plane = *bbox;
    match axis {
        PlaneAxis::XY => {
            plane.origin += bbox.dir3 * 0.5;
        }
        PlaneAxis::XZ => {
            plane.origin += bbox.dir2 * 0.5;
            plane.dir2 = bbox.dir3;
        }
        PlaneAxis::ZY => {
            plane.origin += bbox.dir1 * 0.5;
            plane.dir1 = bbox.dir3;
            plane.dir2 = bbox.dir2;
        }
    }
    plane.dir3 = Vec3::ZERO;
    plane
}

/// Derive one plane request at `width` x `height` pixels.
pub fn derive_plane(
    bbox: &OrientedBox,
    axis: PlaneAxis,
    width: u16,
    height: u16,
) -> Result<PlaneRequest, RejectReason> {
    PlaneRequest::new(derive_plane_geometry(bbox, axis), width, height)
}

/// Derive the XY, XZ and ZY plane requests from a raw source bounding box.
///
/// All three come from the same disambiguated, isotropically extended box so
/// their cross-sections share edge lengths.
pub fn derive_planes(
    bbox: &OrientedBox,
    width: u16,
    height: u16,
) -> Result<[PlaneRequest; 3], RejectReason> {
    bbox.validate()?;
    let prepared = extend_to_isotropic(&disambiguate_axes(bbox));
    Ok([
        derive_plane(&prepared, PlaneAxis::XY, width, height)?,
        derive_plane(&prepared, PlaneAxis::XZ, width, height)?,
        derive_plane(&prepared, PlaneAxis::ZY, width, height)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn skewed_box() -> OrientedBox {
        OrientedBox::new(
            Vec3::new(-0.1, 0.0, -0.075),
            Vec3::new(0.20, 0.0, 0.01),
            Vec3::new(0.0, 0.01, 0.15),
            Vec3::new(0.02, 0.10, 0.0),
        )
    }

    #[test]
    fn test_disambiguate_swaps_vertical_axis_into_second_slot() {
        let bbox = skewed_box();
        let out = disambiguate_axes(&bbox);
        assert_eq!(out.dir2, bbox.dir3);
        assert_eq!(out.dir3, bbox.dir2);
        assert_eq!(out.dir1, bbox.dir1);
        assert_eq!(out.origin, bbox.origin);

        // already canonical: unchanged
        assert_eq!(disambiguate_axes(&out), out);
    }

    #[test]
    fn test_isotropic_extension_equalizes_and_keeps_centroid() {
        let bbox = skewed_box();
        let out = extend_to_isotropic(&bbox);
        let [a, b, c] = out.axis_lengths();
        let max_in = bbox.axis_lengths().into_iter().fold(0.0_f32, f32::max);
        assert_relative_eq!(a, max_in, epsilon = 1e-6);
        assert_relative_eq!(b, max_in, epsilon = 1e-6);
        assert_relative_eq!(c, max_in, epsilon = 1e-6);

        let before = bbox.centroid();
        let after = out.centroid();
        assert_relative_eq!(before.x, after.x, epsilon = 1e-6);
        assert_relative_eq!(before.y, after.y, epsilon = 1e-6);
        assert_relative_eq!(before.z, after.z, epsilon = 1e-6);
    }

    #[test]
    fn test_isotropic_extension_preserves_directions() {
        let bbox = skewed_box();
        let out = extend_to_isotropic(&bbox);
        for (src, dst) in bbox.dirs().iter().zip(out.dirs()) {
            assert_relative_eq!(src.normalize().dot(dst.normalize()), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_derived_planes_share_edge_lengths() {
        let planes = derive_planes(&skewed_box(), 256, 256).unwrap();
        let [xy, xz, zy] = planes.map(|p| p.geometry);

        for plane in [xy, xz, zy] {
            assert_eq!(plane.dir3, Vec3::ZERO);
        }
        // XY & XZ share X, XY & ZY share Y, XZ & ZY share Z
        assert_relative_eq!(xy.dir1.length(), xz.dir1.length(), epsilon = 1e-6);
        assert_relative_eq!(xy.dir2.length(), zy.dir2.length(), epsilon = 1e-6);
        assert_relative_eq!(xz.dir2.length(), zy.dir1.length(), epsilon = 1e-6);
    }

    #[test]
    fn test_planes_sit_at_volumetric_midpoint() {
        let bbox = OrientedBox::new(
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        );
        let xy = derive_plane_geometry(&bbox, PlaneAxis::XY);
        assert_eq!(xy.origin, Vec3::new(0.0, 0.0, 0.5));
        assert_eq!(xy.dir1, bbox.dir1);
        assert_eq!(xy.dir2, bbox.dir2);

        let xz = derive_plane_geometry(&bbox, PlaneAxis::XZ);
        assert_eq!(xz.origin, Vec3::new(0.0, 0.5, 0.0));
        assert_eq!(xz.dir2, bbox.dir3);

        let zy = derive_plane_geometry(&bbox, PlaneAxis::ZY);
        assert_eq!(zy.origin, Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(zy.dir1, bbox.dir3);
        assert_eq!(zy.dir2, bbox.dir2);
    }

    #[test]
    fn test_plane_request_requires_exactly_one_zero_axis() {
        let bbox = skewed_box();
        assert_eq!(
            PlaneRequest::new(bbox, 10, 10),
            Err(RejectReason::NotAPlane { zeroed: 0 })
        );

        let request = derive_plane(&bbox, PlaneAxis::XY, 64, 32).unwrap();
        assert_eq!(request.resolution, [64, 32, 1]);
        assert_eq!((request.width(), request.height()), (64, 32));

        let mut side = bbox;
        side.dir1 = Vec3::ZERO;
        let request = PlaneRequest::new(side, 8, 4).unwrap();
        assert_eq!(request.resolution, [1, 8, 4]);
        assert_eq!((request.width(), request.height()), (8, 4));
    }

    #[test]
    fn test_zero_axis_box_is_rejected() {
        let mut bbox = skewed_box();
        bbox.dir2 = Vec3::ZERO;
        assert_eq!(
            derive_planes(&bbox, 16, 16),
            Err(RejectReason::NonPositiveAxis {
                axis: 1,
                length: 0.0
            })
        );
    }

    #[test]
    fn test_display_extents_scale_longest_axis() {
        let extents = skewed_box().display_extents(300.0);
        let longest = extents.iter().copied().fold(0.0_f32, f32::max);
        assert_relative_eq!(longest, 300.0, epsilon = 1e-4);
    }
}
