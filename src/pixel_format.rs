use crate::plane_decs::*;
use std::fmt;

/// Supported pixel formats
///
/// All formats carry 10 bits per sample with 4:2:0 sub sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PixelFormat {
    /// Y and interleaved UV planes, three samples packed into 4 bytes
    Tp10,

    /// Y plane of a [`PixelFormat::Tp10`] image
    Tp10Y,

    /// Interleaved UV plane of a [`PixelFormat::Tp10`] image
    Tp10Uv,

    /// Alternate device encoding of [`PixelFormat::Tp10`], not host accessible
    CompressedTp10,

    /// Y plane of a [`PixelFormat::CompressedTp10`] image
    CompressedTp10Y,

    /// Interleaved UV plane of a [`PixelFormat::CompressedTp10`] image
    CompressedTp10Uv,
}

/// Selects which part of a parent image a view projects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneSelector {
    Full,
    Y,
    Uv,
}

/// A plane was requested from a format which doesn't have it
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("pixel format {format} has no {plane:?} plane")]
pub struct InvalidPlaneError {
    pub format: PixelFormat,
    pub plane: PlaneSelector,
}

impl PixelFormat {
    /// Formats with separate Y and UV planes which can be split into plane views
    pub fn is_planar(&self) -> bool {
        matches!(self, PixelFormat::Tp10 | PixelFormat::CompressedTp10)
    }

    pub fn is_compressed(&self) -> bool {
        matches!(
            self,
            PixelFormat::CompressedTp10 | PixelFormat::CompressedTp10Y | PixelFormat::CompressedTp10Uv
        )
    }

    /// Format of the view selecting `plane` from an image of this format
    pub fn plane(self, plane: PlaneSelector) -> Result<PixelFormat, InvalidPlaneError> {
        use PixelFormat::*;

        match (self, plane) {
            (format, PlaneSelector::Full) => Ok(format),
            (Tp10, PlaneSelector::Y) => Ok(Tp10Y),
            (Tp10, PlaneSelector::Uv) => Ok(Tp10Uv),
            (CompressedTp10, PlaneSelector::Y) => Ok(CompressedTp10Y),
            (CompressedTp10, PlaneSelector::Uv) => Ok(CompressedTp10Uv),
            (format, plane) => Err(InvalidPlaneError { format, plane }),
        }
    }

    pub(crate) fn plane_desc(&self) -> &'static [PlaneDesc] {
        use PixelFormat::*;

        match self {
            Tp10 => &TP10_PLANES,
            Tp10Y => &TP10_PLANES[..1],
            Tp10Uv => &TP10_PLANES[1..],
            CompressedTp10 => &COMPRESSED_TP10_PLANES,
            CompressedTp10Y => &COMPRESSED_TP10_PLANES[..1],
            CompressedTp10Uv => &COMPRESSED_TP10_PLANES[1..],
        }
    }

    /// Texel region to use when mapping a single plane image of this format.
    ///
    /// Plane views report the parent's dimensions, the mapped region of a UV plane is half of that.
    pub fn map_region(&self, width: usize, height: usize) -> Option<(usize, usize)> {
        match self.plane_desc() {
            [desc] => Some((desc.texels(width), desc.rows(height))),
            _ => None,
        }
    }

    /// Bytes per row compared when validating a single plane image of this format
    pub fn comparison_bytes(&self, width: usize) -> Option<usize> {
        match self.plane_desc() {
            [desc] => Some(desc.comparison_bytes(width)),
            _ => None,
        }
    }

    pub fn variants() -> impl IntoIterator<Item = Self> {
        use PixelFormat::*;

        [Tp10, Tp10Y, Tp10Uv, CompressedTp10, CompressedTp10Y, CompressedTp10Uv]
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Tp10 => "TP10",
            PixelFormat::Tp10Y => "TP10_Y",
            PixelFormat::Tp10Uv => "TP10_UV",
            PixelFormat::CompressedTp10 => "COMPRESSED_TP10",
            PixelFormat::CompressedTp10Y => "COMPRESSED_TP10_Y",
            PixelFormat::CompressedTp10Uv => "COMPRESSED_TP10_UV",
        };

        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planes_of_planar_formats() {
        assert_eq!(PixelFormat::Tp10.plane(PlaneSelector::Uv), Ok(PixelFormat::Tp10Uv));
        assert_eq!(
            PixelFormat::CompressedTp10.plane(PlaneSelector::Y),
            Ok(PixelFormat::CompressedTp10Y)
        );
        assert_eq!(PixelFormat::Tp10Y.plane(PlaneSelector::Full), Ok(PixelFormat::Tp10Y));
    }

    #[test]
    fn single_plane_formats_have_no_sub_planes() {
        for format in PixelFormat::variants() {
            if format.is_planar() {
                continue;
            }

            assert_eq!(
                format.plane(PlaneSelector::Uv),
                Err(InvalidPlaneError {
                    format,
                    plane: PlaneSelector::Uv
                })
            );
            assert!(format.plane(PlaneSelector::Y).is_err());
        }
    }

    #[test]
    fn uv_map_region_is_subsampled() {
        assert_eq!(PixelFormat::Tp10Uv.map_region(64, 48), Some((32, 24)));
        assert_eq!(PixelFormat::Tp10Y.map_region(64, 48), Some((64, 48)));
        assert_eq!(PixelFormat::Tp10.map_region(64, 48), None);
    }

    #[test]
    fn both_planes_compare_the_same_width() {
        assert_eq!(PixelFormat::Tp10Y.comparison_bytes(70), Some(93));
        assert_eq!(PixelFormat::Tp10Uv.comparison_bytes(70), Some(93));
    }
}
