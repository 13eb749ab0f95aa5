use crate::{Footprint, PlaneSelector, WorkSize};
use std::fmt;

/// Plane a kernel writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneTarget {
    YOnly,
    UvOnly,
}

impl PlaneTarget {
    pub fn selector(&self) -> PlaneSelector {
        match self {
            PlaneTarget::YOnly => PlaneSelector::Y,
            PlaneTarget::UvOnly => PlaneSelector::Uv,
        }
    }

    /// The baseline conversion checking this plane
    pub fn baseline(&self) -> &'static Baseline {
        match self {
            PlaneTarget::YOnly => &CONVERT_Y,
            PlaneTarget::UvOnly => &CONVERT_UV,
        }
    }
}

/// Granularity of the reads a kernel issues on the source image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadOp {
    /// Plain single texel read returning Y, U and V
    Single,
    /// 2x2 gather of one plane
    Quad,
    /// Four horizontally adjacent texels of one plane
    Row,
}

impl fmt::Display for ReadOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadOp::Single => f.write_str("1x1"),
            ReadOp::Quad => f.write_str("2x2"),
            ReadOp::Row => f.write_str("4x1"),
        }
    }
}

/// A copy kernel under test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelVariant {
    pub name: &'static str,
    pub read: ReadOp,
    pub plane: PlaneTarget,
    /// Source pixels consumed per invocation
    pub read_footprint: Footprint,
    /// Target plane pixels produced per invocation, before accounting for sub sampling
    pub write_footprint: Footprint,
}

impl KernelVariant {
    /// Write footprint in luma pixels of the full image
    pub fn luma_write_footprint(&self) -> Footprint {
        match self.plane {
            PlaneTarget::YOnly => self.write_footprint,
            PlaneTarget::UvOnly => Footprint::new(
                self.write_footprint.width * 2,
                self.write_footprint.height * 2,
            ),
        }
    }

    pub fn work_size(&self, width: usize, height: usize) -> WorkSize {
        WorkSize::compute(
            width,
            height,
            self.read_footprint,
            self.luma_write_footprint(),
        )
    }
}

impl fmt::Display for KernelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Reference conversion for one plane, 1x1 reads and 3x1 writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Baseline {
    pub name: &'static str,
    pub plane: PlaneTarget,
    /// Luma pixels covered per invocation
    pub footprint: Footprint,
}

impl Baseline {
    pub fn work_size(&self, width: usize, height: usize) -> WorkSize {
        WorkSize::compute(width, height, self.footprint, self.footprint)
    }
}

pub const CONVERT_Y: Baseline = Baseline {
    name: "read_yuv_1x1_write_y_3x1",
    plane: PlaneTarget::YOnly,
    footprint: Footprint::new(3, 1),
};

pub const CONVERT_UV: Baseline = Baseline {
    name: "read_yuv_1x1_write_uv_3x1",
    plane: PlaneTarget::UvOnly,
    footprint: Footprint::new(6, 2),
};

/// Every copy kernel, in the order they're validated
pub const VARIANTS: [KernelVariant; 6] = [
    KernelVariant {
        name: "read_yuv_1x1_write_y_3x1",
        read: ReadOp::Single,
        plane: PlaneTarget::YOnly,
        read_footprint: Footprint::new(3, 1),
        write_footprint: Footprint::new(3, 1),
    },
    KernelVariant {
        name: "read_yuv_1x1_write_uv_3x1",
        read: ReadOp::Single,
        plane: PlaneTarget::UvOnly,
        read_footprint: Footprint::new(6, 2),
        write_footprint: Footprint::new(3, 1),
    },
    KernelVariant {
        name: "read_yuv_2x2_write_y_3x1",
        read: ReadOp::Quad,
        plane: PlaneTarget::YOnly,
        read_footprint: Footprint::new(6, 2),
        write_footprint: Footprint::new(6, 2),
    },
    KernelVariant {
        name: "read_yuv_4x1_write_uv_3x1",
        read: ReadOp::Row,
        plane: PlaneTarget::UvOnly,
        read_footprint: Footprint::new(12, 2),
        write_footprint: Footprint::new(6, 1),
    },
    KernelVariant {
        name: "read_yuv_4x1_write_y_3x1",
        read: ReadOp::Row,
        plane: PlaneTarget::YOnly,
        read_footprint: Footprint::new(12, 1),
        write_footprint: Footprint::new(12, 1),
    },
    KernelVariant {
        name: "read_yuv_2x2_write_uv_3x1",
        read: ReadOp::Quad,
        plane: PlaneTarget::UvOnly,
        read_footprint: Footprint::new(12, 4),
        write_footprint: Footprint::new(6, 2),
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grids_for_64x64() {
        let grids: Vec<_> = VARIANTS
            .iter()
            .map(|v| {
                let ws = v.work_size(64, 64);
                (ws.x, ws.y)
            })
            .collect();

        assert_eq!(
            grids,
            [(22, 64), (11, 32), (11, 32), (6, 32), (6, 64), (6, 16)]
        );
    }

    #[test]
    fn read_and_write_footprints_agree() {
        for variant in VARIANTS {
            assert_eq!(variant.read_footprint, variant.luma_write_footprint(), "{variant}");
        }
    }

    #[test]
    fn baselines() {
        assert_eq!(CONVERT_Y.work_size(70, 64), WorkSize { x: 24, y: 64 });
        assert_eq!(CONVERT_UV.work_size(70, 64), WorkSize { x: 12, y: 32 });
        assert_eq!(PlaneTarget::UvOnly.baseline().name, VARIANTS[1].name);
    }

    #[test]
    fn three_variants_per_plane() {
        for plane in [PlaneTarget::YOnly, PlaneTarget::UvOnly] {
            let reads: Vec<_> = VARIANTS
                .iter()
                .filter(|v| v.plane == plane)
                .map(|v| v.read)
                .collect();

            assert_eq!(reads.len(), 3);
            assert!(reads.contains(&ReadOp::Single));
            assert!(reads.contains(&ReadOp::Quad));
            assert!(reads.contains(&ReadOp::Row));
        }
    }
}
