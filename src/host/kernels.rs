//! Built-in copy kernels of the host device and the vector read/write operations they use.
//!
//! Coordinates passed to reads are luma coordinates of the full image. Chroma reads divide them by
//! the sub sampling factor. Every read clamps to the edge of the plane it reads from.

use super::memory::{ImageStorage, PlaneStorage};
use crate::catalog::PlaneTarget;
use crate::tp10;
use crate::WorkSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Channel {
    Y,
    U,
    V,
}

/// Read access to a full planar image
pub(crate) struct Source<'a> {
    y: &'a PlaneStorage,
    uv: &'a PlaneStorage,
    width: i64,
    height: i64,
}

impl<'a> Source<'a> {
    /// `None` if the image isn't planar
    pub(crate) fn new(image: &'a ImageStorage) -> Option<Self> {
        let [y, uv] = image.planes.as_slice() else {
            return None;
        };

        Some(Self {
            y,
            uv,
            width: image.desc.width as i64,
            height: image.desc.height as i64,
        })
    }

    fn luma(&self, x: i64, y: i64) -> u16 {
        let x = x.clamp(0, self.width - 1) as usize;
        let y = y.clamp(0, self.height - 1) as usize;

        self.y.sample(x, y)
    }

    fn chroma(&self, x: i64, y: i64) -> [u16; 2] {
        let x = x.clamp(0, self.width / 2 - 1) as usize;
        let y = y.clamp(0, self.height / 2 - 1) as usize;

        [self.uv.sample(2 * x, y), self.uv.sample(2 * x + 1, y)]
    }

    fn sample(&self, channel: Channel, x: i64, y: i64) -> f32 {
        let value = match channel {
            Channel::Y => self.luma(x, y),
            Channel::U => self.chroma(x.div_euclid(2), y.div_euclid(2))[0],
            Channel::V => self.chroma(x.div_euclid(2), y.div_euclid(2))[1],
        };

        tp10::to_unorm(value)
    }

    /// Single texel read, returns (Y, U, V, 1)
    fn read_1x1(&self, x: i64, y: i64) -> [f32; 4] {
        [
            self.sample(Channel::Y, x, y),
            self.sample(Channel::U, x, y),
            self.sample(Channel::V, x, y),
            1.0,
        ]
    }

    /// 2x2 gather around `coord`, in the order (x0, y1), (x1, y1), (x1, y0), (x0, y0)
    fn read_2x2(&self, coord: [f32; 2], channel: Channel) -> [f32; 4] {
        let fetch = |x: i64, y: i64| match channel {
            Channel::Y => tp10::to_unorm(self.luma(x, y)),
            Channel::U => tp10::to_unorm(self.chroma(x, y)[0]),
            Channel::V => tp10::to_unorm(self.chroma(x, y)[1]),
        };

        let [cx, cy] = match channel {
            Channel::Y => coord,
            Channel::U | Channel::V => [coord[0] / 2.0, coord[1] / 2.0],
        };

        let x0 = (cx - 0.5).floor() as i64;
        let y0 = (cy - 0.5).floor() as i64;

        [
            fetch(x0, y0 + 1),
            fetch(x0 + 1, y0 + 1),
            fetch(x0 + 1, y0),
            fetch(x0, y0),
        ]
    }

    /// Four horizontally adjacent texels starting at `coord`
    fn read_4x1(&self, coord: [f32; 2], channel: Channel) -> [f32; 4] {
        let x0 = coord[0].floor() as i64;
        let y0 = coord[1].floor() as i64;

        std::array::from_fn(|i| self.sample(channel, x0 + i as i64, y0))
    }
}

/// Texels produced by one 3x1 vector write
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Texels {
    Y([f32; 3]),
    Uv([[f32; 2]; 3]),
}

/// One 3x1 vector write at texel coordinates of the target plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlaneWrite {
    pub(crate) x: usize,
    pub(crate) y: usize,
    pub(crate) texels: Texels,
}

impl PlaneWrite {
    fn y(x: usize, y: usize, texels: [f32; 3]) -> Self {
        Self {
            x,
            y,
            texels: Texels::Y(texels),
        }
    }

    fn uv(x: usize, y: usize, texels: [[f32; 2]; 3]) -> Self {
        Self {
            x,
            y,
            texels: Texels::Uv(texels),
        }
    }

    pub(crate) fn apply(&self, plane: &mut PlaneStorage) {
        match self.texels {
            Texels::Y(texels) => {
                for (i, value) in texels.into_iter().enumerate() {
                    plane.set_sample(self.x + i, self.y, tp10::from_unorm(value));
                }
            }
            Texels::Uv(texels) => {
                for (i, [u, v]) in texels.into_iter().enumerate() {
                    let index = 2 * (self.x + i);

                    plane.set_sample(index, self.y, tp10::from_unorm(u));
                    plane.set_sample(index + 1, self.y, tp10::from_unorm(v));
                }
            }
        }
    }
}

type KernelBody = fn(&Source<'_>, usize, usize, &mut Vec<PlaneWrite>);

/// A kernel entry point the host device can run
pub(crate) struct BuiltinKernel {
    pub(crate) name: &'static str,
    /// Plane the kernel's destination argument must be
    pub(crate) target: PlaneTarget,
    body: KernelBody,
}

pub(crate) static BUILTIN_KERNELS: [BuiltinKernel; 6] = [
    BuiltinKernel {
        name: "read_yuv_1x1_write_y_3x1",
        target: PlaneTarget::YOnly,
        body: read_1x1_write_y,
    },
    BuiltinKernel {
        name: "read_yuv_1x1_write_uv_3x1",
        target: PlaneTarget::UvOnly,
        body: read_1x1_write_uv,
    },
    BuiltinKernel {
        name: "read_yuv_2x2_write_y_3x1",
        target: PlaneTarget::YOnly,
        body: read_2x2_write_y,
    },
    BuiltinKernel {
        name: "read_yuv_2x2_write_uv_3x1",
        target: PlaneTarget::UvOnly,
        body: read_2x2_write_uv,
    },
    BuiltinKernel {
        name: "read_yuv_4x1_write_y_3x1",
        target: PlaneTarget::YOnly,
        body: read_4x1_write_y,
    },
    BuiltinKernel {
        name: "read_yuv_4x1_write_uv_3x1",
        target: PlaneTarget::UvOnly,
        body: read_4x1_write_uv,
    },
];

pub(crate) fn find(name: &str) -> Option<&'static BuiltinKernel> {
    BUILTIN_KERNELS.iter().find(|kernel| kernel.name == name)
}

impl BuiltinKernel {
    /// Evaluate every invocation of the grid and return their writes
    pub(crate) fn run(&self, src: &Source<'_>, work_size: WorkSize) -> Vec<PlaneWrite> {
        #[cfg(feature = "multi-thread")]
        if num_cpus::get() > 1 {
            use rayon::iter::{IntoParallelIterator, ParallelIterator};

            return (0..work_size.y)
                .into_par_iter()
                .flat_map_iter(|wid_y| self.run_row(src, wid_y, work_size.x))
                .collect();
        }

        (0..work_size.y)
            .flat_map(|wid_y| self.run_row(src, wid_y, work_size.x))
            .collect()
    }

    fn run_row(&self, src: &Source<'_>, wid_y: usize, groups_x: usize) -> Vec<PlaneWrite> {
        let mut out = Vec::with_capacity(groups_x * 4);

        for wid_x in 0..groups_x {
            (self.body)(src, wid_x, wid_y, &mut out);
        }

        out
    }
}

fn read_1x1_write_y(src: &Source<'_>, wid_x: usize, wid_y: usize, out: &mut Vec<PlaneWrite>) {
    let (x, y) = (3 * wid_x as i64, wid_y as i64);

    let p = [src.read_1x1(x, y), src.read_1x1(x + 1, y), src.read_1x1(x + 2, y)];

    out.push(PlaneWrite::y(3 * wid_x, wid_y, [p[0][0], p[1][0], p[2][0]]));
}

fn read_1x1_write_uv(src: &Source<'_>, wid_x: usize, wid_y: usize, out: &mut Vec<PlaneWrite>) {
    let (x, y) = (6 * wid_x as i64, 2 * wid_y as i64);

    let p = [src.read_1x1(x, y), src.read_1x1(x + 2, y), src.read_1x1(x + 4, y)];

    out.push(PlaneWrite::uv(
        3 * wid_x,
        wid_y,
        [[p[0][1], p[0][2]], [p[1][1], p[1][2]], [p[2][1], p[2][2]]],
    ));
}

fn read_2x2_write_y(src: &Source<'_>, wid_x: usize, wid_y: usize, out: &mut Vec<PlaneWrite>) {
    let coord = [(6 * wid_x) as f32 + 0.5, (2 * wid_y) as f32 + 0.5];
    let q: [[f32; 4]; 3] =
        std::array::from_fn(|i| src.read_2x2([coord[0] + 2.0 * i as f32, coord[1]], Channel::Y));

    let (x, y) = (6 * wid_x, 2 * wid_y);

    out.push(PlaneWrite::y(x, y, [q[0][3], q[0][2], q[1][3]]));
    out.push(PlaneWrite::y(x + 3, y, [q[1][2], q[2][3], q[2][2]]));
    out.push(PlaneWrite::y(x, y + 1, [q[0][0], q[0][1], q[1][0]]));
    out.push(PlaneWrite::y(x + 3, y + 1, [q[1][1], q[2][0], q[2][1]]));
}

fn read_2x2_write_uv(src: &Source<'_>, wid_x: usize, wid_y: usize, out: &mut Vec<PlaneWrite>) {
    let coord = [
        2.0 * ((6 * wid_x) as f32 + 0.5),
        2.0 * ((2 * wid_y) as f32 + 0.5),
    ];
    let at = |i: usize| [coord[0] + 4.0 * i as f32, coord[1]];

    let u: [[f32; 4]; 3] = std::array::from_fn(|i| src.read_2x2(at(i), Channel::U));
    let v: [[f32; 4]; 3] = std::array::from_fn(|i| src.read_2x2(at(i), Channel::V));

    let uv = |i: usize, s: usize| [u[i][s], v[i][s]];
    let (x, y) = (6 * wid_x, 2 * wid_y);

    out.push(PlaneWrite::uv(x, y, [uv(0, 3), uv(0, 2), uv(1, 3)]));
    out.push(PlaneWrite::uv(x + 3, y, [uv(1, 2), uv(2, 3), uv(2, 2)]));
    out.push(PlaneWrite::uv(x, y + 1, [uv(0, 0), uv(0, 1), uv(1, 0)]));
    out.push(PlaneWrite::uv(x + 3, y + 1, [uv(1, 1), uv(2, 0), uv(2, 1)]));
}

fn read_4x1_write_y(src: &Source<'_>, wid_x: usize, wid_y: usize, out: &mut Vec<PlaneWrite>) {
    let coord = [(12 * wid_x) as f32 + 0.5, wid_y as f32 + 0.5];
    let p: [[f32; 4]; 3] =
        std::array::from_fn(|i| src.read_4x1([coord[0] + 4.0 * i as f32, coord[1]], Channel::Y));

    // Twelve consecutive texels, written in groups of three
    let texel = |i: usize| p[i / 4][i % 4];
    let x = 12 * wid_x;

    for group in 0..4 {
        let texels = [texel(3 * group), texel(3 * group + 1), texel(3 * group + 2)];

        out.push(PlaneWrite::y(x + 3 * group, wid_y, texels));
    }
}

fn read_4x1_write_uv(src: &Source<'_>, wid_x: usize, wid_y: usize, out: &mut Vec<PlaneWrite>) {
    let coord = [(12 * wid_x) as f32 + 0.5, (2 * wid_y) as f32 + 0.5];
    let at = |i: usize| [coord[0] + 4.0 * i as f32, coord[1]];

    let u: [[f32; 4]; 3] = std::array::from_fn(|i| src.read_4x1(at(i), Channel::U));
    let v: [[f32; 4]; 3] = std::array::from_fn(|i| src.read_4x1(at(i), Channel::V));

    // Luma spaced reads see every chroma texel twice
    let uv = |i: usize, s: usize| [u[i][s], v[i][s]];
    let x = 6 * wid_x;

    out.push(PlaneWrite::uv(x, wid_y, [uv(0, 0), uv(0, 2), uv(1, 0)]));
    out.push(PlaneWrite::uv(x + 3, wid_y, [uv(1, 2), uv(2, 0), uv(2, 2)]));
}
