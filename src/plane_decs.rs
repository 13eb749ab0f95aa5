use crate::tp10;

/// Description for a Plane which can be used to implement bounds checks, stride calculation and buffer sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlaneDesc {
    pub(crate) width_op: Op,
    pub(crate) height_op: Op,

    /// 1 for Y, 2 for interleaved UV
    pub(crate) samples_per_texel: usize,

    pub(crate) encoding: Encoding,
}

/// How the samples of a plane row are laid out in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Encoding {
    /// Three 10-bit samples per 32-bit word
    Packed,
    /// One little-endian u16 per sample, used by the compressed formats
    Wide,
}

impl PlaneDesc {
    /// Texels per row for an image of the given width
    pub(crate) fn texels(&self, width: usize) -> usize {
        self.width_op.op(width)
    }

    pub(crate) fn rows(&self, height: usize) -> usize {
        self.height_op.op(height)
    }

    /// Samples per row for an image of the given width
    pub(crate) fn samples(&self, width: usize) -> usize {
        self.texels(width) * self.samples_per_texel
    }

    /// Samples a row can hold, vector writes always cover whole words
    pub(crate) fn sample_capacity(&self, width: usize) -> usize {
        self.samples(width).div_ceil(tp10::SAMPLES_PER_WORD) * tp10::SAMPLES_PER_WORD
    }

    pub(crate) fn packed_stride(&self, width: usize) -> usize {
        match self.encoding {
            Encoding::Packed => tp10::row_bytes(self.samples(width)),
            Encoding::Wide => self.sample_capacity(width) * 2,
        }
    }

    /// Bytes of a tightly packed plane, `None` if the size can't be addressed
    pub(crate) fn checked_size(&self, width: usize, height: usize) -> Option<usize> {
        let samples = self.texels(width).checked_mul(self.samples_per_texel)?;
        let words = samples.div_ceil(tp10::SAMPLES_PER_WORD);

        let stride = match self.encoding {
            Encoding::Packed => words.checked_mul(tp10::BYTES_PER_WORD)?,
            Encoding::Wide => words.checked_mul(tp10::SAMPLES_PER_WORD * 2)?,
        };

        stride
            .checked_mul(self.rows(height))
            .filter(|size| *size <= isize::MAX as usize)
    }

    /// Bytes per row which are compared when validating a plane
    pub(crate) fn comparison_bytes(&self, width: usize) -> usize {
        tp10::comparison_bytes(self.samples(width))
    }
}

/// Plane's number of texels in relation to width / height
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Div(usize),
    Identity,
}

impl Op {
    pub(crate) fn op(self, lhs: usize) -> usize {
        match self {
            Op::Div(rhs) => lhs / rhs,
            Op::Identity => lhs,
        }
    }
}

pub(crate) const TP10_Y_PLANE: PlaneDesc = PlaneDesc {
    width_op: Op::Identity,
    height_op: Op::Identity,
    samples_per_texel: 1,
    encoding: Encoding::Packed,
};

pub(crate) const TP10_UV_PLANE: PlaneDesc = PlaneDesc {
    width_op: Op::Div(2),
    height_op: Op::Div(2),
    samples_per_texel: 2,
    encoding: Encoding::Packed,
};

pub(crate) const COMPRESSED_Y_PLANE: PlaneDesc = PlaneDesc {
    encoding: Encoding::Wide,
    ..TP10_Y_PLANE
};

pub(crate) const COMPRESSED_UV_PLANE: PlaneDesc = PlaneDesc {
    encoding: Encoding::Wide,
    ..TP10_UV_PLANE
};

pub(crate) const TP10_PLANES: [PlaneDesc; 2] = [TP10_Y_PLANE, TP10_UV_PLANE];
pub(crate) const COMPRESSED_TP10_PLANES: [PlaneDesc; 2] = [COMPRESSED_Y_PLANE, COMPRESSED_UV_PLANE];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uv_rows_match_y_rows_in_bytes() {
        for width in (2..300).step_by(2) {
            assert_eq!(
                TP10_Y_PLANE.packed_stride(width),
                TP10_UV_PLANE.packed_stride(width)
            );
        }
    }

    #[test]
    fn wide_rows_hold_whole_words() {
        assert_eq!(COMPRESSED_Y_PLANE.sample_capacity(64), 66);
        assert_eq!(COMPRESSED_Y_PLANE.packed_stride(64), 132);
        assert_eq!(COMPRESSED_UV_PLANE.rows(64), 32);
    }

    #[test]
    fn checked_size_matches_stride_times_rows() {
        for desc in TP10_PLANES.iter().chain(&COMPRESSED_TP10_PLANES) {
            assert_eq!(
                desc.checked_size(70, 42),
                Some(desc.packed_stride(70) * desc.rows(42))
            );
        }
    }

    #[test]
    fn checked_size_detects_overflow() {
        assert_eq!(TP10_Y_PLANE.checked_size(usize::MAX - 1, 2), None);
        assert_eq!(COMPRESSED_UV_PLANE.checked_size(1 << 40, 1 << 40), None);
    }
}
