use crate::device::ImageDesc;
use crate::plane_decs::{Encoding, PlaneDesc};
use crate::tp10;

/// Row pitch alignment of every plane allocated by the host device
pub(crate) const ROW_ALIGNMENT: usize = 64;

/// Backing store of one plane
#[derive(Debug)]
pub(crate) struct PlaneStorage {
    pub(crate) desc: PlaneDesc,
    pub(crate) stride: usize,
    pub(crate) rows: usize,
    /// Samples a row holds, including the padding up to the next whole word
    pub(crate) capacity: usize,
    pub(crate) data: Vec<u8>,
}

impl PlaneStorage {
    fn new(desc: PlaneDesc, width: usize, height: usize) -> Self {
        let stride = desc.packed_stride(width).next_multiple_of(ROW_ALIGNMENT);
        let rows = desc.rows(height);

        Self {
            desc,
            stride,
            rows,
            capacity: desc.sample_capacity(width),
            data: vec![0u8; stride * rows],
        }
    }

    pub(crate) fn row(&self, y: usize) -> &[u8] {
        &self.data[y * self.stride..(y + 1) * self.stride]
    }

    pub(crate) fn row_mut(&mut self, y: usize) -> &mut [u8] {
        &mut self.data[y * self.stride..(y + 1) * self.stride]
    }

    pub(crate) fn sample(&self, index: usize, y: usize) -> u16 {
        let row = self.row(y);

        match self.desc.encoding {
            Encoding::Packed => tp10::sample(row, index),
            Encoding::Wide => u16::from_le_bytes([row[2 * index], row[2 * index + 1]]),
        }
    }

    /// Store a sample, writes outside of the plane are dropped
    pub(crate) fn set_sample(&mut self, index: usize, y: usize, value: u16) {
        if index >= self.capacity || y >= self.rows {
            return;
        }

        let encoding = self.desc.encoding;
        let row = self.row_mut(y);

        match encoding {
            Encoding::Packed => tp10::set_sample(row, index, value),
            Encoding::Wide => row[2 * index..2 * index + 2].copy_from_slice(&value.to_le_bytes()),
        }
    }
}

/// Backing store of an image, one [`PlaneStorage`] per plane of its format
#[derive(Debug)]
pub(crate) struct ImageStorage {
    pub(crate) desc: ImageDesc,
    pub(crate) planes: Vec<PlaneStorage>,
}

impl ImageStorage {
    pub(crate) fn new(desc: ImageDesc) -> Self {
        let planes = desc
            .format
            .plane_desc()
            .iter()
            .map(|plane| PlaneStorage::new(*plane, desc.width, desc.height))
            .collect();

        Self { desc, planes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PixelFormat;

    fn storage(format: PixelFormat) -> ImageStorage {
        ImageStorage::new(ImageDesc {
            format,
            width: 70,
            height: 8,
        })
    }

    #[test]
    fn pitches_are_aligned() {
        let image = storage(PixelFormat::Tp10);

        assert_eq!(image.planes.len(), 2);
        assert_eq!(image.planes[0].stride, 128);
        assert_eq!(image.planes[1].stride, 128);
        assert_eq!(image.planes[1].rows, 4);

        let compressed = storage(PixelFormat::CompressedTp10);
        assert_eq!(compressed.planes[0].stride, 192);
    }

    #[test]
    fn writes_past_capacity_are_dropped() {
        for format in [PixelFormat::Tp10Y, PixelFormat::CompressedTp10Y] {
            let mut image = storage(format);
            let plane = &mut image.planes[0];

            plane.set_sample(71, 7, 5);
            plane.set_sample(72, 7, 9);
            plane.set_sample(0, 8, 9);

            assert_eq!(plane.sample(71, 7), 5);
            assert_eq!(plane.data.iter().filter(|b| **b != 0).count(), 1);
        }
    }
}
