use crate::plane_decs::TP10_PLANES;
use crate::{InvalidPlaneError, PixelFormat, PlaneSelector, tp10};
use std::io::{Read, Write};
use std::path::Path;

const MAGIC: &[u8; 4] = b"TP10";

/// TP10 image data in host memory, tightly packed Y and interleaved UV planes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostImage {
    width: usize,
    height: usize,
    y: Vec<u8>,
    uv: Vec<u8>,
}

/// Everything that can go wrong when constructing or loading a [`HostImage`]
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("width or height must not be zero")]
    InvalidDimensions,

    #[error("width and height must be even for 4:2:0 sub sampling, got {width}x{height}")]
    OddDimensions { width: usize, height: usize },

    #[error(
        "invalid plane size at plane {plane}, expected it to be {expected} bytes, but got {got}"
    )]
    InvalidPlaneSize {
        plane: usize,
        expected: usize,
        got: usize,
    },

    #[error("a {width}x{height} image is too large to be addressed")]
    TooLarge { width: usize, height: usize },

    #[error("the padding bits of a packed word in plane {plane}, row {row} are not zero")]
    PaddingBitsSet { plane: usize, row: usize },

    #[error("not a TP10 image file")]
    InvalidMagic,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HostImage {
    pub fn blank(width: usize, height: usize) -> Result<Self, ImageError> {
        let [y, uv] = plane_sizes(width, height)?.map(|size| vec![0u8; size]);

        Ok(Self {
            width,
            height,
            y,
            uv,
        })
    }

    /// Create an image from packed planes, each row being exactly as long as the packed stride
    pub fn from_planes(
        width: usize,
        height: usize,
        y: Vec<u8>,
        uv: Vec<u8>,
    ) -> Result<Self, ImageError> {
        let sizes = plane_sizes(width, height)?;

        let planes = TP10_PLANES.iter().zip([&y, &uv]).zip(sizes);

        for (i, ((desc, plane), expected)) in planes.enumerate() {

            if plane.len() != expected {
                return Err(ImageError::InvalidPlaneSize {
                    plane: i,
                    expected,
                    got: plane.len(),
                });
            }

            let stride = desc.packed_stride(width);

            for (row, bytes) in plane.chunks_exact(stride).enumerate() {
                // Little endian words, the padding bits live in the top of the last byte
                if bytes.chunks_exact(4).any(|word| word[3] & 0xC0 != 0) {
                    return Err(ImageError::PaddingBitsSet { plane: i, row });
                }
            }
        }

        Ok(Self {
            width,
            height,
            y,
            uv,
        })
    }

    /// Create an image from per-sample functions
    ///
    /// `y` is called with luma coordinates, `uv` with chroma coordinates and returns the (U, V) pair.
    pub fn from_fn(
        width: usize,
        height: usize,
        mut y: impl FnMut(usize, usize) -> u16,
        mut uv: impl FnMut(usize, usize) -> [u16; 2],
    ) -> Result<Self, ImageError> {
        let mut this = Self::blank(width, height)?;

        let [y_desc, uv_desc] = TP10_PLANES;

        let mut samples = Vec::with_capacity(y_desc.samples(width));

        let stride = y_desc.packed_stride(width);
        for (row, out) in this.y.chunks_exact_mut(stride).enumerate() {
            samples.clear();
            samples.extend((0..width).map(|x| y(x, row) & tp10::MAX_SAMPLE));

            tp10::pack_row(&samples, out);
        }

        let stride = uv_desc.packed_stride(width);
        for (row, out) in this.uv.chunks_exact_mut(stride).enumerate() {
            samples.clear();
            samples.extend(
                (0..uv_desc.texels(width))
                    .flat_map(|x| uv(x, row))
                    .map(|s| s & tp10::MAX_SAMPLE),
            );

            tp10::pack_row(&samples, out);
        }

        Ok(this)
    }

    /// Load an image file: `TP10`, width and height as little endian u32, followed by the Y and UV planes
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let file = std::fs::File::open(path)?;

        Self::read_from(std::io::BufReader::new(file))
    }

    pub fn read_from(mut reader: impl Read) -> Result<Self, ImageError> {
        let mut header = [0u8; 12];
        reader.read_exact(&mut header)?;

        if &header[..4] != MAGIC {
            return Err(ImageError::InvalidMagic);
        }

        let width = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let height = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;

        let [y_size, uv_size] = plane_sizes(width, height)?;

        // The header may claim more than the input holds
        let y = read_plane(&mut reader, y_size)?;
        let uv = read_plane(&mut reader, uv_size)?;

        Self::from_planes(width, height, y, uv)
    }

    /// Write the image in the format read by [`HostImage::load`], used to produce synthetic inputs
    pub fn write_to(&self, mut writer: impl Write) -> Result<(), ImageError> {
        writer.write_all(MAGIC)?;
        writer.write_all(&(self.width as u32).to_le_bytes())?;
        writer.write_all(&(self.height as u32).to_le_bytes())?;
        writer.write_all(&self.y)?;
        writer.write_all(&self.uv)?;

        Ok(())
    }

    pub fn format(&self) -> PixelFormat {
        PixelFormat::Tp10
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Packed bytes of a plane
    pub fn plane(&self, plane: PlaneSelector) -> Result<&[u8], InvalidPlaneError> {
        match plane {
            PlaneSelector::Y => Ok(&self.y),
            PlaneSelector::Uv => Ok(&self.uv),
            PlaneSelector::Full => Err(InvalidPlaneError {
                format: self.format(),
                plane,
            }),
        }
    }

    /// Packed rows of a plane
    pub fn rows(
        &self,
        plane: PlaneSelector,
    ) -> Result<impl Iterator<Item = &[u8]>, InvalidPlaneError> {
        let stride = self.stride(plane)?;

        Ok(self.plane(plane)?.chunks_exact(stride))
    }

    pub fn stride(&self, plane: PlaneSelector) -> Result<usize, InvalidPlaneError> {
        let format = self.format().plane(plane)?;

        match format.plane_desc() {
            [desc] => Ok(desc.packed_stride(self.width)),
            _ => Err(InvalidPlaneError {
                format: self.format(),
                plane,
            }),
        }
    }

    pub fn y_sample(&self, x: usize, y: usize) -> u16 {
        let stride = TP10_PLANES[0].packed_stride(self.width);

        tp10::sample(&self.y[y * stride..(y + 1) * stride], x)
    }

    /// (U, V) pair at chroma coordinates
    pub fn uv_sample(&self, x: usize, y: usize) -> [u16; 2] {
        let stride = TP10_PLANES[1].packed_stride(self.width);
        let row = &self.uv[y * stride..(y + 1) * stride];

        [tp10::sample(row, 2 * x), tp10::sample(row, 2 * x + 1)]
    }
}

/// Validate the dimensions and return the Y and UV plane sizes
fn plane_sizes(width: usize, height: usize) -> Result<[usize; 2], ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidDimensions);
    }

    if width % 2 != 0 || height % 2 != 0 {
        return Err(ImageError::OddDimensions { width, height });
    }

    let [y, uv] = TP10_PLANES.map(|desc| desc.checked_size(width, height));

    match (y, uv) {
        (Some(y), Some(uv)) => Ok([y, uv]),
        _ => Err(ImageError::TooLarge { width, height }),
    }
}

fn read_plane<R: Read>(reader: &mut R, size: usize) -> Result<Vec<u8>, ImageError> {
    let mut plane = vec![];
    reader.by_ref().take(size as u64).read_to_end(&mut plane)?;

    if plane.len() != size {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }

    Ok(plane)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_dimensions() {
        assert!(matches!(
            HostImage::blank(0, 4),
            Err(ImageError::InvalidDimensions)
        ));
        assert!(matches!(
            HostImage::blank(7, 4),
            Err(ImageError::OddDimensions {
                width: 7,
                height: 4
            })
        ));
    }

    #[test]
    fn plane_lengths() {
        let image = HostImage::blank(64, 64).unwrap();

        assert_eq!(image.plane(PlaneSelector::Y).unwrap().len(), 88 * 64);
        assert_eq!(image.plane(PlaneSelector::Uv).unwrap().len(), 88 * 32);
        assert!(image.plane(PlaneSelector::Full).is_err());
    }

    #[test]
    fn from_planes_checks_sizes() {
        let err = HostImage::from_planes(6, 2, vec![0; 16], vec![0; 7]).unwrap_err();

        assert!(matches!(
            err,
            ImageError::InvalidPlaneSize {
                plane: 1,
                expected: 8,
                got: 7
            }
        ));
    }

    #[test]
    fn from_planes_checks_padding_bits() {
        let mut y = vec![0; 16];
        y[11] = 0x80;

        let err = HostImage::from_planes(6, 2, y, vec![0; 8]).unwrap_err();

        assert!(matches!(err, ImageError::PaddingBitsSet { plane: 0, row: 1 }));
    }

    #[test]
    fn from_fn_places_samples() {
        let image = HostImage::from_fn(
            10,
            4,
            |x, y| (y * 10 + x) as u16,
            |x, y| [(100 + y * 5 + x) as u16, (200 + y * 5 + x) as u16],
        )
        .unwrap();

        assert_eq!(image.y_sample(7, 3), 37);
        assert_eq!(image.uv_sample(4, 1), [109, 209]);
    }

    #[test]
    fn file_round_trip() {
        let image = HostImage::from_fn(12, 6, |x, y| (x * y) as u16, |x, y| [x as u16, y as u16])
            .unwrap();

        let mut bytes = vec![];
        image.write_to(&mut bytes).unwrap();

        assert_eq!(&bytes[..4], b"TP10");
        assert_eq!(HostImage::read_from(&bytes[..]).unwrap(), image);
    }

    fn header(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = b"TP10".to_vec();
        bytes.extend_from_slice(&width.to_le_bytes());
        bytes.extend_from_slice(&height.to_le_bytes());
        bytes
    }

    #[test]
    fn rejects_unaddressable_dimensions() {
        let bytes = header(0xFFFF_FFFE, 0xFFFF_FFFE);

        let err = HostImage::read_from(&bytes[..]).unwrap_err();

        assert!(
            matches!(err, ImageError::TooLarge { width, height } if width == 0xFFFF_FFFE && height == 0xFFFF_FFFE),
            "{err}"
        );
        assert!(matches!(
            HostImage::blank(usize::MAX - 1, 2),
            Err(ImageError::TooLarge { .. })
        ));
    }

    #[test]
    fn huge_header_with_truncated_data() {
        let mut bytes = header(0x7FFF_FFFE, 0x7FFF_FFFE);
        bytes.extend_from_slice(&[0; 64]);

        let err = HostImage::read_from(&bytes[..]).unwrap_err();

        assert!(
            matches!(&err, ImageError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof),
            "{err}"
        );
    }

    #[test]
    fn rejects_foreign_files() {
        let bytes = b"P010\x02\0\0\0\x02\0\0\0";

        assert!(matches!(
            HostImage::read_from(&bytes[..]),
            Err(ImageError::InvalidMagic)
        ));
    }
}
