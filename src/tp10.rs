//! TP10 packing: three 10-bit samples in one little-endian 32-bit word.
//!
//! Samples occupy bits 0..10, 10..20 and 20..30 of each word, the top two bits are always zero.

/// Largest value a 10-bit sample can take
pub const MAX_SAMPLE: u16 = 0x3FF;

pub const SAMPLES_PER_WORD: usize = 3;
pub const BYTES_PER_WORD: usize = 4;

/// Number of bytes a packed row of `samples` samples occupies
pub fn row_bytes(samples: usize) -> usize {
    samples.div_ceil(SAMPLES_PER_WORD) * BYTES_PER_WORD
}

/// Number of leading bytes of a packed row which only contain bits of the first `samples` samples.
///
/// Partial words at the end of a row are cut off, this is the width used when comparing rows.
pub fn comparison_bytes(samples: usize) -> usize {
    samples * BYTES_PER_WORD / SAMPLES_PER_WORD
}

pub fn pack_word(samples: [u16; 3]) -> [u8; 4] {
    let word = (samples[0] & MAX_SAMPLE) as u32
        | ((samples[1] & MAX_SAMPLE) as u32) << 10
        | ((samples[2] & MAX_SAMPLE) as u32) << 20;

    word.to_le_bytes()
}

pub fn unpack_word(bytes: [u8; 4]) -> [u16; 3] {
    let word = u32::from_le_bytes(bytes);

    [
        (word & 0x3FF) as u16,
        ((word >> 10) & 0x3FF) as u16,
        ((word >> 20) & 0x3FF) as u16,
    ]
}

/// Read sample `index` from a packed row
///
/// # Panics
///
/// If the word containing the sample lies outside of `row`
#[inline]
pub fn sample(row: &[u8], index: usize) -> u16 {
    let word = index / SAMPLES_PER_WORD;
    let offset = word * BYTES_PER_WORD;

    let bytes = [row[offset], row[offset + 1], row[offset + 2], row[offset + 3]];

    unpack_word(bytes)[index % SAMPLES_PER_WORD]
}

/// Overwrite sample `index` in a packed row, leaving the other samples of the word intact
///
/// # Panics
///
/// If the word containing the sample lies outside of `row`
#[inline]
pub fn set_sample(row: &mut [u8], index: usize, value: u16) {
    let word = index / SAMPLES_PER_WORD;
    let offset = word * BYTES_PER_WORD;

    let mut samples = unpack_word([row[offset], row[offset + 1], row[offset + 2], row[offset + 3]]);
    samples[index % SAMPLES_PER_WORD] = value;

    row[offset..offset + BYTES_PER_WORD].copy_from_slice(&pack_word(samples));
}

/// Pack a row of samples, padding the last word with zeros
pub fn pack_row(samples: &[u16], out: &mut [u8]) {
    for (chunk, word) in samples
        .chunks(SAMPLES_PER_WORD)
        .zip(out.chunks_exact_mut(BYTES_PER_WORD))
    {
        let mut s = [0u16; 3];
        s[..chunk.len()].copy_from_slice(chunk);

        word.copy_from_slice(&pack_word(s));
    }
}

/// Convert a normalized float to a 10-bit sample, like a unorm10 image write
#[inline]
pub fn from_unorm(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * MAX_SAMPLE as f32).round() as u16
}

/// Convert a 10-bit sample to a normalized float, like a unorm10 image read
#[inline]
pub fn to_unorm(sample: u16) -> f32 {
    sample as f32 / MAX_SAMPLE as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_layout() {
        let bytes = pack_word([0x3FF, 0, 0x3FF]);
        assert_eq!(u32::from_le_bytes(bytes), 0x3FF0_03FF);

        assert_eq!(unpack_word(pack_word([1, 2, 3])), [1, 2, 3]);
    }

    #[test]
    fn top_bits_stay_clear() {
        let bytes = pack_word([0xFFFF, 0xFFFF, 0xFFFF]);
        assert_eq!(u32::from_le_bytes(bytes) >> 30, 0);
    }

    #[test]
    fn set_sample_keeps_neighbours() {
        let mut row = vec![0u8; 8];
        pack_row(&[10, 20, 30, 40, 50], &mut row);

        set_sample(&mut row, 4, 1000);

        assert_eq!(sample(&row, 3), 40);
        assert_eq!(sample(&row, 4), 1000);
        assert_eq!(sample(&row, 5), 0);
        assert_eq!(sample(&row, 1), 20);
    }

    #[test]
    fn row_sizes() {
        assert_eq!(row_bytes(64), 88);
        assert_eq!(comparison_bytes(64), 85);
        assert_eq!(row_bytes(3), 4);
        assert_eq!(comparison_bytes(3), 4);
    }

    #[test]
    fn comparison_bytes_never_reach_padding() {
        // The last compared byte must hold bits of a real sample
        for samples in 1..200 {
            let bytes = comparison_bytes(samples);
            let last_bit = bytes * 8 - 1;

            let word = last_bit / 32;
            let bit_in_word = last_bit % 32;
            let sample_index = word * 3 + (bit_in_word / 10).min(2);

            assert!(sample_index < samples, "{samples} samples compare {bytes} bytes");
        }
    }

    #[test]
    fn unorm_is_exact() {
        for s in 0..=MAX_SAMPLE {
            assert_eq!(from_unorm(to_unorm(s)), s);
        }
    }
}
