//! The `ec` module computes Reed–Solomon error correction codewords over
//! GF(2⁸)/0x11D and interleaves the per-block streams.

use crate::types::{EcLevel, QrError, QrResult, Version};

/// Returns the product of two field elements modulo GF(2⁸)/0x11D.
///
/// Uses Russian peasant multiplication; all intermediates stay in 8 bits.
pub fn multiply(x: u8, y: u8) -> u8 {
    let mut z: u8 = 0;
    for i in (0..8).rev() {
        z = (z << 1) ^ ((z >> 7) * 0x1D);
        z ^= ((y >> i) & 1) * x;
    }
    z
}

/// Computes the Reed–Solomon generator polynomial for the given degree.
///
/// The coefficients are returned from the highest to the lowest power,
/// excluding the leading term, which is always 1. For example the
/// polynomial x³ + 255x² + 8x + 93 is returned as `[255, 8, 93]`.
///
/// Panics if the degree is outside the range \[1, 255\].
pub fn compute_divisor(degree: usize) -> Vec<u8> {
    assert!((1..=255).contains(&degree), "degree out of range");

    // Start with the monomial x^0, then multiply by (x - r^i) for each i,
    // where r = 0x02 is a generator element of the field.
    let mut coefficients = vec![0_u8; degree - 1];
    coefficients.push(1);
    let mut root: u8 = 1;
    for _ in 0..degree {
        for j in 0..degree {
            coefficients[j] = multiply(coefficients[j], root);
            if j + 1 < degree {
                coefficients[j] ^= coefficients[j + 1];
            }
        }
        root = multiply(root, 0x02);
    }
    coefficients
}

/// Computes the Reed–Solomon remainder of the data codewords divided by
/// the given generator polynomial, by synthetic division.
pub fn compute_remainder(data: &[u8], divisor: &[u8]) -> Vec<u8> {
    let mut result = vec![0_u8; divisor.len()];
    for b in data {
        let factor = b ^ result.remove(0);
        result.push(0);
        for (x, y) in result.iter_mut().zip(divisor.iter()) {
            *x ^= multiply(*y, factor);
        }
    }
    result
}

/// The number of data modules available in the given version after all
/// function modules are excluded. This includes remainder bits, so it
/// might not be a multiple of 8. The result is in the range \[208, 29648\].
pub fn raw_modules(version: Version) -> usize {
    let v = usize::from(version.value());
    let mut result = (16 * v + 128) * v + 64;
    if v >= 2 {
        // Alignment patterns, including their timing-line crossings.
        let num_align = v / 7 + 2;
        result -= (25 * num_align - 10) * num_align - 55;
        if v >= 7 {
            result -= 18 * 2; // Version information blocks.
        }
    }
    result
}

/// The number of 8-bit data codewords (excluding error correction)
/// contained in the given version at the given error correction level.
pub fn data_codewords(version: Version, ec_level: EcLevel) -> usize {
    raw_modules(version) / 8
        - version.fetch(ec_level, &ECC_CODEWORDS_PER_BLOCK)
            * version.fetch(ec_level, &NUM_ERROR_CORRECTION_BLOCKS)
}

/// Splits the data codewords into error correction blocks, appends the
/// Reed–Solomon remainder to each block, and interleaves the results.
///
/// Returns the interleaved data stream and the interleaved error
/// correction stream; drawn back to back they fill all
/// `raw_modules(version) / 8` codewords of the symbol.
///
/// # Errors
///
/// Returns `Err(QrError::InvalidValue)` if the slice length is not
/// exactly `data_codewords(version, ec_level)`.
pub fn construct_codewords(
    data: &[u8],
    version: Version,
    ec_level: EcLevel,
) -> QrResult<(Vec<u8>, Vec<u8>)> {
    if data.len() != data_codewords(version, ec_level) {
        return Err(QrError::InvalidValue);
    }

    let num_blocks = version.fetch(ec_level, &NUM_ERROR_CORRECTION_BLOCKS);
    let ecc_len = version.fetch(ec_level, &ECC_CODEWORDS_PER_BLOCK);
    let raw_codewords = raw_modules(version) / 8;
    let num_short_blocks = num_blocks - raw_codewords % num_blocks;
    let short_block_len = raw_codewords / num_blocks;

    // Split into blocks; the first `num_short_blocks` carry one data
    // codeword less. Every block shares the same divisor polynomial.
    let divisor = compute_divisor(ecc_len);
    let mut block_data = Vec::<&[u8]>::with_capacity(num_blocks);
    let mut block_ecc = Vec::<Vec<u8>>::with_capacity(num_blocks);
    let mut k = 0;
    for i in 0..num_blocks {
        let data_len = short_block_len - ecc_len + usize::from(i >= num_short_blocks);
        let chunk = &data[k..k + data_len];
        k += data_len;
        block_ecc.push(compute_remainder(chunk, &divisor));
        block_data.push(chunk);
    }
    debug_assert_eq!(k, data.len());

    // Interleave column by column; short blocks simply run out one column
    // before the long ones.
    let mut data_stream = Vec::with_capacity(data.len());
    for i in 0..short_block_len - ecc_len + 1 {
        for block in &block_data {
            if i < block.len() {
                data_stream.push(block[i]);
            }
        }
    }
    let mut ecc_stream = Vec::with_capacity(ecc_len * num_blocks);
    for i in 0..ecc_len {
        for ecc in &block_ecc {
            ecc_stream.push(ecc[i]);
        }
    }
    debug_assert_eq!(data_stream.len() + ecc_stream.len(), raw_codewords);
    Ok((data_stream, ecc_stream))
}

// Both tables are copied from ISO/IEC 18004:2006 §8.5.1, Table 9, one row
// per version 1 to 40, in the order [L, M, Q, H].

static ECC_CODEWORDS_PER_BLOCK: [[usize; 4]; 40] = [
    [7, 10, 13, 17],
    [10, 16, 22, 28],
    [15, 26, 18, 22],
    [20, 18, 26, 16],
    [26, 24, 18, 22],
    [18, 16, 24, 28],
    [20, 18, 18, 26],
    [24, 22, 22, 26],
    [30, 22, 20, 24],
    [18, 26, 24, 28],
    [20, 30, 28, 24],
    [24, 22, 26, 28],
    [26, 22, 24, 22],
    [30, 24, 20, 24],
    [22, 24, 30, 24],
    [24, 28, 24, 30],
    [28, 28, 28, 28],
    [30, 26, 28, 28],
    [28, 26, 26, 26],
    [28, 26, 30, 28],
    [28, 26, 28, 30],
    [28, 28, 30, 24],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [26, 28, 30, 30],
    [28, 28, 28, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
];

static NUM_ERROR_CORRECTION_BLOCKS: [[usize; 4]; 40] = [
    [1, 1, 1, 1],
    [1, 1, 1, 1],
    [1, 1, 2, 2],
    [1, 2, 2, 4],
    [1, 2, 4, 4],
    [2, 4, 4, 4],
    [2, 4, 6, 5],
    [2, 4, 6, 6],
    [2, 5, 8, 8],
    [4, 5, 8, 8],
    [4, 5, 8, 11],
    [4, 8, 10, 11],
    [4, 9, 12, 16],
    [4, 9, 16, 16],
    [6, 10, 12, 18],
    [6, 10, 17, 16],
    [6, 11, 16, 19],
    [6, 13, 18, 21],
    [7, 14, 21, 25],
    [8, 16, 20, 25],
    [8, 17, 23, 25],
    [9, 17, 23, 34],
    [9, 18, 25, 30],
    [10, 20, 27, 32],
    [12, 21, 29, 35],
    [12, 23, 34, 37],
    [12, 25, 34, 40],
    [13, 26, 35, 42],
    [14, 28, 38, 45],
    [15, 29, 40, 48],
    [16, 31, 43, 51],
    [17, 33, 45, 54],
    [18, 35, 48, 57],
    [19, 37, 51, 60],
    [19, 38, 53, 63],
    [20, 40, 56, 66],
    [21, 43, 59, 70],
    [22, 45, 62, 74],
    [24, 47, 65, 77],
    [25, 49, 68, 81],
];




#[cfg(test)]
mod interleave_tests {
    use super::{construct_codewords, data_codewords, raw_modules};
    use crate::types::{EcLevel, QrError, Version};

    #[test]
    fn test_single_block() {
        // Version 1-M has a single block: the data passes through
        // unchanged and the ECC matches the Annex I example.
        let data = [
            0x10, 0x20, 0x0C, 0x56, 0x61, 0x80, 0xEC, 0x11, 0xEC, 0x11, 0xEC, 0x11, 0xEC, 0x11,
            0xEC, 0x11,
        ];
        let (data_stream, ecc_stream) =
            construct_codewords(&data, Version::MIN, EcLevel::M).unwrap();
        assert_eq!(data_stream, data.to_vec());
        assert_eq!(
            ecc_stream,
            vec![0xA5, 0x24, 0xD4, 0xC1, 0xED, 0x36, 0xC7, 0x87, 0x2C, 0x55]
        );
    }

    #[test]
    fn test_uneven_blocks() {
        // Version 5-H splits 46 data codewords into two blocks of 11 and
        // two of 12, each with 22 ECC codewords.
        let version = Version::new(5).unwrap();
        let data: Vec<u8> = (0..46).collect();
        let (data_stream, ecc_stream) =
            construct_codewords(&data, version, EcLevel::H).unwrap();
        assert_eq!(data_stream.len(), 46);
        assert_eq!(ecc_stream.len(), 88);
        // Column 0 holds the first codeword of each block.
        assert_eq!(&data_stream[..4], &[0, 11, 22, 34]);
        // The final column is fed by the two long blocks only.
        assert_eq!(&data_stream[44..], &[33, 45]);
    }

    #[test]
    fn test_stream_lengths() {
        for v in [1_u8, 6, 13, 27, 40] {
            let version = Version::new(v).unwrap();
            for ec_level in [EcLevel::L, EcLevel::M, EcLevel::Q, EcLevel::H] {
                let data = vec![0x5A; data_codewords(version, ec_level)];
                let (data_stream, ecc_stream) =
                    construct_codewords(&data, version, ec_level).unwrap();
                assert_eq!(
                    data_stream.len() + ecc_stream.len(),
                    raw_modules(version) / 8
                );
            }
        }
    }

    #[test]
    fn test_wrong_length() {
        assert_eq!(
            construct_codewords(&[0; 5], Version::MIN, EcLevel::L),
            Err(QrError::InvalidValue)
        );
    }
}
