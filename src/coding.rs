//! The `coding` module classifies input data and encodes it into the bit
//! payload of a segment.

use crate::bits::BitBuffer;
use crate::types::{QrError, QrResult, Version};

/// The encoding mode of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Numeric,
    Alphanumeric,
    Byte,
    Kanji,
    Eci,
}

impl Mode {
    /// The four-bit mode indicator emitted ahead of each segment.
    pub fn indicator(self) -> u32 {
        match self {
            Mode::Numeric => 0b0001,
            Mode::Alphanumeric => 0b0010,
            Mode::Byte => 0b0100,
            Mode::Kanji => 0b1000,
            Mode::Eci => 0b0111,
        }
    }

    /// Computes the number of bits needed to encode the data length.
    ///
    ///     use qrgrid::coding::Mode;
    ///     use qrgrid::types::Version;
    ///
    ///     assert_eq!(Mode::Numeric.length_bits_count(Version::MIN), 10);
    ///
    /// The width depends on the version band: 1–9, 10–26 or 27–40.
    pub fn length_bits_count(self, version: Version) -> usize {
        match version.value() {
            1..=9 => match self {
                Mode::Numeric => 10,
                Mode::Alphanumeric => 9,
                Mode::Byte | Mode::Kanji => 8,
                Mode::Eci => 0,
            },
            10..=26 => match self {
                Mode::Numeric => 12,
                Mode::Alphanumeric => 11,
                Mode::Byte => 16,
                Mode::Kanji => 10,
                Mode::Eci => 0,
            },
            _ => match self {
                Mode::Numeric => 14,
                Mode::Alphanumeric => 13,
                Mode::Byte => 16,
                Mode::Kanji => 12,
                Mode::Eci => 0,
            },
        }
    }
}

/// In alphanumeric mode, a pair of characters is encoded as a base-45
/// integer. `alphanumeric_digit` converts each character into its
/// corresponding base-45 digit, or `None` for characters outside the set.
///
/// The conversion is specified in ISO/IEC 18004:2006, §8.4.3, Table 5.
#[inline]
fn alphanumeric_digit(character: u8) -> Option<u16> {
    match character {
        b'0'..=b'9' => Some(u16::from(character - b'0')),
        b'A'..=b'Z' => Some(u16::from(character - b'A') + 10),
        b' ' => Some(36),
        b'$' => Some(37),
        b'%' => Some(38),
        b'*' => Some(39),
        b'+' => Some(40),
        b'-' => Some(41),
        b'.' => Some(42),
        b'/' => Some(43),
        b':' => Some(44),
        _ => None,
    }
}

/// An immutable chunk of data with a single encoding mode.
///
/// The stored bits are the payload only; the mode indicator and the
/// character count field are emitted during final assembly, because the
/// count field width depends on the chosen version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    mode: Mode,
    num_chars: usize,
    bits: BitBuffer,
}

impl Segment {
    /// Creates a segment from already-encoded payload bits.
    ///
    /// The buffer is deep-copied, so the caller may keep mutating it.
    /// This is also the escape hatch for modes without a factory here,
    /// such as kanji.
    pub fn new(mode: Mode, num_chars: usize, bits: &BitBuffer) -> Self {
        Self {
            mode,
            num_chars,
            bits: bits.clone(),
        }
    }

    /// Encodes a string of digits 0 to 9 as a numeric segment.
    ///
    /// Digits are consumed in groups of three; a group of 3/2/1 digits
    /// takes 10/7/4 bits.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::InvalidCharacter)` if the string contains a
    /// non-digit.
    pub fn numeric(text: &str) -> QrResult<Self> {
        if !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(QrError::InvalidCharacter);
        }
        let data = text.as_bytes();
        let mut bits = BitBuffer::with_capacity(data.len() * 10 / 3 + 7);
        for chunk in data.chunks(3) {
            let number = chunk
                .iter()
                .map(|b| u32::from(*b - b'0'))
                .fold(0, |a, b| a * 10 + b);
            bits.append_bits(number, chunk.len() * 3 + 1)?;
        }
        Ok(Self {
            mode: Mode::Numeric,
            num_chars: data.len(),
            bits,
        })
    }

    /// Encodes a string as an alphanumeric segment.
    ///
    /// The string may only contain the characters A to Z (uppercase), 0 to
    /// 9, space, `$`, `%`, `*`, `+`, `-`, `.`, `/` or `:`. Characters are
    /// consumed in pairs of 11 bits, with a trailing single character
    /// taking 6 bits.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::InvalidCharacter)` if the string contains a
    /// character outside that set.
    pub fn alphanumeric(text: &str) -> QrResult<Self> {
        let data = text.as_bytes();
        if !data.iter().all(|b| alphanumeric_digit(*b).is_some()) {
            return Err(QrError::InvalidCharacter);
        }
        let mut bits = BitBuffer::with_capacity(data.len() * 11 / 2 + 6);
        for chunk in data.chunks(2) {
            let number = chunk
                .iter()
                .filter_map(|b| alphanumeric_digit(*b))
                .fold(0_u32, |a, b| a * 45 + u32::from(b));
            bits.append_bits(number, chunk.len() * 5 + 1)?;
        }
        Ok(Self {
            mode: Mode::Alphanumeric,
            num_chars: data.len(),
            bits,
        })
    }

    /// Encodes arbitrary binary data as a byte segment, one 8-bit group
    /// per input byte.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::CapacityExceeded)` if the data is longer than
    /// the bit buffer can hold.
    pub fn bytes(data: &[u8]) -> QrResult<Self> {
        let mut bits = BitBuffer::with_capacity(data.len() * 8);
        for b in data {
            bits.append_bits(u32::from(*b), 8)?;
        }
        Ok(Self {
            mode: Mode::Byte,
            num_chars: data.len(),
            bits,
        })
    }

    /// Encodes an Extended Channel Interpretation designator with the
    /// given assignment value.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::ValueOutOfRange)` if the value is 1000000 or
    /// greater.
    pub fn eci(assign_value: u32) -> QrResult<Self> {
        let mut bits = BitBuffer::with_capacity(24);
        if assign_value < 1 << 7 {
            bits.append_bits(assign_value, 8)?;
        } else if assign_value < 1 << 14 {
            bits.append_bits(0b10, 2)?;
            bits.append_bits(assign_value, 14)?;
        } else if assign_value < 1_000_000 {
            bits.append_bits(0b110, 3)?;
            bits.append_bits(assign_value, 21)?;
        } else {
            return Err(QrError::ValueOutOfRange);
        }
        Ok(Self {
            mode: Mode::Eci,
            num_chars: 0,
            bits,
        })
    }

    /// Splits a text string into segments.
    ///
    /// The whole string is encoded in the first applicable of numeric,
    /// alphanumeric and byte (UTF-8) mode; there is no mode-switching
    /// optimizer. An empty string yields an empty list.
    pub fn make_segments(text: &str) -> QrResult<Vec<Self>> {
        if text.is_empty() {
            Ok(vec![])
        } else if text.bytes().all(|b| b.is_ascii_digit()) {
            Ok(vec![Self::numeric(text)?])
        } else if text.bytes().all(|b| alphanumeric_digit(b).is_some()) {
            Ok(vec![Self::alphanumeric(text)?])
        } else {
            Ok(vec![Self::bytes(text.as_bytes())?])
        }
    }

    /// The encoding mode of this segment.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The length of this segment's unencoded data: digits for numeric,
    /// characters for alphanumeric, bytes for byte mode, 0 for ECI.
    pub fn num_chars(&self) -> usize {
        self.num_chars
    }

    /// The payload bits of this segment.
    pub fn bits(&self) -> &BitBuffer {
        &self.bits
    }

    /// Computes the number of bits needed to encode the given segments at
    /// the given version, including each segment's mode indicator and
    /// character count field.
    ///
    /// Returns `None` if a segment's length does not fit its count field
    /// at this version, or if the total would exceed the 31-bit counter.
    pub fn total_bits(segments: &[Self], version: Version) -> Option<usize> {
        let mut result: usize = 0;
        for segment in segments {
            let length_bits = segment.mode.length_bits_count(version);
            if segment.num_chars >= 1 << length_bits {
                return None;
            }
            result = result.checked_add(4 + length_bits + segment.bits.len())?;
            if result > i32::MAX as usize {
                return None;
            }
        }
        Some(result)
    }
}


#[cfg(test)]
mod alphanumeric_tests {
    use super::{Mode, Segment};
    use crate::types::QrError;

    #[test]
    fn test_iso_18004_2006_example() {
        let segment = Segment::alphanumeric("AC-42").unwrap();
        assert_eq!(segment.mode(), Mode::Alphanumeric);
        assert_eq!(segment.num_chars(), 5);
        assert_eq!(segment.bits().len(), 28);
        assert_eq!(
            segment.bits.into_bytes(),
            vec![0b0011_1001, 0b1101_1100, 0b1110_0100, 0b0010_0000]
        );
    }

    #[test]
    fn test_invalid_character() {
        assert_eq!(
            Segment::alphanumeric("lowercase"),
            Err(QrError::InvalidCharacter)
        );
        assert_eq!(Segment::alphanumeric("A,B"), Err(QrError::InvalidCharacter));
    }
}

#[cfg(test)]
mod byte_tests {
    use super::{Mode, Segment};

    #[test]
    fn test_payload_is_input() {
        let segment = Segment::bytes(b"\x12\x34\x56\x78\x9a\xbc\xde\xf0").unwrap();
        assert_eq!(segment.mode(), Mode::Byte);
        assert_eq!(segment.num_chars(), 8);
        assert_eq!(segment.bits().len(), 64);
        assert_eq!(
            segment.bits.into_bytes(),
            vec![0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0]
        );
    }
}
