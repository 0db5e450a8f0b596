//! QR code encoder
//!
//! This crate encodes text or binary data into a QR Code Model 2 symbol:
//! an immutable square grid of dark and light modules in which every
//! module also carries its role (finder, alignment, timing, format,
//! version or data), so renderers can style function patterns and data
//! separately.
//!
//! ```
//! use qrgrid::{EcLevel, QrCode, QrStyle};
//!
//! // Encode some data into a module grid.
//! let code = QrCode::encode_text("Hello, grid!", EcLevel::M).unwrap();
//!
//! // Render the grid into an SVG image.
//! let style = QrStyle::default();
//! let svg = code.to_svg(&style);
//! assert!(svg.starts_with("<?xml"));
//! ```

pub mod bits;
pub mod canvas;
pub mod coding;
pub mod ec;
mod render;
pub mod types;

use crate::bits::BitBuffer;
use crate::canvas::Canvas;

pub use crate::canvas::alignment_pattern_positions;
pub use crate::coding::{Mode, Segment};
pub use crate::ec::{data_codewords, raw_modules};
pub use crate::types::{
    Color, EcLevel, Mask, ModuleType, QrError, QrResult, Version,
};

/// Rendering options for the SVG and pixmap output.
#[derive(Debug)]
pub struct QrStyle {
    /// Fill color of the data modules.
    pub color: String,
    /// Fill color of the function modules; `None` paints them like data.
    pub function_color: Option<String>,
    pub background_color: String,
    /// Output image width. The output is square.
    pub width: u32,
    /// Size of the quiet zone around the QR code, measured in terms of a
    /// single module size.
    pub quiet_zone: f64,
}

impl QrStyle {
    pub fn new(
        color: impl Into<String>,
        background_color: impl Into<String>,
        width: u32,
        quiet_zone: f64,
    ) -> Self {
        Self {
            color: color.into(),
            function_color: None,
            background_color: background_color.into(),
            width,
            quiet_zone,
        }
    }
}

impl Default for QrStyle {
    fn default() -> Self {
        Self {
            color: String::from("#000000"),
            function_color: None,
            background_color: String::from("#ffffff"),
            width: 720,
            quiet_zone: 2.0,
        }
    }
}

/// An encoded QR code symbol: the module grid plus the type of every
/// module. Immutable once constructed, and safe to share between readers.
#[derive(Debug, Clone)]
pub struct QrCode {
    content: Vec<Color>,
    module_types: Vec<ModuleType>,
    version: Version,
    ec_level: EcLevel,
    mask: Mask,
    size: usize,
}

impl QrCode {
    /// Encodes a Unicode string at the given error correction level.
    ///
    /// The whole string is encoded in the first applicable of numeric,
    /// alphanumeric and byte mode. The smallest version that fits is
    /// chosen automatically over the full range, the mask is selected by
    /// penalty score, and the error correction level is raised as far as
    /// the chosen version allows.
    ///
    ///     use qrgrid::{EcLevel, QrCode};
    ///
    ///     let code = QrCode::encode_text("HELLO WORLD", EcLevel::M).unwrap();
    ///     assert_eq!(code.size(), 21);
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::DataTooLong)` if the data does not fit
    /// version 40 at the requested level.
    pub fn encode_text(text: &str, ec_level: EcLevel) -> QrResult<Self> {
        let segments = Segment::make_segments(text)?;
        Self::encode_segments(&segments, ec_level, Version::MIN, Version::MAX, None, true)
    }

    /// Encodes binary data in byte mode with full control over the version
    /// range, mask and error correction boosting.
    ///
    /// Pass `None` as the mask to select it by penalty score.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::InvalidValue)` if
    /// `min_version > max_version`, and `Err(QrError::DataTooLong)` if the
    /// data does not fit `max_version` at the requested level.
    pub fn encode_binary(
        data: &[u8],
        ec_level: EcLevel,
        min_version: Version,
        max_version: Version,
        mask: Option<Mask>,
        boost_ecl: bool,
    ) -> QrResult<Self> {
        let segment = Segment::bytes(data)?;
        Self::encode_segments(&[segment], ec_level, min_version, max_version, mask, boost_ecl)
    }

    /// Encodes a custom sequence of segments.
    ///
    /// The smallest version in `min_version..=max_version` whose capacity
    /// at `ec_level` holds the segments is chosen. If `boost_ecl` is set,
    /// the level is then raised to the highest one that still fits the
    /// chosen version. The bit stream is assembled as mode indicator,
    /// character count and payload per segment, followed by the
    /// terminator, padding to a codeword boundary, and alternating
    /// `0xEC`/`0x11` padding codewords.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::InvalidValue)` if
    /// `min_version > max_version`, and `Err(QrError::DataTooLong)` if no
    /// version in the range fits the segments.
    pub fn encode_segments(
        segments: &[Segment],
        ec_level: EcLevel,
        min_version: Version,
        max_version: Version,
        mask: Option<Mask>,
        boost_ecl: bool,
    ) -> QrResult<Self> {
        if min_version > max_version {
            return Err(QrError::InvalidValue);
        }

        // Find the smallest version whose capacity holds the data.
        let mut version = min_version;
        let used = loop {
            let capacity = ec::data_codewords(version, ec_level) * 8;
            match Segment::total_bits(segments, version) {
                Some(used) if used <= capacity => break used,
                _ => {}
            }
            if version >= max_version {
                let needed = Segment::total_bits(segments, max_version)
                    .unwrap_or_else(|| segments.iter().map(|s| 4 + s.bits().len()).sum());
                return Err(QrError::DataTooLong(needed, capacity));
            }
            version = Version(version.value() + 1);
        };

        // Raise the level while the data still fits the chosen version.
        let mut ec_level = ec_level;
        if boost_ecl {
            for new_level in [EcLevel::M, EcLevel::Q, EcLevel::H] {
                if used <= ec::data_codewords(version, new_level) * 8 {
                    ec_level = new_level;
                }
            }
        }

        // Concatenate the segments into the data bit stream.
        let capacity = ec::data_codewords(version, ec_level) * 8;
        let mut buffer = BitBuffer::with_capacity(capacity);
        for segment in segments {
            buffer.append_bits(segment.mode().indicator(), 4)?;
            buffer.append_bits(
                segment.num_chars() as u32,
                segment.mode().length_bits_count(version),
            )?;
            buffer.append_buffer(segment.bits())?;
        }
        debug_assert_eq!(buffer.len(), used);

        // Terminator, then zero bits up to a codeword boundary.
        buffer.append_bits(0, (capacity - buffer.len()).min(4))?;
        buffer.append_bits(0, (8 - buffer.len() % 8) % 8)?;

        // Alternating padding codewords fill the remaining capacity.
        for &padding in [0xEC_u32, 0x11].iter().cycle() {
            if buffer.len() >= capacity {
                break;
            }
            buffer.append_bits(padding, 8)?;
        }
        assert_eq!(buffer.len(), capacity);

        Self::with_codewords(version, ec_level, &buffer.into_bytes(), mask)
    }

    /// Constructs a symbol from raw data codewords, including segment
    /// headers and padding but excluding error correction.
    ///
    /// Use this only to manipulate the codeword stream directly; the
    /// `encode_*` functions cover the usual cases.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::InvalidValue)` if the slice length is not
    /// exactly `data_codewords(version, ec_level)`.
    pub fn with_codewords(
        version: Version,
        ec_level: EcLevel,
        data: &[u8],
        mask: Option<Mask>,
    ) -> QrResult<Self> {
        let (data_stream, ecc_stream) = ec::construct_codewords(data, version, ec_level)?;
        let mut canvas = Canvas::new(version, ec_level);
        canvas.draw_all_functional_patterns();
        canvas.draw_data(&data_stream, &ecc_stream);
        let mask = canvas.apply_best_mask(mask);
        let (content, module_types) = canvas.into_grids();
        Ok(Self {
            content,
            module_types,
            version,
            ec_level,
            mask,
            size: version.size(),
        })
    }

    /// Gets the version of this QR code.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Gets the error correction level of this QR code.
    pub fn error_correction_level(&self) -> EcLevel {
        self.ec_level
    }

    /// Gets the mask applied to this QR code. Even when the mask was
    /// selected automatically, this is the concrete pattern number.
    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// Gets the number of modules per side.
    ///
    /// This does not include any quiet zone paddings.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the module at the given coordinates is dark. The top left
    /// corner is (0, 0).
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::IndexOutOfRange)` if either coordinate is
    /// `size()` or more.
    pub fn module(&self, x: usize, y: usize) -> QrResult<bool> {
        if x >= self.size || y >= self.size {
            return Err(QrError::IndexOutOfRange);
        }
        Ok(self.content[y * self.size + x] == Color::Dark)
    }

    /// The role of the module at the given coordinates.
    ///
    /// # Errors
    ///
    /// Returns `Err(QrError::IndexOutOfRange)` if either coordinate is
    /// `size()` or more.
    pub fn module_type(&self, x: usize, y: usize) -> QrResult<ModuleType> {
        if x >= self.size || y >= self.size {
            return Err(QrError::IndexOutOfRange);
        }
        Ok(self.module_types[y * self.size + x])
    }

    /// Converts the QR code to a vector of colors.
    pub fn to_colors(&self) -> Vec<Color> {
        self.content.clone()
    }

    /// Converts the QR code into a vector of colors.
    pub fn into_colors(self) -> Vec<Color> {
        self.content
    }

    /// Converts the QR code into a human-readable string.
    pub fn to_str(&self, dark: char, light: char) -> String {
        let mut s = String::new();
        for y in 0..self.size {
            for x in 0..self.size {
                let color = self.content[y * self.size + x];
                s.push(color.select(dark, light));
            }
            s.push('\n');
        }
        s
    }
}

impl QrCode {
    /// Returns the viewbox side length and the output image width and
    /// height in pixels.
    pub fn image_sizes(&self, style: &QrStyle) -> (f64, u32, u32) {
        let viewbox = self.size as f64 + style.quiet_zone * 2.0;
        (viewbox, style.width, style.width)
    }

    /// Converts the QR code to a minimal SVG string without a quiet zone.
    pub fn to_simple_svg(&self) -> String {
        let style = QrStyle {
            quiet_zone: 0.0,
            width: self.size as u32,
            ..Default::default()
        };
        self.to_svg(&style)
    }

    /// Converts the QR code to an SVG string, one path per module type.
    pub fn to_svg(&self, style: &QrStyle) -> String {
        let paths = render::dark_module_paths(self);
        let quiet = style.quiet_zone;
        let (viewbox, image_width, image_height) = self.image_sizes(style);

        let mut shapes = String::new();
        for kind in ModuleType::ALL {
            if let Some(d) = paths.get(&kind) {
                let fill = if kind.is_function() {
                    style.function_color.as_deref().unwrap_or(&style.color)
                } else {
                    style.color.as_str()
                };
                shapes.push_str(&format!(
                    r#"<path fill="{fill}" transform="translate({quiet},{quiet})" d="{d}"/>"#,
                ));
                shapes.push('\n');
            }
        }

        let background_color = &style.background_color;
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" version="1.1" width="{image_width}" height="{image_height}" viewBox="0 0 {viewbox} {viewbox}">
<rect x="0" y="0" width="{viewbox}" height="{viewbox}" fill="{background_color}"/>
{shapes}</svg>"#,
        )
    }

    /// Saves the QR code to an SVG file.
    pub fn save_svg<P: AsRef<std::path::Path>>(
        &self,
        path: P,
        style: &QrStyle,
    ) -> std::io::Result<()> {
        let svg_string = self.to_svg(style);
        std::fs::write(path, svg_string)
    }
}

impl QrCode {
    /// Converts the QR code to a tiny-skia pixmap.
    pub fn to_pixmap(
        &self,
        style: &QrStyle,
    ) -> Result<resvg::tiny_skia::Pixmap, Box<dyn std::error::Error>> {
        let (_, width, height) = self.image_sizes(style);
        let svg_string = self.to_svg(style);
        let opt = resvg::usvg::Options::default();
        let tree = &resvg::usvg::TreeParsing::from_str(&svg_string, &opt)?;
        let mut pixmap =
            resvg::tiny_skia::Pixmap::new(width, height).ok_or("failed to create pixmap")?;
        resvg::Tree::from_usvg(tree)
            .render(resvg::tiny_skia::Transform::default(), &mut pixmap.as_mut());
        Ok(pixmap)
    }

    /// Saves the QR code to a PNG file.
    pub fn save_png<P: AsRef<std::path::Path>>(
        &self,
        path: P,
        style: &QrStyle,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let pixmap = self.to_pixmap(style)?;
        pixmap.save_png(path)?;
        Ok(())
    }

    /// Encodes the QR code into PNG data.
    pub fn to_png(&self, style: &QrStyle) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let pixmap = self.to_pixmap(style)?;
        Ok(pixmap.encode_png()?)
    }
}



#[cfg(test)]
mod image_tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_save_png() {
        let test_dir = TempDir::new("__test__").unwrap();
        let path = test_dir.path().join("grid.png");
        let code = QrCode::encode_text("Hello, grid!", EcLevel::M).unwrap();
        let style = QrStyle::default();
        code.save_png(path, &style).unwrap();
    }

    #[test]
    fn test_save_svg() {
        let test_dir = TempDir::new("__test__").unwrap();
        let path = test_dir.path().join("grid.svg");
        let code = QrCode::encode_text("Hello, grid!", EcLevel::M).unwrap();
        let style = QrStyle::default();
        code.save_svg(&path, &style).unwrap();
        let svg = std::fs::read_to_string(path).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_function_color_styling() {
        let code = QrCode::encode_text("TYPED", EcLevel::L).unwrap();
        let mut style = QrStyle::default();
        style.function_color = Some(String::from("#336699"));
        let svg = code.to_svg(&style);
        assert!(svg.contains(r##"fill="#336699""##));
        assert!(svg.contains(r##"fill="#000000""##));

        let plain = code.to_simple_svg();
        assert!(!plain.contains("#336699"));
    }
}
