//! Split a camera BMP into its four blocks.
//!
//! The camera writes an ordinary 24-bit BMP (the visual
//! image, overlays included) and appends three blocks after
//! the pixel data:
//!
//! - 0: BMP header, 53 bytes; width @ 18, height @ 22
//! - 53: visual BGR plane, `3 * W * H` bytes
//! - ..: thermal grayscale plane, `W * H` bytes
//! - ..: palette, 256 packed 5-6-5 colors (512 bytes)
//! - ..: metadata, 25 bytes
//! - ..: capture timestamp, 4 bytes (only in files written
//!   by this crate)
//!
//! Block sizes are fully determined by the dimensions, so
//! the total length is checked exactly.

use std::{io::Write, ops::Range};

use byteordered::ByteOrdered;
use ndarray::{Array2, ArrayView2};
use serde_derive::Serialize;

use crate::{
    error::{Result, ThermalError},
    metadata::Position,
    parse::parse_le,
};

pub const HEADER_LEN: usize = 53;
pub const PALETTE_LEN: usize = 512;
pub const METADATA_LEN: usize = 25;
pub const TIMESTAMP_LEN: usize = 4;

pub const BMP_MAGIC: [u8; 2] = *b"BM";
const INFO_HEADER_LEN: u32 = 40;

/// Brightness value marking a pixel without a valid reading.
pub const INVALID_BRIGHTNESS: u8 = 255;
/// Largest valid brightness; maps to the recorded maximum.
pub const MAX_BRIGHTNESS: u8 = 254;

declare_parseable_struct! {
    /// The BMP file and info headers, as laid out by the
    /// camera. The `important_colors` field is cut short
    /// to three bytes.
    #[derive(Serialize, Clone, Debug, PartialEq, Eq)]
    pub struct BmpHeader {
        #format => |e| format!("parsing BMP header field `{}`", e),
        pub magic => [u8; 2],
        pub file_size => u32,
        pub reserved => [u16; 2],
        pub data_offset => u32,
        pub info_size => u32,
        pub width => i32,
        pub height => i32,
        pub planes => u16,
        pub bits_per_pixel => u16,
        pub compression => u32,
        pub image_size => u32,
        pub x_pixels_per_meter => i32,
        pub y_pixels_per_meter => i32,
        pub colors_used => u32,
        pub important_colors => [u8; 3],
    }
}

impl BmpHeader {
    /// Header for a container holding a `width` x `height`
    /// image. `file_size` points past the visual plane, where
    /// the camera's trailing blocks begin.
    pub fn for_layout(layout: &Layout) -> Result<Self> {
        let width = i32_field("width", layout.width)?;
        let height = i32_field("height", layout.height)?;
        let image_size = u32_field("image_size", layout.visual_len())?;
        let file_size = u32_field("file_size", HEADER_LEN + layout.visual_len())?;
        Ok(BmpHeader {
            magic: BMP_MAGIC,
            file_size,
            reserved: [0, 0],
            data_offset: HEADER_LEN as u32,
            info_size: INFO_HEADER_LEN,
            width,
            height,
            planes: 1,
            bits_per_pixel: 24,
            compression: 0,
            image_size,
            x_pixels_per_meter: 0,
            y_pixels_per_meter: 0,
            colors_used: 0,
            important_colors: [0; 3],
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut wtr = ByteOrdered::le(Vec::with_capacity(HEADER_LEN));
        wtr.write_all(&self.magic)?;
        wtr.write_u32(self.file_size)?;
        for r in self.reserved.iter() {
            wtr.write_u16(*r)?;
        }
        wtr.write_u32(self.data_offset)?;
        wtr.write_u32(self.info_size)?;
        wtr.write_i32(self.width)?;
        wtr.write_i32(self.height)?;
        wtr.write_u16(self.planes)?;
        wtr.write_u16(self.bits_per_pixel)?;
        wtr.write_u32(self.compression)?;
        wtr.write_u32(self.image_size)?;
        wtr.write_i32(self.x_pixels_per_meter)?;
        wtr.write_i32(self.y_pixels_per_meter)?;
        wtr.write_u32(self.colors_used)?;
        wtr.write_all(&self.important_colors)?;
        let bytes = wtr.into_inner();
        debug_assert_eq!(bytes.len(), HEADER_LEN);
        Ok(bytes)
    }
}

fn i32_field(field: &'static str, value: usize) -> Result<i32> {
    use std::convert::TryFrom;
    i32::try_from(value).map_err(|_| ThermalError::UnrepresentableField {
        field,
        value: value as i64,
    })
}

fn u32_field(field: &'static str, value: usize) -> Result<u32> {
    use std::convert::TryFrom;
    u32::try_from(value).map_err(|_| ThermalError::UnrepresentableField {
        field,
        value: value as i64,
    })
}

/// Block boundaries of a container with given dimensions.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub width: usize,
    pub height: usize,
}

impl Layout {
    pub fn new(width: usize, height: usize) -> Self {
        Layout { width, height }
    }

    pub fn pixels(&self) -> usize {
        self.width * self.height
    }

    pub fn visual_len(&self) -> usize {
        3 * self.pixels()
    }

    pub fn visual_range(&self) -> Range<usize> {
        HEADER_LEN..HEADER_LEN + self.visual_len()
    }

    pub fn thermal_range(&self) -> Range<usize> {
        let start = self.visual_range().end;
        start..start + self.pixels()
    }

    pub fn palette_range(&self) -> Range<usize> {
        let start = self.thermal_range().end;
        start..start + PALETTE_LEN
    }

    pub fn metadata_range(&self) -> Range<usize> {
        let start = self.palette_range().end;
        start..start + METADATA_LEN
    }

    /// Total container length; `None` if it does not fit in
    /// `usize`.
    pub fn expected_len(&self, with_timestamp: bool) -> Option<usize> {
        let trailer = PALETTE_LEN + METADATA_LEN + if with_timestamp { TIMESTAMP_LEN } else { 0 };
        self.width
            .checked_mul(self.height)?
            .checked_mul(4)?
            .checked_add(HEADER_LEN + trailer)
    }
}

/// A validated view into the bytes of one camera file.
#[derive(Debug)]
pub struct RawContainer<'a> {
    header: BmpHeader,
    layout: Layout,
    bytes: &'a [u8],
    has_timestamp: bool,
}

impl<'a> RawContainer<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(malformed(format!(
                "buffer of {} bytes is shorter than the {}-byte header",
                bytes.len(),
                HEADER_LEN
            )));
        }
        let header: BmpHeader =
            parse_le(&bytes[..HEADER_LEN]).map_err(|e| malformed(format!("{:#}", e)))?;

        if header.magic != BMP_MAGIC {
            return Err(malformed(format!(
                "unexpected signature {:02x?}",
                header.magic
            )));
        }
        if header.width <= 0 || header.height <= 0 {
            return Err(malformed(format!(
                "invalid dimensions: {}x{}",
                header.width, header.height
            )));
        }

        let layout = Layout::new(header.width as usize, header.height as usize);
        let expected = layout
            .expected_len(false)
            .ok_or_else(|| malformed(format!("dimensions {}x{} overflow", layout.width, layout.height)))?;
        let has_timestamp = match bytes.len() {
            n if n == expected => false,
            n if expected.checked_add(TIMESTAMP_LEN) == Some(n) => true,
            n => {
                return Err(malformed(format!(
                    "size mismatch for {}x{}: expected {} or {} bytes, found {}",
                    layout.width,
                    layout.height,
                    expected,
                    expected.saturating_add(TIMESTAMP_LEN),
                    n
                )))
            }
        };

        if header.file_size as usize != layout.visual_range().end {
            tracing::debug!(
                file_size = header.file_size,
                expected = layout.visual_range().end,
                "BMP file size field does not point at the thermal block"
            );
        }
        tracing::debug!(
            width = layout.width,
            height = layout.height,
            has_timestamp,
            "parsed container"
        );

        Ok(RawContainer {
            header,
            layout,
            bytes,
            has_timestamp,
        })
    }

    pub fn header(&self) -> &BmpHeader {
        &self.header
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.layout.width, self.layout.height)
    }

    pub fn has_timestamp(&self) -> bool {
        self.has_timestamp
    }

    pub fn header_bytes(&self) -> &'a [u8] {
        &self.bytes[..HEADER_LEN]
    }

    /// Visual BGR pixels, bottom-up rows as in any BMP.
    pub fn visual_bytes(&self) -> &'a [u8] {
        &self.bytes[self.layout.visual_range()]
    }

    pub fn thermal_bytes(&self) -> &'a [u8] {
        &self.bytes[self.layout.thermal_range()]
    }

    pub fn palette_bytes(&self) -> &'a [u8] {
        &self.bytes[self.layout.palette_range()]
    }

    /// The metadata block, including the trailing timestamp
    /// when the file carries one.
    pub fn metadata_bytes(&self) -> &'a [u8] {
        &self.bytes[self.layout.metadata_range().start..]
    }

    /// Copy of the thermal plane, independent of the input
    /// buffer.
    pub fn thermal_plane(&self) -> Result<ThermalPlane> {
        ThermalPlane::from_shape_vec(
            self.layout.width,
            self.layout.height,
            self.thermal_bytes().to_vec(),
        )
    }
}

fn malformed(msg: String) -> ThermalError {
    ThermalError::MalformedContainer(msg)
}

/// Row-major grid of 8-bit sensor brightness, shaped
/// `(height, width)`.
///
/// Valid samples are in `0..=254`; [`INVALID_BRIGHTNESS`]
/// marks pixels without a reading.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThermalPlane {
    data: Array2<u8>,
}

impl ThermalPlane {
    pub fn from_shape_vec(width: usize, height: usize, samples: Vec<u8>) -> Result<Self> {
        let found = samples.len();
        let data = Array2::from_shape_vec((height, width), samples).map_err(|_| {
            match width.checked_mul(height) {
                Some(needed) => malformed(format!(
                    "thermal plane of {}x{} needs {} samples, found {}",
                    width, height, needed, found
                )),
                None => malformed(format!("thermal plane of {}x{} is too large", width, height)),
            }
        })?;
        Ok(ThermalPlane { data })
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        self.data.get((y, x)).copied()
    }

    pub fn at(&self, pos: Position) -> Option<u8> {
        self.get(pos.x as usize, pos.y as usize)
    }

    pub fn view(&self) -> ArrayView2<'_, u8> {
        self.data.view()
    }

    /// Samples in row-major order, top row first.
    pub fn samples(&self) -> impl Iterator<Item = u8> + '_ {
        self.data.iter().copied()
    }

    pub fn invalid_count(&self) -> usize {
        self.data.iter().filter(|&&b| b == INVALID_BRIGHTNESS).count()
    }
}

impl From<Array2<u8>> for ThermalPlane {
    fn from(data: Array2<u8>) -> Self {
        ThermalPlane { data }
    }
}
