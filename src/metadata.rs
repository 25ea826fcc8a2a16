//! Calibration metadata embedded after the palette.
//!
//! The block is 25 bytes, little-endian:
//!
//! - 0x00: u8 unit (0 = Celsius, otherwise Fahrenheit)
//! - 0x01: i16 max temperature, tenths of a degree
//! - 0x03: i16 min temperature, tenths of a degree
//! - 0x05: 2 reserved bytes, seen as `ff 00`
//! - 0x07: i16 center temperature, tenths of a degree
//! - 0x09: u8 emissivity, hundredths
//! - 0x0a: 4 reserved bytes, seen as `06 00 00 00`
//! - 0x0e: u16 x, u16 y of the max reading
//! - 0x12: u16 x, u16 y of the min reading
//! - 0x16: u16 x of the center reading
//! - 0x18: u8 y of the center reading (the block ends here)
//!
//! Files written by this crate append a u32 capture
//! timestamp.

use std::{convert::TryFrom, fmt, io::Write, str::FromStr};

use byteordered::ByteOrdered;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_derive::Serialize;

use crate::{
    container::{METADATA_LEN, TIMESTAMP_LEN},
    error::{Advised, Advisory, ReservedSlot, Result, ThermalError},
    parse::parse_le,
};

pub const RESERVED_AFTER_MIN_TEMP: [u8; 2] = [0xFF, 0x00];
pub const RESERVED_AFTER_EMISSIVITY: [u8; 4] = [0x06, 0x00, 0x00, 0x00];

declare_parseable_struct! {
    struct MetadataBlock {
        #format => |e| format!("parsing metadata field `{}`", e),
        unit => u8,
        max_temp => i16,
        min_temp => i16,
        reserved_a => [u8; 2],
        center_temp => i16,
        emissivity => u8,
        reserved_b => [u8; 4],
        max_x => u16,
        max_y => u16,
        min_x => u16,
        min_y => u16,
        center_x => u16,
        center_y => u8 as u16,
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => TemperatureUnit::Celsius,
            _ => TemperatureUnit::Fahrenheit,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            TemperatureUnit::Celsius => 0,
            TemperatureUnit::Fahrenheit => 1,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            TemperatureUnit::Celsius => 'C',
            TemperatureUnit::Fahrenheit => 'F',
        }
    }

    /// Convert a temperature in `self` to `target`.
    pub fn convert(self, value: f64, target: TemperatureUnit) -> f64 {
        use TemperatureUnit::*;
        match (self, target) {
            (Celsius, Fahrenheit) => value * 9. / 5. + 32.,
            (Fahrenheit, Celsius) => (value - 32.) * 5. / 9.,
            _ => value,
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "c" | "celsius" => Ok(TemperatureUnit::Celsius),
            "f" | "fahrenheit" => Ok(TemperatureUnit::Fahrenheit),
            _ => Err(format!("unknown temperature unit: `{}`", s)),
        }
    }
}

/// Pixel coordinate: `x` along the width, `y` down the
/// height.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Default, Hash)]
pub struct Position {
    pub x: u16,
    pub y: u16,
}

impl Position {
    pub fn new(x: u16, y: u16) -> Self {
        Position { x, y }
    }
}

/// Fixed-point value with one decimal digit.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(into = "f64")]
pub struct Tenths(pub i16);

impl Tenths {
    pub fn value(self) -> f64 {
        self.0 as f64 / 10.
    }

    pub fn from_value(field: &'static str, value: f64) -> Result<Self> {
        let scaled = (value * 10.).round();
        if !(i16::MIN as f64..=i16::MAX as f64).contains(&scaled) {
            return Err(ThermalError::UnrepresentableField {
                field,
                value: scaled as i64,
            });
        }
        Ok(Tenths(scaled as i16))
    }
}

impl From<Tenths> for f64 {
    fn from(t: Tenths) -> f64 {
        t.value()
    }
}

/// Fixed-point value with two decimal digits.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(into = "f64")]
pub struct Hundredths(pub u8);

impl Hundredths {
    pub fn value(self) -> f64 {
        self.0 as f64 / 100.
    }
}

impl From<Hundredths> for f64 {
    fn from(h: Hundredths) -> f64 {
        h.value()
    }
}

/// Bytes the camera always fills with the same constant.
/// Kept verbatim so that re-encoding is lossless.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reserved<const N: usize> {
    raw: [u8; N],
    expected: [u8; N],
}

impl<const N: usize> Reserved<N> {
    pub fn new(raw: [u8; N], expected: [u8; N]) -> Self {
        Reserved { raw, expected }
    }

    /// The usual constant, as a camera would write it.
    pub fn expected(expected: [u8; N]) -> Self {
        Reserved {
            raw: expected,
            expected,
        }
    }

    pub fn raw(&self) -> [u8; N] {
        self.raw
    }

    pub fn is_anomalous(&self) -> bool {
        self.raw != self.expected
    }

    fn advisory(&self, slot: ReservedSlot) -> Option<Advisory> {
        self.is_anomalous().then(|| Advisory::AnomalousReservedField {
            slot,
            expected: self.expected.to_vec(),
            found: self.raw.to_vec(),
        })
    }
}

impl<const N: usize> Serialize for Reserved<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("Reserved", 2)?;
        st.serialize_field("raw", &self.raw[..])?;
        st.serialize_field("anomalous", &self.is_anomalous())?;
        st.end()
    }
}

/// Decoded metadata block.
///
/// Temperatures are in [`unit`](Self::unit); nothing here
/// enforces `min <= center <= max`.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CalibrationRecord {
    pub unit: TemperatureUnit,
    /// Unit byte as read. Written back verbatim unless it
    /// disagrees with [`unit`](Self::unit).
    pub unit_code: u8,
    pub max_temp: Tenths,
    pub min_temp: Tenths,
    pub center_temp: Tenths,
    pub emissivity: Hundredths,
    pub max_pos: Position,
    pub min_pos: Position,
    pub center_pos: Position,
    pub reserved_after_min_temp: Reserved<2>,
    pub reserved_after_emissivity: Reserved<4>,
    /// Seconds since the Unix epoch. Only present in files
    /// written by this crate.
    pub timestamp: Option<u32>,
}

impl CalibrationRecord {
    /// A record with the given temperatures, all positions at
    /// the origin, emissivity 0.95 and reserved fields at
    /// their usual values.
    pub fn new(unit: TemperatureUnit, max: f64, min: f64, center: f64) -> Result<Self> {
        Ok(CalibrationRecord {
            unit,
            unit_code: unit.code(),
            max_temp: Tenths::from_value("max_temp", max)?,
            min_temp: Tenths::from_value("min_temp", min)?,
            center_temp: Tenths::from_value("center_temp", center)?,
            emissivity: Hundredths(95),
            max_pos: Position::default(),
            min_pos: Position::default(),
            center_pos: Position::default(),
            reserved_after_min_temp: Reserved::expected(RESERVED_AFTER_MIN_TEMP),
            reserved_after_emissivity: Reserved::expected(RESERVED_AFTER_EMISSIVITY),
            timestamp: None,
        })
    }

    /// Decode the metadata block. `bytes` holds at least the
    /// 25-byte block; 4 more bytes are read as the timestamp,
    /// and 1 to 3 are reported and ignored.
    pub fn decode(bytes: &[u8]) -> Result<Advised<Self>> {
        if bytes.len() < METADATA_LEN {
            return Err(ThermalError::TruncatedMetadata {
                expected: METADATA_LEN,
                found: bytes.len(),
            });
        }
        let block: MetadataBlock = parse_le(&bytes[..METADATA_LEN])
            .map_err(|e| ThermalError::MalformedContainer(format!("{:#}", e)))?;

        let mut advisories = vec![];
        if block.unit > 1 {
            advisories.push(Advisory::UnknownUnitCode { code: block.unit });
        }

        let trailer = &bytes[METADATA_LEN..];
        let timestamp = if trailer.len() >= TIMESTAMP_LEN {
            Some(
                parse_le::<u32>(trailer)
                    .map_err(|e| ThermalError::MalformedContainer(format!("timestamp: {:#}", e)))?,
            )
        } else {
            if !trailer.is_empty() {
                advisories.push(Advisory::PartialTimestamp {
                    found: trailer.len(),
                });
            }
            None
        };

        let record = CalibrationRecord {
            unit: TemperatureUnit::from_code(block.unit),
            unit_code: block.unit,
            max_temp: Tenths(block.max_temp),
            min_temp: Tenths(block.min_temp),
            center_temp: Tenths(block.center_temp),
            emissivity: Hundredths(block.emissivity),
            max_pos: Position::new(block.max_x, block.max_y),
            min_pos: Position::new(block.min_x, block.min_y),
            center_pos: Position::new(block.center_x, block.center_y),
            reserved_after_min_temp: Reserved::new(block.reserved_a, RESERVED_AFTER_MIN_TEMP),
            reserved_after_emissivity: Reserved::new(block.reserved_b, RESERVED_AFTER_EMISSIVITY),
            timestamp,
        };

        advisories.extend(
            record
                .reserved_after_min_temp
                .advisory(ReservedSlot::AfterMinTemp)
                .into_iter()
                .chain(
                    record
                        .reserved_after_emissivity
                        .advisory(ReservedSlot::AfterEmissivity),
                ),
        );
        Ok(Advised::with(record, advisories))
    }

    /// Encode back into the block layout; 29 bytes if a
    /// timestamp is set, 25 otherwise.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let center_y =
            u8::try_from(self.center_pos.y).map_err(|_| ThermalError::UnrepresentableField {
                field: "center_pos.y",
                value: self.center_pos.y as i64,
            })?;

        let unit_code = if TemperatureUnit::from_code(self.unit_code) == self.unit {
            self.unit_code
        } else {
            self.unit.code()
        };

        let mut wtr = ByteOrdered::le(Vec::with_capacity(METADATA_LEN + TIMESTAMP_LEN));
        wtr.write_u8(unit_code)?;
        wtr.write_i16(self.max_temp.0)?;
        wtr.write_i16(self.min_temp.0)?;
        wtr.write_all(&self.reserved_after_min_temp.raw)?;
        wtr.write_i16(self.center_temp.0)?;
        wtr.write_u8(self.emissivity.0)?;
        wtr.write_all(&self.reserved_after_emissivity.raw)?;
        for pos in [self.max_pos, self.min_pos].iter() {
            wtr.write_u16(pos.x)?;
            wtr.write_u16(pos.y)?;
        }
        wtr.write_u16(self.center_pos.x)?;
        wtr.write_u8(center_y)?;
        if let Some(ts) = self.timestamp {
            wtr.write_u32(ts)?;
        }
        Ok(wtr.into_inner())
    }

    pub fn max(&self) -> f64 {
        self.max_temp.value()
    }

    pub fn min(&self) -> f64 {
        self.min_temp.value()
    }

    pub fn center(&self) -> f64 {
        self.center_temp.value()
    }
}
