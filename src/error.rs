use std::fmt;

use serde_derive::Serialize;
use thiserror::Error;

/// Unrecoverable failures. All of them are scoped to a single
/// file: a batch keeps going after any of these.
#[derive(Error, Debug)]
pub enum ThermalError {
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    #[error("truncated metadata: expected at least {expected} bytes, found {found}")]
    TruncatedMetadata { expected: usize, found: usize },

    #[error("unknown palette name: `{0}`")]
    UnknownPaletteName(String),

    #[error("field `{field}` cannot be encoded: value {value} out of range")]
    UnrepresentableField { field: &'static str, value: i64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ThermalError>;

/// Metadata ranges whose content is expected to be constant.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReservedSlot {
    /// Bytes 5–6 of the metadata block.
    AfterMinTemp,
    /// Bytes 10–13 of the metadata block.
    AfterEmissivity,
}

/// Why the corrected mapping could not use its center anchor.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateReason {
    /// The center brightness coincides with an end anchor
    /// (0 or 254), collapsing one segment.
    AnchorAtExtreme,
    /// The center pixel carries the invalid value 255.
    InvalidBrightness,
    /// The recorded center coordinate lies outside the plane.
    OutOfBounds,
}

/// Non-fatal findings. Processing continues and the caller
/// decides what to do with them.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// The corrected mapping fell back to the linear one.
    DegenerateCalibration {
        reason: DegenerateReason,
        center_brightness: Option<u8>,
    },
    /// A reserved field differs from its usual constant. The
    /// raw bytes are preserved in the record regardless.
    AnomalousReservedField {
        slot: ReservedSlot,
        expected: Vec<u8>,
        found: Vec<u8>,
    },
    /// The unit byte is neither 0 nor 1. It is read as
    /// Fahrenheit and written back unchanged.
    UnknownUnitCode { code: u8 },
    /// 1 to 3 bytes follow the metadata block: too few for a
    /// timestamp, which is then treated as absent.
    PartialTimestamp { found: usize },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::DegenerateCalibration {
                reason,
                center_brightness,
            } => write!(
                f,
                "degenerate calibration ({:?}, center brightness {:?}): using linear mapping",
                reason, center_brightness
            ),
            Advisory::AnomalousReservedField {
                slot,
                expected,
                found,
            } => write!(
                f,
                "reserved field {:?} is {:?}, expected {:?}",
                slot, found, expected
            ),
            Advisory::UnknownUnitCode { code } => {
                write!(f, "unknown unit code {}: reading as Fahrenheit", code)
            }
            Advisory::PartialTimestamp { found } => write!(
                f,
                "{} trailing bytes after the metadata block: ignoring timestamp",
                found
            ),
        }
    }
}

/// A value together with the advisories raised while
/// producing it.
#[derive(Clone, Debug)]
pub struct Advised<T> {
    pub value: T,
    pub advisories: Vec<Advisory>,
}

impl<T> Advised<T> {
    pub fn clean(value: T) -> Self {
        Advised {
            value,
            advisories: vec![],
        }
    }

    pub fn with(value: T, advisories: Vec<Advisory>) -> Self {
        for advisory in &advisories {
            tracing::warn!(%advisory, "advisory");
        }
        Advised { value, advisories }
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn is_clean(&self) -> bool {
        self.advisories.is_empty()
    }
}
