//! Library to process radiometric BMPs from UNI-T UTi
//! thermal cameras (e.g. the UTi260B).
//!
//! These cameras save a regular 24-bit BMP followed by three
//! extra blocks: an 8-bit thermal plane, the 5-6-5 palette
//! used to render it, and a small metadata block with the
//! calibration (unit, min / max / center temperatures and
//! their positions, emissivity). The crate provides:
//!
//! 1. [Parsing](container::RawContainer) the container into
//! its blocks, and [decoding](metadata::CalibrationRecord)
//! the metadata.
//!
//! 2. Reconstructing approximate [temperatures] from the
//! thermal plane. The camera only stores brightness, so the
//! temperature is interpolated between the recorded min and
//! max. The [corrected](temperature::corrected_map) mapping
//! also anchors the recorded center temperature, which
//! compensates for most of the camera's contrast stretch.
//!
//! 3. Re-rendering the plane through [palettes](palette),
//! built-in or the camera's own, with reverse / invert
//! transforms, and writing the result back as a
//! [camera-compatible container](compose::to_container).
//!
//! # Usage
//!
//! ```rust
//! # fn test_compile() -> uti_thermal::Result<()> {
//! use uti_thermal::{PaletteSpec, ThermalImage};
//!
//! let image = ThermalImage::try_from_path("IMG_0001.bmp")?;
//! let temps = image.temperatures(true).into_inner();
//! println!("mean: {:?}", temps.stats().mean());
//!
//! let spec = PaletteSpec::parse(&["iron", "reverse"])?;
//! let cleaned = image.to_container(&spec, 0)?;
//! std::fs::write("IMG_0001_thermal_rgb.bmp", cleaned)?;
//! # Ok(())
//! # }
//! ```
//!
//! Anything unusual but recoverable (e.g. a center anchor
//! the corrected mapping cannot use) is reported as an
//! [`Advisory`] next to the result, and logged via
//! [`tracing`].
//!
//! [temperatures]: crate::temperature

#[macro_use]
mod parse;

pub mod error;
pub mod container;
pub mod metadata;
pub mod palette;
pub mod temperature;
pub mod compose;
pub mod image;

pub mod cli;
pub mod stats;

pub use crate::error::{Advised, Advisory, Result, ThermalError};
pub use crate::image::ThermalImage;
pub use crate::palette::{Palette, PaletteSpec};
