//! Color lookup tables for rendering the thermal plane.
//!
//! The camera stores its palette as 256 packed 16-bit
//! colors (5 bits red, 6 green, 5 blue). Built-in palettes
//! are generated from fixed color stops, and any palette can
//! be reshaped by composing [`PaletteTransform`]s.

use std::{fmt, ops::Index, str::FromStr};

use byteordered::ByteOrdered;
use serde_derive::Serialize;

use crate::{
    container::PALETTE_LEN,
    error::{Result, ThermalError},
};

pub const PALETTE_SIZE: usize = 256;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Expand a packed 5-6-5 word to 8 bits per channel,
    /// rounding to nearest.
    pub fn from_565(word: u16) -> Self {
        let r = (word >> 11) & 0x1F;
        let g = (word >> 5) & 0x3F;
        let b = word & 0x1F;
        Rgb {
            r: rescale(r, 31, 255) as u8,
            g: rescale(g, 63, 255) as u8,
            b: rescale(b, 31, 255) as u8,
        }
    }

    /// Pack to 5-6-5, quantizing each channel to the nearest
    /// representable value.
    pub fn to_565(self) -> u16 {
        let r = rescale(self.r as u16, 255, 31);
        let g = rescale(self.g as u16, 255, 63);
        let b = rescale(self.b as u16, 255, 31);
        (r << 11) | (g << 5) | b
    }

    pub fn inverted(self) -> Self {
        Rgb::new(255 - self.r, 255 - self.g, 255 - self.b)
    }

    fn lerp(self, other: Rgb, f: f64) -> Rgb {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

#[inline]
fn rescale(value: u16, from_max: u16, to_max: u16) -> u16 {
    (value as f64 * to_max as f64 / from_max as f64).round() as u16
}

/// A 256-entry lookup table from brightness to color.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: [Rgb; PALETTE_SIZE],
}

impl Palette {
    pub fn from_colors(colors: [Rgb; PALETTE_SIZE]) -> Self {
        Palette { colors }
    }

    /// Decode the camera's 512-byte palette block.
    pub fn from_camera_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PALETTE_LEN {
            return Err(ThermalError::MalformedContainer(format!(
                "palette block must be {} bytes, found {}",
                PALETTE_LEN,
                bytes.len()
            )));
        }
        let mut colors = [Rgb::default(); PALETTE_SIZE];
        for (color, word) in colors.iter_mut().zip(bytes.chunks_exact(2)) {
            *color = Rgb::from_565(u16::from_le_bytes([word[0], word[1]]));
        }
        Ok(Palette { colors })
    }

    /// Encode into the camera's 512-byte block.
    pub fn to_camera_bytes(&self) -> Result<Vec<u8>> {
        let mut wtr = ByteOrdered::le(Vec::with_capacity(PALETTE_LEN));
        for color in self.colors.iter() {
            wtr.write_u16(color.to_565())?;
        }
        Ok(wtr.into_inner())
    }

    pub fn builtin(name: &str) -> Result<Self> {
        Ok(name.parse::<BuiltinPalette>()?.palette())
    }

    pub fn colors(&self) -> &[Rgb; PALETTE_SIZE] {
        &self.colors
    }

    pub fn apply(&self, transform: PaletteTransform) -> Palette {
        transform.apply(self)
    }

    /// Apply `transforms` left to right.
    pub fn compose(&self, transforms: &[PaletteTransform]) -> Palette {
        transforms
            .iter()
            .fold(self.clone(), |lut, t| t.apply(&lut))
    }
}

impl Index<u8> for Palette {
    type Output = Rgb;

    fn index(&self, brightness: u8) -> &Rgb {
        &self.colors[brightness as usize]
    }
}

/// Total functions from a palette to a new palette.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaletteTransform {
    /// Entry `i` becomes entry `255 - i`.
    Reverse,
    /// Every channel `c` becomes `255 - c`.
    Invert,
}

impl PaletteTransform {
    pub const ALL: [PaletteTransform; 2] = [PaletteTransform::Reverse, PaletteTransform::Invert];

    pub fn name(self) -> &'static str {
        match self {
            PaletteTransform::Reverse => "reverse",
            PaletteTransform::Invert => "invert",
        }
    }

    pub fn apply(self, palette: &Palette) -> Palette {
        let mut colors = palette.colors;
        match self {
            PaletteTransform::Reverse => colors.reverse(),
            PaletteTransform::Invert => colors.iter_mut().for_each(|c| *c = c.inverted()),
        }
        Palette { colors }
    }
}

impl FromStr for PaletteTransform {
    type Err = ThermalError;

    fn from_str(s: &str) -> Result<Self> {
        PaletteTransform::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| ThermalError::UnknownPaletteName(s.into()))
    }
}

/// The closed set of generated palettes.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinPalette {
    Iron,
    Rainbow,
    WhiteHot,
    RedHot,
    Lava,
    RainbowHc,
}

type Stop = (f64, Rgb);

const BLACK: Rgb = Rgb::new(0, 0, 0);
const WHITE: Rgb = Rgb::new(255, 255, 255);

const WHITE_HOT: &[Stop] = &[(0.0, BLACK), (1.0, WHITE)];
const RED_HOT: &[Stop] = &[(0.0, BLACK), (0.5, Rgb::new(255, 0, 0)), (1.0, WHITE)];
const IRON: &[Stop] = &[
    (0.0, BLACK),
    (0.25, Rgb::new(32, 0, 140)),
    (0.5, Rgb::new(204, 0, 119)),
    (0.75, Rgb::new(255, 165, 0)),
    (1.0, WHITE),
];
const RAINBOW: &[Stop] = &[
    (0.0, Rgb::new(0, 0, 255)),
    (0.25, Rgb::new(0, 255, 255)),
    (0.5, Rgb::new(0, 255, 0)),
    (0.75, Rgb::new(255, 255, 0)),
    (1.0, Rgb::new(255, 0, 0)),
];
const LAVA: &[Stop] = &[
    (0.0, BLACK),
    (0.2, Rgb::new(10, 30, 90)),
    (0.45, Rgb::new(150, 20, 60)),
    (0.7, Rgb::new(240, 90, 0)),
    (0.9, Rgb::new(255, 220, 60)),
    (1.0, WHITE),
];
const RAINBOW_HC: &[Stop] = &[
    (0.0, BLACK),
    (0.1, Rgb::new(80, 0, 160)),
    (0.25, Rgb::new(0, 0, 255)),
    (0.4, Rgb::new(0, 255, 255)),
    (0.55, Rgb::new(0, 255, 0)),
    (0.7, Rgb::new(255, 255, 0)),
    (0.85, Rgb::new(255, 0, 0)),
    (1.0, WHITE),
];

impl BuiltinPalette {
    pub const ALL: [BuiltinPalette; 6] = [
        BuiltinPalette::Iron,
        BuiltinPalette::Rainbow,
        BuiltinPalette::WhiteHot,
        BuiltinPalette::RedHot,
        BuiltinPalette::Lava,
        BuiltinPalette::RainbowHc,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinPalette::Iron => "iron",
            BuiltinPalette::Rainbow => "rainbow",
            BuiltinPalette::WhiteHot => "white_hot",
            BuiltinPalette::RedHot => "red_hot",
            BuiltinPalette::Lava => "lava",
            BuiltinPalette::RainbowHc => "rainbow_hc",
        }
    }

    /// Color stops at positions in `[0, 1]`, ascending, first
    /// at 0 and last at 1.
    pub fn stops(self) -> &'static [(f64, Rgb)] {
        match self {
            BuiltinPalette::Iron => IRON,
            BuiltinPalette::Rainbow => RAINBOW,
            BuiltinPalette::WhiteHot => WHITE_HOT,
            BuiltinPalette::RedHot => RED_HOT,
            BuiltinPalette::Lava => LAVA,
            BuiltinPalette::RainbowHc => RAINBOW_HC,
        }
    }

    pub fn palette(self) -> Palette {
        gradient(self.stops())
    }
}

impl FromStr for BuiltinPalette {
    type Err = ThermalError;

    fn from_str(s: &str) -> Result<Self> {
        BuiltinPalette::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| ThermalError::UnknownPaletteName(s.into()))
    }
}

/// Sample piecewise-linear stops at `i / 255`.
fn gradient(stops: &[Stop]) -> Palette {
    let mut colors = [Rgb::default(); PALETTE_SIZE];
    let mut seg = 0;
    for (i, color) in colors.iter_mut().enumerate() {
        let t = i as f64 / (PALETTE_SIZE - 1) as f64;
        while seg + 2 < stops.len() && t > stops[seg + 1].0 {
            seg += 1;
        }
        let (p0, c0) = stops[seg];
        let (p1, c1) = stops[(seg + 1).min(stops.len() - 1)];
        let f = if p1 > p0 { ((t - p0) / (p1 - p0)).clamp(0., 1.) } else { 0. };
        *color = c0.lerp(c1, f);
    }
    Palette { colors }
}

/// One step of a palette request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaletteStep {
    /// The palette embedded in the file.
    Camera,
    Builtin(BuiltinPalette),
    Transform(PaletteTransform),
}

impl PaletteStep {
    pub fn name(&self) -> &'static str {
        match self {
            PaletteStep::Camera => "camera",
            PaletteStep::Builtin(p) => p.name(),
            PaletteStep::Transform(t) => t.name(),
        }
    }
}

impl FromStr for PaletteStep {
    type Err = ThermalError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "camera" {
            return Ok(PaletteStep::Camera);
        }
        s.parse::<BuiltinPalette>()
            .map(PaletteStep::Builtin)
            .or_else(|_| s.parse::<PaletteTransform>().map(PaletteStep::Transform))
    }
}

/// An ordered palette request, e.g. `white_hot, reverse`.
///
/// Starting from the camera palette, a palette step replaces
/// the current table and a transform step reshapes it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaletteSpec {
    steps: Vec<PaletteStep>,
}

impl PaletteSpec {
    /// Parse tokens in order; each token may itself hold a
    /// comma separated list.
    pub fn parse<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut steps = vec![];
        for token in tokens {
            for part in token.as_ref().split(',').map(str::trim).filter(|p| !p.is_empty()) {
                steps.push(part.parse()?);
            }
        }
        Ok(PaletteSpec { steps })
    }

    pub fn steps(&self) -> &[PaletteStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(PaletteStep::name).collect()
    }

    pub fn resolve(&self, camera: &Palette) -> Palette {
        self.steps
            .iter()
            .fold(camera.clone(), |lut, step| match step {
                PaletteStep::Camera => camera.clone(),
                PaletteStep::Builtin(p) => p.palette(),
                PaletteStep::Transform(t) => t.apply(&lut),
            })
    }
}

impl fmt::Display for PaletteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "camera");
        }
        write!(f, "{}", self.names().join(","))
    }
}
