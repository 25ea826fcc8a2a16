use std::{fs::read, path::Path};

use crate::{
    compose::{to_container, ColorImage, ContainerParts},
    container::{BmpHeader, RawContainer, ThermalPlane},
    error::{Advised, Advisory, Result},
    metadata::CalibrationRecord,
    palette::{Palette, PaletteSpec},
    temperature::{corrected_map, linear_map, TemperatureField},
};

/// A decoded thermal-camera BMP.
#[derive(Clone, Debug)]
pub struct ThermalImage {
    pub header: BmpHeader,
    /// The camera's own rendering, overlays included.
    pub visual: ColorImage,
    pub plane: ThermalPlane,
    /// The palette stored by the camera.
    pub palette: Palette,
    pub calibration: CalibrationRecord,
    /// Raised while decoding the metadata block.
    pub advisories: Vec<Advisory>,
}

impl ThermalImage {
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let container = RawContainer::parse(bytes)?;
        let (width, height) = container.dimensions();
        let Advised {
            value: calibration,
            advisories,
        } = CalibrationRecord::decode(container.metadata_bytes())?;

        Ok(ThermalImage {
            header: container.header().clone(),
            visual: ColorImage::from_bmp_bgr(container.visual_bytes(), width, height)?,
            plane: container.thermal_plane()?,
            palette: Palette::from_camera_bytes(container.palette_bytes())?,
            calibration,
            advisories,
        })
    }

    pub fn try_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let image = Self::try_from_bytes(&read(path)?)?;
        tracing::debug!(path = %path.display(), "parsed thermal image");
        Ok(image)
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (usize, usize) {
        self.plane.dimensions()
    }

    /// Per-pixel temperatures in the record's unit. The
    /// corrected mapping falls back to the linear one when the
    /// center anchor is unusable.
    pub fn temperatures(&self, corrected: bool) -> Advised<TemperatureField> {
        if corrected {
            corrected_map(&self.plane, &self.calibration)
        } else {
            Advised::clean(linear_map(&self.plane, &self.calibration))
        }
    }

    /// The thermal plane rendered through `spec`, starting
    /// from the camera palette.
    pub fn render(&self, spec: &PaletteSpec) -> ColorImage {
        ColorImage::compose(&self.plane, &spec.resolve(&self.palette))
    }

    /// A cleaned container: the plane re-rendered through
    /// `spec`, without the camera's overlays.
    pub fn to_container(&self, spec: &PaletteSpec, capture_time: u32) -> Result<Vec<u8>> {
        let palette = spec.resolve(&self.palette);
        let image = ColorImage::compose(&self.plane, &palette);
        to_container(&ContainerParts {
            image: &image,
            thermal: Some(&self.plane),
            palette: &palette,
            calibration: &self.calibration,
            capture_time,
        })
    }
}
