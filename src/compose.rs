//! Render the thermal plane through a palette, and write
//! camera-compatible containers.

use ndarray::{Array2, ArrayView2};

use crate::{
    container::{BmpHeader, Layout, ThermalPlane, INVALID_BRIGHTNESS},
    error::{Result, ThermalError},
    metadata::CalibrationRecord,
    palette::{Palette, Rgb},
};

/// Color used for pixels without a reading (brightness 255).
pub const INVALID_MARKER: Rgb = Rgb::new(255, 0, 255);

/// RGB pixels shaped `(height, width)`, top row first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorImage {
    pixels: Array2<Rgb>,
}

impl ColorImage {
    /// Look up every sample of `plane` in `palette`. Invalid
    /// samples become [`INVALID_MARKER`].
    pub fn compose(plane: &ThermalPlane, palette: &Palette) -> Self {
        let pixels = plane.view().mapv(|b| {
            if b == INVALID_BRIGHTNESS {
                INVALID_MARKER
            } else {
                palette[b]
            }
        });
        ColorImage { pixels }
    }

    /// Decode 24-bit BMP pixel data: BGR triples, bottom row
    /// first, no row padding.
    pub fn from_bmp_bgr(bytes: &[u8], width: usize, height: usize) -> Result<Self> {
        let needed = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| {
                ThermalError::MalformedContainer(format!(
                    "visual plane of {}x{} is too large",
                    width, height
                ))
            })?;
        if bytes.len() != needed {
            return Err(ThermalError::MalformedContainer(format!(
                "visual plane of {}x{} needs {} bytes, found {}",
                width,
                height,
                needed,
                bytes.len()
            )));
        }
        let mut pixels = Array2::from_elem((height, width), Rgb::default());
        for (row, line) in bytes.chunks_exact(3 * width.max(1)).enumerate() {
            let y = height - 1 - row;
            for (x, bgr) in line.chunks_exact(3).enumerate() {
                pixels[(y, x)] = Rgb::new(bgr[2], bgr[1], bgr[0]);
            }
        }
        Ok(ColorImage { pixels })
    }

    /// Inverse of [`from_bmp_bgr`](Self::from_bmp_bgr).
    pub fn to_bmp_bgr(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 * self.pixels.len());
        for row in self.pixels.outer_iter().rev() {
            for px in row.iter() {
                out.extend_from_slice(&[px.b, px.g, px.r]);
            }
        }
        out
    }

    /// RGB triples, top row first.
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 * self.pixels.len());
        for px in self.pixels.iter() {
            out.extend_from_slice(&[px.r, px.g, px.b]);
        }
        out
    }

    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Rgb> {
        self.pixels.get((y, x)).copied()
    }

    pub fn view(&self) -> ArrayView2<'_, Rgb> {
        self.pixels.view()
    }
}

/// Everything needed to write a container.
#[derive(Clone, Copy, Debug)]
pub struct ContainerParts<'a> {
    /// Written as the visual BMP image.
    pub image: &'a ColorImage,
    /// Written as the thermal block; zeros when absent.
    pub thermal: Option<&'a ThermalPlane>,
    pub palette: &'a Palette,
    pub calibration: &'a CalibrationRecord,
    /// Timestamp to append when the record carries none.
    pub capture_time: u32,
}

/// Serialize a container the camera's tools can read back:
/// header, visual plane, thermal plane, palette, metadata and
/// a trailing timestamp.
pub fn to_container(parts: &ContainerParts<'_>) -> Result<Vec<u8>> {
    let (width, height) = parts.image.dimensions();
    if let Some(thermal) = parts.thermal {
        if thermal.dimensions() != (width, height) {
            return Err(ThermalError::MalformedContainer(format!(
                "thermal plane is {}x{} but image is {}x{}",
                thermal.width(),
                thermal.height(),
                width,
                height
            )));
        }
    }

    let layout = Layout::new(width, height);
    let mut calibration = parts.calibration.clone();
    calibration.timestamp = Some(calibration.timestamp.unwrap_or(parts.capture_time));

    let total = layout.expected_len(true).ok_or_else(|| {
        ThermalError::MalformedContainer(format!("{}x{} container is too large", width, height))
    })?;
    let mut out = BmpHeader::for_layout(&layout)?.to_bytes()?;
    out.reserve(total.saturating_sub(out.len()));
    out.extend(parts.image.to_bmp_bgr());
    match parts.thermal {
        Some(thermal) => out.extend(thermal.samples()),
        None => out.resize(out.len() + layout.pixels(), 0),
    }
    out.extend(parts.palette.to_camera_bytes()?);
    out.extend(calibration.to_bytes()?);

    tracing::debug!(width, height, len = out.len(), "wrote container");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        container::RawContainer,
        metadata::{Position, TemperatureUnit},
        palette::BuiltinPalette,
    };

    fn plane() -> ThermalPlane {
        ThermalPlane::from_shape_vec(3, 2, vec![0, 100, 254, 255, 7, 128]).unwrap()
    }

    fn record() -> CalibrationRecord {
        let mut cal = CalibrationRecord::new(TemperatureUnit::Celsius, 42.0, 20.0, 25.0).unwrap();
        cal.center_pos = Position::new(1, 1);
        cal.max_pos = Position::new(2, 0);
        cal
    }

    #[test]
    fn compose_uses_palette_and_marks_invalid() {
        let palette = BuiltinPalette::WhiteHot.palette();
        let image = ColorImage::compose(&plane(), &palette);
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get(0, 0), Some(Rgb::new(0, 0, 0)));
        assert_eq!(image.get(1, 0), Some(Rgb::new(100, 100, 100)));
        assert_eq!(image.get(2, 0), Some(Rgb::new(254, 254, 254)));
        assert_eq!(image.get(0, 1), Some(INVALID_MARKER));
        assert_eq!(image.get(2, 1), Some(Rgb::new(128, 128, 128)));
    }

    #[test]
    fn bmp_rows_are_bottom_up_bgr() {
        let image = ColorImage::compose(&plane(), &BuiltinPalette::Rainbow.palette());
        let bgr = image.to_bmp_bgr();
        assert_eq!(bgr.len(), 18);
        // first triple is the bottom-left pixel, the invalid one
        assert_eq!(&bgr[..3], &[255, 0, 255]);
        let rainbow = BuiltinPalette::Rainbow.palette();
        let top_left = rainbow[0];
        assert_eq!(&bgr[9..12], &[top_left.b, top_left.g, top_left.r]);

        let back = ColorImage::from_bmp_bgr(&bgr, 3, 2).unwrap();
        assert_eq!(back, image);
        assert!(ColorImage::from_bmp_bgr(&bgr[1..], 3, 2).is_err());
    }

    #[test]
    fn oversized_visual_dimensions_are_rejected() {
        for (w, h) in [(usize::MAX, 2), (usize::MAX / 3 + 1, 1), (1 << 40, 1 << 40)] {
            assert!(matches!(
                ColorImage::from_bmp_bgr(&[], w, h),
                Err(ThermalError::MalformedContainer(_))
            ));
        }
    }

    #[test]
    fn rgb_bytes_are_top_down() {
        let image = ColorImage::compose(&plane(), &BuiltinPalette::WhiteHot.palette());
        let rgb = image.to_rgb_bytes();
        assert_eq!(rgb.len(), 18);
        assert_eq!(&rgb[3..6], &[100, 100, 100]);
        assert_eq!(&rgb[9..12], &[255, 0, 255]);
    }

    #[test]
    fn written_container_parses_back() {
        let plane = plane();
        let palette = BuiltinPalette::Iron.palette();
        let image = ColorImage::compose(&plane, &palette);
        let cal = record();
        let bytes = to_container(&ContainerParts {
            image: &image,
            thermal: Some(&plane),
            palette: &palette,
            calibration: &cal,
            capture_time: 1_700_000_000,
        })
        .unwrap();
        assert_eq!(bytes.len(), 53 + 4 * 6 + 512 + 25 + 4);

        let c = RawContainer::parse(&bytes).unwrap();
        assert!(c.has_timestamp());
        assert_eq!(c.thermal_plane().unwrap(), plane);
        assert_eq!(Palette::from_camera_bytes(c.palette_bytes()).unwrap(), palette);
        assert_eq!(ColorImage::from_bmp_bgr(c.visual_bytes(), 3, 2).unwrap(), image);

        let decoded = CalibrationRecord::decode(c.metadata_bytes()).unwrap();
        assert!(decoded.is_clean());
        let mut expected = cal;
        expected.timestamp = Some(1_700_000_000);
        assert_eq!(decoded.value, expected);
    }

    #[test]
    fn existing_timestamp_is_kept() {
        let plane = plane();
        let palette = BuiltinPalette::Lava.palette();
        let image = ColorImage::compose(&plane, &palette);
        let mut cal = record();
        cal.timestamp = Some(1234);
        let bytes = to_container(&ContainerParts {
            image: &image,
            thermal: Some(&plane),
            palette: &palette,
            calibration: &cal,
            capture_time: 99,
        })
        .unwrap();
        assert_eq!(&bytes[bytes.len() - 4..], &1234u32.to_le_bytes());
    }

    #[test]
    fn missing_plane_is_filled_with_zeros() {
        let palette = BuiltinPalette::WhiteHot.palette();
        let image = ColorImage::compose(&plane(), &palette);
        let bytes = to_container(&ContainerParts {
            image: &image,
            thermal: None,
            palette: &palette,
            calibration: &record(),
            capture_time: 0,
        })
        .unwrap();
        let c = RawContainer::parse(&bytes).unwrap();
        assert!(c.thermal_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn mismatched_plane_is_rejected() {
        let palette = BuiltinPalette::WhiteHot.palette();
        let image = ColorImage::compose(&plane(), &palette);
        let other = ThermalPlane::from_shape_vec(2, 3, vec![0; 6]).unwrap();
        let err = to_container(&ContainerParts {
            image: &image,
            thermal: Some(&other),
            palette: &palette,
            calibration: &record(),
            capture_time: 0,
        })
        .unwrap_err();
        assert!(matches!(err, ThermalError::MalformedContainer(_)));
    }
}
