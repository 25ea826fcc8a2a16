//! Reconstruct per-pixel temperatures from the thermal
//! plane.
//!
//! The camera does not store temperatures per pixel. It
//! stores the scene's min, max and center readings next to
//! an 8-bit brightness plane that has been through contrast
//! enhancement (histogram equalization) on the sensor. That
//! step is not invertible, so every mapping here is an
//! approximation that reproduces a formula, not a physical
//! measurement:
//!
//! - [`linear_map`] spreads brightness `0..=254` evenly
//!   between min and max, as the camera vendor's tools do.
//! - [`corrected_map`] adds the center reading as a third
//!   anchor, splitting the range into two linear segments.
//!   This pulls values towards the center reading, which
//!   partly compensates for the equalization, but it is exact
//!   only at the three anchors.
//!
//! Pixels with brightness 255 have no reading and map to
//! `NaN`.

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde_derive::Serialize;

use crate::{
    container::{ThermalPlane, INVALID_BRIGHTNESS, MAX_BRIGHTNESS},
    error::{Advised, Advisory, DegenerateReason},
    metadata::{CalibrationRecord, TemperatureUnit},
    stats::Stats,
};

/// How a [`TemperatureField`] was derived.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mapping {
    Linear,
    Corrected { center_brightness: u8 },
}

/// Temperatures shaped `(height, width)`, in [`unit`](Self::unit).
#[derive(Clone, Debug, PartialEq)]
pub struct TemperatureField {
    values: Array2<f64>,
    unit: TemperatureUnit,
    mapping: Mapping,
}

impl TemperatureField {
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn unit(&self) -> TemperatureUnit {
        self.unit
    }

    pub fn mapping(&self) -> Mapping {
        self.mapping
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.values.ncols(), self.values.nrows())
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        self.values.get((y, x)).copied()
    }

    /// Rows from the top, each left to right.
    pub fn rows(&self) -> impl Iterator<Item = ArrayView1<'_, f64>> + '_ {
        self.values.outer_iter()
    }

    /// The same field expressed in `unit`.
    pub fn to_unit(&self, unit: TemperatureUnit) -> TemperatureField {
        let from = self.unit;
        TemperatureField {
            values: self.values.mapv(|t| from.convert(t, unit)),
            unit,
            mapping: self.mapping,
        }
    }

    /// Statistics over valid pixels.
    pub fn stats(&self) -> Stats {
        let mut stats = Stats::default();
        for &t in self.values.iter() {
            stats += t;
        }
        stats
    }
}

/// Map `b` on the line through `(b0, t0)` and `(b1, t1)`.
#[inline]
fn segment(b: f64, (b0, t0): (f64, f64), (b1, t1): (f64, f64)) -> f64 {
    t0 + (b - b0) / (b1 - b0) * (t1 - t0)
}

/// Brightness to temperature over the full range, min at 0
/// and max at 254.
pub fn linear_transform(cal: &CalibrationRecord) -> impl Fn(u8) -> f64 {
    let low = (0., cal.min());
    let high = (MAX_BRIGHTNESS as f64, cal.max());
    move |b| segment(b as f64, low, high)
}

/// Brightness to temperature through the three anchors.
/// Only reachable with a [`CenterAnchor::Interior`] brightness,
/// so neither segment is empty.
fn corrected_transform(cal: &CalibrationRecord, center_brightness: u8) -> impl Fn(u8) -> f64 {
    let low = (0., cal.min());
    let center = (center_brightness as f64, cal.center());
    let high = (MAX_BRIGHTNESS as f64, cal.max());
    move |b| {
        if b <= center_brightness {
            segment(b as f64, low, center)
        } else {
            segment(b as f64, center, high)
        }
    }
}

fn map_plane<F: Fn(u8) -> f64>(
    plane: &ThermalPlane,
    cal: &CalibrationRecord,
    mapping: Mapping,
    transform: F,
) -> TemperatureField {
    let mut lut = [f64::NAN; 256];
    for (b, t) in lut.iter_mut().enumerate().take(MAX_BRIGHTNESS as usize + 1) {
        *t = transform(b as u8);
    }
    debug_assert!(lut[INVALID_BRIGHTNESS as usize].is_nan());
    TemperatureField {
        values: plane.view().mapv(|b| lut[b as usize]),
        unit: cal.unit,
        mapping,
    }
}

/// Linear reconstruction: `min + b / 254 * (max - min)`.
///
/// This is what the camera itself reports; see the module
/// docs for its accuracy.
pub fn linear_map(plane: &ThermalPlane, cal: &CalibrationRecord) -> TemperatureField {
    map_plane(plane, cal, Mapping::Linear, linear_transform(cal))
}

/// Where the center reading sits on the brightness scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CenterAnchor {
    Interior(u8),
    Degenerate {
        reason: DegenerateReason,
        brightness: Option<u8>,
    },
}

impl CenterAnchor {
    pub fn locate(plane: &ThermalPlane, cal: &CalibrationRecord) -> Self {
        use DegenerateReason::*;
        match plane.at(cal.center_pos) {
            None => CenterAnchor::Degenerate {
                reason: OutOfBounds,
                brightness: None,
            },
            Some(INVALID_BRIGHTNESS) => CenterAnchor::Degenerate {
                reason: InvalidBrightness,
                brightness: Some(INVALID_BRIGHTNESS),
            },
            Some(b) if b == 0 || b == MAX_BRIGHTNESS => CenterAnchor::Degenerate {
                reason: AnchorAtExtreme,
                brightness: Some(b),
            },
            Some(b) => CenterAnchor::Interior(b),
        }
    }
}

/// Three-point reconstruction anchored at `(0, min)`,
/// `(b_center, center)` and `(254, max)`, where `b_center`
/// is the brightness at the recorded center position.
///
/// If the center anchor is unusable (at either end of the
/// scale, invalid, or outside the plane) this returns the
/// [`linear_map`] field with a
/// [`DegenerateCalibration`](Advisory::DegenerateCalibration)
/// advisory. Like the linear mapping this is an
/// approximation; it is exact only at the anchors.
pub fn corrected_map(plane: &ThermalPlane, cal: &CalibrationRecord) -> Advised<TemperatureField> {
    match CenterAnchor::locate(plane, cal) {
        CenterAnchor::Interior(b) => Advised::clean(map_plane(
            plane,
            cal,
            Mapping::Corrected {
                center_brightness: b,
            },
            corrected_transform(cal, b),
        )),
        CenterAnchor::Degenerate { reason, brightness } => Advised::with(
            linear_map(plane, cal),
            vec![Advisory::DegenerateCalibration {
                reason,
                center_brightness: brightness,
            }],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Position;

    const EPS: f64 = 1e-9;

    fn record(center_pos: Position) -> CalibrationRecord {
        let mut cal = CalibrationRecord::new(TemperatureUnit::Celsius, 150.0, 18.5, 31.0).unwrap();
        cal.center_pos = center_pos;
        cal
    }

    /// 5x4 plane: 0 at the top-left, 254 at the bottom-right,
    /// 40 at (2, 1) and a ramp elsewhere.
    fn plane() -> ThermalPlane {
        let (w, h) = (5, 4);
        let mut samples: Vec<u8> = (0..w * h).map(|i| (i * 13) as u8).collect();
        samples[0] = 0;
        samples[w + 2] = 40;
        samples[w * h - 1] = 254;
        ThermalPlane::from_shape_vec(w, h, samples).unwrap()
    }

    fn same(a: &TemperatureField, b: &TemperatureField) -> bool {
        a.values()
            .iter()
            .zip(b.values().iter())
            .all(|(x, y)| (x.is_nan() && y.is_nan()) || x == y)
    }

    #[test]
    fn linear_hits_min_and_max() {
        let field = linear_map(&plane(), &record(Position::new(2, 1)));
        assert_eq!(field.mapping(), Mapping::Linear);
        assert_eq!(field.dimensions(), (5, 4));
        assert!((field.get(0, 0).unwrap() - 18.5).abs() < EPS);
        assert!((field.get(4, 3).unwrap() - 150.0).abs() < EPS);
        let t = field.get(2, 1).unwrap();
        assert!((t - (18.5 + 40. / 254. * 131.5)).abs() < EPS);
    }

    #[test]
    fn corrected_passes_through_anchors() {
        let advised = corrected_map(&plane(), &record(Position::new(2, 1)));
        assert!(advised.is_clean());
        let field = advised.value;
        assert_eq!(
            field.mapping(),
            Mapping::Corrected {
                center_brightness: 40
            }
        );
        assert!((field.get(0, 0).unwrap() - 18.5).abs() < EPS);
        assert!((field.get(2, 1).unwrap() - 31.0).abs() < EPS);
        assert!((field.get(4, 3).unwrap() - 150.0).abs() < EPS);
    }

    #[test]
    fn corrected_segments_are_linear() {
        let cal = record(Position::new(2, 1));
        let t = corrected_transform(&cal, 40);
        assert!((t(20) - (18.5 + 0.5 * 12.5)).abs() < EPS);
        assert!((t(147) - (31.0 + 0.5 * 119.0)).abs() < EPS);
    }

    #[test]
    fn linear_is_monotonic() {
        let cal = record(Position::new(0, 0));
        let t = linear_transform(&cal);
        for b in 0..MAX_BRIGHTNESS {
            assert!(t(b) <= t(b + 1), "b = {}", b);
        }

        let flat = CalibrationRecord::new(TemperatureUnit::Celsius, 20.0, 20.0, 20.0).unwrap();
        let t = linear_transform(&flat);
        for b in 0..MAX_BRIGHTNESS {
            assert!(t(b) <= t(b + 1));
        }
    }

    #[test]
    fn corrected_is_monotonic_for_ordered_anchors() {
        let cal = record(Position::new(2, 1));
        let t = corrected_transform(&cal, 200);
        for b in 0..MAX_BRIGHTNESS {
            assert!(t(b) <= t(b + 1), "b = {}", b);
        }
    }

    #[test]
    fn corrected_is_finite_for_every_center_brightness() {
        let cal = record(Position::new(1, 0));
        for center in 0..=MAX_BRIGHTNESS {
            let plane = ThermalPlane::from_shape_vec(2, 2, vec![0, center, 254, 127]).unwrap();
            let advised = corrected_map(&plane, &cal);
            assert!(
                advised.value.values().iter().all(|t| t.is_finite()),
                "center = {}",
                center
            );
            match CenterAnchor::locate(&plane, &cal) {
                CenterAnchor::Interior(b) => {
                    assert_eq!(b, center);
                    assert!(advised.is_clean());
                }
                CenterAnchor::Degenerate { .. } => {
                    assert!(center == 0 || center == MAX_BRIGHTNESS);
                    assert_eq!(advised.value.mapping(), Mapping::Linear);
                }
            }
        }
    }

    #[test]
    fn invalid_pixels_are_nan_and_skipped_in_stats() {
        let plane = ThermalPlane::from_shape_vec(2, 2, vec![0, 255, 254, 127]).unwrap();
        let field = linear_map(&plane, &record(Position::new(0, 0)));
        assert!(field.get(1, 0).unwrap().is_nan());
        let stats = field.stats();
        assert_eq!(stats.count(), 3);
        assert!((stats.min().unwrap() - 18.5).abs() < EPS);
        assert!((stats.max().unwrap() - 150.0).abs() < EPS);
    }

    #[test]
    fn center_at_extremes_falls_back_to_linear() {
        let plane = plane();
        for &(pos, b) in &[(Position::new(0, 0), 0u8), (Position::new(4, 3), 254u8)] {
            let cal = record(pos);
            let advised = corrected_map(&plane, &cal);
            assert_eq!(
                advised.advisories,
                vec![Advisory::DegenerateCalibration {
                    reason: DegenerateReason::AnchorAtExtreme,
                    center_brightness: Some(b),
                }]
            );
            assert_eq!(advised.value.mapping(), Mapping::Linear);
            assert!(same(&advised.value, &linear_map(&plane, &cal)));
            assert!(advised.value.values().iter().all(|t| t.is_finite()));
        }
    }

    #[test]
    fn unusable_center_falls_back_to_linear() {
        let plane = ThermalPlane::from_shape_vec(2, 2, vec![0, 255, 254, 127]).unwrap();

        let cal = record(Position::new(1, 0));
        let advised = corrected_map(&plane, &cal);
        assert_eq!(
            advised.advisories,
            vec![Advisory::DegenerateCalibration {
                reason: DegenerateReason::InvalidBrightness,
                center_brightness: Some(255),
            }]
        );
        assert!(same(&advised.value, &linear_map(&plane, &cal)));

        let cal = record(Position::new(2, 0));
        let advised = corrected_map(&plane, &cal);
        assert_eq!(
            advised.advisories,
            vec![Advisory::DegenerateCalibration {
                reason: DegenerateReason::OutOfBounds,
                center_brightness: None,
            }]
        );
        assert!(same(&advised.value, &linear_map(&plane, &cal)));
    }

    #[test]
    fn unit_conversion_is_a_post_transform() {
        let cal = record(Position::new(2, 1));
        let celsius = linear_map(&plane(), &cal);
        let fahrenheit = celsius.to_unit(TemperatureUnit::Fahrenheit);
        assert_eq!(fahrenheit.unit(), TemperatureUnit::Fahrenheit);
        assert_eq!(cal.unit, TemperatureUnit::Celsius);
        assert!((fahrenheit.get(4, 3).unwrap() - 302.0).abs() < EPS);
        assert!((fahrenheit.get(0, 0).unwrap() - 65.3).abs() < EPS);

        let back = fahrenheit.to_unit(TemperatureUnit::Celsius);
        assert!((back.get(0, 0).unwrap() - 18.5).abs() < EPS);
        assert!(same(&celsius.to_unit(TemperatureUnit::Celsius), &celsius));
    }

    #[test]
    fn rows_cover_the_field_top_down() {
        let field = linear_map(&plane(), &record(Position::new(0, 0)));
        let rows: Vec<_> = field.rows().collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].len(), 5);
        assert_eq!(rows[3][4], field.get(4, 3).unwrap());
    }
}
