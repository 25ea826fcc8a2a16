use uti_thermal::{
    compose::{to_container, ColorImage, ContainerParts, INVALID_MARKER},
    container::{RawContainer, ThermalPlane},
    metadata::{CalibrationRecord, Position, TemperatureUnit},
    palette::{BuiltinPalette, Rgb},
    temperature::{corrected_map, linear_map, Mapping},
    error::ReservedSlot,
    Advisory, PaletteSpec, ThermalError, ThermalImage,
};

const W: usize = 16;
const H: usize = 12;

fn camera_file(center: Position) -> Vec<u8> {
    let mut samples: Vec<u8> = (0..W * H).map(|i| (i % 254) as u8).collect();
    samples[0] = 0;
    samples[W * H - 1] = 254;
    samples[W + 1] = 255;
    let plane = ThermalPlane::from_shape_vec(W, H, samples).unwrap();
    let palette = BuiltinPalette::Iron.palette();

    let mut cal = CalibrationRecord::new(TemperatureUnit::Celsius, 150.0, 18.5, 31.0).unwrap();
    cal.center_pos = center;
    cal.max_pos = Position::new(W as u16 - 1, H as u16 - 1);

    to_container(&ContainerParts {
        image: &ColorImage::compose(&plane, &palette),
        thermal: Some(&plane),
        palette: &palette,
        calibration: &cal,
        capture_time: 1_600_000_000,
    })
    .unwrap()
}

#[test]
fn decode_map_compose_and_rewrite() {
    let bytes = camera_file(Position::new(5, 3));
    let image = ThermalImage::try_from_bytes(&bytes).unwrap();
    assert!(image.advisories.is_empty());

    let linear = linear_map(&image.plane, &image.calibration);
    assert_eq!(linear.get(0, 0), Some(18.5));
    assert_eq!(linear.get(W - 1, H - 1), Some(150.0));
    assert!(linear.get(1, 1).unwrap().is_nan());

    let corrected = corrected_map(&image.plane, &image.calibration);
    assert!(corrected.is_clean());
    let field = corrected.value;
    let center_brightness = image.plane.get(5, 3).unwrap();
    assert_eq!(field.mapping(), Mapping::Corrected { center_brightness });
    assert!((field.get(5, 3).unwrap() - 31.0).abs() < 1e-9);
    assert!((field.get(0, 0).unwrap() - 18.5).abs() < 1e-9);
    assert!((field.get(W - 1, H - 1).unwrap() - 150.0).abs() < 1e-9);

    let spec = PaletteSpec::parse(&["white_hot,reverse", "invert"]).unwrap();
    assert_eq!(spec.names(), vec!["white_hot", "reverse", "invert"]);
    let rendered = image.render(&spec);
    assert_eq!(rendered.get(0, 0), Some(Rgb::new(0, 0, 0)));
    assert_eq!(rendered.get(1, 1), Some(INVALID_MARKER));

    let rewritten = image.to_container(&spec, 0).unwrap();
    assert_eq!(rewritten.len(), bytes.len());
    let again = ThermalImage::try_from_bytes(&rewritten).unwrap();
    assert_eq!(again.plane, image.plane);
    assert_eq!(again.visual, rendered);
    assert_eq!(again.palette, spec.resolve(&image.palette));
    assert_eq!(again.calibration.timestamp, Some(1_600_000_000));
}

#[test]
fn camera_written_file_has_no_timestamp() {
    let mut bytes = camera_file(Position::new(5, 3));
    bytes.truncate(bytes.len() - 4);
    let container = RawContainer::parse(&bytes).unwrap();
    assert!(!container.has_timestamp());

    let image = ThermalImage::try_from_bytes(&bytes).unwrap();
    assert_eq!(image.calibration.timestamp, None);
    assert_eq!(image.dimensions(), (W, H));
}

#[test]
fn degenerate_center_falls_back() {
    // (1, 1) holds the invalid value
    let bytes = camera_file(Position::new(1, 1));
    let image = ThermalImage::try_from_bytes(&bytes).unwrap();
    let corrected = image.temperatures(true);
    assert_eq!(corrected.value.mapping(), Mapping::Linear);
    assert!(matches!(
        corrected.advisories.as_slice(),
        [Advisory::DegenerateCalibration { .. }]
    ));
    let linear = linear_map(&image.plane, &image.calibration);
    assert_eq!(corrected.value.get(5, 3), linear.get(5, 3));
    assert_eq!(corrected.value.get(W - 1, H - 1), Some(150.0));
}

#[test]
fn anomalous_reserved_bytes_reach_the_image() {
    let mut bytes = camera_file(Position::new(5, 3));
    let metadata = bytes.len() - 4 - 25;
    bytes[metadata + 5] = 0x7F;
    let image = ThermalImage::try_from_bytes(&bytes).unwrap();
    assert_eq!(
        image.advisories,
        vec![Advisory::AnomalousReservedField {
            slot: ReservedSlot::AfterMinTemp,
            expected: vec![0xFF, 0x00],
            found: vec![0x7F, 0x00],
        }]
    );
    assert_eq!(image.calibration.reserved_after_min_temp.raw(), [0x7F, 0x00]);

    let json = serde_json::to_value(&image.advisories).unwrap();
    assert_eq!(json[0]["kind"], "anomalous_reserved_field");
    assert_eq!(json[0]["slot"], "after_min_temp");
    assert_eq!(json[0]["found"], serde_json::json!([0x7F, 0x00]));

    // the bytes survive a rewrite
    let rewritten = image
        .to_container(&PaletteSpec::parse(&["iron"]).unwrap(), 0)
        .unwrap();
    let again = ThermalImage::try_from_bytes(&rewritten).unwrap();
    assert_eq!(again.advisories, image.advisories);
}

#[test]
fn unit_conversion_is_a_post_transform() {
    let image = ThermalImage::try_from_bytes(&camera_file(Position::new(5, 3))).unwrap();
    let field = image.temperatures(false).into_inner();
    let fahrenheit = field.to_unit(TemperatureUnit::Fahrenheit);
    assert!((fahrenheit.get(W - 1, H - 1).unwrap() - 302.0).abs() < 1e-9);
    assert_eq!(image.calibration.unit, TemperatureUnit::Celsius);
}

#[test]
fn broken_inputs_are_rejected() {
    let bytes = camera_file(Position::new(5, 3));
    assert!(matches!(
        ThermalImage::try_from_bytes(&bytes[..bytes.len() - 5]),
        Err(ThermalError::MalformedContainer(_))
    ));
    assert!(matches!(
        PaletteSpec::parse(&["sepia"]),
        Err(ThermalError::UnknownPaletteName(_))
    ));
}
