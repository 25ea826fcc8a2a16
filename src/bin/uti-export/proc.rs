use super::Args;
use anyhow::{anyhow, Context, Result};
use byteordered::ByteOrdered;
use image::tiff::TiffEncoder;
use itertools::{iproduct, Itertools};
use std::{
    convert::TryFrom,
    fs::{self, File},
    io::{BufWriter, Cursor, Write},
    path::{Path, PathBuf},
    time::{Duration, UNIX_EPOCH},
};
use uti_thermal::{
    cli::ThermalInput, metadata::TemperatureUnit, temperature::TemperatureField, PaletteSpec,
    ThermalImage,
};

pub struct ExportArgs {
    pub output: PathBuf,
    pub palette: PaletteSpec,
    pub corrected: bool,
    pub unit: Option<TemperatureUnit>,
    /// `V = coeffs[0] + coeffs[1] * T` for the tiff export.
    pub coeffs: Option<[f64; 2]>,
}

impl ExportArgs {
    pub fn from_args(args: &Args) -> Self {
        let coeffs = args.tiff.map(|(min, max)| {
            let factor = u16::MAX as f64 / (max - min);
            [-min * factor, factor]
        });

        ExportArgs {
            output: args.output.clone(),
            palette: args.palette.clone(),
            corrected: args.corrected,
            unit: args.unit,
            coeffs,
        }
    }

    pub fn output_path_for(&self, path: &Path, suffix: &str) -> Result<PathBuf> {
        let stem = path
            .file_stem()
            .ok_or_else(|| anyhow!("no file name in {:?}", path))?;
        let mut name = stem.to_os_string();
        name.push(suffix);
        Ok(self.output.join(name))
    }

    fn temperatures(&self, image: &ThermalImage) -> TemperatureField {
        let field = image.temperatures(self.corrected).into_inner();
        match self.unit {
            Some(unit) => field.to_unit(unit),
            None => field,
        }
    }
}

/// Column delimiter and decimal separator of a csv export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CsvStyle {
    Plain,
    /// `;` between columns, `,` as decimal separator.
    Es,
}

impl CsvStyle {
    fn delimiter(self) -> &'static str {
        match self {
            CsvStyle::Plain => ",",
            CsvStyle::Es => ";",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            CsvStyle::Plain => ".csv",
            CsvStyle::Es => "_es.csv",
        }
    }

    /// Pixels without a reading are left empty.
    fn number(self, val: f64) -> String {
        if val.is_nan() {
            return String::new();
        }
        let s = val.to_string();
        match self {
            CsvStyle::Plain => s,
            CsvStyle::Es => s.replace('.', ","),
        }
    }

    fn line<I: IntoIterator<Item = String>>(self, cells: I) -> String {
        let mut line = cells.into_iter().join(self.delimiter());
        line.push('\n');
        line
    }
}

pub fn write_csv<W: Write>(
    mut out: W,
    image: &ThermalImage,
    field: &TemperatureField,
    style: CsvStyle,
) -> Result<()> {
    let cal = &image.calibration;
    let unit = field.unit();
    let temp = |t: f64| style.number(cal.unit.convert(t, unit));

    let header = [
        "Units",
        "Temp min",
        "Temp max",
        "Temp center",
        "Emissivity",
        "Temp min X",
        "Temp min Y",
        "Temp max X",
        "Temp max Y",
    ];
    out.write_all(style.line(header.iter().map(|h| h.to_string())).as_bytes())?;
    let values = vec![
        unit.symbol().to_string(),
        temp(cal.min()),
        temp(cal.max()),
        temp(cal.center()),
        style.number(cal.emissivity.value()),
        cal.min_pos.x.to_string(),
        cal.min_pos.y.to_string(),
        cal.max_pos.x.to_string(),
        cal.max_pos.y.to_string(),
    ];
    out.write_all(style.line(values).as_bytes())?;

    let pixels = ["Pixel temperatures", "Down Y (Height)", "Right X (Width)"];
    out.write_all(style.line(pixels.iter().map(|h| h.to_string())).as_bytes())?;
    for row in field.rows() {
        out.write_all(style.line(row.iter().map(|&t| style.number(t))).as_bytes())?;
    }
    Ok(())
}

pub fn export_csv(inp: &ThermalInput, args: &ExportArgs, style: CsvStyle) -> Result<PathBuf> {
    let field = args.temperatures(&inp.image);
    let output_path = args.output_path_for(Path::new(&inp.filename), style.suffix())?;
    let mut writer = BufWriter::new(File::create(&output_path)?);
    write_csv(&mut writer, &inp.image, &field, style)?;
    writer.flush()?;
    Ok(output_path)
}

/// Modification time of `path` in seconds since the epoch, or 0
/// when unknown or past the 32-bit timestamp range.
fn capture_time(path: &Path) -> u32 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .and_then(epoch_seconds)
        .unwrap_or(0)
}

fn epoch_seconds(since_epoch: Duration) -> Option<u32> {
    u32::try_from(since_epoch.as_secs()).ok()
}

pub fn export_bmp(inp: &ThermalInput, args: &ExportArgs) -> Result<PathBuf> {
    let path = Path::new(&inp.filename);
    let bytes = inp.image.to_container(&args.palette, capture_time(path))?;
    let output_path = args.output_path_for(path, "_thermal_rgb.bmp")?;
    fs::write(&output_path, bytes)?;
    Ok(output_path)
}

pub fn export_png(inp: &ThermalInput, args: &ExportArgs) -> Result<PathBuf> {
    let image = inp.image.render(&args.palette);
    let (wid, ht) = image.dimensions();

    let output_path = args.output_path_for(Path::new(&inp.filename), "_thermal_rgb.png")?;
    let image_writer = BufWriter::new(File::create(&output_path)?);
    let mut encoder = png::Encoder::new(image_writer, wid as u32, ht as u32);
    encoder.set_color(png::ColorType::RGB);
    encoder.set_depth(png::BitDepth::Eight);
    encoder
        .write_header()?
        .write_image_data(&image.to_rgb_bytes())?;

    Ok(output_path)
}

fn transform(coeffs: [f64; 2], val: f64) -> u16 {
    let tval = coeffs[0] + coeffs[1] * val;
    tval.max(0.).min(u16::MAX as f64) as u16
}

pub fn export_tiff(inp: &ThermalInput, args: &ExportArgs) -> Result<PathBuf> {
    let coeffs = args.coeffs.context("tiff export needs --min and --max")?;
    let field = args.temperatures(&inp.image);
    let values = field.values();
    let (wid, ht) = field.dimensions();

    let mut image_buffer = {
        let vec = Vec::with_capacity(2 * ht * wid);
        ByteOrdered::native(Cursor::new(vec))
    };
    for (row, col) in iproduct!(0..ht, 0..wid) {
        image_buffer.write_u16(transform(coeffs, values[(row, col)]))?;
    }

    let output_path = args.output_path_for(Path::new(&inp.filename), ".tif")?;
    let image_writer = BufWriter::new(File::create(&output_path)?);
    TiffEncoder::new(image_writer).encode(
        &image_buffer.into_inner().into_inner(),
        wid as u32,
        ht as u32,
        image::ColorType::L16,
    )?;

    Ok(output_path)
}
