use anyhow::{bail, ensure, Result};
use clap::value_t_or_exit;
use std::path::PathBuf;
use uti_thermal::{arg, args_parser, metadata::TemperatureUnit, opt, PaletteSpec};

pub struct Args {
    pub paths: Vec<String>,
    pub output: PathBuf,
    pub palette: PaletteSpec,
    pub corrected: bool,
    pub unit: Option<TemperatureUnit>,
    pub bmp: bool,
    pub csv: bool,
    pub csv_es: bool,
    pub png: bool,
    pub tiff: Option<(f64, f64)>,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("uti-export")
            .setting(clap::AppSettings::AllowLeadingHyphen)
            .about("Export temperatures and re-rendered images from UNI-T thermal BMPs.")
            .arg(
                opt!("output")
                    .short("o")
                    .help("Output directory (default: current directory)"),
            )
            .arg(
                opt!("palette")
                    .short("p")
                    .multiple(true)
                    .number_of_values(1)
                    .help("Palette step, applied in order: camera, a built-in name, reverse or invert"),
            )
            .arg(
                opt!("corrected")
                    .short("c")
                    .takes_value(false)
                    .help("Use the 3-point mapping anchored at the center temperature"),
            )
            .arg(opt!("unit").short("u").help("Output unit: c or f (default: as recorded)"))
            .arg(
                opt!("bmp")
                    .takes_value(false)
                    .help("Write a clean BMP re-rendered through the palette"),
            )
            .arg(opt!("csv").takes_value(false).help("Write temperatures as csv"))
            .arg(
                opt!("csv es")
                    .takes_value(false)
                    .help("Write temperatures as csv, using ; and decimal commas"),
            )
            .arg(
                opt!("png")
                    .takes_value(false)
                    .help("Write the re-rendered image as png"),
            )
            .arg(
                opt!("tiff")
                    .takes_value(false)
                    .requires_all(&["min", "max"])
                    .help("Write temperatures as a 16-bit tiff scaled from --min to --max"),
            )
            .arg(opt!("min").help("Temperature mapped to 0 in the tiff"))
            .arg(opt!("max").help("Temperature mapped to 65535 in the tiff"))
            .arg(
                arg!("images")
                    .required(true)
                    .multiple(true)
                    .help("Thermal BMP paths"),
            )
            .get_matches();

        let paths = matches
            .values_of("images")
            .unwrap()
            .map(|f| f.into())
            .collect();
        let output = matches
            .is_present("output")
            .then(|| value_t_or_exit!(matches, "output", PathBuf))
            .unwrap_or_else(|| PathBuf::from("."));
        if !output.is_dir() {
            bail!("output folder {:?} does not exist or is not a directory", output);
        }

        let palette = PaletteSpec::parse(matches.values_of("palette").into_iter().flatten())?;
        let unit = matches
            .is_present("unit")
            .then(|| value_t_or_exit!(matches, "unit", TemperatureUnit));

        let tiff = if matches.is_present("tiff") {
            let min = value_t_or_exit!(matches, "min", f64);
            let max = value_t_or_exit!(matches, "max", f64);
            ensure!(max > min, "--max must be greater than --min");
            Some((min, max))
        } else {
            None
        };

        let args = Args {
            paths,
            output,
            palette,
            corrected: matches.is_present("corrected"),
            unit,
            bmp: matches.is_present("bmp"),
            csv: matches.is_present("csv"),
            csv_es: matches.is_present("csv es"),
            png: matches.is_present("png"),
            tiff,
        };
        ensure!(
            args.bmp || args.csv || args.csv_es || args.png || args.tiff.is_some(),
            "nothing to export: pass one of --bmp, --csv, --csv-es, --png, --tiff"
        );
        Ok(args)
    }
}
