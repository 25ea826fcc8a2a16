use anyhow::Result;
use clap::value_t_or_exit;
use uti_thermal::{arg, args_parser, metadata::TemperatureUnit, opt};

pub struct Args {
    pub paths: Vec<String>,
    pub corrected: bool,
    pub unit: Option<TemperatureUnit>,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("uti-stats")
            .about("Compute temperature stats from UNI-T thermal BMPs.")
            .arg(
                opt!("corrected")
                    .short("c")
                    .takes_value(false)
                    .help("Use the 3-point mapping anchored at the center temperature"),
            )
            .arg(opt!("unit").short("u").help("Output unit: c or f (default: as recorded)"))
            .arg(
                arg!("paths")
                    .required(true)
                    .multiple(true)
                    .help("Thermal BMP paths"),
            )
            .get_matches();

        let paths = matches
            .values_of("paths")
            .unwrap()
            .map(|f| f.into())
            .collect();
        let unit = matches
            .is_present("unit")
            .then(|| value_t_or_exit!(matches, "unit", TemperatureUnit));

        Ok(Args {
            paths,
            corrected: matches.is_present("corrected"),
            unit,
        })
    }
}
