mod args;

use anyhow::Result;
use args::Args;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde_derive::*;

use uti_thermal::{
    cli::{init_logging, process_paths_par, ThermalInput},
    metadata::{CalibrationRecord, TemperatureUnit},
    stats::Stats,
    temperature::Mapping,
    Advisory,
};

fn main() -> Result<()> {
    init_logging();
    let Args {
        paths,
        corrected,
        unit,
    } = Args::from_cmd_line()?;

    let (stats, cumulative, failed) = process_paths_par(paths)
        .into_par_iter()
        .map(|try_img| -> Result<_> {
            let img = try_img?;
            Ok(ImageStats::from_input(img, corrected, unit))
        })
        .fold(
            || (vec![], Stats::default(), 0usize),
            |mut acc, try_img| {
                match try_img {
                    Ok(item) => {
                        acc.1 += &item.stats;
                        acc.0.push(item);
                    }
                    Err(e) => {
                        tracing::error!("{:#}", e);
                        acc.2 += 1;
                    }
                }
                acc
            },
        )
        .reduce(
            || (vec![], Stats::default(), 0),
            |mut acc1, acc2| {
                acc1.0.extend(acc2.0);
                acc1.1 += &acc2.1;
                acc1.2 += acc2.2;
                acc1
            },
        );

    #[derive(Debug, Serialize)]
    struct OutputJson {
        image_stats: Vec<ImageStats>,
        cumulative: Stats,
        failed: usize,
    }

    serde_json::to_writer(
        std::io::stdout().lock(),
        &OutputJson {
            image_stats: stats,
            cumulative,
            failed,
        },
    )?;

    Ok(())
}

#[derive(Serialize, Debug)]
pub struct ImageStats {
    path: String,
    width: usize,
    height: usize,
    calibration: CalibrationRecord,
    unit: TemperatureUnit,
    mapping: Mapping,
    advisories: Vec<Advisory>,
    pub(crate) stats: Stats,
}

impl ImageStats {
    pub fn from_input(inp: ThermalInput, corrected: bool, unit: Option<TemperatureUnit>) -> Self {
        let ThermalInput { filename, image } = inp;
        let temps = image.temperatures(corrected);
        let field = match unit {
            Some(unit) => temps.value.to_unit(unit),
            None => temps.value,
        };
        let mut advisories = image.advisories;
        advisories.extend(temps.advisories);

        let (width, height) = field.dimensions();
        ImageStats {
            path: filename,
            width,
            height,
            unit: field.unit(),
            mapping: field.mapping(),
            stats: field.stats(),
            calibration: image.calibration,
            advisories,
        }
    }
}
