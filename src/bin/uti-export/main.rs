mod args;
mod proc;

use anyhow::{bail, Result};
use uti_thermal::cli::{init_logging, process_paths_par, ThermalInput};

use crate::{
    args::Args,
    proc::{export_bmp, export_csv, export_png, export_tiff, CsvStyle, ExportArgs},
};

fn export(inp: &ThermalInput, args: &Args, e_args: &ExportArgs) -> Result<()> {
    let mut written = vec![];
    if args.bmp {
        written.push(export_bmp(inp, e_args)?);
    }
    if args.csv {
        written.push(export_csv(inp, e_args, CsvStyle::Plain)?);
    }
    if args.csv_es {
        written.push(export_csv(inp, e_args, CsvStyle::Es)?);
    }
    if args.png {
        written.push(export_png(inp, e_args)?);
    }
    if args.tiff.is_some() {
        written.push(export_tiff(inp, e_args)?);
    }
    tracing::debug!(input = %inp.filename, outputs = ?written, "exported");
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::from_cmd_line()?;
    let e_args = ExportArgs::from_args(&args);

    use rayon::prelude::*;
    let (processed, failed) = process_paths_par(args.paths.clone())
        .into_par_iter()
        .map(|p| -> Result<()> {
            let inp = p?;
            export(&inp, &args, &e_args)
        })
        .fold(
            || (0usize, 0usize),
            |(ok, failed), res| match res {
                Ok(()) => (ok + 1, failed),
                Err(e) => {
                    tracing::error!("{:#}", e);
                    (ok, failed + 1)
                }
            },
        )
        .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

    tracing::info!(processed, failed, palette = %e_args.palette, "done");
    if let Some(coeffs) = e_args.coeffs {
        tracing::info!("Transform equation: V = {} + {} T", coeffs[0], coeffs[1]);
        tracing::info!(
            "Inverse equation: T = {} + {} V",
            -coeffs[0] / coeffs[1],
            1. / coeffs[1]
        );
    }
    if failed > 0 {
        bail!("{} of {} images failed", failed, processed + failed);
    }
    Ok(())
}
