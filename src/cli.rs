//! Helpers shared by the accompanying binaries: argument
//! parsing, logging setup and parallel batch loading.
//!
//! APIs here shouldn't be considered stable / used as a
//! library.

use anyhow::{Context, Result};
pub use clap::{App, Arg};
use indicatif::{ProgressBar, ProgressStyle};
pub use inflector::Inflector;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::ThermalImage;

#[macro_export]
macro_rules! args_parser {
    ($name:expr) => {{
        $crate::cli::App::new($name)
            .version(clap::crate_version!())
            .author(clap::crate_authors!())
    }};
}

#[macro_export]
macro_rules! arg {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name).value_name(&$name.to_screaming_snake_case())
    }};
}

#[macro_export]
macro_rules! opt {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name)
            .long(&$name.to_kebab_case())
            .value_name(&$name.to_screaming_snake_case())
    }};
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

pub struct ThermalInput {
    pub filename: String,
    pub image: ThermalImage,
}

impl ThermalInput {
    pub fn try_from_path(filename: String) -> Result<Self> {
        let image = ThermalImage::try_from_path(&filename)
            .with_context(|| format!("could not parse thermal image: {}", filename))?;
        Ok(ThermalInput { filename, image })
    }
}

/// Load every path on the rayon pool, ticking a progress bar
/// as each one completes.
pub fn process_paths_par(
    paths: Vec<String>,
) -> impl IntoParallelIterator<Item = Result<ThermalInput>> {
    let bar = ProgressBar::new(paths.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {wide_bar:cyan/blue} {pos:>7}/{len:7}"),
    );

    paths
        .into_par_iter()
        .map(ThermalInput::try_from_path)
        .inspect(move |_| bar.inc(1))
}
