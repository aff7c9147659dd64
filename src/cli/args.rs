use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[cfg(feature = "netcdf")]
const DATASET_SUPPORT: &str = "Reconstruction and ERA5 datasets are read with the netcdf library.";

#[cfg(not(feature = "netcdf"))]
const DATASET_SUPPORT: &str = "This build cannot read reconstruction or ERA5 datasets, so \
infill and validate stop before doing any work. Rebuild with `--features netcdf` \
(needs libnetcdf) to enable them.";

#[derive(Parser)]
#[command(name = "station-twin")]
#[command(after_help = DATASET_SUPPORT)]
#[command(about = "Gap filling and validation reports for weather-station digital twins")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(short, long, global = true, help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Hide the progress spinner")]
    pub quiet: bool,
}

/// The station a command works on
#[derive(Args, Debug, Clone)]
pub struct StationArgs {
    #[arg(short, long, help = "Station data file in TOA5 format")]
    pub station_file: PathBuf,

    #[arg(long, help = "Air temperature column of the station file")]
    pub sensor: String,

    #[arg(short, long, help = "Station name")]
    pub name: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    pub latitude: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    pub longitude: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    pub elevation: Option<f64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fill gaps in station data from a reconstruction and export it in TOA5 format
    Infill {
        #[command(flatten)]
        station: StationArgs,

        #[arg(short, long, help = "Reconstruction output of the evaluation")]
        eval_results: PathBuf,

        #[arg(short, long, default_value = ".", help = "Directory receiving the results")]
        output_dir: PathBuf,

        #[arg(long, help = "Also render a chart of measured and predicted values")]
        plot: bool,
    },

    /// Compare a trained station model against ERA5 and the station's measurements
    Validate {
        #[command(flatten)]
        station: StationArgs,

        #[arg(short, long, help = "Trained model file")]
        model: PathBuf,

        #[arg(short, long, default_value = ".", help = "Directory receiving the report")]
        output_dir: PathBuf,

        #[arg(long, help = "Bundle charts, PDF and CSV into validation.zip")]
        zip: bool,

        #[arg(long, help = "Seed for choosing the sample windows")]
        seed: Option<u64>,

        #[arg(long, help = "Directory of pre-fetched ERA5 files, replacing the download tool")]
        reference_archive: Option<PathBuf>,
    },
}
