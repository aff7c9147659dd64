use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands, StationArgs};
use crate::config::PipelineConfig;
use crate::models::{Station, StationMetadata};
use crate::pipeline::{
    CraiEvaluationFactory, GridCropper, GridFormatConverter, InfillingWriter, LocalArchive,
    PreparedData, ReferenceDownloader, ValidationExecutor, ValidationServices,
};
use crate::readers::{DatasetReader, Toa5Converter};
use crate::utils::progress::ProgressReporter;

pub fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Infill {
            station,
            eval_results,
            output_dir,
            plot,
        } => {
            let reader = dataset_reader()?;
            let station = load_station(&station)?;
            let writer = InfillingWriter::new(reader)?
                .with_variable(&config.infill.variable)
                .with_chart_size(config.infill.chart_width, config.infill.chart_height);

            let progress = ProgressReporter::new_spinner("Filling gaps...", cli.quiet);
            let output = writer.write_results_with_progress(&eval_results, &station, plot, &progress)?;

            fs::create_dir_all(&output_dir)?;
            let exported = copy_into(&output.export_path, &output_dir)?;
            progress.println(&format!("Gap-filled data: {}", exported.display()));
            if let Some(plot_path) = &output.plot_path {
                let copied = copy_into(plot_path, &output_dir)?;
                progress.println(&format!("Chart: {}", copied.display()));
            }

            writer.cleanup()?;
            progress.finish_with_message("Gap filling complete");
        }

        Commands::Validate {
            station,
            model,
            output_dir,
            zip,
            seed,
            reference_archive,
        } => {
            let reader = dataset_reader()?;
            let station = load_station(&station)?;
            let mut settings = config.validation_settings();
            if seed.is_some() {
                settings.seed = seed;
            }

            let archive = reference_archive
                .or_else(|| config.reference_archive.clone())
                .map(LocalArchive::new);
            let download = config.tools.download.clone();
            let downloader: &dyn ReferenceDownloader = match (&archive, &download) {
                (Some(archive), _) => archive,
                (None, Some(tool)) => tool,
                (None, None) => bail!("no reference source: pass --reference-archive or configure [tools.download]"),
            };
            let converter: &dyn GridFormatConverter = match &config.tools.convert {
                Some(tool) => tool,
                None => &PreparedData,
            };
            let cropper: &dyn GridCropper = match &config.tools.crop {
                Some(tool) => tool,
                None => &PreparedData,
            };
            let evaluate = config
                .tools
                .evaluate
                .clone()
                .context("no evaluation tool: configure [tools.evaluate]")?;
            let evaluation = CraiEvaluationFactory::new(evaluate).with_variable(&settings.variable);

            let services = ValidationServices {
                downloader,
                converter,
                cropper,
                evaluation: &evaluation,
                reader: &reader,
            };

            let progress = ProgressReporter::new_spinner("Validating...", cli.quiet);
            let (executor, report) = ValidationExecutor::execute(&station, model, &progress, settings, &services)?;

            progress.println(&report.statistics.summary());

            fs::create_dir_all(&output_dir)?;
            let mut outputs = vec![copy_into(&report.pdf_path, &output_dir)?, copy_into(&report.csv_path, &output_dir)?];
            for extra in report.summary_path.iter().chain(report.parquet_path.iter()) {
                outputs.push(copy_into(extra, &output_dir)?);
            }
            if zip {
                outputs.push(copy_into(&executor.make_zip()?, &output_dir)?);
            }
            for path in &outputs {
                progress.println(&format!("Wrote {}", path.display()));
            }

            executor.close()?;
            progress.finish_with_message("Validation complete");
        }
    }

    Ok(())
}

fn load_station(args: &StationArgs) -> Result<Station> {
    let converter = Toa5Converter::from_file(&args.station_file, &args.sensor)
        .with_context(|| format!("failed to read station file: {}", args.station_file.display()))?;

    let metadata = StationMetadata {
        latitude: args.latitude,
        longitude: args.longitude,
        elevation: args.elevation,
        ..Default::default()
    };
    let name = args
        .name
        .clone()
        .or_else(|| converter.header().environment.get(1).cloned().filter(|n| !n.is_empty()));

    tracing::info!(station = ?name, sensor = %args.sensor, "loaded station");
    Ok(Station::new(name, metadata, Box::new(converter)))
}

#[cfg(feature = "netcdf")]
fn dataset_reader() -> Result<Box<dyn DatasetReader>> {
    Ok(Box::new(crate::readers::NetcdfReader::new()))
}

#[cfg(not(feature = "netcdf"))]
fn dataset_reader() -> Result<Box<dyn DatasetReader>> {
    bail!("reading datasets requires the netcdf feature: rebuild with `--features netcdf`")
}

fn copy_into(path: &Path, dir: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .with_context(|| format!("not a file: {}", path.display()))?;
    let target = dir.join(name);
    fs::copy(path, &target).with_context(|| format!("failed to copy {} to {}", path.display(), target.display()))?;
    Ok(target)
}
