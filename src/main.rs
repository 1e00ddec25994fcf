use anyhow::Context;
use clap::{Parser, Subcommand};
use crosscal::core::{align, composite, pipeline, sbaf};
use crosscal::{CalError, CalibrationConfig, ReflectanceConverter};
use std::path::PathBuf;

/// Radiometric cross-calibration of LISS III / AWiFS imagery against a
/// reference sensor
#[derive(Parser)]
#[command(name = "crosscal", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full calibration pipeline
    Run {
        /// Directory of raw target-sensor bands plus metadata file
        target_dir: PathBuf,
        /// Directory of reference-sensor bands
        reference_dir: PathBuf,
    },
    /// Convert raw DN bands to top-of-atmosphere reflectance
    Reflectance {
        /// Directory of raw bands plus metadata file
        input_dir: PathBuf,
        /// Directory receiving the reflectance rasters
        output_dir: PathBuf,
    },
    /// Stack single-band rasters into a multi-band composite
    Composite {
        /// Directory of single-band rasters
        input_dir: PathBuf,
        /// Filename of the composite written into the input directory
        #[arg(long, default_value = "composite.TIF")]
        output_name: String,
        /// Treat the input as a reference image (applies the 0.0001
        /// reflectance scale)
        #[arg(long)]
        reference: bool,
    },
    /// Resample a raster to the pixel resolution of a reference raster
    Resample {
        target: PathBuf,
        reference: PathBuf,
    },
    /// Clip a raster to the footprint of a reference raster
    Clip {
        target: PathBuf,
        reference: PathBuf,
    },
    /// Compute and apply per-band SBAF factors to co-registered composites
    Sbaf {
        target_composite: PathBuf,
        reference_composite: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        log::error!("{:#}", err);
        let code = err
            .downcast_ref::<CalError>()
            .map(CalError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run {
            target_dir,
            reference_dir,
        } => {
            let config = CalibrationConfig::new(target_dir, reference_dir);
            let outcome = pipeline::run(&config)?;
            for (factor, path) in outcome.factors.iter().zip(&outcome.band_paths) {
                println!("{}  factor={}", path.display(), factor);
            }
        }
        Command::Reflectance {
            input_dir,
            output_dir,
        } => {
            std::fs::create_dir_all(&output_dir)
                .with_context(|| format!("failed to create {}", output_dir.display()))?;
            ReflectanceConverter::convert_directory(&input_dir, &output_dir)?;
        }
        Command::Composite {
            input_dir,
            output_name,
            reference,
        } => {
            let scale = if reference {
                composite::REFLECTANCE_SCALE
            } else {
                1.0
            };
            let output = composite::build_composite(&input_dir, &output_name, scale)?;
            println!("{}", output.display());
        }
        Command::Resample { target, reference } => {
            let output = align::resample_to_reference(&target, &reference)?;
            println!("{}", output.display());
        }
        Command::Clip { target, reference } => {
            let output = align::clip_to_reference(&target, &reference)?;
            println!("{}", output.display());
        }
        Command::Sbaf {
            target_composite,
            reference_composite,
        } => {
            let outcome = sbaf::calibrate(&target_composite, &reference_composite)?;
            for (factor, path) in outcome.factors.iter().zip(&outcome.band_paths) {
                println!("{}  factor={}", path.display(), factor);
            }
        }
    }
    Ok(())
}
