//! pixgain command-line interface.
//!
//! Calibrates per-pixel gains from an event file and reconstructs the
//! energy spectrum.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Args, Parser, Subcommand};
use log::info;

use pixgain_algorithms::{calibrate, reconstruct_spectrum, ValidityWindow};
use pixgain_core::{
    CalibrationConfig, CalibrationLine, EventTable, SpectrumConfig, DEFAULT_MIN_VALID_TEMPERATURE,
};
use pixgain_io::{
    load_config, read_gain_map, write_diagnostics_csv, write_gain_map, write_report_json,
    write_spectrum, EventFileReader,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    PixgainIo(#[from] pixgain_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] pixgain_core::Error),
}

/// Per-pixel gain calibration for pixelated spectroscopic detectors.
#[derive(Parser)]
#[command(name = "pixgain")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Spectrum binning overrides.
#[derive(Args)]
struct BinningArgs {
    /// Number of spectrum bins
    #[arg(long)]
    bins: Option<usize>,

    /// Lower spectrum edge (keV)
    #[arg(id = "spectrum_low", long = "spectrum-low")]
    low: Option<f64>,

    /// Upper spectrum edge (keV)
    #[arg(id = "spectrum_high", long = "spectrum-high")]
    high: Option<f64>,
}

impl BinningArgs {
    fn apply(&self, mut spectrum: SpectrumConfig) -> SpectrumConfig {
        if let Some(bins) = self.bins {
            spectrum.bins = bins;
        }
        if let Some(low) = self.low {
            spectrum.energy_low = low;
        }
        if let Some(high) = self.high {
            spectrum.energy_high = high;
        }
        spectrum
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fit per-pixel gains against an emission line and build the spectrum
    Calibrate {
        /// Input event file
        input: PathBuf,

        /// Calibration line preset (am241, co57)
        #[arg(short, long, default_value = "am241")]
        line: String,

        /// Override the line energy (keV)
        #[arg(long)]
        energy: Option<f64>,

        /// Override the lower edge of the peak search window (channels)
        #[arg(long)]
        low: Option<usize>,

        /// Override the upper edge of the peak search window (channels)
        #[arg(long)]
        high: Option<usize>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Detector grid size (pixels per side)
        #[arg(long)]
        grid_size: Option<usize>,

        #[command(flatten)]
        binning: BinningArgs,

        /// Gain map output (text, N x N)
        #[arg(long)]
        gain_out: PathBuf,

        /// Spectrum output (text, midpoint and count)
        #[arg(long)]
        spectrum_out: PathBuf,

        /// Per-pixel fit diagnostics output (CSV)
        #[arg(long)]
        diagnostics_out: Option<PathBuf>,

        /// Calibration report output (JSON)
        #[arg(long)]
        report_out: Option<PathBuf>,
    },

    /// Reconstruct a spectrum with an existing gain map
    Spectrum {
        /// Input event file
        input: PathBuf,

        /// Gain map (text, N x N)
        #[arg(short, long)]
        gain: PathBuf,

        /// Temperature an event must exceed to be valid
        #[arg(long, default_value_t = DEFAULT_MIN_VALID_TEMPERATURE, allow_negative_numbers = true)]
        min_temperature: f64,

        #[command(flatten)]
        binning: BinningArgs,

        /// Spectrum output (text, midpoint and count)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show information about an event file
    Info {
        /// Input event file
        input: PathBuf,

        /// Temperature an event must exceed to be valid
        #[arg(long, default_value_t = DEFAULT_MIN_VALID_TEMPERATURE, allow_negative_numbers = true)]
        min_temperature: f64,
    },

    /// List calibration line presets
    Presets,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn resolve_line(
    name: &str,
    energy: Option<f64>,
    low: Option<usize>,
    high: Option<usize>,
) -> Result<CalibrationLine> {
    let preset = CalibrationLine::preset(name)?;
    if energy.is_none() && low.is_none() && high.is_none() {
        return Ok(preset);
    }
    let source = if energy.is_some() {
        "custom".to_string()
    } else {
        preset.source().to_string()
    };
    Ok(CalibrationLine::new(
        source,
        energy.unwrap_or(preset.energy_kev()),
        low.unwrap_or(preset.search_low()),
        high.unwrap_or(preset.search_high()),
    )?)
}

fn read_events(path: &Path, min_temperature: f64) -> Result<EventTable> {
    let reader = EventFileReader::open(path)?.with_min_valid_temperature(min_temperature);
    let table = reader.read_table()?;
    info!("read {} events from {}", table.len(), path.display());
    Ok(table)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Calibrate {
            input,
            line,
            energy,
            low,
            high,
            config,
            grid_size,
            binning,
            gain_out,
            spectrum_out,
            diagnostics_out,
            report_out,
        } => {
            let line = resolve_line(&line, energy, low, high)?;
            let mut config = match config {
                Some(path) => load_config(path)?,
                None => CalibrationConfig::default(),
            };
            if let Some(grid_size) = grid_size {
                config.grid_size = grid_size;
            }
            config.spectrum = binning.apply(config.spectrum);

            let start = Instant::now();
            let table = read_events(&input, config.min_valid_temperature)?;
            let result = calibrate(&table, &line, &config)?;
            let elapsed = start.elapsed();

            write_gain_map(&gain_out, &result.gain_map)?;
            write_spectrum(&spectrum_out, &result.spectrum)?;
            if let Some(path) = &diagnostics_out {
                write_diagnostics_csv(path, &result.gain_map, &result.report.diagnostics)?;
            }
            if let Some(path) = &report_out {
                write_report_json(path, &result.report)?;
            }

            let summary = result.report.summary;
            println!(
                "Calibrated {} x {} pixels against {} ({} keV) in {:.2}s",
                config.grid_size,
                config.grid_size,
                line.source(),
                line.energy_kev(),
                elapsed.as_secs_f64()
            );
            println!(
                "Events in validity window: {} of {}",
                result.report.window.len(),
                table.len()
            );
            println!(
                "Pixels: {} fit, {} interpolated, {} unfit",
                summary.fit, summary.interpolated, summary.unfit
            );
            println!("Spectrum counts: {}", result.spectrum.total_counts());
            println!("Gain map written to: {}", gain_out.display());
            println!("Spectrum written to: {}", spectrum_out.display());
        }

        Commands::Spectrum {
            input,
            gain,
            min_temperature,
            binning,
            output,
        } => {
            let gain_map = read_gain_map(&gain)?;
            let config = binning.apply(SpectrumConfig::default());
            let table = read_events(&input, min_temperature)?;
            let spectrum = reconstruct_spectrum(&table, &gain_map, &config)?;
            write_spectrum(&output, &spectrum)?;

            println!("Spectrum counts: {}", spectrum.total_counts());
            if let Some(peak) = spectrum.peak_energy() {
                println!("Peak bin: {:.3} keV", peak);
            }
            println!("Spectrum written to: {}", output.display());
        }

        Commands::Info {
            input,
            min_temperature,
        } => {
            let reader =
                EventFileReader::open(&input)?.with_min_valid_temperature(min_temperature);
            let file_size = reader.file_size();

            println!("File: {}", input.display());
            println!(
                "Size: {} bytes ({:.2} MB)",
                file_size,
                file_size as f64 / 1_000_000.0
            );
            println!("Records: {}", reader.record_count());

            let table = reader.read_table()?;
            let window = ValidityWindow::from_table(&table);
            let valid = table.valid.iter().filter(|&&v| v).count();
            let stim = table.stim.iter().filter(|&&s| s).count();
            println!("Valid events: {}", valid);
            println!("Stimulus events: {}", stim);
            println!("Validity window: [{}, {})", window.start, window.end);

            if let (Some(min_row), Some(max_row)) =
                (table.row.iter().min(), table.row.iter().max())
            {
                println!("Row range: {} - {}", min_row, max_row);
            }
            if let (Some(min_col), Some(max_col)) =
                (table.col.iter().min(), table.col.iter().max())
            {
                println!("Column range: {} - {}", min_col, max_col);
            }
        }

        Commands::Presets => {
            println!("{:<8} | {:<12} | {:<16}", "Line", "Energy (keV)", "Search window");
            println!("{:-<42}", "");
            for name in CalibrationLine::PRESET_NAMES {
                let line = CalibrationLine::preset(name)?;
                println!(
                    "{:<8} | {:<12} | [{}, {})",
                    line.source(),
                    line.energy_kev(),
                    line.search_low(),
                    line.search_high()
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_resolve_line_overrides() {
        let line = resolve_line("co57", None, Some(4000), None).unwrap();
        assert_eq!(line.source(), "Co57");
        assert_eq!(line.search_low(), 4000);
        assert_eq!(line.search_high(), 8000);

        let custom = resolve_line("am241", Some(80.0), None, None).unwrap();
        assert_eq!(custom.source(), "custom");
        assert!(resolve_line("am241", None, Some(7000), None).is_err());
        assert!(resolve_line("cs137", None, None, None).is_err());
    }

    #[test]
    fn test_parse_calibrate_args() {
        let cli = Cli::try_parse_from([
            "pixgain",
            "calibrate",
            "events.bin",
            "--line",
            "co57",
            "--bins",
            "500",
            "--gain-out",
            "gain.txt",
            "--spectrum-out",
            "spectrum.txt",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Calibrate { line, binning, .. } => {
                assert_eq!(line, "co57");
                assert_eq!(binning.apply(SpectrumConfig::default()).bins, 500);
            }
            _ => panic!("expected calibrate"),
        }
    }
}
