//! JSON calibration configuration files.

use crate::Result;
use log::debug;
use pixgain_core::CalibrationConfig;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Loads and validates a calibration configuration.
///
/// Missing keys take their default values.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CalibrationConfig> {
    let path = path.as_ref();
    let config: CalibrationConfig = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    config.validate()?;
    debug!("loaded configuration from {}: {config:?}", path.display());
    Ok(config)
}

/// Saves a configuration as pretty-printed JSON.
pub fn save_config<P: AsRef<Path>>(path: P, config: &CalibrationConfig) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, config)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
