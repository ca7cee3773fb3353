//! File writers for event data and calibration output.

use crate::record::EventRecord;
use crate::{Error, Result};
use pixgain_algorithms::CalibrationReport;
use pixgain_core::{Event, FitDiagnostics, GainMap, Spectrum};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Writer for binary event files.
///
/// Produces the fixed-record format read by
/// [`EventFileReader`](crate::EventFileReader).
pub struct EventFileWriter {
    writer: BufWriter<File>,
    records: usize,
}

impl EventFileWriter {
    /// Creates a new file writer.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer, records: 0 })
    }

    /// Writes one record.
    pub fn write_record(&mut self, record: &EventRecord) -> Result<()> {
        self.writer.write_all(&record.encode())?;
        self.records += 1;
        Ok(())
    }

    /// Writes events recorded at the given temperature.
    pub fn write_events<'a, I>(&mut self, events: I, temperature: f64) -> Result<()>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        for event in events {
            self.write_record(&EventRecord::from_event(event, temperature))?;
        }
        Ok(())
    }

    /// Number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records
    }

    /// Flushes the writer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes the gain map as `N` lines of `N` whitespace-separated gains.
///
/// Unfit pixels are written as `0`.
pub fn write_gain_map<P: AsRef<Path>>(path: P, gain_map: &GainMap) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let n = gain_map.grid_size();
    for row in gain_map.to_values().chunks(n) {
        let line: Vec<String> = row.iter().map(ToString::to_string).collect();
        writeln!(writer, "{}", line.join(" "))?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a gain map written by [`write_gain_map`].
///
/// Positive values load as fitted gains, zeros as unfit pixels.
pub fn read_gain_map<P: AsRef<Path>>(path: P) -> Result<GainMap> {
    let reader = BufReader::new(File::open(path)?);
    let mut values = Vec::new();
    let mut rows = 0;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| Error::InvalidFormat(format!("line {}: {err}", line_no + 1)))?;
        values.extend(row);
        rows += 1;
    }

    if rows == 0 || values.len() != rows * rows {
        return Err(Error::InvalidFormat(format!(
            "gain map is not square: {} values in {rows} rows",
            values.len()
        )));
    }
    Ok(GainMap::from_values(rows, &values)?)
}

/// Writes the spectrum as `midpoint count` lines.
pub fn write_spectrum<P: AsRef<Path>>(path: P, spectrum: &Spectrum) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for (midpoint, count) in spectrum.bin_midpoints_kev.iter().zip(&spectrum.counts) {
        writeln!(writer, "{midpoint} {count}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes one CSV row per pixel with its gain state and fit results.
///
/// Fit columns are empty for pixels without a successful fit.
pub fn write_diagnostics_csv<P: AsRef<Path>>(
    path: P,
    gain_map: &GainMap,
    diagnostics: &[FitDiagnostics],
) -> Result<()> {
    let by_pixel: HashMap<(usize, usize), &FitDiagnostics> = diagnostics
        .iter()
        .map(|d| ((usize::from(d.coord.row), usize::from(d.coord.col)), d))
        .collect();

    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(
        writer,
        "row,col,state,gain,centroid,mean,stddev,fwhm_kev,fwhm_err_kev"
    )?;
    for (row, col) in gain_map.coords() {
        let gain = gain_map.get(row, col);
        write!(writer, "{row},{col},{},{}", gain.label(), gain.value())?;
        match by_pixel.get(&(row, col)) {
            Some(d) => writeln!(
                writer,
                ",{},{},{},{},{}",
                d.centroid, d.mean, d.stddev, d.fwhm_kev, d.fwhm_err_kev
            )?,
            None => writeln!(writer, ",,,,,")?,
        }
    }
    writer.flush()?;
    Ok(())
}

/// Writes the calibration report as pretty-printed JSON.
pub fn write_report_json<P: AsRef<Path>>(path: P, report: &CalibrationReport) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
