//! Memory-mapped file readers.
//!

use crate::record::{EventRecord, RECORD_SIZE};
use crate::{Error, Result};
use log::debug;
use memmap2::Mmap;
use pixgain_core::{EventTable, DEFAULT_MIN_VALID_TEMPERATURE};
use rayon::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Records converted per parallel task in `read_table`.
const TABLE_CHUNK_RECORDS: usize = 16 * 1024;

/// A memory-mapped file reader.
///
/// Uses memmap2 to efficiently access file contents without
/// loading the entire file into memory.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|err| Error::MmapError(format!("{}: {err}", path.display())))?;
        Ok(Self {
            mmap,
            path: path.to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Returns the path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reader for binary event files of fixed 96-byte records.
pub struct EventFileReader {
    reader: MappedFileReader,
    min_valid_temperature: f64,
}

impl EventFileReader {
    /// Opens an event file with the default temperature threshold.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        Ok(Self {
            reader,
            min_valid_temperature: DEFAULT_MIN_VALID_TEMPERATURE,
        })
    }

    /// Sets the temperature an event must exceed to be valid.
    #[must_use]
    pub fn with_min_valid_temperature(mut self, temperature: f64) -> Self {
        self.min_valid_temperature = temperature;
        self
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Returns the number of whole records in the file.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.reader.len() / RECORD_SIZE
    }

    fn check_size(&self) -> Result<()> {
        if !self.reader.len().is_multiple_of(RECORD_SIZE) {
            return Err(Error::InvalidFormat(format!(
                "file size {} is not a multiple of {RECORD_SIZE} (file: {})",
                self.reader.len(),
                self.reader.path().display()
            )));
        }
        Ok(())
    }

    /// Decodes every record in file order.
    ///
    /// # Errors
    /// Returns an error if the file size is not a whole number of records.
    pub fn read_records(&self) -> Result<Vec<EventRecord>> {
        self.check_size()?;
        let records: Vec<EventRecord> = self
            .reader
            .as_bytes()
            .par_chunks_exact(RECORD_SIZE)
            .map(|chunk| {
                <&[u8; RECORD_SIZE]>::try_from(chunk)
                    .map(EventRecord::decode)
                    .map_err(|err| Error::InvalidFormat(err.to_string()))
            })
            .collect::<Result<_>>()?;
        debug!(
            "decoded {} records from {}",
            records.len(),
            self.reader.path().display()
        );
        Ok(records)
    }

    /// Reads the file into an event table.
    ///
    /// # Errors
    /// Returns an error if the file size is not a whole number of records.
    pub fn read_table(&self) -> Result<EventTable> {
        let threshold = self.min_valid_temperature;
        let records = self.read_records()?;
        let chunks: Vec<EventTable> = records
            .par_chunks(TABLE_CHUNK_RECORDS)
            .map(|chunk| chunk.iter().map(|record| record.to_event(threshold)).collect())
            .collect();

        // Chunks are collected in file order, so appending keeps event order.
        let mut table = EventTable::with_capacity(records.len());
        for chunk in &chunks {
            table.append(chunk);
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixgain_core::Event;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn record(temperature: f64, row: u16, col: u16, ph: f64) -> EventRecord {
        EventRecord::from_event(&Event::single_pixel(row, col, ph), temperature)
    }

    #[test]
    fn test_mapped_file_reader() {
        let mut file = NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..64).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let reader = MappedFileReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), 64);
        assert!(!reader.is_empty());
        assert_eq!(reader.as_bytes(), &data[..]);
    }

    #[test]
    fn test_event_file_reader_empty() {
        let file = NamedTempFile::new().unwrap();

        let reader = EventFileReader::open(file.path()).unwrap();
        assert_eq!(reader.file_size(), 0);
        assert_eq!(reader.record_count(), 0);
        assert!(reader.read_table().unwrap().is_empty());
    }

    #[test]
    fn test_event_file_reader_invalid_size() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; RECORD_SIZE + 7]).unwrap();
        file.flush().unwrap();

        let reader = EventFileReader::open(file.path()).unwrap();
        assert!(matches!(reader.read_table(), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_read_table_applies_threshold() {
        let mut file = NamedTempFile::new().unwrap();
        for rec in [
            record(-25.0, 0, 0, 1.0),
            record(-15.0, 1, 2, 4200.0),
            record(-19.0, 3, 4, 4300.0),
        ] {
            file.write_all(&rec.encode()).unwrap();
        }
        file.flush().unwrap();

        let table = EventFileReader::open(file.path()).unwrap().read_table().unwrap();
        assert_eq!(table.valid, vec![false, true, true]);
        assert_eq!(table.row, vec![0, 1, 3]);
        assert_eq!(table.col, vec![0, 2, 4]);
        assert_eq!(table.channel, vec![1.0, 4200.0, 4300.0]);

        let strict = EventFileReader::open(file.path())
            .unwrap()
            .with_min_valid_temperature(-16.0)
            .read_table()
            .unwrap();
        assert_eq!(strict.valid, vec![false, true, false]);
    }

    #[test]
    fn test_read_table_keeps_order_across_chunks() {
        let count = TABLE_CHUNK_RECORDS + 3;
        let mut file = NamedTempFile::new().unwrap();
        let mut bytes = Vec::with_capacity(count * RECORD_SIZE);
        for i in 0..count {
            let col = u16::try_from(i % 256).unwrap();
            bytes.extend_from_slice(&record(0.0, 0, col, i as f64).encode());
        }
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let table = EventFileReader::open(file.path()).unwrap().read_table().unwrap();
        assert_eq!(table.len(), count);
        assert!(table.channel.iter().enumerate().all(|(i, &ch)| ch == i as f64));
        assert_eq!(
            table.col[TABLE_CHUNK_RECORDS],
            u16::try_from(TABLE_CHUNK_RECORDS % 256).unwrap()
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = EventFileReader::open(dir.path().join("missing.bin"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
