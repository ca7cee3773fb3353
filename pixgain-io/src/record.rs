//! Fixed-size binary event records.
//!
//! Each record is 96 little-endian bytes:
//!
//! | offset | size | field                              |
//! |--------|------|------------------------------------|
//! | 0      | 8    | `temp` (f64, detector temperature) |
//! | 8      | 2    | `rawx` (u16, pixel column)         |
//! | 10     | 2    | `rawy` (u16, pixel row)            |
//! | 12     | 1    | `stim` (u8, nonzero for stimulus)  |
//! | 13     | 3    | padding                            |
//! | 16     | 8    | `ph` (f64, pulse height)           |
//! | 24     | 72   | `ph_com` (9 x f64, 3x3 charge)     |

use pixgain_core::{is_valid_temperature, Event, Neighborhood, PixelCoord};

/// Size of one encoded record in bytes.
pub const RECORD_SIZE: usize = 96;

const TEMP: usize = 0;
const RAWX: usize = 8;
const RAWY: usize = 10;
const STIM: usize = 12;
const PH: usize = 16;
const PH_COM: usize = 24;

/// One decoded event record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventRecord {
    /// Detector temperature.
    pub temperature: f64,
    /// Pixel column.
    pub rawx: u16,
    /// Pixel row.
    pub rawy: u16,
    /// Stimulus (test pulse) flag.
    pub stim: bool,
    /// Pulse height of the central pixel in channels.
    pub ph: f64,
    /// Charge in the 3x3 neighborhood, row-major.
    pub ph_com: [f64; 9],
}

#[inline]
fn read_f64(bytes: &[u8; RECORD_SIZE], offset: usize) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    f64::from_le_bytes(buf)
}

#[inline]
fn read_u16(bytes: &[u8; RECORD_SIZE], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

impl EventRecord {
    /// Builds a record from an event and the temperature it was taken at.
    #[must_use]
    pub fn from_event(event: &Event, temperature: f64) -> Self {
        let mut ph_com = [0.0; 9];
        for (slot, &charge) in ph_com.iter_mut().zip(event.neighborhood.iter().flatten()) {
            *slot = charge;
        }
        Self {
            temperature,
            rawx: event.col(),
            rawy: event.row(),
            stim: event.stim,
            ph: event.channel,
            ph_com,
        }
    }

    /// Decodes a record.
    #[must_use]
    pub fn decode(bytes: &[u8; RECORD_SIZE]) -> Self {
        let mut ph_com = [0.0; 9];
        for (i, slot) in ph_com.iter_mut().enumerate() {
            *slot = read_f64(bytes, PH_COM + i * 8);
        }
        Self {
            temperature: read_f64(bytes, TEMP),
            rawx: read_u16(bytes, RAWX),
            rawy: read_u16(bytes, RAWY),
            stim: bytes[STIM] != 0,
            ph: read_f64(bytes, PH),
            ph_com,
        }
    }

    /// Encodes the record.
    #[must_use]
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[TEMP..TEMP + 8].copy_from_slice(&self.temperature.to_le_bytes());
        bytes[RAWX..RAWX + 2].copy_from_slice(&self.rawx.to_le_bytes());
        bytes[RAWY..RAWY + 2].copy_from_slice(&self.rawy.to_le_bytes());
        bytes[STIM] = u8::from(self.stim);
        bytes[PH..PH + 8].copy_from_slice(&self.ph.to_le_bytes());
        for (i, charge) in self.ph_com.iter().enumerate() {
            let offset = PH_COM + i * 8;
            bytes[offset..offset + 8].copy_from_slice(&charge.to_le_bytes());
        }
        bytes
    }

    /// Converts to an event; it is valid when `temperature > min_valid_temperature`.
    #[must_use]
    pub fn to_event(&self, min_valid_temperature: f64) -> Event {
        let mut neighborhood: Neighborhood = [[0.0; 3]; 3];
        for (i, &charge) in self.ph_com.iter().enumerate() {
            neighborhood[i / 3][i % 3] = charge;
        }
        Event {
            valid: is_valid_temperature(self.temperature, min_valid_temperature),
            coord: PixelCoord::new(self.rawy, self.rawx),
            channel: self.ph,
            stim: self.stim,
            neighborhood,
        }
    }
}
