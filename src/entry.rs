use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time;

/// Kind of reading carried by an [`Entry`].
///
/// Variants are declared in the lexical order of their wire names so the
/// derived `Ord` matches a string comparison of the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Sensor calibration record
    Cal,
    /// Meter (fingerstick) glucose
    Mbg,
    /// Sensor glucose value
    Sgv,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Cal => "cal",
            EntryKind::Mbg => "mbg",
            EntryKind::Sgv => "sgv",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single Nightscout entry, as accepted by the upload API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Unix time in milliseconds
    pub date: i64,
    #[serde(default)]
    pub date_string: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sgv: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unfiltered: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slope: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intercept: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mbg: Option<u16>,
}

impl Entry {
    /// Create an entry of the given kind with no readings attached.
    pub fn new(kind: EntryKind, time: DateTime<Utc>) -> Self {
        Self {
            kind,
            date: time::to_epoch_millis(time),
            date_string: time::date_string(time),
            device: None,
            sgv: None,
            direction: None,
            filtered: None,
            unfiltered: None,
            rssi: None,
            slope: None,
            intercept: None,
            scale: None,
            mbg: None,
        }
    }

    /// Create a sensor glucose entry.
    pub fn sgv(time: DateTime<Utc>, value: u16, device: impl Into<String>) -> Self {
        Self {
            sgv: Some(value),
            device: Some(device.into()),
            ..Self::new(EntryKind::Sgv, time)
        }
    }

    /// Create a meter glucose entry.
    pub fn mbg(time: DateTime<Utc>, value: u16, device: impl Into<String>) -> Self {
        Self {
            mbg: Some(value),
            device: Some(device.into()),
            ..Self::new(EntryKind::Mbg, time)
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        time::to_timestamp(self.date)
    }

    /// The glucose reading for glucose-kind entries.
    pub fn glucose_value(&self) -> Option<u16> {
        match self.kind {
            EntryKind::Sgv => self.sgv,
            EntryKind::Mbg => self.mbg,
            EntryKind::Cal => None,
        }
    }

    pub fn is_sgv(&self) -> bool {
        self.kind == EntryKind::Sgv
    }
}

/// Just the `date` field of an entry, for queries that only need times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EntryTime {
    /// Unix time in milliseconds
    pub date: i64,
}

impl EntryTime {
    pub fn time(&self) -> DateTime<Utc> {
        time::to_timestamp(self.date)
    }
}

/// Read a JSON array of entries from a file.
pub fn read_entries(path: &Path) -> Result<Vec<Entry>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open entries file {}", path.display()))?;
    let entries = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse entries from {}", path.display()))?;
    Ok(entries)
}

/// Write entries as an indented JSON array followed by a newline.
pub fn write_entries<W: Write>(mut writer: W, entries: &[Entry]) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, entries).context("Failed to encode entries")?;
    writeln!(writer).context("Failed to write entries")?;
    Ok(())
}
