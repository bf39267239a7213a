//! Manifest parsing.
//!
//! A manifest is a CSV file with a header row. Five columns are required, three
//! are optional, and anything else is ignored. Rows are produced lazily and in
//! file order.

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use serde::Serialize;

use crate::client::AssetMetadata;
use crate::error::ManifestError;

pub const COL_REFERENCE_NAME: &str = "reference_image_name";
pub const COL_REFERENCE_PATH: &str = "reference_image_path";
pub const COL_ANGLE_1: &str = "angle_direction_1";
pub const COL_ANGLE_2: &str = "angle_direction_2";
pub const COL_ACTION_1: &str = "action_direction_1";
pub const COL_ACTION_2: &str = "action_direction_2";
pub const COL_ACTION_3: &str = "action_direction_3";
pub const COL_PROMPT: &str = "prompt";

pub const REQUIRED_COLUMNS: [&str; 5] = [
    COL_REFERENCE_NAME,
    COL_REFERENCE_PATH,
    COL_ANGLE_1,
    COL_ANGLE_2,
    COL_ACTION_1,
];

pub const OPTIONAL_COLUMNS: [&str; 3] = [COL_ACTION_2, COL_ACTION_3, COL_PROMPT];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestRow {
    /// 1-based physical line of the record in the manifest file.
    pub line: u64,
    pub reference_name: String,
    pub declared_path: String,
    pub metadata: AssetMetadata,
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    reference_name: usize,
    reference_path: usize,
    angle_1: usize,
    angle_2: usize,
    action_1: usize,
    action_2: Option<usize>,
    action_3: Option<usize>,
    prompt: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self, ManifestError> {
        let names: Vec<&str> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let name = if idx == 0 {
                    name.trim_start_matches('\u{feff}')
                } else {
                    name
                };
                name.trim()
            })
            .collect();

        let position = |column: &str| names.iter().position(|name| *name == column);

        let missing: Vec<&'static str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|column| position(column).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ManifestError::MissingColumns { missing });
        }

        let required = |column: &str| position(column).unwrap_or_default();

        Ok(Self {
            reference_name: required(COL_REFERENCE_NAME),
            reference_path: required(COL_REFERENCE_PATH),
            angle_1: required(COL_ANGLE_1),
            angle_2: required(COL_ANGLE_2),
            action_1: required(COL_ACTION_1),
            action_2: position(COL_ACTION_2),
            action_3: position(COL_ACTION_3),
            prompt: position(COL_PROMPT),
        })
    }

    fn build_row(&self, record: &StringRecord, line: u64) -> ManifestRow {
        let raw = |idx: usize| record.get(idx).unwrap_or_default().to_string();
        let cell = |idx: Option<usize>| idx.and_then(|idx| non_blank(record.get(idx)));

        ManifestRow {
            line,
            reference_name: raw(self.reference_name),
            declared_path: raw(self.reference_path),
            metadata: AssetMetadata {
                angle_1: cell(Some(self.angle_1)),
                angle_2: cell(Some(self.angle_2)),
                action_1: cell(Some(self.action_1)),
                action_2: cell(self.action_2),
                action_3: cell(self.action_3),
                prompt: cell(self.prompt),
            },
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
}

/// An opened manifest whose header has been checked.
pub struct ManifestReader {
    records: StringRecordsIntoIter<File>,
    columns: ColumnIndex,
}

impl ManifestReader {
    pub fn open(path: &Path) -> Result<Self, ManifestError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|source| ManifestError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let headers = reader.headers().map_err(ManifestError::Header)?.clone();
        let columns = ColumnIndex::from_headers(&headers)?;

        Ok(Self {
            records: reader.into_records(),
            columns,
        })
    }
}

impl Iterator for ManifestReader {
    type Item = Result<ManifestRow, ManifestError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(match record {
            Ok(record) => {
                let line = record.position().map(|pos| pos.line()).unwrap_or_default();
                Ok(self.columns.build_row(&record, line))
            }
            Err(source) => {
                let line = source
                    .position()
                    .map(|pos| pos.line())
                    .unwrap_or_default();
                Err(ManifestError::Record { line, source })
            }
        })
    }
}
