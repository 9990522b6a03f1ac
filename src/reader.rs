use crate::errors::ConvertError;
use crate::mapping::Mapping;
use csv::{StringRecord, StringRecordsIntoIter, Trim};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Column name to raw value for one data line.
pub type Row = HashMap<String, String>;

/// A row together with the 1-based line it was read from.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub line: u64,
    pub values: Row,
}

/// Lazy, file-ordered sequence of records.
pub struct Records<R: Read> {
    headers: StringRecord,
    inner: StringRecordsIntoIter<R>,
}

/// Opens the CSV file at `path` using the delimiter and header settings of
/// the provided mapping.
pub fn read_records(path: &Path, mapping: &Mapping) -> Result<Records<File>, ConvertError> {
    // Note: the csv library handles setting up an io::BufReader so we don't
    // need to do that here.
    let reader = builder(mapping).from_path(path)?;
    Records::new(reader)
}

/// Same as [`read_records`] but over any reader.
pub fn read_records_from<R: Read>(rdr: R, mapping: &Mapping) -> Result<Records<R>, ConvertError> {
    Records::new(builder(mapping).from_reader(rdr))
}

fn builder(mapping: &Mapping) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(mapping.delimiter)
        .has_headers(mapping.has_header)
        // Short rows must surface as missing fields, not as csv errors.
        .flexible(true)
        .trim(Trim::All);
    builder
}

impl<R: Read> Records<R> {
    fn new(mut reader: csv::Reader<R>) -> Result<Self, ConvertError> {
        let headers = if reader.has_headers() {
            reader.headers()?.clone()
        } else {
            StringRecord::new()
        };

        Ok(Self {
            headers,
            inner: reader.into_records(),
        })
    }

    fn to_record(&self, record: &StringRecord) -> Record {
        let values = self
            .headers
            .iter()
            .zip(record.iter())
            .map(|(column, value)| (column.to_string(), value.to_string()))
            .collect();

        Record {
            line: record.position().map(|pos| pos.line()).unwrap_or_default(),
            values,
        }
    }
}

impl<R: Read> Iterator for Records<R> {
    type Item = Result<Record, ConvertError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.inner.next()? {
                Ok(record) => record,
                Err(err) => return Some(Err(err.into())),
            };

            // Lines made of nothing but delimiters carry no transaction.
            if record.iter().all(str::is_empty) {
                continue;
            }

            return Some(Ok(self.to_record(&record)));
        }
    }
}
