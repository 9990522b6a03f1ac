use crate::errors::ConvertError;
use crate::mapping::Mapping;
use crate::ofx::Ofx;
use crate::reader::read_records;
use crate::transactions::{build, clean, group, Statement};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const OFX_EXTENSION: &str = "ofx";

/// A Converter turns one bank CSV export into an OFX statement file using a
/// fixed field mapping.
pub struct Converter {
    mapping: Mapping,
}

impl Converter {
    pub fn new(mapping: Mapping) -> Self {
        Self { mapping }
    }

    /// Converts the CSV file at `source` and writes the result next to it,
    /// returning the path of the created file.
    ///
    /// The source is checked before anything is parsed, and the whole
    /// document is rendered before the destination is opened, so a failed
    /// conversion never leaves a partial or empty file behind.
    pub fn convert(&self, source: &Path) -> Result<PathBuf, ConvertError> {
        if !source.is_file() {
            return Err(ConvertError::MissingSource(source.to_path_buf()));
        }

        let dest = destination_path(source);
        if has_ofx_extension(source) {
            return Err(ConvertError::DestinationIsSource(source.to_path_buf()));
        }

        info!("converting {} into {}", source.display(), dest.display());

        let chunks = self.render(source)?;
        let written = write_chunks(&dest, &chunks)?;

        info!("wrote {} bytes to {}", written, dest.display());
        Ok(dest)
    }

    /// Runs the read, group, build and clean pipeline over `source` and
    /// returns the OFX document as ordered chunks: header, body, footer.
    pub fn render(&self, source: &Path) -> Result<Vec<String>, ConvertError> {
        let records = read_records(source, &self.mapping)?;

        let groups = group(records, &self.mapping)?;
        info!(
            "read {} rows in {} groups",
            groups.iter().map(|g| g.records.len()).sum::<usize>(),
            groups.len()
        );

        let built = build(groups, &self.mapping)?;
        let statements = clean(built);

        let server_date = match latest_date(&statements) {
            Some(date) => date,
            None => return Err(ConvertError::NoData),
        };
        info!(
            "rendering {} transactions across {} statements",
            statements.iter().map(|s| s.transactions.len()).sum::<usize>(),
            statements.len()
        );

        let ofx = Ofx::new(&self.mapping, server_date);

        let mut chunks = vec![ofx.header()];
        chunks.extend(ofx.body(&statements));
        chunks.push(ofx.footer());

        Ok(chunks)
    }
}

/// The destination shares the source's directory and stem and carries the
/// `.ofx` extension: `export.csv` becomes `export.ofx`.
pub fn destination_path(source: &Path) -> PathBuf {
    source.with_extension(OFX_EXTENSION)
}

/// Case-insensitive, so `export.OFX` is caught on filesystems that would
/// resolve it to the same file as `export.ofx`.
fn has_ofx_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(OFX_EXTENSION))
}

fn latest_date(statements: &[Statement]) -> Option<chrono::NaiveDate> {
    statements.iter().filter_map(Statement::end_date).max()
}

/// Writes every chunk to `dest`, creating or truncating it. The file is
/// flushed before returning and closed when the writer goes out of scope, on
/// success and on error alike.
fn write_chunks(dest: &Path, chunks: &[String]) -> Result<usize, ConvertError> {
    let mut writer = BufWriter::new(File::create(dest)?);
    let mut written = 0;

    for chunk in chunks {
        writer.write_all(chunk.as_bytes())?;
        written += chunk.len();
    }

    // Flush explicitly so write errors are reported instead of being lost
    // when the BufWriter is dropped.
    writer.flush()?;

    Ok(written)
}
