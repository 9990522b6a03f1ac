use crate::mapping::Field;
use std::error::Error;
use std::fmt;
use std::fmt::Formatter;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ConvertError {
    /// The source path does not exist or is not a regular file.
    MissingSource(PathBuf),

    /// The source already carries the `.ofx` extension, so the output would
    /// overwrite it.
    DestinationIsSource(PathBuf),

    /// A column named by the field mapping is absent from a row.
    MissingField {
        field: Field,
        column: String,
        line: u64,
    },

    /// The pipeline produced nothing to write.
    NoData,

    /// A mapped value has the wrong shape, e.g. an unparsable amount.
    Mapping {
        field: Field,
        line: u64,
        value: String,
        reason: String,
    },

    Csv(csv::Error),
    Io(io::Error),
}

impl ConvertError {
    /// Process exit status reported for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConvertError::Csv(_) | ConvertError::Io(_) => 1,
            ConvertError::MissingSource(_) | ConvertError::DestinationIsSource(_) => 2,
            ConvertError::MissingField { .. } => 3,
            ConvertError::NoData => 4,
            ConvertError::Mapping { .. } => 5,
        }
    }

    /// Failures outside the known taxonomy; these get a full diagnostic trace.
    pub fn is_unclassified(&self) -> bool {
        matches!(self, ConvertError::Csv(_) | ConvertError::Io(_))
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::MissingSource(path) => write!(
                f,
                "{} doesn't exist (or is not a regular file)",
                path.display()
            ),
            ConvertError::DestinationIsSource(path) => write!(
                f,
                "refusing to overwrite {}: the source already has the .ofx extension",
                path.display()
            ),
            ConvertError::MissingField {
                field,
                column,
                line,
            } => write!(
                f,
                "Field '{}' ({}) is missing from line {}. Check the field mapping.",
                column, field, line
            ),
            ConvertError::NoData => write!(
                f,
                "No data to write. Check that the file has transaction rows and is not filtered down to nothing (start/end)."
            ),
            ConvertError::Mapping {
                field,
                line,
                value,
                reason,
            } => write!(
                f,
                "Possible mapping problem: {} value {:?} on line {}: {}.",
                field, value, line, reason
            ),
            ConvertError::Csv(err) => write!(f, "failed to read csv input: {}", err),
            ConvertError::Io(err) => write!(f, "failed to write ofx output: {}", err),
        }
    }
}

impl From<csv::Error> for ConvertError {
    fn from(err: csv::Error) -> Self {
        ConvertError::Csv(err)
    }
}

impl From<io::Error> for ConvertError {
    fn from(err: io::Error) -> Self {
        ConvertError::Io(err)
    }
}

impl Error for ConvertError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConvertError::Csv(err) => Some(err),
            ConvertError::Io(err) => Some(err),
            _ => None,
        }
    }
}
