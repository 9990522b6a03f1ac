use clap::{App, Arg};
use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable consulted when `--source` is not given.
pub const SOURCE_ENV_VAR: &str = "CSV_TO_OFX_SRC_FILE";

pub struct Args {
    pub source: PathBuf,
}

impl Args {
    pub fn parse() -> Self {
        Self::parse_from(std::env::args_os())
    }

    pub fn parse_from<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = App::new("csv_to_ofx")
            .version("0.1.0")
            .about("Converts a Finnish Nordea netbank CSV export into an OFX statement")
            .arg(
                Arg::with_name("source")
                    .long("source")
                    .takes_value(true)
                    .required(true)
                    .env(SOURCE_ENV_VAR)
                    .help("path to source csv file, downloaded from nordea netbank"),
            )
            .get_matches_from(args);

        Self {
            source: matches
                .value_of_os("source")
                .map(PathBuf::from)
                .unwrap_or_default(),
        }
    }
}
