use csv_to_ofx::args::Args;
use csv_to_ofx::engine::Converter;
use csv_to_ofx::errors::ConvertError;
use csv_to_ofx::mapping::Mapping;
use log::error;
use std::error::Error;
use std::process;

fn main() {
    env_logger::init();

    let args = Args::parse();
    let converter = Converter::new(Mapping::nordea());

    match converter.convert(&args.source) {
        Ok(dest) => println!("Created {}", dest.display()),
        Err(err) => {
            if err.is_unclassified() {
                report_trace(&err);
            }
            eprintln!("{}", err);
            process::exit(err.exit_code());
        }
    }
}

/// Logs the debug form of an unexpected failure and its full cause chain.
fn report_trace(err: &ConvertError) {
    error!("unexpected failure: {:?}", err);

    let mut cause = err.source();
    while let Some(inner) = cause {
        error!("caused by: {}", inner);
        cause = inner.source();
    }
}
