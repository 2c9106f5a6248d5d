use std::process;

use clap::Parser;
use tracing::error;

use ssm_ttl_sidecar::cli::Cli;
use ssm_ttl_sidecar::logging::Logging;
use ssm_ttl_sidecar::runner::App;

fn main() {
    if let Err(err) = Logging::try_init() {
        eprintln!("unable to initialize logging: {err}");
        process::exit(1);
    }

    let cli = Cli::parse();

    let code = match App::new(cli).run() {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            1
        }
    };

    process::exit(code);
}
