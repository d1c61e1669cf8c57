use clap::Parser;
use env_logger::Env;
use log::{debug, warn};
use snafu::ErrorCompat;

mod args;
mod report;

use crate::report::Overrides;

fn main() {
    let args = args::Args::parse();
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();
    debug!("args: {:?}", args);

    let overrides = Overrides {
        out: args.out.clone(),
        audit_out: args.audit_out.clone(),
        view: args.view.clone(),
        program: args.program.clone(),
        date_start: args.date_start.clone(),
        date_end: args.date_end.clone(),
        application: args.application.clone(),
        year: args.year,
    };

    let res = report::run_report(&args.config, args.reference.as_deref(), &overrides);
    if let Err(e) = res {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(e.as_ref()) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
