use anyhow::Result;
use chrono::Local;
use clap::Parser;
use covidplot::cli::{self, Args, UsageError};
use reqwest::blocking::Client;
use std::{io, process::ExitCode, time::Duration};
use tracing::{debug, error};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> ExitCode {
    // ─── 1) init logging (stderr, stdout carries the report) ─────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,covidplot=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .init();

    // ─── 2) parse CLI (clap handles -h / -V and exits itself) ────────
    let args = Args::parse();
    debug!(?args, "startup");

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<UsageError>() {
            Some(usage) => {
                eprintln!("Error: {}", usage);
                ExitCode::from(usage.exit_code())
            }
            None => {
                error!("{:#}", err);
                ExitCode::FAILURE
            }
        },
    }
}

fn run(args: &Args) -> Result<()> {
    let client = Client::builder()
        .user_agent(concat!("covidplot/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(60))
        .build()?;
    let today = Local::now().date_naive();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    cli::run(args, &client, today, &mut out)
}
