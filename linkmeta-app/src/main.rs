use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use linkmeta_common::observability::init_logging;
use linkmeta_config::LinkmetaConfigLoader;
use linkmeta_http::HttpFetcher;
use linkmeta_runtime::LinkmetaRuntime;
use linkmeta_web::{BatchOutcome, Extractor, MetadataService, extract_many};

use cli::{Cli, RunSettings, log_config};
mod cli;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("linkmeta: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    // 1) Load config (env wins over file, flags win over both)
    let loader = match &cli.config {
        Some(path) => LinkmetaConfigLoader::new().with_file(path),
        None => LinkmetaConfigLoader::new().with_default_file(),
    };
    let cfg = loader.load().context("failed to load configuration")?;

    let log_path = init_logging(log_config(&cfg.logging)?)?;
    tracing::debug!(log = %log_path.display(), "app.start");

    let settings = RunSettings::resolve(&cli, &cfg);
    let fetcher =
        HttpFetcher::with_config(settings.fetcher.clone()).context("failed to build HTTP client")?;
    let service = MetadataService::new(fetcher, Extractor::new(settings.profile));

    let runtime = LinkmetaRuntime::build("linkmeta-worker", None)?;
    let handle = runtime.handle();
    let cancel = handle.cancellation();
    let _watcher = handle.cancel_on_ctrl_c();

    let outcomes = runtime.block_on(extract_many(
        &service,
        cli.urls.clone(),
        settings.concurrency,
        &cancel,
    ));
    runtime.shutdown(Duration::from_millis(250));

    let failed = report(
        &outcomes,
        settings.pretty,
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
    )?;
    if failed > 0 {
        tracing::warn!(failed, total = outcomes.len(), "app.failures");
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Successes go to `out` as JSON, failures to `err` as `<url>: <error>`.
/// Returns the number of failures.
fn report<O: Write, E: Write>(
    outcomes: &[BatchOutcome],
    pretty: bool,
    out: &mut O,
    err: &mut E,
) -> Result<usize> {
    let mut failed = 0;
    for outcome in outcomes {
        match &outcome.result {
            Ok(meta) => {
                let json = if pretty {
                    serde_json::to_string_pretty(meta)?
                } else {
                    serde_json::to_string(meta)?
                };
                writeln!(out, "{json}")?;
            }
            Err(e) => {
                failed += 1;
                writeln!(err, "{}: {e}", outcome.url)?;
            }
        }
    }
    out.flush()?;
    Ok(failed)
}
