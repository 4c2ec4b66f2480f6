use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::time::Duration;

mod cli;
mod config;
mod contacts;
mod driver;
mod fault;
mod state;
mod workflow;

use config::{default_config, load_config, resolve_settings, validate_config, Settings};
use driver::{endpoint_port, DriverProcess, WebDriverConfig, WebDriverSession};
use fault::Fault;
use state::{ProgressLedger, SessionStore, StatePaths};
use workflow::{render_status, status_report, supervise, EnrollJob, RunSummary, SystemClock};

const DRIVER_READY_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_tracing(args.verbose);

    let paths = StatePaths::resolve(args.state_dir.as_deref())?;
    let contacts = contacts::load_vcard(&args.contacts)?;
    let mut ledger = ProgressLedger::load(&paths.ledger_path(&args.group))?;
    if contacts.is_empty() {
        tracing::warn!(path = %args.contacts.display(), "contact file has no cards with a phone number");
    }
    if ledger.is_empty() {
        tracing::debug!(path = %ledger.path().display(), "no recorded progress for this group");
    }
    tracing::debug!(
        state_dir = %paths.root().display(),
        contacts = contacts.len(),
        recorded = ledger.len(),
        "loaded inputs"
    );

    if args.status {
        let report = status_report(&args.group, &contacts, &ledger);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{}", render_status(&report));
        }
        return Ok(());
    }

    let settings = load_settings(&args, &paths)?;
    let summary = run_enrollment(&args, &paths, &settings, &contacts, &mut ledger)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&args.group, &summary);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "genroll=debug" } else { "genroll=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(args: &cli::Args, paths: &StatePaths) -> Result<Settings> {
    let config = match args.config.as_deref() {
        Some(path) => load_config(path)?
            .ok_or_else(|| anyhow!("config file {} does not exist", path.display()))?,
        None => load_config(&paths.config_path())?.unwrap_or_else(default_config),
    };
    validate_config(&config)?;
    resolve_settings(
        &config,
        &args.overrides(),
        &paths.root().join("browser-profile"),
        |key| std::env::var(key).ok(),
    )
}

fn run_enrollment(
    args: &cli::Args,
    paths: &StatePaths,
    settings: &Settings,
    contacts: &contacts::ContactSet,
    ledger: &mut ProgressLedger,
) -> Result<RunSummary> {
    let mut process = if args.spawn_driver {
        let port = endpoint_port(&settings.webdriver_url)?;
        Some(DriverProcess::spawn(
            &settings.driver_binary,
            port,
            DRIVER_READY_TIMEOUT,
        )?)
    } else {
        None
    };
    let webdriver = WebDriverConfig {
        url: process
            .as_ref()
            .map_or_else(|| settings.webdriver_url.clone(), DriverProcess::url),
        browser_args: settings.browser_args.clone(),
        request_timeout: REQUEST_TIMEOUT,
        poll_interval: POLL_INTERVAL,
    };
    let sessions = SessionStore::new(paths.session_path());
    let job = EnrollJob {
        group: &args.group,
        contacts,
        sessions: &sessions,
        entry_url: &settings.entry_url,
        options: &settings.options,
    };
    tracing::info!(
        group = %args.group,
        contacts = contacts.len(),
        endpoint = %webdriver.url,
        "starting enrollment"
    );

    let summary = supervise(
        || {
            if let Some(process) = process.as_mut() {
                process
                    .ensure_running(DRIVER_READY_TIMEOUT)
                    .map_err(|err| Fault::driver(format!("{err:#}")))?;
            }
            WebDriverSession::start(&webdriver)
        },
        &SystemClock,
        &settings.policy,
        &job,
        ledger,
    )
    .with_context(|| format!("enroll contacts into {:?}", args.group))?;
    Ok(summary)
}

fn print_summary(group: &str, summary: &RunSummary) {
    let outcome = match summary.outcome {
        workflow::RunOutcome::Completed => "completed",
        workflow::RunOutcome::CycleLimitReached => "cycle limit reached",
        workflow::RunOutcome::GroupUnavailable => "group unavailable",
    };
    println!("{group}: {outcome}");
    println!(
        "cycles: {}, newly selected: {}, confirmed batches: {}",
        summary.cycles, summary.selected, summary.confirmed_batches
    );
    if summary.aborted_cycles > 0 || summary.failed_submits > 0 {
        println!(
            "aborted cycles: {}, failed submits: {}",
            summary.aborted_cycles, summary.failed_submits
        );
    }
    if !summary.held.is_empty() {
        println!("held (selected, not confirmed): {}", summary.held.join(", "));
    }
    println!("remaining: {}", summary.remaining);
}
