//! covidash - COVID-19 incidence, tendency and vaccination progress
//!
//! Loads every source of the selected variant, then either prints a plain
//! summary or shows the terminal dashboard until the user quits.

use std::fs::File;
use std::io;
use std::panic;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use covidash::app::App;
use covidash::cache::CacheManager;
use covidash::cli::{Cli, CliError};
use covidash::config::Settings;
use covidash::fetch::HttpFetcher;
use covidash::loader::{LoadReport, LoadSettings, Loader, Sources};
use covidash::metrics::Metrics;
use covidash::ui;
use covidash::variant::Variant;
use covidash::view::{self, DashboardView};

/// Sets up a panic hook that restores the terminal before printing the panic message.
fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));
}

/// Logs go to stderr or, with `--log-file`, to a file; `RUST_LOG` wins over
/// the default level
fn init_logging(log_file: Option<&Path>, debug: bool) -> io::Result<()> {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

async fn load(
    settings: &Settings,
    variant: &Variant,
    now: DateTime<Utc>,
) -> Result<LoadReport, CliError> {
    let cache = match &settings.cache_dir {
        Some(dir) => CacheManager::with_dir(dir.clone()),
        None => CacheManager::new().ok_or(CliError::NoCacheDir)?,
    };
    debug!(dir = %cache.dir().display(), "cache directory");

    let loader = Loader::new(
        HttpFetcher::new(),
        cache,
        LoadSettings::from(settings),
        now,
    );
    let report = loader.load_all(&Sources::from(&settings.sources), &variant.jobs()).await;

    for failure in &report.failures {
        warn!(domain = %failure.job.domain, key = %failure.job.key, error = %failure.error, "no data");
    }
    info!(
        loaded = report.origins.len(),
        failed = report.failures.len(),
        "load phase finished"
    );
    if settings.debug {
        match serde_json::to_string_pretty(&report.dataset) {
            Ok(json) => debug!("loaded dataset:\n{}", json),
            Err(e) => warn!(error = %e, "cannot print dataset"),
        }
    }
    Ok(report)
}

fn run_dashboard(view: DashboardView, failed_loads: usize) -> Result<(), Box<dyn std::error::Error>> {
    setup_panic_hook();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(view, failed_loads);

    loop {
        terminal.draw(|frame| {
            ui::render_dashboard(frame, &app);
            if app.show_help {
                ui::render_help_overlay(frame);
            }
        })?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
            }
        }

        if app.should_quit {
            break;
        }
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = cli.settings()?;
    init_logging(cli.log_file.as_deref(), settings.debug)?;

    // one reference instant for loading and every metric of this run
    let now = Utc::now();
    let variant = Variant::new(cli.variant);
    let report = load(&settings, &variant, now).await?;

    let metrics = Metrics::new(&report.dataset, &settings, now.date_naive());
    let view = view::build(&variant, &metrics, &report.dataset);

    if cli.plain {
        for line in ui::render_plain(&view) {
            println!("{}", line);
        }
        return Ok(());
    }

    run_dashboard(view, report.failures.len())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    run(Cli::parse()).await
}
