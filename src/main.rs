use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use sensor_provision::config::{loader, Settings, TerminalSource};
use sensor_provision::{log_parsed, FsStore, LogCollector, Orchestrator, SystemImpl, VERSION};

/// Provision this board as a sensor reporting appliance.
#[derive(Parser, Debug)]
#[command(name = "sensor-provision", version, about)]
struct Cli {
    /// Settings file (default: /etc/sensor-provision/settings.toml, then ~/.config)
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Directory for run logs and the JSON report
    #[arg(long, value_name = "PATH")]
    log_dir: Option<PathBuf>,

    /// Seconds to wait for the data store before giving up on the probe
    #[arg(long, value_name = "SECS")]
    probe_timeout: Option<u64>,

    /// Print the built-in settings as TOML and exit
    #[arg(long)]
    print_default_settings: bool,
}

/// How long to wait for leftover blocking work (a stuck DNS lookup after the
/// probe gave up on it) once the run has finished.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("[Main] ERROR: Failed to start the async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let code = runtime.block_on(run(cli));
    // Dropping the runtime would block on the resolver thread
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    code
}

async fn run(cli: Cli) -> ExitCode {
    if cli.print_default_settings {
        return match loader::to_toml_string(&Settings::default()) {
            Ok(text) => {
                print!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("[Main] ERROR: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let (settings, settings_path) = match load_settings(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("[Main] ERROR: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // =========================================================================
    // LOGGING INITIALIZATION - before anything touches the host
    // =========================================================================
    let log_dir = settings.log_dir.clone();
    let log_collector = LogCollector::new_or_stderr(&log_dir);
    if let Err(e) = log_collector.install() {
        eprintln!("[Main] WARNING: Failed to register the log collector: {}", e);
    }

    log_parsed!("sensor-provision {} starting", VERSION);
    match &settings_path {
        Some(path) => log::info!("[Main] Settings loaded from {}", path.display()),
        None => log::info!("[Main] No settings file found, using built-in defaults"),
    }
    if let Some(session) = log_collector.session_files() {
        log::info!("[Main] Full log: {}", session.full.display());
    }

    let store = FsStore::new().with_secret_owner(settings.layout.run_user.clone());
    let orchestrator = Orchestrator::new(settings, Arc::new(SystemImpl::new()), Arc::new(store))
    .with_report_dir(log_dir);

    let mut source = TerminalSource::stdio();
    let code = match orchestrator.run(&mut source).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) if e.is_cancellation() => {
            eprintln!("Provisioning cancelled. Nothing on this host was changed.");
            ExitCode::from(e.exit_code())
        }
        Err(e) => {
            eprintln!("Provisioning aborted in '{}': {}", e.component(), e);
            eprintln!("Fix the cause and re-run; completed steps are safe to repeat.");
            ExitCode::from(e.exit_code())
        }
    };

    if let Err(e) = log_collector.wait_for_empty().await {
        eprintln!("[Main] WARNING: Final log flush failed: {}", e);
    }
    code
}

/// Resolve the settings file and apply command-line overrides.
fn load_settings(cli: &Cli) -> anyhow::Result<(Settings, Option<PathBuf>)> {
    let (mut settings, path) = loader::load_or_default(cli.settings.as_deref())
        .context("Failed to load provisioning settings")?;

    if let Some(dir) = &cli.log_dir {
        settings.log_dir = dir.clone();
    }
    if let Some(secs) = cli.probe_timeout {
        settings.probe.timeout_secs = secs;
    }
    settings
        .validate()
        .context("Invalid settings after command-line overrides")?;

    Ok((settings, path))
}
