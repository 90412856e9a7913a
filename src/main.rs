// ==========================================================
//  lanwatch  - LAN discovery and live host monitoring
// ==========================================================

use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use lanwatch::cli::{choose_interface, version_text, Cli, Command, ScanArgs, ScanSettings, WatchArgs, WatchSettings};
use lanwatch::config::FileConfig;
use lanwatch::inspect::HostInspector;
use lanwatch::net::interface::list_interfaces;
use lanwatch::net::{LocalNetwork, PlatformAdapter, SystemAdapter};
use lanwatch::output::print_devices;
use lanwatch::tui::{self, Banner};
use lanwatch::{
    BudgetLimiter, DeviceStore, DiscoveryContext, HostnameResolver, NetworkScanner, ScanError,
    ScanScheduler, SchedulerConfig, VendorDb,
};

const LOG_FILE: &str = "lanwatch.log";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::from(2) } else { ExitCode::SUCCESS };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    }
}

/// Input errors exit with 2, everything else with 1
fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<ScanError>() {
        Some(e) if e.is_input_error() => ExitCode::from(2),
        _ => ExitCode::from(1),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        config,
        verbose,
        quiet,
        command,
    } = cli;

    match command {
        Command::Version => println!("{}", version_text()),
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "lanwatch", &mut io::stdout());
        }
        Command::Scan(args) => {
            init_logging(log_level(verbose, quiet, "warn"), None);
            let file = load_file_config(config.as_deref())?;
            run_scan(&args, &file).await?;
        }
        Command::Watch(args) => {
            let _guard = init_logging(log_level(verbose, quiet, "info"), Some(LOG_FILE));
            let file = load_file_config(config.as_deref())?;
            run_monitor(&args, &file).await?;
        }
    }
    Ok(())
}

fn log_level(verbose: bool, quiet: bool, default: &'static str) -> &'static str {
    match (verbose, quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => default,
    }
}

/// `RUST_LOG` wins over `level`. With `file`, logs go to that file in the
/// temp dir instead of stderr; keep the returned guard alive to flush it.
fn init_logging(level: &str, file: Option<&str>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    match file {
        Some(name) => {
            let appender = tracing_appender::rolling::never(std::env::temp_dir(), name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
            None
        }
    }
}

fn load_file_config(path: Option<&Path>) -> anyhow::Result<FileConfig> {
    match path {
        Some(path) => Ok(FileConfig::load(path)?),
        None => Ok(FileConfig::default()),
    }
}

async fn run_scan(args: &ScanArgs, file: &FileConfig) -> anyhow::Result<()> {
    let settings = ScanSettings::resolve(args, file)?;
    let adapter: Arc<dyn PlatformAdapter> = Arc::new(SystemAdapter::new());
    let local = LocalNetwork::detect(adapter.as_ref()).await;
    let ctx = DiscoveryContext {
        config: Arc::new(settings.config),
        adapter,
        local: Arc::new(local),
        vendors: Arc::new(VendorDb::new()),
        limits: BudgetLimiter::new(settings.budget),
    };
    let scanner = NetworkScanner::new(ctx, settings.mode);

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let devices = scanner
        .scan(settings.network, &cancel)
        .await
        .with_context(|| format!("scan of {} failed", settings.network))?;
    interrupt.abort();
    if cancel.is_cancelled() {
        warn!("scan interrupted, printing partial results");
    }

    print_devices(&devices, settings.format)?;
    Ok(())
}

async fn run_monitor(args: &WatchArgs, file: &FileConfig) -> anyhow::Result<()> {
    let settings = WatchSettings::resolve(args, file)?;
    let network = match settings.network {
        Some(network) => network,
        None => {
            let candidates = list_interfaces()?;
            choose_interface(&candidates, io::stdin().lock(), io::stdout())?
        }
    };

    let adapter: Arc<dyn PlatformAdapter> = Arc::new(SystemAdapter::new());
    let local = Arc::new(LocalNetwork::detect(adapter.as_ref()).await);
    let limits = BudgetLimiter::new(settings.budget(network));
    let config = Arc::new(settings.config);
    let ctx = DiscoveryContext {
        config: config.clone(),
        adapter: adapter.clone(),
        local: local.clone(),
        vendors: Arc::new(VendorDb::new()),
        limits: limits.clone(),
    };
    let strategy = settings.mode.build(ctx);

    let store = Arc::new(DeviceStore::new());
    let resolver = HostnameResolver::new(
        store.clone(),
        adapter.clone(),
        limits.clone(),
        config.resolve_timeout(),
    );
    let cancel = CancellationToken::new();
    let scheduler_config = SchedulerConfig {
        network,
        interval: settings.interval,
        gateway: local.default_gateway(),
        refresh_timeout: config.tcp_timeout(),
    };
    let (scheduler, handle) = ScanScheduler::new(
        scheduler_config,
        strategy,
        store,
        resolver,
        limits.clone(),
        cancel.clone(),
    );
    info!(%network, mode = settings.mode.as_str(), budget = ?limits.budget(), "starting monitor");
    let scheduler_task = tokio::spawn(scheduler.run());

    let banner = Banner {
        network: network.to_string(),
        strategy: settings.mode.as_str(),
        interval: settings.interval,
    };
    let inspector = HostInspector::new(adapter, &config);
    let result = tui::run_watch(handle, inspector, limits, banner, cancel.clone()).await;

    cancel.cancel();
    if tokio::time::timeout(SHUTDOWN_GRACE, scheduler_task).await.is_err() {
        warn!("scheduler did not stop in time");
    }
    result
}
