#[macro_use]
extern crate tracing;

use std::path::PathBuf;

use color_eyre::eyre::{eyre, WrapErr};
use structopt::StructOpt;
use tokio::{
    runtime::Builder,
    signal::{self, unix::SignalKind},
};

use gammy::{
    control::{ControlHandleError, ControlLoop},
    models::{
        backend::{ConfigBackend, FileBackend},
        Backend, Config, ScheduleDraft,
    },
    platform,
    ramp::RampStore,
};

#[derive(Debug, StructOpt)]
struct Opts {
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u32,
    #[structopt(short, long = "config")]
    config_path: Option<PathBuf>,
    /// Override the configured display backend (x11, dummy)
    #[structopt(long)]
    backend: Option<Backend>,
    #[structopt(long)]
    dump_config: bool,
}

/// Load the configuration file, writing it back if its schedule had to be corrected
async fn load_config(file: &mut FileBackend) -> color_eyre::eyre::Result<Config> {
    let mut config = file
        .load()
        .await
        .wrap_err_with(|| format!("failed to load {}", file.path().display()))?;

    let schedule = ScheduleDraft::new(&config.schedule).accept();
    if schedule != config.schedule {
        config.schedule = schedule;
        file.save(&config).await?;
    }

    Ok(config)
}

async fn run(opts: Opts) -> color_eyre::eyre::Result<()> {
    let config_path = match opts.config_path {
        Some(path) => path,
        None => FileBackend::default_path()
            .ok_or_else(|| eyre!("cannot determine the configuration directory"))?,
    };

    // Load configuration
    let mut file = FileBackend::new(&config_path);
    let mut config = load_config(&mut file).await?;

    if let Some(backend) = opts.backend {
        config.backend = backend;
    }

    // Dump configuration if this was asked
    if opts.dump_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        backend = %config.backend,
        "starting"
    );

    // Registered before the display is touched, nothing below may return early
    let mut sigterm = signal::unix::signal(SignalKind::terminate())?;
    let mut sighup = signal::unix::signal(SignalKind::hangup())?;

    let platform = platform::open(&config)?;
    let store = RampStore::initialize(platform.ramp)?;
    let (control, handle) = ControlLoop::new(store, platform.screen, config);

    // The control loop owns the display, run it on its own thread
    let control_thread = std::thread::Builder::new()
        .name("gammy-control".to_owned())
        .spawn(move || -> color_eyre::eyre::Result<()> {
            let rt = Builder::new_current_thread().enable_time().build()?;
            Ok(rt.block_on(control.run())?)
        })?;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = sigterm.recv() => {
                info!("terminated");
                break;
            }
            _ = sighup.recv() => {
                match load_config(&mut file).await {
                    Ok(mut config) => {
                        // The display cannot be reopened while running
                        config.backend = handle.config().backend;

                        match handle.update_config(config) {
                            Ok(()) => info!("configuration reloaded"),
                            Err(ControlHandleError::Invalid(error)) => {
                                error!(error = %error, "reloaded configuration rejected");
                            }
                            Err(ControlHandleError::Dropped) => {
                                warn!("control loop stopped, exiting");
                                break;
                            }
                        }
                    }
                    Err(error) => {
                        error!(error = %error, "failed to reload configuration");
                    }
                }
            }
        }
    }

    handle.shutdown();

    tokio::task::spawn_blocking(move || control_thread.join())
        .await?
        .map_err(|_| eyre!("control thread panicked"))?
}

fn install_tracing(opts: &Opts) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let fmt_layer = fmt::layer();

    let filter_layer = EnvFilter::try_from_env("GAMMY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(match opts.verbose {
            0 => "gammy=warn,gammyd=warn",
            1 => "gammy=info,gammyd=info",
            2 => "gammy=debug,gammyd=debug",
            _ => "gammy=trace,gammyd=trace",
        })
    });

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init()
}

#[paw::main]
fn main(opts: Opts) -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    install_tracing(&opts)?;

    // Create tokio runtime, only used for signals and configuration reloads
    let thd_count = num_cpus::get().min(2);

    let rt = Builder::new_multi_thread()
        .worker_threads(thd_count)
        .enable_all()
        .build()?;
    rt.block_on(run(opts))
}
