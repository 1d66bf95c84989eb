use anyhow::{Context, Result};
use crossbeam::channel::unbounded;
use link::Hub;
use node::World;
use objects::Factory;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;
use tracing::info;
use util::thread::{install_panic_hook, register_shutdown_signals, spawn_with_name, ShutdownFlag};
use util::version::SplashVersion;

/// The controller process (spec.md §1 "World ... owns the master config").
///
/// This binary is a thin external collaborator (SPEC_FULL.md §10): it parses
/// a config path and a couple of flags, then hands off to `node::World`. The
/// richer CLI/scripting surface spec.md §1 calls out as deliberately out of
/// scope is not reimplemented here.
#[derive(StructOpt, Debug)]
#[structopt(name = "world", rename_all = "kebab-case")]
struct Opts {
    /// Name this Root answers to on the Link transport.
    #[structopt(long, default_value = "world")]
    name: String,

    /// Path to a JSON configuration file to load at startup (§6.4).
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Output logs as JSON objects (one per line) instead of human-readable text.
    #[structopt(long)]
    log_json: bool,

    #[structopt(long)]
    version: bool,
}

fn main() -> Result<()> {
    let opts = Opts::from_args();

    if opts.version {
        println!("splash-world {}", SplashVersion::get());
        return Ok(());
    }

    util::logging::init_logging(opts.log_json, "node=info,world=info,warn");

    let (panic_tx, panic_rx) = unbounded();
    install_panic_hook(panic_tx);

    let shutdown = ShutdownFlag::new();
    register_shutdown_signals(shutdown.clone());
    {
        let shutdown = shutdown.clone();
        spawn_with_name("panic-watch", move || {
            if let Ok(msg) = panic_rx.recv() {
                eprintln!("{msg}");
                shutdown.trigger();
            }
        });
    }

    let world = World::new(opts.name.clone(), Factory::new(), shutdown.clone());
    world.attach_link(Hub::new());

    if let Some(path) = &opts.config {
        world
            .load_config(path)
            .with_context(|| format!("loading configuration from `{}`", path.display()))?;
    }

    info!("world '{}' up, waiting for scenes to connect", opts.name);
    while !shutdown.is_set() {
        world.run_tasks();
        std::thread::sleep(Duration::from_millis(50));
    }
    info!("world '{}' shutting down", opts.name);

    Ok(())
}
