use anyhow::Result;
use crossbeam::channel::unbounded;
use link::Hub;
use node::Scene;
use objects::Factory;
use std::time::Duration;
use structopt::StructOpt;
use tracing::info;
use util::thread::{install_panic_hook, register_shutdown_signals, spawn_with_name, ShutdownFlag};
use util::version::SplashVersion;

/// The renderer process (spec.md §1 "Scenes ... instantiate Objects as World
/// replicates them").
///
/// Thin external collaborator, same as `world` (SPEC_FULL.md §10): parses a
/// name and which World to connect to, then hands off to `node::Scene`.
#[derive(StructOpt, Debug)]
#[structopt(name = "scene", rename_all = "kebab-case")]
struct Opts {
    /// Name this Root answers to on the Link transport.
    #[structopt(long, default_value = "scene")]
    name: String,

    /// Name of the World Root to connect to.
    #[structopt(long, default_value = "world")]
    world: String,

    /// Marks this Scene as the master (spec.md §4.6 master/non-master Scenes).
    #[structopt(long)]
    master: bool,

    /// Output logs as JSON objects (one per line) instead of human-readable text.
    #[structopt(long)]
    log_json: bool,

    #[structopt(long)]
    version: bool,
}

fn main() -> Result<()> {
    let opts = Opts::from_args();

    if opts.version {
        println!("splash-scene {}", SplashVersion::get());
        return Ok(());
    }

    util::logging::init_logging(opts.log_json, "node=info,scene=info,warn");

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

    let scene = Scene::new(opts.name.clone(), Factory::new(), shutdown.clone());
    scene.attach_link(Hub::new());
    scene.set_master(opts.master);
    scene.connect_to_world(opts.world.clone());

    info!("scene '{}' up, connecting to world '{}'", opts.name, opts.world);
    while !shutdown.is_set() {
        scene.run_tasks();
        std::thread::sleep(Duration::from_millis(50));
    }
    info!("scene '{}' shutting down", opts.name);

    Ok(())
}
