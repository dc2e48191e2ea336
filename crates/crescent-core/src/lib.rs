pub mod cli;
pub mod click;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod filter;
pub mod phrase;
pub mod prayer;
pub mod refresh;
pub mod render;
pub mod store;
pub mod tally;
pub mod task;
pub mod toggle;
pub mod view;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{debug, info};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        "starting crescent CLI"
    );

    let mut cfg = config::Config::load(cli.config.as_deref())?;
    cfg.apply_overrides(cli.rc_overrides.into_iter().map(|kv| (kv.key, kv.value)));
    debug!(files = ?cfg.loaded_files, "configuration loaded");

    let store_path = config::resolve_store_path(&cfg, cli.store.as_deref())
        .context("failed to resolve widget store location")?;

    let store = store::FileStore::open(&store_path)
        .with_context(|| format!("failed to open widget store at {}", store_path.display()))?;

    let renderer = render::Renderer::new(&cfg)?;
    let clock = datetime::WidgetClock::from_config(&cfg);
    let command = cli
        .command
        .unwrap_or(cli::Command::Tasks { widget: None });

    let mut session = commands::Session::new(
        &store,
        &cfg,
        &renderer,
        clock,
        Utc::now(),
        io::stdout().lock(),
    );
    commands::dispatch(&mut session, command)?;

    info!("done");
    Ok(())
}
