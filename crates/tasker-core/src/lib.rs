pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod derive;
pub mod render;
pub mod store;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting tasker"
  );

  let mut cfg = config::Config::load(
    cli.taskerrc.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );
  debug!(files = ?cfg.loaded_files, "configuration loaded");

  let data_dir = cfg
    .data_dir(cli.data.as_deref())
    .context(
      "failed to resolve data \
       directory"
    )?;

  let datastore =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let mut store =
    store::TaskStore::open(
      datastore,
      &cfg.storage_key()
    )?;

  let renderer =
    render::Renderer::new(&cfg)?;

  commands::dispatch(
    &mut store,
    &cfg,
    &renderer,
    cli.command
  )?;

  info!("done");
  Ok(())
}
