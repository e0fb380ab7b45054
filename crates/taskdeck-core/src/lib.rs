pub mod api;
pub mod cli;
pub mod config;
pub mod render;
pub mod routes;
pub mod session;
pub mod session_store;
pub mod shell;
pub mod task;
pub mod view_model;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::info;

#[tracing::instrument(skip_all)]
pub async fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);
    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(verbose = cli.verbose, quiet = cli.quiet, "starting taskdeck");

    let mut cfg = config::Config::load(cli.taskdeckrc.as_deref())?;
    cfg.apply_overrides(
        cli.rc_overrides
            .into_iter()
            .map(|kv| (kv.key, kv.value))
            .chain(
                cli.server
                    .into_iter()
                    .map(|url| ("server.url".to_string(), url)),
            ),
    );

    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;

    let store = session_store::SessionStore::open(&data_dir)
        .with_context(|| format!("failed to open session store at {}", data_dir.display()))?;
    let mut session = session::SessionController::activate(store)?;

    let service = api::HttpTaskService::new(&cfg.server_url())?;
    let mut vm = view_model::TaskViewModel::new(service);
    let mut renderer = render::Renderer::new(&cfg)?;

    shell::run(&mut session, &mut vm, &mut renderer, &cli.path).await?;

    info!("done");
    Ok(())
}
