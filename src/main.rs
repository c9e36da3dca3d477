mod app;
mod cache;
mod commands;
mod config;
mod db;
mod event;
mod inventory;
mod logging;
mod optimistic;
mod query;
mod retry;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::info;

use crate::cache::QueryCache;
use crate::db::DraftStore;
use crate::inventory::{CachedInventoryClient, InventoryClient};

#[derive(Parser, Debug)]
#[command(name = "stockroom")]
#[command(about = "A terminal client for warehouse inventory, with offline-friendly caching")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/stockroom/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Override the API base URL from the config file
  #[arg(long)]
  api_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let mut config = config::Config::load(args.config.as_deref())?;
  if let Some(url) = args.api_url {
    config.api.url = url;
  }

  // Flushes buffered log lines when dropped at the end of main
  let _log_guard = logging::init(&config.logging)?;
  info!(api = %config.api.url, "starting");

  let password = config::Config::get_password()?;
  let mut client = InventoryClient::new(&config)?;
  client.login(&config.api.username, &password).await?;

  let api = CachedInventoryClient::new(client, QueryCache::new(), &config);
  let drafts = DraftStore::open()?;

  let mut app = app::App::new(config, api, drafts);
  app.run().await?;

  Ok(())
}
