mod app;
mod commands;
mod config;
mod event;
mod fetch;
mod logging;
mod persist;
mod store;
mod swapi;
mod table;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "holocron")]
#[command(about = "A terminal browser for the Star Wars API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/holocron/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Listing to open at startup
  #[arg(short, long, value_enum)]
  resource: Option<config::Resource>,

  /// Visible columns, comma separated (e.g. name,mass,height)
  #[arg(long)]
  cols: Option<String>,

  /// Sort chain, comma separated, `-` for descending (e.g. -mass,name)
  #[arg(long)]
  sort: Option<String>,

  /// Do not read or write the preference store
  #[arg(long)]
  no_persist: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Logging is best effort; the UI works without it
  let _log_guard = match logging::init() {
    Ok(guard) => Some(guard),
    Err(e) => {
      eprintln!("warning: {}", e);
      None
    }
  };

  let config = config::Config::load(args.config.as_deref())?;

  // Override the start listing if specified on command line
  let config = if let Some(resource) = args.resource {
    config::Config {
      default_resource: resource,
      ..config
    }
  } else {
    config
  };

  let overrides = app::TableOverrides {
    columns: args.cols,
    sort: args.sort,
    no_persist: args.no_persist,
  };

  let mut app = app::App::new(config, overrides)?;
  app.run().await?;

  Ok(())
}
