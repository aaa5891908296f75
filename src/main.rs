mod api;
mod app;
mod cache;
mod commands;
mod config;
mod db;
mod event;
mod logging;
mod mutation;
mod net;
mod store;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "grocer")]
#[command(about = "A terminal grocery list with a chat assistant")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./grocer.yaml, then $XDG_CONFIG_HOME/grocer/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Grocery service root; "/api" is appended
  #[arg(long, env = "GROCER_API_URL")]
  api_url: Option<String>,

  /// Serve static assets and failed API reads from the offline cache
  #[arg(long, overrides_with = "no_offline")]
  offline: bool,

  /// Talk to the network only
  #[arg(long, overrides_with = "offline")]
  no_offline: bool,
}

impl Args {
  /// Fold command line overrides into the file configuration
  fn apply(self, mut config: config::Config) -> config::Config {
    if let Some(url) = self.api_url {
      config.api.url = Some(url);
    }
    if self.offline {
      config.offline.enabled = true;
    }
    if self.no_offline {
      config.offline.enabled = false;
    }
    config
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = config::Config::load(args.config.as_deref())?;
  let config = args.apply(config);

  // Held until exit so buffered log lines are flushed
  let _log_guard = match config::data_dir()
    .and_then(|dir| logging::init_logging(&config.log, &dir.join("logs")))
  {
    Ok(guard) => Some(guard),
    Err(e) => {
      eprintln!("grocer: logging disabled: {}", e);
      None
    }
  };

  let mut app = app::App::new(&config)?;
  app.run().await?;

  Ok(())
}
