mod app;
mod background;
mod builtin_themes;
mod config;
mod error;
mod handles;
mod intake;
mod logging;
mod media;
mod playback;
mod position;
mod store;
mod tui;
mod visualizer;

use color_eyre::Result;
use log::{info, warn};

use crate::config::Config;

fn main() -> Result<()> {
    color_eyre::install()?;
    let (config, config_error) = Config::load();
    let data_dir = config.data_dir()?;
    logging::init(&data_dir, &config.log_level)?;
    if let Some(err) = config_error {
        warn!("using default config: {err}");
    }
    info!("starting, data in {}", data_dir.display());
    tui::run(&config)
}
