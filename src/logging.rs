//! The terminal belongs to the UI, so log lines go to a file in the data directory.
use std::{fs::OpenOptions, path::Path};

use env_logger::{Builder, Env, Target};
use eyre::{Result, WrapErr};

pub const LOG_FILE: &str = "tunedrop.log";

/// `RUST_LOG` overrides `level`.
pub fn init(data_dir: &Path, level: &str) -> Result<()> {
    std::fs::create_dir_all(data_dir)
        .wrap_err_with(|| format!("creating {}", data_dir.display()))?;
    let path = data_dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .wrap_err_with(|| format!("opening log file {}", path.display()))?;

    Builder::from_env(Env::default().default_filter_or(level))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .wrap_err("logger already installed")
}
