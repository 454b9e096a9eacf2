use std::io;

use clap::Parser;

use term_canvas::app;
use term_canvas::config::{CanvasConfig, Cli};
use term_canvas::tracing_sub;

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    let config = CanvasConfig::try_from(&cli).map_err(|err| {
        eprintln!("term-canvas: {err}");
        io::Error::new(io::ErrorKind::InvalidInput, err.to_string())
    })?;
    tracing_sub::init(config.log_file.as_deref(), config.log_level)?;
    tracing::info!(
        shell = ?config.shell,
        windows = config.initial_windows,
        "starting"
    );
    app::run(config)
}
