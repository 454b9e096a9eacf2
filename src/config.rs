use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tracing::Level;

use crate::constants::{MAX_FONT_SIZE, MIN_FONT_SIZE};
use crate::grid::FontSpec;
use crate::pty::default_shell;

const MAX_INITIAL_WINDOWS: usize = 16;

#[derive(Parser, Debug)]
#[command(
    name = "term-canvas",
    version = env!("CARGO_PKG_VERSION"),
    about = "Zoomable, draggable terminal windows on an infinite canvas"
)]
pub struct Cli {
    /// Command each new window runs. Defaults to $SHELL.
    #[arg(short = 's', long = "shell", value_name = "COMMAND")]
    pub shell: Option<String>,

    /// Terminal font size in points.
    #[arg(long = "font-size", value_name = "PT", default_value_t = 13.0)]
    pub font_size: f64,

    #[arg(long = "font-family", value_name = "NAME", default_value = "monospace")]
    pub font_family: String,

    /// Display (device pixel) scale applied on top of the canvas zoom.
    #[arg(long = "display-scale", value_name = "FACTOR", default_value_t = 1.0)]
    pub display_scale: f64,

    /// Windows opened at startup.
    #[arg(short = 'n', long = "windows", value_name = "COUNT", default_value_t = 1)]
    pub windows: usize,

    /// Append logs to this file. Without it, logs are discarded.
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Upper bound on how long the loop waits for input between frames.
    #[arg(long = "tick-ms", value_name = "MS", default_value_t = 16)]
    pub tick_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("font size must be between 6 and 48, got {0}")]
    FontSize(f64),
    #[error("display scale must be between 0.25 and 8, got {0}")]
    DisplayScale(f64),
    #[error("at most 16 initial windows, got {0}")]
    TooManyWindows(usize),
    #[error("unknown log level `{0}`")]
    LogLevel(String),
    #[error("tick interval must be between 1 and 1000 ms, got {0}")]
    Tick(u64),
    #[error("could not parse shell command: {0}")]
    Shell(#[from] shell_words::ParseError),
    #[error("shell command is empty")]
    EmptyShell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanvasConfig {
    pub shell: Vec<String>,
    pub font: FontSpec,
    pub display_scale: f64,
    pub initial_windows: usize,
    pub log_file: Option<PathBuf>,
    pub log_level: Level,
    pub tick: Duration,
}

impl TryFrom<&Cli> for CanvasConfig {
    type Error = ConfigError;

    fn try_from(cli: &Cli) -> Result<Self, Self::Error> {
        if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&cli.font_size) {
            return Err(ConfigError::FontSize(cli.font_size));
        }
        if !(0.25..=8.0).contains(&cli.display_scale) {
            return Err(ConfigError::DisplayScale(cli.display_scale));
        }
        if cli.windows > MAX_INITIAL_WINDOWS {
            return Err(ConfigError::TooManyWindows(cli.windows));
        }
        if !(1..=1000).contains(&cli.tick_ms) {
            return Err(ConfigError::Tick(cli.tick_ms));
        }
        let log_level = cli
            .log_level
            .parse::<Level>()
            .map_err(|_| ConfigError::LogLevel(cli.log_level.clone()))?;
        let raw_shell = cli.shell.clone().unwrap_or_else(default_shell);
        let shell = shell_words::split(&raw_shell)?;
        if shell.is_empty() {
            return Err(ConfigError::EmptyShell);
        }
        Ok(Self {
            shell,
            font: FontSpec::new(cli.font_family.clone(), cli.font_size),
            display_scale: cli.display_scale,
            initial_windows: cli.windows,
            log_file: cli.log_file.clone(),
            log_level,
            tick: Duration::from_millis(cli.tick_ms),
        })
    }
}
