use std::path::Path;
use std::time::Duration;

use crate::constants::{FULLSCREEN_RESIZE_DEBOUNCE, SHELL_RESIZE_DEBOUNCE};

/// Programs that own the whole screen and do not reliably repaint after a
/// SIGWINCH on their own.
const FULLSCREEN_PROGRAMS: &[&str] = &[
    "vim", "nvim", "vi", "view", "htop", "top", "btop", "btm", "less", "more", "most", "man",
    "nano", "pico", "emacs", "tmux", "screen", "mc", "ranger", "lf", "nnn", "lazygit", "tig",
    "k9s", "watch", "ncdu", "glances", "mutt", "neomutt", "weechat", "irssi",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgramKind {
    #[default]
    Shell,
    FullScreen,
}

impl ProgramKind {
    /// Classifies a foreground process by name. Accepts bare names, paths and
    /// full command lines (`/usr/bin/nvim -u NONE`).
    pub fn classify(name: &str) -> Self {
        let Some(first) = name.split_whitespace().next() else {
            return Self::Shell;
        };
        let base = Path::new(first)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(first)
            .trim_start_matches('-');
        if FULLSCREEN_PROGRAMS.contains(&base) {
            Self::FullScreen
        } else {
            Self::Shell
        }
    }

    pub fn resize_debounce(self) -> Duration {
        match self {
            Self::FullScreen => FULLSCREEN_RESIZE_DEBOUNCE,
            Self::Shell => SHELL_RESIZE_DEBOUNCE,
        }
    }

    pub fn needs_repaint(self) -> bool {
        matches!(self, Self::FullScreen)
    }
}
