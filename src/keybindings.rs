use std::collections::BTreeMap;
use std::fmt;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Canvas-level commands. Everything else typed goes to the focused terminal,
/// so every default binding carries a modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    Quit,
    ToggleHelp,
    NewWindow,
    CloseWindow,
    DetachWindow,
    ReattachWindow,
    FocusNext,
    FocusPrev,
    ToggleLock,
    ToggleDock,
    ToggleMaximize,
    PanLeft,
    PanRight,
    PanUp,
    PanDown,
    ZoomIn,
    ZoomOut,
    ZoomReset,
    FontLarger,
    FontSmaller,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Quit => "Quit",
            Action::ToggleHelp => "Show / hide help",
            Action::NewWindow => "New window",
            Action::CloseWindow => "Close window",
            Action::DetachWindow => "Detach session",
            Action::ReattachWindow => "Reattach session",
            Action::FocusNext => "Focus next window",
            Action::FocusPrev => "Focus previous window",
            Action::ToggleLock => "Lock to viewport / unlock",
            Action::ToggleDock => "Dock / undock",
            Action::ToggleMaximize => "Maximize / restore",
            Action::PanLeft => "Pan left",
            Action::PanRight => "Pan right",
            Action::PanUp => "Pan up",
            Action::PanDown => "Pan down",
            Action::ZoomIn => "Zoom in",
            Action::ZoomOut => "Zoom out",
            Action::ZoomReset => "Reset zoom",
            Action::FontLarger => "Larger font",
            Action::FontSmaller => "Smaller font",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub code: KeyCode,
    pub mods: KeyModifiers,
}

impl KeyCombo {
    pub fn new(code: KeyCode, mods: KeyModifiers) -> Self {
        Self { code, mods }
    }

    pub fn alt(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::ALT)
    }

    pub fn matches(&self, key: &KeyEvent) -> bool {
        key.code == self.code && key.modifiers == self.mods
    }

    pub fn display(&self) -> String {
        let mut parts = Vec::new();
        if self.mods.contains(KeyModifiers::CONTROL) {
            parts.push("Ctrl".to_string());
        }
        if self.mods.contains(KeyModifiers::SHIFT) {
            parts.push("Shift".to_string());
        }
        if self.mods.contains(KeyModifiers::ALT) {
            parts.push("Alt".to_string());
        }
        let code = match self.code {
            KeyCode::Char(c) => c.to_ascii_uppercase().to_string(),
            KeyCode::Left => "Left".to_string(),
            KeyCode::Right => "Right".to_string(),
            KeyCode::Up => "Up".to_string(),
            KeyCode::Down => "Down".to_string(),
            KeyCode::F(n) => format!("F{}", n),
            _ => format!("{:?}", self.code),
        };
        parts.push(code);
        parts.join("+")
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[derive(Debug, Clone)]
pub struct KeyBindings {
    map: BTreeMap<Action, Vec<KeyCombo>>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        use Action::*;
        let mut kb = Self::empty();
        kb.add(Quit, KeyCombo::new(KeyCode::Char('q'), KeyModifiers::CONTROL));
        kb.add(ToggleHelp, KeyCombo::alt('h'));
        kb.add(ToggleHelp, KeyCombo::new(KeyCode::F(1), KeyModifiers::NONE));
        kb.add(NewWindow, KeyCombo::alt('n'));
        kb.add(CloseWindow, KeyCombo::alt('w'));
        kb.add(DetachWindow, KeyCombo::alt('x'));
        kb.add(ReattachWindow, KeyCombo::alt('r'));
        kb.add(FocusNext, KeyCombo::alt('.'));
        kb.add(FocusPrev, KeyCombo::alt(','));
        kb.add(ToggleLock, KeyCombo::alt('l'));
        kb.add(ToggleDock, KeyCombo::alt('d'));
        kb.add(ToggleMaximize, KeyCombo::alt('m'));
        kb.add(PanLeft, KeyCombo::new(KeyCode::Left, KeyModifiers::ALT));
        kb.add(PanRight, KeyCombo::new(KeyCode::Right, KeyModifiers::ALT));
        kb.add(PanUp, KeyCombo::new(KeyCode::Up, KeyModifiers::ALT));
        kb.add(PanDown, KeyCombo::new(KeyCode::Down, KeyModifiers::ALT));
        kb.add(ZoomIn, KeyCombo::alt('='));
        kb.add(ZoomOut, KeyCombo::alt('-'));
        kb.add(ZoomReset, KeyCombo::alt('0'));
        kb.add(FontLarger, KeyCombo::alt(']'));
        kb.add(FontSmaller, KeyCombo::alt('['));
        kb
    }
}

impl KeyBindings {
    pub fn empty() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, action: Action, combo: KeyCombo) {
        self.map.entry(action).or_default().push(combo);
    }

    pub fn matches(&self, action: Action, key: &KeyEvent) -> bool {
        self.map
            .get(&action)
            .is_some_and(|list| list.iter().any(|c| c.matches(key)))
    }

    pub fn action_for_key(&self, key: &KeyEvent) -> Option<Action> {
        self.map
            .iter()
            .find(|(_, list)| list.iter().any(|c| c.matches(key)))
            .map(|(act, _)| *act)
    }

    pub fn help_entries(&self) -> Vec<(Action, Vec<String>)> {
        self.map
            .iter()
            .map(|(act, list)| (*act, list.iter().map(|c| c.display()).collect()))
            .collect()
    }
}
