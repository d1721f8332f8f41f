pub mod keyboard;
pub mod window;

pub use keyboard::{Hotkey, KeyCode, KeyState, Modifiers};
pub use window::{AxWindow, ElementRef, ListedWindow, Point, Rect, WindowHandle, WindowRole};

use crate::cycling::GroupId;
use std::fmt;
use std::time::Instant;

/// Таймеры сессии
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Порог удержания: после него показывается HUD
    Hold,
    /// Пауза после последнего нажатия, завершающая цепочку тапов
    ChainTimeout,
}

/// Действия пользователя в HUD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HudAction {
    Next,
    Previous,
    /// Явный выбор (клик) - сразу завершает сессию
    Select(usize),
    Dismiss,
}

/// Сообщения для координатора; порядок доставки канала сохраняется
#[derive(Debug, Clone, PartialEq)]
pub enum CycleCommand {
    HotkeyDown { group: GroupId, at: Instant },
    HotkeyUp { group: GroupId, at: Instant },
    ModifiersReleased { at: Instant },
    TimerFired { kind: TimerKind, generation: u64, at: Instant },
    Hud { action: HudAction, at: Instant },
}

impl CycleCommand {
    pub fn hotkey_down(group: GroupId) -> Self {
        Self::HotkeyDown { group, at: Instant::now() }
    }

    pub fn hotkey_up(group: GroupId) -> Self {
        Self::HotkeyUp { group, at: Instant::now() }
    }

    pub fn modifiers_released() -> Self {
        Self::ModifiersReleased { at: Instant::now() }
    }

    pub fn hud(action: HudAction) -> Self {
        Self::Hud { action, at: Instant::now() }
    }
}

impl fmt::Display for CycleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleCommand::HotkeyDown { group, .. } => write!(f, "hotkey down [{}]", group),
            CycleCommand::HotkeyUp { group, .. } => write!(f, "hotkey up [{}]", group),
            CycleCommand::ModifiersReleased { .. } => write!(f, "modifiers released"),
            CycleCommand::TimerFired { kind, generation, .. } => {
                write!(f, "timer {:?} #{}", kind, generation)
            }
            CycleCommand::Hud { action, .. } => write!(f, "hud {:?}", action),
        }
    }
}
