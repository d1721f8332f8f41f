use crate::cycling::GroupId;
use crate::debug_if_enabled;
use crate::events::{CycleCommand, Hotkey, KeyCode, KeyState};
use smallvec::SmallVec;
use std::time::Instant;

use super::modifier_state::ModifierState;

/// Что делать с событием клавиатуры
#[derive(Debug, Default, PartialEq)]
pub struct Routed {
    pub commands: SmallVec<[CycleCommand; 2]>,
    pub passthrough: bool,
}

impl Routed {
    fn pass() -> Self {
        Self { commands: SmallVec::new(), passthrough: true }
    }

    fn swallow(command: Option<CycleCommand>) -> Self {
        Self {
            commands: command.into_iter().collect(),
            passthrough: false,
        }
    }
}

struct Engaged {
    group: GroupId,
    hotkey: Hotkey,
}

/// Превращает события клавиатуры в команды циклов.
///
/// Клавиша хоткея (нажатие, повтор, отпускание) поглощается, модификаторы и
/// всё остальное пробрасываются. Когда отпущен модификатор, нужный последнему
/// сработавшему хоткею, выдаётся `ModifiersReleased`.
pub struct HotkeyRouter {
    bindings: Vec<(Hotkey, GroupId)>,
    modifiers: ModifierState,
    engaged: Option<Engaged>,
    swallowed: SmallVec<[(u16, GroupId); 2]>,
}

impl HotkeyRouter {
    pub fn new(bindings: Vec<(Hotkey, GroupId)>) -> Self {
        Self {
            bindings,
            modifiers: ModifierState::new(),
            engaged: None,
            swallowed: SmallVec::new(),
        }
    }

    pub fn bindings(&self) -> &[(Hotkey, GroupId)] {
        &self.bindings
    }

    pub fn route(&mut self, code: u16, state: KeyState, at: Instant) -> Routed {
        if self.modifiers.update_key(code, state != KeyState::Released) {
            return self.route_modifier(at);
        }

        if let Some(pos) = self.swallowed.iter().position(|(key, _)| *key == code) {
            return match state {
                KeyState::Released => {
                    let (_, group) = self.swallowed.remove(pos);
                    Routed::swallow(Some(CycleCommand::HotkeyUp { group, at }))
                }
                // Автоповтор хоткея не даёт новых шагов
                _ => Routed::swallow(None),
            };
        }

        if state != KeyState::Pressed {
            return Routed::pass();
        }

        let held = self.modifiers.to_modifiers();
        let key = KeyCode::new(code);
        let Some((hotkey, group)) = self
            .bindings
            .iter()
            .find(|(hotkey, _)| hotkey.matches(key, &held))
            .cloned()
        else {
            return Routed::pass();
        };

        debug_if_enabled!("Хоткей {} группы [{}]", hotkey, group);
        self.swallowed.push((code, group.clone()));
        self.engaged = Some(Engaged { group: group.clone(), hotkey });
        Routed::swallow(Some(CycleCommand::HotkeyDown { group, at }))
    }

    fn route_modifier(&mut self, at: Instant) -> Routed {
        let mut routed = Routed::pass();
        let held = self.modifiers.to_modifiers();

        let released = self
            .engaged
            .as_ref()
            .is_some_and(|engaged| !held.contains(&engaged.hotkey.modifiers));
        if released {
            if let Some(engaged) = self.engaged.take() {
                debug_if_enabled!("Модификаторы хоткея группы [{}] отпущены", engaged.group);
            }
            routed.commands.push(CycleCommand::ModifiersReleased { at });
        }
        routed
    }
}
